//! Unsigned transaction envelope

use ethers::types::transaction::eip2718::TypedTransaction;
use ethers::types::{Address, Bytes, TransactionRequest, U256};
use serde::{Serialize, Serializer};

/// Format a quantity as minimal lowercase hex with a `0x` prefix.
/// Absent and zero values both become `0x0`.
pub fn to_hex_quantity(value: Option<U256>) -> String {
    match value {
        Some(value) if !value.is_zero() => format!("0x{:x}", value),
        _ => "0x0".to_string(),
    }
}

/// Parse a quantity given as `0x`-prefixed hex or as a decimal string
pub fn parse_quantity(input: &str) -> Result<U256, String> {
    let input = input.trim();
    if input.is_empty() {
        return Ok(U256::zero());
    }

    match input
        .strip_prefix("0x")
        .or_else(|| input.strip_prefix("0X"))
    {
        Some("") => Ok(U256::zero()),
        Some(hex) => U256::from_str_radix(hex, 16).map_err(|e| format!("{}: {}", input, e)),
        None => U256::from_dec_str(input).map_err(|e| format!("{}: {}", input, e)),
    }
}

/// Parse call data given as hex, with or without `0x`
pub fn parse_data(input: &str) -> Result<Bytes, String> {
    let input = input.trim();
    let hex = input.strip_prefix("0x").unwrap_or(input);
    hex::decode(hex)
        .map(Bytes::from)
        .map_err(|e| format!("{}: {}", input, e))
}

fn serialize_quantity<S: Serializer>(value: &U256, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(&to_hex_quantity(Some(*value)))
}

fn serialize_optional_quantity<S: Serializer>(
    value: &Option<U256>,
    serializer: S,
) -> Result<S::Ok, S::Error> {
    match value {
        Some(value) => serializer.serialize_str(&to_hex_quantity(Some(*value))),
        None => serializer.serialize_none(),
    }
}

/// Everything needed to send one transaction, resolved before signing.
///
/// Built fresh for every send and never shared between calls.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Envelope {
    pub from: Address,
    pub to: Address,
    pub data: Bytes,
    #[serde(serialize_with = "serialize_quantity")]
    pub value: U256,
    #[serde(serialize_with = "serialize_quantity")]
    pub nonce: U256,
    #[serde(serialize_with = "serialize_quantity")]
    pub gas_price: U256,
    #[serde(rename = "gas", serialize_with = "serialize_quantity")]
    pub gas_limit: U256,
    pub chain_id: u64,
    /// Signature placeholders, zero until signed and absent for node-side signing
    #[serde(
        skip_serializing_if = "Option::is_none",
        serialize_with = "serialize_optional_quantity"
    )]
    pub r: Option<U256>,
    #[serde(
        skip_serializing_if = "Option::is_none",
        serialize_with = "serialize_optional_quantity"
    )]
    pub s: Option<U256>,
    #[serde(
        skip_serializing_if = "Option::is_none",
        serialize_with = "serialize_optional_quantity"
    )]
    pub v: Option<U256>,
}

impl Envelope {
    /// Envelope with zeroed signature placeholders and the gas limit still unknown
    pub fn unsigned(
        from: Address,
        to: Address,
        data: Bytes,
        value: Option<U256>,
        nonce: U256,
        gas_price: U256,
        chain_id: u64,
    ) -> Self {
        Self {
            from,
            to,
            data,
            value: value.unwrap_or_default(),
            nonce,
            gas_price,
            gas_limit: U256::zero(),
            chain_id,
            r: Some(U256::zero()),
            s: Some(U256::zero()),
            v: None,
        }
    }

    /// Drop the signature placeholders so the node signs on our behalf
    pub fn strip_signature(&mut self) {
        self.r = None;
        self.s = None;
        self.v = None;
    }

    pub fn has_signature_fields(&self) -> bool {
        self.r.is_some() || self.s.is_some() || self.v.is_some()
    }

    /// Request used for gas simulation: no gas limit, no nonce
    pub fn simulation_request(&self) -> TypedTransaction {
        TransactionRequest::new()
            .from(self.from)
            .to(self.to)
            .data(self.data.clone())
            .value(self.value)
            .gas_price(self.gas_price)
            .into()
    }

    /// Legacy (EIP-155) transaction carrying every resolved field
    pub fn to_typed_transaction(&self) -> TypedTransaction {
        TransactionRequest::new()
            .from(self.from)
            .to(self.to)
            .data(self.data.clone())
            .value(self.value)
            .nonce(self.nonce)
            .gas_price(self.gas_price)
            .gas(self.gas_limit)
            .chain_id(self.chain_id)
            .into()
    }

    /// JSON form used in logs, all quantities as hex
    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|e| format!("{{\"error\":\"{}\"}}", e))
    }
}
