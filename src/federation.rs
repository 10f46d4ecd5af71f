//! Federation administration: member removal through the owning multisig

use crate::chain::ChainClient;
use crate::error::{RelayerError, RelayerResult};

use ethers::abi::{self, ParamType, Token};
use ethers::types::transaction::eip2718::TypedTransaction;
use ethers::types::{Address, Bytes, TransactionRequest, U256};
use ethers::utils::id;
use tracing::debug;

/// Calldata for `selector(args...)`
fn encode_call(signature: &str, args: &[Token]) -> Bytes {
    let mut data = id(signature).to_vec();
    data.extend(abi::encode(args));
    data.into()
}

/// `Federation.removeMember(address)`
pub fn encode_remove_member(member: Address) -> Bytes {
    encode_call("removeMember(address)", &[Token::Address(member)])
}

/// `MultiSigWallet.submitTransaction(address,uint256,bytes)`
pub fn encode_submit_transaction(destination: Address, value: U256, data: &Bytes) -> Bytes {
    encode_call(
        "submitTransaction(address,uint256,bytes)",
        &[
            Token::Address(destination),
            Token::Uint(value),
            Token::Bytes(data.to_vec()),
        ],
    )
}

/// Owner of an `Ownable` contract, read with `owner()`
pub async fn resolve_owner(client: &dyn ChainClient, contract: Address) -> RelayerResult<Address> {
    let request: TypedTransaction = TransactionRequest::new()
        .to(contract)
        .data(encode_call("owner()", &[]))
        .into();

    let output = client.call_contract(&request).await?;
    let tokens = abi::decode(&[ParamType::Address], &output).map_err(|e| RelayerError::Rpc {
        method: "eth_call",
        message: format!("Invalid owner() response from {:?}: {}", contract, e),
    })?;

    match tokens.into_iter().next() {
        Some(Token::Address(owner)) => {
            debug!("Owner of {:?} is {:?}", contract, owner);
            Ok(owner)
        }
        _ => Err(RelayerError::Rpc {
            method: "eth_call",
            message: format!("owner() of {:?} returned no address", contract),
        }),
    }
}

/// Multisig proposal removing `member` from the federation at `federation`.
///
/// Returns the multisig address and the calldata to send to it.
pub async fn remove_member_proposal(
    client: &dyn ChainClient,
    federation: Address,
    member: Address,
) -> RelayerResult<(Address, Bytes)> {
    let multisig = resolve_owner(client, federation).await?;
    let remove = encode_remove_member(member);
    Ok((
        multisig,
        encode_submit_transaction(federation, U256::zero(), &remove),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chain::MockChainClient;

    #[test]
    fn test_remove_member_calldata() {
        let member = Address::repeat_byte(0x33);
        let data = encode_remove_member(member);

        assert_eq!(data.len(), 4 + 32);
        assert_eq!(&data[..4], &id("removeMember(address)")[..]);
        assert_eq!(&data[16..36], member.as_bytes());
    }

    #[test]
    fn test_submit_transaction_wraps_inner_call() {
        let federation = Address::repeat_byte(0x44);
        let inner = encode_remove_member(Address::repeat_byte(0x33));
        let data = encode_submit_transaction(federation, U256::zero(), &inner);

        assert_eq!(&data[..4], &id("submitTransaction(address,uint256,bytes)")[..]);
        let tokens = abi::decode(
            &[ParamType::Address, ParamType::Uint(256), ParamType::Bytes],
            &data[4..],
        )
        .unwrap();
        assert_eq!(tokens[0], Token::Address(federation));
        assert_eq!(tokens[1], Token::Uint(U256::zero()));
        assert_eq!(tokens[2], Token::Bytes(inner.to_vec()));
    }

    #[tokio::test]
    async fn test_proposal_targets_owner_multisig() {
        let federation = Address::repeat_byte(0x44);
        let multisig = Address::repeat_byte(0x55);

        let mut client = MockChainClient::new();
        client
            .expect_call_contract()
            .withf(move |tx| {
                tx.to_addr() == Some(&federation)
                    && tx.data().map(|d| d.to_vec()) == Some(id("owner()").to_vec())
            })
            .times(1)
            .returning(move |_| Ok(abi::encode(&[Token::Address(multisig)]).into()));

        let (target, data) =
            remove_member_proposal(&client, federation, Address::repeat_byte(0x33))
                .await
                .unwrap();
        assert_eq!(target, multisig);
        assert_eq!(&data[..4], &id("submitTransaction(address,uint256,bytes)")[..]);
    }

    #[tokio::test]
    async fn test_empty_owner_response_is_error() {
        let mut client = MockChainClient::new();
        client.expect_call_contract().returning(|_| Ok(Bytes::new()));

        let err = resolve_owner(&client, Address::repeat_byte(0x44))
            .await
            .unwrap_err();
        assert!(matches!(err, RelayerError::Rpc { method: "eth_call", .. }));
    }
}
