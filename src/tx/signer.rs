//! Transaction signing: local key or node-managed account

use super::envelope::Envelope;
use crate::chain::ChainClient;
use crate::error::{ConstructionStage, RelayerError, RelayerResult};

use ethers::signers::{LocalWallet, Signer};
use ethers::types::transaction::eip2718::TypedTransaction;
use ethers::types::{Address, Bytes, U256};
use tracing::{info, warn};

/// Something the node will accept as a transaction
#[derive(Debug, Clone)]
pub enum SignedPayload {
    /// RLP-encoded signed transaction for `eth_sendRawTransaction`
    Raw(Bytes),
    /// Unsigned request for `eth_sendTransaction`, signed by the node
    Unsigned(TypedTransaction),
}

/// Produces sendable transactions, either with a local key or by trusting
/// the node to sign for an unlocked account.
#[derive(Debug, Clone)]
pub enum TxSigner {
    Local(LocalWallet),
    /// Test and development only. Never used for funds-bearing sends.
    NodeManaged,
}

impl TxSigner {
    /// Local signer when a key is given, node-managed otherwise
    pub fn from_private_key(private_key: Option<&str>) -> RelayerResult<Self> {
        match private_key {
            Some(key) if !key.trim().is_empty() => Self::local(key),
            _ => {
                warn!("No private key provided - the node will sign transactions (testing only)");
                Ok(TxSigner::NodeManaged)
            }
        }
    }

    /// Decode a hex private key (with or without `0x`)
    pub fn local(private_key: &str) -> RelayerResult<Self> {
        let wallet = private_key
            .trim()
            .parse::<LocalWallet>()
            .map_err(|e| RelayerError::Signing(format!("Invalid private key: {}", e)))?;

        info!("Local signer initialized for {:?}", wallet.address());
        Ok(TxSigner::Local(wallet))
    }

    pub fn is_node_managed(&self) -> bool {
        matches!(self, TxSigner::NodeManaged)
    }

    /// Sender address, from the key or the node's first account
    pub async fn resolve_sender(&self, client: &dyn ChainClient) -> RelayerResult<Address> {
        match self {
            TxSigner::Local(wallet) => Ok(wallet.address()),
            TxSigner::NodeManaged => {
                let accounts = client
                    .accounts()
                    .await
                    .map_err(|e| RelayerError::construction(ConstructionStage::Sender, e))?;
                accounts.first().copied().ok_or_else(|| {
                    RelayerError::construction(
                        ConstructionStage::Sender,
                        "No from address given. Is there an issue with the private key?",
                    )
                })
            }
        }
    }

    /// Turn the envelope into a sendable payload. Pure, no I/O.
    ///
    /// Local signing fills in `r`, `s` and `v`; node-managed signing strips them.
    pub fn prepare(&self, envelope: &mut Envelope) -> RelayerResult<SignedPayload> {
        match self {
            TxSigner::Local(wallet) => {
                let wallet = wallet.clone().with_chain_id(envelope.chain_id);
                let tx = envelope.to_typed_transaction();
                let signature = wallet
                    .sign_transaction_sync(&tx)
                    .map_err(|e| RelayerError::Signing(e.to_string()))?;

                envelope.r = Some(signature.r);
                envelope.s = Some(signature.s);
                envelope.v = Some(U256::from(signature.v));

                Ok(SignedPayload::Raw(tx.rlp_signed(&signature)))
            }
            TxSigner::NodeManaged => {
                envelope.strip_signature();
                Ok(SignedPayload::Unsigned(envelope.to_typed_transaction()))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chain::MockChainClient;
    use ethers::utils::rlp::Rlp;

    // Well-known development key
    const DEV_KEY: &str = "0xac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80";
    const DEV_ADDRESS: &str = "0xf39fd6e51aad88f6f4ce6ab8827279cfffb92266";

    fn envelope(from: Address) -> Envelope {
        let mut envelope = Envelope::unsigned(
            from,
            Address::repeat_byte(0x22),
            Bytes::from(vec![0x01, 0x02]),
            None,
            U256::from(3),
            U256::from(60_000_000u64),
            31,
        );
        envelope.gas_limit = U256::from(300_000);
        envelope
    }

    #[test]
    fn test_key_with_and_without_prefix() {
        let with_prefix = TxSigner::local(DEV_KEY).unwrap();
        let without_prefix = TxSigner::local(&DEV_KEY[2..]).unwrap();

        let expected: Address = DEV_ADDRESS.parse().unwrap();
        for signer in [with_prefix, without_prefix] {
            match signer {
                TxSigner::Local(wallet) => assert_eq!(wallet.address(), expected),
                TxSigner::NodeManaged => panic!("expected a local signer"),
            }
        }
    }

    #[test]
    fn test_malformed_keys_are_signing_errors() {
        for key in ["0xnothex", "0x1234", "zz"] {
            let err = TxSigner::local(key).unwrap_err();
            assert!(matches!(err, RelayerError::Signing(_)), "{}", key);
            assert!(!err.is_retryable());
        }
    }

    #[test]
    fn test_wrong_length_keys_are_signing_errors() {
        // 31 and 33 bytes of otherwise valid hex
        for key in [&DEV_KEY[..64], &format!("{}00", DEV_KEY)[..]] {
            let err = TxSigner::local(key).unwrap_err();
            assert!(matches!(err, RelayerError::Signing(_)), "{}", key);
        }
        assert!(TxSigner::from_private_key(Some("0x1234")).is_err());
    }

    #[test]
    fn test_missing_key_selects_node_managed() {
        assert!(TxSigner::from_private_key(None).unwrap().is_node_managed());
        assert!(TxSigner::from_private_key(Some("")).unwrap().is_node_managed());
        assert!(!TxSigner::from_private_key(Some(DEV_KEY))
            .unwrap()
            .is_node_managed());
    }

    #[test]
    fn test_signed_bytes_recover_to_key_address() {
        let signer = TxSigner::local(DEV_KEY).unwrap();
        let expected: Address = DEV_ADDRESS.parse().unwrap();
        let mut envelope = envelope(expected);

        let raw = match signer.prepare(&mut envelope).unwrap() {
            SignedPayload::Raw(raw) => raw,
            SignedPayload::Unsigned(_) => panic!("expected signed bytes"),
        };
        assert!(!raw.is_empty());

        let (decoded, signature) = TypedTransaction::decode_signed(&Rlp::new(&raw)).unwrap();
        assert_eq!(signature.recover(decoded.sighash()).unwrap(), expected);
        assert_eq!(decoded.nonce(), Some(&U256::from(3)));

        assert_eq!(envelope.r, Some(signature.r));
        assert_eq!(envelope.s, Some(signature.s));
        assert_eq!(envelope.v, Some(U256::from(signature.v)));
    }

    #[test]
    fn test_node_managed_strips_signature_fields() {
        let mut envelope = envelope(Address::repeat_byte(0x11));
        assert!(envelope.has_signature_fields());

        let payload = TxSigner::NodeManaged.prepare(&mut envelope).unwrap();
        assert!(!envelope.has_signature_fields());
        match payload {
            SignedPayload::Unsigned(tx) => {
                assert_eq!(tx.from(), Some(&Address::repeat_byte(0x11)));
                assert_eq!(tx.gas(), Some(&U256::from(300_000)));
            }
            SignedPayload::Raw(_) => panic!("expected an unsigned request"),
        }
    }

    #[tokio::test]
    async fn test_node_managed_sender_is_first_account() {
        let mut client = MockChainClient::new();
        client
            .expect_accounts()
            .times(1)
            .returning(|| Ok(vec![Address::repeat_byte(0xaa), Address::repeat_byte(0xbb)]));

        let sender = TxSigner::NodeManaged.resolve_sender(&client).await.unwrap();
        assert_eq!(sender, Address::repeat_byte(0xaa));
    }

    #[tokio::test]
    async fn test_node_without_accounts_has_no_sender() {
        let mut client = MockChainClient::new();
        client.expect_accounts().returning(|| Ok(vec![]));

        let err = TxSigner::NodeManaged
            .resolve_sender(&client)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            RelayerError::Construction {
                stage: ConstructionStage::Sender,
                ..
            }
        ));
    }

    #[tokio::test]
    async fn test_local_sender_needs_no_rpc() {
        let client = MockChainClient::new();
        let signer = TxSigner::local(DEV_KEY).unwrap();
        let sender = signer.resolve_sender(&client).await.unwrap();
        assert_eq!(sender, DEV_ADDRESS.parse::<Address>().unwrap());
    }
}
