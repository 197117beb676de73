//! # Pool Contract Adapter
//!
//! `nextIndex()` and `isKnownRoot(bytes32)` reads through an `ethers`
//! contract binding.

use std::sync::Arc;

use async_trait::async_trait;
use ethers::contract::abigen;
use ethers::types::Address;
use ps_01_event_sync::HttpProvider;
use shared_types::{to_fixed_hex, to_word, U256};
use tracing::debug;

use crate::domain::MerkleTreeError;
use crate::ports::PoolContract;

abigen!(
    PoolBinding,
    r#"[
        function nextIndex() external view returns (uint32)
        function isKnownRoot(bytes32 root) external view returns (bool)
    ]"#
);

/// Pool contract reached over the network's shared HTTP provider.
pub struct JsonRpcPoolContract {
    binding: PoolBinding<HttpProvider>,
}

impl JsonRpcPoolContract {
    /// Contract at `address`.
    pub fn new(provider: Arc<HttpProvider>, address: &str) -> Result<Self, MerkleTreeError> {
        let address: Address = address
            .parse()
            .map_err(|_| MerkleTreeError::Contract(format!("invalid address {address}")))?;
        Ok(Self {
            binding: PoolBinding::new(address, provider),
        })
    }

    /// Contract address.
    pub fn address(&self) -> Address {
        self.binding.address()
    }
}

#[async_trait]
impl PoolContract for JsonRpcPoolContract {
    async fn next_index(&self) -> Result<u32, MerkleTreeError> {
        self.binding
            .next_index()
            .call()
            .await
            .map_err(|e| MerkleTreeError::Contract(format!("nextIndex: {e}")))
    }

    async fn is_known_root(&self, root: &U256) -> Result<bool, MerkleTreeError> {
        let known = self
            .binding
            .is_known_root(to_word(root))
            .call()
            .await
            .map_err(|e| MerkleTreeError::Contract(format!("isKnownRoot: {e}")))?;
        debug!(address = ?self.address(), root = %to_fixed_hex(root), known, "isKnownRoot");
        Ok(known)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ethers::utils::keccak256;
    use ps_01_event_sync::connect_http;

    fn contract() -> JsonRpcPoolContract {
        let provider = connect_http("http://127.0.0.1:8545").unwrap();
        JsonRpcPoolContract::new(provider, "0x910cbd523d972eb0a6f4cae4618ad62622b39dbf").unwrap()
    }

    #[test]
    fn test_calldata_layout() {
        let pool = contract();
        let data = pool
            .binding
            .is_known_root(to_word(&U256::from(1)))
            .calldata()
            .unwrap();
        assert_eq!(data.len(), 4 + 32);
        assert_eq!(&data[..4], &keccak256(b"isKnownRoot(bytes32)")[..4]);
        assert_eq!(data[35], 1);

        let data = pool.binding.next_index().calldata().unwrap();
        assert_eq!(&data[..], &keccak256(b"nextIndex()")[..4]);
    }

    #[test]
    fn test_rejects_malformed_address() {
        let provider = connect_http("http://127.0.0.1:8545").unwrap();
        assert!(matches!(
            JsonRpcPoolContract::new(provider, "0x1234"),
            Err(MerkleTreeError::Contract(_))
        ));
    }
}
