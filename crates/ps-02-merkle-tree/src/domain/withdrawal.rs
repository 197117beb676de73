//! # Withdrawal Types
//!
//! Inputs and outputs of withdrawal preparation. The proof itself is opaque
//! to this crate: the prover receives a `WithdrawalWitness` and returns the
//! encoded proof bytes.

use serde::{Deserialize, Serialize};
use shared_types::{to_fixed_hex, InstanceKey, U256};

/// Parsed note plus payout parameters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WithdrawalRequest {
    /// Pool instance holding the deposit
    pub instance: InstanceKey,
    /// Leaf committed at deposit time
    pub commitment: U256,
    /// Hash revealed on withdrawal
    pub nullifier_hash: U256,
    /// Note nullifier (private)
    pub nullifier: U256,
    /// Note secret (private)
    pub secret: U256,
    /// Recipient address
    pub recipient: U256,
    /// Relayer address, zero for a direct withdrawal
    pub relayer: U256,
    /// Relayer fee
    pub fee: U256,
    /// Native refund for token pools
    pub refund: U256,
}

/// Full circuit input handed to the prover.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WithdrawalWitness {
    // public
    pub root: U256,
    pub nullifier_hash: U256,
    pub recipient: U256,
    pub relayer: U256,
    pub fee: U256,
    pub refund: U256,
    // private
    pub nullifier: U256,
    pub secret: U256,
    pub path_elements: Vec<U256>,
    pub path_indices: Vec<u8>,
}

impl WithdrawalWitness {
    /// Public inputs in contract call order, as fixed-width hex.
    pub fn public_args(&self) -> Vec<String> {
        vec![
            to_fixed_hex(&self.root),
            to_fixed_hex(&self.nullifier_hash),
            to_address_hex(&self.recipient),
            to_address_hex(&self.relayer),
            to_fixed_hex(&self.fee),
            to_fixed_hex(&self.refund),
        ]
    }
}

/// Proof plus the arguments of the contract's `withdraw` call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PreparedWithdrawal {
    /// Encoded proof as returned by the prover
    pub proof: String,
    /// `[root, nullifierHash, recipient, relayer, fee, refund]`
    pub args: Vec<String>,
    /// Position of the commitment in the tree
    pub leaf_index: usize,
}

/// 20-byte address encoding of a field value.
pub fn to_address_hex(value: &U256) -> String {
    let full = to_fixed_hex(value);
    format!("0x{}", &full[full.len() - 40..])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_public_args_order_and_width() {
        let witness = WithdrawalWitness {
            root: U256::from(1),
            nullifier_hash: U256::from(2),
            recipient: U256::from(0xabcd),
            relayer: U256::zero(),
            fee: U256::from(3),
            refund: U256::zero(),
            nullifier: U256::from(9),
            secret: U256::from(9),
            path_elements: vec![],
            path_indices: vec![],
        };
        let args = witness.public_args();
        assert_eq!(args.len(), 6);
        assert_eq!(args[0].len(), 66);
        assert_eq!(args[2], format!("0x{:040x}", 0xabcd));
        assert_eq!(args[3].len(), 42);
    }
}
