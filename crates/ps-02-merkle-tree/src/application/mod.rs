//! # Application Layer
//!
//! - `service` - per-instance tree construction and root validation
//! - `withdrawal` - prover context and withdrawal preparation

pub mod service;
pub mod withdrawal;

pub use service::{commitments_of, MerkleTreeService};
pub use withdrawal::{ProverContext, WithdrawalPreparer};
