//! # Ports Module
//!
//! Hexagonal architecture ports for Merkle Tree Construction.

pub mod inbound;
pub mod outbound;

pub use inbound::MerkleTreeApi;
pub use outbound::{MockPoolContract, MockProver, PoolContract, Prover, TreeStore};
