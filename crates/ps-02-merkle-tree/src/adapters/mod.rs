//! # Adapters
//!
//! - `tree_store` - file and in-memory tree persistence
//! - `pool_contract` - `ethers` binding for the pool contract reads

pub mod pool_contract;
pub mod tree_store;

pub use pool_contract::JsonRpcPoolContract;
pub use tree_store::{FileTreeStore, InMemoryTreeStore};
