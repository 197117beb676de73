//! # Domain Module
//!
//! Core domain types for Merkle Tree Construction.

pub mod errors;
pub mod value_objects;
pub mod withdrawal;

pub use errors::*;
pub use value_objects::*;
pub use withdrawal::*;
