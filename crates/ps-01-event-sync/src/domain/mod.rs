//! # Domain Module
//!
//! Core domain types for Event Synchronization.

pub mod errors;
pub mod filters;
pub mod value_objects;

pub use errors::*;
pub use filters::*;
pub use value_objects::*;
