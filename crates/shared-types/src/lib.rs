//! # Shared Types Crate
//!
//! This crate contains the event data model, the instance key used to
//! partition every collection, and the hex encoding helpers for field
//! elements.
//!
//! ## Design Principles
//!
//! - **Single Source of Truth**: Event shapes are defined once here and
//!   reused by the sync engine, the tree service and the offline tool.
//! - **Byte-stable JSON**: Field order and string encodings match the
//!   bundled snapshot files so a read/write cycle reproduces them exactly.
//! - **Instance partitioning**: Every collection, cache file and tree is
//!   keyed by `(network, currency, denomination)`.

pub mod encoding;
pub mod entities;
pub mod errors;

pub use encoding::*;
pub use entities::*;
pub use errors::*;
