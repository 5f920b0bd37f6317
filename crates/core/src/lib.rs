//! Shared wire-level types for persistkit.
//!
//! This crate has no I/O and no allocation policy of its own: it is pure
//! data that the codec crate and the durability crate both build on.
//!
//! - [`Width`]: a validated byte-count for fixed-width integer storage.
//! - [`checksum`]: a unified checksum interface over 32/64/128-bit algorithms.
//! - [`Operation`]: the WAL entry operation tag vocabulary.
//! - [`Error`] / [`Result`]: the error type shared across every persistkit crate.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod checksum;
mod error;
mod op;
mod width;

pub use checksum::{ChecksumAlgorithm, ChecksumValue};
pub use error::{Error, Result};
pub use op::Operation;
pub use width::Width;
