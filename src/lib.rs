//! persistkit: a compact integer codec library plus a pluggable
//! snapshot-and-WAL persistence engine.
//!
//! This crate is a thin facade over three independently usable crates:
//!
//! - [`persistkit_core`]: shared wire-level types (`Error`, `Width`,
//!   `Operation`, `ChecksumAlgorithm`) with no I/O of its own.
//! - [`persistkit_codec`]: the integer codec family (tagged, chained,
//!   split, external, packed-array, FOR/PFOR, delta, dictionary).
//! - [`persistkit_durability`]: the `Store` abstraction, snapshot and WAL
//!   engines, recovery/compaction orchestration, and `PersistContext`.
//!
//! Most applications only need `persistkit::codec::*` and
//! `persistkit::durability::*`; `persistkit_core` is re-exported because
//! every public API surface in the other two returns its `Error`/`Result`.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub use persistkit_core as core;
pub use persistkit_codec as codec;
pub use persistkit_durability as durability;

pub use persistkit_core::{ChecksumAlgorithm, ChecksumValue, Error, Operation, Result, Width};
