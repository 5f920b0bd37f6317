//! Unified error type shared by the codec and durability crates.
//!
//! One variant per abstract error kind named in the error-handling design:
//! IO failures, wire-format corruption, version/type mismatches, checksum
//! failures, arithmetic/allocation overflow, and caller contract violations.

use thiserror::Error;

/// Result alias used throughout persistkit.
pub type Result<T> = std::result::Result<T, Error>;

/// Unified error type for the codec library and the persistence engine.
#[derive(Debug, Error)]
pub enum Error {
    /// Underlying I/O failure (file or memory-store operation).
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A fixed-size header failed magic, length, or structural validation.
    #[error("corrupt header: {0}")]
    CorruptHeader(String),

    /// A WAL entry or codec frame failed structural validation.
    #[error("corrupt entry: {0}")]
    CorruptEntry(String),

    /// The wire format version is newer than this build understands.
    #[error("unsupported version: {0}")]
    UnsupportedVersion(u32),

    /// A snapshot or WAL file's structure type doesn't match the registered operations.
    #[error("type mismatch: expected struct type {expected}, found {found}")]
    TypeMismatch {
        /// Registered structure type id.
        expected: u32,
        /// Type id recorded in the file.
        found: u32,
    },

    /// A stored checksum did not match the recomputed value.
    #[error("checksum mismatch: expected {expected}, computed {computed}")]
    ChecksumMismatch {
        /// Checksum recorded in the wire format, rendered as hex.
        expected: String,
        /// Checksum recomputed from the bytes, rendered as hex.
        computed: String,
    },

    /// An arithmetic computation or an untrusted length would overflow.
    #[error("overflow: {0}")]
    Overflow(String),

    /// An allocation implied by untrusted input was rejected as too large.
    #[error("out of memory: {0}")]
    OutOfMemory(String),

    /// The operation requires a store (snapshot or WAL) that was never attached.
    #[error("not configured: {0}")]
    NotConfigured(&'static str),

    /// A caller-supplied value violates a documented contract (e.g. exceeds a declared bit width).
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// A registered `validate` hook rejected a restored structure.
    #[error("validation failed: {0}")]
    ValidationFailed(String),
}
