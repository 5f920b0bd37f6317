//! The structure-operations contract: the only way the persistence engine
//! ever touches a structure it persists.
//!
//! Each persistable structure type implements [`StructureOps`] once. The
//! engine is generic over that trait and never inspects the structure's
//! fields directly -- it only ever calls these seven hooks. Where a
//! function-pointer-table design would pass a `void*` and let `apply_op`
//! mutate through it, this trait passes the structure by value and lets
//! `apply_op` return a (possibly entirely different) replacement; there is
//! no separate `free` hook; an owned `Structure` cleans itself up via `Drop`
//! the moment nothing holds it anymore.

use persistkit_core::{Operation, Result};

/// The operations table a structure type registers with the persistence
/// engine.
///
/// `Self` is typically a zero-sized marker type (`struct OrderedI64Ops;`)
/// that exists purely to carry this `impl`; the actual persisted data lives
/// in [`StructureOps::Structure`].
pub trait StructureOps {
    /// The in-memory structure this registration persists.
    type Structure;

    /// Arguments carried by a logged operation, specific to this structure
    /// (e.g. the pushed value for `PUSH_TAIL`).
    type OpArgs;

    /// Discriminates this structure type in a snapshot/WAL header. Two
    /// different registrations sharing an ID is a configuration error the
    /// engine detects at restore time via [`persistkit_core::Error::TypeMismatch`].
    const STRUCT_TYPE_ID: u32;

    /// Serialize the entire structure to an owned byte buffer.
    fn snapshot(structure: &Self::Structure) -> Result<Vec<u8>>;

    /// Deserialize a structure from a snapshot body. Inverse of [`Self::snapshot`].
    fn restore(bytes: &[u8]) -> Result<Self::Structure>;

    /// Logical element count, for statistics.
    fn count(structure: &Self::Structure) -> u64;

    /// Heuristic serialized-size estimate, for compaction-threshold decisions.
    fn estimate_size(structure: &Self::Structure) -> u64;

    /// Serialize one operation's arguments to its WAL payload.
    fn encode_op(op: Operation, args: &Self::OpArgs) -> Result<Vec<u8>>;

    /// Apply a decoded WAL entry to `structure`, returning the (possibly
    /// wholesale-replaced) result. Inverse of [`Self::encode_op`] composed
    /// with the operation's effect.
    fn apply_op(structure: Self::Structure, op: Operation, payload: &[u8]) -> Result<Self::Structure>;

    /// Optional post-restore/post-replay consistency check. The default
    /// implementation always passes.
    fn validate(_structure: &Self::Structure) -> Result<()> {
        Ok(())
    }
}
