//! Integer codec family: the compact encodings persistkit structures use to
//! store their payloads, independent of how those payloads eventually reach
//! disk (that's [`persistkit_durability`]).
//!
//! - [`external`]: fixed width, carried out-of-band by the caller.
//! - [`tagged`]: self-describing width, one leveled tag byte.
//! - [`chained`]: continuation-bit varint.
//! - [`split`]: two-bit branch selector over three direct widths plus an
//!   external-codec escape.
//! - [`packed_array`]: a logical array of fixed-bit-width values packed
//!   into wider physical slots, used standalone (not by the block codecs
//!   below, which are byte-oriented wire formats in their own right).
//! - [`for_codec`] / [`pfor`]: frame-of-reference and patched
//!   frame-of-reference columnar blocks, built on [`external`] and [`tagged`].
//! - [`delta`]: ZigZag-mapped consecutive deltas.
//! - [`dictionary`]: sorted unique-value table plus fixed-width index stream.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod chained;
pub mod delta;
pub mod dictionary;
pub mod external;
pub mod for_codec;
pub mod packed_array;
pub mod pfor;
pub mod split;
pub mod tagged;

pub use delta::DeltaSequence;
pub use dictionary::DictionaryEncoded;
pub use for_codec::FrameOfReference;
pub use packed_array::{PackedArray, SlotWord};
pub use pfor::PatchedFrameOfReference;
