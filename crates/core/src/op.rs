//! `Operation`: the tag carried by every WAL entry, identifying which
//! mutation a structure's `encode_op`/`apply_op` hooks should interpret the
//! entry's payload as.

use crate::error::{Error, Result};

/// Enumerated operation kinds a persisted structure may log to the WAL.
///
/// The concrete payload layout for each tag is owned entirely by the
/// registered structure's `encode_op`/`apply_op` hooks; the persistence
/// engine only ever inspects the tag, never the payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Operation {
    /// No-op; used as a WAL filler/heartbeat entry.
    Nop = 0,
    /// Insert a new element.
    Insert = 1,
    /// Delete an existing element.
    Delete = 2,
    /// Update an existing element in place.
    Update = 3,
    /// Replace an existing element wholesale.
    Replace = 4,
    /// Push onto the head of an ordered structure.
    PushHead = 5,
    /// Push onto the tail of an ordered structure.
    PushTail = 6,
    /// Pop from the head of an ordered structure.
    PopHead = 7,
    /// Pop from the tail of an ordered structure.
    PopTail = 8,
    /// Insert at a specific index.
    InsertAt = 9,
    /// Delete at a specific index.
    DeleteAt = 10,
    /// Clear all elements.
    Clear = 11,
    /// Insert many elements in one entry.
    BulkInsert = 12,
    /// Delete many elements in one entry.
    BulkDelete = 13,
    /// Merge another structure's state in.
    Merge = 14,
    /// Structure-defined operation outside the standard vocabulary.
    Custom = 15,
}

impl Operation {
    /// All tags, in wire-value order.
    pub const ALL: [Operation; 16] = [
        Operation::Nop,
        Operation::Insert,
        Operation::Delete,
        Operation::Update,
        Operation::Replace,
        Operation::PushHead,
        Operation::PushTail,
        Operation::PopHead,
        Operation::PopTail,
        Operation::InsertAt,
        Operation::DeleteAt,
        Operation::Clear,
        Operation::BulkInsert,
        Operation::BulkDelete,
        Operation::Merge,
        Operation::Custom,
    ];

    /// Wire-format byte for this tag.
    pub const fn to_u8(self) -> u8 {
        self as u8
    }

    /// Parse a tag from its wire-format byte.
    pub fn from_u8(byte: u8) -> Result<Operation> {
        Operation::ALL
            .into_iter()
            .find(|op| op.to_u8() == byte)
            .ok_or_else(|| Error::CorruptEntry(format!("unknown operation tag {byte}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn roundtrip_every_tag() {
        for op in Operation::ALL {
            assert_eq!(Operation::from_u8(op.to_u8()).unwrap(), op);
        }
    }

    #[test]
    fn unknown_tag_rejected() {
        assert!(Operation::from_u8(200).is_err());
    }
}
