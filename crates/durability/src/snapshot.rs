//! Snapshot engine: whole-structure serialization to a single, checksummed
//! wire block.
//!
//! ```text
//! magic            u32 LE   0x50534B44 ("PSKD")
//! version          u16 LE   1
//! flags            u16 LE   bit 1: body checksum present; bits 2-3: algorithm tag
//! structType       u32 LE   StructureOps::STRUCT_TYPE_ID
//! count            u64 LE   StructureOps::count() at snapshot time
//! dataLen          u64 LE   length of the body in bytes
//! headerChecksum   u64 LE   xxHash64 of the first 28 header bytes
//! body             dataLen bytes, from StructureOps::snapshot()
//! bodyChecksum     0..16 bytes, algorithm per flags bits 2-3
//! ```
//!
//! `headerChecksum` always uses xxHash64 regardless of the configured
//! checksum algorithm -- it exists to let a reader trust the rest of the
//! header (including the algorithm tag the body checksum depends on)
//! before doing anything else with it.

use crate::config::PersistConfig;
use crate::registry::StructureOps;
use crate::stats::PersistStats;
use crate::store::Store;
use byteorder::{ByteOrder, LittleEndian};
use persistkit_core::{ChecksumAlgorithm, ChecksumValue, Error, Result};
use std::time::{Instant, SystemTime, UNIX_EPOCH};

const MAGIC: u32 = 0x50534B44;
const VERSION: u16 = 1;
const HEADER_LEN: usize = 36;
const HEADER_CHECKSUM_COVERAGE: usize = 28;

fn now_micros() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_micros() as u64)
        .unwrap_or(0)
}

/// Serialize `structure` through `T`'s [`StructureOps`] and write it to
/// `store` as a complete snapshot block, overwriting whatever was there.
pub fn write_snapshot<S, T>(
    store: &mut S,
    structure: &T::Structure,
    config: &PersistConfig,
    stats: &mut PersistStats,
) -> Result<()>
where
    S: Store,
    T: StructureOps,
{
    let started = Instant::now();
    let body = T::snapshot(structure)?;
    let count = T::count(structure);

    let mut header = [0u8; HEADER_LEN];
    LittleEndian::write_u32(&mut header[0..4], MAGIC);
    LittleEndian::write_u16(&mut header[4..6], VERSION);
    let algo = config.checksum_algorithm();
    let tag = algo.to_tag().unwrap_or(0);
    let checksum_present_bit = if algo != ChecksumAlgorithm::None { 1u16 << 1 } else { 0 };
    LittleEndian::write_u16(&mut header[6..8], checksum_present_bit | ((tag as u16) << 2));
    LittleEndian::write_u32(&mut header[8..12], T::STRUCT_TYPE_ID);
    LittleEndian::write_u64(&mut header[12..20], count);
    LittleEndian::write_u64(&mut header[20..28], body.len() as u64);
    let header_checksum = ChecksumValue::compute(ChecksumAlgorithm::Xxh64, &header[..HEADER_CHECKSUM_COVERAGE]);
    header[28..36].copy_from_slice(header_checksum.bytes());

    let body_checksum = ChecksumValue::compute(algo, &body);

    store.seek(0)?;
    store.write(&header)?;
    store.write(&body)?;
    store.write(body_checksum.bytes())?;
    store.truncate()?;
    store.sync()?;

    let total_bytes = (HEADER_LEN + body.len() + body_checksum.len()) as u64;
    stats.record_snapshot(total_bytes, now_micros(), started.elapsed().as_micros() as u64);
    tracing::info!(target: "persistkit::snapshot", bytes = total_bytes, count, "snapshot written");
    Ok(())
}

/// Read a snapshot block from `store` and restore it through `T`'s
/// [`StructureOps`], validating every header field and both checksums.
pub fn read_snapshot<S, T>(store: &mut S, _config: &PersistConfig) -> Result<T::Structure>
where
    S: Store,
    T: StructureOps,
{
    store.seek(0)?;
    let mut header = [0u8; HEADER_LEN];
    store.read(&mut header)?;

    let magic = LittleEndian::read_u32(&header[0..4]);
    if magic != MAGIC {
        return Err(Error::CorruptHeader(format!(
            "snapshot magic mismatch: expected {MAGIC:#x}, found {magic:#x}"
        )));
    }
    let version = LittleEndian::read_u16(&header[4..6]);
    if version != VERSION {
        return Err(Error::UnsupportedVersion(version as u32));
    }
    let flags = LittleEndian::read_u16(&header[6..8]);
    let algo = ChecksumAlgorithm::from_tag((flags >> 2) as u8)?;
    let checksum_present_bit = (flags >> 1) & 1 == 1;
    if checksum_present_bit != (algo != ChecksumAlgorithm::None) {
        return Err(Error::CorruptHeader(
            "snapshot flags: body-checksum-present bit disagrees with algorithm tag".to_string(),
        ));
    }
    let struct_type = LittleEndian::read_u32(&header[8..12]);
    if struct_type != T::STRUCT_TYPE_ID {
        return Err(Error::TypeMismatch {
            expected: T::STRUCT_TYPE_ID,
            found: struct_type,
        });
    }
    let data_len = LittleEndian::read_u64(&header[20..28]) as usize;

    let expected_header_checksum = ChecksumValue::compute(ChecksumAlgorithm::Xxh64, &header[..HEADER_CHECKSUM_COVERAGE]);
    if header[28..36] != *expected_header_checksum.bytes() {
        return Err(Error::ChecksumMismatch {
            expected: hex_string(&header[28..36]),
            computed: hex_string(expected_header_checksum.bytes()),
        });
    }

    let mut body = vec![0u8; data_len];
    store.read(&mut body)?;

    if algo != ChecksumAlgorithm::None {
        let mut trailer = vec![0u8; algo.digest_len()];
        store.read(&mut trailer)?;
        let expected = ChecksumValue::compute(algo, &body);
        if trailer != expected.bytes() {
            return Err(Error::ChecksumMismatch {
                expected: hex_string(&trailer),
                computed: hex_string(expected.bytes()),
            });
        }
    }

    let structure = T::restore(&body)?;
    T::validate(&structure).map_err(|e| Error::ValidationFailed(e.to_string()))?;
    tracing::info!(target: "persistkit::snapshot", bytes = data_len, "snapshot restored");
    Ok(structure)
}

fn hex_string(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use persistkit_core::Operation;

    struct Counter;

    impl StructureOps for Counter {
        type Structure = i64;
        type OpArgs = i64;
        const STRUCT_TYPE_ID: u32 = 0xC0DE_0002;

        fn snapshot(structure: &i64) -> Result<Vec<u8>> {
            Ok(structure.to_le_bytes().to_vec())
        }
        fn restore(bytes: &[u8]) -> Result<i64> {
            Ok(i64::from_le_bytes(bytes.try_into().unwrap()))
        }
        fn count(_structure: &i64) -> u64 {
            1
        }
        fn estimate_size(_structure: &i64) -> u64 {
            8
        }
        fn encode_op(_op: Operation, args: &i64) -> Result<Vec<u8>> {
            Ok(args.to_le_bytes().to_vec())
        }
        fn apply_op(structure: i64, _op: Operation, payload: &[u8]) -> Result<i64> {
            Ok(structure + i64::from_le_bytes(payload.try_into().unwrap()))
        }
    }

    #[test]
    fn write_then_read_roundtrips() {
        let mut store = MemoryStore::new();
        let mut stats = PersistStats::new();
        let config = PersistConfig::default();
        write_snapshot::<_, Counter>(&mut store, &42, &config, &mut stats).unwrap();
        assert_eq!(stats.snapshot_count, 1);

        let restored = read_snapshot::<_, Counter>(&mut store, &config).unwrap();
        assert_eq!(restored, 42);
    }

    #[test]
    fn wrong_struct_type_is_rejected() {
        struct OtherCounter;
        impl StructureOps for OtherCounter {
            type Structure = i64;
            type OpArgs = i64;
            const STRUCT_TYPE_ID: u32 = 0xBAD_0000;
            fn snapshot(s: &i64) -> Result<Vec<u8>> {
                Ok(s.to_le_bytes().to_vec())
            }
            fn restore(b: &[u8]) -> Result<i64> {
                Ok(i64::from_le_bytes(b.try_into().unwrap()))
            }
            fn count(_s: &i64) -> u64 {
                1
            }
            fn estimate_size(_s: &i64) -> u64 {
                8
            }
            fn encode_op(_op: Operation, a: &i64) -> Result<Vec<u8>> {
                Ok(a.to_le_bytes().to_vec())
            }
            fn apply_op(s: i64, _op: Operation, p: &[u8]) -> Result<i64> {
                Ok(s + i64::from_le_bytes(p.try_into().unwrap()))
            }
        }

        let mut store = MemoryStore::new();
        let mut stats = PersistStats::new();
        let config = PersistConfig::default();
        write_snapshot::<_, Counter>(&mut store, &1, &config, &mut stats).unwrap();
        let err = read_snapshot::<_, OtherCounter>(&mut store, &config).unwrap_err();
        assert!(matches!(err, Error::TypeMismatch { .. }));
    }

    #[test]
    fn corrupted_body_fails_checksum() {
        let mut store = MemoryStore::new();
        let mut stats = PersistStats::new();
        let config = PersistConfig::default();
        write_snapshot::<_, Counter>(&mut store, &7, &config, &mut stats).unwrap();

        // Flip a byte inside the body region (right after the 36-byte header).
        let (bytes, size) = store.peek();
        let mut corrupt = bytes[..size].to_vec();
        corrupt[36] ^= 0xFF;
        let mut corrupt_store = MemoryStore::from_bytes(corrupt);
        let err = read_snapshot::<_, Counter>(&mut corrupt_store, &config).unwrap_err();
        assert!(matches!(err, Error::ChecksumMismatch { .. }));
    }

    #[test]
    fn no_checksum_algorithm_skips_trailer() {
        let mut store = MemoryStore::new();
        let mut stats = PersistStats::new();
        let config = PersistConfig::default().with_checksum_algorithm(ChecksumAlgorithm::None);
        write_snapshot::<_, Counter>(&mut store, &99, &config, &mut stats).unwrap();
        let restored = read_snapshot::<_, Counter>(&mut store, &config).unwrap();
        assert_eq!(restored, 99);
        assert_eq!(store.size().unwrap(), 36 + 8);
    }

    #[test]
    fn body_checksum_present_bit_matches_configured_algorithm() {
        let mut store = MemoryStore::new();
        let mut stats = PersistStats::new();
        let config = PersistConfig::default().with_checksum_algorithm(ChecksumAlgorithm::Xxh64);
        write_snapshot::<_, Counter>(&mut store, &5, &config, &mut stats).unwrap();
        let (bytes, _) = store.peek();
        let flags = LittleEndian::read_u16(&bytes[6..8]);
        assert_eq!(flags & 0b10, 0b10, "bit 1 must be set when a body checksum algorithm is configured");

        let none_config = PersistConfig::default().with_checksum_algorithm(ChecksumAlgorithm::None);
        let mut none_store = MemoryStore::new();
        write_snapshot::<_, Counter>(&mut none_store, &5, &none_config, &mut stats).unwrap();
        let (none_bytes, _) = none_store.peek();
        let none_flags = LittleEndian::read_u16(&none_bytes[6..8]);
        assert_eq!(none_flags & 0b10, 0, "bit 1 must be clear when no body checksum is configured");
    }

    #[test]
    fn disagreeing_checksum_present_bit_is_rejected() {
        let mut store = MemoryStore::new();
        let mut stats = PersistStats::new();
        let config = PersistConfig::default().with_checksum_algorithm(ChecksumAlgorithm::Xxh64);
        write_snapshot::<_, Counter>(&mut store, &5, &config, &mut stats).unwrap();

        // Flip bit 1 off while leaving the algorithm tag (bits 2-3) untouched,
        // then repair the header checksum so only the flags disagreement remains.
        let (bytes, size) = store.peek();
        let mut corrupt = bytes[..size].to_vec();
        let flags = LittleEndian::read_u16(&corrupt[6..8]) & !0b10;
        LittleEndian::write_u16(&mut corrupt[6..8], flags);
        let header_checksum = ChecksumValue::compute(ChecksumAlgorithm::Xxh64, &corrupt[..HEADER_CHECKSUM_COVERAGE]);
        corrupt[28..36].copy_from_slice(header_checksum.bytes());
        let mut corrupt_store = MemoryStore::from_bytes(corrupt);

        let err = read_snapshot::<_, Counter>(&mut corrupt_store, &config).unwrap_err();
        assert!(matches!(err, Error::CorruptHeader(_)));
    }
}
