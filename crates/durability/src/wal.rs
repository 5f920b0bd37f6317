//! Write-ahead log engine: append-only, checksummed operation journal used
//! to recover the entries written since the last snapshot.
//!
//! ```text
//! header (24 bytes)
//!   magic            u32 LE   0x4C574B44 ("LWKD")
//!   version          u16 LE   1
//!   flags            u16 LE   reserved, always 0
//!   structType       u32 LE   StructureOps::STRUCT_TYPE_ID
//!   startSequence    u64 LE   first sequence number this log covers
//!   headerChecksum   u32 LE   CRC32 of the first 20 header bytes
//!
//! entry (repeated)
//!   entryLen         u32 LE   bytes following this field (13 + payload.len())
//!   sequence         u64 LE
//!   op               u8
//!   payload          entryLen - 13 bytes
//!   entryChecksum    u32 LE   CRC32 of sequence|op|payload
//! ```
//!
//! The header is written lazily, on the first logged entry -- an engine
//! that never logs anything never creates a WAL file. Entries accumulate in
//! an in-memory buffer and flush to the store once it reaches the
//! configured buffer size; [`WalWriter::close`] always flushes regardless.

use crate::config::SyncMode;
use crate::registry::StructureOps;
use crate::stats::PersistStats;
use crate::store::Store;
use byteorder::{ByteOrder, LittleEndian};
use persistkit_core::{ChecksumAlgorithm, ChecksumValue, Error, Operation, Result};
use std::time::{SystemTime, UNIX_EPOCH};

const MAGIC: u32 = 0x4C574B44;
const VERSION: u16 = 1;
const HEADER_LEN: usize = 24;
const HEADER_CHECKSUM_COVERAGE: usize = 20;
const MIN_ENTRY_LEN: u32 = 13;
const MAX_ENTRY_LEN: u32 = 100_000_000;
const SYNC_INTERVAL_MICROS: u64 = 1_000_000;

fn now_micros() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_micros() as u64)
        .unwrap_or(0)
}

fn encode_header(struct_type: u32, start_sequence: u64) -> [u8; HEADER_LEN] {
    let mut header = [0u8; HEADER_LEN];
    LittleEndian::write_u32(&mut header[0..4], MAGIC);
    LittleEndian::write_u16(&mut header[4..6], VERSION);
    LittleEndian::write_u16(&mut header[6..8], 0);
    LittleEndian::write_u32(&mut header[8..12], struct_type);
    LittleEndian::write_u64(&mut header[12..20], start_sequence);
    let checksum = ChecksumValue::compute(ChecksumAlgorithm::Crc32, &header[..HEADER_CHECKSUM_COVERAGE]);
    header[20..24].copy_from_slice(checksum.bytes());
    header
}

fn encode_entry(sequence: u64, op: Operation, payload: &[u8]) -> Vec<u8> {
    let mut body = Vec::with_capacity(9 + payload.len());
    body.extend_from_slice(&sequence.to_le_bytes());
    body.push(op.to_u8());
    body.extend_from_slice(payload);
    let checksum = ChecksumValue::compute(ChecksumAlgorithm::Crc32, &body);

    let entry_len = (body.len() + checksum.len()) as u32;
    let mut out = Vec::with_capacity(4 + entry_len as usize);
    out.extend_from_slice(&entry_len.to_le_bytes());
    out.extend_from_slice(&body);
    out.extend_from_slice(checksum.bytes());
    out
}

/// Append-only writer side of the WAL engine.
pub struct WalWriter {
    struct_type: u32,
    sync_mode: SyncMode,
    buffer_capacity: usize,
    header_written: bool,
    next_sequence: u64,
    buffer: Vec<u8>,
    last_sync_micros: u64,
}

impl WalWriter {
    /// A writer for a brand-new WAL: the header has not been written yet
    /// and will be lazily written on the first logged entry.
    pub fn new(struct_type: u32, start_sequence: u64, sync_mode: SyncMode, buffer_capacity: usize) -> WalWriter {
        WalWriter {
            struct_type,
            sync_mode,
            buffer_capacity,
            header_written: false,
            next_sequence: start_sequence,
            buffer: Vec::new(),
            last_sync_micros: now_micros(),
        }
    }

    /// A writer resuming an already-headered WAL (recovery, or reopening a
    /// live context), continuing sequence numbers from `next_sequence`.
    pub fn resume(struct_type: u32, next_sequence: u64, sync_mode: SyncMode, buffer_capacity: usize) -> WalWriter {
        WalWriter {
            header_written: true,
            ..WalWriter::new(struct_type, next_sequence, sync_mode, buffer_capacity)
        }
    }

    /// The sequence number the next logged entry will receive.
    pub fn next_sequence(&self) -> u64 {
        self.next_sequence
    }

    /// Write the header now if it hasn't been written yet. Normally lazy
    /// (triggered by the first [`Self::log_op`]); [`crate::recovery::compact`]
    /// calls this directly so a freshly truncated WAL always carries a
    /// header recording `next_sequence`, even before anything is logged to it.
    pub(crate) fn ensure_header<S: Store>(&mut self, store: &mut S) -> Result<()> {
        if self.header_written {
            return Ok(());
        }
        let header = encode_header(self.struct_type, self.next_sequence);
        store.seek(0)?;
        store.write(&header)?;
        self.header_written = true;
        Ok(())
    }

    /// Log one operation, returning its assigned sequence number.
    pub fn log_op<S: Store>(
        &mut self,
        store: &mut S,
        op: Operation,
        payload: &[u8],
        stats: &mut PersistStats,
    ) -> Result<u64> {
        self.ensure_header(store)?;
        let sequence = self.next_sequence;
        self.next_sequence += 1;
        let entry = encode_entry(sequence, op, payload);
        self.buffer.extend_from_slice(&entry);
        stats.record_wal_entry();

        if self.buffer.len() >= self.buffer_capacity {
            self.flush(store)?;
        }
        self.maybe_sync(store, stats)?;
        Ok(sequence)
    }

    /// Flush the in-memory write buffer to `store` without syncing it.
    pub fn flush<S: Store>(&mut self, store: &mut S) -> Result<()> {
        if self.buffer.is_empty() {
            return Ok(());
        }
        store.write(&self.buffer)?;
        self.buffer.clear();
        Ok(())
    }

    fn maybe_sync<S: Store>(&mut self, store: &mut S, stats: &mut PersistStats) -> Result<()> {
        let should_sync = match self.sync_mode {
            SyncMode::Always => true,
            SyncMode::EverySec => now_micros().saturating_sub(self.last_sync_micros) > SYNC_INTERVAL_MICROS,
            SyncMode::None => false,
        };
        if should_sync {
            self.flush(store)?;
            store.sync()?;
            stats.record_wal_sync();
            self.last_sync_micros = now_micros();
            tracing::debug!(target: "persistkit::wal", "synced");
        }
        Ok(())
    }

    /// Flush and sync unconditionally, then release the store.
    pub fn close<S: Store>(&mut self, store: &mut S) -> Result<()> {
        self.flush(store)?;
        store.sync()?;
        store.close()
    }
}

/// Outcome of replaying a WAL against a structure's initial state.
pub struct ReplayOutcome<T> {
    /// Structure state after applying every entry that validated.
    pub structure: T,
    /// First unused sequence number after replay -- feeds a resumed [`WalWriter`].
    pub next_sequence: u64,
}

/// Replay every entry in `store` against `initial`, returning the resulting
/// structure and the next free sequence number.
///
/// In strict mode, the first corrupt entry aborts replay with an error. In
/// lenient mode, a corrupt entry is skipped (incrementing
/// `stats.entries_skipped`) and replay stops there, since a corrupt
/// `entryLen` makes it impossible to locate the next entry reliably. A
/// `store` with no header at all (an engine that never logged anything) is
/// not an error: replay is a no-op.
pub fn replay<S, T>(
    store: &mut S,
    initial: T::Structure,
    strict: bool,
    stats: &mut PersistStats,
) -> Result<ReplayOutcome<T::Structure>>
where
    S: Store,
    T: StructureOps,
{
    let size = store.size()?;
    if size == 0 {
        return Ok(ReplayOutcome {
            structure: initial,
            next_sequence: 0,
        });
    }

    store.seek(0)?;
    let mut header = [0u8; HEADER_LEN];
    store.read(&mut header)?;
    let magic = LittleEndian::read_u32(&header[0..4]);
    if magic != MAGIC {
        return Err(Error::CorruptHeader(format!(
            "wal magic mismatch: expected {MAGIC:#x}, found {magic:#x}"
        )));
    }
    let version = LittleEndian::read_u16(&header[4..6]);
    if version != VERSION {
        return Err(Error::UnsupportedVersion(version as u32));
    }
    let struct_type = LittleEndian::read_u32(&header[8..12]);
    if struct_type != T::STRUCT_TYPE_ID {
        return Err(Error::TypeMismatch {
            expected: T::STRUCT_TYPE_ID,
            found: struct_type,
        });
    }
    let start_sequence = LittleEndian::read_u64(&header[12..20]);
    let expected_header_checksum = ChecksumValue::compute(ChecksumAlgorithm::Crc32, &header[..HEADER_CHECKSUM_COVERAGE]);
    if header[20..24] != *expected_header_checksum.bytes() {
        return Err(Error::CorruptHeader("wal header checksum mismatch".to_string()));
    }

    let mut structure = initial;
    let mut next_sequence = start_sequence;

    loop {
        let pos = store.tell()?;
        if pos >= size {
            break;
        }
        let mut len_buf = [0u8; 4];
        store.read(&mut len_buf)?;
        let entry_len = LittleEndian::read_u32(&len_buf);

        if !(MIN_ENTRY_LEN..=MAX_ENTRY_LEN).contains(&entry_len) {
            if strict {
                return Err(Error::CorruptEntry(format!(
                    "wal entry length {entry_len} out of bounds [{MIN_ENTRY_LEN}, {MAX_ENTRY_LEN}]"
                )));
            }
            tracing::warn!(target: "persistkit::wal", entry_len, "corrupt entry length, stopping replay");
            stats.record_skipped_entry();
            break;
        }
        if pos + 4 + entry_len as u64 > size {
            // Truncated tail entry -- the writer crashed mid-append. Not an
            // error in either mode: this is the normal shape of a torn write.
            break;
        }

        let mut body = vec![0u8; entry_len as usize];
        store.read(&mut body)?;
        let (entry_body, checksum_bytes) = body.split_at(body.len() - 4);
        let expected = ChecksumValue::compute(ChecksumAlgorithm::Crc32, entry_body);
        if checksum_bytes != expected.bytes() {
            if strict {
                return Err(Error::ChecksumMismatch {
                    expected: hex_string(checksum_bytes),
                    computed: hex_string(expected.bytes()),
                });
            }
            tracing::warn!(target: "persistkit::wal", sequence_hint = pos, "wal entry checksum mismatch, skipping rest of log");
            stats.record_skipped_entry();
            break;
        }

        let sequence = LittleEndian::read_u64(&entry_body[0..8]);
        let op = Operation::from_u8(entry_body[8])?;
        let payload = &entry_body[9..];
        structure = T::apply_op(structure, op, payload)?;
        next_sequence = next_sequence.max(sequence + 1);
        stats.record_recovered_entry();
    }

    Ok(ReplayOutcome { structure, next_sequence })
}

fn hex_string(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;

    struct OrderedI64;

    impl StructureOps for OrderedI64 {
        type Structure = Vec<i64>;
        type OpArgs = i64;
        const STRUCT_TYPE_ID: u32 = 0xC0DE_0003;

        fn snapshot(structure: &Vec<i64>) -> Result<Vec<u8>> {
            let mut out = Vec::with_capacity(structure.len() * 8);
            for v in structure {
                out.extend_from_slice(&v.to_le_bytes());
            }
            Ok(out)
        }
        fn restore(bytes: &[u8]) -> Result<Vec<i64>> {
            Ok(bytes.chunks_exact(8).map(|c| i64::from_le_bytes(c.try_into().unwrap())).collect())
        }
        fn count(structure: &Vec<i64>) -> u64 {
            structure.len() as u64
        }
        fn estimate_size(structure: &Vec<i64>) -> u64 {
            structure.len() as u64 * 8
        }
        fn encode_op(_op: Operation, args: &i64) -> Result<Vec<u8>> {
            Ok(args.to_le_bytes().to_vec())
        }
        fn apply_op(mut structure: Vec<i64>, op: Operation, payload: &[u8]) -> Result<Vec<i64>> {
            let v = i64::from_le_bytes(payload.try_into().unwrap());
            match op {
                Operation::PushTail => structure.push(v),
                Operation::PushHead => structure.insert(0, v),
                _ => {}
            }
            Ok(structure)
        }
    }

    #[test]
    fn scenario_s6_interleaved_push_head_and_tail_replay() {
        let mut store = MemoryStore::new();
        let mut stats = PersistStats::new();
        let mut writer = WalWriter::new(OrderedI64::STRUCT_TYPE_ID, 0, SyncMode::Always, 4096);

        for (op, v) in [(Operation::PushTail, 100i64), (Operation::PushTail, 200), (Operation::PushHead, -50)] {
            let payload = OrderedI64::encode_op(op, &v).unwrap();
            writer.log_op(&mut store, op, &payload, &mut stats).unwrap();
        }
        writer.close(&mut store).unwrap();

        let outcome = replay::<_, OrderedI64>(&mut store, Vec::new(), true, &mut stats).unwrap();
        assert_eq!(outcome.structure, vec![-50, 100, 200]);
        assert_eq!(outcome.next_sequence, 3);
        assert_eq!(stats.wal_entries, 3);
        assert_eq!(stats.entries_recovered, 3);
    }

    #[test]
    fn empty_store_replays_as_no_op() {
        let mut store = MemoryStore::new();
        let mut stats = PersistStats::new();
        let outcome = replay::<_, OrderedI64>(&mut store, vec![1], true, &mut stats).unwrap();
        assert_eq!(outcome.structure, vec![1]);
        assert_eq!(outcome.next_sequence, 0);
    }

    #[test]
    fn lenient_replay_skips_corrupt_entry_and_stops() {
        let mut store = MemoryStore::new();
        let mut stats = PersistStats::new();
        let mut writer = WalWriter::new(OrderedI64::STRUCT_TYPE_ID, 0, SyncMode::Always, 4096);
        let first = OrderedI64::encode_op(Operation::PushTail, &10).unwrap();
        writer.log_op(&mut store, Operation::PushTail, &first, &mut stats).unwrap();
        let second = OrderedI64::encode_op(Operation::PushTail, &20).unwrap();
        writer.log_op(&mut store, Operation::PushTail, &second, &mut stats).unwrap();
        writer.close(&mut store).unwrap();

        // Corrupt the second entry's checksum; the first entry must still apply.
        let (bytes, size) = store.peek();
        let mut corrupt = bytes[..size].to_vec();
        let last = corrupt.len() - 1;
        corrupt[last] ^= 0xFF;
        let mut corrupt_store = MemoryStore::from_bytes(corrupt);

        let mut lenient_stats = PersistStats::new();
        let outcome = replay::<_, OrderedI64>(&mut corrupt_store, Vec::new(), false, &mut lenient_stats).unwrap();
        assert_eq!(outcome.structure, vec![10]);
        assert_eq!(lenient_stats.entries_recovered, 1);
        assert_eq!(lenient_stats.entries_skipped, 1);
    }

    #[test]
    fn strict_replay_errors_on_corrupt_entry() {
        let mut store = MemoryStore::new();
        let mut stats = PersistStats::new();
        let mut writer = WalWriter::new(OrderedI64::STRUCT_TYPE_ID, 0, SyncMode::Always, 4096);
        let payload = OrderedI64::encode_op(Operation::PushTail, &10).unwrap();
        writer.log_op(&mut store, Operation::PushTail, &payload, &mut stats).unwrap();
        writer.close(&mut store).unwrap();

        let (bytes, size) = store.peek();
        let mut corrupt = bytes[..size].to_vec();
        let last = corrupt.len() - 1;
        corrupt[last] ^= 0xFF;
        let mut corrupt_store = MemoryStore::from_bytes(corrupt);

        let mut strict_stats = PersistStats::new();
        assert!(replay::<_, OrderedI64>(&mut corrupt_store, Vec::new(), true, &mut strict_stats).is_err());
    }

    #[test]
    fn writer_never_logging_never_creates_a_header() {
        let mut store = MemoryStore::new();
        let mut writer = WalWriter::new(OrderedI64::STRUCT_TYPE_ID, 0, SyncMode::Always, 4096);
        writer.close(&mut store).unwrap();
        assert_eq!(store.size().unwrap(), 0);
    }
}
