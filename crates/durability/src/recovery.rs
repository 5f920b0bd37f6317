//! Recovery and compaction orchestration: combining the snapshot and WAL
//! engines into the two higher-level operations a [`crate::context::PersistContext`]
//! actually performs.
//!
//! Recovery: restore the last snapshot if one exists, then replay every WAL
//! entry logged since. Compaction: snapshot the current in-memory state,
//! then truncate the WAL and re-head it at the current sequence number, so
//! the next recovery has nothing to replay.

use crate::config::PersistConfig;
use crate::registry::StructureOps;
use crate::snapshot;
use crate::stats::PersistStats;
use crate::store::Store;
use crate::wal::{self, WalWriter};
use persistkit_core::Result;
use std::time::{SystemTime, UNIX_EPOCH};

fn now_micros() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_micros() as u64)
        .unwrap_or(0)
}

/// Restore a structure's state: the last snapshot if `snapshot_store` holds
/// one, otherwise `empty`; then replay every WAL entry in `wal_store` on
/// top of it.
///
/// Returns the recovered structure and the next free WAL sequence number,
/// which the caller feeds to [`WalWriter::resume`].
pub fn recover<SnapStore, WalStore, T>(
    snapshot_store: Option<&mut SnapStore>,
    wal_store: &mut WalStore,
    empty: T::Structure,
    config: &PersistConfig,
    stats: &mut PersistStats,
) -> Result<(T::Structure, u64)>
where
    SnapStore: Store,
    WalStore: Store,
    T: StructureOps,
{
    let initial = match snapshot_store {
        Some(store) if store.size()? > 0 => {
            tracing::debug!(target: "persistkit::recovery", "restoring from snapshot");
            snapshot::read_snapshot::<SnapStore, T>(store, config)?
        }
        _ => empty,
    };

    tracing::debug!(target: "persistkit::recovery", "replaying wal");
    let outcome = wal::replay::<WalStore, T>(wal_store, initial, config.strict_recovery(), stats)?;
    tracing::info!(
        target: "persistkit::recovery",
        recovered = stats.entries_recovered,
        skipped = stats.entries_skipped,
        "recovery applied"
    );
    Ok((outcome.structure, outcome.next_sequence))
}

/// Whether the WAL has grown enough, relative to `config`, to justify a
/// compaction: either past its absolute size cap, or past `compact_ratio`
/// times the last snapshot's size.
pub fn should_compact(config: &PersistConfig, wal_size: u64, snapshot_size: u64) -> bool {
    if !config.auto_compact() {
        return false;
    }
    wal_size > config.wal_max_size() || (wal_size as f64) > config.compact_ratio() * (snapshot_size as f64).max(1.0)
}

/// Snapshot the current structure, then truncate the WAL and write a fresh
/// header carrying `next_sequence`, returning the [`WalWriter`] already
/// resumed against that header to replace the old one.
///
/// The WAL is never left at zero bytes after compaction: `next_sequence` is
/// only ever persisted in the WAL header's `startSequence` field (the
/// snapshot header carries `count`, not a sequence number), so a truncate
/// with no re-head would lose it across a restart -- the next recovery would
/// see an empty WAL and resume numbering from zero.
pub fn compact<SnapStore, WalStore, T>(
    snapshot_store: &mut SnapStore,
    wal_store: &mut WalStore,
    structure: &T::Structure,
    next_sequence: u64,
    config: &PersistConfig,
    stats: &mut PersistStats,
) -> Result<WalWriter>
where
    SnapStore: Store,
    WalStore: Store,
    T: StructureOps,
{
    snapshot::write_snapshot::<SnapStore, T>(snapshot_store, structure, config, stats)?;
    wal_store.seek(0)?;
    wal_store.truncate()?;
    let mut writer = WalWriter::new(T::STRUCT_TYPE_ID, next_sequence, config.sync_mode(), config.wal_buffer_size());
    writer.ensure_header(wal_store)?;
    wal_store.sync()?;
    stats.record_compaction(now_micros());
    tracing::info!(target: "persistkit::recovery", next_sequence, "compaction complete");
    Ok(writer)
}
