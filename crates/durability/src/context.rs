//! `PersistContext`: the lifecycle object a caller actually holds. Bundles
//! a structure's registered operations, its configuration, its attached
//! stores, and the running WAL writer and statistics.

use crate::config::PersistConfig;
use crate::recovery;
use crate::registry::StructureOps;
use crate::stats::PersistStats;
use crate::store::Store;
use crate::wal::WalWriter;
use persistkit_core::{Error, Operation, Result};
use std::marker::PhantomData;

/// Owns a structure's attached stores and persistence machinery.
///
/// Created with [`PersistContext::new`], then optionally [`PersistContext::attach_snapshot_store`]
/// and/or [`PersistContext::attach_wal_store`] before [`PersistContext::recover`].
/// Operations logged via [`PersistContext::log_op`] require a WAL store to
/// have been attached and recovery to have run at least once (which is what
/// lazily starts the WAL writer's sequence numbering); calling it before
/// that returns [`persistkit_core::Error::NotConfigured`].
pub struct PersistContext<T, SnapStore, WalStore>
where
    T: StructureOps,
    SnapStore: Store,
    WalStore: Store,
{
    config: PersistConfig,
    snapshot_store: Option<SnapStore>,
    wal_store: Option<WalStore>,
    wal_writer: Option<WalWriter>,
    stats: PersistStats,
    _structure: PhantomData<T>,
}

impl<T, SnapStore, WalStore> PersistContext<T, SnapStore, WalStore>
where
    T: StructureOps,
    SnapStore: Store,
    WalStore: Store,
{
    /// A fresh context with no stores attached, using `config`.
    pub fn new(config: PersistConfig) -> PersistContext<T, SnapStore, WalStore> {
        PersistContext {
            config,
            snapshot_store: None,
            wal_store: None,
            wal_writer: None,
            stats: PersistStats::new(),
            _structure: PhantomData,
        }
    }

    /// Attach a snapshot-backing store. Replaces any previously attached one.
    pub fn attach_snapshot_store(&mut self, store: SnapStore) {
        self.snapshot_store = Some(store);
    }

    /// Attach a WAL-backing store. Replaces any previously attached one.
    pub fn attach_wal_store(&mut self, store: WalStore) {
        self.wal_store = Some(store);
    }

    /// Restore `empty` (or the last snapshot, if attached) and replay the
    /// attached WAL on top of it, starting the WAL writer at the resulting
    /// sequence number. Requires a WAL store to be attached; the snapshot
    /// store is optional.
    pub fn recover(&mut self, empty: T::Structure) -> Result<T::Structure> {
        let wal_store = self.wal_store.as_mut().ok_or(Error::NotConfigured("wal store not attached"))?;
        let (structure, next_sequence) =
            recovery::recover::<SnapStore, WalStore, T>(self.snapshot_store.as_mut(), wal_store, empty, &self.config, &mut self.stats)?;
        self.wal_writer = Some(WalWriter::resume(
            T::STRUCT_TYPE_ID,
            next_sequence,
            self.config.sync_mode(),
            self.config.wal_buffer_size(),
        ));
        Ok(structure)
    }

    /// Log one operation to the WAL. Requires [`Self::recover`] to have run
    /// at least once (it establishes the writer's starting sequence number).
    pub fn log_op(&mut self, op: Operation, args: &T::OpArgs) -> Result<u64> {
        let wal_store = self.wal_store.as_mut().ok_or(Error::NotConfigured("wal store not attached"))?;
        let writer = self.wal_writer.as_mut().ok_or(Error::NotConfigured("call recover() before logging operations"))?;
        let payload = T::encode_op(op, args)?;
        writer.log_op(wal_store, op, &payload, &mut self.stats)
    }

    /// Write a snapshot of `structure` immediately, regardless of
    /// compaction thresholds. Requires a snapshot store to be attached.
    pub fn snapshot_now(&mut self, structure: &T::Structure) -> Result<()> {
        let snapshot_store = self.snapshot_store.as_mut().ok_or(Error::NotConfigured("snapshot store not attached"))?;
        crate::snapshot::write_snapshot::<SnapStore, T>(snapshot_store, structure, &self.config, &mut self.stats)
    }

    /// Compact if the configured thresholds say it's due: snapshot
    /// `structure`, truncate the WAL, and restart the writer. Returns
    /// whether a compaction actually ran.
    pub fn maybe_compact(&mut self, structure: &T::Structure) -> Result<bool> {
        let (Some(snapshot_store), Some(wal_store), Some(writer)) =
            (self.snapshot_store.as_mut(), self.wal_store.as_mut(), self.wal_writer.as_ref())
        else {
            return Ok(false);
        };
        let wal_size = wal_store.size()?;
        let snapshot_size = snapshot_store.size()?;
        if !recovery::should_compact(&self.config, wal_size, snapshot_size) {
            return Ok(false);
        }
        let next_sequence = writer.next_sequence();
        let new_writer = recovery::compact::<SnapStore, WalStore, T>(
            snapshot_store,
            wal_store,
            structure,
            next_sequence,
            &self.config,
            &mut self.stats,
        )?;
        self.wal_writer = Some(new_writer);
        Ok(true)
    }

    /// Flush and sync both attached stores, then release them. Further
    /// operations after `close` require attaching fresh stores.
    pub fn close(&mut self) -> Result<()> {
        if let (Some(writer), Some(wal_store)) = (self.wal_writer.as_mut(), self.wal_store.as_mut()) {
            writer.close(wal_store)?;
        }
        if let Some(snapshot_store) = self.snapshot_store.as_mut() {
            snapshot_store.sync()?;
            snapshot_store.close()?;
        }
        Ok(())
    }

    /// Running counters for this context's lifetime.
    pub fn stats(&self) -> &PersistStats {
        &self.stats
    }

    /// The configuration this context was created with.
    pub fn config(&self) -> &PersistConfig {
        &self.config
    }
}
