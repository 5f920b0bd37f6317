//! Persistence engine configuration.

use persistkit_core::ChecksumAlgorithm;

/// When the WAL calls `store.sync()` after logging an entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SyncMode {
    /// Flush and sync after every entry.
    Always,
    /// Flush and sync once more than a second has elapsed since the last sync.
    EverySec,
    /// Never sync implicitly; `close()` still flushes.
    None,
}

/// Compression kind for snapshot/WAL bodies. Only `None` is implemented --
/// the field exists so a future body-compression layer has somewhere to
/// plug in without a wire-format break, the same placeholder role it plays
/// upstream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum CompressionKind {
    /// No compression.
    #[default]
    None,
}

/// An error from [`PersistConfig::validate`].
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// `compact_ratio` must be a finite value greater than 1.0.
    #[error("compact_ratio must be > 1.0, got {0}")]
    InvalidCompactRatio(f64),
    /// `wal_max_size` must be nonzero.
    #[error("wal_max_size must be > 0")]
    ZeroWalMaxSize,
    /// `wal_buffer_size` must be nonzero.
    #[error("wal_buffer_size must be > 0")]
    ZeroWalBufferSize,
}

/// Persistence engine configuration: checksum algorithm, durability
/// tradeoffs, and compaction thresholds.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PersistConfig {
    compression: CompressionKind,
    checksum_algorithm: ChecksumAlgorithm,
    sync_mode: SyncMode,
    wal_max_size: u64,
    wal_buffer_size: usize,
    auto_compact: bool,
    compact_ratio: f64,
    strict_recovery: bool,
    wal_segment_size: Option<u64>,
}

impl Default for PersistConfig {
    fn default() -> Self {
        PersistConfig {
            compression: CompressionKind::None,
            checksum_algorithm: ChecksumAlgorithm::Xxh64,
            sync_mode: SyncMode::EverySec,
            wal_max_size: 64 * 1024 * 1024,
            wal_buffer_size: 64 * 1024,
            auto_compact: true,
            compact_ratio: 2.0,
            strict_recovery: false,
            wal_segment_size: None,
        }
    }
}

impl PersistConfig {
    /// A configuration tuned for fast, deterministic tests: tiny WAL
    /// thresholds so compaction and rotation logic exercise in a handful of
    /// operations, and strict recovery so corruption bugs surface loudly.
    pub fn for_testing() -> Self {
        PersistConfig {
            wal_max_size: 4096,
            wal_buffer_size: 256,
            compact_ratio: 1.5,
            strict_recovery: true,
            sync_mode: SyncMode::Always,
            ..PersistConfig::default()
        }
    }

    /// Set the checksum algorithm used for snapshot bodies and WAL entries.
    pub fn with_checksum_algorithm(mut self, algorithm: ChecksumAlgorithm) -> Self {
        self.checksum_algorithm = algorithm;
        self
    }

    /// Set the WAL sync policy.
    pub fn with_sync_mode(mut self, mode: SyncMode) -> Self {
        self.sync_mode = mode;
        self
    }

    /// Set the WAL size threshold that triggers auto-compaction.
    pub fn with_wal_max_size(mut self, bytes: u64) -> Self {
        self.wal_max_size = bytes;
        self
    }

    /// Set the WAL write-buffer size (bytes buffered before a flush).
    pub fn with_wal_buffer_size(mut self, bytes: usize) -> Self {
        self.wal_buffer_size = bytes;
        self
    }

    /// Enable or disable automatic compaction.
    pub fn with_auto_compact(mut self, enabled: bool) -> Self {
        self.auto_compact = enabled;
        self
    }

    /// Set the WAL-to-snapshot size ratio that triggers auto-compaction.
    pub fn with_compact_ratio(mut self, ratio: f64) -> Self {
        self.compact_ratio = ratio;
        self
    }

    /// Enable or disable strict recovery (abort vs skip on WAL corruption).
    pub fn with_strict_recovery(mut self, strict: bool) -> Self {
        self.strict_recovery = strict;
        self
    }

    /// Enable segment rotation: the WAL rotates to a fresh segment once the
    /// active one exceeds `bytes`. `None` (the default) keeps a single,
    /// unboundedly growing WAL file, matching the literal wire format.
    pub fn with_wal_segment_size(mut self, bytes: Option<u64>) -> Self {
        self.wal_segment_size = bytes;
        self
    }

    /// Validate the configuration, returning the first violation found.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.wal_max_size == 0 {
            return Err(ConfigError::ZeroWalMaxSize);
        }
        if self.wal_buffer_size == 0 {
            return Err(ConfigError::ZeroWalBufferSize);
        }
        if !(self.compact_ratio > 1.0) {
            return Err(ConfigError::InvalidCompactRatio(self.compact_ratio));
        }
        Ok(())
    }

    /// The configured checksum algorithm.
    pub fn checksum_algorithm(&self) -> ChecksumAlgorithm {
        self.checksum_algorithm
    }

    /// The configured sync policy.
    pub fn sync_mode(&self) -> SyncMode {
        self.sync_mode
    }

    /// The WAL size threshold that triggers auto-compaction.
    pub fn wal_max_size(&self) -> u64 {
        self.wal_max_size
    }

    /// The WAL write-buffer size.
    pub fn wal_buffer_size(&self) -> usize {
        self.wal_buffer_size
    }

    /// Whether automatic compaction is enabled.
    pub fn auto_compact(&self) -> bool {
        self.auto_compact
    }

    /// The WAL-to-snapshot size ratio that triggers auto-compaction.
    pub fn compact_ratio(&self) -> f64 {
        self.compact_ratio
    }

    /// Whether recovery aborts (`true`) or skips (`false`) on WAL corruption.
    pub fn strict_recovery(&self) -> bool {
        self.strict_recovery
    }

    /// The optional WAL segment rotation threshold.
    pub fn wal_segment_size(&self) -> Option<u64> {
        self.wal_segment_size
    }

    /// The (currently always-`None`) body compression kind.
    pub fn compression(&self) -> CompressionKind {
        self.compression
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_values() {
        let c = PersistConfig::default();
        assert_eq!(c.wal_max_size(), 64 * 1024 * 1024);
        assert_eq!(c.wal_buffer_size(), 64 * 1024);
        assert!(c.auto_compact());
        assert_eq!(c.compact_ratio(), 2.0);
        assert!(!c.strict_recovery());
        assert_eq!(c.compression(), CompressionKind::None);
    }

    #[test]
    fn builder_chains_overrides() {
        let c = PersistConfig::default()
            .with_checksum_algorithm(ChecksumAlgorithm::Crc32)
            .with_sync_mode(SyncMode::Always)
            .with_strict_recovery(true);
        assert_eq!(c.checksum_algorithm(), ChecksumAlgorithm::Crc32);
        assert_eq!(c.sync_mode(), SyncMode::Always);
        assert!(c.strict_recovery());
    }

    #[test]
    fn validate_rejects_zero_thresholds_and_bad_ratio() {
        assert!(PersistConfig::default().with_wal_max_size(0).validate().is_err());
        assert!(PersistConfig::default().with_wal_buffer_size(0).validate().is_err());
        assert!(PersistConfig::default().with_compact_ratio(1.0).validate().is_err());
        assert!(PersistConfig::default().validate().is_ok());
    }

    #[test]
    fn for_testing_has_small_thresholds() {
        let c = PersistConfig::for_testing();
        assert!(c.wal_max_size() < PersistConfig::default().wal_max_size());
        assert!(c.strict_recovery());
    }
}
