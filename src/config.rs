use std::path::PathBuf;

/// Runtime settings, read from `POPSLOT_*` environment variables.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub data_dir: PathBuf,
    /// WAL appends after which the compactor rewrites the log.
    pub compact_threshold: u64,
    pub metrics_port: Option<u16>,
    /// Cache key prefix for per-store scrap counters.
    pub count_key_prefix: String,
    /// Lock name prefix for per-store scrap locks.
    pub lock_key_prefix: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("./data"),
            compact_threshold: 1000,
            metrics_port: None,
            count_key_prefix: "store:scrap:count:".into(),
            lock_key_prefix: "store:scrap:lock:".into(),
        }
    }
}

impl Settings {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build settings from an arbitrary key lookup; unset or unparsable keys keep their defaults.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        Self {
            data_dir: lookup("POPSLOT_DATA_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.data_dir),
            compact_threshold: lookup("POPSLOT_COMPACT_THRESHOLD")
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.compact_threshold),
            metrics_port: lookup("POPSLOT_METRICS_PORT").and_then(|s| s.parse().ok()),
            count_key_prefix: lookup("POPSLOT_COUNT_KEY_PREFIX").unwrap_or(defaults.count_key_prefix),
            lock_key_prefix: lookup("POPSLOT_LOCK_KEY_PREFIX").unwrap_or(defaults.lock_key_prefix),
        }
    }

    pub fn wal_path(&self) -> PathBuf {
        self.data_dir.join("popslot.wal")
    }
}
