use std::path::PathBuf;
use std::time::Duration;

use crate::playback::BackendKind;

const DEFAULT_SNAP_DELAY_MS: u64 = 150;
const MAX_SNAP_DELAY_MS: u64 = 5_000;

/// Runtime settings read once from the environment at startup.
///
/// - `REELFEED_BACKEND`: `gtk` (default) or `mpv`
/// - `REELFEED_FEED`: path to a JSON feed file
/// - `REELFEED_SNAP_MS`: idle time before the feed snaps to the nearest reel
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    pub backend: BackendKind,
    pub feed_path: Option<PathBuf>,
    pub snap_delay: Duration,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            backend: BackendKind::default(),
            feed_path: None,
            snap_delay: Duration::from_millis(DEFAULT_SNAP_DELAY_MS),
        }
    }
}

impl Config {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(value) = lookup("REELFEED_BACKEND") {
            match BackendKind::from_name(&value) {
                Some(kind) => config.backend = kind,
                None => tracing::warn!(value = %value, "Unknown REELFEED_BACKEND, using default"),
            }
        }

        config.feed_path = lookup("REELFEED_FEED")
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
            .map(PathBuf::from);

        if let Some(ms) = lookup("REELFEED_SNAP_MS")
            .and_then(|v| v.trim().parse::<u64>().ok())
            .filter(|ms| *ms <= MAX_SNAP_DELAY_MS)
        {
            config.snap_delay = Duration::from_millis(ms);
        }

        config
    }
}
