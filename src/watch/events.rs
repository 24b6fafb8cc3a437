//! Sync events, batching, and watch configuration.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant, SystemTime};

/// Watch mode configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WatchConfig {
    /// Quiet period after the last event before a batch is processed
    pub debounce_ms: u64,
    /// Longest a batch may stay open after its first event
    pub batch_window_ms: u64,
    /// Maximum events per batch
    pub max_batch_size: usize,
    /// Cache file name suffixes that never count as saves (editor swap files)
    pub ignore_suffixes: Vec<String>,
    /// Close tabs and delete the cache when the daemon stops
    pub purge_on_exit: bool,
}

impl Default for WatchConfig {
    fn default() -> Self {
        Self {
            debounce_ms: 50,
            batch_window_ms: 250,
            max_batch_size: 100,
            ignore_suffixes: vec![
                ".swp".to_string(),
                ".swx".to_string(),
                ".tmp".to_string(),
                "~".to_string(),
            ],
            purge_on_exit: true,
        }
    }
}

/// Work item for the sync loop
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncEvent {
    /// The container file was modified on disk
    ContainerChanged,
    /// A cache file was written
    CacheSaved { path: PathBuf, mtime: SystemTime },
    Shutdown,
}

/// Groups events that arrive close together.
///
/// Container changes collapse into one; saves collapse per path keeping the
/// newest modification time. A batch always yields the container change first
/// so saves are judged against the freshest snapshot.
pub(crate) struct EventBatcher {
    config: WatchConfig,
    container_changed: bool,
    saves: BTreeMap<PathBuf, SystemTime>,
    opened_at: Option<Instant>,
    last_event_at: Option<Instant>,
}

impl EventBatcher {
    pub(crate) fn new(config: WatchConfig) -> Self {
        Self {
            config,
            container_changed: false,
            saves: BTreeMap::new(),
            opened_at: None,
            last_event_at: None,
        }
    }

    /// Queue an event. Returns true when the batch is full and should be taken now.
    pub(crate) fn add_event(&mut self, event: SyncEvent, now: Instant) -> bool {
        match event {
            SyncEvent::ContainerChanged => self.container_changed = true,
            SyncEvent::CacheSaved { path, mtime } => {
                if self.should_ignore(&path) {
                    return false;
                }
                let entry = self.saves.entry(path).or_insert(mtime);
                if mtime > *entry {
                    *entry = mtime;
                }
            }
            SyncEvent::Shutdown => return false,
        }
        self.opened_at.get_or_insert(now);
        self.last_event_at = Some(now);
        self.len() >= self.config.max_batch_size
    }

    pub(crate) fn is_empty(&self) -> bool {
        !self.container_changed && self.saves.is_empty()
    }

    pub(crate) fn len(&self) -> usize {
        usize::from(self.container_changed) + self.saves.len()
    }

    /// When the pending batch becomes due, if anything is pending.
    pub(crate) fn deadline(&self) -> Option<Instant> {
        let opened = self.opened_at?;
        let last = self.last_event_at.unwrap_or(opened);
        let quiet = last + Duration::from_millis(self.config.debounce_ms);
        let window = opened + Duration::from_millis(self.config.batch_window_ms);
        Some(quiet.min(window))
    }

    pub(crate) fn take_batch(&mut self) -> Vec<SyncEvent> {
        let mut events = Vec::with_capacity(self.len());
        if std::mem::take(&mut self.container_changed) {
            events.push(SyncEvent::ContainerChanged);
        }
        events.extend(
            std::mem::take(&mut self.saves)
                .into_iter()
                .map(|(path, mtime)| SyncEvent::CacheSaved { path, mtime }),
        );
        self.opened_at = None;
        self.last_event_at = None;
        events
    }

    fn should_ignore(&self, path: &Path) -> bool {
        let Some(name) = path.file_name().map(|n| n.to_string_lossy()) else {
            return true;
        };
        self.config
            .ignore_suffixes
            .iter()
            .any(|suffix| name.ends_with(suffix.as_str()))
    }
}
