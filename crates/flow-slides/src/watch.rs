//! Debounced change notifications for the active presentation file.
use std::path::{Path, PathBuf};
use std::sync::mpsc::Sender;
use std::time::{Duration, Instant};

use notify_debouncer_mini::notify::{RecommendedWatcher, RecursiveMode};
use notify_debouncer_mini::{DebounceEventResult, Debouncer, new_debouncer};
use tracing::{debug, info, warn};

use crate::error::{Result, SlideError};

/// Minimum spacing between two notifications.
pub const DEBOUNCE_INTERVAL: Duration = Duration::from_millis(100);

/// Decides which raw events become notifications: only the target file, and
/// at most one per interval.
#[derive(Debug, Clone)]
pub struct ChangeFilter {
    target: PathBuf,
    interval: Duration,
    last_fired: Option<Instant>,
}

impl ChangeFilter {
    pub fn new(target: PathBuf, interval: Duration) -> Self {
        Self {
            target,
            interval,
            last_fired: None,
        }
    }

    pub fn target(&self) -> &Path {
        &self.target
    }

    pub fn accept(&mut self, path: &Path, now: Instant) -> bool {
        if path.is_dir() {
            return false;
        }
        let path = path.canonicalize().unwrap_or_else(|_| path.to_path_buf());
        if path != self.target {
            return false;
        }
        if let Some(last) = self.last_fired {
            if now.saturating_duration_since(last) < self.interval {
                return false;
            }
        }
        self.last_fired = Some(now);
        true
    }
}

/// Watches one file at a time and sends its canonical path on every change.
pub struct FileWatch {
    debouncer: Option<Debouncer<RecommendedWatcher>>,
    target: Option<PathBuf>,
    notify: Sender<PathBuf>,
}

impl FileWatch {
    pub fn new(notify: Sender<PathBuf>) -> Self {
        Self {
            debouncer: None,
            target: None,
            notify,
        }
    }

    /// Start watching `path`, replacing any previous watch.
    ///
    /// The parent directory is watched rather than the file so saves that
    /// replace the file through a rename are still seen.
    pub fn watch(&mut self, path: &Path) -> Result<()> {
        self.unwatch();

        let target = path
            .canonicalize()
            .map_err(|_| SlideError::MissingInput(path.to_path_buf()))?;
        let dir = target
            .parent()
            .ok_or_else(|| SlideError::MissingInput(target.clone()))?
            .to_path_buf();

        let mut filter = ChangeFilter::new(target.clone(), DEBOUNCE_INTERVAL);
        let tx = self.notify.clone();
        let mut debouncer = new_debouncer(DEBOUNCE_INTERVAL, move |res: DebounceEventResult| {
            match res {
                Ok(events) => {
                    let now = Instant::now();
                    for event in events {
                        if filter.accept(&event.path, now) {
                            debug!(path = %event.path.display(), "presentation changed");
                            let _ = tx.send(filter.target().to_path_buf());
                        }
                    }
                }
                Err(err) => warn!("file watch error: {err}"),
            }
        })?;
        debouncer
            .watcher()
            .watch(&dir, RecursiveMode::NonRecursive)?;

        info!(path = %target.display(), "watching presentation");
        self.debouncer = Some(debouncer);
        self.target = Some(target);
        Ok(())
    }

    pub fn unwatch(&mut self) {
        if self.debouncer.take().is_some() {
            debug!(path = ?self.target, "stopped watching");
        }
        self.target = None;
    }

    pub fn target(&self) -> Option<&Path> {
        self.target.as_deref()
    }

    pub fn is_watching(&self) -> bool {
        self.debouncer.is_some()
    }
}

impl Drop for FileWatch {
    fn drop(&mut self) {
        self.unwatch();
    }
}
