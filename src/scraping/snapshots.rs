//! Optional debug hook that persists intermediate page markup.

use std::path::PathBuf;

use chrono::Utc;
use tracing::{debug, warn};

/// Receives markup at interesting points of a run. Never fails the caller.
pub trait SnapshotSink: Send + Sync {
    fn record(&self, label: &str, markup: &str);
}

/// Discards everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoSnapshots;

impl SnapshotSink for NoSnapshots {
    fn record(&self, _label: &str, _markup: &str) {}
}

/// Writes `<dir>/<timestamp>_<label>.html`.
#[derive(Debug, Clone)]
pub struct DirSnapshots {
    dir: PathBuf,
}

impl DirSnapshots {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn file_name(label: &str) -> String {
        let safe: String = label
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() || c == '-' { c } else { '_' })
            .collect();
        format!("{}_{}.html", Utc::now().format("%Y%m%dT%H%M%S%.3f"), safe)
    }
}

impl SnapshotSink for DirSnapshots {
    fn record(&self, label: &str, markup: &str) {
        if let Err(e) = std::fs::create_dir_all(&self.dir) {
            warn!("snapshot dir {} unavailable: {}", self.dir.display(), e);
            return;
        }
        let path = self.dir.join(Self::file_name(label));
        match std::fs::write(&path, markup) {
            Ok(()) => debug!("snapshot saved to {}", path.display()),
            Err(e) => warn!("snapshot {} not written: {}", path.display(), e),
        }
    }
}
