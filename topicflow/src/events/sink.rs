//! Log sink trait and implementations.

use parking_lot::{Mutex, RwLock};
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, error, info, warn, Level};

/// Append-only destination for run log lines.
///
/// Appending never fails from the caller's point of view: a sink that
/// cannot persist a line reports it through `tracing` and moves on.
pub trait LogSink: Send + Sync {
    /// Appends one line at the given level.
    fn append(&self, level: Level, message: &str);

    /// Appends an info-level line.
    fn info(&self, message: &str) {
        self.append(Level::INFO, message);
    }

    /// Appends a warn-level line.
    fn warn(&self, message: &str) {
        self.append(Level::WARN, message);
    }

    /// Appends an error-level line.
    fn error(&self, message: &str) {
        self.append(Level::ERROR, message);
    }
}

/// A sink that discards everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoOpLogSink;

impl LogSink for NoOpLogSink {
    fn append(&self, _level: Level, _message: &str) {}
}

/// A sink that forwards lines to the tracing framework.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingLogSink;

impl LogSink for TracingLogSink {
    fn append(&self, level: Level, message: &str) {
        match level {
            Level::ERROR => error!(target: "topicflow::run", "{}", message),
            Level::WARN => warn!(target: "topicflow::run", "{}", message),
            Level::INFO => info!(target: "topicflow::run", "{}", message),
            _ => debug!(target: "topicflow::run", "{}", message),
        }
    }
}

/// A sink that appends `"<timestamp> - <message>"` lines to a file.
#[derive(Debug)]
pub struct FileLogSink {
    path: PathBuf,
    file: Mutex<File>,
}

impl FileLogSink {
    /// Opens (or creates) `path` for appending.
    pub fn open(path: impl AsRef<Path>) -> std::io::Result<Self> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let file = OpenOptions::new().create(true).append(true).open(&path)?;
        Ok(Self {
            path,
            file: Mutex::new(file),
        })
    }

    /// The file being appended to.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl LogSink for FileLogSink {
    fn append(&self, _level: Level, message: &str) {
        let line = format!("{} - {}\n", crate::utils::iso_timestamp(), message);
        let mut file = self.file.lock();
        if let Err(e) = file.write_all(line.as_bytes()).and_then(|()| file.flush()) {
            warn!(path = %self.path.display(), error = %e, "Failed to append to run log");
        }
    }
}

/// A collecting sink for testing purposes.
#[derive(Debug, Default)]
pub struct CollectingLogSink {
    lines: RwLock<Vec<(Level, String)>>,
}

impl CollectingLogSink {
    /// Creates a new collecting sink.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns all collected lines.
    #[must_use]
    pub fn lines(&self) -> Vec<(Level, String)> {
        self.lines.read().clone()
    }

    /// Returns the collected messages without levels.
    #[must_use]
    pub fn messages(&self) -> Vec<String> {
        self.lines.read().iter().map(|(_, m)| m.clone()).collect()
    }

    /// Returns true if any message contains `needle`.
    #[must_use]
    pub fn contains(&self, needle: &str) -> bool {
        self.lines.read().iter().any(|(_, m)| m.contains(needle))
    }

    /// Returns the number of collected lines.
    #[must_use]
    pub fn len(&self) -> usize {
        self.lines.read().len()
    }

    /// Returns true if no lines have been collected.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lines.read().is_empty()
    }

    /// Clears all collected lines.
    pub fn clear(&self) {
        self.lines.write().clear();
    }
}

impl LogSink for CollectingLogSink {
    fn append(&self, level: Level, message: &str) {
        self.lines.write().push((level, message.to_string()));
    }
}

/// Fans each line out to several sinks, in order.
#[derive(Clone, Default)]
pub struct TeeLogSink {
    sinks: Vec<Arc<dyn LogSink>>,
}

impl TeeLogSink {
    /// Creates a tee over the given sinks.
    #[must_use]
    pub fn new(sinks: Vec<Arc<dyn LogSink>>) -> Self {
        Self { sinks }
    }

    /// Adds another sink.
    #[must_use]
    pub fn with(mut self, sink: Arc<dyn LogSink>) -> Self {
        self.sinks.push(sink);
        self
    }
}

impl std::fmt::Debug for TeeLogSink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TeeLogSink")
            .field("sinks", &self.sinks.len())
            .finish()
    }
}

impl LogSink for TeeLogSink {
    fn append(&self, level: Level, message: &str) {
        for sink in &self.sinks {
            sink.append(level, message);
        }
    }
}
