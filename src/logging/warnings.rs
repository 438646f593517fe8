use std::sync::{Arc, Mutex};

use log::{LevelFilter, Log};

use super::LogEntry;

/// Collects the warnings and errors emitted during a run, so they can be
/// reported along with the discovered topology.
#[derive(Clone)]
pub struct WarningLog {
    entries: Arc<Mutex<Vec<LogEntry>>>,
}

impl Default for WarningLog {
    fn default() -> Self {
        Self::create()
    }
}

impl WarningLog {
    pub fn create() -> Self {
        Self {
            entries: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Create a Boxed WarningCollector
    pub fn make_logger(&self) -> Box<WarningCollector> {
        Box::new(WarningCollector {
            max_level: LevelFilter::Warn,
            entries: self.entries.clone(),
        })
    }

    /// Returns the entries collected so far, oldest first.
    pub fn entries(&self) -> Vec<LogEntry> {
        self.entries
            .lock()
            .map(|entries| entries.clone())
            .unwrap_or_default()
    }
}

/// A logger that stores records in memory.
///
/// Do not create this logger directly, use WarningLog::make_logger instead.
pub struct WarningCollector {
    max_level: LevelFilter,
    entries: Arc<Mutex<Vec<LogEntry>>>,
}

impl WarningCollector {
    pub fn with_max_level(mut self: Box<Self>, max_level: LevelFilter) -> Box<Self> {
        self.max_level = max_level;
        self
    }
}

impl Log for WarningCollector {
    fn enabled(&self, metadata: &log::Metadata) -> bool {
        metadata.level() <= self.max_level
    }

    fn log(&self, record: &log::Record) {
        if let Ok(mut entries) = self.entries.lock() {
            entries.push(LogEntry::from(record));
        }
    }

    fn flush(&self) {}
}
