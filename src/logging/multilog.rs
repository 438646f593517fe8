use log::{LevelFilter, Log};

/// Fans log records out to several loggers.
pub struct MultiLogger {
    loggers: Vec<Box<dyn Log>>,
    max_level: LevelFilter,
    global_filter: Vec<(String, LevelFilter)>,
}

impl Default for MultiLogger {
    fn default() -> Self {
        Self::new()
    }
}

impl MultiLogger {
    pub fn new() -> Self {
        Self {
            loggers: Vec::new(),
            max_level: LevelFilter::Trace,
            global_filter: Vec::new(),
        }
    }

    pub fn with_logger(mut self, logger: Box<dyn Log>) -> Self {
        self.loggers.push(logger);
        self
    }

    pub fn with_max_level(mut self, max_level: LevelFilter) -> Self {
        self.max_level = max_level;
        self
    }

    /// Drops the records whose target starts with `target` when they are more
    /// verbose than `max_level`, for every logger.
    pub fn with_global_filter(mut self, target: impl Into<String>, max_level: LevelFilter) -> Self {
        self.global_filter.push((target.into(), max_level));
        self
    }

    pub fn add_logger(&mut self, logger: Box<dyn Log>) {
        self.loggers.push(logger);
    }

    /// Sets the multi logger as the global logger.
    pub fn init(self) -> Result<(), log::SetLoggerError> {
        log::set_max_level(self.max_level);
        log::set_boxed_logger(Box::new(self))
    }

    fn should_drop(&self, metadata: &log::Metadata) -> bool {
        self.global_filter.iter().any(|(target, max_level)| {
            metadata.target().starts_with(target) && metadata.level() > *max_level
        })
    }
}

impl Log for MultiLogger {
    fn enabled(&self, metadata: &log::Metadata) -> bool {
        !self.should_drop(metadata) && self.loggers.iter().any(|l| l.enabled(metadata))
    }

    fn log(&self, record: &log::Record) {
        if self.should_drop(record.metadata()) {
            return;
        }

        self.loggers
            .iter()
            .filter(|l| l.enabled(record.metadata()))
            .for_each(|l| l.log(record));
    }

    fn flush(&self) {
        self.loggers.iter().for_each(|l| l.flush());
    }
}
