use serde::{Deserialize, Serialize};

pub mod multilog;
pub mod warnings;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct LogEntry {
    pub level: Level,
    pub message: String,
    pub target: String,
    pub module: String,
    pub file: String,
    pub line: u32,
}

#[derive(Debug, Serialize, Deserialize, Copy, Clone, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Level {
    Error = 1,
    Warn = 2,
    Info = 3,
    Debug = 4,
    Trace = 5,
}

impl From<log::Level> for Level {
    fn from(value: log::Level) -> Self {
        match value {
            log::Level::Error => Level::Error,
            log::Level::Warn => Level::Warn,
            log::Level::Info => Level::Info,
            log::Level::Debug => Level::Debug,
            log::Level::Trace => Level::Trace,
        }
    }
}

impl From<&log::Record<'_>> for LogEntry {
    fn from(value: &log::Record) -> Self {
        Self {
            level: value.level().into(),
            message: value.args().to_string(),
            target: value.target().to_string(),
            module: value.module_path().unwrap_or_default().to_string(),
            file: value.file().unwrap_or_default().to_string(),
            line: value.line().unwrap_or_default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_entry() {
        let entry = LogEntry::from(
            &log::Record::builder()
                .args(format_args!("Cannot find SAS address of device '2:0:0:0'"))
                .level(log::Level::Warn)
                .target("sastopo::discovery::identity")
                .module_path(Some("sastopo::discovery::identity"))
                .file(Some("src/discovery/identity.rs"))
                .line(Some(97))
                .build(),
        );

        assert_eq!(entry.level, Level::Warn);
        assert_eq!(entry.message, "Cannot find SAS address of device '2:0:0:0'");
        assert_eq!(entry.target, "sastopo::discovery::identity");
        assert_eq!(entry.module, "sastopo::discovery::identity");
        assert_eq!(entry.file, "src/discovery/identity.rs");
        assert_eq!(entry.line, 97);

        assert_eq!(
            serde_json::to_value(&entry).unwrap()["level"],
            serde_json::json!("warn")
        );
    }
}
