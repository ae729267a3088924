//! Structured logging for experiment runs.
//!
//! Entries carry the experiment, subject and variant they concern so a log
//! line about a failure can be traced back to the registration that caused
//! it. Nothing is logged until [`init_logger`] installs the global logger;
//! until then every `log*` call is a no-op.

use crate::config::LoggingConfig;
use crate::error::Result;
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// Log level for lab operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum LogLevel {
    /// Trace-level logging (very verbose)
    Trace = 0,
    /// Debug-level logging
    Debug = 1,
    /// Info-level logging
    Info = 2,
    /// Warning-level logging
    Warn = 3,
    /// Error-level logging
    Error = 4,
}

impl std::fmt::Display for LogLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LogLevel::Trace => write!(f, "TRACE"),
            LogLevel::Debug => write!(f, "DEBUG"),
            LogLevel::Info => write!(f, "INFO"),
            LogLevel::Warn => write!(f, "WARN"),
            LogLevel::Error => write!(f, "ERROR"),
        }
    }
}

/// One structured log record.
#[derive(Debug, Clone)]
pub struct LogEntry {
    /// Timestamp when the log entry was created
    pub timestamp: SystemTime,
    /// Log level
    pub level: LogLevel,
    /// Component that generated the log
    pub component: String,
    /// Experiment the entry concerns
    pub experiment: Option<String>,
    /// Subject the entry concerns
    pub subject: Option<String>,
    /// Variant the entry concerns
    pub variant: Option<String>,
    /// Message content
    pub message: String,
    /// Additional structured data
    pub metadata: BTreeMap<String, String>,
    /// Duration if this is a timing log
    pub duration: Option<Duration>,
}

impl LogEntry {
    /// Create a new log entry.
    pub fn new(level: LogLevel, component: &str, message: &str) -> Self {
        Self {
            timestamp: SystemTime::now(),
            level,
            component: component.to_string(),
            experiment: None,
            subject: None,
            variant: None,
            message: message.to_string(),
            metadata: BTreeMap::new(),
            duration: None,
        }
    }

    /// Attach the experiment name.
    pub fn with_experiment(mut self, experiment: &str) -> Self {
        self.experiment = Some(experiment.to_string());
        self
    }

    /// Attach the subject name.
    pub fn with_subject(mut self, subject: &str) -> Self {
        self.subject = Some(subject.to_string());
        self
    }

    /// Attach the variant name.
    pub fn with_variant(mut self, variant: &str) -> Self {
        self.variant = Some(variant.to_string());
        self
    }

    /// Add metadata to the log entry.
    pub fn with_metadata(mut self, key: &str, value: &str) -> Self {
        self.metadata.insert(key.to_string(), value.to_string());
        self
    }

    /// Add duration to the log entry.
    pub fn with_duration(mut self, duration: Duration) -> Self {
        self.duration = Some(duration);
        self
    }

    fn millis(&self) -> u128 {
        self.timestamp
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_millis()
    }

    /// Format the log entry as a human-readable string.
    pub fn format(&self) -> String {
        let mut parts = vec![
            format!("[{}]", self.millis()),
            self.level.to_string(),
            self.component.clone(),
        ];

        if let Some(experiment) = &self.experiment {
            parts.push(format!("exp:{}", experiment));
        }
        if let Some(subject) = &self.subject {
            parts.push(format!("subject:{}", subject));
        }
        if let Some(variant) = &self.variant {
            parts.push(format!("variant:{}", variant));
        }

        parts.push(self.message.clone());

        if let Some(duration) = self.duration {
            parts.push(format!("duration:{}us", duration.as_micros()));
        }

        if !self.metadata.is_empty() {
            let metadata_str = self
                .metadata
                .iter()
                .map(|(k, v)| format!("{}:{}", k, v))
                .collect::<Vec<_>>()
                .join(",");
            parts.push(format!("metadata:{{{}}}", metadata_str));
        }

        parts.join(" ")
    }

    /// Format the log entry as a single-line JSON object.
    pub fn format_json(&self) -> String {
        let mut object = serde_json::Map::new();
        object.insert("timestamp".into(), serde_json::json!(self.millis() as u64));
        object.insert("level".into(), serde_json::json!(self.level.to_string()));
        object.insert("component".into(), serde_json::json!(self.component));
        object.insert("message".into(), serde_json::json!(self.message));

        if let Some(experiment) = &self.experiment {
            object.insert("experiment".into(), serde_json::json!(experiment));
        }
        if let Some(subject) = &self.subject {
            object.insert("subject".into(), serde_json::json!(subject));
        }
        if let Some(variant) = &self.variant {
            object.insert("variant".into(), serde_json::json!(variant));
        }
        if let Some(duration) = self.duration {
            object.insert(
                "duration_us".into(),
                serde_json::json!(duration.as_micros() as u64),
            );
        }
        if !self.metadata.is_empty() {
            object.insert("metadata".into(), serde_json::json!(self.metadata));
        }

        serde_json::Value::Object(object).to_string()
    }
}

/// Trait for log output destinations.
pub trait LogOutput: Send + Sync {
    /// Write a log entry to the output.
    fn write(&self, entry: &LogEntry) -> Result<()>;

    /// Flush any buffered output.
    fn flush(&self) -> Result<()>;
}

/// Console log output that writes to stderr.
///
/// Stdout is left alone: reports are printed there.
#[derive(Debug)]
pub struct ConsoleOutput {
    json_format: bool,
}

impl ConsoleOutput {
    /// Create a new console output with text format.
    pub fn new() -> Self {
        Self { json_format: false }
    }

    /// Create a new console output with JSON format.
    pub fn new_json() -> Self {
        Self { json_format: true }
    }
}

impl Default for ConsoleOutput {
    fn default() -> Self {
        Self::new()
    }
}

impl LogOutput for ConsoleOutput {
    fn write(&self, entry: &LogEntry) -> Result<()> {
        let formatted = if self.json_format {
            entry.format_json()
        } else {
            entry.format()
        };

        eprintln!("{}", formatted);
        Ok(())
    }

    fn flush(&self) -> Result<()> {
        use std::io::Write;
        std::io::stderr().flush()?;
        Ok(())
    }
}

/// File log output that appends to a file.
#[derive(Debug)]
pub struct FileOutput {
    path: std::path::PathBuf,
    json_format: bool,
}

impl FileOutput {
    /// Create a new file output.
    pub fn new<P: AsRef<std::path::Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            json_format: false,
        }
    }

    /// Create a new file output with JSON format.
    pub fn new_json<P: AsRef<std::path::Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            json_format: true,
        }
    }
}

impl LogOutput for FileOutput {
    fn write(&self, entry: &LogEntry) -> Result<()> {
        use std::io::Write;

        let formatted = if self.json_format {
            entry.format_json()
        } else {
            entry.format()
        };

        let mut file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;

        writeln!(file, "{}", formatted)?;
        Ok(())
    }

    fn flush(&self) -> Result<()> {
        // Opened and closed per write
        Ok(())
    }
}

/// Central logger.
pub struct Logger {
    min_level: LogLevel,
    outputs: Vec<Box<dyn LogOutput>>,
}

impl Logger {
    /// Create a new logger with console output.
    pub fn new() -> Self {
        Self {
            min_level: LogLevel::Info,
            outputs: vec![Box::new(ConsoleOutput::new())],
        }
    }

    /// Set the minimum log level.
    pub fn set_level(&mut self, level: LogLevel) {
        self.min_level = level;
    }

    /// Minimum level that is written.
    pub fn level(&self) -> LogLevel {
        self.min_level
    }

    /// Add an output destination.
    pub fn add_output(&mut self, output: Box<dyn LogOutput>) {
        self.outputs.push(output);
    }

    /// Remove every output destination.
    pub fn clear_outputs(&mut self) {
        self.outputs.clear();
    }

    /// Replace level and outputs with what `config` asks for.
    ///
    /// Applying the same configuration twice leaves the same outputs; a
    /// disabled configuration leaves none.
    pub fn configure(&mut self, config: &LoggingConfig) {
        self.outputs.clear();
        if !config.enabled {
            return;
        }

        self.min_level = config.level;
        if config.json_format {
            self.outputs.push(Box::new(ConsoleOutput::new_json()));
        } else {
            self.outputs.push(Box::new(ConsoleOutput::new()));
        }
        if let Some(ref log_file) = config.log_file {
            if config.json_format {
                self.outputs.push(Box::new(FileOutput::new_json(log_file)));
            } else {
                self.outputs.push(Box::new(FileOutput::new(log_file)));
            }
        }
    }

    /// Log a message at the specified level.
    pub fn log(&self, level: LogLevel, component: &str, message: &str) {
        if level >= self.min_level {
            self.write_entry(&LogEntry::new(level, component, message));
        }
    }

    /// Log a prepared entry, subject to the level filter.
    pub fn log_entry(&self, entry: &LogEntry) {
        if entry.level >= self.min_level {
            self.write_entry(entry);
        }
    }

    /// Log a timing measurement at debug level.
    pub fn log_timing(&self, component: &str, phase: &str, duration: Duration) {
        if LogLevel::Debug >= self.min_level {
            let entry = LogEntry::new(LogLevel::Debug, component, &format!("{} completed", phase))
                .with_duration(duration);
            self.write_entry(&entry);
        }
    }

    fn write_entry(&self, entry: &LogEntry) {
        for output in &self.outputs {
            if let Err(e) = output.write(entry) {
                eprintln!("Failed to write log entry: {}", e);
            }
        }
    }

    /// Flush all outputs.
    pub fn flush(&self) {
        for output in &self.outputs {
            if let Err(e) = output.flush() {
                eprintln!("Failed to flush log output: {}", e);
            }
        }
    }
}

impl Default for Logger {
    fn default() -> Self {
        Self::new()
    }
}

/// Global logger instance.
static GLOBAL_LOGGER: std::sync::OnceLock<Arc<Mutex<Logger>>> = std::sync::OnceLock::new();

/// Initialize the global logger.
pub fn init_logger() -> Arc<Mutex<Logger>> {
    GLOBAL_LOGGER
        .get_or_init(|| Arc::new(Mutex::new(Logger::new())))
        .clone()
}

/// Configure the global logger, installing it if logging is enabled.
///
/// The most recent call wins: a disabled configuration silences a logger an
/// earlier call installed.
pub fn configure(config: &LoggingConfig) {
    if !config.enabled && GLOBAL_LOGGER.get().is_none() {
        return;
    }

    let logger = init_logger();
    let guard = logger.lock();
    if let Ok(mut logger) = guard {
        logger.configure(config);
    }
}

/// Log a message using the global logger.
pub fn log(level: LogLevel, component: &str, message: &str) {
    if let Some(logger) = GLOBAL_LOGGER.get() {
        if let Ok(logger) = logger.lock() {
            logger.log(level, component, message);
        }
    }
}

/// Log a prepared entry using the global logger.
pub fn log_entry(entry: &LogEntry) {
    if let Some(logger) = GLOBAL_LOGGER.get() {
        if let Ok(logger) = logger.lock() {
            logger.log_entry(entry);
        }
    }
}

/// Log timing using the global logger.
pub fn log_timing(component: &str, phase: &str, duration: Duration) {
    if let Some(logger) = GLOBAL_LOGGER.get() {
        if let Ok(logger) = logger.lock() {
            logger.log_timing(component, phase, duration);
        }
    }
}

/// Log an info-level message using the global logger.
#[macro_export]
macro_rules! log_info {
    ($component:expr, $($arg:tt)*) => {
        $crate::logging::log($crate::logging::LogLevel::Info, $component, &format!($($arg)*))
    };
}

/// Log a warning-level message using the global logger.
#[macro_export]
macro_rules! log_warn {
    ($component:expr, $($arg:tt)*) => {
        $crate::logging::log($crate::logging::LogLevel::Warn, $component, &format!($($arg)*))
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Capture(Arc<Mutex<Vec<String>>>);

    impl LogOutput for Capture {
        fn write(&self, entry: &LogEntry) -> Result<()> {
            if let Ok(mut lines) = self.0.lock() {
                lines.push(entry.format());
            }
            Ok(())
        }

        fn flush(&self) -> Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_log_entry_creation() {
        let entry = LogEntry::new(LogLevel::Info, "harness", "measured")
            .with_experiment("receiver")
            .with_subject("small")
            .with_variant("value")
            .with_metadata("iterations", "1000")
            .with_duration(Duration::from_millis(10));

        assert_eq!(entry.level, LogLevel::Info);
        assert_eq!(entry.component, "harness");
        assert_eq!(entry.experiment.as_deref(), Some("receiver"));
        assert_eq!(entry.subject.as_deref(), Some("small"));
        assert_eq!(entry.variant.as_deref(), Some("value"));
        assert_eq!(entry.metadata.get("iterations"), Some(&"1000".to_string()));
        assert_eq!(entry.duration, Some(Duration::from_millis(10)));
    }

    #[test]
    fn test_log_entry_formatting() {
        let entry = LogEntry::new(LogLevel::Warn, "audit", "layout drifted")
            .with_subject("unpadded")
            .with_duration(Duration::from_micros(42));
        let formatted = entry.format();

        assert!(formatted.contains("WARN"));
        assert!(formatted.contains("audit"));
        assert!(formatted.contains("subject:unpadded"));
        assert!(formatted.contains("layout drifted"));
        assert!(formatted.contains("duration:42us"));
    }

    #[test]
    fn test_log_entry_json_formatting() {
        let entry = LogEntry::new(LogLevel::Info, "oracle", "said \"ok\"")
            .with_variant("push")
            .with_metadata("inputs", "100");
        let json: serde_json::Value = serde_json::from_str(&entry.format_json()).unwrap();

        assert_eq!(json["level"], "INFO");
        assert_eq!(json["component"], "oracle");
        assert_eq!(json["message"], "said \"ok\"");
        assert_eq!(json["variant"], "push");
        assert_eq!(json["metadata"]["inputs"], "100");
        assert!(json.get("experiment").is_none());
    }

    #[test]
    fn test_logger_level_filter() {
        let lines = Arc::new(Mutex::new(Vec::new()));
        let mut logger = Logger::new();
        logger.clear_outputs();
        logger.add_output(Box::new(Capture(Arc::clone(&lines))));
        logger.set_level(LogLevel::Warn);

        logger.log(LogLevel::Info, "test", "dropped");
        logger.log(LogLevel::Error, "test", "kept");
        logger.log_timing("test", "measure", Duration::from_millis(1));
        logger.log_entry(&LogEntry::new(LogLevel::Warn, "test", "entry kept"));

        let lines = lines.lock().unwrap();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].contains("kept"));
        assert!(lines[1].contains("entry kept"));
    }

    #[test]
    fn test_file_output_appends() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("lab.log");
        let output = FileOutput::new_json(&path);

        output
            .write(&LogEntry::new(LogLevel::Info, "test", "one"))
            .unwrap();
        output
            .write(&LogEntry::new(LogLevel::Info, "test", "two"))
            .unwrap();

        let contents = std::fs::read_to_string(&path).unwrap();
        assert_eq!(contents.lines().count(), 2);
        assert!(contents.contains("\"message\":\"two\""));
    }

    #[test]
    fn test_reconfiguring_does_not_duplicate_outputs() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("lab.log");
        let config = LoggingConfig {
            enabled: true,
            level: LogLevel::Info,
            log_file: Some(path.clone()),
            json_format: true,
        };

        let mut logger = Logger::new();
        logger.configure(&config);
        logger.configure(&config);
        logger.log(LogLevel::Info, "test", "once");

        let contents = std::fs::read_to_string(&path).unwrap();
        assert_eq!(contents.lines().count(), 1);
    }

    #[test]
    fn test_disabled_configuration_silences_logger() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("lab.log");
        let mut logger = Logger::new();
        logger.configure(&LoggingConfig {
            enabled: true,
            level: LogLevel::Debug,
            log_file: Some(path.clone()),
            json_format: false,
        });
        logger.log(LogLevel::Info, "test", "before");

        logger.configure(&LoggingConfig::default());
        logger.log(LogLevel::Error, "test", "after");

        let contents = std::fs::read_to_string(&path).unwrap();
        assert_eq!(contents.lines().count(), 1);
        assert!(contents.contains("before"));
        assert!(!contents.contains("after"));
    }

    #[test]
    fn test_global_logger() {
        let _logger = init_logger();

        log(LogLevel::Info, "test", "test message");
        log_entry(&LogEntry::new(LogLevel::Debug, "test", "entry").with_experiment("x"));
        log_timing("test", "oracle", Duration::from_millis(10));
    }
}
