//! Console logging plus an in-memory copy for the debug log window.

use chrono::{DateTime, Local, Utc};
use log::{Level, LevelFilter, Log, Metadata, Record, SetLoggerError};
use std::collections::VecDeque;
use std::env;
use std::fmt;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// Lines kept for saving before the oldest are dropped
pub const DEBUG_LOG_CAPACITY: usize = 5000;

#[derive(Debug, Clone, PartialEq)]
pub struct LogLine {
    pub time: DateTime<Utc>,
    pub level: Level,
    pub target: String,
    pub message: String,
}

impl fmt::Display for LogLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: [{}] {}", self.time.format("%Y-%m-%d %H:%M:%S%.3f"), self.level, self.message)
    }
}

#[derive(Debug, Default)]
struct Buffer {
    history: VecDeque<LogLine>,
    /// Lines not yet handed to the viewer
    pending: VecDeque<LogLine>,
}

/// Bounded, shareable store of captured log lines
#[derive(Debug, Clone)]
pub struct DebugLog {
    buffer: Arc<Mutex<Buffer>>,
    capacity: usize,
}

impl Default for DebugLog {
    fn default() -> Self {
        Self::with_capacity(DEBUG_LOG_CAPACITY)
    }
}

impl DebugLog {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            buffer: Arc::new(Mutex::new(Buffer::default())),
            capacity: capacity.max(1),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Buffer> {
        // A panic mid-push leaves the buffer usable
        self.buffer.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn push(&self, line: LogLine) {
        let mut guard = self.lock();
        let buffer = &mut *guard;
        for queue in [&mut buffer.history, &mut buffer.pending] {
            if queue.len() == self.capacity {
                queue.pop_front();
            }
        }
        buffer.pending.push_back(line.clone());
        buffer.history.push_back(line);
    }

    /// Take lines added since the last call
    pub fn drain_new(&self) -> Vec<LogLine> {
        self.lock().pending.drain(..).collect()
    }

    pub fn lines(&self) -> Vec<LogLine> {
        self.lock().history.iter().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.lock().history.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        let mut buffer = self.lock();
        buffer.history.clear();
        buffer.pending.clear();
    }

    /// Write every kept line to `dir/debuglog_YYYYmmddHHMMSS.txt`
    pub fn save(&self, dir: &Path) -> io::Result<PathBuf> {
        fs::create_dir_all(dir)?;
        let path = dir.join(format!("debuglog_{}.txt", Local::now().format("%Y%m%d%H%M%S")));

        let mut content = String::new();
        for line in self.lock().history.iter() {
            content.push_str(&line.to_string());
            content.push('\n');
        }
        fs::write(&path, content)?;

        Ok(path)
    }
}

/// Forwards records to an inner logger and copies them into a `DebugLog`.
pub struct TeeLogger<L> {
    inner: L,
    inner_level: LevelFilter,
    sink: DebugLog,
    sink_level: LevelFilter,
}

impl<L: Log> TeeLogger<L> {
    pub fn new(inner: L, inner_level: LevelFilter, sink: DebugLog, sink_level: LevelFilter) -> Self {
        Self {
            inner,
            inner_level,
            sink,
            sink_level,
        }
    }

    pub fn max_level(&self) -> LevelFilter {
        self.inner_level.max(self.sink_level)
    }
}

impl<L: Log> Log for TeeLogger<L> {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= self.max_level()
    }

    fn log(&self, record: &Record) {
        if record.level() <= self.inner_level && self.inner.enabled(record.metadata()) {
            self.inner.log(record);
        }

        if record.level() <= self.sink_level {
            self.sink.push(LogLine {
                time: Utc::now(),
                level: record.level(),
                target: record.target().to_string(),
                message: record.args().to_string(),
            });
        }
    }

    fn flush(&self) {
        self.inner.flush();
    }
}

/// Install pretty_env_logger (driven by `RUST_LOG`) teed into a new
/// `DebugLog` that captures `sink_level` and above.
pub fn init_with_debug_log(sink_level: LevelFilter) -> Result<DebugLog, SetLoggerError> {
    let mut builder = pretty_env_logger::formatted_builder();
    if let Ok(filters) = env::var("RUST_LOG") {
        builder.parse_filters(&filters);
    }
    let console = builder.build();
    let console_level = console.filter();

    let sink = DebugLog::default();
    let logger = TeeLogger::new(console, console_level, sink.clone(), sink_level);
    let max_level = logger.max_level();

    log::set_boxed_logger(Box::new(logger))?;
    log::set_max_level(max_level);

    Ok(sink)
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Counts the records it receives
    #[derive(Default)]
    struct CountingLogger {
        seen: Mutex<Vec<String>>,
    }

    impl Log for CountingLogger {
        fn enabled(&self, _: &Metadata) -> bool {
            true
        }

        fn log(&self, record: &Record) {
            self.seen.lock().unwrap().push(record.args().to_string());
        }

        fn flush(&self) {}
    }

    fn line(message: &str) -> LogLine {
        LogLine {
            time: Utc::now(),
            level: Level::Info,
            target: "test".to_string(),
            message: message.to_string(),
        }
    }

    fn emit(logger: &impl Log, level: Level, message: &str) {
        logger.log(
            &Record::builder()
                .level(level)
                .target("test")
                .args(format_args!("{}", message))
                .build(),
        );
    }

    #[test]
    fn test_tee_respects_both_levels() {
        let sink = DebugLog::default();
        let logger = TeeLogger::new(CountingLogger::default(), LevelFilter::Warn, sink.clone(), LevelFilter::Info);

        emit(&logger, Level::Info, "cycle done");
        emit(&logger, Level::Warn, "fetch failed");
        emit(&logger, Level::Debug, "sleeping");

        assert_eq!(*logger.inner.seen.lock().unwrap(), vec!["fetch failed".to_string()]);
        let captured: Vec<String> = sink.lines().into_iter().map(|l| l.message).collect();
        assert_eq!(captured, vec!["cycle done", "fetch failed"]);
        assert_eq!(logger.max_level(), LevelFilter::Info);
    }

    #[test]
    fn test_drain_and_capacity() {
        let log = DebugLog::with_capacity(2);
        log.push(line("one"));
        log.push(line("two"));
        log.push(line("three"));

        let drained: Vec<String> = log.drain_new().into_iter().map(|l| l.message).collect();
        assert_eq!(drained, vec!["two", "three"]);
        assert!(log.drain_new().is_empty());
        assert_eq!(log.len(), 2);

        log.clear();
        assert!(log.is_empty());
    }

    #[test]
    fn test_save_writes_file() {
        let dir = env::temp_dir().join(format!("warningnav-logs-{}", std::process::id()));
        let log = DebugLog::default();
        log.push(line("saved line"));

        let path = log.save(&dir).unwrap();
        let name = path.file_name().unwrap().to_string_lossy().to_string();
        assert!(name.starts_with("debuglog_") && name.ends_with(".txt"));
        assert_eq!(name.len(), "debuglog_YYYYmmddHHMMSS.txt".len());

        let content = fs::read_to_string(&path).unwrap();
        assert!(content.contains("[INFO] saved line"));
        fs::remove_dir_all(&dir).unwrap();
    }
}
