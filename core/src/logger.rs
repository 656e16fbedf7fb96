use chrono::Local;
use serde::{Deserialize, Serialize};
use std::io::Write;
use std::sync::Mutex;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum LogLevel {
    Debug,
    Info,
    Warning,
    Error,
    Fatal,
}

impl LogLevel {
    pub fn to_str(&self) -> &'static str {
        match self {
            LogLevel::Debug => "DEBUG",
            LogLevel::Info => "INFO",
            LogLevel::Warning => "WARNING",
            LogLevel::Error => "ERROR",
            LogLevel::Fatal => "FATAL",
        }
    }

    fn color(&self) -> &'static str {
        match self {
            LogLevel::Debug => "\x1b[90m",
            LogLevel::Info => "\x1b[37m",
            LogLevel::Warning => "\x1b[33m",
            LogLevel::Error => "\x1b[31m",
            LogLevel::Fatal => "\x1b[31;1m",
        }
    }
}

/// Append-only line sink for a build's console log.
pub trait BuildListener {
    fn log(&self, level: LogLevel, message: &str);

    fn println(&self, message: &str) {
        self.log(LogLevel::Info, message);
    }
}

impl<T: BuildListener + ?Sized> BuildListener for &T {
    fn log(&self, level: LogLevel, message: &str) {
        (**self).log(level, message);
    }
}

pub struct Logger {
    use_colors: bool,
    show_timestamps: bool,
}

impl Logger {
    pub fn new() -> Self {
        Self {
            use_colors: atty::is(atty::Stream::Stdout),
            show_timestamps: false,
        }
    }

    pub fn with_timestamps(mut self, show_timestamps: bool) -> Self {
        self.show_timestamps = show_timestamps;
        self
    }

    pub fn with_colors(mut self, use_colors: bool) -> Self {
        self.use_colors = use_colors;
        self
    }

    fn format_line(&self, level: LogLevel, message: &str) -> String {
        let timestamp = self
            .show_timestamps
            .then(|| Local::now().format("%H:%M:%S").to_string());

        match (self.use_colors, timestamp) {
            (true, Some(ts)) => format!(
                "\x1b[90m[{}]\x1b[0m {}{}\x1b[0m",
                ts,
                level.color(),
                message
            ),
            (true, None) => format!("{}{}\x1b[0m", level.color(), message),
            (false, Some(ts)) => format!("[{}] {}", ts, message),
            (false, None) => message.to_string(),
        }
    }
}

impl BuildListener for Logger {
    fn log(&self, level: LogLevel, message: &str) {
        let line = self.format_line(level, message);
        let mut stdout = std::io::stdout().lock();
        let _ = writeln!(stdout, "{}", line);
        let _ = stdout.flush();
    }
}

impl Default for Logger {
    fn default() -> Self {
        Self::new()
    }
}

/// Keeps every line in memory. Used by embedders that forward the log
/// elsewhere, and by tests.
#[derive(Default)]
pub struct MemoryListener {
    lines: Mutex<Vec<(LogLevel, String)>>,
}

impl MemoryListener {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn lines(&self) -> Vec<String> {
        self.entries().into_iter().map(|(_, line)| line).collect()
    }

    pub fn entries(&self) -> Vec<(LogLevel, String)> {
        self.lines
            .lock()
            .map(|lines| lines.clone())
            .unwrap_or_default()
    }

    pub fn contains(&self, needle: &str) -> bool {
        self.count_containing(needle) > 0
    }

    pub fn count_containing(&self, needle: &str) -> usize {
        self.lines().iter().filter(|line| line.contains(needle)).count()
    }
}

impl BuildListener for MemoryListener {
    fn log(&self, level: LogLevel, message: &str) {
        if let Ok(mut lines) = self.lines.lock() {
            lines.push((level, message.to_string()));
        }
    }
}
