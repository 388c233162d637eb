use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::Path;
use std::sync::{Arc, Mutex};

const MAX_LOG_ENTRIES: usize = 10_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Debug,
    Info,
    Warn,
    Error,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogEntry {
    pub timestamp: DateTime<Utc>,
    pub level: LogLevel,
    pub component: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context: Option<serde_json::Value>,
}

impl LogEntry {
    pub fn new(level: LogLevel, component: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            timestamp: Utc::now(),
            level,
            component: component.into(),
            request_id: None,
            message: message.into(),
            context: None,
        }
    }

    pub fn with_request(mut self, request_id: impl Into<String>) -> Self {
        self.request_id = Some(request_id.into());
        self
    }

    pub fn with_context(mut self, ctx: serde_json::Value) -> Self {
        self.context = Some(ctx);
        self
    }
}

/// Ring buffer of recent gateway activity, persisted to a JSONL file.
struct Journal {
    entries: VecDeque<LogEntry>,
    writer: Option<BufWriter<File>>,
}

impl Journal {
    fn open(file_path: &Path) -> std::io::Result<Self> {
        if let Some(parent) = file_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let mut entries = VecDeque::with_capacity(MAX_LOG_ENTRIES);

        if file_path.exists() {
            let reader = BufReader::new(File::open(file_path)?);
            for line in reader.lines().map_while(std::result::Result::ok) {
                if let Ok(entry) = serde_json::from_str::<LogEntry>(&line) {
                    if entries.len() >= MAX_LOG_ENTRIES {
                        entries.pop_front();
                    }
                    entries.push_back(entry);
                }
            }
        }

        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(file_path)?;

        Ok(Self {
            entries,
            writer: Some(BufWriter::new(file)),
        })
    }

    fn push(&mut self, entry: LogEntry) {
        if let Some(ref mut writer) = self.writer {
            if let Ok(json) = serde_json::to_string(&entry) {
                let _ = writeln!(writer, "{json}");
                let _ = writer.flush();
            }
        }
        if self.entries.len() >= MAX_LOG_ENTRIES {
            self.entries.pop_front();
        }
        self.entries.push_back(entry);
    }
}

/// Shared handle to the activity journal.
#[derive(Clone)]
pub struct ActivityLog(Arc<Mutex<Journal>>);

impl ActivityLog {
    pub fn new(file_path: impl AsRef<Path>) -> std::io::Result<Self> {
        Ok(Self(Arc::new(Mutex::new(Journal::open(file_path.as_ref())?))))
    }

    pub fn log(&self, entry: LogEntry) {
        if let Ok(mut journal) = self.0.lock() {
            journal.push(entry);
        }
    }

    pub fn info(&self, component: impl Into<String>, message: impl Into<String>) {
        self.log(LogEntry::new(LogLevel::Info, component, message));
    }

    /// Start a handle that stamps every entry with a fresh request id.
    #[must_use]
    pub fn request(&self) -> RequestLog {
        RequestLog {
            log: self.clone(),
            request_id: format!("req_{}", uuid::Uuid::new_v4().simple()),
        }
    }

    /// Most recent entries, newest first.
    #[must_use]
    pub fn recent(&self, limit: usize) -> Vec<LogEntry> {
        self.0
            .lock()
            .map(|j| j.entries.iter().rev().take(limit).cloned().collect())
            .unwrap_or_default()
    }
}

/// Per-request logger. Entries go to the journal and to `tracing`.
#[derive(Clone)]
pub struct RequestLog {
    log: ActivityLog,
    request_id: String,
}

impl RequestLog {
    #[must_use]
    pub fn request_id(&self) -> &str {
        &self.request_id
    }

    fn emit(
        &self,
        level: LogLevel,
        component: &str,
        message: String,
        context: Option<serde_json::Value>,
    ) {
        let request_id = self.request_id.as_str();
        match level {
            LogLevel::Debug => tracing::debug!(request_id, component, "{message}"),
            LogLevel::Info => tracing::info!(request_id, component, "{message}"),
            LogLevel::Warn => tracing::warn!(request_id, component, "{message}"),
            LogLevel::Error => tracing::error!(request_id, component, "{message}"),
        }

        let mut entry = LogEntry::new(level, component, message).with_request(&self.request_id);
        if let Some(ctx) = context {
            entry = entry.with_context(ctx);
        }
        self.log.log(entry);
    }

    pub fn debug(&self, component: &str, message: impl Into<String>) {
        self.emit(LogLevel::Debug, component, message.into(), None);
    }

    pub fn info(&self, component: &str, message: impl Into<String>) {
        self.emit(LogLevel::Info, component, message.into(), None);
    }

    pub fn warn(&self, component: &str, message: impl Into<String>) {
        self.emit(LogLevel::Warn, component, message.into(), None);
    }

    pub fn error(&self, component: &str, message: impl Into<String>) {
        self.emit(LogLevel::Error, component, message.into(), None);
    }

    pub fn info_with_context(
        &self,
        component: &str,
        message: impl Into<String>,
        context: serde_json::Value,
    ) {
        self.emit(LogLevel::Info, component, message.into(), Some(context));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_request_entries_are_stamped_and_persisted() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("logs").join("gateway.log");

        let log = ActivityLog::new(&path).unwrap();
        log.info("startup", "listening");
        let req = log.request();
        req.warn("proxy", "image 2 failed");

        let recent = log.recent(10);
        assert_eq!(recent.len(), 2);
        assert_eq!(recent[0].level, LogLevel::Warn);
        assert_eq!(recent[0].request_id.as_deref(), Some(req.request_id()));
        assert!(req.request_id().starts_with("req_"));
        assert!(recent[1].request_id.is_none());

        drop(log);
        let reopened = ActivityLog::new(&path).unwrap();
        assert_eq!(reopened.recent(10).len(), 2);
    }

    #[test]
    fn test_context_round_trips_through_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("gateway.log");

        let log = ActivityLog::new(&path).unwrap();
        log.request()
            .info_with_context("server", "completed", serde_json::json!({"images": 3}));

        let reopened = ActivityLog::new(&path).unwrap();
        let entry = &reopened.recent(1)[0];
        assert_eq!(entry.context.as_ref().unwrap()["images"], 3);
    }

    #[test]
    fn test_recent_respects_limit() {
        let dir = tempdir().unwrap();
        let log = ActivityLog::new(dir.path().join("gateway.log")).unwrap();
        for i in 0..5 {
            log.info("test", format!("entry {i}"));
        }
        let recent = log.recent(2);
        assert_eq!(recent.len(), 2);
        assert_eq!(recent[0].message, "entry 4");
    }
}
