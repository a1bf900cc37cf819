//! Structured security event log.
//!
//! # Responsibilities
//! - Stamp and serialize one record per security event
//! - Fan records out to the console and any secondary sinks
//! - Disable a failing secondary sink without affecting requests
//!
//! # Design Decisions
//! - The console sink goes through `tracing` under the `security` target
//! - Emission is synchronous; a record is never half-written
//! - Secondary sinks are best-effort and warn once when they fail

use std::collections::BTreeMap;
use std::io;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use chrono::{Local, SecondsFormat};
use serde::Serialize;

use crate::config::LoggingConfig;
use crate::inspection::descriptor::{Params, RequestDescriptor};
use crate::observability::metrics;
use crate::observability::rotating::RotatingFile;

/// `tracing` target used by the console sink.
pub const SECURITY_TARGET: &str = "security";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Level {
    Info,
    Warning,
    Error,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    Request,
    Suspicious,
    IdsBlock,
    Blocked,
    UnhandledError,
    Validation,
}

impl EventKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventKind::Request => "request",
            EventKind::Suspicious => "suspicious",
            EventKind::IdsBlock => "ids_block",
            EventKind::Blocked => "blocked",
            EventKind::UnhandledError => "unhandled_error",
            EventKind::Validation => "validation",
        }
    }
}

/// Event-specific fields. Absent fields are omitted from the record.
#[derive(Debug, Clone, Default, Serialize)]
pub struct EventFields {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,
    pub source: String,
    pub endpoint: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<u16>,
    pub user_agent: String,
    pub params: Params,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub suspicious: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub matches: Option<BTreeMap<String, String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub count: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ttl_secs: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub window_secs: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub block_secs: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub field: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl EventFields {
    /// Fields common to every event about `request`.
    pub fn for_request(request: &RequestDescriptor) -> Self {
        Self {
            request_id: request.request_id.clone(),
            source: request.source.clone(),
            endpoint: request.endpoint.clone(),
            user_agent: request.user_agent.clone(),
            params: request.params.clone(),
            ..Self::default()
        }
    }
}

/// One emitted security event.
#[derive(Debug, Clone, Serialize)]
pub struct LogRecord {
    /// ISO-8601 with offset.
    pub timestamp: String,
    pub level: Level,
    pub event: EventKind,
    #[serde(flatten)]
    pub fields: EventFields,
}

/// Destination for security records.
pub trait LogSink: Send + Sync {
    fn name(&self) -> &str;

    /// Write one record; `line` is its JSON rendering.
    fn write(&self, record: &LogRecord, line: &str) -> io::Result<()>;
}

/// Console output through `tracing`.
#[derive(Debug, Default, Clone, Copy)]
pub struct ConsoleSink;

impl LogSink for ConsoleSink {
    fn name(&self) -> &str {
        "console"
    }

    fn write(&self, record: &LogRecord, line: &str) -> io::Result<()> {
        let event = record.event.as_str();
        let source = &record.fields.source;
        let endpoint = &record.fields.endpoint;
        match record.level {
            Level::Info => {
                tracing::info!(target: SECURITY_TARGET, event, %source, %endpoint, record = %line)
            }
            Level::Warning => {
                tracing::warn!(target: SECURITY_TARGET, event, %source, %endpoint, record = %line)
            }
            Level::Error => {
                tracing::error!(target: SECURITY_TARGET, event, %source, %endpoint, record = %line)
            }
        }
        Ok(())
    }
}

/// JSON lines appended to a rotating file.
#[derive(Debug)]
pub struct FileSink {
    file: Mutex<RotatingFile>,
}

impl FileSink {
    pub fn new(file: RotatingFile) -> Self {
        Self {
            file: Mutex::new(file),
        }
    }
}

impl LogSink for FileSink {
    fn name(&self) -> &str {
        "file"
    }

    fn write(&self, _record: &LogRecord, line: &str) -> io::Result<()> {
        let mut file = self
            .file
            .lock()
            .map_err(|_| io::Error::new(io::ErrorKind::Other, "log file lock poisoned"))?;
        file.write_line(line)
    }
}

/// Keeps records in memory so they can be inspected later.
#[derive(Debug, Default, Clone)]
pub struct MemorySink {
    records: Arc<Mutex<Vec<LogRecord>>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn records(&self) -> Vec<LogRecord> {
        self.records.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    /// Records of one event kind.
    pub fn events(&self, kind: EventKind) -> Vec<LogRecord> {
        self.records().into_iter().filter(|r| r.event == kind).collect()
    }

    pub fn clear(&self) {
        self.records.lock().unwrap_or_else(|e| e.into_inner()).clear();
    }
}

impl LogSink for MemorySink {
    fn name(&self) -> &str {
        "memory"
    }

    fn write(&self, record: &LogRecord, _line: &str) -> io::Result<()> {
        self.records
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(record.clone());
        Ok(())
    }
}

struct SecondarySink {
    sink: Box<dyn LogSink>,
    failed: AtomicBool,
}

/// Security event log with a mandatory console sink.
pub struct SecurityLog {
    console: ConsoleSink,
    secondary: Vec<SecondarySink>,
}

impl Default for SecurityLog {
    fn default() -> Self {
        Self::console_only()
    }
}

impl SecurityLog {
    pub fn console_only() -> Self {
        Self {
            console: ConsoleSink,
            secondary: Vec::new(),
        }
    }

    /// Add a best-effort secondary sink.
    pub fn with_sink(mut self, sink: impl LogSink + 'static) -> Self {
        self.secondary.push(SecondarySink {
            sink: Box::new(sink),
            failed: AtomicBool::new(false),
        });
        self
    }

    /// Console plus the rotating file from `config`, if it can be opened.
    pub fn from_config(config: &LoggingConfig) -> Self {
        let log = Self::console_only();
        let Some(path) = config.file_path.as_deref() else {
            return log;
        };

        match RotatingFile::open(path, config.max_file_bytes, config.max_backups) {
            Ok(file) => {
                tracing::info!(path, "Security log file opened");
                log.with_sink(FileSink::new(file))
            }
            Err(e) => {
                tracing::warn!(path, error = %e, "File logging disabled");
                metrics::record_sink_failure("file");
                log
            }
        }
    }

    /// Number of secondary sinks still accepting records.
    pub fn healthy_sinks(&self) -> usize {
        self.secondary
            .iter()
            .filter(|s| !s.failed.load(Ordering::Relaxed))
            .count()
    }

    pub fn emit(&self, level: Level, event: EventKind, fields: EventFields) {
        let record = LogRecord {
            timestamp: Local::now().to_rfc3339_opts(SecondsFormat::Millis, false),
            level,
            event,
            fields,
        };
        let line = serde_json::to_string(&record).unwrap_or_else(|e| {
            format!(r#"{{"event":"{}","serialize_error":"{}"}}"#, event.as_str(), e)
        });

        let _ = self.console.write(&record, &line);

        for slot in &self.secondary {
            if slot.failed.load(Ordering::Relaxed) {
                continue;
            }
            if let Err(e) = slot.sink.write(&record, &line) {
                if !slot.failed.swap(true, Ordering::Relaxed) {
                    tracing::warn!(
                        sink = slot.sink.name(),
                        error = %e,
                        "Security log sink failed, continuing with remaining sinks"
                    );
                    metrics::record_sink_failure(slot.sink.name());
                }
            }
        }
    }
}
