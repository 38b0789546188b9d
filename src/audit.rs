//! Activity log
//!
//! Appends one JSON line per auth or dispatch step so a checkout session can
//! be replayed afterwards. Writing never blocks the flow being logged.

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;

/// Entry in the activity log
#[derive(Debug, Serialize)]
pub struct AuditEntry {
    timestamp: DateTime<Utc>,
    entry_type: &'static str,
    status: &'static str,
    wallet: Option<String>,
    detail: Value,
    error: Option<String>,
    duration_ms: u64,
}

impl AuditEntry {
    pub fn new(entry_type: &'static str, status: &'static str) -> Self {
        Self {
            timestamp: Utc::now(),
            entry_type,
            status,
            wallet: None,
            detail: Value::Null,
            error: None,
            duration_ms: 0,
        }
    }

    pub fn wallet(mut self, wallet: impl Into<String>) -> Self {
        self.wallet = Some(wallet.into());
        self
    }

    pub fn detail(mut self, detail: Value) -> Self {
        self.detail = truncate_detail(detail);
        self
    }

    pub fn error(mut self, error: impl Into<String>) -> Self {
        self.error = Some(error.into());
        self
    }

    pub fn duration(mut self, elapsed: Duration) -> Self {
        self.duration_ms = elapsed.as_millis() as u64;
        self
    }
}

/// Writer for log entries
struct AuditLogWriter {
    path: PathBuf,
}

impl AuditLogWriter {
    fn new(path: PathBuf) -> Self {
        Self { path }
    }

    fn write(&self, entry: &AuditEntry) -> std::io::Result<()> {
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;

        let json = serde_json::to_string(entry)?;
        writeln!(file, "{}", json)?;
        Ok(())
    }
}

/// JSONL activity log shared by the gateway and dispatcher
#[derive(Clone)]
pub struct AuditLog {
    writer: Arc<Mutex<AuditLogWriter>>,
}

impl AuditLog {
    /// # Arguments
    /// * `log_path` - Path to the log file (JSONL format)
    pub fn new(log_path: impl Into<PathBuf>) -> Self {
        Self {
            writer: Arc::new(Mutex::new(AuditLogWriter::new(log_path.into()))),
        }
    }

    pub async fn record(&self, entry: AuditEntry) {
        let writer = self.writer.lock().await;
        if let Err(e) = writer.write(&entry) {
            tracing::warn!(error = %e, "Failed to write audit log entry");
        }
    }
}

impl std::fmt::Debug for AuditLog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuditLog").finish_non_exhaustive()
    }
}

/// Keep oversized details (large instruction lists) out of the log
fn truncate_detail(detail: Value) -> Value {
    let s = serde_json::to_string(&detail).unwrap_or_default();
    if s.len() > 1000 {
        let cut = (0..=1000).rev().find(|i| s.is_char_boundary(*i)).unwrap_or(0);
        serde_json::json!(format!("{}... [truncated]", &s[..cut]))
    } else {
        detail
    }
}
