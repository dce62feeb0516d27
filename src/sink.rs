//! Listener sinks declared in configuration
//!
//! Each configured listener echoes the events it matches:
//! - Stdout - prints a formatted line
//! - File (JSONL) - appends to `<events>/YYYY-MM/YYYY-MM-DD.jsonl`

use chrono::{Local, Utc};
use colored::*;
use eyre::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::config::{ListenerConfig, SinkKind};
use crate::eventlog::{ElementScope, EventLog, Listener};

/// What a sink records for one dispatched event
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SinkRecord {
    /// Timestamp (UTC ISO 8601)
    pub timestamp: String,
    /// Local time for display
    pub local_time: String,
    pub event_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub element: Option<String>,
    pub payload: serde_json::Value,
}

impl SinkRecord {
    pub fn new(event_type: &str, payload: &serde_json::Value, scope: &ElementScope) -> Self {
        Self {
            timestamp: Utc::now().to_rfc3339(),
            local_time: Local::now().format("%Y-%m-%d %H:%M:%S").to_string(),
            event_type: event_type.to_string(),
            element: scope.as_deref().map(str::to_string),
            payload: payload.clone(),
        }
    }

    /// Format for stdout display
    pub fn format_display(&self) -> String {
        let event_colored = match self.event_type.as_str() {
            "page_close" => self.event_type.red(),
            t if t.starts_with("edx.") => self.event_type.cyan(),
            _ => self.event_type.normal(),
        };

        let mut parts = vec![self.local_time.dimmed().to_string(), event_colored.to_string()];

        if let Some(ref element) = self.element {
            parts.push(format!("[{}]", element).dimmed().to_string());
        }

        parts.push(self.payload.to_string());

        parts.join(" ")
    }
}

fn emit_to_stdout(record: &SinkRecord) {
    println!("{}", record.format_display());
}

fn emit_to_file(events_dir: &Path, record: &SinkRecord) -> Result<()> {
    let now = Local::now();
    let month_dir = events_dir.join(now.format("%Y-%m").to_string());
    fs::create_dir_all(&month_dir).context("Failed to create events directory")?;

    let log_file = month_dir.join(format!("{}.jsonl", now.format("%Y-%m-%d")));

    let mut file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(&log_file)
        .with_context(|| format!("Failed to open {}", log_file.display()))?;

    let json = serde_json::to_string(record).context("Failed to serialize sink record")?;
    writeln!(file, "{}", json)?;

    Ok(())
}

/// Build the callback for one configured listener
pub fn listener_for(kind: SinkKind, events_dir: PathBuf) -> Listener {
    match kind {
        SinkKind::Stdout => Arc::new(|event_type: &str, payload: &serde_json::Value, scope: &ElementScope| -> Result<()> {
            emit_to_stdout(&SinkRecord::new(event_type, payload, scope));
            Ok(())
        }),
        SinkKind::File => Arc::new(move |event_type: &str, payload: &serde_json::Value, scope: &ElementScope| {
            emit_to_file(&events_dir, &SinkRecord::new(event_type, payload, scope))
        }),
    }
}

/// Register every configured listener on `log`
pub fn register_all(log: &EventLog, listeners: &[ListenerConfig], events_dir: &Path) -> Result<usize> {
    for listener in listeners {
        let scope = ElementScope::from(listener.element.as_deref());
        log.listen_arc(&listener.event_type, scope, listener_for(listener.sink, events_dir.to_path_buf()))
            .with_context(|| format!("Invalid listener for '{}'", listener.event_type))?;
    }
    Ok(listeners.len())
}
