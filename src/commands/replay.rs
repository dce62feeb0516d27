//! Replay a recorded page session
//!
//! Each input line is `{"event_type": ..., "data": ..., "element": ...}`.
//! Every event is logged in order, all deliveries are awaited, then the
//! `page_close` flush runs as it would when the page unloads.

use colored::*;
use eyre::{Context, Result};
use serde::Deserialize;
use std::fs::File;
use std::io::{self, BufRead, BufReader};
use std::path::Path;

use crate::eventlog::{self, delivery::DeliveryOverrides};

/// One line of a session file
#[derive(Debug, Deserialize)]
pub struct SessionEvent {
    pub event_type: String,
    #[serde(default)]
    pub data: serde_json::Value,
    #[serde(default)]
    pub element: Option<String>,
}

pub fn run(file: Option<&Path>, no_flush: bool) -> Result<()> {
    let reader: Box<dyn BufRead> = match file {
        Some(path) => Box::new(BufReader::new(
            File::open(path).with_context(|| format!("Failed to open {}", path.display()))?,
        )),
        None => Box::new(BufReader::new(io::stdin())),
    };

    let events = read_session(reader)?;
    log::info!("Replaying {} events", events.len());

    if !no_flush {
        eventlog::bind()?;
    }

    // A failing event stops the replay, but what was already logged is
    // still awaited and the flush still runs.
    let mut handles = Vec::with_capacity(events.len());
    let mut aborted = None;
    for (index, event) in events.iter().enumerate() {
        match eventlog::log_event(
            &event.event_type,
            &event.data,
            event.element.as_deref(),
            &DeliveryOverrides::default(),
        ) {
            Ok(handle) => handles.push((event.event_type.as_str(), handle)),
            Err(e) => {
                aborted = Some(e.wrap_err(format!("Event {} ({}) failed", index + 1, event.event_type)));
                break;
            }
        }
    }

    let logged = handles.len();
    let mut failed = 0;
    for (event_type, handle) in handles {
        if let Err(e) = handle.wait() {
            log::warn!("Delivery of {} failed: {}", event_type, e);
            eprintln!("{} {}: {:#}", "✗".red(), event_type, e);
            failed += 1;
        }
    }

    let flushed = !no_flush && eventlog::shutdown();

    if let Some(e) = aborted {
        log::error!("Replay stopped after {} of {} events", logged, events.len());
        return Err(e);
    }

    println!(
        "{} Replayed {} events ({} failed){}",
        if failed == 0 { "✓".green() } else { "⚠".yellow() },
        events.len(),
        failed,
        if flushed { ", sent page_close" } else { "" }
    );

    Ok(())
}

/// Parse a JSONL session, skipping blank lines
pub fn read_session(reader: impl BufRead) -> Result<Vec<SessionEvent>> {
    let mut events = Vec::new();
    for (index, line) in reader.lines().enumerate() {
        let line = line.context("Failed to read session")?;
        if line.trim().is_empty() {
            continue;
        }
        let event: SessionEvent =
            serde_json::from_str(&line).with_context(|| format!("Invalid session line {}", index + 1))?;
        events.push(event);
    }
    Ok(events)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_read_session() {
        let input = r#"{"event_type": "seq_goto", "data": {"old": 1, "new": 2}, "element": "seq_contents_0"}

{"event_type": "play_video"}
"#;
        let events = read_session(input.as_bytes()).expect("parse");

        assert_eq!(events.len(), 2);
        assert_eq!(events[0].event_type, "seq_goto");
        assert_eq!(events[0].data, json!({"old": 1, "new": 2}));
        assert_eq!(events[0].element.as_deref(), Some("seq_contents_0"));
        assert_eq!(events[1].data, json!(null));
        assert!(events[1].element.is_none());
    }

    #[test]
    fn test_read_session_reports_bad_line() {
        let input = "{\"event_type\": \"ok\"}\nnot json\n";
        let err = read_session(input.as_bytes()).unwrap_err();
        assert!(err.to_string().contains("line 2"));
    }
}
