//! Delivery requests and their in-flight handles
//!
//! A logged event becomes a [`DeliveryRequest`]: the wire record
//! (`event_type`, `event`, `page`) plus the options that say where and how
//! to send it. Options start from [`DeliveryOptions`] defaults and callers
//! override individual fields with [`DeliveryOverrides`].

use clap::ValueEnum;
use eyre::{Result, eyre};
use serde::{Deserialize, Serialize};
use tokio::sync::oneshot;

/// Default collector endpoint, relative to the configured base URL
pub const DEFAULT_ENDPOINT: &str = "/event";

/// HTTP method used for delivery
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Method {
    /// Form-encoded body
    Post,
    /// Query-string parameters
    Get,
}

impl Method {
    pub fn as_str(&self) -> &'static str {
        match self {
            Method::Post => "POST",
            Method::Get => "GET",
        }
    }
}

/// Whether `log` waits for the collector before returning
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DeliveryMode {
    /// Submit and return a pending handle immediately
    Async,
    /// Perform the call before returning
    Blocking,
}

/// Fully resolved delivery options
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct DeliveryOptions {
    pub url: String,
    pub method: Method,
    pub mode: DeliveryMode,
}

impl Default for DeliveryOptions {
    fn default() -> Self {
        Self {
            url: DEFAULT_ENDPOINT.to_string(),
            method: Method::Post,
            mode: DeliveryMode::Async,
        }
    }
}

/// Per-call overrides. Unset fields keep the default.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeliveryOverrides {
    pub url: Option<String>,
    pub method: Option<Method>,
    pub mode: Option<DeliveryMode>,
}

impl DeliveryOverrides {
    pub fn url(mut self, url: impl Into<String>) -> Self {
        self.url = Some(url.into());
        self
    }

    pub fn method(mut self, method: Method) -> Self {
        self.method = Some(method);
        self
    }

    pub fn mode(mut self, mode: DeliveryMode) -> Self {
        self.mode = Some(mode);
        self
    }

    /// Merge onto `defaults` field by field
    pub fn apply(&self, defaults: &DeliveryOptions) -> DeliveryOptions {
        DeliveryOptions {
            url: self.url.clone().unwrap_or_else(|| defaults.url.clone()),
            method: self.method.unwrap_or(defaults.method),
            mode: self.mode.unwrap_or(defaults.mode),
        }
    }
}

/// What the collector receives
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct WireRecord {
    pub event_type: String,
    /// JSON serialization of the payload (empty for `page_close`)
    pub event: String,
    pub page: String,
}

impl WireRecord {
    pub fn pairs(&self) -> [(&'static str, &str); 3] {
        [
            ("event_type", self.event_type.as_str()),
            ("event", self.event.as_str()),
            ("page", self.page.as_str()),
        ]
    }
}

/// A wire record plus the options it is sent with
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct DeliveryRequest {
    pub url: String,
    pub method: Method,
    pub mode: DeliveryMode,
    pub data: WireRecord,
}

impl DeliveryRequest {
    pub fn new(data: WireRecord, options: DeliveryOptions) -> Self {
        Self {
            url: options.url,
            method: options.method,
            mode: options.mode,
            data,
        }
    }
}

/// Outcome of a successful delivery
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DeliveryReceipt {
    pub status: u16,
}

enum HandleState {
    Ready(Result<DeliveryReceipt>),
    Pending(oneshot::Receiver<Result<DeliveryReceipt>>),
}

/// Handle to a delivery that may still be in flight
pub struct DeliveryHandle {
    state: HandleState,
}

impl DeliveryHandle {
    /// A delivery that has already completed
    pub fn ready(result: Result<DeliveryReceipt>) -> Self {
        Self {
            state: HandleState::Ready(result),
        }
    }

    /// A delivery whose result arrives on `rx`
    pub fn pending(rx: oneshot::Receiver<Result<DeliveryReceipt>>) -> Self {
        Self {
            state: HandleState::Pending(rx),
        }
    }

    pub fn is_pending(&self) -> bool {
        matches!(self.state, HandleState::Pending(_))
    }

    /// Block until the delivery finishes. Must not be called from inside an async runtime.
    pub fn wait(self) -> Result<DeliveryReceipt> {
        match self.state {
            HandleState::Ready(result) => result,
            HandleState::Pending(rx) => rx
                .blocking_recv()
                .map_err(|_| eyre!("Delivery task dropped before reporting a result"))?,
        }
    }
}

impl std::fmt::Debug for DeliveryHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = match &self.state {
            HandleState::Ready(Ok(_)) => "ready(ok)",
            HandleState::Ready(Err(_)) => "ready(err)",
            HandleState::Pending(_) => "pending",
        };
        f.debug_struct("DeliveryHandle").field("state", &state).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_options() {
        let options = DeliveryOptions::default();
        assert_eq!(options.url, "/event");
        assert_eq!(options.method, Method::Post);
        assert_eq!(options.mode, DeliveryMode::Async);
    }

    #[test]
    fn test_overrides_keep_unset_fields() {
        let overrides = DeliveryOverrides::default()
            .method(Method::Get)
            .mode(DeliveryMode::Blocking);

        let merged = overrides.apply(&DeliveryOptions::default());

        assert_eq!(merged.url, "/event");
        assert_eq!(merged.method, Method::Get);
        assert_eq!(merged.mode, DeliveryMode::Blocking);
    }

    #[test]
    fn test_overrides_url_only() {
        let merged = DeliveryOverrides::default()
            .url("/other")
            .apply(&DeliveryOptions::default());

        assert_eq!(merged.url, "/other");
        assert_eq!(merged.method, Method::Post);
        assert_eq!(merged.mode, DeliveryMode::Async);
    }

    #[test]
    fn test_wire_record_serializes_field_names() {
        let record = WireRecord {
            event_type: "example".to_string(),
            event: "\"data\"".to_string(),
            page: "http://localhost/courses".to_string(),
        };

        let json = serde_json::to_value(&record).expect("serialize");
        assert_eq!(json["event_type"], "example");
        assert_eq!(json["event"], "\"data\"");
        assert_eq!(json["page"], "http://localhost/courses");
    }

    #[test]
    fn test_ready_handle_returns_result() {
        let handle = DeliveryHandle::ready(Ok(DeliveryReceipt { status: 204 }));
        assert!(!handle.is_pending());
        assert_eq!(handle.wait().expect("ok").status, 204);
    }

    #[test]
    fn test_pending_handle_receives_result() {
        let (tx, rx) = oneshot::channel();
        let handle = DeliveryHandle::pending(rx);
        assert!(handle.is_pending());

        tx.send(Ok(DeliveryReceipt { status: 200 })).expect("send");
        assert_eq!(handle.wait().expect("ok").status, 200);
    }

    #[test]
    fn test_pending_handle_dropped_sender_is_error() {
        let (tx, rx) = oneshot::channel::<Result<DeliveryReceipt>>();
        drop(tx);

        let err = DeliveryHandle::pending(rx).wait().unwrap_err();
        assert!(err.to_string().contains("dropped"));
    }
}
