//! Event log: listener dispatch plus collector delivery
//!
//! `log` runs every listener registered under the exact `(event_type, scope)`
//! key, in registration order, then hands the event to the transport. A
//! listener error stops the remaining listeners and the delivery.
//!
//! There is no wildcard join between a concrete element and
//! [`ElementScope::Unknown`]: a listener registered for `Unknown` only fires
//! for dispatches that also carry `Unknown`.

#![allow(dead_code)] // embedding API (builders, accessors) only partly used by the CLI

use eyre::{Context, Result, bail, eyre};
use once_cell::sync::{Lazy, OnceCell};
use serde::Serialize;
use std::fmt;
use std::sync::Arc;

pub mod delivery;
pub mod lifecycle;
pub mod registry;

use crate::config::CollectorConfig;
use crate::transport::{HttpTransport, PageLocation, StaticPage, Transport};
use delivery::{DeliveryHandle, DeliveryMode, DeliveryOptions, DeliveryOverrides, DeliveryRequest, Method, WireRecord};
use lifecycle::ShutdownHook;
use registry::ListenerRegistry;

/// Event type sent by the unload flush
pub const PAGE_CLOSE: &str = "page_close";

/// Which element an event concerns
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(untagged)]
pub enum ElementScope {
    Known(String),
    /// Element not known at dispatch, or "any element" at registration
    Unknown,
}

impl ElementScope {
    pub fn known(id: impl Into<String>) -> Self {
        Self::Known(id.into())
    }

    pub fn as_deref(&self) -> Option<&str> {
        match self {
            Self::Known(id) => Some(id),
            Self::Unknown => None,
        }
    }
}

impl From<Option<&str>> for ElementScope {
    fn from(element: Option<&str>) -> Self {
        match element {
            Some(id) => Self::Known(id.to_string()),
            None => Self::Unknown,
        }
    }
}

impl From<Option<String>> for ElementScope {
    fn from(element: Option<String>) -> Self {
        match element {
            Some(id) => Self::Known(id),
            None => Self::Unknown,
        }
    }
}

impl fmt::Display for ElementScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Known(id) => write!(f, "{}", id),
            Self::Unknown => write!(f, "*"),
        }
    }
}

/// Callback run when a matching event is logged
pub type Listener = Arc<dyn Fn(&str, &serde_json::Value, &ElementScope) -> Result<()> + Send + Sync>;

pub struct EventLog {
    registry: ListenerRegistry,
    transport: Arc<dyn Transport>,
    page: Arc<dyn PageLocation>,
    defaults: DeliveryOptions,
}

impl EventLog {
    pub fn new(transport: Arc<dyn Transport>, page: Arc<dyn PageLocation>) -> Self {
        Self {
            registry: ListenerRegistry::new(),
            transport,
            page,
            defaults: DeliveryOptions::default(),
        }
    }

    /// Replace the delivery defaults every `log` call starts from
    pub fn with_defaults(mut self, defaults: DeliveryOptions) -> Self {
        self.defaults = defaults;
        self
    }

    /// Build an event log that delivers over HTTP per `config`
    pub fn from_config(config: &CollectorConfig) -> Result<Self> {
        let transport = HttpTransport::from_config(config)?;
        let defaults = DeliveryOptions {
            url: config.endpoint.clone(),
            ..DeliveryOptions::default()
        };
        Ok(Self::new(Arc::new(transport), Arc::new(StaticPage(config.page.clone()))).with_defaults(defaults))
    }

    pub fn defaults(&self) -> &DeliveryOptions {
        &self.defaults
    }

    pub fn listener_count(&self) -> usize {
        self.registry.len()
    }

    /// Register `callback` for events of `event_type` carrying exactly `scope`
    pub fn listen<F>(&self, event_type: &str, scope: ElementScope, callback: F) -> Result<()>
    where
        F: Fn(&str, &serde_json::Value, &ElementScope) -> Result<()> + Send + Sync + 'static,
    {
        self.listen_arc(event_type, scope, Arc::new(callback))
    }

    pub fn listen_arc(&self, event_type: &str, scope: ElementScope, listener: Listener) -> Result<()> {
        validate_event_type(event_type)?;
        log::debug!("Listening for {} on {}", event_type, scope);
        self.registry.register(event_type, scope, listener);
        Ok(())
    }

    /// Log with default scope and delivery options
    pub fn log<T: Serialize + ?Sized>(&self, event_type: &str, payload: &T) -> Result<DeliveryHandle> {
        self.log_with(event_type, payload, ElementScope::Unknown, &DeliveryOverrides::default())
    }

    /// Dispatch to matching listeners, then deliver to the collector
    pub fn log_with<T: Serialize + ?Sized>(
        &self,
        event_type: &str,
        payload: &T,
        scope: ElementScope,
        overrides: &DeliveryOverrides,
    ) -> Result<DeliveryHandle> {
        validate_event_type(event_type)?;
        let payload =
            serde_json::to_value(payload).with_context(|| format!("Failed to serialize {} payload", event_type))?;

        // Listeners added during dispatch are not part of this pass
        let listeners = self.registry.snapshot(event_type, &scope);
        log::debug!("Dispatching {} on {} to {} listener(s)", event_type, scope, listeners.len());
        for listener in &listeners {
            listener(event_type, &payload, &scope)?;
        }

        let data = WireRecord {
            event_type: event_type.to_string(),
            event: payload.to_string(),
            page: self.page.current_page(),
        };
        let request = DeliveryRequest::new(data, overrides.apply(&self.defaults));
        Ok(self.deliver(request))
    }

    fn deliver(&self, request: DeliveryRequest) -> DeliveryHandle {
        match request.mode {
            DeliveryMode::Async => self.transport.submit(request),
            DeliveryMode::Blocking => DeliveryHandle::ready(self.transport.send(&request)),
        }
    }

    /// Install the `page_close` flush into `hook`, replacing what was there
    pub fn bind_unload_flush(&self, hook: &ShutdownHook) {
        let transport = Arc::clone(&self.transport);
        let page = Arc::clone(&self.page);
        let url = self.defaults.url.clone();

        hook.install(move || {
            let request = DeliveryRequest::new(
                WireRecord {
                    event_type: PAGE_CLOSE.to_string(),
                    event: String::new(),
                    page: page.current_page(),
                },
                DeliveryOptions {
                    url,
                    method: Method::Get,
                    mode: DeliveryMode::Blocking,
                },
            );
            match transport.send(&request) {
                Ok(receipt) => log::info!("Sent {} (status {})", PAGE_CLOSE, receipt.status),
                Err(e) => log::warn!("Failed to send {}: {}", PAGE_CLOSE, e),
            }
        });
    }
}

fn validate_event_type(event_type: &str) -> Result<()> {
    if event_type.trim().is_empty() {
        bail!("Event type must not be empty");
    }
    Ok(())
}

static GLOBAL: OnceCell<EventLog> = OnceCell::new();
static SHUTDOWN: Lazy<ShutdownHook> = Lazy::new(ShutdownHook::new);

/// Set the process-wide event log. Fails if one is already in place.
pub fn install(log: EventLog) -> Result<()> {
    GLOBAL
        .set(log)
        .map_err(|_| eyre!("Process-wide event log is already installed"))
}

/// The process-wide event log, built from default configuration if none was installed
pub fn global() -> Result<&'static EventLog> {
    GLOBAL.get_or_try_init(|| EventLog::from_config(&CollectorConfig::default()))
}

/// Log through the process-wide event log
pub fn log_event<T: Serialize + ?Sized>(
    event_type: &str,
    payload: &T,
    element: Option<&str>,
    overrides: &DeliveryOverrides,
) -> Result<DeliveryHandle> {
    global()?.log_with(event_type, payload, element.into(), overrides)
}

/// Bind the process-wide event log's `page_close` flush to the process shutdown hook
pub fn bind() -> Result<()> {
    global()?.bind_unload_flush(&SHUTDOWN);
    Ok(())
}

/// Fire the process shutdown hook. Returns whether a flush ran.
pub fn shutdown() -> bool {
    SHUTDOWN.fire()
}
