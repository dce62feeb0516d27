//! Delivery transports
//!
//! A transport turns a [`DeliveryRequest`] into a call against the collector.
//! - `http` - ureq client, with an optional URL prefix
//! - `memory` - records requests instead of sending them

use eyre::Result;

use crate::eventlog::delivery::{DeliveryHandle, DeliveryReceipt, DeliveryRequest};

pub mod http;
pub mod memory;

pub use http::HttpTransport;
pub use memory::MemoryTransport;

/// Capability to deliver events to a collector
pub trait Transport: Send + Sync {
    /// Perform the call and wait for the result
    fn send(&self, request: &DeliveryRequest) -> Result<DeliveryReceipt>;

    /// Start the call and return without waiting
    fn submit(&self, request: DeliveryRequest) -> DeliveryHandle {
        DeliveryHandle::ready(self.send(&request))
    }
}

/// Source of the current page URL, read at dispatch time
pub trait PageLocation: Send + Sync {
    fn current_page(&self) -> String;
}

/// A page URL that never changes
#[derive(Debug, Clone)]
pub struct StaticPage(pub String);

impl PageLocation for StaticPage {
    fn current_page(&self) -> String {
        self.0.clone()
    }
}
