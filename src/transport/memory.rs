//! Recording transport

#![allow(dead_code)] // set_failing/len - for tests

use eyre::{Result, bail};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, PoisonError};

use super::Transport;
use crate::eventlog::delivery::{DeliveryReceipt, DeliveryRequest};

/// Keeps every request it is given, in order. Used by `--dry-run`.
#[derive(Default)]
pub struct MemoryTransport {
    requests: Mutex<Vec<DeliveryRequest>>,
    failing: AtomicBool,
}

impl MemoryTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every later send fail. The request is still recorded.
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub fn requests(&self) -> Vec<DeliveryRequest> {
        self.requests.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    pub fn len(&self) -> usize {
        self.requests.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Transport for MemoryTransport {
    fn send(&self, request: &DeliveryRequest) -> Result<DeliveryReceipt> {
        self.requests
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(request.clone());

        if self.failing.load(Ordering::SeqCst) {
            bail!("Delivery to {} failed: transport set to fail", request.url);
        }
        Ok(DeliveryReceipt { status: 200 })
    }
}
