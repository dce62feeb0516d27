//! HTTP collector transport
//!
//! POST sends the wire record as a form body, GET sends it as query pairs.
//! Relative URLs are resolved against the base URL with the optional prefix
//! in front, so `/event` under prefix `/6002x` goes to `<base>/6002x/event`.

use eyre::{Context, Result, eyre};
use std::time::Duration;
use tokio::runtime::Runtime;
use tokio::sync::oneshot;
use ureq::Agent;

use super::Transport;
use crate::config::CollectorConfig;
use crate::eventlog::delivery::{DeliveryHandle, DeliveryReceipt, DeliveryRequest, Method};

/// The owned delivery runtime is shut down in the background on drop, so
/// the transport may be dropped from inside another tokio runtime.
pub struct HttpTransport {
    base_url: String,
    prefix: Option<String>,
    agent: Agent,
    /// Only `None` once dropped
    runtime: Option<Runtime>,
}

impl HttpTransport {
    pub fn new(base_url: &str, prefix: Option<&str>, timeout: Duration) -> Result<Self> {
        let agent: Agent = Agent::config_builder().timeout_global(Some(timeout)).build().into();

        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(1)
            .thread_name("pagelog-delivery")
            .build()
            .context("Failed to create delivery runtime")?;

        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            prefix: prefix.map(normalize_prefix).filter(|p| !p.is_empty()),
            agent,
            runtime: Some(runtime),
        })
    }

    pub fn from_config(config: &CollectorConfig) -> Result<Self> {
        Self::new(
            &config.base_url,
            config.prefix.as_deref(),
            Duration::from_secs(config.timeout_secs),
        )
    }

    /// Absolute URL a request for `url` goes to
    pub fn resolve(&self, url: &str) -> String {
        resolve_url(&self.base_url, self.prefix.as_deref(), url)
    }
}

impl Transport for HttpTransport {
    fn send(&self, request: &DeliveryRequest) -> Result<DeliveryReceipt> {
        let url = self.resolve(&request.url);
        deliver(&self.agent, &url, request)
    }

    fn submit(&self, request: DeliveryRequest) -> DeliveryHandle {
        let url = self.resolve(&request.url);
        let agent = self.agent.clone();
        let Some(runtime) = self.runtime.as_ref() else {
            return DeliveryHandle::ready(Err(eyre!("Delivery runtime already shut down")));
        };
        let (tx, rx) = oneshot::channel();

        runtime.spawn_blocking(move || {
            let result = deliver(&agent, &url, &request);
            if let Err(ref e) = result {
                log::warn!("Async delivery of {} failed: {}", request.data.event_type, e);
            }
            // The caller may have dropped the handle
            let _ = tx.send(result);
        });

        DeliveryHandle::pending(rx)
    }
}

impl Drop for HttpTransport {
    fn drop(&mut self) {
        // Dropping a Runtime blocks, which panics inside an async context
        if let Some(runtime) = self.runtime.take() {
            runtime.shutdown_background();
        }
    }
}

fn deliver(agent: &Agent, url: &str, request: &DeliveryRequest) -> Result<DeliveryReceipt> {
    log::debug!(
        "{} {} event_type={}",
        request.method.as_str(),
        url,
        request.data.event_type
    );

    let pairs = request.data.pairs();
    let response = match request.method {
        Method::Post => agent.post(url).send_form(pairs),
        Method::Get => agent.get(url).query_pairs(pairs).call(),
    }
    .with_context(|| format!("{} {} failed", request.method.as_str(), url))?;

    Ok(DeliveryReceipt {
        status: response.status().as_u16(),
    })
}

fn normalize_prefix(prefix: &str) -> String {
    let trimmed = prefix.trim_matches('/');
    if trimmed.is_empty() {
        String::new()
    } else {
        format!("/{}", trimmed)
    }
}

pub fn resolve_url(base_url: &str, prefix: Option<&str>, url: &str) -> String {
    if url.starts_with("http://") || url.starts_with("https://") {
        return url.to_string();
    }

    let base = base_url.trim_end_matches('/');
    let prefix = prefix.map(normalize_prefix).unwrap_or_default();
    let path = if url.starts_with('/') {
        url.to_string()
    } else {
        format!("/{}", url)
    };

    format!("{}{}{}", base, prefix, path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::eventlog::delivery::{DeliveryOptions, DeliveryOverrides, WireRecord};
    use std::io::{Read, Write};
    use std::net::TcpListener;
    use std::thread;

    /// Accept one connection, capture the raw request, answer with `status`
    fn one_shot_server(status: &'static str) -> (String, thread::JoinHandle<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = format!("http://{}", listener.local_addr().unwrap());

        let handle = thread::spawn(move || {
            let (mut stream, _) = listener.accept().unwrap();
            let mut raw = Vec::new();
            let mut buf = [0u8; 4096];
            loop {
                let n = stream.read(&mut buf).unwrap();
                if n == 0 {
                    break;
                }
                raw.extend_from_slice(&buf[..n]);
                let text = String::from_utf8_lossy(&raw);
                if let Some(end) = text.find("\r\n\r\n") {
                    let length = text[..end]
                        .lines()
                        .find_map(|l| {
                            let lower = l.to_lowercase();
                            lower
                                .strip_prefix("content-length:")
                                .map(|v| v.trim().parse::<usize>().unwrap())
                        })
                        .unwrap_or(0);
                    if raw.len() >= end + 4 + length {
                        break;
                    }
                }
            }
            let response = format!("HTTP/1.1 {}\r\nContent-Length: 0\r\nConnection: close\r\n\r\n", status);
            stream.write_all(response.as_bytes()).unwrap();
            String::from_utf8_lossy(&raw).to_string()
        });

        (addr, handle)
    }

    fn record() -> WireRecord {
        WireRecord {
            event_type: "example".to_string(),
            event: "\"data\"".to_string(),
            page: "http://localhost/courses".to_string(),
        }
    }

    #[test]
    fn test_resolve_relative_without_prefix() {
        assert_eq!(
            resolve_url("http://localhost:8000/", None, "/event"),
            "http://localhost:8000/event"
        );
    }

    #[test]
    fn test_resolve_relative_with_prefix() {
        assert_eq!(
            resolve_url("http://localhost:8000", Some("/6002x"), "/event"),
            "http://localhost:8000/6002x/event"
        );
        assert_eq!(
            resolve_url("http://localhost:8000", Some("6002x/"), "event"),
            "http://localhost:8000/6002x/event"
        );
    }

    #[test]
    fn test_resolve_absolute_passes_through() {
        assert_eq!(
            resolve_url("http://localhost:8000", Some("/6002x"), "https://collector.example.com/e"),
            "https://collector.example.com/e"
        );
    }

    #[test]
    fn test_post_sends_form_body() {
        let (addr, server) = one_shot_server("200 OK");
        let transport = HttpTransport::new(&addr, None, Duration::from_secs(5)).unwrap();

        let request = DeliveryRequest::new(record(), DeliveryOptions::default());
        let receipt = transport.send(&request).unwrap();
        assert_eq!(receipt.status, 200);

        let raw = server.join().unwrap();
        assert!(raw.starts_with("POST /event "));
        assert!(raw.contains("event_type=example"));
        assert!(raw.to_lowercase().contains("application/x-www-form-urlencoded"));
    }

    #[test]
    fn test_get_sends_query_with_prefix() {
        let (addr, server) = one_shot_server("204 No Content");
        let transport = HttpTransport::new(&addr, Some("/6002x"), Duration::from_secs(5)).unwrap();

        let options = DeliveryOverrides::default()
            .method(Method::Get)
            .apply(&DeliveryOptions::default());
        let receipt = transport.send(&DeliveryRequest::new(record(), options)).unwrap();
        assert_eq!(receipt.status, 204);

        let raw = server.join().unwrap();
        assert!(raw.starts_with("GET /6002x/event?"));
        assert!(raw.contains("event_type=example"));
    }

    #[test]
    fn test_drop_inside_async_context() {
        let outer = tokio::runtime::Builder::new_current_thread().build().unwrap();

        outer.block_on(async {
            let transport = HttpTransport::new("http://127.0.0.1:9", None, Duration::from_secs(1)).unwrap();
            drop(transport);
        });
    }

    #[test]
    fn test_submit_reports_server_error() {
        let (addr, server) = one_shot_server("500 Internal Server Error");
        let transport = HttpTransport::new(&addr, None, Duration::from_secs(5)).unwrap();

        let handle = transport.submit(DeliveryRequest::new(record(), DeliveryOptions::default()));
        assert!(handle.is_pending());
        assert!(handle.wait().is_err());

        server.join().unwrap();
    }
}
