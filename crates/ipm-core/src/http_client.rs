//! Blocking HTTP client: connection reuse via a single Agent, optional retry.
//!
//! Requests are issued one at a time by the install pipeline; retries are off
//! unless `IPM_HTTP_RETRIES` asks for them.

use std::fs::File;
use std::io::{Read, Write};
use std::path::Path;
use std::time::Duration;

use serde::de::DeserializeOwned;

use crate::error::{IpmError, Result};

const REQUEST_TIMEOUT_MS: u64 = 30_000;
const MAX_IDLE_PER_HOST: usize = 8;
const DEFAULT_RETRY_COUNT: usize = 0;
const DEFAULT_RETRY_BACKOFF_MS: u64 = 250;
const MAX_RETRY_BACKOFF_MS: u64 = 5_000;

fn retry_count_from_env() -> usize {
    std::env::var("IPM_HTTP_RETRIES")
        .ok()
        .and_then(|v| v.parse::<usize>().ok())
        .unwrap_or(DEFAULT_RETRY_COUNT)
}

/// One Agent (connection reuse) plus headers sent on every request.
#[derive(Clone)]
pub struct HttpClient {
    agent: ureq::Agent,
    default_headers: Vec<(String, String)>,
    retries: usize,
}

impl HttpClient {
    pub fn new() -> Self {
        let agent = ureq::AgentBuilder::new()
            .timeout(Duration::from_millis(REQUEST_TIMEOUT_MS))
            .max_idle_connections_per_host(MAX_IDLE_PER_HOST)
            .build();
        Self {
            agent,
            default_headers: Vec::new(),
            retries: retry_count_from_env(),
        }
    }

    pub fn with_header(mut self, name: &str, value: &str) -> Self {
        self.default_headers.push((name.to_string(), value.to_string()));
        self
    }

    /// GET url and decode the JSON body.
    pub fn get_json<T: DeserializeOwned>(&self, url: &str) -> Result<T> {
        self.get_json_with_query(url, &[])
    }

    /// GET url with `query` pairs appended (ureq encodes them) and decode the JSON body.
    pub fn get_json_with_query<T: DeserializeOwned>(
        &self,
        url: &str,
        query: &[(&str, &str)],
    ) -> Result<T> {
        let body = self.read_body(url, query)?;
        serde_json::from_slice(&body).map_err(|source| IpmError::Decode {
            url: url.to_string(),
            source,
        })
    }

    /// GET url and return the raw body (binary response mode).
    pub fn get_bytes(&self, url: &str) -> Result<Vec<u8>> {
        self.read_body(url, &[])
    }

    fn read_body(&self, url: &str, query: &[(&str, &str)]) -> Result<Vec<u8>> {
        let resp = self.send_with_retry(url, query)?;
        let hint = resp
            .header("Content-Length")
            .and_then(|v| v.parse::<usize>().ok())
            .unwrap_or(0);
        let mut buf = Vec::with_capacity(hint);
        resp.into_reader()
            .read_to_end(&mut buf)
            .map_err(|e| network_error(url, None, e.to_string()))?;
        Ok(buf)
    }

    /// GET url and stream the body into `dest` (for tarballs).
    pub fn get_to_file(&self, url: &str, dest: &Path) -> Result<()> {
        let resp = self.send_with_retry(url, &[])?;
        let mut out = File::create(dest).map_err(|e| IpmError::io("create download file", dest, e))?;
        let mut reader = resp.into_reader();
        std::io::copy(&mut reader, &mut out).map_err(|e| IpmError::io("write download", dest, e))?;
        out.flush().map_err(|e| IpmError::io("write download", dest, e))?;
        Ok(())
    }

    fn send_with_retry(&self, url: &str, query: &[(&str, &str)]) -> Result<ureq::Response> {
        let mut attempt = 0usize;
        let mut backoff = DEFAULT_RETRY_BACKOFF_MS;
        loop {
            attempt += 1;
            let mut req = self.agent.get(url);
            for (k, v) in &self.default_headers {
                req = req.set(k, v);
            }
            for (k, v) in query {
                req = req.query(k, v);
            }
            match req.call() {
                Ok(resp) => return Ok(resp),
                Err(ureq::Error::Status(code, resp)) => {
                    let retryable = code >= 500 || code == 429;
                    if !retryable || attempt > self.retries {
                        return Err(status_error(url, code, resp));
                    }
                }
                Err(e) => {
                    if attempt > self.retries {
                        return Err(network_error(url, None, e.to_string()));
                    }
                }
            }
            tracing::debug!("GET {} failed (attempt {}), retrying in {}ms", url, attempt, backoff);
            std::thread::sleep(Duration::from_millis(backoff));
            backoff = backoff.saturating_mul(2).min(MAX_RETRY_BACKOFF_MS);
        }
    }
}

impl Default for HttpClient {
    fn default() -> Self {
        Self::new()
    }
}

fn network_error(url: &str, status: Option<u16>, message: String) -> IpmError {
    IpmError::Network {
        url: url.to_string(),
        status,
        message,
    }
}

/// Turn an error status into a message, appending the server's `message` field if any.
fn status_error(url: &str, code: u16, resp: ureq::Response) -> IpmError {
    let mut message = if code == 404 {
        format!("HTTP {}: not found", code)
    } else {
        format!("HTTP {}: {}", code, resp.status_text())
    };
    if let Ok(body) = resp.into_string() {
        if let Some(detail) = serde_json::from_str::<serde_json::Value>(&body)
            .ok()
            .and_then(|v| v.get("message").and_then(|m| m.as_str()).map(String::from))
        {
            message.push_str(" - ");
            message.push_str(&detail);
        }
    }
    network_error(url, Some(code), message)
}
