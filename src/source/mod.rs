//! Remote people-search services.
//!
//! Every call goes through [`FailoverClient`], which attaches the active key
//! from a [`KeyPool`], classifies the response and rotates keys on rate
//! limits. Failures never escape: a call that can't be completed yields the
//! empty value of its response type.

pub mod apollo;
pub mod hunter;
pub mod types;

use crate::keys::KeyPool;
use anyhow::{Context, Result};
use serde::de::DeserializeOwned;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Get,
    Post,
}

/// Where a service expects its API key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyPlacement {
    Header(&'static str),
    Query(&'static str),
}

#[derive(Debug, Clone, PartialEq)]
pub struct ApiRequest {
    pub method: Method,
    pub url: String,
    pub query: Vec<(String, String)>,
    pub headers: Vec<(String, String)>,
    pub body: Option<serde_json::Value>,
}

impl ApiRequest {
    pub fn get(url: String) -> Self {
        Self {
            method: Method::Get,
            url,
            query: Vec::new(),
            headers: Vec::new(),
            body: None,
        }
    }

    pub fn post_json(url: String, body: serde_json::Value) -> Self {
        Self {
            method: Method::Post,
            url,
            query: Vec::new(),
            headers: Vec::new(),
            body: Some(body),
        }
    }

    pub fn query(mut self, name: &str, value: impl ToString) -> Self {
        self.query.push((name.to_string(), value.to_string()));
        self
    }

    pub fn header(mut self, name: &str, value: &str) -> Self {
        self.headers.push((name.to_string(), value.to_string()));
        self
    }

    fn with_key(&self, placement: KeyPlacement, key: &str) -> Self {
        let attempt = self.clone();
        match placement {
            KeyPlacement::Header(name) => attempt.header(name, key),
            KeyPlacement::Query(name) => attempt.query(name, key),
        }
    }

    /// The key attached to this request, if any.
    pub fn key(&self, placement: KeyPlacement) -> Option<&str> {
        let (pairs, wanted) = match placement {
            KeyPlacement::Header(name) => (&self.headers, name),
            KeyPlacement::Query(name) => (&self.query, name),
        };
        pairs
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(wanted))
            .map(|(_, v)| v.as_str())
    }
}

#[derive(Debug, Clone)]
pub struct ApiResponse {
    pub status: u16,
    pub body: String,
}

/// Sends one HTTP request. An `Err` means the request never got a response.
pub trait HttpTransport {
    fn send(&self, request: &ApiRequest) -> Result<ApiResponse>;
}

/// Blocking reqwest transport used by the binary.
#[derive(Clone)]
pub struct ReqwestTransport {
    client: reqwest::blocking::Client,
}

impl ReqwestTransport {
    pub fn new(timeout: Duration) -> Result<Self> {
        let client = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .build()
            .context("failed to build HTTP client")?;
        Ok(Self { client })
    }
}

impl HttpTransport for ReqwestTransport {
    fn send(&self, request: &ApiRequest) -> Result<ApiResponse> {
        let mut req = match request.method {
            Method::Get => self.client.get(&request.url),
            Method::Post => self.client.post(&request.url),
        };
        if !request.query.is_empty() {
            req = req.query(&request.query);
        }
        for (k, v) in &request.headers {
            req = req.header(k.as_str(), v.as_str());
        }
        if let Some(body) = &request.body {
            req = req.json(body);
        }

        let resp = req.send().context("request failed")?;
        let status = resp.status().as_u16();
        let body = resp.text().context("failed to read response body")?;
        Ok(ApiResponse { status, body })
    }
}

/// How a status code affects the key in use.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseClass {
    Success,
    /// Rate limit or quota (429 / 403): retire the key, back off, retry.
    Exhausted,
    /// Rejected key (401): retire it and retry at once.
    InvalidKey,
    /// Anything else: give up on this call.
    Failed,
}

pub fn classify(status: u16) -> ResponseClass {
    match status {
        429 | 403 => ResponseClass::Exhausted,
        401 => ResponseClass::InvalidKey,
        200..=299 => ResponseClass::Success,
        _ => ResponseClass::Failed,
    }
}

/// Request-with-failover engine shared by every service client.
pub struct FailoverClient<T> {
    transport: T,
    pool: KeyPool,
    placement: KeyPlacement,
    exhaustion_backoff: Duration,
}

impl<T: HttpTransport> FailoverClient<T> {
    pub fn new(
        transport: T,
        pool: KeyPool,
        placement: KeyPlacement,
        exhaustion_backoff: Duration,
    ) -> Self {
        Self {
            transport,
            pool,
            placement,
            exhaustion_backoff,
        }
    }

    pub fn pool(&self) -> &KeyPool {
        &self.pool
    }

    /// Run `request` with the active key, rotating on exhaustion.
    ///
    /// Uses at most one attempt per key in the pool. Any failure yields
    /// `R::default()`.
    pub fn execute<R>(&mut self, request: &ApiRequest) -> R
    where
        R: DeserializeOwned + Default,
    {
        while !self.pool.all_exhausted() {
            let attempt = match self.pool.current() {
                Some(key) => request.with_key(self.placement, key),
                None => return R::default(),
            };
            let label = self.pool.current_label();
            let service = self.pool.service().to_string();

            let resp = match self.transport.send(&attempt) {
                Ok(r) => r,
                Err(e) => {
                    tracing::warn!(service = %service, url = %request.url, "request error: {:#}", e);
                    return R::default();
                }
            };

            match classify(resp.status) {
                ResponseClass::Success => {
                    return match serde_json::from_str(&resp.body) {
                        Ok(parsed) => parsed,
                        Err(e) => {
                            tracing::warn!(service = %service, url = %request.url, error = %e, "unparseable response body");
                            R::default()
                        }
                    };
                }
                ResponseClass::Exhausted => {
                    tracing::warn!(
                        service = %service,
                        status = resp.status,
                        "rate limit / quota hit on {}",
                        label,
                    );
                    if !self.pool.mark_exhausted() {
                        return R::default();
                    }
                    if !self.exhaustion_backoff.is_zero() {
                        std::thread::sleep(self.exhaustion_backoff);
                    }
                }
                ResponseClass::InvalidKey => {
                    tracing::warn!(service = %service, status = resp.status, "invalid key ({}), skipping it", label);
                    if !self.pool.mark_exhausted() {
                        return R::default();
                    }
                }
                ResponseClass::Failed => {
                    tracing::warn!(
                        service = %service,
                        status = resp.status,
                        url = %request.url,
                        "HTTP error: {}",
                        truncate(&resp.body, 200),
                    );
                    return R::default();
                }
            }
        }
        R::default()
    }
}

fn truncate(s: &str, max: usize) -> &str {
    match s.char_indices().nth(max) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}

/// A service client whose calls are limited by a key pool.
pub trait RateLimited {
    fn pool(&self) -> &KeyPool;

    fn is_exhausted(&self) -> bool {
        self.pool().all_exhausted()
    }

    fn key_label(&self) -> String {
        self.pool().current_label()
    }
}
