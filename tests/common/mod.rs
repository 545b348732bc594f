// Shared test doubles for the integration tests.
#![allow(dead_code)]

use anyhow::Result;
use recruit_harvest::contact::Organization;
use recruit_harvest::source::{ApiRequest, ApiResponse, HttpTransport};
use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;

enum Reply {
    Status(u16, String),
    NetworkError,
}

struct Route {
    url_contains: String,
    replies: VecDeque<Reply>,
}

#[derive(Default)]
struct Inner {
    routes: Vec<Route>,
    requests: Vec<ApiRequest>,
}

/// Scripted transport: replies are queued per URL fragment and consumed in
/// order. Unscripted requests get a 404. Every request is recorded.
#[derive(Clone, Default)]
pub struct MockTransport {
    inner: Rc<RefCell<Inner>>,
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reply(&self, url_contains: &str, status: u16, body: &str) -> &Self {
        self.push(url_contains, Reply::Status(status, body.to_string()));
        self
    }

    pub fn fail(&self, url_contains: &str) -> &Self {
        self.push(url_contains, Reply::NetworkError);
        self
    }

    fn push(&self, url_contains: &str, reply: Reply) {
        let mut inner = self.inner.borrow_mut();
        match inner.routes.iter_mut().find(|r| r.url_contains == url_contains) {
            Some(route) => route.replies.push_back(reply),
            None => inner.routes.push(Route {
                url_contains: url_contains.to_string(),
                replies: VecDeque::from([reply]),
            }),
        }
    }

    pub fn requests(&self) -> Vec<ApiRequest> {
        self.inner.borrow().requests.clone()
    }

    pub fn count(&self, url_contains: &str) -> usize {
        self.inner
            .borrow()
            .requests
            .iter()
            .filter(|r| r.url.contains(url_contains))
            .count()
    }
}

impl HttpTransport for MockTransport {
    fn send(&self, request: &ApiRequest) -> Result<ApiResponse> {
        let mut inner = self.inner.borrow_mut();
        inner.requests.push(request.clone());
        let reply = inner
            .routes
            .iter_mut()
            .find(|r| request.url.contains(&r.url_contains) && !r.replies.is_empty())
            .and_then(|r| r.replies.pop_front());
        match reply {
            Some(Reply::Status(status, body)) => Ok(ApiResponse { status, body }),
            Some(Reply::NetworkError) => anyhow::bail!("connection refused"),
            None => Ok(ApiResponse {
                status: 404,
                body: "unscripted".to_string(),
            }),
        }
    }
}

pub fn org(name: &str, domain: &str) -> Organization {
    Organization {
        name: name.to_string(),
        domain: domain.to_string(),
        careers_url: String::new(),
    }
}

pub fn apollo_people(people: &[(&str, &str, &str)]) -> String {
    let people: Vec<serde_json::Value> = people
        .iter()
        .map(|(first, last, email)| {
            let email = if email.is_empty() {
                serde_json::Value::Null
            } else {
                serde_json::Value::from(*email)
            };
            serde_json::json!({
                "first_name": first,
                "last_name": last,
                "title": "Technical Recruiter",
                "email": email,
                "linkedin_url": format!("https://linkedin.com/in/{}{}", first.to_lowercase(), last.to_lowercase()),
            })
        })
        .collect();
    serde_json::json!({ "people": people }).to_string()
}

pub fn apollo_match(email: &str) -> String {
    serde_json::json!({
        "person": { "first_name": "x", "last_name": "y", "email": email, "linkedin_url": "https://linkedin.com/in/match" }
    })
    .to_string()
}

pub fn hunter_emails(entries: &[(&str, &str, &str)]) -> String {
    let emails: Vec<serde_json::Value> = entries
        .iter()
        .map(|(first, last, email)| {
            serde_json::json!({
                "value": email,
                "first_name": first,
                "last_name": last,
                "position": "Engineering Manager",
                "confidence": 88,
            })
        })
        .collect();
    serde_json::json!({ "data": { "emails": emails } }).to_string()
}

/// Collects formatted log output so tests can assert on log lines.
#[derive(Clone, Default)]
pub struct LogCapture(std::sync::Arc<std::sync::Mutex<Vec<u8>>>);

impl std::io::Write for LogCapture {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

impl LogCapture {
    pub fn capture<R>(&self, f: impl FnOnce() -> R) -> R {
        let writer = self.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_writer(move || writer.clone())
            .with_ansi(false)
            .with_max_level(tracing::Level::DEBUG)
            .finish();
        tracing::subscriber::with_default(subscriber, f)
    }

    pub fn contents(&self) -> String {
        String::from_utf8_lossy(&self.0.lock().unwrap()).into_owned()
    }
}
