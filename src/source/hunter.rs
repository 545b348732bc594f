use super::types::{HunterDomainResponse, HunterEmail};
use super::{ApiRequest, FailoverClient, HttpTransport, KeyPlacement, RateLimited};
use crate::keys::KeyPool;
use std::time::Duration;

pub const HUNTER_BASE_URL: &str = "https://api.hunter.io/v2";
pub const KEY_PARAM: KeyPlacement = KeyPlacement::Query("api_key");

/// Department filter for a domain search. Each one is a separately billed query.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Department {
    It,
    Hr,
    Management,
}

impl Department {
    pub const ALL: [Department; 3] = [Department::It, Department::Hr, Department::Management];

    /// Value of the `department` query parameter, also used in cache keys.
    pub fn as_param(self) -> &'static str {
        match self {
            Department::It => "it",
            Department::Hr => "hr",
            Department::Management => "management",
        }
    }

    /// Label written into the notes column.
    pub fn label(self) -> &'static str {
        match self {
            Department::It => "IT",
            Department::Hr => "HR/Recruiting",
            Department::Management => "Management",
        }
    }

    pub fn seniority(self) -> Option<&'static str> {
        match self {
            Department::Management => Some("senior,executive"),
            _ => None,
        }
    }
}

/// Hunter.io domain search.
pub struct HunterClient<T> {
    inner: FailoverClient<T>,
    base_url: String,
}

impl<T: HttpTransport> HunterClient<T> {
    pub fn new(transport: T, pool: KeyPool, base_url: &str, exhaustion_backoff: Duration) -> Self {
        Self {
            inner: FailoverClient::new(transport, pool, KEY_PARAM, exhaustion_backoff),
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    /// Personal addresses at `domain` within one department.
    pub fn domain_search(&mut self, domain: &str, department: Department, limit: u32) -> Vec<HunterEmail> {
        let mut request = ApiRequest::get(format!("{}/domain-search", self.base_url))
            .query("domain", domain)
            .query("department", department.as_param())
            .query("limit", limit)
            .query("type", "personal")
            .query("required_field", "full_name");
        if let Some(seniority) = department.seniority() {
            request = request.query("seniority", seniority);
        }
        let resp: HunterDomainResponse = self.inner.execute(&request);
        resp.data.emails
    }
}

impl<T: HttpTransport> RateLimited for HunterClient<T> {
    fn pool(&self) -> &KeyPool {
        self.inner.pool()
    }
}
