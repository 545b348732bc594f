use super::types::{ApolloMatchResponse, ApolloPerson, ApolloSearchResponse};
use super::{ApiRequest, FailoverClient, HttpTransport, KeyPlacement, RateLimited};
use crate::keys::KeyPool;
use serde_json::json;
use std::time::Duration;

pub const APOLLO_BASE_URL: &str = "https://api.apollo.io/api/v1";
pub const KEY_HEADER: KeyPlacement = KeyPlacement::Header("X-Api-Key");

/// Filters for one people search.
#[derive(Debug, Clone)]
pub struct PeopleQuery<'a> {
    pub titles: &'a [String],
    pub locations: &'a [String],
    pub domain: Option<&'a str>,
    pub per_page: u32,
    pub page: u32,
}

/// Apollo.io people search and per-person enrichment.
pub struct ApolloClient<T> {
    inner: FailoverClient<T>,
    base_url: String,
}

impl<T: HttpTransport> ApolloClient<T> {
    pub fn new(transport: T, pool: KeyPool, base_url: &str, exhaustion_backoff: Duration) -> Self {
        Self {
            inner: FailoverClient::new(transport, pool, KEY_HEADER, exhaustion_backoff),
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    pub fn search_people(&mut self, query: &PeopleQuery<'_>) -> Vec<ApolloPerson> {
        let mut body = json!({
            "person_titles": query.titles,
            "person_locations": query.locations,
            "per_page": query.per_page,
            "page": query.page,
        });
        if let Some(domain) = query.domain {
            body["q_organization_domains"] = json!(domain);
        }
        let request = self.request("/mixed_people/api_search", body);
        let resp: ApolloSearchResponse = self.inner.execute(&request);
        resp.people
    }

    /// Look up one person to reveal their email / LinkedIn URL. Costs a credit.
    pub fn enrich_person(&mut self, first_name: &str, last_name: &str, domain: &str) -> Option<ApolloPerson> {
        let body = json!({
            "first_name": first_name,
            "last_name": last_name,
            "organization_domain": domain,
            "reveal_personal_emails": true,
        });
        let request = self.request("/people/match", body);
        let resp: ApolloMatchResponse = self.inner.execute(&request);
        resp.person
    }

    fn request(&self, path: &str, body: serde_json::Value) -> ApiRequest {
        ApiRequest::post_json(format!("{}{}", self.base_url, path), body)
            .header("Cache-Control", "no-cache")
    }
}

impl<T: HttpTransport> RateLimited for ApolloClient<T> {
    fn pool(&self) -> &KeyPool {
        self.inner.pool()
    }
}
