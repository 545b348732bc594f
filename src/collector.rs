//! Incremental collection loop.
//!
//! Walks the configured organizations in order, runs every search that is
//! not yet in the [`SearchCache`], and merges the people found into the
//! contacts carried over from the previous run.

use crate::cache::{SearchCache, SearchId};
use crate::config::{ApolloConfig, Config, HunterConfig};
use crate::contact::{name_key, Contact, DedupState, Organization, SOURCE_APOLLO, SOURCE_HUNTER};
use crate::source::apollo::{ApolloClient, PeopleQuery};
use crate::source::hunter::{Department, HunterClient};
use crate::source::types::{ApolloPerson, HunterEmail};
use crate::source::{HttpTransport, RateLimited};
use crate::workbook::PriorRun;
use std::time::Duration;

pub const APOLLO_SEARCH_SERVICE: &str = "apollo_search";
pub const HUNTER_SERVICE: &str = "hunter";

/// The two Apollo searches run per organization.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PeopleShape {
    /// Curated hiring titles.
    Titles,
    /// Generic recruiting titles.
    Broad,
}

impl PeopleShape {
    pub const ALL: [PeopleShape; 2] = [PeopleShape::Titles, PeopleShape::Broad];

    pub fn category(self) -> &'static str {
        match self {
            PeopleShape::Titles => "titles",
            PeopleShape::Broad => "broad",
        }
    }

    fn label(self) -> &'static str {
        match self {
            PeopleShape::Titles => "Title search",
            PeopleShape::Broad => "Broad search",
        }
    }
}

#[derive(Debug, Clone)]
pub struct CollectorConfig {
    pub organizations: Vec<Organization>,
    pub apollo: ApolloConfig,
    pub hunter: HunterConfig,
    /// Spend Apollo credits revealing emails for people returned without one.
    pub enrich: bool,
    /// Only run the Hunter IT department search.
    pub it_only: bool,
    pub request_delay: Duration,
}

impl CollectorConfig {
    pub fn from_config(config: &Config, enrich: bool, it_only: bool) -> Self {
        Self {
            organizations: config.organizations.clone(),
            apollo: config.apollo.clone(),
            hunter: config.hunter.clone(),
            enrich,
            it_only,
            request_delay: config.pacing.request_delay(),
        }
    }

    pub fn departments(&self) -> &'static [Department] {
        if self.it_only {
            &[Department::It]
        } else {
            &Department::ALL
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CollectStats {
    pub new_contacts: usize,
    pub searches_run: usize,
    pub searches_skipped: usize,
    pub enrichments_made: usize,
    pub enrichments_skipped: usize,
}

/// Everything the merge step mutates, passed explicitly.
#[derive(Debug, Default)]
pub struct MergeState {
    pub contacts: Vec<Contact>,
    pub dedup: DedupState,
    pub stats: CollectStats,
}

impl MergeState {
    pub fn new(prior: PriorRun) -> Self {
        Self {
            contacts: prior.contacts,
            dedup: DedupState {
                seen: prior.seen,
                enriched: prior.enriched,
            },
            stats: CollectStats::default(),
        }
    }

    fn push(&mut self, contact: Contact) {
        self.dedup.register(&contact);
        self.contacts.push(contact);
        self.stats.new_contacts += 1;
    }
}

#[derive(Debug)]
pub struct CollectOutcome {
    pub contacts: Vec<Contact>,
    pub dedup: DedupState,
    pub stats: CollectStats,
}

pub struct Collector<T> {
    config: CollectorConfig,
    apollo: Option<ApolloClient<T>>,
    hunter: Option<HunterClient<T>>,
    cache: SearchCache,
}

impl<T: HttpTransport> Collector<T> {
    pub fn new(
        config: CollectorConfig,
        apollo: Option<ApolloClient<T>>,
        hunter: Option<HunterClient<T>>,
        cache: SearchCache,
    ) -> Self {
        Self {
            config,
            apollo,
            hunter,
            cache,
        }
    }

    pub fn apollo(&self) -> Option<&ApolloClient<T>> {
        self.apollo.as_ref()
    }

    pub fn hunter(&self) -> Option<&HunterClient<T>> {
        self.hunter.as_ref()
    }

    pub fn cache(&self) -> &SearchCache {
        &self.cache
    }

    /// Run every outstanding search and merge the results into `prior`.
    pub fn run(&mut self, prior: PriorRun) -> CollectOutcome {
        let Self {
            config,
            apollo,
            hunter,
            cache,
        } = self;
        let mut state = MergeState::new(prior);

        for org in &config.organizations {
            tracing::info!("Searching: {} ({})", org.name, org.domain);

            if let Some(client) = apollo.as_mut() {
                collect_apollo(client, cache, config, org, &mut state);
            }
            if let Some(client) = hunter.as_mut() {
                collect_hunter(client, cache, config, org, &mut state);
            }
        }

        let stats = &state.stats;
        tracing::info!(
            new_contacts = stats.new_contacts,
            searches_run = stats.searches_run,
            searches_skipped = stats.searches_skipped,
            enrichments_made = stats.enrichments_made,
            enrichments_skipped = stats.enrichments_skipped,
            "collection finished",
        );

        CollectOutcome {
            contacts: state.contacts,
            dedup: state.dedup,
            stats: state.stats,
        }
    }
}

fn collect_apollo<T: HttpTransport>(
    client: &mut ApolloClient<T>,
    cache: &mut SearchCache,
    config: &CollectorConfig,
    org: &Organization,
    state: &mut MergeState,
) {
    if client.is_exhausted() {
        tracing::info!("[Apollo] Skipping {}: all Apollo keys exhausted", org.name);
        return;
    }

    for shape in PeopleShape::ALL {
        let id = SearchId::new(APOLLO_SEARCH_SERVICE, &org.domain, shape.category());
        if cache.is_done(&id) {
            tracing::info!(search = %id, "[Apollo] {} at {}: CACHED (skipping)", shape.label(), org.name);
            state.stats.searches_skipped += 1;
            continue;
        }
        if client.is_exhausted() {
            continue;
        }

        tracing::info!("[Apollo] {} at {} (using {})", shape.label(), org.name, client.key_label());
        let (titles, per_page) = match shape {
            PeopleShape::Titles => (&config.apollo.titles, config.apollo.narrow_per_page),
            PeopleShape::Broad => (&config.apollo.broad_titles, config.apollo.broad_per_page),
        };
        let query = PeopleQuery {
            titles,
            locations: &config.apollo.locations,
            domain: Some(&org.domain),
            per_page,
            page: 1,
        };
        let people = client.search_people(&query);
        state.stats.searches_run += 1;
        let found = people.len();
        tracing::info!("[Apollo] Found {} people", found);

        for person in people {
            merge_apollo_person(client, config, org, person, state);
        }

        // An exhausted pool with nothing returned means the search never ran.
        // A live pool marks the search done even after an HTTP or network
        // failure, so that query is not retried on later runs.
        if !client.is_exhausted() || found > 0 {
            cache.mark_done(&id);
        }
        pause(config.request_delay);
    }
}

fn merge_apollo_person<T: HttpTransport>(
    client: &mut ApolloClient<T>,
    config: &CollectorConfig,
    org: &Organization,
    person: ApolloPerson,
    state: &mut MergeState,
) {
    let ApolloPerson {
        first_name,
        last_name,
        title,
        mut email,
        mut linkedin_url,
    } = person;

    let key = name_key(&first_name, &last_name, &org.name);
    if state.dedup.seen.contains(&key)
        || (!email.is_empty() && state.dedup.seen.contains(&email.to_lowercase()))
    {
        tracing::debug!(key = %key, "duplicate, skipping");
        return;
    }

    let wants_enrichment = config.enrich
        && email.is_empty()
        && !first_name.is_empty()
        && !last_name.is_empty()
        && !client.is_exhausted();
    if wants_enrichment {
        if state.dedup.enriched.contains(&key) {
            tracing::info!("Skipping enrichment (already has email): {} {}", first_name, last_name);
            state.stats.enrichments_skipped += 1;
        } else {
            tracing::info!("Enriching: {} {} ({})", first_name, last_name, client.key_label());
            if let Some(found) = client.enrich_person(&first_name, &last_name, &org.domain) {
                if !found.email.is_empty() && state.dedup.seen.contains(&found.email.to_lowercase()) {
                    tracing::info!(
                        "Enriched email {} already belongs to another contact, keeping {} {} without it",
                        found.email,
                        first_name,
                        last_name,
                    );
                } else {
                    email = found.email;
                }
                if linkedin_url.is_empty() {
                    linkedin_url = found.linkedin_url;
                }
            }
            state.stats.enrichments_made += 1;
            pause(config.request_delay);
        }
    }

    state.push(Contact {
        organization: org.name.clone(),
        first_name,
        last_name,
        email,
        job_title: title,
        linkedin_url,
        phone: String::new(),
        source: SOURCE_APOLLO.to_string(),
        notes: String::new(),
    });
}

fn collect_hunter<T: HttpTransport>(
    client: &mut HunterClient<T>,
    cache: &mut SearchCache,
    config: &CollectorConfig,
    org: &Organization,
    state: &mut MergeState,
) {
    if client.is_exhausted() {
        tracing::info!("[Hunter] Skipping {}: all Hunter keys exhausted", org.name);
        return;
    }

    for &department in config.departments() {
        let id = SearchId::new(HUNTER_SERVICE, &org.domain, department.as_param());
        if cache.is_done(&id) {
            tracing::info!(search = %id, "[Hunter] {} search at {}: CACHED (skipping)", department.label(), org.domain);
            state.stats.searches_skipped += 1;
            continue;
        }
        if client.is_exhausted() {
            continue;
        }

        tracing::info!(
            "[Hunter] Searching {} at {} (using {})",
            department.label(),
            org.domain,
            client.key_label(),
        );
        let entries = client.domain_search(&org.domain, department, config.hunter.limit_for(department));
        state.stats.searches_run += 1;
        let found = entries.len();
        tracing::info!("[Hunter] Found {} {} contacts", found, department.label());

        merge_hunter_entries(state, org, department, entries);

        // Same rule as Apollo: failures on a live pool still count as done.
        if !client.is_exhausted() || found > 0 {
            cache.mark_done(&id);
        }
        pause(config.request_delay);
    }
}

/// Merge one Hunter result list. An entry is dropped when either its email or
/// its name-key has been seen. Returns how many contacts were added.
pub fn merge_hunter_entries(
    state: &mut MergeState,
    org: &Organization,
    department: Department,
    entries: Vec<HunterEmail>,
) -> usize {
    let mut added = 0;
    for entry in entries {
        let email_key = entry.value.to_lowercase();
        let key = name_key(&entry.first_name, &entry.last_name, &org.name);
        if (!email_key.is_empty() && state.dedup.seen.contains(&email_key))
            || state.dedup.seen.contains(&key)
        {
            continue;
        }

        let notes = format!(
            "Confidence: {}%; Dept: {}",
            entry.confidence.unwrap_or(0),
            department.label()
        );
        state.push(Contact {
            organization: org.name.clone(),
            first_name: entry.first_name,
            last_name: entry.last_name,
            email: entry.value,
            job_title: entry.position,
            linkedin_url: entry.linkedin,
            phone: entry.phone_number,
            source: SOURCE_HUNTER.to_string(),
            notes,
        });
        added += 1;
    }
    added
}

fn pause(delay: Duration) {
    if !delay.is_zero() {
        std::thread::sleep(delay);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn acme() -> Organization {
        Organization {
            name: "Acme".into(),
            domain: "acme.com".into(),
            careers_url: String::new(),
        }
    }

    fn entry(first: &str, last: &str, email: &str) -> HunterEmail {
        HunterEmail {
            value: email.into(),
            first_name: first.into(),
            last_name: last.into(),
            position: "Recruiter".into(),
            confidence: Some(91),
            ..Default::default()
        }
    }

    #[test]
    fn test_hunter_merge_annotates_notes() {
        let mut state = MergeState::default();
        let added = merge_hunter_entries(&mut state, &acme(), Department::Hr, vec![entry("Bo", "Ray", "bo@acme.com")]);
        assert_eq!(added, 1);
        let c = &state.contacts[0];
        assert_eq!(c.notes, "Confidence: 91%; Dept: HR/Recruiting");
        assert_eq!(c.source, SOURCE_HUNTER);
        assert!(state.dedup.seen.contains("bo@acme.com"));
        assert!(state.dedup.seen.contains("bo|ray|acme"));
        assert!(state.dedup.enriched.contains("bo|ray|acme"));
    }

    #[test]
    fn test_hunter_merge_drops_email_or_name_match() {
        let mut state = MergeState::default();
        merge_hunter_entries(&mut state, &acme(), Department::It, vec![entry("Bo", "Ray", "bo@acme.com")]);

        let again = vec![
            entry("Robert", "Ray", "BO@acme.com"),
            entry("bo", "ray", "other@acme.com"),
            entry("Cy", "Fox", ""),
        ];
        let added = merge_hunter_entries(&mut state, &acme(), Department::It, again);
        assert_eq!(added, 1);
        assert_eq!(state.contacts.len(), 2);
        assert_eq!(state.contacts[1].first_name, "Cy");
        assert!(!state.dedup.enriched.contains("cy|fox|acme"));
    }

    #[test]
    fn test_hunter_merge_is_idempotent() {
        let batch = vec![entry("Bo", "Ray", "bo@acme.com"), entry("Al", "Ng", "al@acme.com")];
        let mut state = MergeState::default();
        merge_hunter_entries(&mut state, &acme(), Department::It, batch.clone());
        let seen_once = state.dedup.seen.clone();
        let added = merge_hunter_entries(&mut state, &acme(), Department::It, batch);
        assert_eq!(added, 0);
        assert_eq!(state.dedup.seen, seen_once);
        assert_eq!(state.contacts.len(), 2);
    }

    #[test]
    fn test_it_only_departments() {
        let config = CollectorConfig {
            organizations: vec![acme()],
            apollo: ApolloConfig::default(),
            hunter: HunterConfig::default(),
            enrich: true,
            it_only: true,
            request_delay: Duration::ZERO,
        };
        assert_eq!(config.departments(), &[Department::It]);
        let all = CollectorConfig { it_only: false, ..config };
        assert_eq!(all.departments().len(), 3);
    }
}
