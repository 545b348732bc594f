use serde::{Deserialize, Serialize};
use std::collections::HashSet;

pub const SOURCE_APOLLO: &str = "Apollo.io";
pub const SOURCE_HUNTER: &str = "Hunter.io";

/// A target company. Supplied by configuration, never modified.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct Organization {
    pub name: String,
    pub domain: String,
    #[serde(default)]
    pub careers_url: String,
}

/// One row of the output sheet.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Contact {
    pub organization: String,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub job_title: String,
    pub linkedin_url: String,
    pub phone: String,
    pub source: String,
    pub notes: String,
}

impl Contact {
    pub fn name_key(&self) -> String {
        name_key(&self.first_name, &self.last_name, &self.organization)
    }

    pub fn has_email(&self) -> bool {
        !self.email.is_empty()
    }
}

/// Dedup key for a person at an organization: `first|last|org`, lower-cased.
pub fn name_key(first: &str, last: &str, organization: &str) -> String {
    format!("{}|{}|{}", first, last, organization).to_lowercase()
}

/// Membership sets used to avoid duplicate contacts and repeat enrichment.
///
/// `seen` holds name-keys and lower-cased emails. `enriched` holds the
/// name-keys of people whose email is already known.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DedupState {
    pub seen: HashSet<String>,
    pub enriched: HashSet<String>,
}

impl DedupState {
    /// Rebuild both sets from an existing contact list.
    pub fn from_contacts(contacts: &[Contact]) -> Self {
        let mut state = Self::default();
        for c in contacts {
            state.register(c);
        }
        state
    }

    pub fn register(&mut self, contact: &Contact) {
        let key = contact.name_key();
        self.seen.insert(key.clone());
        if contact.has_email() {
            self.seen.insert(contact.email.to_lowercase());
            self.enriched.insert(key);
        }
    }
}
