use serde::{Deserialize, Deserializer};

/// Both APIs send `null` for fields they don't know; treat that as empty.
fn null_as_empty<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<String>::deserialize(deserializer)?.unwrap_or_default())
}

// ── Apollo.io ─────────────────────────────────────────────────────────

/// `POST /mixed_people/api_search` response.
#[derive(Debug, Deserialize, Default)]
pub struct ApolloSearchResponse {
    #[serde(default)]
    pub people: Vec<ApolloPerson>,
}

/// `POST /people/match` response. `person` is null when nothing matched.
#[derive(Debug, Deserialize, Default)]
pub struct ApolloMatchResponse {
    #[serde(default)]
    pub person: Option<ApolloPerson>,
}

#[derive(Debug, Clone, Deserialize, Default, PartialEq)]
pub struct ApolloPerson {
    #[serde(default, deserialize_with = "null_as_empty")]
    pub first_name: String,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub last_name: String,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub title: String,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub email: String,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub linkedin_url: String,
}

// ── Hunter.io ─────────────────────────────────────────────────────────

/// `GET /domain-search` response.
#[derive(Debug, Deserialize, Default)]
pub struct HunterDomainResponse {
    #[serde(default)]
    pub data: HunterDomainData,
}

#[derive(Debug, Deserialize, Default)]
pub struct HunterDomainData {
    #[serde(default)]
    pub emails: Vec<HunterEmail>,
}

#[derive(Debug, Clone, Deserialize, Default, PartialEq)]
pub struct HunterEmail {
    #[serde(default, deserialize_with = "null_as_empty")]
    pub value: String,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub first_name: String,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub last_name: String,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub position: String,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub linkedin: String,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub phone_number: String,
    #[serde(default)]
    pub confidence: Option<u32>,
}
