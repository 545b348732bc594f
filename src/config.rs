use crate::cache::DEFAULT_CACHE_FILE;
use crate::contact::Organization;
use crate::source::apollo::APOLLO_BASE_URL;
use crate::source::hunter::{Department, HUNTER_BASE_URL};
use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

pub const ENV_FILE: &str = ".env";
pub const APOLLO_KEY_VAR: &str = "APOLLO_API_KEY";
pub const HUNTER_KEY_VAR: &str = "HUNTER_API_KEY";
pub const DEFAULT_OUTPUT_FILE: &str = "Bay_Area_IT_Consultancies_Contacts.xlsx";

/// Highest numbered `PREFIX_n` variable that is looked at.
const MAX_NUMBERED_KEYS: usize = 20;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub organizations: Vec<Organization>,
    #[serde(default)]
    pub apollo: ApolloConfig,
    #[serde(default)]
    pub hunter: HunterConfig,
    #[serde(default)]
    pub pacing: PacingConfig,
    #[serde(default)]
    pub output: OutputConfig,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ApolloConfig {
    pub base_url: String,
    /// Curated titles for the narrow search.
    pub titles: Vec<String>,
    /// Generic recruiting titles for the broad search.
    pub broad_titles: Vec<String>,
    pub locations: Vec<String>,
    pub narrow_per_page: u32,
    pub broad_per_page: u32,
}

impl Default for ApolloConfig {
    fn default() -> Self {
        Self {
            base_url: APOLLO_BASE_URL.to_string(),
            titles: strings(&[
                "IT Recruiter",
                "Technology Recruiter",
                "Technical Recruiter",
                "Talent Acquisition",
                "Recruiting Manager",
                "Hiring Manager IT",
                "Technology Hiring Manager",
                "Head of Recruiting",
                "Director of Talent Acquisition",
                "University Recruiter",
                "Campus Recruiter Technology",
            ]),
            broad_titles: strings(&["Talent Acquisition", "Recruiter", "Staffing"]),
            locations: strings(&[
                "San Francisco, California, United States",
                "San Jose, California, United States",
                "Palo Alto, California, United States",
                "Mountain View, California, United States",
                "Oakland, California, United States",
                "Bay Area",
            ]),
            narrow_per_page: 10,
            broad_per_page: 5,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct HunterConfig {
    pub base_url: String,
    pub it_limit: u32,
    pub hr_limit: u32,
    pub management_limit: u32,
}

impl Default for HunterConfig {
    fn default() -> Self {
        Self {
            base_url: HUNTER_BASE_URL.to_string(),
            it_limit: 10,
            hr_limit: 10,
            management_limit: 5,
        }
    }
}

impl HunterConfig {
    pub fn limit_for(&self, department: Department) -> u32 {
        match department {
            Department::It => self.it_limit,
            Department::Hr => self.hr_limit,
            Department::Management => self.management_limit,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct PacingConfig {
    /// Pause after every remote call.
    pub request_delay_ms: u64,
    /// Pause before retrying with the next key after a 429 / 403.
    pub exhaustion_backoff_ms: u64,
    pub request_timeout_s: u64,
}

impl Default for PacingConfig {
    fn default() -> Self {
        Self {
            request_delay_ms: 1000,
            exhaustion_backoff_ms: 1000,
            request_timeout_s: 30,
        }
    }
}

impl PacingConfig {
    pub fn request_delay(&self) -> Duration {
        Duration::from_millis(self.request_delay_ms)
    }

    pub fn exhaustion_backoff(&self) -> Duration {
        Duration::from_millis(self.exhaustion_backoff_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_s)
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct OutputConfig {
    pub path: String,
    pub cache_path: String,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            path: DEFAULT_OUTPUT_FILE.to_string(),
            cache_path: DEFAULT_CACHE_FILE.to_string(),
        }
    }
}

impl Config {
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        Self::parse(&content)
    }

    pub fn parse(content: &str) -> Result<Self> {
        let config: Config = toml::from_str(content)
            .with_context(|| "Failed to parse config TOML")?;
        if config.organizations.is_empty() {
            anyhow::bail!("config lists no organizations");
        }
        Ok(config)
    }

    /// Load .env file into process environment. Real env vars take precedence.
    pub fn load_env_file(path: &Path) {
        let content = match std::fs::read_to_string(path) {
            Ok(c) => c,
            Err(_) => return,
        };
        for (key, value) in parse_env(&content) {
            if std::env::var(&key).is_err() {
                std::env::set_var(key, value);
            }
        }
    }
}

/// Parse `KEY=value` lines. Quotes, a BOM and trailing ` # comments` are stripped.
pub fn parse_env(content: &str) -> Vec<(String, String)> {
    // Strip BOM if present (common on Windows-created files)
    let content = content.strip_prefix('\u{feff}').unwrap_or(content);
    let mut out = Vec::new();
    for line in content.lines() {
        let line = line.trim().trim_matches('\r');
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        if let Some((key, value)) = line.split_once('=') {
            let value = match value.find(" #") {
                Some(idx) => &value[..idx],
                None => value,
            };
            let value = value.trim().trim_matches('"').trim_matches('\'');
            out.push((key.trim().to_string(), value.to_string()));
        }
    }
    out
}

/// Keys from `PREFIX_1` .. `PREFIX_20`, then `PREFIX`, in that order, without duplicates.
pub fn collect_keys_from_env(prefix: &str) -> Vec<String> {
    collect_keys_with(prefix, |name| std::env::var(name).ok())
}

pub fn collect_keys_with<F>(prefix: &str, lookup: F) -> Vec<String>
where
    F: Fn(&str) -> Option<String>,
{
    let mut keys: Vec<String> = Vec::new();
    let numbered = (1..=MAX_NUMBERED_KEYS).map(|i| format!("{}_{}", prefix, i));
    for name in numbered.chain(std::iter::once(prefix.to_string())) {
        if let Some(raw) = lookup(&name) {
            let key = sanitize_key(&raw);
            if !key.is_empty() && !keys.contains(&key) {
                keys.push(key);
            }
        }
    }
    keys
}

/// Command-line keys win; otherwise fall back to the environment.
pub fn resolve_keys(cli_keys: &[String], env_prefix: &str) -> Vec<String> {
    let mut keys: Vec<String> = Vec::new();
    for raw in cli_keys {
        let key = sanitize_key(raw);
        if !key.is_empty() && !keys.contains(&key) {
            keys.push(key);
        }
    }
    if keys.is_empty() {
        keys = collect_keys_from_env(env_prefix);
    }
    keys
}

/// At least one service needs a key, otherwise there is nothing to search with.
pub fn require_any_keys(apollo_keys: &[String], hunter_keys: &[String]) -> Result<()> {
    if apollo_keys.is_empty() && hunter_keys.is_empty() {
        anyhow::bail!(
            "no API keys provided (set {}_1.. or {}_1.., or pass --apollo-keys / --hunter-keys)",
            APOLLO_KEY_VAR,
            HUNTER_KEY_VAR
        );
    }
    Ok(())
}

/// Strip carriage returns, BOM, and other invisible chars from a key value.
fn sanitize_key(raw: &str) -> String {
    raw.replace(['\r', '\u{feff}', '\u{200b}'], "")
        .trim()
        .to_string()
}

fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_config_parses() {
        let config = Config::load(Path::new("config.toml")).unwrap();
        assert!(!config.organizations.is_empty());
        assert!(config.organizations.iter().any(|o| o.domain == "accenture.com"));
        assert_eq!(config.pacing.request_delay_ms, 1000);
    }

    #[test]
    fn test_sections_default() {
        let config = Config::parse(
            r#"
            [[organizations]]
            name = "Acme"
            domain = "acme.com"
            "#,
        )
        .unwrap();
        assert_eq!(config.organizations[0].careers_url, "");
        assert_eq!(config.apollo.base_url, APOLLO_BASE_URL);
        assert_eq!(config.apollo.broad_titles.len(), 3);
        assert_eq!(config.hunter.limit_for(Department::Management), 5);
        assert_eq!(config.output.cache_path, ".search_cache.json");
    }

    #[test]
    fn test_no_organizations_is_an_error() {
        assert!(Config::parse("organizations = []").is_err());
    }

    #[test]
    fn test_parse_env() {
        let parsed = parse_env(
            "\u{feff}# comment\nAPOLLO_API_KEY_1=\"abc\"\r\nHUNTER_API_KEY='def' # me@example.com\n\nJUNK\n",
        );
        assert_eq!(
            parsed,
            vec![
                ("APOLLO_API_KEY_1".to_string(), "abc".to_string()),
                ("HUNTER_API_KEY".to_string(), "def".to_string()),
            ]
        );
    }

    #[test]
    fn test_collect_keys_numbered_then_single() {
        let env: HashMap<&str, &str> = [
            ("APOLLO_API_KEY_2", "k2"),
            ("APOLLO_API_KEY_1", " k1 "),
            ("APOLLO_API_KEY_3", "k1"),
            ("APOLLO_API_KEY", "solo"),
            ("APOLLO_API_KEY_4", ""),
        ]
        .into_iter()
        .collect();
        let keys = collect_keys_with("APOLLO_API_KEY", |n| env.get(n).map(|v| v.to_string()));
        assert_eq!(keys, vec!["k1", "k2", "solo"]);
    }

    #[test]
    fn test_cli_keys_take_precedence() {
        let keys = resolve_keys(&["a".into(), "b".into(), "a".into()], "RECRUIT_HARVEST_TEST_UNSET");
        assert_eq!(keys, vec!["a", "b"]);
        assert!(resolve_keys(&[], "RECRUIT_HARVEST_TEST_UNSET").is_empty());
    }

    #[test]
    fn test_require_any_keys() {
        let err = require_any_keys(&[], &[]).unwrap_err();
        assert!(err.to_string().contains("no API keys provided"));
        assert!(require_any_keys(&["a".into()], &[]).is_ok());
        assert!(require_any_keys(&[], &["h".into()]).is_ok());
    }
}
