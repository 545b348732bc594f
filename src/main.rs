use anyhow::Result;
use clap::Parser;
use recruit_harvest::cache::SearchCache;
use recruit_harvest::collector::{Collector, CollectorConfig};
use recruit_harvest::config::{self, Config, APOLLO_KEY_VAR, ENV_FILE, HUNTER_KEY_VAR};
use recruit_harvest::keys::KeyPool;
use recruit_harvest::source::apollo::ApolloClient;
use recruit_harvest::source::hunter::HunterClient;
use recruit_harvest::source::{RateLimited, ReqwestTransport};
use recruit_harvest::workbook::{self, PriorRun};
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

/// Find IT/CS recruiting contacts at the configured consultancies.
///
/// Re-running is incremental: contacts already in the output file are kept,
/// searches recorded in the cache are skipped and people who already have an
/// email are never enriched again.
#[derive(Parser, Debug)]
#[command(name = "recruit-harvest", version, about, long_about = None)]
struct Cli {
    /// One or more Apollo.io API keys (otherwise APOLLO_API_KEY_1.. / APOLLO_API_KEY).
    #[arg(long, num_args = 1.., value_name = "KEY")]
    apollo_keys: Vec<String>,

    /// One or more Hunter.io API keys (otherwise HUNTER_API_KEY_1.. / HUNTER_API_KEY).
    #[arg(long, num_args = 1.., value_name = "KEY")]
    hunter_keys: Vec<String>,

    /// Skip Apollo enrichment (saves credits, no emails from Apollo).
    #[arg(long)]
    no_enrich: bool,

    /// Hunter: only search the IT department (1 credit per company instead of 3).
    #[arg(long)]
    it_only: bool,

    /// Clear the search cache and ignore the existing output file.
    #[arg(long)]
    fresh: bool,

    /// Output workbook path.
    #[arg(long)]
    output: Option<PathBuf>,

    /// Search cache path.
    #[arg(long)]
    cache: Option<PathBuf>,

    /// Organizations and search settings.
    #[arg(long, default_value = "config.toml", env = "RECRUIT_HARVEST_CONFIG")]
    config: PathBuf,

    /// Verbosity level (-v, -vv).
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

fn init_tracing(verbose: u8) {
    let level = match verbose {
        0 => "recruit_harvest=info",
        1 => "recruit_harvest=debug",
        _ => "recruit_harvest=trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

fn print_missing_keys_help() {
    eprintln!("No API keys provided!");
    eprintln!();
    eprintln!("You need at least one API key to search for contacts.");
    eprintln!();
    eprintln!("Option 1: create a .env file in this directory:");
    eprintln!("  {}_1=your_first_key", APOLLO_KEY_VAR);
    eprintln!("  {}_2=your_second_key", APOLLO_KEY_VAR);
    eprintln!("  {}_1=your_first_key", HUNTER_KEY_VAR);
    eprintln!();
    eprintln!("Option 2: pass keys as arguments:");
    eprintln!("  recruit-harvest --apollo-keys KEY1 KEY2");
    eprintln!("  recruit-harvest --hunter-keys KEY1 KEY2");
    eprintln!();
    eprintln!("Where to get keys:");
    eprintln!("  Apollo.io: https://app.apollo.io/#/settings/integrations/api");
    eprintln!("  Hunter.io: https://hunter.io/api-keys");
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    // Load saved keys from .env (real env vars take precedence)
    Config::load_env_file(Path::new(ENV_FILE));
    let config = Config::load(&cli.config)?;

    let apollo_keys = config::resolve_keys(&cli.apollo_keys, APOLLO_KEY_VAR);
    let hunter_keys = config::resolve_keys(&cli.hunter_keys, HUNTER_KEY_VAR);
    if let Err(e) = config::require_any_keys(&apollo_keys, &hunter_keys) {
        tracing::error!("{:#}", e);
        print_missing_keys_help();
        std::process::exit(1);
    }

    let output = cli
        .output
        .clone()
        .unwrap_or_else(|| PathBuf::from(&config.output.path));
    let cache_path = cli
        .cache
        .clone()
        .unwrap_or_else(|| PathBuf::from(&config.output.cache_path));

    let transport = ReqwestTransport::new(config.pacing.request_timeout())?;
    let backoff = config.pacing.exhaustion_backoff();
    let apollo = if apollo_keys.is_empty() {
        None
    } else {
        let pool = KeyPool::new("Apollo", apollo_keys)?;
        Some(ApolloClient::new(transport.clone(), pool, &config.apollo.base_url, backoff))
    };
    let hunter = if hunter_keys.is_empty() {
        None
    } else {
        let pool = KeyPool::new("Hunter", hunter_keys)?;
        Some(HunterClient::new(transport, pool, &config.hunter.base_url, backoff))
    };

    let mut cache = SearchCache::open(&cache_path);
    let prior = if cli.fresh {
        cache.clear();
        tracing::info!("[Fresh mode] cache cleared, starting from scratch");
        PriorRun::default()
    } else {
        let prior = workbook::load_existing(&output);
        if prior.contacts.is_empty() {
            tracing::info!("[Resume] no existing output found, fresh run");
        } else {
            tracing::info!(
                "[Resume] loaded {} existing contacts ({} with email) from {}",
                prior.contacts.len(),
                prior.with_email(),
                output.display(),
            );
        }
        tracing::info!(
            "[Resume] {} completed searches in cache ({})",
            cache.len(),
            cache.path().display(),
        );
        prior
    };

    let enrich = apollo.is_some() && !cli.no_enrich;
    tracing::info!(
        apollo_keys = apollo.as_ref().map_or(0, |c| c.pool().total()),
        hunter_keys = hunter.as_ref().map_or(0, |c| c.pool().total()),
        enrich,
        it_only = cli.it_only,
        incremental = !cli.fresh,
        organizations = config.organizations.len(),
        output = %output.display(),
        "starting collection",
    );

    let collector_config = CollectorConfig::from_config(&config, enrich, cli.it_only);
    let mut collector = Collector::new(collector_config, apollo, hunter, cache);
    let outcome = collector.run(prior);
    let contacts = outcome.contacts;

    let with_email = contacts.iter().filter(|c| c.has_email()).count();
    tracing::info!("Total contacts (all runs): {}", contacts.len());
    tracing::info!("With email (all runs):     {}", with_email);
    if let Some(client) = collector.apollo() {
        let pool = client.pool();
        tracing::info!(
            "Apollo keys: {} exhausted, {} still active (of {})",
            pool.exhausted_count(),
            pool.active_count(),
            pool.total(),
        );
    }
    if let Some(client) = collector.hunter() {
        let pool = client.pool();
        tracing::info!(
            "Hunter keys: {} exhausted, {} still active (of {})",
            pool.exhausted_count(),
            pool.active_count(),
            pool.total(),
        );
    }
    tracing::info!("Cached searches: {}", collector.cache().len());
    for org in &config.organizations {
        let (found, with_email) = workbook::count_for(&contacts, &org.name);
        tracing::info!("  {:25} -> {:3} contacts ({} with email)", org.name, found, with_email);
    }

    if contacts.is_empty() {
        tracing::warn!("No contacts found. Check your API keys and try again.");
        return Ok(());
    }
    workbook::write_workbook(&output, &contacts, &config.organizations)?;
    tracing::info!("Done! Re-run anytime with new keys; existing results are preserved.");
    Ok(())
}
