//! idmatch CLI: merge commit author identities.

use std::collections::BTreeMap;
use std::path::PathBuf;

use clap::{Parser, Subcommand};
use miette::{IntoDiagnostic, Result};

use idmatch::cache::MatchCache;
use idmatch::config::IdMatchConfig;
use idmatch::oracle::cached::CachedOracle;
use idmatch::oracle::table::TableOracle;
use idmatch::oracle::{CancelToken, Oracle};
use idmatch::person::{People, load_frequencies};
use idmatch::primary::set_primary_values;
use idmatch::reduce::reduce_people;

#[derive(Parser)]
#[command(name = "idmatch", version, about = "Identity resolution for commit authors")]
struct Cli {
    /// TOML configuration file.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Merge people that belong to the same human.
    Reduce {
        /// JSON list of people to reduce.
        #[arg(long)]
        people: PathBuf,

        /// Where to write the merged people as JSON.
        #[arg(long)]
        output: PathBuf,

        /// Name frequencies (JSON). Requires --email-freqs.
        #[arg(long, requires = "email_freqs")]
        name_freqs: Option<PathBuf>,

        /// Email frequencies (JSON). Requires --name-freqs.
        #[arg(long, requires = "name_freqs")]
        email_freqs: Option<PathBuf>,

        /// Verified accounts (JSON) used as the external oracle.
        #[arg(long)]
        known_ids: Option<PathBuf>,

        /// Match cache file; overrides `cache_path` from the config.
        #[arg(long)]
        cache: Option<PathBuf>,
    },

    /// Inspect or maintain a match cache file.
    Cache {
        #[command(subcommand)]
        action: CacheAction,
    },
}

#[derive(Subcommand)]
enum CacheAction {
    /// Count cached verdicts by method and outcome.
    Stats {
        /// Match cache file.
        #[arg(long)]
        cache: PathBuf,
    },
    /// Rewrite the cache file with one record per key.
    Compact {
        /// Match cache file.
        #[arg(long)]
        cache: PathBuf,
    },
}

fn main() -> Result<()> {
    miette::set_hook(Box::new(|_| {
        Box::new(
            miette::MietteHandlerOpts::new()
                .terminal_links(true)
                .unicode(true)
                .context_lines(3)
                .build(),
        )
    }))
    .ok(); // Ignore error if hook already set (e.g., in tests)

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => IdMatchConfig::load(path)?,
        None => IdMatchConfig::default(),
    };

    match cli.command {
        Commands::Reduce {
            people,
            output,
            name_freqs,
            email_freqs,
            known_ids,
            cache,
        } => {
            let mut persons = People::load_json(&people)?;
            tracing::info!(people = persons.len(), path = %people.display(), "loaded people");

            let oracle: Option<Box<dyn Oracle>> = match known_ids {
                Some(path) => {
                    let table = TableOracle::load_json(&path)?;
                    let oracle: Box<dyn Oracle> = match cache.or(config.cache_path.clone()) {
                        Some(cache_path) => Box::new(CachedOracle::new(table, cache_path)?),
                        None => Box::new(table),
                    };
                    Some(oracle)
                }
                None => {
                    if cache.is_some() {
                        tracing::warn!("--cache has no effect without --known-ids");
                    }
                    None
                }
            };

            let report = reduce_people(
                &mut persons,
                oracle.as_deref(),
                &config.blacklist(),
                config.max_identities,
                &CancelToken::new(),
            )?;

            if let (Some(names), Some(emails)) = (name_freqs, email_freqs) {
                let name_freqs = load_frequencies(&names)?;
                let email_freqs = load_frequencies(&emails)?;
                set_primary_values(&mut persons, &name_freqs, &email_freqs, config.min_recent_count)?;
            }

            persons.save_json(&output)?;
            println!("{}", serde_json::to_string_pretty(&report).into_diagnostic()?);
        }

        Commands::Cache { action } => match action {
            CacheAction::Stats { cache } => {
                let cache = MatchCache::new(cache);
                cache.load()?;
                let mut counts: BTreeMap<(String, &str), usize> = BTreeMap::new();
                for (key, value) in cache.snapshot() {
                    let outcome = if value.matched { "matched" } else { "no match" };
                    *counts.entry((key.method.to_string(), outcome)).or_default() += 1;
                }
                println!("{} entries in {}", cache.len(), cache.path().display());
                for ((method, outcome), count) in &counts {
                    println!("  {method:<14} {outcome:<9} {count}");
                }
            }
            CacheAction::Compact { cache } => {
                let cache = MatchCache::new(cache);
                let records = cache.compact()?;
                println!("Compacted {} to {records} records", cache.path().display());
            }
        },
    }

    Ok(())
}
