use anyhow::{bail, Context, Result};
use clap::{CommandFactory, Parser, Subcommand, ValueEnum};
use scholar_resolver::config::{default_config_path, find_config_file, load_config, Config};
use scholar_resolver::models::{AuthorQuery, NormalizedRecord};
use scholar_resolver::pipeline::Pipeline;
use scholar_resolver::utils::CacheService;
use serde_json::{json, Value};
use std::io::IsTerminal;
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Scholar Resolver - Resolve a scholar profile's publications into canonical identifiers
#[derive(Parser, Debug)]
#[command(name = "scholar-resolver")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(author = "hongkongkiwi")]
#[command(about = "Resolve a scholar profile's publications into DOI / arXiv / URL identifiers", long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Enable verbose logging (can be used multiple times for more verbosity: -v, -vv)
    #[arg(long, short, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(long, short, global = true)]
    quiet: bool,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    log_json: bool,

    /// Output format
    #[arg(long, short, value_enum, global = true, default_value_t = OutputFormat::Auto)]
    output: OutputFormat,

    /// Configuration file path
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Disable caching for this command (forces a fresh fetch)
    #[arg(long, global = true, default_value_t = false)]
    no_cache: bool,

    #[command(subcommand)]
    command: Commands,
}

/// Output format for results
#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
enum OutputFormat {
    /// Automatic based on terminal (table if TTY, JSON otherwise)
    Auto,
    /// Table format (human-readable)
    Table,
    /// Full records as JSON
    Json,
    /// `[{"id": ...}]` for resolved records only
    Ids,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Resolve every publication of one author
    #[command(alias = "r")]
    Resolve {
        /// Author profile id (e.g. secQmYUAAAAJ)
        author_id: String,

        /// Pass-through tag copied onto every record (key=value, repeatable)
        #[arg(long, short, value_parser = parse_tag)]
        tag: Vec<(String, Value)>,
    },

    /// Manage the publication cache
    Cache {
        #[command(subcommand)]
        command: CacheCommands,
    },

    /// Manage configuration
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },

    /// Generate shell completions
    Completions {
        /// Target shell
        #[arg(value_enum)]
        shell: clap_complete::Shell,
    },
}

#[derive(Subcommand, Debug)]
enum CacheCommands {
    /// Show cache statistics
    Stats,
    /// Remove cached entries (other files in the directory are kept)
    Clear,
}

#[derive(Subcommand, Debug)]
enum ConfigCommands {
    /// Write a starter configuration file
    Init {
        /// Where to write it (default: user config directory)
        path: Option<PathBuf>,

        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
    /// Print the effective configuration
    Show,
}

fn parse_tag(raw: &str) -> Result<(String, Value), String> {
    AuthorQuery::parse_tag(raw).ok_or_else(|| format!("expected key=value, got {:?}", raw))
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config_path = cli.config.clone().or_else(find_config_file);
    let mut config = load_config(config_path.as_deref())?;
    if cli.no_cache {
        config.cache.enabled = false;
    }

    init_logging(&cli, &config);
    if let Some(path) = &config_path {
        tracing::debug!("Using config file: {}", path.display());
    }

    match cli.command {
        Commands::Resolve { author_id, tag } => {
            let query = AuthorQuery {
                author_id,
                tags: tag.into_iter().collect(),
            };
            let pipeline = Pipeline::from_config(&config)?;
            let outcome = pipeline.run_detailed(&query).await?;

            output_records(&outcome.records, cli.output)?;

            if !cli.quiet {
                let resolved = outcome
                    .records
                    .iter()
                    .filter(|r| r.identifier.is_resolved())
                    .count();
                eprintln!(
                    "{} records ({} resolved, {} skipped){}",
                    outcome.records.len(),
                    resolved,
                    outcome.skipped,
                    if outcome.from_cache { ", from cache" } else { "" }
                );
            }
        }

        Commands::Cache { command } => {
            let cache = CacheService::from_config(&config.cache);

            match command {
                CacheCommands::Stats => {
                    let stats = cache.stats();
                    if !stats.enabled {
                        println!("Cache: disabled");
                        println!("To enable, set SCHOLAR_RESOLVER_CACHE__ENABLED=true");
                    } else {
                        println!("Cache: enabled");
                        println!("Directory: {}", stats.cache_dir.display());
                        println!("Authors cached: {}", stats.author_count);
                        println!("Total size: {} KB", stats.total_size_kb);
                        println!("Freshness: {} seconds", stats.freshness.as_secs());
                    }
                }
                CacheCommands::Clear => {
                    if !cache.is_enabled() {
                        eprintln!("Cache: disabled, nothing to clear");
                        return Ok(());
                    }
                    if !cli.quiet {
                        eprintln!("Clearing all cached data in {}...", cache.cache_dir().display());
                    }
                    cache.clear_all()?;
                    if !cli.quiet {
                        eprintln!("Cache cleared successfully.");
                    }
                }
            }
        }

        Commands::Config { command } => match command {
            ConfigCommands::Init { path, force } => {
                let Some(path) = path.or_else(default_config_path) else {
                    bail!("No config directory available; pass a path");
                };
                if path.exists() && !force {
                    bail!("{} already exists (use --force to overwrite)", path.display());
                }
                Config::default().save(&path)?;
                if !cli.quiet {
                    eprintln!("Wrote {}", path.display());
                }
            }
            ConfigCommands::Show => {
                let mut shown = config.clone();
                if shown.api_keys.serpapi.is_some() {
                    shown.api_keys.serpapi = Some("********".to_string());
                }
                print!(
                    "{}",
                    toml::to_string_pretty(&shown).context("Failed to render configuration")?
                );
            }
        },

        Commands::Completions { shell } => {
            clap_complete::generate(
                shell,
                &mut Cli::command(),
                "scholar-resolver",
                &mut std::io::stdout(),
            );
        }
    }

    Ok(())
}

fn init_logging(cli: &Cli, config: &Config) {
    let level = match (cli.quiet, cli.verbose) {
        (true, _) => "error",
        (false, 0) => config.logging.level.as_str(),
        (false, 1) => "debug",
        (false, _) => "trace",
    };

    let filter = tracing_subscriber::EnvFilter::new(
        std::env::var("RUST_LOG").unwrap_or_else(|_| format!("scholar_resolver={}", level)),
    );
    let registry = tracing_subscriber::registry().with(filter);

    if cli.log_json {
        registry
            .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        registry
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .init();
    }
}

/// `[{"id": ...}]` for every resolved record, in order
fn manubot_ids(records: &[NormalizedRecord]) -> Vec<Value> {
    records
        .iter()
        .filter_map(|r| r.identifier.source_id())
        .map(|id| json!({ "id": id }))
        .collect()
}

fn truncate(text: &str, max: usize) -> String {
    if text.chars().count() > max {
        let head: String = text.chars().take(max.saturating_sub(3)).collect();
        format!("{}...", head)
    } else {
        text.to_string()
    }
}

fn output_records(records: &[NormalizedRecord], format: OutputFormat) -> Result<()> {
    let actual_format = if format == OutputFormat::Auto {
        if std::io::stdout().is_terminal() {
            OutputFormat::Table
        } else {
            OutputFormat::Json
        }
    } else {
        format
    };

    match actual_format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(records)?);
        }
        OutputFormat::Ids => {
            println!("{}", serde_json::to_string_pretty(&manubot_ids(records))?);
        }
        OutputFormat::Table | OutputFormat::Auto => {
            use comfy_table::{Attribute, Cell, Table};
            let mut table = Table::new();
            table.load_preset(comfy_table::presets::UTF8_FULL);
            table.set_header(vec!["Title", "Year", "Identifier", "Authors"]);

            for record in records {
                let year: String = record.date.chars().take(4).collect();
                table.add_row(vec![
                    Cell::new(truncate(&record.title, 50)).add_attribute(Attribute::Bold),
                    Cell::new(year),
                    Cell::new(truncate(&record.identifier.to_string(), 45)),
                    Cell::new(truncate(&record.authors.join(", "), 30)),
                ]);
            }
            println!("{table}");
        }
    }
    Ok(())
}
