//! Binary entry point for regdedup.
//!
//! Maps the command line onto [`DeduplicationEngine`] operations over a JSON
//! file store. Every result is printed to stdout as pretty JSON; logs go to
//! stderr or the configured log file.

#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(missing_docs)]
// Allow print_stderr in main binary for CLI output
#![allow(clippy::print_stderr)]
#![allow(clippy::print_stdout)]
// Allow needless_pass_by_value for command functions
#![allow(clippy::needless_pass_by_value)]
// Allow multiple crate versions from transitive dependencies
#![allow(clippy::multiple_crate_versions)]

use anyhow::{Context, Result};
use clap::{Args, CommandFactory, Parser, Subcommand};
use clap_complete::Shell;
use regdedup::config::AppConfig;
use regdedup::observability::{self, InitOptions};
use regdedup::storage::{FileStore, ResilientStore};
use regdedup::{
    CleanupOptions, CleanupStrategy, CompareScope, ConfigPatch, DeduplicationEngine,
    KnowledgeObject, ObjectFilter,
};
use serde::Serialize;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

type Engine = DeduplicationEngine<ResilientStore<FileStore>>;

/// regdedup - duplicate detection and cleanup for regulatory knowledge.
#[derive(Parser)]
#[command(name = "regdedup")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Enable verbose output.
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Path to configuration file.
    #[arg(short, long, global = true, env = "REGDEDUP_CONFIG_PATH")]
    config: Option<PathBuf>,

    /// Path to the JSON knowledge store (overrides the config file).
    #[arg(long, global = true)]
    store: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

/// Available commands.
#[derive(Subcommand)]
enum Commands {
    /// Check one object (JSON file, `-` for stdin) against the store.
    Check {
        /// Object document.
        file: PathBuf,

        #[command(flatten)]
        overrides: KnobArgs,
    },

    /// Deduplicate a JSON array of objects against the store and each other.
    Batch {
        /// Array document.
        file: PathBuf,

        #[command(flatten)]
        overrides: KnobArgs,
    },

    /// Remove redundant objects from the store.
    Cleanup {
        /// Retention strategy: newest, oldest, or highest-trust.
        #[arg(short, long)]
        strategy: CleanupStrategy,

        /// Report what would be removed without removing it.
        #[arg(long)]
        dry_run: bool,

        #[command(flatten)]
        filter: FilterArgs,
    },

    /// Show deduplication statistics.
    Stats {
        /// Scan the store now instead of reporting the last cleanup.
        #[arg(long)]
        scan: bool,

        #[command(flatten)]
        filter: FilterArgs,
    },

    /// Print the fingerprint of a text.
    Fingerprint {
        /// Text to fingerprint.
        text: String,
    },

    /// Show or adjust engine configuration.
    Config {
        /// Config subcommand.
        #[command(subcommand)]
        action: ConfigAction,
    },

    /// Append objects from a JSON array to the store under fresh ids.
    Import {
        /// Array document.
        file: PathBuf,
    },

    /// Generate shell completions.
    Completions {
        /// Target shell.
        #[arg(value_enum)]
        shell: Shell,
    },
}

/// Config subcommands.
#[derive(Subcommand)]
enum ConfigAction {
    /// Show the effective configuration.
    Show,
    /// Validate and apply new knob values for this process.
    Set {
        #[command(flatten)]
        knobs: KnobArgs,
    },
}

/// Engine knobs accepted on the command line.
#[derive(Args, Default)]
struct KnobArgs {
    /// Near-duplicate threshold in (0, 1].
    #[arg(long)]
    threshold: Option<f64>,

    /// Shingle size (tokens per shingle).
    #[arg(long)]
    shingle_size: Option<usize>,

    /// Comparison scope: within_batch, against_store, or both.
    #[arg(long, value_parser = parse_scope)]
    scope: Option<CompareScope>,
}

impl KnobArgs {
    fn to_patch(&self) -> ConfigPatch {
        let mut patch = ConfigPatch::new();
        if let Some(threshold) = self.threshold {
            patch = patch.threshold(threshold);
        }
        if let Some(size) = self.shingle_size {
            patch = patch.shingle_size(size);
        }
        if let Some(scope) = self.scope {
            patch = patch.compare_scope(scope);
        }
        patch
    }

    fn to_override(&self) -> Option<ConfigPatch> {
        let patch = self.to_patch();
        (!patch.is_empty()).then_some(patch)
    }
}

/// Store filter accepted on the command line.
#[derive(Args)]
struct FilterArgs {
    /// Only objects in this country.
    #[arg(long)]
    country: Option<String>,

    /// Only objects in this category.
    #[arg(long)]
    category: Option<String>,

    /// Only objects with this topic.
    #[arg(long)]
    topic: Option<String>,

    /// Only objects of this regulation type.
    #[arg(long)]
    regulation_type: Option<String>,
}

impl From<FilterArgs> for ObjectFilter {
    fn from(args: FilterArgs) -> Self {
        Self {
            topic: args.topic,
            category: args.category,
            country: args.country,
            regulation_type: args.regulation_type,
        }
    }
}

fn parse_scope(s: &str) -> std::result::Result<CompareScope, String> {
    CompareScope::parse(s)
        .ok_or_else(|| format!("unknown scope '{s}' (expected within_batch, against_store, both)"))
}

fn main() -> ExitCode {
    // A missing .env file is the normal case.
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();

    let config = match load_config(cli.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Failed to load configuration: {e:#}");
            return ExitCode::FAILURE;
        },
    };

    let _observability = match observability::init_from_config(
        &config.logging,
        &config.metrics,
        InitOptions {
            verbose: cli.verbose,
            metrics_expose: false,
        },
    ) {
        Ok(handle) => handle,
        Err(e) => {
            eprintln!("Failed to initialize observability: {e}");
            return ExitCode::FAILURE;
        },
    };

    match run_command(cli, config) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e:#}");
            ExitCode::FAILURE
        },
    }
}

/// Loads configuration: explicit path, then default location, then env.
fn load_config(path: Option<&Path>) -> Result<AppConfig> {
    let config = match path {
        Some(path) => AppConfig::load_from_file(path)
            .with_context(|| format!("loading {}", path.display()))?,
        None => AppConfig::load_default(),
    };
    Ok(config.with_env_overrides())
}

/// Runs the selected command.
fn run_command(cli: Cli, mut config: AppConfig) -> Result<()> {
    if let Some(store) = cli.store {
        config = config.with_store_path(store);
    }

    match cli.command {
        Commands::Check { file, overrides } => cmd_check(&config, &file, &overrides),
        Commands::Batch { file, overrides } => cmd_batch(&config, &file, &overrides),
        Commands::Cleanup {
            strategy,
            dry_run,
            filter,
        } => cmd_cleanup(&config, strategy, dry_run, filter.into()),
        Commands::Stats { scan, filter } => cmd_stats(&config, scan, &filter.into()),
        Commands::Fingerprint { text } => {
            let engine = build_engine(&config)?;
            print_json(&engine.generate_fingerprint(&text)?)
        },
        Commands::Config { action } => cmd_config(&config, action),
        Commands::Import { file } => cmd_import(&config, &file),
        Commands::Completions { shell } => {
            clap_complete::generate(
                shell,
                &mut Cli::command(),
                "regdedup",
                &mut std::io::stdout(),
            );
            Ok(())
        },
    }
}

fn build_engine(config: &AppConfig) -> Result<Engine> {
    let store = ResilientStore::new(FileStore::new(&config.store.path), &config.store.breaker);
    let engine = DeduplicationEngine::new(Arc::new(store), config.dedup.clone())?;
    Ok(engine)
}

fn cmd_check(config: &AppConfig, file: &Path, overrides: &KnobArgs) -> Result<()> {
    let object: KnowledgeObject = read_json(file)?;
    let engine = build_engine(config)?;
    let verdict = engine.check_duplicate(&object, overrides.to_override().as_ref())?;
    print_json(&verdict)
}

fn cmd_batch(config: &AppConfig, file: &Path, overrides: &KnobArgs) -> Result<()> {
    let objects: Vec<KnowledgeObject> = read_json(file)?;
    let engine = build_engine(config)?;
    let result = engine.batch_deduplicate(&objects, overrides.to_override().as_ref())?;
    print_json(&result)
}

fn cmd_cleanup(
    config: &AppConfig,
    strategy: CleanupStrategy,
    dry_run: bool,
    filter: ObjectFilter,
) -> Result<()> {
    let engine = Arc::new(build_engine(config)?);
    let interrupt = Arc::clone(&engine);
    ctrlc::set_handler(move || {
        if interrupt.cancel_cleanup() {
            tracing::warn!("Interrupt received, cancelling cleanup before removals");
        } else {
            std::process::exit(130);
        }
    })
    .context("installing interrupt handler")?;

    let options = CleanupOptions::new()
        .with_dry_run(dry_run)
        .with_filter(filter);
    let result = engine.cleanup_duplicates_with(strategy, &options)?;
    tracing::info!(summary = %result.summary(), "Cleanup finished");
    print_json(&result)
}

fn cmd_stats(config: &AppConfig, scan: bool, filter: &ObjectFilter) -> Result<()> {
    let engine = build_engine(config)?;
    print_json(&engine.get_deduplication_stats_in(filter, scan)?)
}

fn cmd_config(config: &AppConfig, action: ConfigAction) -> Result<()> {
    let engine = build_engine(config)?;
    let dedup = match action {
        ConfigAction::Show => engine.get_config(),
        ConfigAction::Set { knobs } => engine.update_config(&knobs.to_patch())?,
    };

    print_json(&serde_json::json!({
        "dedup": dedup,
        "configFingerprint": dedup.fingerprint(),
        "storePath": config.store.path,
        "storeBreaker": config.store.breaker,
    }))
}

fn cmd_import(config: &AppConfig, file: &Path) -> Result<()> {
    let drafts: Vec<KnowledgeObject> = read_json(file)?;
    let store = FileStore::new(&config.store.path);
    let created = store.create_all(drafts)?;
    tracing::info!(count = created.len(), path = %store.path().display(), "Imported objects");
    print_json(&created)
}

/// Reads a JSON document from a file, or stdin when the path is `-`.
fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T> {
    let contents = if path == Path::new("-") {
        let mut buf = String::new();
        std::io::stdin()
            .read_to_string(&mut buf)
            .context("reading stdin")?;
        buf
    } else {
        std::fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?
    };

    serde_json::from_str(&contents).with_context(|| format!("parsing {}", path.display()))
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
