//! trustgraph CLI: product mention matching and trust aggregation.

use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use miette::{IntoDiagnostic, Result};

use trustgraph::config::EngineConfig;
use trustgraph::mention::Feedback;
use trustgraph::pipeline::{CancelToken, Pipeline};
use trustgraph::registry::{RegistrySnapshot, SharedRegistry};
use trustgraph::storage::JsonlStore;

#[derive(Parser)]
#[command(name = "trustgraph", version, about = "Product trust aggregation engine")]
struct Cli {
    /// Engine configuration file (TOML).
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Product registry JSON file; overrides the configured path.
    #[arg(long, global = true)]
    registry: Option<PathBuf>,

    /// Atom store file (JSONL). Omit for a run-scoped in-memory store.
    #[arg(long, global = true)]
    store: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Manage the product registry.
    Registry {
        #[command(subcommand)]
        action: RegistryAction,
    },

    /// Resolve one mention and print the calibrated match as JSON.
    Match {
        /// Mention text.
        text: String,
    },

    /// Process a batch of feedback records from a JSON file.
    Process {
        /// Path to a JSON array of feedback records.
        #[arg(long)]
        file: PathBuf,
    },

    /// Print the aggregated trust context for a product as JSON.
    Context {
        /// Product id.
        product_id: String,

        /// Ego-network hop bound.
        #[arg(long)]
        max_hops: Option<usize>,
    },

    /// Show pipeline statistics.
    Info,
}

#[derive(Subcommand)]
enum RegistryAction {
    /// Validate a registry file and print its load report.
    Load {
        /// Registry JSON file.
        file: PathBuf,
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

    let mut config = match &cli.config {
        Some(path) => EngineConfig::load(path).into_diagnostic()?,
        None => EngineConfig::default(),
    };
    if let Some(path) = &cli.registry {
        config.registry_path = Some(path.clone());
    }

    match cli.command {
        Commands::Registry { action } => match action {
            RegistryAction::Load { file } => {
                let (snapshot, report) = RegistrySnapshot::load_file(&file).into_diagnostic()?;
                print!("{report}");
                println!("alias index entries: {}", snapshot.alias_count());
            }
        },

        Commands::Match { text } => {
            let pipeline = build_pipeline(config, cli.store.as_deref())?;
            let result = pipeline.resolve(&text).into_diagnostic()?;
            let json = serde_json::to_string_pretty(&result).into_diagnostic()?;
            println!("{json}");
        }

        Commands::Process { file } => {
            let pipeline = build_pipeline(config, cli.store.as_deref())?;
            let content = std::fs::read_to_string(&file).into_diagnostic()?;
            let batch: Vec<Feedback> = serde_json::from_str(&content).into_diagnostic()?;

            let report = pipeline.process_batch(&batch, &CancelToken::new());
            print!("{report}");
            if !pipeline.suggestions().is_empty() {
                println!(
                    "{} unmatched mention(s) recorded for registry review",
                    pipeline.suggestions().len()
                );
            }
        }

        Commands::Context {
            product_id,
            max_hops,
        } => {
            if let Some(hops) = max_hops {
                config.aggregation.max_hops = hops;
            }
            let pipeline = build_pipeline(config, cli.store.as_deref())?;
            pipeline.replay_store().into_diagnostic()?;

            let context = pipeline.trust_context(&product_id);
            let json = serde_json::to_string_pretty(&*context).into_diagnostic()?;
            println!("{json}");
        }

        Commands::Info => {
            let pipeline = build_pipeline(config, cli.store.as_deref())?;
            pipeline.replay_store().into_diagnostic()?;
            print!("{}", pipeline.info());
        }
    }

    Ok(())
}

/// Assemble the pipeline: registry from config, store from the CLI flag.
fn build_pipeline(config: EngineConfig, store: Option<&std::path::Path>) -> Result<Pipeline> {
    let snapshot = match &config.registry_path {
        Some(path) => {
            let (snapshot, report) = RegistrySnapshot::load_file(path).into_diagnostic()?;
            if !report.rejected.is_empty() || !report.ambiguous_aliases.is_empty() {
                tracing::warn!(
                    rejected = report.rejected.len(),
                    ambiguous = report.ambiguous_aliases.len(),
                    "registry loaded with findings, run `registry load` for details"
                );
            }
            snapshot
        }
        None => RegistrySnapshot::empty(),
    };
    let registry = Arc::new(SharedRegistry::new(snapshot));

    let mut pipeline = Pipeline::from_config(config, registry).into_diagnostic()?;
    if let Some(path) = store {
        pipeline = pipeline.with_store(Arc::new(JsonlStore::open(path).into_diagnostic()?));
    }
    Ok(pipeline)
}
