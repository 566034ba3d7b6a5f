//! Rule Engine CLI - run, preview and manage business rule files

use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use rule_engine::persistence::{load_export, save_export};
use rule_engine::{EngineConfig, ImportOptions, RuleContext, RuleFilter, RuleRegistry};
use serde::Serialize;
use std::path::{Path, PathBuf};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Business rule automation engine
#[derive(Parser)]
#[command(name = "rule-engine", version, about = "Business rule automation engine")]
struct Cli {
    /// Engine configuration file (JSON)
    #[arg(long, global = true, env = "RULE_ENGINE_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Execute active rules against a context
    Run {
        /// Rules interchange file
        rules: PathBuf,
        /// Context JSON file
        #[arg(long)]
        context: PathBuf,
        #[command(flatten)]
        filters: FilterArgs,
    },

    /// Preview whether a rule's conditions match, without running actions
    Test {
        /// Rules interchange file
        rules: PathBuf,
        /// Id of the rule to preview
        #[arg(long)]
        rule: String,
        /// Context JSON file
        #[arg(long)]
        context: PathBuf,
    },

    /// Validate every rule in a file
    Validate {
        /// Rules interchange file
        rules: PathBuf,
    },

    /// Show counts by status, category and portal
    Stats {
        /// Rules interchange file
        rules: PathBuf,
    },

    /// Write a filtered copy of a rules file
    Export {
        /// Rules interchange file
        rules: PathBuf,
        /// Destination file
        #[arg(long)]
        out: PathBuf,
        #[command(flatten)]
        filters: FilterArgs,
    },
}

#[derive(Args)]
struct FilterArgs {
    /// Only rules in this category
    #[arg(long)]
    category: Option<String>,
    /// Only rules visible to this portal
    #[arg(long)]
    portal: Option<String>,
    /// Only rules carrying one of these tags (repeatable)
    #[arg(long = "tag")]
    tags: Vec<String>,
}

impl From<FilterArgs> for RuleFilter {
    fn from(args: FilterArgs) -> Self {
        RuleFilter {
            category: args.category,
            portal: args.portal,
            tags: args.tags.into_iter().collect(),
        }
    }
}

/// Load a rules file into a fresh registry, logging anything skipped
async fn load_registry(config: EngineConfig, path: &Path) -> anyhow::Result<RuleRegistry> {
    let payload = load_export(path)
        .await
        .with_context(|| format!("failed to read rules from {}", path.display()))?;

    let mut registry = RuleRegistry::with_default_handlers(config);
    let report = registry.import_rules(&payload, ImportOptions { overwrite: true });
    for error in &report.errors {
        tracing::warn!("{}", error);
    }
    tracing::info!(
        "Loaded {} rules from {} ({} skipped)",
        report.imported,
        path.display(),
        report.skipped
    );
    Ok(registry)
}

async fn load_context(path: &Path) -> anyhow::Result<RuleContext> {
    let contents = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("failed to read context from {}", path.display()))?;
    Ok(RuleContext::from_json(&contents)?)
}

fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "rule_engine=info,rule_engine_cli=info".into()),
        )
        .init();

    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => EngineConfig::from_json_file(path)
            .with_context(|| format!("failed to load config from {}", path.display()))?,
        None => EngineConfig::default(),
    };

    match cli.command {
        Commands::Run {
            rules,
            context,
            filters,
        } => {
            let registry = load_registry(config, &rules).await?;
            let mut context = load_context(&context).await?;
            let results = registry.execute_rules(&mut context, &filters.into()).await;
            print_json(&serde_json::json!({
                "results": results,
                "context": context,
            }))?;
        }
        Commands::Test {
            rules,
            rule,
            context,
        } => {
            let registry = load_registry(config, &rules).await?;
            let context = load_context(&context).await?;
            let preview = registry.test_rule(&rule, &context).await?;
            print_json(&preview)?;
        }
        Commands::Validate { rules } => {
            // Validate raw records so invalid and duplicate rules are reported, not dropped
            let payload = load_export(&rules).await?;
            let mut registry = RuleRegistry::with_default_handlers(config);
            let report = registry.import_rules(&payload, ImportOptions { overwrite: false });
            print_json(&report)?;
            if report.skipped > 0 {
                anyhow::bail!(
                    "{} invalid or duplicate rules in {}",
                    report.skipped,
                    rules.display()
                );
            }
        }
        Commands::Stats { rules } => {
            let registry = load_registry(config, &rules).await?;
            print_json(&registry.get_rule_statistics())?;
        }
        Commands::Export {
            rules,
            out,
            filters,
        } => {
            let registry = load_registry(config, &rules).await?;
            let export = registry.export_rules(&filters.into());
            save_export(&out, &export).await?;
            tracing::info!("Exported {} rules to {}", export.rules.len(), out.display());
        }
    }

    Ok(())
}
