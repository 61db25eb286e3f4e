//! CLI entry point for the data product catalog registry.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};
use serde::Serialize;
use tracing_subscriber::{fmt, EnvFilter};

use catalog_core::{attributes, Attributes, DataProduct, EntityId};
use catalog_graph::GraphClient;

use catalog_registry::config::CatalogConfig;
use catalog_registry::{AutoWireScheduler, Registry};

#[derive(Parser)]
#[command(name = "catalog")]
#[command(about = "Data product registry for the catalog knowledge graph")]
struct Cli {
    /// Config file prefix (default: catalog).
    #[arg(short, long, default_value = "catalog")]
    config: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Create a data product from a JSON file.
    Create { file: PathBuf },

    /// Update a data product from a JSON file carrying its id.
    Update { file: PathBuf },

    /// Record that UPSTREAM triggers DOWNSTREAM. Each pipeline is a name
    /// or a JSON attribute object with a `name`.
    Link { upstream: String, downstream: String },

    /// Record that PIPELINE produces the data product ID.
    Produces { pipeline: String, id: EntityId },

    /// Record that FROM feeds into TO.
    Depend {
        from: String,
        to: String,

        /// Address data products by name instead of id.
        #[arg(long)]
        by_name: bool,
    },

    /// Derive dependencies from pipeline topology.
    Autowire {
        /// Keep running on the configured interval.
        #[arg(long)]
        daemon: bool,
    },

    /// Show the change log of a data product.
    History { id: EntityId },

    /// Delete every node and relationship in the graph.
    Clear {
        /// Confirm the deletion.
        #[arg(long)]
        yes: bool,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    fmt().with_env_filter(filter).json().init();

    let cli = Cli::parse();
    let config = CatalogConfig::load(&cli.config)?;

    let graph = GraphClient::connect(&config.neo4j).await?;
    let registry = Arc::new(Registry::with_config(graph.clone(), config.registry.clone()));

    match cli.command {
        Command::Create { file } => {
            let product = read_product(&file)?;
            print_json(&registry.create(&product).await?)?;
        }
        Command::Update { file } => {
            let product = read_product(&file)?;
            print_json(&registry.update(&product).await?)?;
        }
        Command::Link {
            upstream,
            downstream,
        } => {
            let created = registry
                .link_pipelines(&pipeline_arg(&upstream)?, &pipeline_arg(&downstream)?)
                .await?;
            print_json(&serde_json::json!({ "created": created }))?;
        }
        Command::Produces { pipeline, id } => {
            let created = registry
                .pipeline_produces(&pipeline_arg(&pipeline)?, id)
                .await?;
            print_json(&serde_json::json!({ "created": created }))?;
        }
        Command::Depend { from, to, by_name } => {
            let created = if by_name {
                registry.add_dependency_by_name(&from, &to).await?
            } else {
                let from: EntityId = from.parse().context("FROM is not a data product id")?;
                let to: EntityId = to.parse().context("TO is not a data product id")?;
                registry.add_dependency(from, to).await?
            };
            print_json(&serde_json::json!({ "created": created }))?;
        }
        Command::Autowire { daemon } => {
            if daemon {
                AutoWireScheduler::from_config(registry).run().await;
            } else {
                print_json(&registry.auto_wire_dependencies().await?)?;
            }
        }
        Command::History { id } => {
            print_json(&registry.history(id).await?)?;
        }
        Command::Clear { yes } => {
            if !yes {
                anyhow::bail!("Refusing to clear the graph without --yes");
            }
            let removed = graph.clear().await?;
            print_json(&serde_json::json!({ "removed": removed }))?;
        }
    }

    Ok(())
}

fn read_product(path: &Path) -> anyhow::Result<DataProduct> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    serde_json::from_str(&raw).with_context(|| format!("Invalid data product in {}", path.display()))
}

/// A bare name, or a JSON object of pipeline attributes.
fn pipeline_arg(raw: &str) -> anyhow::Result<Attributes> {
    if raw.trim_start().starts_with('{') {
        serde_json::from_str(raw).context("Invalid pipeline attributes")
    } else {
        Ok(attributes([("name", raw)]))
    }
}

fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
