//! Sportello - command-line front desk for course resource lists.
//!
//! Loads certificates, group configurations or textbooks from a course
//! authoring API one page at a time, and adds, edits or deletes single items
//! through the same list and editor components a web front end uses.

mod commands;
mod config;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use elenco::{
    Endpoint, HttpTransport, ListView, MemoryTransport, PageConfig, ResourceKind, ResourceSet,
    TemplateRegistry, Transport,
};
use serde_json::Value;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::{fmt, EnvFilter};

use config::Settings;

const DRY_RUN_BASE_URL: &str = "memory://sportello";

#[derive(Parser)]
#[command(name = "sportello")]
#[command(about = "List, add, edit and delete course resources over REST")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// API root the kind paths hang off (overrides ELENCO_BASE_URL)
    #[arg(long, global = true)]
    base_url: Option<String>,

    /// Items per page, 0 to disable paging (overrides ELENCO_PAGE_SIZE)
    #[arg(long, global = true)]
    page_size: Option<u32>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info", global = true)]
    log_level: String,

    /// Use an empty in-memory store instead of the network
    #[arg(long, global = true)]
    dry_run: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Fetch one page and log its entries
    List {
        /// certificate, group-configuration or textbook
        #[arg(long, short)]
        kind: String,

        /// Page to load, starting at 1
        #[arg(long, default_value = "1")]
        page: u32,

        /// Write the rendered list to this file (or a timestamped file in this directory)
        #[arg(long, short)]
        output: Option<PathBuf>,
    },

    /// Create a new item
    Add {
        #[arg(long, short)]
        kind: String,

        /// Field value; JSON values are accepted (repeatable)
        #[arg(long = "set", value_name = "FIELD=VALUE", value_parser = commands::parse_assignment)]
        values: Vec<(String, Value)>,
    },

    /// Change fields of an existing item
    Edit {
        #[arg(long, short)]
        kind: String,

        #[arg(long)]
        id: String,

        /// Field value; JSON values are accepted (repeatable)
        #[arg(long = "set", value_name = "FIELD=VALUE", value_parser = commands::parse_assignment)]
        values: Vec<(String, Value)>,
    },

    /// Delete an item after confirmation
    Delete {
        #[arg(long, short)]
        kind: String,

        #[arg(long)]
        id: String,

        /// Skip the confirmation prompt
        #[arg(long, short)]
        yes: bool,
    },
}

impl Commands {
    fn kind(&self) -> &str {
        match self {
            Commands::List { kind, .. }
            | Commands::Add { kind, .. }
            | Commands::Edit { kind, .. }
            | Commands::Delete { kind, .. } => kind,
        }
    }
}

fn init_tracing(log_level: &str) {
    let mut filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level));
    for directive in ["hyper=warn", "reqwest=warn"] {
        if let Ok(directive) = directive.parse() {
            filter = filter.add_directive(directive);
        }
    }

    fmt().with_env_filter(filter).with_target(false).init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    init_tracing(&cli.log_level);

    let mut settings = Settings::from_env().context("Failed to load settings")?;
    if let Some(url) = cli.base_url {
        settings.base_url = Some(url);
    }
    if let Some(size) = cli.page_size {
        settings.page_size = size;
    }

    if cli.dry_run {
        info!("Dry run: working against an in-memory store");
        settings
            .base_url
            .get_or_insert_with(|| DRY_RUN_BASE_URL.to_string());
        run(cli.command, &settings, MemoryTransport::new()).await
    } else {
        let transport = HttpTransport::new(settings.timeout)
            .context("Failed to build HTTP client")?
            .update_method(settings.update_method);
        run(cli.command, &settings, transport).await
    }
}

async fn run<T: Transport>(command: Commands, settings: &Settings, transport: T) -> Result<()> {
    let mut set = build_set(command.kind(), settings, transport)?;
    let mut view = ListView::new(&set, Arc::new(TemplateRegistry::with_defaults()));

    match command {
        Commands::List { page, output, .. } => {
            commands::list(&mut set, &mut view, page, output).await
        }
        Commands::Add { values, .. } => commands::add(&mut set, &mut view, values).await,
        Commands::Edit { id, values, .. } => {
            commands::edit(&mut set, &mut view, &commands::parse_id(&id), values).await
        }
        Commands::Delete { id, yes, .. } => {
            commands::delete(&mut set, &mut view, &commands::parse_id(&id), yes).await
        }
    }
}

fn build_set<T: Transport>(kind: &str, settings: &Settings, transport: T) -> Result<ResourceSet<T>> {
    let kind = elenco::kind::builtin(kind).with_context(|| {
        format!("Unknown kind `{kind}` (expected certificate, group-configuration or textbook)")
    })?;
    let base_url = settings
        .base_url
        .as_deref()
        .context("No API root configured; set ELENCO_BASE_URL or pass --base-url")?;
    let endpoint = Endpoint::new(format!("{}/{}", base_url.trim_end_matches('/'), kind.path()));
    info!(kind = kind.name(), endpoint = endpoint.url(), "Using endpoint");

    let mut set = ResourceSet::new(Arc::new(kind), endpoint, Arc::new(transport))
        .with_reserved(Arc::new(settings.reserved_keys.clone()));
    if settings.page_size > 0 {
        set = set.with_pagination(PageConfig::default().with_page_size(settings.page_size));
    }
    Ok(set)
}
