//! route-dispatch
//!
//! Intercepting HTTP server driven by route rules.
//!
//! # Architecture Overview
//!
//! ```text
//!                     ┌──────────────────────────────────────────────────────┐
//!                     │                    ROUTE DISPATCH                     │
//!                     │                                                       │
//!   Client Request    │  ┌─────────┐   ┌──────────┐   ┌──────────────────┐   │
//!   ──────────────────┼─▶│  http   │──▶│   page   │──▶│    dispatcher    │   │
//!                     │  │ server  │   │ request  │   │ page routes  ──┐ │   │
//!                     │  └─────────┘   └──────────┘   │ context routes◀┘ │   │
//!                     │                               └────────┬─────────┘   │
//!                     │                                        │ continue /  │
//!                     │                                        ▼ exhausted   │
//!   Client Response   │  ┌─────────┐                  ┌──────────────────┐   │
//!   ◀─────────────────┼──│response │◀─────────────────│  network client  │◀──┼── Upstream
//!                     │  └─────────┘   fulfill/abort  └──────────────────┘   │
//!                     │                                                       │
//!                     │  config + rules (hot reload) · logging · metrics      │
//!                     └──────────────────────────────────────────────────────┘
//! ```

use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::{Parser, Subcommand};
use tokio::net::TcpListener;
use url::Url;

use route_dispatch::config::{load_config, ConfigWatcher, DispatchConfig, PatternKind};
use route_dispatch::lifecycle::{shutdown_on_signal, Shutdown};
use route_dispatch::observability::{logging, metrics};
use route_dispatch::routing::{glob_to_regex, install_rules, reload_rules};
use route_dispatch::{Context, ContextOptions, HttpNetwork, InterceptServer, UrlPattern};

#[derive(Parser)]
#[command(name = "route-dispatch")]
#[command(about = "Intercepting HTTP server driven by route rules", long_about = None)]
struct Cli {
    /// Configuration file (TOML). Defaults apply when omitted.
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the intercept server
    Serve,
    /// Validate the configuration and exit
    Check,
    /// Test a URL against a pattern
    Match {
        pattern: String,
        url: String,
        #[arg(long, value_enum, default_value_t = PatternKind::Glob)]
        kind: PatternKind,
        /// Base URL for relative patterns
        #[arg(long)]
        base_url: Option<Url>,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Serve => serve(cli.config.as_deref()).await,
        Commands::Check => check(cli.config.as_deref()),
        Commands::Match {
            pattern,
            url,
            kind,
            base_url,
        } => match_url(pattern, &url, kind, base_url.as_ref()),
    }
}

fn read_config(path: Option<&Path>) -> Result<DispatchConfig, Box<dyn std::error::Error>> {
    Ok(match path {
        Some(path) => load_config(path)?,
        None => DispatchConfig::default(),
    })
}

async fn serve(path: Option<&Path>) -> Result<(), Box<dyn std::error::Error>> {
    let config = read_config(path)?;
    logging::init(&config.observability.log_level);

    tracing::info!("route-dispatch v{} starting", env!("CARGO_PKG_VERSION"));
    tracing::info!(
        bind_address = %config.listener.bind_address,
        request_timeout_ms = config.timeouts.request_ms,
        rules = config.rules.len(),
        "Configuration loaded"
    );

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse::<SocketAddr>() {
            Ok(addr) => metrics::init_metrics(addr),
            Err(error) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                %error,
                "Failed to parse metrics address"
            ),
        }
    }

    let network = Arc::new(HttpNetwork::new(&config.network, &config.timeouts).mark_forwarded());
    let context = Context::new(network, ContextOptions::from_config(&config)?);
    install_rules(&context, &config.rules)?;
    let page = context.new_page()?;

    let listener = TcpListener::bind(&config.listener.bind_address).await?;
    tracing::info!(address = %listener.local_addr()?, "Listening for connections");

    let shutdown = Shutdown::new();
    tokio::spawn(shutdown_on_signal(shutdown.clone()));

    // Keep the watcher alive for the lifetime of the server.
    let _watcher = match path {
        Some(path) => {
            let (watcher, mut updates) = ConfigWatcher::new(path);
            let handle = watcher.run()?;
            let context = context.clone();
            tokio::spawn(async move {
                while let Some(config) = updates.recv().await {
                    match reload_rules(&context, &config.rules).await {
                        Ok(ids) => tracing::info!(rules = ids.len(), "Route rules reloaded"),
                        Err(error) => tracing::error!(%error, "Failed to reload route rules"),
                    }
                }
            });
            Some(handle)
        }
        None => None,
    };

    InterceptServer::new(page, &config).run(listener, shutdown).await?;
    context.close();

    tracing::info!("Shutdown complete");
    Ok(())
}

fn check(path: Option<&Path>) -> Result<(), Box<dyn std::error::Error>> {
    let config = read_config(path)?;
    println!(
        "configuration ok: {} rule(s), listening on {}",
        config.rules.len(),
        config.listener.bind_address
    );
    for (index, rule) in config.rules.iter().enumerate() {
        println!("  [{index}] {:?} {} ({:?})", rule.action, rule.label(), rule.kind);
    }
    Ok(())
}

fn match_url(
    pattern: String,
    url: &str,
    kind: PatternKind,
    base_url: Option<&Url>,
) -> Result<(), Box<dyn std::error::Error>> {
    if kind == PatternKind::Glob {
        println!("regex: {}", glob_to_regex(&pattern)?);
    }

    let compiled = match kind {
        PatternKind::Glob => UrlPattern::glob(pattern),
        PatternKind::Regex => UrlPattern::regex(pattern),
        PatternKind::Exact => UrlPattern::exact(pattern),
    }
    .compile(base_url)?;
    let url = Url::parse(url)?;

    println!("{}", if compiled.matches(&url) { "match" } else { "no match" });
    Ok(())
}
