//! product-search: HTTP entry point
//!
//! Loads settings, builds the configured engine binding and serves the
//! search API.

use anyhow::{Context, Result};
use product_search::{
    config::{self, EngineKind, Settings},
    engines::{ElasticsearchEngine, MemoryEngine, SearchEngine},
    network::HttpClient,
    web::{create_router, AppState},
};
use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::{prelude::*, reload, EnvFilter};

const DEFAULT_LOG_LEVEL: &str = "info";

enum Command {
    Help,
    Version,
    Serve(Option<String>),
}

fn parse_args() -> Result<Command> {
    let mut args = std::env::args().skip(1);
    match args.next().as_deref() {
        Some("-h") | Some("--help") => Ok(Command::Help),
        Some("-V") | Some("--version") => Ok(Command::Version),
        Some("-c") | Some("--config") => {
            let path = args.next().context("--config requires a file path")?;
            Ok(Command::Serve(Some(path)))
        }
        _ => Ok(Command::Serve(None)),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let config_path = match parse_args()? {
        Command::Help => {
            print_usage();
            return Ok(());
        }
        Command::Version => {
            println!("product-search {}", product_search::VERSION);
            return Ok(());
        }
        Command::Serve(path) => path,
    };

    // Initialize logging before settings so their loading is traced
    let (filter, filter_handle) = reload::Layer::new(
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_LEVEL)),
    );
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .init();

    info!("Starting product-search v{}", product_search::VERSION);

    let settings = match config_path {
        Some(path) => config::load_file(path)?,
        None => config::load()?,
    };
    if let Some(filter) = configured_filter(&settings, std::env::var_os("RUST_LOG").is_some()) {
        filter_handle.reload(filter)?;
    }

    let settings = config::init(settings)?;

    let engine = build_engine(settings).await?;
    info!("Using {} engine", engine.name());

    // Create application state
    let state = AppState::new(settings.clone(), engine);

    // Create router
    let app = create_router(state);

    // Bind address
    let addr = SocketAddr::new(
        settings.server.bind_address.parse()?,
        settings.server.port,
    );

    info!("Starting server on http://{}", addr);

    // Start server
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

/// Filter from the settings' log level, unless `RUST_LOG` already chose one
fn configured_filter(settings: &Settings, rust_log_set: bool) -> Option<EnvFilter> {
    if rust_log_set || settings.logging.level == DEFAULT_LOG_LEVEL {
        return None;
    }
    Some(EnvFilter::new(&settings.logging.level))
}

/// Build the engine binding selected in settings
async fn build_engine(settings: &Settings) -> Result<Arc<dyn SearchEngine>> {
    match settings.engine.kind {
        EngineKind::Elasticsearch => {
            let client = HttpClient::with_settings(&settings.outgoing)?;
            let engine = ElasticsearchEngine::from_settings(client, &settings.engine)?;
            info!(
                "Elasticsearch at {} (index '{}')",
                settings.engine.url,
                engine.index()
            );
            Ok(Arc::new(engine))
        }
        EngineKind::Memory => {
            let documents = match settings.engine.seed_file {
                Some(ref path) => load_seed(path)?,
                None => Vec::new(),
            };
            let engine = MemoryEngine::with_documents(documents)?;
            info!("Memory engine loaded {} documents", engine.len().await);
            Ok(Arc::new(engine))
        }
    }
}

fn load_seed(path: &Path) -> Result<Vec<serde_json::Value>> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read seed file {}", path.display()))?;
    let documents = serde_json::from_str(&content)
        .with_context(|| format!("Seed file {} must hold a JSON array", path.display()))?;
    Ok(documents)
}

/// Print usage information
fn print_usage() {
    println!(
        r#"
product-search v{}
Faceted product search API over Elasticsearch

USAGE:
    product-search [OPTIONS]

OPTIONS:
    -c, --config <FILE>    Path to configuration file
    -h, --help             Print help information
    -V, --version          Print version information

ENVIRONMENT VARIABLES:
    PRODUCT_SEARCH_SETTINGS_PATH     Path to settings.yml
    PRODUCT_SEARCH_PORT              Server port
    PRODUCT_SEARCH_BIND_ADDRESS      Bind address
    PRODUCT_SEARCH_ENGINE            elasticsearch or memory
    PRODUCT_SEARCH_ENGINE_URL        Elasticsearch base URL
    PRODUCT_SEARCH_INDEX             Product index name
    PRODUCT_SEARCH_ENGINE_USERNAME   Basic auth user
    PRODUCT_SEARCH_ENGINE_PASSWORD   Basic auth password
    PRODUCT_SEARCH_LOG_LEVEL         Default log filter (RUST_LOG wins)
"#,
        product_search::VERSION
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_configured_filter() {
        let mut settings = Settings::default();
        assert!(configured_filter(&settings, false).is_none());

        settings.logging.level = "debug".to_string();
        let filter = configured_filter(&settings, false).unwrap();
        assert_eq!(filter.to_string(), "debug");

        assert!(configured_filter(&settings, true).is_none());
    }
}
