//! Push Broker
//!
//! Standalone server for push-notification registration and dispatch.

use clap::{Parser, ValueEnum};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, info, warn, Level};
use tracing_subscriber::{filter::Directive, fmt, prelude::*, EnvFilter};

use push_broker::{
    ApiServer, ApiServerConfig, Broker, BrokerConfig, BrokerMetrics, Error, FileStorage,
    FileStorageConfig, HandlerFactory, HandlerSpec, MemoryStorage, RegistrationStore, Result,
    SharedRecordStorage, WebhookConfig,
};

// =============================================================================
// CLI Arguments
// =============================================================================

/// Record storage backend
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum StorageBackend {
    /// In-process only, lost on restart
    Memory,
    /// One JSON file per node under the data directory
    File,
}

/// Push Broker - registration and dispatch for push notifications
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// REST API bind address
    #[arg(long, env = "API_ADDR", default_value = "0.0.0.0:5281")]
    api_addr: String,

    /// Record storage backend
    #[arg(long, env = "STORAGE_BACKEND", value_enum, default_value = "file")]
    storage: StorageBackend,

    /// Root directory for the file backend
    #[arg(long, env = "DATA_DIR", default_value = "./push-broker-data")]
    data_dir: PathBuf,

    /// Fsync every record write
    #[arg(long, env = "SYNC_WRITES")]
    sync_writes: bool,

    /// Push handler binding, `type=log` or `type=webhook:<url>` (repeatable)
    #[arg(long = "handler", env = "PUSH_HANDLERS", value_delimiter = ',')]
    handlers: Vec<HandlerSpec>,

    /// Request body limit in bytes
    #[arg(long, env = "BODY_SIZE_LIMIT", default_value = "4096")]
    body_size_limit: usize,

    /// Expose /v1/settings
    #[arg(long, env = "DEBUG_SETTINGS")]
    debug_settings: bool,

    /// Webhook request timeout in seconds
    #[arg(long, env = "WEBHOOK_TIMEOUT_SECS", default_value = "10")]
    webhook_timeout_secs: u64,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "LOG_LEVEL", default_value = "info")]
    log_level: String,

    /// Output logs as JSON
    #[arg(long, env = "LOG_JSON")]
    log_json: bool,
}

// =============================================================================
// Main
// =============================================================================

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize logging
    init_logging(&args)?;

    info!("Starting Push Broker");
    info!("  Version: {}", push_broker::VERSION);
    info!("  REST API: {}", args.api_addr);
    info!("  Storage: {:?}", args.storage);
    info!("  Debug settings: {}", args.debug_settings);

    // Open record storage
    let backend = open_storage(&args).await?;
    let store = RegistrationStore::new(backend);
    info!(
        "Registration store initialized ({} backend, {} nodes)",
        store.backend_name(),
        store.node_count()
    );

    // Build push handlers
    let webhook = WebhookConfig {
        timeout_secs: args.webhook_timeout_secs,
        ..Default::default()
    };
    let handlers = HandlerFactory::build_registry(&args.handlers, &webhook)?;
    if handlers.is_empty() {
        warn!("No push handlers configured, every push will fail");
    } else {
        info!("Push handlers: {}", handlers.types().join(", "));
    }

    // Metrics follow the store's event stream
    let metrics = BrokerMetrics::new()?;
    metrics.spawn_recorder(store.subscribe());

    let broker_config = BrokerConfig {
        debug_settings: args.debug_settings,
        body_size_limit: args.body_size_limit,
    };
    if broker_config.effective_body_limit() < args.body_size_limit {
        warn!(
            "Body size limit {} exceeds host maximum, using {}",
            args.body_size_limit,
            broker_config.effective_body_limit()
        );
    }
    let broker = Broker::new(broker_config, store, handlers);

    // Create and run API server
    let api_config = ApiServerConfig {
        rest_addr: args
            .api_addr
            .parse()
            .map_err(|e| Error::Configuration(format!("Invalid REST API address: {}", e)))?,
    };

    let api_server = Arc::new(ApiServer::new(api_config, broker, metrics));

    let shutdown = api_server.shutdown_handle();
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => info!("Received interrupt, shutting down"),
            Err(e) => error!("Failed to listen for interrupt: {}", e),
        }
        let _ = shutdown.send(());
    });

    api_server.run().await?;

    info!("Broker shutdown complete");
    Ok(())
}

// =============================================================================
// Storage Setup
// =============================================================================

async fn open_storage(args: &Args) -> Result<SharedRecordStorage> {
    match args.storage {
        StorageBackend::Memory => {
            warn!("Using memory storage, registrations are lost on restart");
            Ok(Arc::new(MemoryStorage::new()))
        }
        StorageBackend::File => {
            let config = FileStorageConfig {
                root_path: args.data_dir.clone(),
                sync_writes: args.sync_writes,
            };
            Ok(Arc::new(FileStorage::with_config(config).await?))
        }
    }
}

// =============================================================================
// Logging Setup
// =============================================================================

fn init_logging(args: &Args) -> Result<()> {
    let level = match args.log_level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    let mut filter = EnvFilter::from_default_env().add_directive(level.into());
    for directive in ["hyper=warn", "reqwest=warn", "tower_http=info", "axum=info"] {
        let directive: Directive = directive
            .parse()
            .map_err(|e| Error::Configuration(format!("Invalid log directive {}: {}", directive, e)))?;
        filter = filter.add_directive(directive);
    }

    if args.log_json {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().with_target(true))
            .init();
    }

    Ok(())
}
