//! devtime API server
//!
//! Stores per-user, per-day coding-time records and serves them to
//! devtime clients.
//!
//! # Configuration
//!
//! Environment variables:
//! - `DEVTIME_PORT`: Port to listen on (default: 8080)
//! - `DEVTIME_DATA_DIR`: Directory holding the database (default: ~/.local/share/devtime-server)
//! - `DEVTIME_CONFIG`: Path to config file (default: ~/.config/devtime-server/config.yaml)
//!
//! # Config File Format
//!
//! ```yaml
//! api_keys:
//!   - key: "your-secret-key-here"
//!     user_id: "user1"
//! ```

use devtime::server::{init_db, router, ApiKeyStore, AppState, DayStore};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Server configuration
#[derive(Debug, Clone)]
struct ServerConfig {
    /// Port to listen on
    port: u16,
    /// Directory holding devtime-server.db
    data_dir: PathBuf,
    /// Path to config file
    config_path: PathBuf,
}

impl ServerConfig {
    /// Load configuration from environment variables
    fn from_env() -> Self {
        let port = std::env::var("DEVTIME_PORT")
            .ok()
            .and_then(|p| p.parse().ok())
            .unwrap_or(8080);

        let data_dir = std::env::var("DEVTIME_DATA_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| {
                dirs::data_dir()
                    .unwrap_or_else(|| PathBuf::from("."))
                    .join("devtime-server")
            });

        let config_path = std::env::var("DEVTIME_CONFIG")
            .map(PathBuf::from)
            .unwrap_or_else(|_| {
                dirs::config_dir()
                    .unwrap_or_else(|| PathBuf::from("."))
                    .join("devtime-server")
                    .join("config.yaml")
            });

        Self {
            port,
            data_dir,
            config_path,
        }
    }
}

#[tokio::main]
async fn main() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "devtime=info,devtime_server=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    if let Err(e) = run().await {
        tracing::error!("{}", e);
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let config = ServerConfig::from_env();

    tracing::info!("Data directory: {}", config.data_dir.display());
    tracing::info!("Config file: {}", config.config_path.display());

    let pool = init_db(&config.data_dir.join("devtime-server.db")).await?;
    let api_keys = Arc::new(ApiKeyStore::load(&config.config_path));

    let state = AppState {
        api_keys,
        days: DayStore::new(pool),
    };

    let app = router(state).layer(ServiceBuilder::new().layer(TraceLayer::new_for_http()));

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    tracing::info!("Starting server on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
