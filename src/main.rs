use std::net::SocketAddr;
use std::sync::Arc;

use dotenv::dotenv;
use tokio::signal;
use tracing::{error, info, warn};

use vjscholar_backend::api::{self, AppState};
use vjscholar_backend::config::AppConfig;
use vjscholar_backend::gateways::GatewayFactory;
use vjscholar_backend::health::HealthChecker;
use vjscholar_backend::logging::init_tracing;
use vjscholar_backend::services::{IntakeService, QueryService, ReconciliationService};
use vjscholar_backend::settings::{FileSettingsSource, SettingsCache, SystemClock};
use vjscholar_backend::stores::{
    postgres, ApplicationRepository, DisabledStore, DualStoreWriter, RecordStore, SheetStore,
};

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Shutdown signal received, starting graceful shutdown");
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();

    let config = AppConfig::from_env()?;
    config.validate()?;
    init_tracing(&config.logging);

    info!(
        version = env!("CARGO_PKG_VERSION"),
        "🚀 Starting scholarship backend service"
    );

    // Settings cache over the operator-editable JSON file.
    let settings = Arc::new(SettingsCache::new(
        Box::new(FileSettingsSource::new(&config.settings.file_path)),
        config.settings.cache_ttl_secs,
        Box::new(SystemClock),
    ));

    // Primary store: Postgres when DATABASE_URL is set and reachable,
    // otherwise a disabled stand-in so intake can still run on the sheet.
    let (db_pool, primary): (Option<sqlx::PgPool>, Arc<dyn RecordStore>) =
        match &config.database.url {
            Some(url) => match postgres::connect_pool(&config.database, url).await {
                Ok(pool) => {
                    info!("✅ Database connection pool initialized");
                    (
                        Some(pool.clone()),
                        Arc::new(ApplicationRepository::new(pool)),
                    )
                }
                Err(e) => {
                    error!(error = %e, "database unreachable, continuing without it");
                    (
                        None,
                        Arc::new(DisabledStore::new("postgres", e.to_string())),
                    )
                }
            },
            None => {
                warn!("DATABASE_URL not set, running without the primary store");
                (
                    None,
                    Arc::new(DisabledStore::new("postgres", "DATABASE_URL not set")),
                )
            }
        };

    let secondary: Arc<dyn RecordStore> = match SheetStore::new(settings.clone()) {
        Ok(store) => Arc::new(store),
        Err(e) => {
            error!(error = %e, "sheet store unavailable");
            Arc::new(DisabledStore::new("sheets", e.to_string()))
        }
    };

    let writer = Arc::new(DualStoreWriter::new(primary, secondary));
    let factory = Arc::new(GatewayFactory::new(config.site.origin.clone()));

    let state = AppState {
        intake: Arc::new(IntakeService::new(
            writer.clone(),
            settings.clone(),
            factory.clone(),
        )),
        reconciliation: Arc::new(ReconciliationService::new(
            writer.clone(),
            settings.clone(),
            factory,
        )),
        query: Arc::new(QueryService::new(writer)),
        settings,
        health: Arc::new(HealthChecker::new(db_pool)),
    };

    let app = api::router(state);
    info!("✅ Routes configured");

    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port).parse()?;
    let listener = tokio::net::TcpListener::bind(addr).await.map_err(|e| {
        error!("❌ Failed to bind to address {}: {}", addr, e);
        e
    })?;
    info!(address = %addr, "🌐 Listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server stopped");
    Ok(())
}
