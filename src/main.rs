use std::net::IpAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use tokio::net::TcpListener;

use proxy_manager::api::{self, AppState};
use proxy_manager::config::loader;
use proxy_manager::engine::EngineClient;
use proxy_manager::health::{DomainChecker, HealthMonitor, HealthProber};
use proxy_manager::observability::logging;
use proxy_manager::registry::RegistryDb;
use proxy_manager::sync::Orchestrator;
use proxy_manager::Shutdown;

/// Control plane for a reverse-proxy engine: domain registry,
/// configuration synchronization, and health monitoring.
#[derive(Parser)]
#[command(version, about)]
struct Args {
    /// Path to a TOML configuration file.
    #[arg(long)]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    let config = loader::load_or_default(args.config.as_deref())?;

    logging::init(&config.observability.log_level);
    tracing::info!("proxy-manager v{} starting", env!("CARGO_PKG_VERSION"));

    let registry = Arc::new(RegistryDb::open(Path::new(&config.database.path))?);
    let engine = EngineClient::new(&config.engine)?;
    let orchestrator = Arc::new(Orchestrator::new(
        engine,
        Arc::clone(&registry),
        config.api.clone(),
    ));

    // Push the last accepted document (or the initial one) to the
    // engine. The engine may not be up yet; mutations fail fast on
    // their own, so startup continues.
    if let Err(e) = orchestrator.initialize().await {
        tracing::warn!(error = %e, "engine bootstrap failed, continuing without sync");
    }

    let probe_timeout = Duration::from_secs(config.health.probe_timeout_secs);
    // Validation guarantees the IP parses.
    let engine_ip: IpAddr = config.engine.public_ip.parse()?;
    let checker = Arc::new(DomainChecker::new(engine_ip, probe_timeout));
    let prober = HealthProber::new(DomainChecker::new(engine_ip, probe_timeout), probe_timeout);
    let monitor = Arc::new(HealthMonitor::new(
        Arc::clone(&registry),
        prober,
        &config.health,
    ));
    monitor.start().await;

    let state = AppState {
        orchestrator,
        monitor: Arc::clone(&monitor),
        checker,
    };

    let listener = TcpListener::bind(&config.api.bind_address).await?;
    tracing::info!(address = %listener.local_addr()?, "listening for operator requests");

    let shutdown = Shutdown::new();
    shutdown.listen_for_signals();
    let mut rx = shutdown.subscribe();

    axum::serve(listener, api::router(state))
        .with_graceful_shutdown(async move {
            let _ = rx.recv().await;
        })
        .await?;

    monitor.stop();
    tracing::info!("shutdown complete");
    Ok(())
}
