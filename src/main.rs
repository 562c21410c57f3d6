use clap::Parser;
use rendezvous_kv::config::Config;
use rendezvous_kv::persistence::snapshot::SnapshotManager;
use rendezvous_kv::scheduler::scheduler::Scheduler;
use rendezvous_kv::service::handlers::{ClientIpPolicy, router};
use rendezvous_kv::service::kv_service::KvService;
use std::net::SocketAddr;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::parse();

    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.log_level))
        .unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    config.validate()?;

    // 1. Core components:
    let service = Arc::new(KvService::from_config(&config));
    let store = service.store().clone();
    let limiter = service.limiter().clone();

    // 2. Restore the last snapshot:
    let snapshots = Arc::new(SnapshotManager::new(config.snapshot_path.clone()));
    snapshots.load_into(&store);

    // 3. Background maintenance:
    let scheduler = Scheduler::new(&config, store, limiter, snapshots).start();

    // 4. HTTP server:
    let app = router(
        service,
        ClientIpPolicy {
            warn_on_localhost: !config.disable_local_ip_warning,
        },
    );

    let addr = config.bind_addr();
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!("Server is starting on http://{}", addr);

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    // 5. Stop maintenance and write the final snapshot:
    scheduler.shutdown(config.shutdown_grace).await;
    tracing::info!("Shutdown complete");

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => tracing::info!("Received SIGINT, shutting down..."),
        _ = terminate => tracing::info!("Received SIGTERM, shutting down..."),
    }
}
