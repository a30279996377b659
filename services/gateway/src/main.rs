use gateway_service::{create_router, AppState};
use routing_service::OsrmClient;
use shared::logger::init_logger;
use shared::{Catalog, FleetConfig};
use simulation_service::{SimulationClock, TickPipeline};
use std::sync::Arc;
use tokio::net::TcpListener;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();
    init_logger();

    let config = FleetConfig::from_env()?;
    tracing::info!(
        interval_ms = config.effective_interval_ms(),
        provider = %config.routing.provider_url,
        "Configuration loaded"
    );

    let provider = Arc::new(OsrmClient::new(
        &config.routing.provider_url,
        config.routing.request_timeout(),
    )?);
    let pipeline = Arc::new(TickPipeline::from_config(
        &config,
        Catalog::european_fleet(),
        provider,
    ));

    if pipeline.fleet().is_empty() {
        pipeline.fleet().seed(config.simulation.seed_vehicles)?;
    }

    let clock = Arc::new(SimulationClock::new(
        pipeline,
        config.simulation.base_interval_ms,
        config.simulation.speed_multiplier,
    ));
    clock.start().await;

    let app = create_router(AppState::new(clock.clone()));
    let listener = TcpListener::bind(&config.gateway.bind_addr).await?;
    tracing::info!(addr = %config.gateway.bind_addr, "Gateway listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    clock.stop().await;
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Could not listen for shutdown signal");
    }
    tracing::info!("Shutting down");
}
