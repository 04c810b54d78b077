use planpoker::{PlanpokerError, PlanpokerServerBuilder, ServerConfig, health, telemetry};
use planpoker_store::{MemoryStore, RedisStore, Store};
use tokio::net::TcpListener;

#[tokio::main]
async fn main() -> Result<(), PlanpokerError> {
    let config = ServerConfig::from_env()?;
    telemetry::init(&config.log_level, config.log_format)?;

    match config.redis_url.clone() {
        Some(url) => {
            let store = RedisStore::connect(&url, config.store_timeout).await?;
            tracing::info!("using Redis store");
            serve(config, store).await
        }
        None => {
            tracing::warn!("REDIS_URL not set, rooms are kept in memory");
            serve(config, MemoryStore::new()).await
        }
    }
}

async fn serve<S: Store>(config: ServerConfig, store: S) -> Result<(), PlanpokerError> {
    let health_listener = TcpListener::bind(&config.health_addr).await?;
    let environment = config.environment.clone();
    let health = tokio::spawn(async move {
        if let Err(e) = health::serve(health_listener, &environment).await {
            tracing::error!(error = %e, "health endpoint failed");
        }
    });

    let server = PlanpokerServerBuilder::new()
        .bind(&config.bind_addr)
        .room_config(config.room_config())
        .idle_timeout(config.idle_timeout)
        .build(store)
        .await?;

    match server.dispatcher().rooms().room_codes().await {
        Ok(codes) => tracing::info!(rooms = codes.len(), "existing rooms in store"),
        Err(e) => tracing::warn!(error = %e, "could not count existing rooms"),
    }

    server.run_until(shutdown_signal()).await?;
    health.abort();
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "failed to listen for Ctrl-C");
        std::future::pending::<()>().await;
    }
}
