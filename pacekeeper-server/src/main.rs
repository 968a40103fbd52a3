use anyhow::Result;
use std::sync::Arc;
use tokio::task::JoinSet;

use pacekeeper_server::config::Config;
use pacekeeper_server::metrics::Metrics;
use pacekeeper_server::registry::Actors;
use pacekeeper_server::store;
use pacekeeper_server::transport::{AppState, Transport, http::HttpTransport};

#[tokio::main]
async fn main() -> Result<()> {
    // Parse configuration from environment variables and CLI arguments
    let config = Config::from_env_and_args()?;

    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(format!("pacekeeper={}", config.log_level).parse()?)
                .add_directive(format!("pacekeeper_server={}", config.log_level).parse()?)
                .add_directive(format!("pacekeeper_client={}", config.log_level).parse()?),
        )
        .init();

    // Create the actor registries over the configured store
    let store = store::create_store(&config.store);
    let actors = Arc::new(Actors::new(
        config.limiter.pacer_config(),
        store,
        config.buffer_size,
    ));
    let _sweeper = Actors::spawn_sweeper(&actors, config.sweep.interval(), config.sweep.max_idle());

    let metrics = Arc::new(Metrics::new());
    let state = Arc::new(AppState::new(
        actors,
        metrics,
        config.limiter.key.clone(),
        config.counter_key.clone(),
    ));

    let mut transport_tasks = JoinSet::new();

    {
        let host = config.http.host.clone();
        let port = config.http.port;
        let state = Arc::clone(&state);

        transport_tasks.spawn(async move {
            tracing::info!("Starting HTTP transport on {}:{}", host, port);
            let transport = HttpTransport::new(&host, port)?;
            transport.start(state).await
        });
    }

    tracing::info!(
        "Pacekeeper started with store type: {:?}",
        config.store.store_type
    );
    tracing::info!(
        "Limiter '{}': {} ms per request, {} ms grace period, buffer size {}",
        config.limiter.key,
        config.limiter.unit_cost_ms,
        config.limiter.grace_period_ms,
        config.buffer_size
    );
    tracing::info!(
        "Stopping actors idle for {} s, sweeping every {} s",
        config.sweep.actor_idle_secs,
        config.sweep.interval_secs
    );

    // Wait for all transport tasks to complete (they run indefinitely)
    while let Some(result) = transport_tasks.join_next().await {
        match result {
            Ok(Ok(())) => {
                tracing::info!("Transport task completed successfully");
            }
            Ok(Err(e)) => {
                tracing::error!("Transport task failed: {}", e);
                return Err(e);
            }
            Err(e) => {
                tracing::error!("Transport task panicked: {}", e);
                return Err(anyhow::anyhow!("Transport task panicked"));
            }
        }
    }

    Ok(())
}
