use std::sync::Arc;

use anyhow::Result;
use inventory_push_relay::{
    cfg::init_config,
    host::SimulatedHost,
    notification::NotificationRelay,
    server::{Server, forward_shutdown},
    worker::ServiceWorker,
};
use tokio::sync::oneshot;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<()> {
    let config = init_config()?;

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "inventory_push_relay=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let host = Arc::new(SimulatedHost::new(config.origin.clone(), config.open_window));

    let mut worker = ServiceWorker::new();
    Arc::new(NotificationRelay::new(host.clone())).register(&mut worker);

    let (worker_shutdown_tx, worker_shutdown_rx) = oneshot::channel();
    let (handle, worker_task) = worker.spawn(worker_shutdown_rx);

    let (server_shutdown_tx, server_shutdown_rx) = oneshot::channel();
    tokio::spawn(forward_shutdown(tokio::signal::ctrl_c(), server_shutdown_tx));

    Server::new(handle, host)
        .start(&config.bind_addr, server_shutdown_rx)
        .await?;

    let _ = worker_shutdown_tx.send(());
    worker_task.await?;
    Ok(())
}
