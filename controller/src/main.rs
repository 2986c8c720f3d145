mod controller;
mod error;
mod handlers;
mod itinerary;
mod phases;
mod queue;
mod reconcile;
mod resolve;
mod settings;
mod state;
mod status;
mod store;
mod task;
mod trace;

#[cfg(test)]
mod testutil;

use std::sync::Arc;

use anyhow::Context as _;
use tokio::net::TcpListener;
use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::queue::WorkQueue;
use crate::reconcile::Context;
use crate::settings::Settings;
use crate::state::AppState;
use crate::store::MemoryStore;
use crate::trace::Tracer;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("controller=debug,axum=info,tower_http=info")),
        )
        .init();

    let settings = Settings::from_env();
    info!("configuración: {:?}", settings);

    let store = MemoryStore::new();
    let queue = WorkQueue::new();
    let tracer = Arc::new(Tracer::new(settings.tracing_enabled, "DirectVolumeMigration"));

    let ctx = Arc::new(Context {
        store: Arc::new(store.clone()),
        tracer: tracer.clone(),
        settings: settings.clone(),
    });

    // workers de reconcile
    for id in 0..settings.workers {
        tokio::spawn(controller::run_worker(id, ctx.clone(), queue.clone()));
    }

    // resync periódico en segundo plano
    tokio::spawn(controller::run_resync_loop(
        store.clone(),
        queue.clone(),
        settings.resync_interval,
    ));

    let app = handlers::build_router(AppState::new(store, queue.clone(), tracer));

    let listener = TcpListener::bind(&settings.addr)
        .await
        .with_context(|| format!("no se pudo escuchar en {}", settings.addr))?;
    info!("controller escuchando en {}", listener.local_addr()?);

    axum::serve(listener, app).await?;
    queue.shutdown();
    Ok(())
}
