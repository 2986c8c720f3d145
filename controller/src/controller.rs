// controller/src/controller.rs

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info, warn};

use crate::itinerary;
use crate::queue::WorkQueue;
use crate::reconcile::{reconcile, Context};
use crate::store::MemoryStore;

/// Saca claves de la cola y las reconcilia de a una. El reconcile bloquea,
/// así que corre en el pool de blocking de tokio.
pub async fn run_worker(id: usize, ctx: Arc<Context>, queue: WorkQueue) {
    info!("worker de reconcile {} iniciado", id);

    while let Some(key) = queue.get().await {
        let task_ctx = ctx.clone();
        let task_key = key.clone();
        let result = tokio::task::spawn_blocking(move || reconcile(&task_ctx, &task_key)).await;

        let delay: Option<Duration> = match result {
            Ok(Ok(requeue)) => {
                debug!("worker {}: {} -> {:?}", id, key, requeue);
                ctx.settings.requeue_delay(requeue)
            }
            Ok(Err(err)) => {
                if err.is_plan_not_ready() {
                    info!("tarea {} esperando que el plan esté listo", key);
                } else {
                    warn!("reconcile de {} falló: {}", key, err);
                }
                Some(ctx.settings.error_backoff)
            }
            Err(join_err) => {
                warn!("reconcile de {} abortó: {}", key, join_err);
                Some(ctx.settings.error_backoff)
            }
        };

        queue.done(&key);
        if let Some(delay) = delay {
            queue.add_after(key, delay);
        }
    }

    info!("worker de reconcile {} terminado", id);
}

/// Re-encola periódicamente todas las tareas no terminadas.
pub async fn run_resync_loop(store: MemoryStore, queue: WorkQueue, interval: Duration) {
    loop {
        tokio::time::sleep(interval).await;

        let keys: Vec<_> = match store.list_tasks() {
            Ok(tasks) => tasks
                .into_iter()
                .filter(|t| !itinerary::is_terminal(&t.status.phase))
                .map(|t| t.key())
                .collect(),
            Err(e) => {
                warn!("resync: no se pudieron listar las tareas: {}", e);
                continue;
            }
        };

        if !keys.is_empty() {
            debug!("resync de {} tareas", keys.len());
        }
        for key in keys {
            queue.add(key);
        }
    }
}
