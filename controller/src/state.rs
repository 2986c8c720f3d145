// controller/src/state.rs

use std::sync::Arc;

use crate::queue::WorkQueue;
use crate::store::MemoryStore;
use crate::trace::Tracer;

#[derive(Clone)]
pub struct AppState {
    pub store: MemoryStore,
    // claves de tareas pendientes de reconcile
    pub queue: WorkQueue,
    pub tracer: Arc<Tracer>,
}

impl AppState {
    pub fn new(store: MemoryStore, queue: WorkQueue, tracer: Arc<Tracer>) -> Self {
        Self {
            store,
            queue,
            tracer,
        }
    }

    /// Un cambio en un recurso compartido (plan, cluster, analytic) puede
    /// afectar a cualquier tarea.
    pub fn enqueue_all(&self) {
        for key in self.store.task_keys() {
            self.queue.add(key);
        }
    }
}
