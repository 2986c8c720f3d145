// controller/src/reconcile.rs

use std::sync::Arc;

use chrono::Utc;
use common::{MigrationTask, ObjectKey, MIGRATION_KIND};
use tracing::{debug, info};

use crate::error::ReconcileError;
use crate::itinerary;
use crate::resolve;
use crate::settings::Settings;
use crate::status;
use crate::store::ResourceStore;
use crate::task::{Requeue, Task};
use crate::trace::Tracer;

/// Dependencias compartidas por todos los workers de reconcile.
pub struct Context {
    pub store: Arc<dyn ResourceStore>,
    pub tracer: Arc<Tracer>,
    pub settings: Settings,
}

/// Un reconcile completo de una tarea: resolver, ejecutar un paso, proyectar
/// y escribir el status con chequeo de versión.
pub fn reconcile(ctx: &Context, key: &ObjectKey) -> Result<Requeue, ReconcileError> {
    let mut task = match ctx.store.get_task(key) {
        Ok(t) => t,
        Err(e) if e.is_not_found() => {
            debug!("tarea {} ya no existe", key);
            return Ok(Requeue::Never);
        }
        Err(e) => return Err(e.into()),
    };

    if itinerary::is_terminal(&task.status.phase) {
        return Ok(Requeue::Never);
    }

    let span = ctx.tracer.reconcile_span(&task);
    let now = Utc::now();
    task.status.conditions.begin_staging();

    let resolved =
        resolve::resolve(ctx.store.as_ref(), &task).map_err(ReconcileError::Resolve)?;

    let outcome = Task::new(&mut task, ctx.store.as_ref(), &resolved, span, now).execute();
    if outcome.conflict {
        return Ok(Requeue::Fast);
    }

    let requeue = status::project(&mut task, &outcome, now);
    task.status.conditions.end_staging();

    match ctx.store.update_task_status(&task) {
        Ok(written) => {
            info!(
                "tarea {} en fase {} (v{})",
                key, written.status.phase, written.metadata.resource_version
            );
            if itinerary::is_terminal(&written.status.phase) {
                release_migration_span(ctx, &written);
            }
            Ok(requeue)
        }
        Err(e) if e.is_conflict() => {
            debug!("conflicto escribiendo el status de {}: {}", key, e);
            Ok(Requeue::Fast)
        }
        Err(e) => Err(e.into()),
    }
}

/// Suelta el span raíz de la migración cuando ya no le quedan tareas activas.
fn release_migration_span(ctx: &Context, task: &MigrationTask) {
    let owner = match task.metadata.owner_of_kind(MIGRATION_KIND) {
        Some(o) => o,
        None => return,
    };
    match ctx.store.list_owned_tasks(&owner.uid) {
        Ok(tasks) => {
            if tasks.iter().all(|t| itinerary::is_terminal(&t.status.phase)) {
                debug!("migración {} sin tareas activas, se cierra su span", owner.name);
                ctx.tracer.finish_migration_span(&owner.uid);
            }
        }
        Err(e) => debug!("no se pudieron listar las tareas de {}: {}", owner.name, e),
    }
}
