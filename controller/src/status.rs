// controller/src/status.rs

use chrono::{DateTime, Utc};
use common::condition::{CANCELED as CANCELED_CONDITION, FAILED, RUNNING, SUCCEEDED, TRUE};
use common::{Category, Condition, MigrationTask};

use crate::itinerary::{CANCELED, COMPLETED, MIGRATION_FAILED};
use crate::task::{Outcome, Requeue};

pub const SUCCEEDED_MESSAGE: &str = "La migración de volúmenes terminó correctamente.";

/// Vuelca la decisión del motor en el status visible de la tarea.
pub fn project(task: &mut MigrationTask, outcome: &Outcome, now: DateTime<Utc>) -> Requeue {
    let status = &mut task.status;
    status.phase = outcome.phase.clone();
    status.phase_description = outcome.phase_description.clone();
    status.itinerary = outcome.itinerary.to_string();

    match outcome.phase.as_str() {
        COMPLETED => {
            status.conditions.delete(RUNNING);
            if !status.conditions.has(FAILED) {
                status.conditions.set(
                    Condition::new(SUCCEEDED, TRUE, Category::Advisory)
                        .reason(COMPLETED)
                        .message(SUCCEEDED_MESSAGE)
                        .durable(),
                    now,
                );
            }
            Requeue::Never
        }
        MIGRATION_FAILED | CANCELED => {
            status.conditions.delete(RUNNING);
            Requeue::Never
        }
        _ => {
            if let Some(report) = &outcome.progress {
                status.conditions.set(
                    Condition::new(RUNNING, TRUE, Category::Advisory)
                        .reason(report.phase.clone())
                        .message(format!("Step {}", report)),
                    now,
                );
            }
            outcome.requeue
        }
    }
}

/// Reinicia una tarea fallida o cancelada. Devuelve false si la fase no lo permite.
pub fn reset(task: &mut MigrationTask) -> bool {
    if !matches!(task.status.phase.as_str(), MIGRATION_FAILED | CANCELED) {
        return false;
    }
    let status = &mut task.status;
    status.phase.clear();
    status.phase_description.clear();
    status.itinerary.clear();
    status.start_timestamp = None;
    status.errors.clear();
    for kind in [FAILED, CANCELED_CONDITION, RUNNING, SUCCEEDED] {
        status.conditions.delete(kind);
    }
    task.spec.canceled = false;
    true
}
