// controller/src/itinerary.rs

use std::fmt;

use common::MigrationTask;

use crate::error::PhaseError;
use crate::phases;
use crate::task::{Interval, Task};

/* ---------------- nombres de fase ---------------- */

pub const CREATED: &str = "Created";
pub const STARTED: &str = "Started";
pub const PREPARE: &str = "Prepare";
pub const VERIFY_PLAN_VOLUMES: &str = "VerifyPlanVolumes";
pub const CLEAN_STALE_TRANSFER_RESOURCES: &str = "CleanStaleTransferResources";
pub const CREATE_DESTINATION_NAMESPACES: &str = "CreateDestinationNamespaces";
pub const DESTINATION_NAMESPACES_CREATED: &str = "DestinationNamespacesCreated";
pub const CREATE_DESTINATION_PVCS: &str = "CreateDestinationPVCs";
pub const CREATE_TRANSFER_ENDPOINTS: &str = "CreateTransferEndpoints";
pub const CREATE_TRANSFER_CLIENTS: &str = "CreateTransferClients";
pub const WAIT_FOR_TRANSFERS_COMPLETED: &str = "WaitForTransfersCompleted";
pub const DELETE_TRANSFER_RESOURCES: &str = "DeleteTransferResources";

// terminales
pub const COMPLETED: &str = "Completed";
pub const MIGRATION_FAILED: &str = "MigrationFailed";
pub const CANCELED: &str = "Canceled";

pub const COMPLETED_DESCRIPTION: &str = "La migración de volúmenes terminó.";
pub const FAILED_DESCRIPTION: &str = "La migración de volúmenes falló.";
pub const CANCELED_DESCRIPTION: &str = "La migración de volúmenes fue cancelada.";

pub fn is_terminal(phase: &str) -> bool {
    matches!(phase, COMPLETED | MIGRATION_FAILED | CANCELED)
}

/// Resultado de un paso: avanzar a la próxima fase o quedarse esperando.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Progress {
    Advance,
    Wait,
}

pub type StepFn = fn(&mut Task<'_>) -> Result<Progress, PhaseError>;
pub type SkipFn = fn(&MigrationTask) -> bool;

pub struct Phase {
    pub name: &'static str,
    pub description: &'static str,
    pub step: StepFn,
    pub skipped: SkipFn,
    pub requeue: Interval,
}

impl fmt::Debug for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Phase")
            .field("name", &self.name)
            .field("requeue", &self.requeue)
            .finish()
    }
}

fn never(_: &MigrationTask) -> bool {
    false
}

fn without_namespace_creation(task: &MigrationTask) -> bool {
    !task.spec.create_destination_namespaces
}

/// Secuencia inmutable de fases. El nombre persistido en el status siempre
/// resuelve a la misma secuencia.
#[derive(Debug)]
pub struct Itinerary {
    pub name: &'static str,
    pub phases: &'static [Phase],
}

/// Posición de una fase entre las fases no salteadas del itinerario.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProgressReport {
    pub phase: String,
    pub step: usize,
    pub total: usize,
}

impl fmt::Display for ProgressReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} of {}", self.step, self.total)
    }
}

impl Itinerary {
    pub fn by_name(name: &str) -> Option<&'static Itinerary> {
        ITINERARIES.iter().copied().find(|i| i.name == name)
    }

    pub fn find(&self, phase: &str) -> Option<&'static Phase> {
        self.phases.iter().find(|p| p.name == phase)
    }

    fn position(&self, phase: &str) -> Option<usize> {
        self.phases.iter().position(|p| p.name == phase)
    }

    pub fn first(&self, task: &MigrationTask) -> Option<&'static Phase> {
        self.phases.iter().find(|p| !(p.skipped)(task))
    }

    /// Próxima fase no salteada después de `phase` (None = fin del itinerario).
    pub fn next(&self, phase: &str, task: &MigrationTask) -> Option<&'static Phase> {
        let pos = self.position(phase)?;
        self.phases[pos + 1..].iter().find(|p| !(p.skipped)(task))
    }

    pub fn progress_report(&self, phase: &str, task: &MigrationTask) -> Option<ProgressReport> {
        let active: Vec<&Phase> = self.phases.iter().filter(|p| !(p.skipped)(task)).collect();
        let idx = active.iter().position(|p| p.name == phase)?;
        Some(ProgressReport {
            phase: phase.to_string(),
            step: idx + 1,
            total: active.len(),
        })
    }
}

/* ---------------- itinerarios ---------------- */

pub static VOLUME_MIGRATION: Itinerary = Itinerary {
    name: "VolumeMigration",
    phases: &[
        Phase {
            name: CREATED,
            description: "La tarea fue creada.",
            step: phases::created,
            skipped: never,
            requeue: Interval::Step,
        },
        Phase {
            name: STARTED,
            description: "La migración de volúmenes comenzó.",
            step: phases::started,
            skipped: never,
            requeue: Interval::Step,
        },
        Phase {
            name: PREPARE,
            description: "Validando los volúmenes a migrar.",
            step: phases::prepare,
            skipped: never,
            requeue: Interval::Step,
        },
        Phase {
            name: CLEAN_STALE_TRANSFER_RESOURCES,
            description: "Borrando recursos de transferencia de intentos anteriores.",
            step: phases::clean_stale_transfer_resources,
            skipped: never,
            requeue: Interval::Step,
        },
        Phase {
            name: CREATE_DESTINATION_NAMESPACES,
            description: "Creando los namespaces en el cluster destino.",
            step: phases::create_destination_namespaces,
            skipped: without_namespace_creation,
            requeue: Interval::Step,
        },
        Phase {
            name: DESTINATION_NAMESPACES_CREATED,
            description: "Esperando que existan los namespaces destino.",
            step: phases::destination_namespaces_created,
            skipped: without_namespace_creation,
            requeue: Interval::Poll,
        },
        Phase {
            name: CREATE_DESTINATION_PVCS,
            description: "Creando los PVCs en el cluster destino.",
            step: phases::create_destination_pvcs,
            skipped: never,
            requeue: Interval::Step,
        },
        Phase {
            name: CREATE_TRANSFER_ENDPOINTS,
            description: "Creando los endpoints de transferencia.",
            step: phases::create_transfer_endpoints,
            skipped: never,
            requeue: Interval::Step,
        },
        Phase {
            name: CREATE_TRANSFER_CLIENTS,
            description: "Creando los clientes de transferencia.",
            step: phases::create_transfer_clients,
            skipped: never,
            requeue: Interval::Step,
        },
        Phase {
            name: WAIT_FOR_TRANSFERS_COMPLETED,
            description: "Esperando que terminen las transferencias.",
            step: phases::wait_for_transfers_completed,
            skipped: never,
            requeue: Interval::Poll,
        },
        Phase {
            name: DELETE_TRANSFER_RESOURCES,
            description: "Borrando los recursos de transferencia.",
            step: phases::delete_transfer_resources,
            skipped: never,
            requeue: Interval::Step,
        },
    ],
};

pub static PLAN_VOLUME_MIGRATION: Itinerary = Itinerary {
    name: "PlanVolumeMigration",
    phases: &[
        Phase {
            name: CREATED,
            description: "La tarea fue creada.",
            step: phases::created,
            skipped: never,
            requeue: Interval::Step,
        },
        Phase {
            name: STARTED,
            description: "La migración de volúmenes comenzó.",
            step: phases::started,
            skipped: never,
            requeue: Interval::Step,
        },
        Phase {
            name: PREPARE,
            description: "Validando los volúmenes a migrar.",
            step: phases::prepare,
            skipped: never,
            requeue: Interval::Step,
        },
        Phase {
            name: VERIFY_PLAN_VOLUMES,
            description: "Verificando los volúmenes contra el plan.",
            step: phases::verify_plan_volumes,
            skipped: never,
            requeue: Interval::Step,
        },
        Phase {
            name: CLEAN_STALE_TRANSFER_RESOURCES,
            description: "Borrando recursos de transferencia de intentos anteriores.",
            step: phases::clean_stale_transfer_resources,
            skipped: never,
            requeue: Interval::Step,
        },
        Phase {
            name: CREATE_DESTINATION_NAMESPACES,
            description: "Creando los namespaces en el cluster destino.",
            step: phases::create_destination_namespaces,
            skipped: without_namespace_creation,
            requeue: Interval::Step,
        },
        Phase {
            name: DESTINATION_NAMESPACES_CREATED,
            description: "Esperando que existan los namespaces destino.",
            step: phases::destination_namespaces_created,
            skipped: without_namespace_creation,
            requeue: Interval::Poll,
        },
        Phase {
            name: CREATE_DESTINATION_PVCS,
            description: "Creando los PVCs en el cluster destino.",
            step: phases::create_destination_pvcs,
            skipped: never,
            requeue: Interval::Step,
        },
        Phase {
            name: CREATE_TRANSFER_ENDPOINTS,
            description: "Creando los endpoints de transferencia.",
            step: phases::create_transfer_endpoints,
            skipped: never,
            requeue: Interval::Step,
        },
        Phase {
            name: CREATE_TRANSFER_CLIENTS,
            description: "Creando los clientes de transferencia.",
            step: phases::create_transfer_clients,
            skipped: never,
            requeue: Interval::Step,
        },
        Phase {
            name: WAIT_FOR_TRANSFERS_COMPLETED,
            description: "Esperando que terminen las transferencias.",
            step: phases::wait_for_transfers_completed,
            skipped: never,
            requeue: Interval::Poll,
        },
        Phase {
            name: DELETE_TRANSFER_RESOURCES,
            description: "Borrando los recursos de transferencia.",
            step: phases::delete_transfer_resources,
            skipped: never,
            requeue: Interval::Step,
        },
    ],
};

static ITINERARIES: [&Itinerary; 2] = [&VOLUME_MIGRATION, &PLAN_VOLUME_MIGRATION];
