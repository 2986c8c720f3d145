// controller/src/task.rs

use chrono::{DateTime, Utc};
use common::condition::{CANCELED as CANCELED_CONDITION, FAILED, TRUE};
use common::{Category, Condition, MigrationTask, MIGRATION_KIND};
use tracing::{debug, info, warn, Span};

use crate::error::PhaseError;
use crate::itinerary::{
    self, Itinerary, Progress, ProgressReport, CANCELED, CANCELED_DESCRIPTION, COMPLETED,
    COMPLETED_DESCRIPTION, FAILED_DESCRIPTION, MIGRATION_FAILED, PLAN_VOLUME_MIGRATION,
    VOLUME_MIGRATION,
};
use crate::phases;
use crate::resolve::Resolved;
use crate::store::ResourceStore;

/// Intervalo de reencolado de una fase.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Interval {
    /// La fase avanzó: seguir enseguida.
    Step,
    /// La fase espera trabajo externo: volver a mirar más tarde.
    Poll,
}

/// Directiva para el runtime después de un reconcile.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Requeue {
    Never,
    Fast,
    After(Interval),
}

/// Lo que el motor decidió en este reconcile.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Outcome {
    pub phase: String,
    pub phase_description: String,
    pub itinerary: &'static str,
    pub progress: Option<ProgressReport>,
    pub requeue: Requeue,
    /// Hubo un conflicto de concurrencia: no se escribe nada.
    pub conflict: bool,
}

/// Contexto transitorio de un reconcile. Sólo fase, descripción e itinerario
/// sobreviven (vía status).
pub struct Task<'a> {
    pub owner: &'a mut MigrationTask,
    pub store: &'a dyn ResourceStore,
    pub resolved: &'a Resolved,
    pub itinerary: &'static Itinerary,
    pub phase: String,
    pub phase_description: String,
    pub span: Option<Span>,
    pub now: DateTime<Utc>,
}

/// Itinerario por defecto según si la tarea cuelga de una migración.
fn select_itinerary(owner: &MigrationTask) -> &'static Itinerary {
    if owner.metadata.owner_of_kind(MIGRATION_KIND).is_some() {
        &PLAN_VOLUME_MIGRATION
    } else {
        &VOLUME_MIGRATION
    }
}

impl<'a> Task<'a> {
    pub fn new(
        owner: &'a mut MigrationTask,
        store: &'a dyn ResourceStore,
        resolved: &'a Resolved,
        span: Option<Span>,
        now: DateTime<Utc>,
    ) -> Self {
        let itinerary = select_itinerary(owner);
        let phase = owner.status.phase.clone();
        let phase_description = owner.status.phase_description.clone();
        Self {
            owner,
            store,
            resolved,
            itinerary,
            phase,
            phase_description,
            span,
            now,
        }
    }

    /// Ejecuta un paso y clasifica el resultado.
    pub fn execute(mut self) -> Outcome {
        if self.owner.status.start_timestamp.is_none() {
            info!("tarea {} marcada como iniciada", self.owner.key());
            self.owner.status.start_timestamp = Some(self.now);
        }

        if let Err(err) = self.run() {
            match err {
                PhaseError::Conflict(e) => {
                    debug!("conflicto en la fase {}, se reencola: {}", self.phase, e);
                    return self.outcome(Requeue::Fast, true);
                }
                err => {
                    info!(
                        "falló la fase {} ({}) de la tarea {}: {}",
                        self.phase,
                        self.phase_description,
                        self.owner.key(),
                        err
                    );
                    let category = if err.is_fatal() {
                        Category::Critical
                    } else {
                        Category::Warn
                    };
                    self.fail(category, vec![err.to_string()]);
                }
            }
        }

        let requeue = if itinerary::is_terminal(&self.phase) {
            Requeue::Never
        } else {
            self.itinerary
                .find(&self.phase)
                .map(|p| Requeue::After(p.requeue))
                .unwrap_or(Requeue::Never)
        };
        self.outcome(requeue, false)
    }

    fn outcome(&self, requeue: Requeue, conflict: bool) -> Outcome {
        Outcome {
            phase: self.phase.clone(),
            phase_description: self.phase_description.clone(),
            itinerary: self.itinerary.name,
            progress: self.itinerary.progress_report(&self.phase, &*self.owner),
            requeue,
            conflict,
        }
    }

    fn run(&mut self) -> Result<(), PhaseError> {
        self.init()?;

        if itinerary::is_terminal(&self.phase) {
            return Ok(());
        }

        if self.resolved.canceled {
            return self.cancel();
        }

        let itinerary = self.itinerary;
        let phase = itinerary.find(&self.phase).ok_or_else(|| {
            PhaseError::fatal(format!(
                "la fase {} no existe en el itinerario {}",
                self.phase, itinerary.name
            ))
        })?;
        self.phase_description = phase.description.to_string();

        let span = self.span.clone();
        let _entered = span.as_ref().map(|s| s.enter());

        debug!("ejecutando fase {} de la tarea {}", phase.name, self.owner.key());
        match (phase.step)(self)? {
            Progress::Advance => self.next(),
            Progress::Wait => {}
        }
        Ok(())
    }

    /// Retoma el itinerario registrado o arranca desde la primera fase.
    fn init(&mut self) -> Result<(), PhaseError> {
        let recorded = self.owner.status.itinerary.clone();
        if !recorded.is_empty() {
            self.itinerary = Itinerary::by_name(&recorded).ok_or_else(|| {
                PhaseError::fatal(format!("itinerario desconocido {}", recorded))
            })?;
        }
        if self.phase.is_empty() {
            if let Some(first) = self.itinerary.first(&*self.owner) {
                self.phase = first.name.to_string();
                self.phase_description = first.description.to_string();
            }
        }
        Ok(())
    }

    fn next(&mut self) {
        match self.itinerary.next(&self.phase, &*self.owner) {
            Some(p) => {
                self.phase = p.name.to_string();
                self.phase_description = p.description.to_string();
            }
            None => {
                self.phase = COMPLETED.to_string();
                self.phase_description = COMPLETED_DESCRIPTION.to_string();
            }
        }
    }

    fn cancel(&mut self) -> Result<(), PhaseError> {
        info!("tarea {} cancelada en la fase {}", self.owner.key(), self.phase);
        if let Err(err) = phases::delete_task_transfers(self) {
            if err.is_conflict() {
                return Err(err);
            }
            warn!("no se pudieron borrar los recursos de transferencia: {}", err);
        }
        let reason = self.phase.clone();
        self.owner.status.conditions.set(
            Condition::new(CANCELED_CONDITION, TRUE, Category::Advisory)
                .reason(reason)
                .message("La migración de volúmenes fue cancelada.")
                .durable(),
            self.now,
        );
        self.phase = CANCELED.to_string();
        self.phase_description = CANCELED_DESCRIPTION.to_string();
        Ok(())
    }

    /// Deja la tarea en MigrationFailed con una condición Failed durable.
    pub fn fail(&mut self, category: Category, reasons: Vec<String>) {
        self.owner.add_errors(&reasons);
        let reason = self.phase.clone();
        self.owner.status.conditions.set(
            Condition::new(FAILED, TRUE, category)
                .reason(reason.clone())
                .message(format!("La migración de volúmenes falló en la fase {}.", reason))
                .items(reasons)
                .durable(),
            self.now,
        );
        self.phase = MIGRATION_FAILED.to_string();
        self.phase_description = FAILED_DESCRIPTION.to_string();
    }
}
