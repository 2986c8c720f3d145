// controller/src/error.rs

use common::ObjectKey;

use crate::store::StoreError;

/// Fallo de un paso de fase, clasificado por tipo (nunca por texto).
#[derive(Debug, thiserror::Error)]
pub enum PhaseError {
    /// Conflicto de concurrencia optimista: se reintenta rápido sin registrar nada.
    #[error(transparent)]
    Conflict(StoreError),

    /// El plan o la tarea son inválidos: la tarea falla sin reintento.
    #[error("plan inválido: {0}")]
    FatalPlan(String),

    #[error("{0:#}")]
    Other(anyhow::Error),
}

impl PhaseError {
    pub fn fatal(msg: impl Into<String>) -> Self {
        PhaseError::FatalPlan(msg.into())
    }

    pub fn is_conflict(&self) -> bool {
        matches!(self, PhaseError::Conflict(_))
    }

    pub fn is_fatal(&self) -> bool {
        matches!(self, PhaseError::FatalPlan(_))
    }
}

impl From<StoreError> for PhaseError {
    fn from(err: StoreError) -> Self {
        if err.is_conflict() {
            PhaseError::Conflict(err)
        } else {
            PhaseError::Other(err.into())
        }
    }
}

impl From<anyhow::Error> for PhaseError {
    fn from(err: anyhow::Error) -> Self {
        let conflict = err
            .chain()
            .filter_map(|e| e.downcast_ref::<StoreError>())
            .find(|e| e.is_conflict())
            .cloned();
        match conflict {
            Some(c) => PhaseError::Conflict(c),
            None => PhaseError::Other(err),
        }
    }
}

/// Errores propios del resolver de recursos del plan.
#[derive(Debug, thiserror::Error)]
pub enum ResolveError {
    #[error("el plan {0} no está listo")]
    PlanNotReady(ObjectKey),
}

/// Un reconcile que no llegó a escribir el status: el runtime reintenta con backoff.
#[derive(Debug, thiserror::Error)]
pub enum ReconcileError {
    #[error("{0:#}")]
    Resolve(anyhow::Error),

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl ReconcileError {
    /// Todos los errores de reconcile se reintentan; sólo cambia el log.
    pub fn is_plan_not_ready(&self) -> bool {
        match self {
            ReconcileError::Resolve(e) => e
                .chain()
                .any(|c| c.downcast_ref::<ResolveError>().is_some()),
            ReconcileError::Store(_) => false,
        }
    }
}
