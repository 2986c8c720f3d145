use serde::{Deserialize, Serialize};

use crate::cluster::Transfer;
use crate::meta::ObjectKey;

pub type AgentId = String;

/* --------- Protocolo agente de transferencia <-> controller --------- */

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransferAssignmentRequest {
    pub agent_id: AgentId,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransferAssignment {
    /// Cluster donde vive el recurso de transferencia.
    pub cluster: ObjectKey,
    pub transfer: Transfer,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransferAssignmentResponse {
    pub assignment: Option<TransferAssignment>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransferCompleteRequest {
    pub agent_id: AgentId,
    pub cluster: ObjectKey,
    pub transfer: ObjectKey,
    pub success: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransferCompleteResponse {
    pub ok: bool,
}

/* --------- Vistas resumidas para el cliente --------- */

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskSummary {
    pub key: ObjectKey,
    pub phase: String,
    pub phase_description: String,
    pub itinerary: String,
    /// Mensaje de la condición Running ("Step N of M") si la hay.
    pub progress: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CancelResponse {
    pub migration: ObjectKey,
    /// Tareas encoladas para observar la cancelación.
    pub tasks: Vec<ObjectKey>,
}
