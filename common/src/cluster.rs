use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use crate::meta::{ObjectKey, ObjectMeta};

/// ConfigMap de configuración de cada cluster.
pub const CLUSTER_CONFIG_NAMESPACE: &str = "migration-system";
pub const CLUSTER_CONFIG_NAME: &str = "migration-cluster-config";
/// Clave que elige cómo se exponen los endpoints de transferencia.
pub const RSYNC_ENDPOINT_TYPE: &str = "RSYNC_ENDPOINT_TYPE";

/// Label que marca los recursos de transferencia creados para una tarea.
pub const TASK_LABEL: &str = "migration.task";

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClusterSpec {
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub is_host_cluster: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cluster {
    pub metadata: ObjectMeta,
    pub spec: ClusterSpec,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfigMap {
    pub metadata: ObjectMeta,
    #[serde(default)]
    pub data: BTreeMap<String, String>,
}

/* --------- Tipo de endpoint de transferencia --------- */

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EndpointType {
    #[default]
    Route,
    ClusterIP,
    NodePort,
}

impl EndpointType {
    pub fn as_str(&self) -> &'static str {
        match self {
            EndpointType::Route => "Route",
            EndpointType::ClusterIP => "ClusterIP",
            EndpointType::NodePort => "NodePort",
        }
    }
}

impl fmt::Display for EndpointType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EndpointType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Route" => Ok(EndpointType::Route),
            "ClusterIP" => Ok(EndpointType::ClusterIP),
            "NodePort" => Ok(EndpointType::NodePort),
            other => Err(format!("endpoint type inválido: {other}")),
        }
    }
}

/* --------- Recursos creados en el cluster destino --------- */

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PersistentVolumeClaim {
    pub metadata: ObjectMeta,
    #[serde(default)]
    pub storage_class: Option<String>,
    #[serde(default)]
    pub capacity: Option<String>,
}

/// Endpoint por namespace donde escucha el servidor de transferencia.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferEndpoint {
    pub metadata: ObjectMeta,
    pub endpoint_type: EndpointType,
    pub hostname: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TransferPhase {
    Pending,
    Running,
    Succeeded,
    Failed,
}

impl TransferPhase {
    pub fn is_terminal(&self) -> bool {
        matches!(self, TransferPhase::Succeeded | TransferPhase::Failed)
    }
}

/// Un cliente de transferencia por PVC. Lo ejecuta un agente externo.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transfer {
    pub metadata: ObjectMeta,
    pub source: ObjectKey,
    pub target: ObjectKey,
    pub endpoint: String,
    pub endpoint_type: EndpointType,
    /// El volumen tiene sparse files: el agente debe preservarlos.
    #[serde(default)]
    pub sparse: bool,
    pub phase: TransferPhase,
    #[serde(default)]
    pub agent_id: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn endpoint_type_parsea_valores_validos() {
        assert_eq!("NodePort".parse::<EndpointType>(), Ok(EndpointType::NodePort));
        assert_eq!("ClusterIP".parse::<EndpointType>(), Ok(EndpointType::ClusterIP));
        assert_eq!("Route".parse::<EndpointType>(), Ok(EndpointType::Route));
        assert!("nodeport".parse::<EndpointType>().is_err());
    }

    #[test]
    fn endpoint_type_por_defecto_es_route() {
        assert_eq!(EndpointType::default(), EndpointType::Route);
    }
}
