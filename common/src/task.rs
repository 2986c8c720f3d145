use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::condition::Conditions;
use crate::meta::{ObjectKey, ObjectMeta};

/// PVC a migrar: origen (namespace/nombre) y destino opcional.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PvcToMigrate {
    pub namespace: String,
    pub name: String,
    /// Namespace destino; si falta se usa el mismo del origen.
    #[serde(default)]
    pub target_namespace: Option<String>,
    /// Nombre destino; si falta se usa el mismo del origen.
    #[serde(default)]
    pub target_name: Option<String>,
    #[serde(default)]
    pub storage_class: Option<String>,
    #[serde(default)]
    pub capacity: Option<String>,
}

impl PvcToMigrate {
    pub fn source_key(&self) -> ObjectKey {
        ObjectKey::new(self.namespace.clone(), self.name.clone())
    }

    pub fn target_key(&self) -> ObjectKey {
        ObjectKey::new(
            self.target_namespace
                .clone()
                .unwrap_or_else(|| self.namespace.clone()),
            self.target_name.clone().unwrap_or_else(|| self.name.clone()),
        )
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MigrationTaskSpec {
    pub src_cluster: ObjectKey,
    pub dest_cluster: ObjectKey,
    #[serde(default)]
    pub persistent_volume_claims: Vec<PvcToMigrate>,
    #[serde(default)]
    pub create_destination_namespaces: bool,
    /// Cancelación pedida directamente sobre la tarea (modo standalone).
    #[serde(default)]
    pub canceled: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MigrationTaskStatus {
    #[serde(default)]
    pub phase: String,
    #[serde(default)]
    pub phase_description: String,
    #[serde(default)]
    pub itinerary: String,
    #[serde(default)]
    pub conditions: Conditions,
    #[serde(default)]
    pub start_timestamp: Option<DateTime<Utc>>,
    #[serde(default)]
    pub errors: Vec<String>,
}

/// Tarea de migración directa de volúmenes entre dos clusters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MigrationTask {
    pub metadata: ObjectMeta,
    pub spec: MigrationTaskSpec,
    #[serde(default)]
    pub status: MigrationTaskStatus,
}

impl MigrationTask {
    pub fn key(&self) -> ObjectKey {
        self.metadata.key()
    }

    pub fn add_errors(&mut self, errors: &[String]) {
        for e in errors {
            if !self.status.errors.contains(e) {
                self.status.errors.push(e.clone());
            }
        }
    }
}
