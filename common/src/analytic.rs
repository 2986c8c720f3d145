use serde::{Deserialize, Serialize};

use crate::meta::{ObjectKey, ObjectMeta};

/// Label con el que se asocian los analytics a su plan.
pub const PLAN_LABEL: &str = "migplan";

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnalyticSpec {
    pub plan_ref: ObjectKey,
    /// Sólo si se pidió el análisis extendido hay datos de sparse files.
    #[serde(default)]
    pub analyze_extended_pv_capacity: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnalyticPersistentVolume {
    pub name: String,
    #[serde(default)]
    pub sparse_files_found: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnalyticNamespace {
    pub namespace: String,
    #[serde(default)]
    pub persistent_volumes: Vec<AnalyticPersistentVolume>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnalyticStatus {
    #[serde(default)]
    pub namespaces: Vec<AnalyticNamespace>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Analytic {
    pub metadata: ObjectMeta,
    pub spec: AnalyticSpec,
    #[serde(default)]
    pub status: AnalyticStatus,
}
