use serde::{Deserialize, Serialize};

use crate::condition::{Category, Conditions, READY};
use crate::meta::{ObjectKey, ObjectMeta};
use crate::task::PvcToMigrate;

/* --------- Migración padre --------- */

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MigrationSpec {
    pub plan_ref: ObjectKey,
    /// Lo marca un actor externo; el controller lo observa entre fases.
    #[serde(default)]
    pub canceled: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Migration {
    pub metadata: ObjectMeta,
    pub spec: MigrationSpec,
}

/* --------- Plan --------- */

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlanSpec {
    pub src_cluster: ObjectKey,
    pub dest_cluster: ObjectKey,
    #[serde(default)]
    pub namespaces: Vec<String>,
    #[serde(default)]
    pub persistent_volumes: Vec<PvcToMigrate>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlanStatus {
    #[serde(default)]
    pub conditions: Conditions,
}

impl PlanStatus {
    /// Listo = condición Ready en True y ninguna condición crítica.
    pub fn is_ready(&self) -> bool {
        let ready = self
            .conditions
            .find(READY)
            .map(|c| c.is_true())
            .unwrap_or(false);
        let critical = self
            .conditions
            .list
            .iter()
            .any(|c| c.category == Category::Critical && c.is_true());
        ready && !critical
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Plan {
    pub metadata: ObjectMeta,
    pub spec: PlanSpec,
    #[serde(default)]
    pub status: PlanStatus,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::condition::{Condition, TRUE};
    use chrono::Utc;

    #[test]
    fn plan_sin_condiciones_no_esta_listo() {
        assert!(!PlanStatus::default().is_ready());
    }

    #[test]
    fn plan_ready_con_condicion_critica_no_esta_listo() {
        let mut status = PlanStatus::default();
        status
            .conditions
            .set(Condition::new(READY, TRUE, Category::Required), Utc::now());
        assert!(status.is_ready());

        status.conditions.set(
            Condition::new("InvalidSourceCluster", TRUE, Category::Critical),
            Utc::now(),
        );
        assert!(!status.is_ready());
    }
}
