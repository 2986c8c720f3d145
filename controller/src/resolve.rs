// controller/src/resolve.rs

use std::collections::BTreeMap;
use std::sync::Arc;

use anyhow::Context;
use common::cluster::{CLUSTER_CONFIG_NAME, CLUSTER_CONFIG_NAMESPACE, RSYNC_ENDPOINT_TYPE};
use common::{
    Cluster, EndpointType, Migration, MigrationTask, ObjectKey, OwnerReference, Plan,
    MIGRATION_KIND, PLAN_LABEL,
};
use tracing::{debug, info, warn};

use crate::error::ResolveError;
use crate::store::{ClusterClient, ResourceStore, StoreError};

/// Recursos referenciados por el plan padre. Vacío para tareas standalone.
#[derive(Debug, Clone, Default)]
pub struct PlanResources {
    pub migration: Option<Migration>,
    pub plan: Option<Plan>,
    pub src_cluster: Option<Cluster>,
    pub dest_cluster: Option<Cluster>,
}

/// "namespace/volumen" -> el volumen tiene sparse files.
pub type SparseFileMap = BTreeMap<String, bool>;

/// Todo lo que un reconcile resuelve antes de ejecutar la fase.
#[derive(Debug, Clone, Default)]
pub struct Resolved {
    pub resources: PlanResources,
    pub sparse_files: SparseFileMap,
    pub endpoint_type: EndpointType,
    pub canceled: bool,
}

pub fn resolve(store: &dyn ResourceStore, task: &MigrationTask) -> anyhow::Result<Resolved> {
    if is_canceled(store, task) {
        return Ok(resolve_canceled(store, task));
    }

    let resources = plan_resources(store, task)?;
    let sparse_files = sparse_file_map(store, resources.plan.as_ref())
        .context("leyendo analytics de sparse files")?;
    let endpoint_type = endpoint_type(store, task, &resources)?;
    Ok(Resolved {
        resources,
        sparse_files,
        endpoint_type,
        canceled: false,
    })
}

/// Una tarea cancelada sólo necesita saber dónde limpiar: los recursos del
/// plan se resuelven si se puede y un fallo no bloquea la cancelación.
fn resolve_canceled(store: &dyn ResourceStore, task: &MigrationTask) -> Resolved {
    let resources = plan_resources(store, task).unwrap_or_else(|e| {
        warn!(
            "tarea cancelada {}: no se resolvieron los recursos del plan: {:#}",
            task.key(),
            e
        );
        PlanResources::default()
    });
    Resolved {
        resources,
        canceled: true,
        ..Default::default()
    }
}

fn migration_key(task: &MigrationTask, owner: &OwnerReference) -> ObjectKey {
    ObjectKey::new(task.metadata.namespace.clone(), owner.name.clone())
}

/* ---------------- recursos del plan ---------------- */

pub fn plan_resources(
    store: &dyn ResourceStore,
    task: &MigrationTask,
) -> anyhow::Result<PlanResources> {
    let owner = match task.metadata.owner_of_kind(MIGRATION_KIND) {
        Some(owner) => owner,
        None => return Ok(PlanResources::default()),
    };

    let migration_key = migration_key(task, owner);
    let migration = store
        .get_migration(&migration_key)
        .with_context(|| format!("buscando la migración padre {}", migration_key))?;

    let mut plan_key = migration.spec.plan_ref.clone();
    if plan_key.namespace.is_empty() {
        plan_key.namespace = migration.metadata.namespace.clone();
    }
    let plan = store
        .get_plan(&plan_key)
        .with_context(|| format!("buscando el plan {} de la migración {}", plan_key, migration_key))?;

    if !plan.status.is_ready() {
        info!("plan {} no está listo", plan_key);
        return Err(ResolveError::PlanNotReady(plan_key))
            .context("resolviendo recursos del plan");
    }

    let src_cluster = store
        .get_cluster(&plan.spec.src_cluster)
        .with_context(|| format!("buscando el cluster origen del plan {}", plan_key))?;
    let dest_cluster = store
        .get_cluster(&plan.spec.dest_cluster)
        .with_context(|| format!("buscando el cluster destino del plan {}", plan_key))?;

    Ok(PlanResources {
        migration: Some(migration),
        plan: Some(plan),
        src_cluster: Some(src_cluster),
        dest_cluster: Some(dest_cluster),
    })
}

/* ---------------- sparse files ---------------- */

pub fn sparse_file_map(
    store: &dyn ResourceStore,
    plan: Option<&Plan>,
) -> Result<SparseFileMap, StoreError> {
    let mut map = SparseFileMap::new();
    let plan = match plan {
        Some(p) => p,
        None => return Ok(map),
    };

    let mut selector = BTreeMap::new();
    selector.insert(PLAN_LABEL.to_string(), plan.metadata.name.clone());

    for analytic in store.list_analytics(&plan.metadata.namespace, &selector)? {
        if !analytic.spec.analyze_extended_pv_capacity {
            continue;
        }
        for ns in &analytic.status.namespaces {
            for pv in ns.persistent_volumes.iter().filter(|pv| pv.sparse_files_found) {
                map.insert(format!("{}/{}", ns.namespace, pv.name), true);
            }
        }
    }
    debug!("{} volúmenes con sparse files en el plan {}", map.len(), plan.metadata.name);
    Ok(map)
}

/* ---------------- endpoint ---------------- */

/// Cluster destino: el del plan si la tarea cuelga de uno, si no el de la tarea.
pub fn dest_client(
    store: &dyn ResourceStore,
    task: &MigrationTask,
    resources: &PlanResources,
) -> anyhow::Result<Arc<dyn ClusterClient>> {
    let cluster = match &resources.dest_cluster {
        Some(cluster) => cluster.clone(),
        None => {
            let key = &task.spec.dest_cluster;
            store
                .get_cluster(key)
                .with_context(|| format!("buscando el cluster destino {}", key))?
        }
    };
    let key = cluster.metadata.key();
    store
        .cluster_client(&cluster)
        .with_context(|| format!("creando el cliente del cluster destino {}", key))
}

/// Tipo de endpoint configurado en el cluster destino. Un valor inválido
/// no es error: se usa `Route`.
pub fn endpoint_type(
    store: &dyn ResourceStore,
    task: &MigrationTask,
    resources: &PlanResources,
) -> anyhow::Result<EndpointType> {
    let client = dest_client(store, task, resources)?;
    let key = ObjectKey::new(CLUSTER_CONFIG_NAMESPACE, CLUSTER_CONFIG_NAME);
    let config = client
        .get_config_map(&key)
        .with_context(|| format!("leyendo la configuración {} del cluster destino", key))?;

    let value = match config.data.get(RSYNC_ENDPOINT_TYPE) {
        Some(v) => v,
        None => return Ok(EndpointType::Route),
    };
    match value.parse::<EndpointType>() {
        Ok(t) => Ok(t),
        Err(_) => {
            info!(
                "endpoint type inválido {:?}, se usa el default {}",
                value,
                EndpointType::Route
            );
            Ok(EndpointType::Route)
        }
    }
}

/// Cancelación pedida en la tarea o en su migración padre. Se mira antes que
/// el plan: un plan no listo no bloquea la cancelación.
pub fn is_canceled(store: &dyn ResourceStore, task: &MigrationTask) -> bool {
    if task.spec.canceled {
        return true;
    }
    let owner = match task.metadata.owner_of_kind(MIGRATION_KIND) {
        Some(owner) => owner,
        None => return false,
    };
    store
        .get_migration(&migration_key(task, owner))
        .map(|m| m.spec.canceled)
        .unwrap_or(false)
}
