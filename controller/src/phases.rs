// controller/src/phases.rs

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use anyhow::anyhow;
use common::cluster::TASK_LABEL;
use common::condition::{FAILED, TRUE};
use common::{
    Category, Condition, EndpointType, ObjectKey, ObjectMeta, PersistentVolumeClaim, Transfer,
    TransferEndpoint, TransferPhase,
};
use tracing::{debug, info, warn};

use crate::error::PhaseError;
use crate::itinerary::{Progress, WAIT_FOR_TRANSFERS_COMPLETED};
use crate::resolve;
use crate::store::ClusterClient;
use crate::task::Task;

/// Nombre del endpoint de transferencia en cada namespace destino.
pub const ENDPOINT_NAME: &str = "transfer-endpoint";
const NODE_PORT: u16 = 32222;

/* ---------------- helpers ---------------- */

fn task_selector(task: &Task<'_>) -> BTreeMap<String, String> {
    let mut labels = BTreeMap::new();
    labels.insert(TASK_LABEL.to_string(), task.owner.metadata.uid.clone());
    labels
}

fn dest(task: &Task<'_>) -> Result<Arc<dyn ClusterClient>, PhaseError> {
    Ok(resolve::dest_client(
        task.store,
        &*task.owner,
        &task.resolved.resources,
    )?)
}

fn target_namespaces(task: &Task<'_>) -> BTreeSet<String> {
    task.owner
        .spec
        .persistent_volume_claims
        .iter()
        .map(|p| p.target_key().namespace)
        .collect()
}

fn labeled(task: &Task<'_>, key: &ObjectKey) -> ObjectMeta {
    let mut meta = ObjectMeta::new(key.namespace.clone(), key.name.clone());
    meta.labels = task_selector(task);
    meta
}

pub fn transfer_name(target: &ObjectKey) -> String {
    format!("transfer-{}", target.name)
}

/// Hostname por el que el cliente de transferencia alcanza al endpoint.
pub fn endpoint_hostname(endpoint_type: EndpointType, namespace: &str, cluster: &str) -> String {
    match endpoint_type {
        EndpointType::Route => format!("{}-{}.apps.{}", ENDPOINT_NAME, namespace, cluster),
        EndpointType::ClusterIP => format!("{}.{}.svc", ENDPOINT_NAME, namespace),
        EndpointType::NodePort => format!("{}:{}", cluster, NODE_PORT),
    }
}

/// Borra endpoints y transfers etiquetados con el uid de la tarea.
pub fn delete_task_transfers(task: &Task<'_>) -> Result<usize, PhaseError> {
    let client = dest(task)?;
    let deleted = client.delete_transfer_resources(&task_selector(task))?;
    if deleted > 0 {
        info!(
            "borrados {} recursos de transferencia de la tarea {}",
            deleted,
            task.owner.key()
        );
    }
    Ok(deleted)
}

/* ---------------- pasos ---------------- */

pub fn created(_task: &mut Task<'_>) -> Result<Progress, PhaseError> {
    Ok(Progress::Advance)
}

pub fn started(task: &mut Task<'_>) -> Result<Progress, PhaseError> {
    info!(
        "migrando {} volúmenes de {} a {}",
        task.owner.spec.persistent_volume_claims.len(),
        task.owner.spec.src_cluster,
        task.owner.spec.dest_cluster
    );
    Ok(Progress::Advance)
}

pub fn prepare(task: &mut Task<'_>) -> Result<Progress, PhaseError> {
    let spec = &task.owner.spec;
    if spec.persistent_volume_claims.is_empty() {
        return Err(PhaseError::fatal("la tarea no tiene PVCs para migrar"));
    }
    if spec.src_cluster == spec.dest_cluster {
        return Err(PhaseError::fatal(format!(
            "el cluster origen y destino son el mismo: {}",
            spec.src_cluster
        )));
    }

    let mut seen = BTreeSet::new();
    let mut duplicated = BTreeSet::new();
    for pvc in &spec.persistent_volume_claims {
        let target = pvc.target_key();
        if !seen.insert(target.clone()) {
            duplicated.insert(target.to_string());
        }
    }
    if !duplicated.is_empty() {
        return Err(PhaseError::fatal(format!(
            "PVCs destino duplicados: {}",
            duplicated.into_iter().collect::<Vec<_>>().join(", ")
        )));
    }
    Ok(Progress::Advance)
}

pub fn verify_plan_volumes(task: &mut Task<'_>) -> Result<Progress, PhaseError> {
    let plan = task
        .resolved
        .resources
        .plan
        .as_ref()
        .ok_or_else(|| PhaseError::fatal("la tarea no tiene un plan padre resuelto"))?;

    // la tarea debe mover datos entre los clusters que nombra el plan
    let spec = &task.owner.spec;
    let clusters = [
        ("origen", &spec.src_cluster, &plan.spec.src_cluster),
        ("destino", &spec.dest_cluster, &plan.spec.dest_cluster),
    ];
    for (role, in_task, in_plan) in clusters {
        if in_task != in_plan {
            return Err(PhaseError::fatal(format!(
                "el cluster {} de la tarea ({}) no es el del plan {} ({})",
                role,
                in_task,
                plan.metadata.key(),
                in_plan
            )));
        }
    }

    let in_plan: BTreeSet<ObjectKey> = plan
        .spec
        .persistent_volumes
        .iter()
        .map(|p| p.source_key())
        .collect();
    let missing: Vec<String> = task
        .owner
        .spec
        .persistent_volume_claims
        .iter()
        .map(|p| p.source_key())
        .filter(|k| !in_plan.contains(k))
        .map(|k| k.to_string())
        .collect();

    if !missing.is_empty() {
        return Err(PhaseError::fatal(format!(
            "volúmenes que no están en el plan {}: {}",
            plan.metadata.key(),
            missing.join(", ")
        )));
    }
    Ok(Progress::Advance)
}

pub fn clean_stale_transfer_resources(task: &mut Task<'_>) -> Result<Progress, PhaseError> {
    delete_task_transfers(task)?;
    Ok(Progress::Advance)
}

pub fn create_destination_namespaces(task: &mut Task<'_>) -> Result<Progress, PhaseError> {
    let client = dest(task)?;
    for ns in target_namespaces(task) {
        if !client.namespace_exists(&ns)? {
            info!("creando namespace {} en el cluster destino", ns);
            client.create_namespace(&ns)?;
        }
    }
    Ok(Progress::Advance)
}

pub fn destination_namespaces_created(task: &mut Task<'_>) -> Result<Progress, PhaseError> {
    let client = dest(task)?;
    for ns in target_namespaces(task) {
        if !client.namespace_exists(&ns)? {
            debug!("namespace destino {} todavía no existe", ns);
            return Ok(Progress::Wait);
        }
    }
    Ok(Progress::Advance)
}

pub fn create_destination_pvcs(task: &mut Task<'_>) -> Result<Progress, PhaseError> {
    let client = dest(task)?;
    for pvc in &task.owner.spec.persistent_volume_claims {
        let target = pvc.target_key();
        if !client.namespace_exists(&target.namespace)? {
            return Err(anyhow!(
                "el namespace destino {} no existe para el PVC {}",
                target.namespace,
                target
            )
            .into());
        }
        if client.get_pvc(&target)?.is_some() {
            continue;
        }
        debug!("creando PVC destino {}", target);
        client.create_pvc(PersistentVolumeClaim {
            metadata: labeled(task, &target),
            storage_class: pvc.storage_class.clone(),
            capacity: pvc.capacity.clone(),
        })?;
    }
    Ok(Progress::Advance)
}

pub fn create_transfer_endpoints(task: &mut Task<'_>) -> Result<Progress, PhaseError> {
    let client = dest(task)?;
    let endpoint_type = task.resolved.endpoint_type;
    let cluster = task.owner.spec.dest_cluster.name.clone();
    for ns in target_namespaces(task) {
        let key = ObjectKey::new(ns.clone(), ENDPOINT_NAME);
        client.apply_endpoint(TransferEndpoint {
            metadata: labeled(task, &key),
            endpoint_type,
            hostname: endpoint_hostname(endpoint_type, &ns, &cluster),
        })?;
    }
    Ok(Progress::Advance)
}

pub fn create_transfer_clients(task: &mut Task<'_>) -> Result<Progress, PhaseError> {
    let client = dest(task)?;
    let existing: BTreeSet<ObjectKey> = client
        .list_transfers(&task_selector(task))?
        .into_iter()
        .map(|t| t.metadata.key())
        .collect();

    for pvc in &task.owner.spec.persistent_volume_claims {
        let target = pvc.target_key();
        let key = ObjectKey::new(target.namespace.clone(), transfer_name(&target));
        if existing.contains(&key) {
            continue;
        }

        let endpoint_key = ObjectKey::new(target.namespace.clone(), ENDPOINT_NAME);
        let endpoint = client
            .get_endpoint(&endpoint_key)?
            .ok_or_else(|| anyhow!("falta el endpoint de transferencia {}", endpoint_key))?;

        let source = pvc.source_key();
        let sparse = task
            .resolved
            .sparse_files
            .get(&source.to_string())
            .copied()
            .unwrap_or(false);

        client.create_transfer(Transfer {
            metadata: labeled(task, &key),
            source,
            target,
            endpoint: endpoint.hostname,
            endpoint_type: endpoint.endpoint_type,
            sparse,
            phase: TransferPhase::Pending,
            agent_id: None,
        })?;
    }
    Ok(Progress::Advance)
}

pub fn wait_for_transfers_completed(task: &mut Task<'_>) -> Result<Progress, PhaseError> {
    let client = dest(task)?;
    let transfers = client.list_transfers(&task_selector(task))?;
    let expected = task.owner.spec.persistent_volume_claims.len();
    if transfers.len() < expected {
        return Err(anyhow!(
            "se esperaban {} transferencias y hay {}",
            expected,
            transfers.len()
        )
        .into());
    }

    let pending = transfers.iter().filter(|t| !t.phase.is_terminal()).count();
    if pending > 0 {
        debug!("{} de {} transferencias en curso", pending, transfers.len());
        return Ok(Progress::Wait);
    }

    let failed: Vec<String> = transfers
        .iter()
        .filter(|t| t.phase == TransferPhase::Failed)
        .map(|t| t.source.to_string())
        .collect();
    if !failed.is_empty() {
        warn!(
            "fallaron {} transferencias de la tarea {}: {}",
            failed.len(),
            task.owner.key(),
            failed.join(", ")
        );
        let errors: Vec<String> = failed
            .iter()
            .map(|v| format!("falló la transferencia del volumen {}", v))
            .collect();
        task.owner.add_errors(&errors);
        task.owner.status.conditions.set(
            Condition::new(FAILED, TRUE, Category::Warn)
                .reason(WAIT_FOR_TRANSFERS_COMPLETED)
                .message(format!("Falló la transferencia de {} volúmenes.", failed.len()))
                .items(failed)
                .durable(),
            task.now,
        );
    }
    Ok(Progress::Advance)
}

pub fn delete_transfer_resources(task: &mut Task<'_>) -> Result<Progress, PhaseError> {
    delete_task_transfers(task)?;
    Ok(Progress::Advance)
}
