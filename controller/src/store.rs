// controller/src/store.rs

use common::cluster::{CLUSTER_CONFIG_NAME, CLUSTER_CONFIG_NAMESPACE};
use common::{
    Analytic, Cluster, ConfigMap, Migration, MigrationTask, ObjectKey, ObjectMeta,
    PersistentVolumeClaim, Plan, Transfer, TransferEndpoint, TransferPhase,
};
use std::{
    collections::{BTreeMap, BTreeSet, HashMap},
    sync::{Arc, Mutex, MutexGuard},
};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    #[error("{kind} {key} no encontrado")]
    NotFound { kind: &'static str, key: String },

    #[error("{kind} {key} ya existe")]
    AlreadyExists { kind: &'static str, key: String },

    #[error("conflicto al escribir {kind} {key}: versión esperada {expected}, actual {actual}")]
    Conflict {
        kind: &'static str,
        key: String,
        expected: u64,
        actual: u64,
    },

    #[error("{kind} {key} no está en curso (fase {phase})")]
    NotRunning {
        kind: &'static str,
        key: String,
        phase: String,
    },

    #[error("no se pudo construir el cliente del cluster {cluster}: {reason}")]
    ClientUnavailable { cluster: String, reason: String },

    #[error("store no disponible: {0}")]
    Unavailable(String),
}

impl StoreError {
    pub fn is_conflict(&self) -> bool {
        matches!(self, StoreError::Conflict { .. })
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, StoreError::NotFound { .. })
    }

    fn not_found(kind: &'static str, key: &ObjectKey) -> Self {
        StoreError::NotFound {
            kind,
            key: key.to_string(),
        }
    }
}

/// Acceso a los recursos del cluster de control (host).
pub trait ResourceStore: Send + Sync {
    fn get_task(&self, key: &ObjectKey) -> Result<MigrationTask, StoreError>;

    /// Escribe el status con chequeo de `resource_version`.
    fn update_task_status(&self, task: &MigrationTask) -> Result<MigrationTask, StoreError>;

    /// Tareas con un owner reference al uid dado.
    fn list_owned_tasks(&self, owner_uid: &str) -> Result<Vec<MigrationTask>, StoreError>;

    fn get_migration(&self, key: &ObjectKey) -> Result<Migration, StoreError>;

    fn get_plan(&self, key: &ObjectKey) -> Result<Plan, StoreError>;

    /// Analytics del namespace cuyos labels contienen todos los del selector.
    fn list_analytics(
        &self,
        namespace: &str,
        selector: &BTreeMap<String, String>,
    ) -> Result<Vec<Analytic>, StoreError>;

    fn get_cluster(&self, key: &ObjectKey) -> Result<Cluster, StoreError>;

    fn cluster_client(&self, cluster: &Cluster) -> Result<Arc<dyn ClusterClient>, StoreError>;
}

/// Operaciones sobre un cluster remoto (origen o destino).
pub trait ClusterClient: Send + Sync {
    fn get_config_map(&self, key: &ObjectKey) -> Result<ConfigMap, StoreError>;

    fn namespace_exists(&self, name: &str) -> Result<bool, StoreError>;

    fn create_namespace(&self, name: &str) -> Result<(), StoreError>;

    fn get_pvc(&self, key: &ObjectKey) -> Result<Option<PersistentVolumeClaim>, StoreError>;

    fn create_pvc(&self, pvc: PersistentVolumeClaim) -> Result<(), StoreError>;

    fn get_endpoint(&self, key: &ObjectKey) -> Result<Option<TransferEndpoint>, StoreError>;

    /// Crea o reemplaza el endpoint.
    fn apply_endpoint(&self, endpoint: TransferEndpoint) -> Result<TransferEndpoint, StoreError>;

    fn list_transfers(
        &self,
        selector: &BTreeMap<String, String>,
    ) -> Result<Vec<Transfer>, StoreError>;

    fn create_transfer(&self, transfer: Transfer) -> Result<(), StoreError>;

    /// Borra endpoints y transfers con esos labels; devuelve cuántos borró.
    fn delete_transfer_resources(
        &self,
        selector: &BTreeMap<String, String>,
    ) -> Result<usize, StoreError>;
}

fn matches_selector(meta: &ObjectMeta, selector: &BTreeMap<String, String>) -> bool {
    selector
        .iter()
        .all(|(k, v)| meta.labels.get(k).map(|x| x == v).unwrap_or(false))
}

fn lock<'a, T>(m: &'a Mutex<T>, what: &str) -> Result<MutexGuard<'a, T>, StoreError> {
    m.lock()
        .map_err(|_| StoreError::Unavailable(format!("lock {what}")))
}

/// Alta con versión inicial; uid nuevo si no trae uno.
fn stamp_new(meta: &mut ObjectMeta) {
    if meta.uid.is_empty() {
        meta.uid = uuid::Uuid::new_v4().to_string();
    }
    meta.resource_version = 1;
}

/// Upsert sin chequeo de versión (apply de recursos de configuración).
fn apply_into<T: Clone>(
    map: &mut HashMap<ObjectKey, T>,
    key: ObjectKey,
    mut obj: T,
    meta_of: fn(&mut T) -> &mut ObjectMeta,
) -> T {
    match map.get_mut(&key) {
        Some(existing) => {
            let (uid, version) = {
                let m = meta_of(existing);
                (m.uid.clone(), m.resource_version)
            };
            let meta = meta_of(&mut obj);
            meta.uid = uid;
            meta.resource_version = version + 1;
            *existing = obj.clone();
        }
        None => {
            stamp_new(meta_of(&mut obj));
            map.insert(key, obj.clone());
        }
    }
    obj
}

/* ---------------- store en memoria ---------------- */

#[derive(Clone, Default)]
pub struct MemoryStore {
    pub tasks: Arc<Mutex<HashMap<ObjectKey, MigrationTask>>>,
    pub migrations: Arc<Mutex<HashMap<ObjectKey, Migration>>>,
    pub plans: Arc<Mutex<HashMap<ObjectKey, Plan>>>,
    pub analytics: Arc<Mutex<HashMap<ObjectKey, Analytic>>>,
    pub clusters: Arc<Mutex<HashMap<ObjectKey, Cluster>>>,
    // estado simulado de cada cluster registrado
    pub cluster_state: Arc<Mutex<HashMap<ObjectKey, Arc<MemoryCluster>>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn create_task(&self, mut task: MigrationTask) -> Result<MigrationTask, StoreError> {
        let key = task.key();
        let mut tasks = lock(&self.tasks, "tasks")?;
        if tasks.contains_key(&key) {
            return Err(StoreError::AlreadyExists {
                kind: "MigrationTask",
                key: key.to_string(),
            });
        }
        stamp_new(&mut task.metadata);
        tasks.insert(key, task.clone());
        Ok(task)
    }

    /// Reemplazo completo (spec + status) con chequeo de versión.
    pub fn update_task(&self, task: &MigrationTask) -> Result<MigrationTask, StoreError> {
        self.write_task(task, |stored, incoming| *stored = incoming.clone())
    }

    fn write_task(
        &self,
        task: &MigrationTask,
        apply: impl FnOnce(&mut MigrationTask, &MigrationTask),
    ) -> Result<MigrationTask, StoreError> {
        let key = task.key();
        let mut tasks = lock(&self.tasks, "tasks")?;
        let stored = tasks
            .get_mut(&key)
            .ok_or_else(|| StoreError::not_found("MigrationTask", &key))?;

        if stored.metadata.resource_version != task.metadata.resource_version {
            return Err(StoreError::Conflict {
                kind: "MigrationTask",
                key: key.to_string(),
                expected: task.metadata.resource_version,
                actual: stored.metadata.resource_version,
            });
        }

        let uid = stored.metadata.uid.clone();
        let version = stored.metadata.resource_version;
        apply(stored, task);
        stored.metadata.uid = uid;
        stored.metadata.resource_version = version + 1;
        Ok(stored.clone())
    }

    pub fn list_tasks(&self) -> Result<Vec<MigrationTask>, StoreError> {
        let tasks = lock(&self.tasks, "tasks")?;
        let mut out: Vec<MigrationTask> = tasks.values().cloned().collect();
        out.sort_by(|a, b| a.key().cmp(&b.key()));
        Ok(out)
    }

    pub fn task_keys(&self) -> Vec<ObjectKey> {
        self.list_tasks()
            .map(|tasks| tasks.iter().map(|t| t.key()).collect())
            .unwrap_or_default()
    }

    pub fn find_task_by_uid(&self, uid: &str) -> Option<ObjectKey> {
        let tasks = self.tasks.lock().ok()?;
        tasks
            .values()
            .find(|t| t.metadata.uid == uid)
            .map(|t| t.key())
    }

    /// Claves de las tareas hijas de una migración.
    pub fn tasks_owned_by(&self, migration_uid: &str) -> Vec<ObjectKey> {
        self.list_owned_tasks(migration_uid)
            .unwrap_or_default()
            .iter()
            .map(|t| t.key())
            .collect()
    }

    pub fn apply_migration(&self, migration: Migration) -> Result<Migration, StoreError> {
        let mut map = lock(&self.migrations, "migrations")?;
        Ok(apply_into(&mut map, migration.metadata.key(), migration, |m| {
            &mut m.metadata
        }))
    }

    pub fn apply_plan(&self, plan: Plan) -> Result<Plan, StoreError> {
        let mut map = lock(&self.plans, "plans")?;
        Ok(apply_into(&mut map, plan.metadata.key(), plan, |p| {
            &mut p.metadata
        }))
    }

    pub fn apply_analytic(&self, analytic: Analytic) -> Result<Analytic, StoreError> {
        let mut map = lock(&self.analytics, "analytics")?;
        Ok(apply_into(&mut map, analytic.metadata.key(), analytic, |a| {
            &mut a.metadata
        }))
    }

    /// Registra el cluster y le asocia un estado simulado (si no tenía).
    pub fn apply_cluster(&self, cluster: Cluster) -> Result<Cluster, StoreError> {
        let key = cluster.metadata.key();
        let cluster = {
            let mut map = lock(&self.clusters, "clusters")?;
            apply_into(&mut map, key.clone(), cluster, |c| &mut c.metadata)
        };
        let mut state = lock(&self.cluster_state, "cluster_state")?;
        state
            .entry(key)
            .or_insert_with(|| Arc::new(MemoryCluster::default()));
        Ok(cluster)
    }

    pub fn cluster(&self, key: &ObjectKey) -> Result<Arc<MemoryCluster>, StoreError> {
        let state = lock(&self.cluster_state, "cluster_state")?;
        state
            .get(key)
            .cloned()
            .ok_or_else(|| StoreError::not_found("Cluster", key))
    }

    /// Escribe el ConfigMap de configuración del cluster.
    pub fn put_cluster_config(
        &self,
        key: &ObjectKey,
        data: BTreeMap<String, String>,
    ) -> Result<ConfigMap, StoreError> {
        let cluster = self.cluster(key)?;
        let cm = ConfigMap {
            metadata: ObjectMeta::new(CLUSTER_CONFIG_NAMESPACE, CLUSTER_CONFIG_NAME),
            data,
        };
        cluster.put_config_map(cm.clone())?;
        Ok(cm)
    }

    /// Saca el próximo transfer pendiente (de cualquier cluster) y lo marca Running.
    pub fn next_pending_transfer(
        &self,
        agent_id: &str,
    ) -> Result<Option<(ObjectKey, Transfer)>, StoreError> {
        let clusters: Vec<(ObjectKey, Arc<MemoryCluster>)> = {
            let state = lock(&self.cluster_state, "cluster_state")?;
            let mut v: Vec<_> = state.iter().map(|(k, c)| (k.clone(), c.clone())).collect();
            v.sort_by(|a, b| a.0.cmp(&b.0));
            v
        };
        for (key, cluster) in clusters {
            if let Some(t) = cluster.claim_pending_transfer(agent_id)? {
                return Ok(Some((key, t)));
            }
        }
        Ok(None)
    }
}

impl ResourceStore for MemoryStore {
    fn get_task(&self, key: &ObjectKey) -> Result<MigrationTask, StoreError> {
        let tasks = lock(&self.tasks, "tasks")?;
        tasks
            .get(key)
            .cloned()
            .ok_or_else(|| StoreError::not_found("MigrationTask", key))
    }

    fn update_task_status(&self, task: &MigrationTask) -> Result<MigrationTask, StoreError> {
        self.write_task(task, |stored, incoming| {
            stored.status = incoming.status.clone()
        })
    }

    fn list_owned_tasks(&self, owner_uid: &str) -> Result<Vec<MigrationTask>, StoreError> {
        Ok(self
            .list_tasks()?
            .into_iter()
            .filter(|t| t.metadata.owner_references.iter().any(|r| r.uid == owner_uid))
            .collect())
    }

    fn get_migration(&self, key: &ObjectKey) -> Result<Migration, StoreError> {
        let map = lock(&self.migrations, "migrations")?;
        map.get(key)
            .cloned()
            .ok_or_else(|| StoreError::not_found("Migration", key))
    }

    fn get_plan(&self, key: &ObjectKey) -> Result<Plan, StoreError> {
        let map = lock(&self.plans, "plans")?;
        map.get(key)
            .cloned()
            .ok_or_else(|| StoreError::not_found("Plan", key))
    }

    fn list_analytics(
        &self,
        namespace: &str,
        selector: &BTreeMap<String, String>,
    ) -> Result<Vec<Analytic>, StoreError> {
        let map = lock(&self.analytics, "analytics")?;
        Ok(map
            .values()
            .filter(|a| a.metadata.namespace == namespace)
            .filter(|a| matches_selector(&a.metadata, selector))
            .cloned()
            .collect())
    }

    fn get_cluster(&self, key: &ObjectKey) -> Result<Cluster, StoreError> {
        let map = lock(&self.clusters, "clusters")?;
        map.get(key)
            .cloned()
            .ok_or_else(|| StoreError::not_found("Cluster", key))
    }

    fn cluster_client(&self, cluster: &Cluster) -> Result<Arc<dyn ClusterClient>, StoreError> {
        let key = cluster.metadata.key();
        if cluster.spec.url.is_empty() && !cluster.spec.is_host_cluster {
            return Err(StoreError::ClientUnavailable {
                cluster: key.to_string(),
                reason: "el cluster remoto no tiene url".to_string(),
            });
        }
        let state = self.cluster(&key).map_err(|_| StoreError::ClientUnavailable {
            cluster: key.to_string(),
            reason: "cluster sin estado registrado".to_string(),
        })?;
        let client: Arc<dyn ClusterClient> = state;
        Ok(client)
    }
}

/* ---------------- cluster simulado ---------------- */

#[derive(Default)]
pub struct MemoryCluster {
    config_maps: Mutex<HashMap<ObjectKey, ConfigMap>>,
    namespaces: Mutex<BTreeSet<String>>,
    pvcs: Mutex<HashMap<ObjectKey, PersistentVolumeClaim>>,
    endpoints: Mutex<HashMap<ObjectKey, TransferEndpoint>>,
    transfers: Mutex<BTreeMap<ObjectKey, Transfer>>,
}

impl MemoryCluster {
    pub fn put_config_map(&self, mut cm: ConfigMap) -> Result<(), StoreError> {
        let mut map = lock(&self.config_maps, "config_maps")?;
        let key = cm.metadata.key();
        let version = map.get(&key).map(|c| c.metadata.resource_version).unwrap_or(0);
        cm.metadata.resource_version = version + 1;
        map.insert(key, cm);
        Ok(())
    }

    fn claim_pending_transfer(&self, agent_id: &str) -> Result<Option<Transfer>, StoreError> {
        let mut transfers = lock(&self.transfers, "transfers")?;
        let pending = transfers
            .values_mut()
            .find(|t| t.phase == TransferPhase::Pending);
        Ok(pending.map(|t| {
            t.phase = TransferPhase::Running;
            t.agent_id = Some(agent_id.to_string());
            t.metadata.resource_version += 1;
            t.clone()
        }))
    }

    /// El agente reporta el resultado de un transfer en curso. Un reporte
    /// repetido o de un transfer nunca tomado se rechaza.
    pub fn complete_transfer(
        &self,
        key: &ObjectKey,
        success: bool,
    ) -> Result<Transfer, StoreError> {
        let mut transfers = lock(&self.transfers, "transfers")?;
        let t = transfers
            .get_mut(key)
            .ok_or_else(|| StoreError::not_found("Transfer", key))?;
        if t.phase != TransferPhase::Running {
            return Err(StoreError::NotRunning {
                kind: "Transfer",
                key: key.to_string(),
                phase: format!("{:?}", t.phase),
            });
        }
        t.phase = if success {
            TransferPhase::Succeeded
        } else {
            TransferPhase::Failed
        };
        t.metadata.resource_version += 1;
        Ok(t.clone())
    }
}

impl ClusterClient for MemoryCluster {
    fn get_config_map(&self, key: &ObjectKey) -> Result<ConfigMap, StoreError> {
        let map = lock(&self.config_maps, "config_maps")?;
        map.get(key)
            .cloned()
            .ok_or_else(|| StoreError::not_found("ConfigMap", key))
    }

    fn namespace_exists(&self, name: &str) -> Result<bool, StoreError> {
        Ok(lock(&self.namespaces, "namespaces")?.contains(name))
    }

    fn create_namespace(&self, name: &str) -> Result<(), StoreError> {
        lock(&self.namespaces, "namespaces")?.insert(name.to_string());
        Ok(())
    }

    fn get_pvc(&self, key: &ObjectKey) -> Result<Option<PersistentVolumeClaim>, StoreError> {
        Ok(lock(&self.pvcs, "pvcs")?.get(key).cloned())
    }

    fn create_pvc(&self, mut pvc: PersistentVolumeClaim) -> Result<(), StoreError> {
        let key = pvc.metadata.key();
        let mut pvcs = lock(&self.pvcs, "pvcs")?;
        if pvcs.contains_key(&key) {
            return Err(StoreError::AlreadyExists {
                kind: "PersistentVolumeClaim",
                key: key.to_string(),
            });
        }
        stamp_new(&mut pvc.metadata);
        pvcs.insert(key, pvc);
        Ok(())
    }

    fn get_endpoint(&self, key: &ObjectKey) -> Result<Option<TransferEndpoint>, StoreError> {
        Ok(lock(&self.endpoints, "endpoints")?.get(key).cloned())
    }

    fn apply_endpoint(&self, endpoint: TransferEndpoint) -> Result<TransferEndpoint, StoreError> {
        let mut endpoints = lock(&self.endpoints, "endpoints")?;
        Ok(apply_into(
            &mut endpoints,
            endpoint.metadata.key(),
            endpoint,
            |e| &mut e.metadata,
        ))
    }

    fn list_transfers(
        &self,
        selector: &BTreeMap<String, String>,
    ) -> Result<Vec<Transfer>, StoreError> {
        let transfers = lock(&self.transfers, "transfers")?;
        Ok(transfers
            .values()
            .filter(|t| matches_selector(&t.metadata, selector))
            .cloned()
            .collect())
    }

    fn create_transfer(&self, mut transfer: Transfer) -> Result<(), StoreError> {
        let key = transfer.metadata.key();
        let mut transfers = lock(&self.transfers, "transfers")?;
        if transfers.contains_key(&key) {
            return Err(StoreError::AlreadyExists {
                kind: "Transfer",
                key: key.to_string(),
            });
        }
        stamp_new(&mut transfer.metadata);
        transfers.insert(key, transfer);
        Ok(())
    }

    fn delete_transfer_resources(
        &self,
        selector: &BTreeMap<String, String>,
    ) -> Result<usize, StoreError> {
        let mut deleted = 0;
        {
            let mut endpoints = lock(&self.endpoints, "endpoints")?;
            let before = endpoints.len();
            endpoints.retain(|_, e| !matches_selector(&e.metadata, selector));
            deleted += before - endpoints.len();
        }
        {
            let mut transfers = lock(&self.transfers, "transfers")?;
            let before = transfers.len();
            transfers.retain(|_, t| !matches_selector(&t.metadata, selector));
            deleted += before - transfers.len();
        }
        Ok(deleted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::{MigrationTaskSpec, MigrationTaskStatus};

    fn task(name: &str) -> MigrationTask {
        MigrationTask {
            metadata: ObjectMeta::new("openshift-migration", name),
            spec: MigrationTaskSpec::default(),
            status: MigrationTaskStatus::default(),
        }
    }

    #[test]
    fn create_task_asigna_uid_y_version() {
        let store = MemoryStore::new();
        let created = store.create_task(task("t1")).unwrap();
        assert!(!created.metadata.uid.is_empty());
        assert_eq!(created.metadata.resource_version, 1);

        let dup = store.create_task(task("t1")).unwrap_err();
        assert!(matches!(dup, StoreError::AlreadyExists { .. }));
    }

    #[test]
    fn update_task_status_rechaza_version_vieja() {
        let store = MemoryStore::new();
        let created = store.create_task(task("t1")).unwrap();

        let mut first = created.clone();
        first.status.phase = "Started".to_string();
        let written = store.update_task_status(&first).unwrap();
        assert_eq!(written.metadata.resource_version, 2);

        // segunda escritura con la versión ya superada
        let mut stale = created;
        stale.status.phase = "Prepare".to_string();
        let err = store.update_task_status(&stale).unwrap_err();
        assert!(err.is_conflict());
        assert_eq!(store.get_task(&stale.key()).unwrap().status.phase, "Started");
    }

    #[test]
    fn update_task_status_no_toca_el_spec() {
        let store = MemoryStore::new();
        let created = store.create_task(task("t1")).unwrap();

        let mut t = created.clone();
        t.spec.canceled = true;
        t.status.phase = "Started".to_string();
        store.update_task_status(&t).unwrap();

        let stored = store.get_task(&t.key()).unwrap();
        assert!(!stored.spec.canceled);
        assert_eq!(stored.status.phase, "Started");
    }

    #[test]
    fn cluster_client_sin_url_falla() {
        let store = MemoryStore::new();
        let cluster = store
            .apply_cluster(Cluster {
                metadata: ObjectMeta::new("openshift-migration", "remote"),
                spec: Default::default(),
            })
            .unwrap();
        let err = store.cluster_client(&cluster).err().unwrap();
        assert!(matches!(err, StoreError::ClientUnavailable { .. }));
    }

    #[test]
    fn delete_transfer_resources_respeta_el_selector() {
        let cluster = MemoryCluster::default();
        let mut labels = BTreeMap::new();
        labels.insert("migration.task".to_string(), "uid-1".to_string());

        let mut meta = ObjectMeta::new("ns1", "transfer-a");
        meta.labels = labels.clone();
        cluster
            .create_transfer(Transfer {
                metadata: meta,
                source: ObjectKey::new("ns1", "a"),
                target: ObjectKey::new("ns1", "a"),
                endpoint: "x".to_string(),
                endpoint_type: Default::default(),
                sparse: false,
                phase: TransferPhase::Pending,
                agent_id: None,
            })
            .unwrap();
        cluster
            .create_transfer(Transfer {
                metadata: ObjectMeta::new("ns1", "otro"),
                source: ObjectKey::new("ns1", "b"),
                target: ObjectKey::new("ns1", "b"),
                endpoint: "x".to_string(),
                endpoint_type: Default::default(),
                sparse: false,
                phase: TransferPhase::Pending,
                agent_id: None,
            })
            .unwrap();

        assert_eq!(cluster.delete_transfer_resources(&labels).unwrap(), 1);
        assert_eq!(cluster.list_transfers(&BTreeMap::new()).unwrap().len(), 1);
    }

    #[test]
    fn complete_transfer_solo_acepta_transfers_en_curso() {
        let cluster = MemoryCluster::default();
        let key = ObjectKey::new("ns1", "transfer-a");
        cluster
            .create_transfer(Transfer {
                metadata: ObjectMeta::new("ns1", "transfer-a"),
                source: ObjectKey::new("ns1", "a"),
                target: ObjectKey::new("ns1", "a"),
                endpoint: "x".to_string(),
                endpoint_type: Default::default(),
                sparse: false,
                phase: TransferPhase::Pending,
                agent_id: None,
            })
            .unwrap();

        // nunca tomado por un agente
        let err = cluster.complete_transfer(&key, true).unwrap_err();
        assert!(matches!(err, StoreError::NotRunning { .. }));

        cluster.claim_pending_transfer("agente-1").unwrap().unwrap();
        let done = cluster.complete_transfer(&key, true).unwrap();
        assert_eq!(done.phase, TransferPhase::Succeeded);

        // un reporte tardío no pisa el resultado
        assert!(cluster.complete_transfer(&key, false).is_err());
        let stored = cluster.list_transfers(&BTreeMap::new()).unwrap();
        assert_eq!(stored[0].phase, TransferPhase::Succeeded);
    }

    #[test]
    fn list_owned_tasks_filtra_por_uid_del_owner() {
        let store = MemoryStore::new();
        let mut owned = task("t1");
        owned.metadata.owner_references.push(common::OwnerReference {
            kind: "MigMigration".to_string(),
            name: "mig-1".to_string(),
            uid: "uid-mig-1".to_string(),
        });
        store.create_task(owned).unwrap();
        store.create_task(task("t2")).unwrap();

        let found = store.list_owned_tasks("uid-mig-1").unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].metadata.name, "t1");
        assert_eq!(store.tasks_owned_by("uid-mig-1"), vec![found[0].key()]);
    }
}
