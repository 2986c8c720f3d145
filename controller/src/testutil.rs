// controller/src/testutil.rs

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::Utc;
use common::cluster::RSYNC_ENDPOINT_TYPE;
use common::condition::{READY, TRUE};
use common::{
    Analytic, Category, Cluster, ClusterSpec, Condition, ConfigMap, Migration, MigrationSpec,
    MigrationTask, MigrationTaskSpec, MigrationTaskStatus, ObjectKey, ObjectMeta, OwnerReference,
    PersistentVolumeClaim, Plan, PlanSpec, PlanStatus, PvcToMigrate, Transfer, TransferEndpoint,
    MIGRATION_KIND,
};

use crate::store::{ClusterClient, MemoryCluster, MemoryStore, ResourceStore, StoreError};

pub const NS: &str = "openshift-migration";
pub const HOST: &str = "host";
pub const DEST: &str = "dest";

pub fn pvcs(list: &[(&str, &str)]) -> Vec<PvcToMigrate> {
    list.iter()
        .map(|(ns, name)| PvcToMigrate {
            namespace: ns.to_string(),
            name: name.to_string(),
            target_namespace: None,
            target_name: None,
            storage_class: Some("gp2".to_string()),
            capacity: Some("1Gi".to_string()),
        })
        .collect()
}

pub fn standalone_task(name: &str, list: &[(&str, &str)]) -> MigrationTask {
    MigrationTask {
        metadata: ObjectMeta::new(NS, name),
        spec: MigrationTaskSpec {
            src_cluster: ObjectKey::new(NS, HOST),
            dest_cluster: ObjectKey::new(NS, DEST),
            persistent_volume_claims: pvcs(list),
            create_destination_namespaces: false,
            canceled: false,
        },
        status: MigrationTaskStatus::default(),
    }
}

pub fn owned_task(
    name: &str,
    migration: &str,
    migration_uid: &str,
    list: &[(&str, &str)],
) -> MigrationTask {
    let mut task = standalone_task(name, list);
    task.metadata.owner_references.push(OwnerReference {
        kind: MIGRATION_KIND.to_string(),
        name: migration.to_string(),
        uid: migration_uid.to_string(),
    });
    task
}

fn cluster(name: &str, url: &str, is_host_cluster: bool) -> Cluster {
    Cluster {
        metadata: ObjectMeta::new(NS, name),
        spec: ClusterSpec {
            url: url.to_string(),
            is_host_cluster,
        },
    }
}

pub fn add_clusters_without_config(store: &MemoryStore) {
    store.apply_cluster(cluster(HOST, "", true)).unwrap();
    store
        .apply_cluster(cluster(DEST, "https://dest.example.com:6443", false))
        .unwrap();
}

/// Store con cluster origen (host) y destino, config vacía y el namespace ns1 en destino.
pub fn store() -> MemoryStore {
    let store = MemoryStore::new();
    add_clusters_without_config(&store);
    for name in [HOST, DEST] {
        store
            .put_cluster_config(&ObjectKey::new(NS, name), BTreeMap::new())
            .unwrap();
    }
    dest_cluster(&store).create_namespace("ns1").unwrap();
    store
}

pub fn dest_cluster(store: &MemoryStore) -> Arc<MemoryCluster> {
    store.cluster(&ObjectKey::new(NS, DEST)).unwrap()
}

pub fn set_endpoint_type(store: &MemoryStore, value: &str) {
    let mut data = BTreeMap::new();
    data.insert(RSYNC_ENDPOINT_TYPE.to_string(), value.to_string());
    store
        .put_cluster_config(&ObjectKey::new(NS, DEST), data)
        .unwrap();
}

pub fn plan(name: &str, ready: bool, list: &[(&str, &str)]) -> Plan {
    let mut status = PlanStatus::default();
    if ready {
        status
            .conditions
            .set(Condition::new(READY, TRUE, Category::Required), Utc::now());
    }
    let persistent_volumes = pvcs(list);
    let mut namespaces: Vec<String> = persistent_volumes.iter().map(|p| p.namespace.clone()).collect();
    namespaces.dedup();
    Plan {
        metadata: ObjectMeta::new(NS, name),
        spec: PlanSpec {
            src_cluster: ObjectKey::new(NS, HOST),
            dest_cluster: ObjectKey::new(NS, DEST),
            namespaces,
            persistent_volumes,
        },
        status,
    }
}

pub fn add_plan(store: &MemoryStore, name: &str, ready: bool, list: &[(&str, &str)]) -> Plan {
    store.apply_plan(plan(name, ready, list)).unwrap()
}

pub fn migration(name: &str, plan: &str, canceled: bool) -> Migration {
    Migration {
        metadata: ObjectMeta::new(NS, name),
        spec: MigrationSpec {
            plan_ref: ObjectKey::new(NS, plan),
            canceled,
        },
    }
}

pub fn add_migration(store: &MemoryStore, name: &str, plan: &str, canceled: bool) -> Migration {
    store.apply_migration(migration(name, plan, canceled)).unwrap()
}

/* ---------------- stores con fallas inyectadas ---------------- */

fn conflict(kind: &'static str, key: &ObjectKey) -> StoreError {
    StoreError::Conflict {
        kind,
        key: key.to_string(),
        expected: 1,
        actual: 2,
    }
}

/// Delegación de lectura común a los wrappers.
macro_rules! delegate_reads {
    () => {
        fn get_task(&self, key: &ObjectKey) -> Result<MigrationTask, StoreError> {
            self.inner.get_task(key)
        }

        fn list_owned_tasks(&self, owner_uid: &str) -> Result<Vec<MigrationTask>, StoreError> {
            self.inner.list_owned_tasks(owner_uid)
        }

        fn get_migration(&self, key: &ObjectKey) -> Result<Migration, StoreError> {
            self.inner.get_migration(key)
        }

        fn get_plan(&self, key: &ObjectKey) -> Result<Plan, StoreError> {
            self.inner.get_plan(key)
        }

        fn list_analytics(
            &self,
            namespace: &str,
            selector: &BTreeMap<String, String>,
        ) -> Result<Vec<Analytic>, StoreError> {
            self.inner.list_analytics(namespace, selector)
        }

        fn get_cluster(&self, key: &ObjectKey) -> Result<Cluster, StoreError> {
            self.inner.get_cluster(key)
        }
    };
}

/// La creación de PVCs en el cluster destino siempre choca con otra escritura.
pub struct ConflictingStore {
    inner: MemoryStore,
}

impl ConflictingStore {
    pub fn new(inner: MemoryStore) -> Self {
        Self { inner }
    }
}

impl ResourceStore for ConflictingStore {
    delegate_reads!();

    fn update_task_status(&self, task: &MigrationTask) -> Result<MigrationTask, StoreError> {
        self.inner.update_task_status(task)
    }

    fn cluster_client(&self, cluster: &Cluster) -> Result<Arc<dyn ClusterClient>, StoreError> {
        let inner = self.inner.cluster_client(cluster)?;
        Ok(Arc::new(ConflictingClient { inner }))
    }
}

struct ConflictingClient {
    inner: Arc<dyn ClusterClient>,
}

impl ClusterClient for ConflictingClient {
    fn get_config_map(&self, key: &ObjectKey) -> Result<ConfigMap, StoreError> {
        self.inner.get_config_map(key)
    }

    fn namespace_exists(&self, name: &str) -> Result<bool, StoreError> {
        self.inner.namespace_exists(name)
    }

    fn create_namespace(&self, name: &str) -> Result<(), StoreError> {
        self.inner.create_namespace(name)
    }

    fn get_pvc(&self, key: &ObjectKey) -> Result<Option<PersistentVolumeClaim>, StoreError> {
        self.inner.get_pvc(key)
    }

    fn create_pvc(&self, pvc: PersistentVolumeClaim) -> Result<(), StoreError> {
        Err(conflict("PersistentVolumeClaim", &pvc.metadata.key()))
    }

    fn get_endpoint(&self, key: &ObjectKey) -> Result<Option<TransferEndpoint>, StoreError> {
        self.inner.get_endpoint(key)
    }

    fn apply_endpoint(&self, endpoint: TransferEndpoint) -> Result<TransferEndpoint, StoreError> {
        self.inner.apply_endpoint(endpoint)
    }

    fn list_transfers(
        &self,
        selector: &BTreeMap<String, String>,
    ) -> Result<Vec<Transfer>, StoreError> {
        self.inner.list_transfers(selector)
    }

    fn create_transfer(&self, transfer: Transfer) -> Result<(), StoreError> {
        self.inner.create_transfer(transfer)
    }

    fn delete_transfer_resources(
        &self,
        selector: &BTreeMap<String, String>,
    ) -> Result<usize, StoreError> {
        self.inner.delete_transfer_resources(selector)
    }
}

/// Toda escritura de status llega con una versión vieja.
pub struct StaleWriteStore {
    inner: MemoryStore,
}

impl StaleWriteStore {
    pub fn new(inner: MemoryStore) -> Self {
        Self { inner }
    }
}

impl ResourceStore for StaleWriteStore {
    delegate_reads!();

    fn update_task_status(&self, task: &MigrationTask) -> Result<MigrationTask, StoreError> {
        Err(conflict("MigrationTask", &task.key()))
    }

    fn cluster_client(&self, cluster: &Cluster) -> Result<Arc<dyn ClusterClient>, StoreError> {
        self.inner.cluster_client(cluster)
    }
}
