// controller/src/trace.rs

use std::collections::HashMap;
use std::sync::Mutex;

use common::{Migration, MigrationTask, MIGRATION_KIND};
use tracing::{info_span, Span};

/// Correlación de spans: un span raíz por migración y un span hijo por
/// cada reconcile de sus tareas. Se crea una vez al arrancar el proceso.
pub struct Tracer {
    enabled: bool,
    service: String,
    roots: Mutex<HashMap<String, Span>>,
}

impl Tracer {
    pub fn new(enabled: bool, service: impl Into<String>) -> Self {
        Self {
            enabled,
            service: service.into(),
            roots: Mutex::new(HashMap::new()),
        }
    }

    /// Registra (o devuelve) el span raíz de la migración, indexado por uid.
    pub fn start_migration_span(&self, migration: &Migration) -> Option<Span> {
        if !self.enabled {
            return None;
        }
        let uid = migration.metadata.uid.clone();
        let mut roots = self.roots.lock().ok()?;
        let span = roots
            .entry(uid.clone())
            .or_insert_with(|| {
                info_span!(
                    parent: None,
                    "migration",
                    service = %self.service,
                    migration = %migration.metadata.key(),
                    uid = %uid
                )
            })
            .clone();
        Some(span)
    }

    pub fn migration_span(&self, uid: &str) -> Option<Span> {
        self.roots.lock().ok()?.get(uid).cloned()
    }

    pub fn finish_migration_span(&self, uid: &str) {
        if let Ok(mut roots) = self.roots.lock() {
            roots.remove(uid);
        }
    }

    /// Span del reconcile actual, hijo del span de la migración dueña.
    /// None si el tracing está apagado o no hay span raíz registrado.
    pub fn reconcile_span(&self, task: &MigrationTask) -> Option<Span> {
        if !self.enabled {
            return None;
        }
        let owner = task.metadata.owner_of_kind(MIGRATION_KIND)?;
        let root = self.migration_span(&owner.uid)?;
        Some(info_span!(
            parent: &root,
            "dvm-reconcile",
            task = %task.metadata.name
        ))
    }
}
