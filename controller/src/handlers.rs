// controller/src/handlers.rs

use std::collections::BTreeMap;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post, put},
    Json, Router,
};
use common::cluster::TASK_LABEL;
use common::condition::RUNNING;
use common::{
    Analytic, CancelResponse, Cluster, ConfigMap, Migration, MigrationTask, ObjectKey, Plan,
    TaskSummary, TransferAssignment, TransferAssignmentRequest, TransferAssignmentResponse,
    TransferCompleteRequest, TransferCompleteResponse,
};
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use crate::state::AppState;
use crate::status;
use crate::store::{ResourceStore, StoreError};

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/api/v1/clusters", post(apply_cluster))
        .route("/api/v1/clusters/:ns/:name/config", put(put_cluster_config))
        .route("/api/v1/plans", post(apply_plan))
        .route("/api/v1/analytics", post(apply_analytic))
        .route("/api/v1/migrations", post(apply_migration))
        .route("/api/v1/migrations/:ns/:name/cancel", post(cancel_migration))
        .route("/api/v1/tasks", get(list_tasks).post(create_task))
        .route("/api/v1/tasks/:ns/:name", get(get_task))
        .route("/api/v1/tasks/:ns/:name/reset", post(reset_task))
        .route("/api/v1/tasks/:ns/:name/cancel", post(cancel_task))
        .route("/api/v1/transfers/next", post(next_transfer))
        .route("/api/v1/transfers/complete", post(complete_transfer))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

fn status_of(err: StoreError) -> StatusCode {
    let code = match &err {
        StoreError::NotFound { .. } => StatusCode::NOT_FOUND,
        StoreError::AlreadyExists { .. }
        | StoreError::Conflict { .. }
        | StoreError::NotRunning { .. } => StatusCode::CONFLICT,
        StoreError::ClientUnavailable { .. } => StatusCode::BAD_GATEWAY,
        StoreError::Unavailable(_) => StatusCode::INTERNAL_SERVER_ERROR,
    };
    if code.is_server_error() {
        warn!("error del store: {}", err);
    }
    code
}

/* ---------------- handlers HTTP ---------------- */

async fn health() -> &'static str {
    "ok"
}

/* --------- recursos de configuración --------- */

async fn apply_cluster(
    State(state): State<AppState>,
    Json(cluster): Json<Cluster>,
) -> Result<Json<Cluster>, StatusCode> {
    let cluster = state.store.apply_cluster(cluster).map_err(status_of)?;
    info!("cluster {} registrado", cluster.metadata.key());
    state.enqueue_all();
    Ok(Json(cluster))
}

async fn put_cluster_config(
    State(state): State<AppState>,
    Path((ns, name)): Path<(String, String)>,
    Json(data): Json<BTreeMap<String, String>>,
) -> Result<Json<ConfigMap>, StatusCode> {
    let key = ObjectKey::new(ns, name);
    let cm = state
        .store
        .put_cluster_config(&key, data)
        .map_err(status_of)?;
    info!("configuración del cluster {} actualizada", key);
    state.enqueue_all();
    Ok(Json(cm))
}

async fn apply_plan(
    State(state): State<AppState>,
    Json(plan): Json<Plan>,
) -> Result<Json<Plan>, StatusCode> {
    let plan = state.store.apply_plan(plan).map_err(status_of)?;
    info!(
        "plan {} aplicado (listo={})",
        plan.metadata.key(),
        plan.status.is_ready()
    );
    state.enqueue_all();
    Ok(Json(plan))
}

async fn apply_analytic(
    State(state): State<AppState>,
    Json(analytic): Json<Analytic>,
) -> Result<Json<Analytic>, StatusCode> {
    let analytic = state.store.apply_analytic(analytic).map_err(status_of)?;
    state.enqueue_all();
    Ok(Json(analytic))
}

/* --------- migraciones --------- */

async fn apply_migration(
    State(state): State<AppState>,
    Json(migration): Json<Migration>,
) -> Result<Json<Migration>, StatusCode> {
    let migration = state.store.apply_migration(migration).map_err(status_of)?;
    state.tracer.start_migration_span(&migration);
    info!("migración {} aplicada", migration.metadata.key());

    for key in state.store.tasks_owned_by(&migration.metadata.uid) {
        state.queue.add(key);
    }
    Ok(Json(migration))
}

async fn cancel_migration(
    State(state): State<AppState>,
    Path((ns, name)): Path<(String, String)>,
) -> Result<Json<CancelResponse>, StatusCode> {
    let key = ObjectKey::new(ns, name);
    let mut migration = state.store.get_migration(&key).map_err(status_of)?;
    migration.spec.canceled = true;
    let migration = state.store.apply_migration(migration).map_err(status_of)?;
    info!("migración {} cancelada", key);

    let tasks = state.store.tasks_owned_by(&migration.metadata.uid);
    for t in &tasks {
        state.queue.add(t.clone());
    }
    state.tracer.finish_migration_span(&migration.metadata.uid);

    Ok(Json(CancelResponse {
        migration: key,
        tasks,
    }))
}

/* --------- tareas --------- */

async fn create_task(
    State(state): State<AppState>,
    Json(mut task): Json<MigrationTask>,
) -> Result<(StatusCode, Json<MigrationTask>), StatusCode> {
    // el status lo escribe sólo el controller
    task.status = Default::default();
    let task = state.store.create_task(task).map_err(status_of)?;
    info!(
        "tarea {} creada con {} volúmenes",
        task.key(),
        task.spec.persistent_volume_claims.len()
    );
    state.queue.add(task.key());
    Ok((StatusCode::CREATED, Json(task)))
}

async fn list_tasks(State(state): State<AppState>) -> Result<Json<Vec<TaskSummary>>, StatusCode> {
    let tasks = state.store.list_tasks().map_err(status_of)?;
    let summaries = tasks
        .into_iter()
        .map(|t| TaskSummary {
            progress: t.status.conditions.find(RUNNING).map(|c| c.message.clone()),
            key: t.key(),
            phase: t.status.phase,
            phase_description: t.status.phase_description,
            itinerary: t.status.itinerary,
        })
        .collect();
    Ok(Json(summaries))
}

async fn get_task(
    State(state): State<AppState>,
    Path((ns, name)): Path<(String, String)>,
) -> Result<Json<MigrationTask>, StatusCode> {
    let task = state
        .store
        .get_task(&ObjectKey::new(ns, name))
        .map_err(status_of)?;
    Ok(Json(task))
}

// Reinicia una tarea fallida o cancelada desde la primera fase
async fn reset_task(
    State(state): State<AppState>,
    Path((ns, name)): Path<(String, String)>,
) -> Result<Json<MigrationTask>, StatusCode> {
    let key = ObjectKey::new(ns, name);
    let mut task = state.store.get_task(&key).map_err(status_of)?;
    if !status::reset(&mut task) {
        info!(
            "reset de {} rechazado: la fase {} no es fallida ni cancelada",
            key, task.status.phase
        );
        return Err(StatusCode::CONFLICT);
    }
    let task = state.store.update_task(&task).map_err(status_of)?;
    info!("tarea {} reiniciada", key);
    state.queue.add(key);
    Ok(Json(task))
}

async fn cancel_task(
    State(state): State<AppState>,
    Path((ns, name)): Path<(String, String)>,
) -> Result<Json<MigrationTask>, StatusCode> {
    let key = ObjectKey::new(ns, name);
    let mut task = state.store.get_task(&key).map_err(status_of)?;
    task.spec.canceled = true;
    let task = state.store.update_task(&task).map_err(status_of)?;
    state.queue.add(key);
    Ok(Json(task))
}

/* --------- agentes de transferencia --------- */

// Asigna el próximo transfer pendiente (si hay)
async fn next_transfer(
    State(state): State<AppState>,
    Json(req): Json<TransferAssignmentRequest>,
) -> Result<Json<TransferAssignmentResponse>, StatusCode> {
    let next = state
        .store
        .next_pending_transfer(&req.agent_id)
        .map_err(status_of)?;

    let assignment = next.map(|(cluster, transfer)| {
        info!(
            "transfer {} asignado al agente {}",
            transfer.metadata.key(),
            req.agent_id
        );
        TransferAssignment { cluster, transfer }
    });
    Ok(Json(TransferAssignmentResponse { assignment }))
}

async fn complete_transfer(
    State(state): State<AppState>,
    Json(req): Json<TransferCompleteRequest>,
) -> Result<Json<TransferCompleteResponse>, StatusCode> {
    let cluster = state.store.cluster(&req.cluster).map_err(status_of)?;
    let transfer = cluster
        .complete_transfer(&req.transfer, req.success)
        .map_err(status_of)?;
    info!(
        "agente {} terminó el transfer {} (ok={})",
        req.agent_id, req.transfer, req.success
    );

    if let Some(uid) = transfer.metadata.labels.get(TASK_LABEL) {
        if let Some(key) = state.store.find_task_by_uid(uid) {
            state.queue.add(key);
        }
    }
    Ok(Json(TransferCompleteResponse { ok: true }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::itinerary::{MIGRATION_FAILED, PREPARE};
    use crate::queue::WorkQueue;
    use crate::store::ClusterClient;
    use crate::testutil;
    use crate::trace::Tracer;
    use axum::body::{to_bytes, Body};
    use axum::http::{Method, Request};
    use serde::de::DeserializeOwned;
    use std::sync::Arc;
    use tower::ServiceExt;

    fn app_state() -> AppState {
        AppState::new(
            testutil::store(),
            WorkQueue::new(),
            Arc::new(Tracer::new(false, "DirectVolumeMigration")),
        )
    }

    fn json_request(method: Method, uri: &str, body: &impl serde::Serialize) -> Request<Body> {
        Request::builder()
            .method(method)
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(serde_json::to_vec(body).unwrap()))
            .unwrap()
    }

    fn empty_request(method: Method, uri: &str) -> Request<Body> {
        Request::builder()
            .method(method)
            .uri(uri)
            .body(Body::empty())
            .unwrap()
    }

    async fn read_json<T: DeserializeOwned>(resp: axum::response::Response) -> T {
        let bytes = to_bytes(resp.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn health_responde_ok() {
        let resp = build_router(app_state())
            .oneshot(empty_request(Method::GET, "/health"))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn crear_tarea_la_encola_y_se_puede_leer() {
        let state = app_state();
        let app = build_router(state.clone());
        let task = testutil::standalone_task("t1", &[("ns1", "pvc-a")]);

        let resp = app
            .clone()
            .oneshot(json_request(Method::POST, "/api/v1/tasks", &task))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::CREATED);
        let created: MigrationTask = read_json(resp).await;
        assert_eq!(created.metadata.resource_version, 1);
        assert_eq!(state.queue.len(), 1);

        let resp = app
            .clone()
            .oneshot(json_request(Method::POST, "/api/v1/tasks", &task))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::CONFLICT);

        let uri = format!("/api/v1/tasks/{}/t1", testutil::NS);
        let resp = app.oneshot(empty_request(Method::GET, &uri)).await.unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        let got: MigrationTask = read_json(resp).await;
        assert_eq!(got.metadata.uid, created.metadata.uid);
    }

    #[tokio::test]
    async fn crear_tarea_descarta_el_status_del_cliente() {
        let state = app_state();
        let mut task = testutil::standalone_task("t1", &[("ns1", "pvc-a")]);
        task.status.phase = "Completed".to_string();
        task.status.itinerary = "Inventado".to_string();
        task.status.errors.push("viejo".to_string());

        let resp = build_router(state.clone())
            .oneshot(json_request(Method::POST, "/api/v1/tasks", &task))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::CREATED);

        let stored = state.store.get_task(&task.key()).unwrap();
        assert!(stored.status.phase.is_empty());
        assert!(stored.status.itinerary.is_empty());
        assert!(stored.status.errors.is_empty());
    }

    #[tokio::test]
    async fn tarea_inexistente_es_404() {
        let resp = build_router(app_state())
            .oneshot(empty_request(Method::GET, "/api/v1/tasks/ns/nada"))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn listado_resume_fase_y_progreso() {
        let state = app_state();
        let mut task = state
            .store
            .create_task(testutil::standalone_task("t1", &[("ns1", "pvc-a")]))
            .unwrap();
        task.status.phase = PREPARE.to_string();
        state.store.update_task_status(&task).unwrap();

        let resp = build_router(state)
            .oneshot(empty_request(Method::GET, "/api/v1/tasks"))
            .await
            .unwrap();
        let list: Vec<TaskSummary> = read_json(resp).await;
        assert_eq!(list.len(), 1);
        assert_eq!(list[0].phase, PREPARE);
        assert!(list[0].progress.is_none());
    }

    #[tokio::test]
    async fn reset_rechaza_tareas_en_curso_y_reinicia_fallidas() {
        let state = app_state();
        let mut task = state
            .store
            .create_task(testutil::standalone_task("t1", &[("ns1", "pvc-a")]))
            .unwrap();
        task.status.phase = PREPARE.to_string();
        let mut task = state.store.update_task_status(&task).unwrap();
        let app = build_router(state.clone());
        let uri = format!("/api/v1/tasks/{}/t1/reset", testutil::NS);

        let resp = app
            .clone()
            .oneshot(empty_request(Method::POST, &uri))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::CONFLICT);

        task.status.phase = MIGRATION_FAILED.to_string();
        task.status.errors.push("boom".to_string());
        state.store.update_task_status(&task).unwrap();

        let resp = app.oneshot(empty_request(Method::POST, &uri)).await.unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        let reset: MigrationTask = read_json(resp).await;
        assert!(reset.status.phase.is_empty());
        assert!(reset.status.errors.is_empty());
    }

    #[tokio::test]
    async fn cancelar_migracion_marca_el_flag_y_encola_sus_tareas() {
        let state = app_state();
        let migration = testutil::add_migration(&state.store, "mig-1", "plan-1", false);
        state
            .store
            .create_task(testutil::owned_task(
                "t1",
                "mig-1",
                &migration.metadata.uid,
                &[("ns1", "pvc-a")],
            ))
            .unwrap();

        let uri = format!("/api/v1/migrations/{}/mig-1/cancel", testutil::NS);
        let resp = build_router(state.clone())
            .oneshot(empty_request(Method::POST, &uri))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        let body: CancelResponse = read_json(resp).await;
        assert_eq!(body.tasks, vec![ObjectKey::new(testutil::NS, "t1")]);

        let stored = state
            .store
            .get_migration(&ObjectKey::new(testutil::NS, "mig-1"))
            .unwrap();
        assert!(stored.spec.canceled);
        assert_eq!(state.queue.len(), 1);
    }

    #[tokio::test]
    async fn agente_toma_y_completa_un_transfer() {
        let state = app_state();
        let app = build_router(state.clone());
        let req = TransferAssignmentRequest {
            agent_id: "agente-1".to_string(),
        };

        let resp = app
            .clone()
            .oneshot(json_request(Method::POST, "/api/v1/transfers/next", &req))
            .await
            .unwrap();
        let empty: TransferAssignmentResponse = read_json(resp).await;
        assert!(empty.assignment.is_none());

        let task = state
            .store
            .create_task(testutil::standalone_task("t1", &[("ns1", "pvc-a")]))
            .unwrap();
        let mut labels = BTreeMap::new();
        labels.insert(TASK_LABEL.to_string(), task.metadata.uid.clone());
        let mut meta = common::ObjectMeta::new("ns1", "transfer-pvc-a");
        meta.labels = labels;
        testutil::dest_cluster(&state.store)
            .create_transfer(common::Transfer {
                metadata: meta,
                source: ObjectKey::new("ns1", "pvc-a"),
                target: ObjectKey::new("ns1", "pvc-a"),
                endpoint: "transfer-endpoint.ns1.svc".to_string(),
                endpoint_type: common::EndpointType::ClusterIP,
                sparse: false,
                phase: common::TransferPhase::Pending,
                agent_id: None,
            })
            .unwrap();

        let resp = app
            .clone()
            .oneshot(json_request(Method::POST, "/api/v1/transfers/next", &req))
            .await
            .unwrap();
        let got: TransferAssignmentResponse = read_json(resp).await;
        let assignment = got.assignment.unwrap();
        assert_eq!(assignment.cluster.name, testutil::DEST);
        assert_eq!(assignment.transfer.agent_id.as_deref(), Some("agente-1"));

        let done = TransferCompleteRequest {
            agent_id: "agente-1".to_string(),
            cluster: assignment.cluster,
            transfer: assignment.transfer.metadata.key(),
            success: true,
        };
        let resp = app
            .clone()
            .oneshot(json_request(Method::POST, "/api/v1/transfers/complete", &done))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(state.queue.len(), 1);

        // un reporte repetido no cambia el resultado
        let again = TransferCompleteRequest {
            success: false,
            ..done
        };
        let resp = app
            .oneshot(json_request(Method::POST, "/api/v1/transfers/complete", &again))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::CONFLICT);
        let transfers = testutil::dest_cluster(&state.store)
            .list_transfers(&BTreeMap::new())
            .unwrap();
        assert_eq!(transfers[0].phase, common::TransferPhase::Succeeded);
    }

    #[tokio::test]
    async fn configurar_cluster_inexistente_es_404() {
        let mut data = BTreeMap::new();
        data.insert("RSYNC_ENDPOINT_TYPE".to_string(), "NodePort".to_string());
        let resp = build_router(app_state())
            .oneshot(json_request(
                Method::PUT,
                "/api/v1/clusters/ns/nada/config",
                &data,
            ))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    }
}
