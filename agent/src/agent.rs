use anyhow::{Context as _, Result};
use common::{
    TransferAssignment, TransferAssignmentRequest, TransferAssignmentResponse,
    TransferCompleteRequest, TransferCompleteResponse,
};
use reqwest::Client;
use std::{env, sync::Arc, time::Duration};
use tokio::sync::Semaphore;
use tokio::time::sleep;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

const DEFAULT_AGENT_CONCURRENCY: usize = 2;
const DEFAULT_TRANSFER_MS: u64 = 2000;

#[derive(Debug, Clone)]
struct AgentConfig {
    base_url: String,
    agent_id: String,
    concurrency: usize,
    transfer_time: Duration,
}

fn env_parse<T: std::str::FromStr>(name: &str, default: T) -> T {
    env::var(name)
        .ok()
        .and_then(|s| s.parse::<T>().ok())
        .unwrap_or(default)
}

impl AgentConfig {
    fn from_env() -> Self {
        let hostname = hostname::get()
            .unwrap_or_default()
            .to_string_lossy()
            .to_string();

        Self {
            base_url: env::var("CONTROLLER_URL")
                .unwrap_or_else(|_| "http://localhost:8080".to_string()),
            agent_id: format!("{}-{}", hostname, std::process::id()),
            concurrency: env_parse("AGENT_CONCURRENCY", DEFAULT_AGENT_CONCURRENCY).max(1),
            transfer_time: Duration::from_millis(env_parse(
                "AGENT_TRANSFER_MS",
                DEFAULT_TRANSFER_MS,
            )),
        }
    }
}

/// Loop principal del agente de transferencia.
/// - Pide transfers pendientes mientras tenga "slots" libres.
/// - Simula la copia de cada volumen (hasta AGENT_CONCURRENCY en paralelo).
/// - Reporta el resultado al controller.
pub async fn run() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("agent=debug,reqwest=info")),
        )
        .init();

    let cfg = AgentConfig::from_env();
    let client = Client::new();

    info!(
        "agente {} con concurrency={} contra {}",
        cfg.agent_id, cfg.concurrency, cfg.base_url
    );

    let sem = Arc::new(Semaphore::new(cfg.concurrency));

    loop {
        let permit = match sem.clone().try_acquire_owned() {
            Ok(p) => p,
            Err(_) => {
                // sin capacidad, esperamos un poco
                sleep(Duration::from_millis(500)).await;
                continue;
            }
        };

        let assignment = match next_transfer(&client, &cfg).await {
            Ok(a) => a,
            Err(e) => {
                drop(permit);
                warn!("no se pudo pedir un transfer: {:#}", e);
                sleep(Duration::from_secs(2)).await;
                continue;
            }
        };

        let Some(assignment) = assignment else {
            drop(permit);
            sleep(Duration::from_secs(1)).await;
            continue;
        };

        let client = client.clone();
        let cfg = cfg.clone();
        tokio::spawn(async move {
            let transfer = assignment.transfer.metadata.key();
            info!(
                "copiando {} -> {} via {} {} (sparse={}, transfer {} en cluster {})",
                assignment.transfer.source,
                assignment.transfer.target,
                assignment.transfer.endpoint_type,
                assignment.transfer.endpoint,
                assignment.transfer.sparse,
                transfer,
                assignment.cluster
            );

            // la copia real la hace rsync; acá solo se simula la duración
            sleep(cfg.transfer_time).await;

            match complete_transfer(&client, &cfg, &assignment, true).await {
                Ok(()) => info!("transfer {} completado", transfer),
                Err(e) => warn!("no se pudo reportar el transfer {}: {:#}", transfer, e),
            }

            drop(permit);
        });
    }
}

async fn next_transfer(
    client: &Client,
    cfg: &AgentConfig,
) -> Result<Option<TransferAssignment>> {
    let url = format!("{}/api/v1/transfers/next", cfg.base_url);
    let resp = client
        .post(&url)
        .json(&TransferAssignmentRequest {
            agent_id: cfg.agent_id.clone(),
        })
        .send()
        .await
        .with_context(|| format!("POST {}", url))?
        .error_for_status()?;

    let body: TransferAssignmentResponse = resp.json().await?;
    Ok(body.assignment)
}

async fn complete_transfer(
    client: &Client,
    cfg: &AgentConfig,
    assignment: &TransferAssignment,
    success: bool,
) -> Result<()> {
    let url = format!("{}/api/v1/transfers/complete", cfg.base_url);
    let resp = client
        .post(&url)
        .json(&TransferCompleteRequest {
            agent_id: cfg.agent_id.clone(),
            cluster: assignment.cluster.clone(),
            transfer: assignment.transfer.metadata.key(),
            success,
        })
        .send()
        .await
        .with_context(|| format!("POST {}", url))?
        .error_for_status()?;

    let body: TransferCompleteResponse = resp.json().await?;
    if !body.ok {
        anyhow::bail!("el controller rechazó el reporte");
    }
    Ok(())
}
