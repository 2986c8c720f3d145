use anyhow::{anyhow, bail, Context as _, Result};
use clap::{Parser, Subcommand, ValueEnum};
use common::cluster::RSYNC_ENDPOINT_TYPE;
use common::{CancelResponse, EndpointType, MigrationTask, ObjectKey, TaskSummary};
use reqwest::{Client, StatusCode};
use std::collections::BTreeMap;
use std::env;

/// - En Docker: CONTROLLER_URL=http://controller:8080
/// - Local: default http://localhost:8080
fn controller_base_url() -> String {
    env::var("CONTROLLER_URL").unwrap_or_else(|_| "http://localhost:8080".to_string())
}

#[derive(Parser)]
#[command(name = "client")]
#[command(about = "CLI para operar el controller de migración de volúmenes")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum Kind {
    Cluster,
    Plan,
    Migration,
    Analytic,
}

impl Kind {
    fn path(self) -> &'static str {
        match self {
            Kind::Cluster => "clusters",
            Kind::Plan => "plans",
            Kind::Migration => "migrations",
            Kind::Analytic => "analytics",
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Aplica un recurso (JSON) en el controller
    Apply {
        #[arg(value_enum)]
        kind: Kind,
        #[arg(value_name = "ARCHIVO")]
        file: String,
    },
    /// Fija el tipo de endpoint de transferencia de un cluster
    Config {
        /// Cluster como ns/nombre
        #[arg(value_name = "CLUSTER")]
        cluster: String,
        #[arg(long, default_value = "Route")]
        endpoint_type: String,
    },
    /// Crea una tarea de migración desde un archivo JSON
    Submit {
        #[arg(value_name = "ARCHIVO")]
        file: String,
    },
    /// Muestra el estado de una tarea
    Status {
        /// Tarea como ns/nombre
        #[arg(value_name = "TAREA")]
        task: String,
    },
    /// Lista todas las tareas con su fase y progreso
    List,
    /// Reinicia una tarea fallida o cancelada
    Reset {
        #[arg(value_name = "TAREA")]
        task: String,
    },
    /// Cancela una migración (o una tarea con --task)
    Cancel {
        #[arg(value_name = "OBJETIVO")]
        target: String,
        #[arg(long)]
        task: bool,
    },
}

/// Parsea "ns/nombre".
fn parse_key(s: &str) -> Result<ObjectKey> {
    match s.split_once('/') {
        Some((ns, name)) if !ns.is_empty() && !name.is_empty() && !name.contains('/') => {
            Ok(ObjectKey::new(ns, name))
        }
        _ => Err(anyhow!("'{}' no tiene la forma ns/nombre", s)),
    }
}

fn read_json(file: &str) -> Result<serde_json::Value> {
    let raw = std::fs::read_to_string(file).with_context(|| format!("leyendo {}", file))?;
    serde_json::from_str(&raw).with_context(|| format!("{} no es JSON válido", file))
}

fn print_task(task: &MigrationTask) {
    println!("Tarea {}:", task.key());
    println!("  itinerario: {}", task.status.itinerary);
    println!("  fase: {}", task.status.phase);
    println!("  descripción: {}", task.status.phase_description);
    if let Some(started) = task.status.start_timestamp {
        println!("  iniciada: {}", started);
    }
    if !task.status.conditions.list.is_empty() {
        println!("  condiciones:");
        for c in &task.status.conditions.list {
            println!(
                "    - {}={} ({:?}) {} {}",
                c.kind, c.status, c.category, c.reason, c.message
            );
            for item in &c.items {
                println!("        {}", item);
            }
        }
    }
    if !task.status.errors.is_empty() {
        println!("  errores:");
        for e in &task.status.errors {
            println!("    - {}", e);
        }
    }
}

pub async fn run() -> Result<()> {
    let cli = Cli::parse();
    let client = Client::new();
    let base_url = controller_base_url();

    match cli.command {
        Commands::Apply { kind, file } => {
            let body = read_json(&file)?;
            let url = format!("{}/api/v1/{}", base_url, kind.path());
            let resp = client.post(&url).json(&body).send().await?;
            if !resp.status().is_success() {
                bail!("el controller respondió {} al aplicar {:?}", resp.status(), kind);
            }
            let applied: serde_json::Value = resp.json().await?;
            println!("{:?} aplicado:", kind);
            println!("{}", serde_json::to_string_pretty(&applied)?);
        }

        Commands::Config {
            cluster,
            endpoint_type,
        } => {
            let key = parse_key(&cluster)?;
            // validamos localmente; el controller igual cae a Route si es inválido
            let endpoint: EndpointType = endpoint_type
                .parse()
                .map_err(|_| anyhow!("tipo de endpoint inválido: {}", endpoint_type))?;

            let mut data = BTreeMap::new();
            data.insert(RSYNC_ENDPOINT_TYPE.to_string(), endpoint.to_string());

            let url = format!(
                "{}/api/v1/clusters/{}/{}/config",
                base_url, key.namespace, key.name
            );
            let resp = client.put(&url).json(&data).send().await?;
            match resp.status() {
                s if s.is_success() => println!("cluster {} usa endpoint {}", key, endpoint),
                StatusCode::NOT_FOUND => println!("No se encontró el cluster {}", key),
                s => bail!("el controller respondió {}", s),
            }
        }

        Commands::Submit { file } => {
            let task: MigrationTask = serde_json::from_value(read_json(&file)?)
                .with_context(|| format!("{} no describe una tarea", file))?;
            let url = format!("{}/api/v1/tasks", base_url);
            let resp = client.post(&url).json(&task).send().await?;
            match resp.status() {
                StatusCode::CREATED => {
                    let created: MigrationTask = resp.json().await?;
                    println!("Tarea creada:");
                    println!("  clave: {}", created.key());
                    println!("  uid: {}", created.metadata.uid);
                    println!(
                        "  volúmenes: {}",
                        created.spec.persistent_volume_claims.len()
                    );
                }
                StatusCode::CONFLICT => println!("La tarea {} ya existe", task.key()),
                s => bail!("el controller respondió {}", s),
            }
        }

        Commands::Status { task } => {
            let key = parse_key(&task)?;
            let url = format!("{}/api/v1/tasks/{}/{}", base_url, key.namespace, key.name);
            let resp = client.get(&url).send().await?;
            if resp.status().is_success() {
                let task: MigrationTask = resp.json().await?;
                print_task(&task);
            } else {
                println!("Error: tarea no encontrada (status {})", resp.status());
            }
        }

        Commands::List => {
            let url = format!("{}/api/v1/tasks", base_url);
            let resp = client.get(&url).send().await?;
            let tasks: Vec<TaskSummary> = resp.error_for_status()?.json().await?;
            if tasks.is_empty() {
                println!("(sin tareas)");
            }
            for t in tasks {
                println!(
                    "{:<40} {:<32} {}",
                    t.key.to_string(),
                    t.phase,
                    t.progress.unwrap_or_default()
                );
            }
        }

        Commands::Reset { task } => {
            let key = parse_key(&task)?;
            let url = format!(
                "{}/api/v1/tasks/{}/{}/reset",
                base_url, key.namespace, key.name
            );
            let resp = client.post(&url).send().await?;
            match resp.status() {
                s if s.is_success() => println!("Tarea {} reiniciada", key),
                StatusCode::CONFLICT => {
                    println!("La tarea {} no está fallida ni cancelada", key)
                }
                StatusCode::NOT_FOUND => println!("No se encontró la tarea {}", key),
                s => bail!("el controller respondió {}", s),
            }
        }

        Commands::Cancel { target, task } => {
            let key = parse_key(&target)?;
            let kind = if task { "tasks" } else { "migrations" };
            let url = format!(
                "{}/api/v1/{}/{}/{}/cancel",
                base_url, kind, key.namespace, key.name
            );
            let resp = client.post(&url).send().await?;
            if resp.status() == StatusCode::NOT_FOUND {
                println!("No se encontró {}", key);
                return Ok(());
            }
            let resp = resp.error_for_status()?;
            if task {
                println!("Tarea {} marcada para cancelar", key);
            } else {
                let cancel: CancelResponse = resp.json().await?;
                println!("Migración {} cancelada", cancel.migration);
                for t in cancel.tasks {
                    println!("  tarea afectada: {}", t);
                }
            }
        }
    }

    Ok(())
}
