mod agent;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    agent::run().await
}
