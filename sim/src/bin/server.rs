use pawgate_sim::{SimConfig, SimServer};
use tracing::info;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let _ = dotenvy::dotenv();

    let filter =
        std::env::var("RUST_LOG").unwrap_or_else(|_| "info,pawgate_sim=info".to_string());
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .compact()
        .init();

    let config = SimConfig::default();
    info!(
        target = "sim",
        addr = %config.addr,
        camera = ?config.camera_image,
        "Starting simulated door controller"
    );

    SimServer::new(config).serve().await?;
    Ok(())
}
