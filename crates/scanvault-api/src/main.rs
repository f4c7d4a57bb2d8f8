use mimalloc::MiMalloc;

#[global_allocator]
static GLOBAL: MiMalloc = MiMalloc;

use scanvault_api::setup::{initialize_app, server::start_server};
use scanvault_core::Config;
use scanvault_worker::init_tracing;

#[tokio::main]
async fn main() -> Result<(), anyhow::Error> {
    let config = Config::from_env()?;
    init_tracing(config.log_format())?;

    let app = initialize_app(config.clone()).await?;
    start_server(&config, app.router).await?;

    if let Some(worker) = app.worker {
        worker.shutdown().await;
        worker.join().await;
    }

    tracing::info!("Server shut down");
    Ok(())
}
