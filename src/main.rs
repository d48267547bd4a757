use anyhow::Context;
use dotenvy::dotenv;
use log::{error, info};
use std::sync::Arc;

use certserver::core::config::AppConfig;
use certserver::core::shared::state::AppState;
use certserver::core::shared::utils::{create_conn, run_migrations};
use certserver::drive::{
    ensure_bucket_on_startup, ObjectStore, BUCKET_SETUP_ATTEMPTS, BUCKET_SETUP_DELAY,
};
use certserver::main_module::{run_axum_server, seed_defaults};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    info!("Starting certserver {}", env!("CARGO_PKG_VERSION"));

    let config = AppConfig::from_env()?;

    let pool = create_conn(&config.database_url)?;
    run_migrations(&pool).map_err(|e| anyhow::anyhow!("Failed to run migrations: {e}"))?;
    info!("Database migrations applied");

    let drive = ObjectStore::connect(&config.drive).await;
    ensure_bucket_on_startup(
        &drive,
        config.drive.strict_startup,
        BUCKET_SETUP_ATTEMPTS,
        BUCKET_SETUP_DELAY,
    )
    .await
    .context("Object storage bucket is unavailable")?;

    {
        let pool = pool.clone();
        let seed = config.seed.clone();
        tokio::task::spawn_blocking(move || {
            let mut conn = pool.get().context("Failed to get database connection")?;
            seed_defaults(&mut conn, &seed)
        })
        .await
        .context("Seed task panicked")??;
    }

    let app_state = Arc::new(AppState::new(pool, drive, config));
    if let Err(e) = run_axum_server(app_state).await {
        error!("Server stopped with error: {e}");
        return Err(e.into());
    }
    info!("certserver stopped");
    Ok(())
}
