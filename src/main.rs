use std::net::SocketAddr;

use jobboard_backend::{
    config::Config, database::pool::create_pool, routes::app_router, AppState,
};
use tokio::net::TcpListener;
use tokio_cron_scheduler::{Job, JobScheduler};
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Every hour on the hour.
const TOKEN_PURGE_SCHEDULE: &str = "0 0 * * * *";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,jobboard_backend=debug,tower_http=info")),
        )
        .init();

    let config = Config::from_env()?;
    let addr: SocketAddr = config.server_address.parse()?;

    let pool = create_pool(&config).await?;
    sqlx::migrate!("./migrations").run(&pool).await?;

    let app_state = AppState::new(pool, config)?;

    let scheduler = JobScheduler::new()
        .await
        .map_err(|e| anyhow::anyhow!("scheduler init failed: {:?}", e))?;
    {
        let tokens = app_state.token_service.clone();
        let purge = Job::new_async(TOKEN_PURGE_SCHEDULE, move |_id, _lock| {
            let tokens = tokens.clone();
            Box::pin(async move {
                match tokens.purge_expired().await {
                    Ok(report) => info!(
                        verification = report.verification,
                        password_reset = report.password_reset,
                        two_factor = report.two_factor,
                        "expired tokens purged"
                    ),
                    Err(e) => tracing::error!(error = ?e, "token purge failed"),
                }
            })
        })
        .map_err(|e| anyhow::anyhow!("invalid purge schedule: {:?}", e))?;
        scheduler
            .add(purge)
            .await
            .map_err(|e| anyhow::anyhow!("failed to schedule token purge: {:?}", e))?;
    }
    scheduler
        .start()
        .await
        .map_err(|e| anyhow::anyhow!("scheduler start failed: {:?}", e))?;

    let app = app_router(app_state);

    info!("Server listening on {}", addr);
    let listener = TcpListener::bind(addr).await?;
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await?;

    Ok(())
}
