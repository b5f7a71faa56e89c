use std::net::SocketAddr;
use std::sync::Arc;

use sqlx::sqlite::SqlitePoolOptions;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use coursecal::api::router;
use coursecal::calendar::{CalendarClient, CalendarConfig, HttpCalendarClient, NoopCalendarClient};
use coursecal::config::AppConfig;
use coursecal::services::SyncScheduler;
use coursecal::state::AppState;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "coursecal=debug".to_string()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = AppConfig::from_env();

    let pool = SqlitePoolOptions::new()
        .max_connections(5)
        .connect(&config.database_url)
        .await?;

    sqlx::migrate!("./migrations").run(&pool).await?;

    let calendar: Arc<dyn CalendarClient> = match CalendarConfig::new_from_env() {
        Ok(cal) => Arc::new(HttpCalendarClient::new(cal)?),
        Err(e) => {
            warn!("calendar API not configured ({}), running with noop client", e);
            Arc::new(NoopCalendarClient)
        }
    };

    let scheduler = SyncScheduler::new(pool.clone(), calendar.clone(), config.sync_interval_secs);
    tokio::spawn(scheduler.start());

    let state = AppState {
        db: pool.clone(),
        calendar,
    };

    let app = router(state);

    let addr = SocketAddr::from(([127, 0, 0, 1], config.port));
    info!("listening on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
