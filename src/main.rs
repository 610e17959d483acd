use buzz_breeze::{
    AppState, MemoryRepository, PostgresRepository, SystemClock,
    clock::ClockState,
    config::{AppConfig, Env},
    create_router,
    repository::{DirectoryState, RepositoryState},
};
use sqlx::postgres::PgPoolOptions;
use std::{net::SocketAddr, sync::Arc};
use tokio::net::TcpListener;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// main
///
/// Loads configuration, sets up logging, connects the store, and serves the router.
#[tokio::main]
async fn main() {
    // 1. Configuration (fail-fast)
    dotenv::dotenv().ok();
    let config = AppConfig::load().expect("FATAL: invalid configuration");

    // 2. Logging: pretty locally, JSON in production.
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "buzz_breeze=debug,tower_http=info".into());

    match config.env {
        Env::Local => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer().pretty())
                .init();
        }
        Env::Production => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer().json())
                .init();
        }
    }

    tracing::info!("Application starting in {:?} mode", config.env);

    // 3. Store: Postgres when configured, otherwise the in-memory store (local only;
    // `AppConfig::load` refuses production without DATABASE_URL).
    let clock = Arc::new(SystemClock) as ClockState;
    let app_state = match config.db_url.clone() {
        Some(db_url) => {
            let pool = PgPoolOptions::new()
                .max_connections(5)
                .connect(&db_url)
                .await
                .expect("FATAL: Failed to connect to Postgres. Check DATABASE_URL.");

            let store = Arc::new(PostgresRepository::new(pool));
            store
                .migrate()
                .await
                .expect("FATAL: Failed to run database migrations.");

            let repo = store.clone() as RepositoryState;
            let directory = store as DirectoryState;
            AppState::new(config, repo, directory, clock)
        }
        None => {
            tracing::warn!("DATABASE_URL not set, using the in-memory store");
            AppState::in_memory(config, Arc::new(MemoryRepository::new()), clock)
        }
    };

    // 4. Router and server
    let addr = SocketAddr::from(([0, 0, 0, 0], app_state.config.port));
    let app = create_router(app_state);

    let listener = TcpListener::bind(addr)
        .await
        .expect("FATAL: Failed to bind the listen address.");

    tracing::info!("BuzzBreeze is running on {}", addr);
    tracing::info!("API Documentation (Swagger UI) available at: http://{}/swagger-ui", addr);

    axum::serve(listener, app).await.expect("FATAL: server error");
}
