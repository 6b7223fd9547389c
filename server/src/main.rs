//! Clinic server entry point: settings, Postgres pool, schema bootstrap,
//! session layer, and the JSON router.

mod error;
mod password;
mod routes;
mod session;
mod settings;

use anyhow::Context as _;
use sqlx::postgres::PgPoolOptions;
use store::PgStore;
use time::Duration;
use tower_sessions::{Expiry, SessionManagerLayer};
use tower_sessions_sqlx_store::PostgresStore;
use tracing_subscriber::EnvFilter;

use crate::settings::Settings;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let settings = Settings::new().context("failed to load settings")?;

    let pool = PgPoolOptions::new()
        .max_connections(5)
        .connect(&settings.database.url())
        .await
        .context("failed to connect to the database")?;

    let store = PgStore::new(pool.clone());
    store.init_schema().await.context("failed to create schema")?;

    let session_store = PostgresStore::new(pool);
    session_store
        .migrate()
        .await
        .context("failed to create the session table")?;
    let session_layer = SessionManagerLayer::new(session_store)
        .with_secure(false)
        .with_expiry(Expiry::OnInactivity(Duration::minutes(
            settings.session.inactivity_minutes,
        )));

    let app = routes::router(routes::AppState::new(store)).layer(session_layer);

    let addr = format!("{}:{}", settings.server.host, settings.server.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!(%addr, "clinic server listening");
    axum::serve(listener, app).await?;
    Ok(())
}
