mod config;

use anyhow::Context;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::info;

use natter_api::AppStateInner;
use natter_auth::{TokenService, resolve_signing_key};
use natter_db::Database;

use crate::config::Config;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present
    let _ = dotenvy::dotenv();

    // Init logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "natter=debug,tower_http=debug".into()),
        )
        .init();

    let config = Config::from_env()?;

    let key = resolve_signing_key(config.token_key.as_deref(), config.allow_ephemeral_key)
        .context("set NATTER_TOKEN_KEY to base64 of 32 random bytes, or NATTER_ALLOW_EPHEMERAL_KEY=true for development")?;
    let tokens = TokenService::with_lifetime_hours(key, config.token_lifetime_hours);

    let db = Database::open(&config.db_path)
        .with_context(|| format!("failed to open database {}", config.db_path.display()))?;

    let state = AppStateInner::new(db, tokens);

    let app = natter_api::router(state)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http());

    let addr = config.addr()?;
    info!(
        "Natter server listening on {} (tokens valid for {}h)",
        addr, config.token_lifetime_hours
    );

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
