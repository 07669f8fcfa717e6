use axum::http::StatusCode;
use axum::{
    extract::{Query, State},
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use sqlx::{
    sqlite::{SqliteConnectOptions, SqlitePoolOptions},
    SqlitePool,
};
use std::{fmt::Display, str::FromStr, sync::Arc};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use poppy_shared::{
    ApiError, MineExport, SeedInputs, VerificationLogEntry, VerifyError, VerifyRequest, VerifyResponse,
};

const DEFAULT_HISTORY: i64 = 20;

#[derive(Clone)]
struct AppState {
    db: SqlitePool,
}

// DB schema is defined in migrations (see migrations/ folder at the workspace root)

#[derive(Debug, sqlx::FromRow)]
struct VerificationRow {
    id: i64,
    ts: String,
    server_seed_hash: String,
    client_seed: String,
    nonce: i64,
    mine_count: i64,
    mines_json: String,
}

impl VerificationRow {
    fn into_entry(self) -> anyhow::Result<VerificationLogEntry> {
        Ok(VerificationLogEntry {
            id: self.id,
            ts: chrono::DateTime::parse_from_rfc3339(&self.ts)?.with_timezone(&chrono::Utc),
            server_seed_hash: self.server_seed_hash,
            client_seed: self.client_seed,
            nonce: self.nonce,
            mine_count: self.mine_count,
            mines: serde_json::from_str(&self.mines_json)?,
        })
    }
}

async fn open_pool(url: &str, max_connections: u32) -> anyhow::Result<SqlitePool> {
    let options = SqliteConnectOptions::from_str(url)?.create_if_missing(true);
    let pool = SqlitePoolOptions::new()
        .max_connections(max_connections)
        .connect_with(options)
        .await?;
    sqlx::migrate!("../migrations").run(&pool).await?;
    Ok(pool)
}

async fn log_verification(pool: &SqlitePool, inputs: &SeedInputs, resp: &VerifyResponse) -> anyhow::Result<()> {
    let ts = chrono::Utc::now().to_rfc3339();
    sqlx::query(
        "INSERT INTO verifications (ts, server_seed_hash, client_seed, nonce, mine_count, mines_json) VALUES (?, ?, ?, ?, ?, ?)"
    )
    .bind(ts)
    .bind(&resp.server_seed_hash)
    .bind(&inputs.client_seed)
    .bind(inputs.nonce)
    .bind(inputs.mine_count)
    .bind(serde_json::to_string(&resp.mines)?)
    .execute(pool)
    .await?;
    Ok(())
}

async fn recent_verifications(pool: &SqlitePool, limit: i64) -> anyhow::Result<Vec<VerificationLogEntry>> {
    let rows = sqlx::query_as::<_, VerificationRow>(
        "SELECT id, ts, server_seed_hash, client_seed, nonce, mine_count, mines_json FROM verifications ORDER BY id DESC LIMIT ?"
    )
    .bind(limit)
    .fetch_all(pool)
    .await?;
    rows.into_iter().map(VerificationRow::into_entry).collect()
}

fn reject(err: VerifyError) -> (StatusCode, String) {
    (StatusCode::BAD_REQUEST, ApiError::from(err).to_string())
}

fn internal(err: impl Display) -> (StatusCode, String) {
    error!("request failed: {err}");
    (StatusCode::INTERNAL_SERVER_ERROR, ApiError::Internal.to_string())
}

async fn route_verify(
    State(state): State<Arc<AppState>>,
    Json(req): Json<VerifyRequest>,
) -> Result<Json<VerifyResponse>, (StatusCode, String)> {
    let inputs = req.validate().map_err(reject)?;
    let verification = inputs.verify();
    let resp = VerifyResponse::new(&inputs, &verification);
    if resp.underfilled {
        info!(
            requested = inputs.mine_count,
            found = resp.mines.len(),
            "verification returned fewer mines than requested"
        );
    }
    log_verification(&state.db, &inputs, &resp).await.map_err(internal)?;
    info!(nonce = inputs.nonce, mines = ?resp.mines, "verified");
    Ok(Json(resp))
}

async fn route_export(Json(req): Json<VerifyRequest>) -> Result<Json<MineExport>, (StatusCode, String)> {
    let inputs = req.validate().map_err(reject)?;
    let verification = inputs.verify();
    Ok(Json(MineExport::new(&inputs, &verification.mines)))
}

#[derive(Debug, Deserialize)]
struct HistoryParams {
    limit: Option<i64>,
}

async fn route_verifications(
    State(state): State<Arc<AppState>>,
    Query(params): Query<HistoryParams>,
) -> Result<Json<Vec<VerificationLogEntry>>, (StatusCode, String)> {
    let limit = params.limit.unwrap_or(DEFAULT_HISTORY).max(0);
    let entries = recent_verifications(&state.db, limit).await.map_err(internal)?;
    Ok(Json(entries))
}

async fn route_health() -> &'static str {
    "ok"
}

fn app(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(route_health))
        .route("/verify", post(route_verify))
        .route("/export", post(route_export))
        .route("/verifications", get(route_verifications))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();
    let url = std::env::var("DATABASE_URL").unwrap_or_else(|_| "sqlite://poppy.db".to_string());
    let db = open_pool(&url, 5).await?;

    let state = Arc::new(AppState { db });

    let addr = std::env::var("BIND").unwrap_or_else(|_| "127.0.0.1:8080".to_string());
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("listening on {addr}");
    axum::serve(listener, app(state)).await?;
    Ok(())
}
