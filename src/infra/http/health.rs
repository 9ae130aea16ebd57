use axum::{Json, Router, extract::State, routing::get};
use serde::Serialize;
use time::OffsetDateTime;

use crate::cache::CacheStats;

use super::AppState;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct HealthBody {
    status: &'static str,
    #[serde(with = "time::serde::rfc3339")]
    timestamp: OffsetDateTime,
    uptime: f64,
    version: &'static str,
    cache: Option<CacheStats>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct StatsBody {
    system: SystemStats,
    cache: Option<CacheStats>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct SystemStats {
    uptime: f64,
    version: &'static str,
}

pub(super) fn routes() -> Router<AppState> {
    Router::new()
        .route("/api/health", get(health))
        .route("/api/stats", get(stats))
        .route("/api/template", get(template))
}

async fn health(State(state): State<AppState>) -> Json<HealthBody> {
    Json(HealthBody {
        status: "healthy",
        timestamp: OffsetDateTime::now_utc(),
        uptime: state.started_at.elapsed().as_secs_f64(),
        version: env!("CARGO_PKG_VERSION"),
        cache: state.cache.as_ref().map(|cache| cache.stats()),
    })
}

async fn stats(State(state): State<AppState>) -> Json<StatsBody> {
    Json(StatsBody {
        system: SystemStats {
            uptime: state.started_at.elapsed().as_secs_f64(),
            version: env!("CARGO_PKG_VERSION"),
        },
        cache: state.cache.as_ref().map(|cache| cache.stats()),
    })
}

async fn template(State(state): State<AppState>) -> Json<serde_json::Value> {
    Json(state.sites.template())
}
