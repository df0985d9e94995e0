//! Health Check Handlers
//!
//! - `GET /health` - process is up
//! - `GET /health/live` - liveness check
//! - `GET /health/ready` - readiness: database, Redis and the routing fabric
//!
//! Readiness only fails on the database. Chat still works on a single node
//! without Redis, so a Redis failure degrades the report instead.

use std::future::Future;
use std::time::Instant;

use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;
use serde::Serialize;

use crate::presentation::websocket::FabricStats;
use crate::startup::AppState;

static SERVER_START: Lazy<(Instant, DateTime<Utc>)> = Lazy::new(|| (Instant::now(), Utc::now()));

/// Pin the start time used for uptime. Call once during startup.
pub fn init_server_start() {
    Lazy::force(&SERVER_START);
}

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Healthy,
    Degraded,
    Unhealthy,
    /// Not configured on this node
    Disabled,
}

/// Outcome of one dependency check.
#[derive(Debug, Serialize)]
pub struct ServiceHealth {
    pub status: HealthStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub latency_ms: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl ServiceHealth {
    fn disabled() -> Self {
        Self {
            status: HealthStatus::Disabled,
            latency_ms: None,
            message: None,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct FabricHealth {
    pub status: HealthStatus,
    pub relay_enabled: bool,
    #[serde(flatten)]
    pub stats: FabricStats,
}

#[derive(Debug, Serialize)]
pub struct HealthChecks {
    pub database: ServiceHealth,
    pub redis: ServiceHealth,
    pub fabric: FabricHealth,
}

#[derive(Debug, Serialize)]
pub struct ReadinessReport {
    pub status: HealthStatus,
    pub version: &'static str,
    pub uptime_seconds: u64,
    pub started_at: String,
    pub checks: HealthChecks,
}

#[derive(Debug, Serialize)]
pub struct StatusBody {
    pub status: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<&'static str>,
}

pub async fn health_check() -> Json<StatusBody> {
    Json(StatusBody {
        status: "healthy",
        version: Some(env!("CARGO_PKG_VERSION")),
    })
}

pub async fn liveness() -> Json<StatusBody> {
    Json(StatusBody {
        status: "alive",
        version: None,
    })
}

/// 503 when the database is unreachable, 200 otherwise.
pub async fn readiness(State(state): State<AppState>) -> impl IntoResponse {
    let database = check_dependency("Database", sqlx::query("SELECT 1").execute(&state.db)).await;

    let redis = match state.redis.clone() {
        Some(mut conn) => {
            check_dependency("Redis", async move {
                redis::cmd("PING").query_async::<String>(&mut conn).await
            })
            .await
        }
        None => ServiceHealth::disabled(),
    };

    let fabric = FabricHealth {
        status: HealthStatus::Healthy,
        relay_enabled: state.settings.fabric.relay_enabled,
        stats: state.sessions.fabric.stats(),
    };

    let status = overall_status(&database, &redis);
    let (started, started_at) = *SERVER_START;
    let report = ReadinessReport {
        status,
        version: env!("CARGO_PKG_VERSION"),
        uptime_seconds: started.elapsed().as_secs(),
        started_at: started_at.to_rfc3339(),
        checks: HealthChecks {
            database,
            redis,
            fabric,
        },
    };

    let code = if status == HealthStatus::Unhealthy {
        StatusCode::SERVICE_UNAVAILABLE
    } else {
        StatusCode::OK
    };
    (code, Json(report))
}

/// Time a round trip to a dependency.
async fn check_dependency<T, E, F>(name: &str, round_trip: F) -> ServiceHealth
where
    E: std::fmt::Display,
    F: Future<Output = Result<T, E>>,
{
    let started = Instant::now();
    match round_trip.await {
        Ok(_) => ServiceHealth {
            status: HealthStatus::Healthy,
            latency_ms: Some(started.elapsed().as_millis() as u64),
            message: None,
        },
        Err(e) => {
            tracing::warn!(dependency = name, error = %e, "Health check failed");
            ServiceHealth {
                status: HealthStatus::Unhealthy,
                latency_ms: None,
                message: Some(format!("{name} connection failed: {e}")),
            }
        }
    }
}

fn overall_status(database: &ServiceHealth, redis: &ServiceHealth) -> HealthStatus {
    match (database.status, redis.status) {
        (HealthStatus::Unhealthy, _) => HealthStatus::Unhealthy,
        (_, HealthStatus::Unhealthy) => HealthStatus::Degraded,
        _ => HealthStatus::Healthy,
    }
}
