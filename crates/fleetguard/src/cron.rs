//! HTTP entry point for the scheduled expiry sweep.
//!
//! An external scheduler calls `/api/cron/expiry-alerts` once a day with
//! `Authorization: Bearer <secret>`. The sweep itself is synchronous and runs
//! on the blocking pool while holding the store lock.

use std::net::SocketAddr;
use std::sync::{Arc, Mutex};

use axum::extract::State;
use axum::http::header::AUTHORIZATION;
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use chrono::Utc;
use serde::Serialize;
use serde_json::json;
use tracing::{error, info, warn};

use crate::alerts::{run_sweep, SweepReport, SweepSettings};
use crate::error::{Error, Result};
use crate::storage::Storage;

/// Path of the sweep endpoint.
pub const EXPIRY_ALERTS_PATH: &str = "/api/cron/expiry-alerts";

/// Shared state for the cron router.
#[derive(Clone)]
pub struct CronState {
    store: Arc<Mutex<Storage>>,
    settings: SweepSettings,
    secret: Option<String>,
}

impl std::fmt::Debug for CronState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CronState")
            .field("settings", &self.settings)
            .field("secret", &self.secret.as_ref().map(|_| "<redacted>"))
            .finish_non_exhaustive()
    }
}

impl CronState {
    /// Wrap an open store for sharing with request handlers.
    #[must_use]
    pub fn new(store: Storage, settings: SweepSettings, secret: Option<String>) -> Self {
        Self {
            store: Arc::new(Mutex::new(store)),
            settings,
            secret,
        }
    }

    /// The shared store handle.
    #[must_use]
    pub fn store(&self) -> Arc<Mutex<Storage>> {
        Arc::clone(&self.store)
    }
}

/// Extract the token from an `Authorization` header value.
///
/// The `Bearer` scheme is matched case-insensitively.
#[must_use]
pub fn bearer_token(header: &str) -> Option<&str> {
    match header.get(..7) {
        Some(scheme) if scheme.eq_ignore_ascii_case("bearer ") => Some(header[7..].trim()),
        _ => None,
    }
}

/// Check an `Authorization` header value against the configured secret.
///
/// Both sides are hashed before comparison so the check does not leak the
/// secret's length or prefix through timing.
///
/// # Errors
///
/// Returns [`Error::CronSecretMissing`] when no secret is configured and
/// [`Error::Unauthorized`] when the header is absent or does not match.
pub fn authorize(header: Option<&str>, secret: Option<&str>) -> Result<()> {
    let secret = secret
        .filter(|s| !s.is_empty())
        .ok_or(Error::CronSecretMissing)?;
    let token = header.and_then(bearer_token).ok_or(Error::Unauthorized)?;

    if blake3::hash(token.as_bytes()) == blake3::hash(secret.as_bytes()) {
        Ok(())
    } else {
        Err(Error::Unauthorized)
    }
}

#[derive(Serialize)]
struct ErrorBody {
    error: &'static str,
    message: String,
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let (status, code) = match &self {
            Self::Unauthorized => (StatusCode::UNAUTHORIZED, "unauthorized"),
            Self::CronSecretMissing => (StatusCode::SERVICE_UNAVAILABLE, "not_configured"),
            Self::NotFound { .. } => (StatusCode::NOT_FOUND, "not_found"),
            _ => (StatusCode::INTERNAL_SERVER_ERROR, "internal_error"),
        };
        if self.is_unauthorized() {
            warn!(error = %self, "rejected cron invocation");
        } else if status.is_server_error() {
            error!(error = %self, "cron request failed");
        }
        let body = ErrorBody {
            error: code,
            message: self.to_string(),
        };
        (status, Json(body)).into_response()
    }
}

/// Build the router: `/health` and the sweep endpoint (GET or POST).
pub fn router(state: CronState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route(EXPIRY_ALERTS_PATH, get(expiry_alerts).post(expiry_alerts))
        .with_state(state)
}

async fn health() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok" }))
}

async fn expiry_alerts(
    State(state): State<CronState>,
    headers: HeaderMap,
) -> std::result::Result<Json<SweepReport>, Error> {
    let header = headers.get(AUTHORIZATION).and_then(|v| v.to_str().ok());
    authorize(header, state.secret.as_deref())?;

    let now = Utc::now();
    let today = now.date_naive();
    let store = state.store();
    let settings = state.settings.clone();

    let report = tokio::task::spawn_blocking(move || {
        let store = store
            .lock()
            .map_err(|_| Error::internal("storage lock poisoned"))?;
        Ok::<_, Error>(run_sweep(&*store, &settings, today, now))
    })
    .await
    .map_err(|e| Error::internal(format!("sweep task failed: {e}")))??;

    Ok(Json(report))
}

/// Serve the cron router on `addr` until Ctrl-C.
///
/// # Errors
///
/// Returns an error if the address cannot be bound or the server fails.
pub async fn serve(state: CronState, addr: SocketAddr) -> Result<()> {
    if state.secret.is_none() {
        warn!("no cron secret configured; sweep requests will be refused");
    }
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!("Listening on {}", addr);

    axum::serve(listener, router(state))
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            info!("Shutting down");
        })
        .await?;
    Ok(())
}
