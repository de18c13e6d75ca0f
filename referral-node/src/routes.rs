//! HTTP handlers
//!
//! Thin adapters over [`ReferralService`]: pull secrets out of the query,
//! form body or headers, call the operation, return JSON.

use axum::{
    body::Bytes,
    extract::{Path, Query, State},
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Json, Redirect, Response},
};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::json;
use tracing::{info, warn};

use referral_core::service::{Leaderboard, LinkRepair, ProgressView, RegistrationForm, SnapshotResult};
use referral_core::{DailyReport, RegisteredUser, SyncOutcome};

use crate::error::ApiError;
use crate::server::AppState;

pub const ADMIN_KEY_HEADER: &str = "x-admin-key";
pub const ADMIN_PASSWORD_HEADER: &str = "x-admin-password";

#[derive(Debug, Default, Deserialize)]
pub struct KeyQuery {
    pub key: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct PasswordQuery {
    pub admin_password: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct CallbackQuery {
    pub code: Option<String>,
    pub error: Option<String>,
}

#[derive(Serialize)]
pub struct RegisterResponse {
    pub status: &'static str,
    pub progress_url: String,
    pub user: RegisteredUser,
}

/// Query value first, then the header.
fn secret_from(query: Option<String>, headers: &HeaderMap, name: &str) -> Option<String> {
    query.or_else(|| {
        headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string)
    })
}

/// Optional urlencoded body of an admin POST. An empty or unparseable body
/// carries no secret.
fn admin_form<T: DeserializeOwned + Default>(headers: &HeaderMap, body: &[u8]) -> T {
    if body.is_empty() || is_json(headers) {
        return T::default();
    }
    serde_urlencoded::from_bytes(body).unwrap_or_default()
}

fn is_json(headers: &HeaderMap) -> bool {
    headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|ct| ct.starts_with("application/json"))
}

/// Health check endpoint
pub async fn health() -> impl IntoResponse {
    "OK"
}

/// POST /register, as a form post or JSON
pub async fn register(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Response, ApiError> {
    let mut form: RegistrationForm = if is_json(&headers) {
        serde_json::from_slice(&body).map_err(|e| ApiError::BadRequest(e.to_string()))?
    } else {
        serde_urlencoded::from_bytes(&body).map_err(|e| ApiError::BadRequest(e.to_string()))?
    };
    form.admin_password = secret_from(form.admin_password.take(), &headers, ADMIN_PASSWORD_HEADER);

    let registration = state.service.register(form).await?;
    let (status, label) = if registration.is_new() {
        (StatusCode::CREATED, "created")
    } else {
        (StatusCode::OK, "existing")
    };
    let user = registration.into_user();

    let body = RegisterResponse {
        status: label,
        progress_url: format!("/progress/{}", user.referral_id),
        user,
    };
    Ok((status, Json(body)).into_response())
}

/// GET /progress/:ref_id
pub async fn progress(
    State(state): State<AppState>,
    Path(ref_id): Path<String>,
) -> Result<Json<ProgressView>, ApiError> {
    Ok(Json(state.service.progress(&ref_id).await?))
}

/// GET /public
pub async fn public_leaderboard(State(state): State<AppState>) -> Result<Json<Leaderboard>, ApiError> {
    Ok(Json(state.service.leaderboard().await?))
}

/// GET|POST /sync-now
pub async fn sync_now(
    State(state): State<AppState>,
    Query(query): Query<KeyQuery>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<SyncOutcome>, ApiError> {
    let form: KeyQuery = admin_form(&headers, &body);
    let key = secret_from(query.key.or(form.key), &headers, ADMIN_KEY_HEADER);
    let outcome = state.service.run_aggregation_now(key.as_deref()).await?;
    info!(outcome = ?outcome, "Manual sync requested");
    Ok(Json(outcome))
}

/// GET|POST /migrate-team-links
pub async fn migrate_team_links(
    State(state): State<AppState>,
    Query(query): Query<KeyQuery>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<LinkRepair>, ApiError> {
    let form: KeyQuery = admin_form(&headers, &body);
    let key = secret_from(query.key.or(form.key), &headers, ADMIN_KEY_HEADER);
    Ok(Json(state.service.migrate_team_links(key.as_deref()).await?))
}

/// GET /daily-progress
pub async fn daily_progress(State(state): State<AppState>) -> Result<Json<DailyReport>, ApiError> {
    Ok(Json(state.service.daily_history().await?))
}

/// POST /daily-progress/snapshot
pub async fn snapshot_now(
    State(state): State<AppState>,
    Query(query): Query<PasswordQuery>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<SnapshotResult>, ApiError> {
    let form: PasswordQuery = admin_form(&headers, &body);
    let password = secret_from(query.admin_password.or(form.admin_password), &headers, ADMIN_PASSWORD_HEADER);
    Ok(Json(state.service.snapshot_now(password.as_deref()).await?))
}

// === Consent flow ===

/// GET /auth
pub async fn auth(State(state): State<AppState>) -> Result<Redirect, ApiError> {
    let oauth = state.oauth.as_ref().ok_or(ApiError::OAuthDisabled)?;
    Ok(Redirect::temporary(&oauth.consent_url().await?))
}

/// GET /oauth2callback
pub async fn oauth2callback(
    State(state): State<AppState>,
    Query(query): Query<CallbackQuery>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let oauth = state.oauth.as_ref().ok_or(ApiError::OAuthDisabled)?;

    if let Some(error) = query.error {
        warn!(error = %error, "Consent was not granted");
        return Err(ApiError::BadRequest(format!("consent denied: {}", error)));
    }
    let code = query
        .code
        .filter(|c| !c.is_empty())
        .ok_or_else(|| ApiError::BadRequest("missing authorization code".to_string()))?;

    oauth.complete(&code).await?;
    let sync = state.service.run_aggregation().await;
    info!(outcome = ?sync, "Initial sync after connecting Google contacts");

    Ok(Json(json!({ "status": "connected", "sync": sync })))
}
