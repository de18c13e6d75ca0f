//! Authorized-user token file.
//!
//! Same layout the Google client libraries write (`token`, `refresh_token`,
//! `token_uri`, `client_id`, `client_secret`, `expiry`), so a file produced
//! by either side can be read by the other. Unknown fields are kept.

use chrono::{DateTime, Duration as ChronoDuration, NaiveDateTime, SecondsFormat, Utc};
use reqwest::Client;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Map, Value};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

pub const DEFAULT_TOKEN_URI: &str = "https://oauth2.googleapis.com/token";

const REFRESH_TIMEOUT: Duration = Duration::from_secs(15);

/// Tokens this close to expiry are refreshed early.
const EXPIRY_SKEW_SECS: i64 = 60;

#[derive(Debug, thiserror::Error)]
pub enum CredentialError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid token file: {0}")]
    Json(#[from] serde_json::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Token endpoint rejected request: {0}")]
    Rejected(String),

    #[error("No refresh token stored")]
    NoRefreshToken,
}

/// Stored OAuth credentials for one Google account.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AuthorizedUser {
    #[serde(default)]
    pub token: Option<String>,
    #[serde(default)]
    pub refresh_token: Option<String>,
    #[serde(default = "default_token_uri")]
    pub token_uri: String,
    #[serde(default)]
    pub client_id: String,
    #[serde(default)]
    pub client_secret: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub scopes: Vec<String>,
    #[serde(
        default,
        deserialize_with = "lenient_expiry",
        serialize_with = "write_expiry"
    )]
    pub expiry: Option<DateTime<Utc>>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

fn default_token_uri() -> String {
    DEFAULT_TOKEN_URI.to_string()
}

/// RFC 3339, or a naive timestamp taken as UTC. Anything else reads as
/// unknown expiry.
fn lenient_expiry<'de, D>(deserializer: D) -> Result<Option<DateTime<Utc>>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<String>::deserialize(deserializer)?;
    Ok(raw.as_deref().and_then(parse_expiry))
}

fn parse_expiry(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(raw.trim_end_matches('Z'), "%Y-%m-%dT%H:%M:%S%.f")
        .ok()
        .map(|naive| naive.and_utc())
}

fn write_expiry<S>(expiry: &Option<DateTime<Utc>>, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    match expiry {
        Some(dt) => serializer.serialize_str(&dt.to_rfc3339_opts(SecondsFormat::Micros, true)),
        None => serializer.serialize_none(),
    }
}

/// Token endpoint response, for both code exchange and refresh.
#[derive(Debug, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    #[serde(default)]
    pub expires_in: Option<i64>,
    #[serde(default)]
    pub refresh_token: Option<String>,
    #[serde(default)]
    pub scope: Option<String>,
}

impl AuthorizedUser {
    /// True when there is no access token or it is about to expire.
    pub fn needs_refresh(&self, now: DateTime<Utc>) -> bool {
        match (&self.token, self.expiry) {
            (None, _) => true,
            (Some(_), Some(expiry)) => expiry <= now + ChronoDuration::seconds(EXPIRY_SKEW_SECS),
            (Some(_), None) => false,
        }
    }

    /// Fold a token response in. A response without a refresh token keeps
    /// the stored one.
    pub fn apply_token_response(&mut self, response: TokenResponse, now: DateTime<Utc>) {
        self.token = Some(response.access_token);
        self.expiry = response
            .expires_in
            .map(|secs| now + ChronoDuration::seconds(secs));
        if let Some(refresh) = response.refresh_token {
            self.refresh_token = Some(refresh);
        }
        if let Some(scope) = response.scope {
            self.scopes = scope.split_whitespace().map(str::to_string).collect();
        }
    }
}

/// The token file plus refresh logic. Refreshes are serialised so two
/// concurrent callers do not both spend the refresh token.
pub struct CredentialStore {
    path: PathBuf,
    client: Client,
    lock: Mutex<()>,
}

impl CredentialStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            client: Client::new(),
            lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// `None` when no token file exists yet.
    pub async fn load(&self) -> Result<Option<AuthorizedUser>, CredentialError> {
        match tokio::fs::read(&self.path).await {
            Ok(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    pub async fn save(&self, creds: &AuthorizedUser) -> Result<(), CredentialError> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(&self.path, serde_json::to_vec_pretty(creds)?).await?;
        debug!(path = %self.path.display(), "Saved credentials");
        Ok(())
    }

    /// Load the stored credentials, refreshing and rewriting them when the
    /// access token has expired. `None` means there is nothing usable.
    pub async fn refresh_if_expired(&self) -> Option<AuthorizedUser> {
        let _guard = self.lock.lock().await;

        let mut creds = match self.load().await {
            Ok(Some(creds)) => creds,
            Ok(None) => return None,
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "Failed to load credentials");
                return None;
            }
        };

        let now = Utc::now();
        if !creds.needs_refresh(now) {
            return Some(creds);
        }

        match self.refresh(&creds).await {
            Ok(response) => {
                creds.apply_token_response(response, now);
                if let Err(e) = self.save(&creds).await {
                    warn!(path = %self.path.display(), error = %e, "Failed to save refreshed credentials");
                }
                info!(path = %self.path.display(), "Refreshed Google credentials");
                Some(creds)
            }
            Err(e) => {
                warn!(error = %e, "Failed to refresh credentials");
                None
            }
        }
    }

    async fn refresh(&self, creds: &AuthorizedUser) -> Result<TokenResponse, CredentialError> {
        let refresh_token = creds
            .refresh_token
            .as_deref()
            .filter(|t| !t.is_empty())
            .ok_or(CredentialError::NoRefreshToken)?;

        let params = [
            ("grant_type", "refresh_token"),
            ("refresh_token", refresh_token),
            ("client_id", creds.client_id.as_str()),
            ("client_secret", creds.client_secret.as_str()),
        ];
        request_token(&self.client, &creds.token_uri, &params).await
    }
}

/// POST a form to a token endpoint.
pub(crate) async fn request_token(
    client: &Client,
    token_uri: &str,
    params: &[(&str, &str)],
) -> Result<TokenResponse, CredentialError> {
    let response = client
        .post(token_uri)
        .timeout(REFRESH_TIMEOUT)
        .form(params)
        .send()
        .await?;

    let status = response.status();
    if !status.is_success() {
        let text = response.text().await.unwrap_or_default();
        return Err(CredentialError::Rejected(format!("{}: {}", status, text)));
    }
    Ok(response.json().await?)
}
