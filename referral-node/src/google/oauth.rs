//! OAuth consent flow for the contacts scope.

use chrono::Utc;
use reqwest::Client;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use super::credentials::{request_token, AuthorizedUser, CredentialError, CredentialStore, DEFAULT_TOKEN_URI};

pub const CONTACTS_SCOPE: &str = "https://www.googleapis.com/auth/contacts.readonly";

const DEFAULT_AUTH_URI: &str = "https://accounts.google.com/o/oauth2/auth";

/// One OAuth client from a client-secrets file.
#[derive(Debug, Clone, Deserialize)]
pub struct ClientSecrets {
    pub client_id: String,
    pub client_secret: String,
    #[serde(default = "default_auth_uri")]
    pub auth_uri: String,
    #[serde(default = "default_token_uri")]
    pub token_uri: String,
}

fn default_auth_uri() -> String {
    DEFAULT_AUTH_URI.to_string()
}

fn default_token_uri() -> String {
    DEFAULT_TOKEN_URI.to_string()
}

/// The console wraps the client in `web` or `installed`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "lowercase")]
enum SecretsFile {
    Web(ClientSecrets),
    Installed(ClientSecrets),
}

impl ClientSecrets {
    pub fn from_json(bytes: &[u8]) -> Result<Self, CredentialError> {
        Ok(match serde_json::from_slice::<SecretsFile>(bytes)? {
            SecretsFile::Web(secrets) | SecretsFile::Installed(secrets) => secrets,
        })
    }

    pub async fn load(path: &Path) -> Result<Self, CredentialError> {
        Self::from_json(&tokio::fs::read(path).await?)
    }

    /// Consent page URL requesting offline access, so the callback
    /// receives a refresh token.
    pub fn consent_url(&self, redirect_url: &str) -> String {
        format!(
            "{}?response_type=code&client_id={}&redirect_uri={}&scope={}&access_type=offline&prompt=consent&include_granted_scopes=true",
            self.auth_uri,
            urlencoding::encode(&self.client_id),
            urlencoding::encode(redirect_url),
            urlencoding::encode(CONTACTS_SCOPE),
        )
    }
}

/// Consent flow wiring shared by the `/auth` and `/oauth2callback` routes.
pub struct OAuthFlow {
    client: Client,
    secrets_file: PathBuf,
    redirect_url: String,
    credentials: Arc<CredentialStore>,
}

impl OAuthFlow {
    pub fn new(
        secrets_file: impl Into<PathBuf>,
        redirect_url: impl Into<String>,
        credentials: Arc<CredentialStore>,
    ) -> Self {
        Self {
            client: Client::new(),
            secrets_file: secrets_file.into(),
            redirect_url: redirect_url.into(),
            credentials,
        }
    }

    pub async fn consent_url(&self) -> Result<String, CredentialError> {
        let secrets = ClientSecrets::load(&self.secrets_file).await?;
        Ok(secrets.consent_url(&self.redirect_url))
    }

    /// Trade an authorization code for tokens and write the token file.
    pub async fn complete(&self, code: &str) -> Result<AuthorizedUser, CredentialError> {
        let secrets = ClientSecrets::load(&self.secrets_file).await?;
        let params = [
            ("grant_type", "authorization_code"),
            ("code", code),
            ("client_id", secrets.client_id.as_str()),
            ("client_secret", secrets.client_secret.as_str()),
            ("redirect_uri", self.redirect_url.as_str()),
        ];
        let response = request_token(&self.client, &secrets.token_uri, &params).await?;

        let mut creds = AuthorizedUser {
            token_uri: secrets.token_uri.clone(),
            client_id: secrets.client_id.clone(),
            client_secret: secrets.client_secret.clone(),
            scopes: vec![CONTACTS_SCOPE.to_string()],
            ..Default::default()
        };
        creds.apply_token_response(response, Utc::now());
        self.credentials.save(&creds).await?;
        tracing::info!(path = %self.credentials.path().display(), "Stored Google credentials from consent flow");
        Ok(creds)
    }
}
