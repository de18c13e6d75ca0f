//! Google People API contacts provider.

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

use referral_core::{ContactRecord, ContactsProvider, ProviderError};

use super::credentials::CredentialStore;

const PERSON_FIELDS: &str = "names,emailAddresses,organizations,biographies,userDefined";

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ConnectionsPage {
    #[serde(default)]
    connections: Vec<ContactRecord>,
    #[serde(default)]
    next_page_token: Option<String>,
}

/// Lists the signed-in account's connections, every page.
pub struct PeopleApiProvider {
    client: Client,
    credentials: Arc<CredentialStore>,
    base_url: String,
    page_size: u32,
    request_timeout: Duration,
}

impl PeopleApiProvider {
    pub fn new(credentials: Arc<CredentialStore>, base_url: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            credentials,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            page_size: 1000,
            request_timeout: Duration::from_secs(20),
        }
    }

    pub fn with_page_size(mut self, page_size: u32) -> Self {
        self.page_size = page_size.max(1);
        self
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    async fn fetch_page(&self, access_token: &str, page_token: Option<&str>) -> Result<ConnectionsPage, ProviderError> {
        let url = format!("{}/people/me/connections", self.base_url);
        let page_size = self.page_size.to_string();
        let mut query = vec![("personFields", PERSON_FIELDS), ("pageSize", page_size.as_str())];
        if let Some(token) = page_token {
            query.push(("pageToken", token));
        }

        let response = self
            .client
            .get(&url)
            .bearer_auth(access_token)
            .query(&query)
            .timeout(self.request_timeout)
            .send()
            .await
            .map_err(request_error)?;

        let status = response.status();
        if status == StatusCode::UNAUTHORIZED {
            return Err(ProviderError::NoCredentials);
        }
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(ProviderError::Transient(format!("People API error {}: {}", status, text)));
        }

        let bytes = response.bytes().await.map_err(request_error)?;
        serde_json::from_slice(&bytes).map_err(|e| ProviderError::Parse(e.to_string()))
    }
}

fn request_error(e: reqwest::Error) -> ProviderError {
    if e.is_timeout() {
        ProviderError::Timeout(e.to_string())
    } else {
        ProviderError::Transient(e.to_string())
    }
}

#[async_trait]
impl ContactsProvider for PeopleApiProvider {
    fn id(&self) -> &str {
        "google-people"
    }

    async fn list_contacts(&self) -> Result<Vec<ContactRecord>, ProviderError> {
        let creds = self
            .credentials
            .refresh_if_expired()
            .await
            .ok_or(ProviderError::NoCredentials)?;
        let access_token = creds
            .token
            .filter(|t| !t.is_empty())
            .ok_or(ProviderError::NoCredentials)?;

        let mut contacts = Vec::new();
        let mut page_token: Option<String> = None;
        let mut pages = 0usize;

        loop {
            let page = self.fetch_page(&access_token, page_token.as_deref()).await?;
            pages += 1;
            debug!(page = pages, count = page.connections.len(), "Fetched connections page");
            contacts.extend(page.connections);

            match page.next_page_token.filter(|t| !t.is_empty()) {
                Some(next) if page_token.as_deref() != Some(next.as_str()) => page_token = Some(next),
                _ => break,
            }
        }

        info!(contacts = contacts.len(), pages, "Listed Google contacts");
        Ok(contacts)
    }
}
