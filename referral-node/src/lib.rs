//! Referral Node - the always-on referral tally process
//!
//! Serves the HTTP API, runs the background sync against Google contacts,
//! and persists the referral documents to disk, optionally mirrored to a
//! GitHub repository.

pub mod config;
pub mod error;
pub mod google;
pub mod routes;
pub mod server;
pub mod updater;

use std::sync::Arc;
use tracing::{info, warn};

use referral_core::store::{FileBlobStore, GithubBlobStore, GithubConfig, ReplicatedBlobStore};
use referral_core::{AdminGuard, BlobStore, ReferralService, ReferralStore};

use config::Config;
use google::{CredentialStore, OAuthFlow, PeopleApiProvider};
use server::AppState;

/// Local files, mirrored to GitHub when a token and repo are configured.
pub fn build_blob_store(config: &Config) -> anyhow::Result<Arc<dyn BlobStore>> {
    let local = FileBlobStore::new(&config.storage.data_dir);

    let Some((token, repo)) = config.github.target() else {
        info!(data_dir = %config.storage.data_dir.display(), "Using local file store");
        return Ok(Arc::new(local));
    };

    let remote = GithubBlobStore::new(GithubConfig::new(token, repo, config.github.branch.clone()))?;
    info!(
        data_dir = %config.storage.data_dir.display(),
        repo = %repo,
        branch = %config.github.branch,
        "Using local file store mirrored to GitHub"
    );
    Ok(Arc::new(ReplicatedBlobStore::new(local, remote)))
}

/// Wire the store, the People provider and the consent flow into the
/// handler state.
pub fn build_state(config: &Config) -> anyhow::Result<AppState> {
    let store = Arc::new(ReferralStore::new(build_blob_store(config)?, config.store_keys()));
    let credentials = Arc::new(CredentialStore::new(&config.google.token_file));

    let provider = PeopleApiProvider::new(credentials.clone(), config.google.people_api_base.clone())
        .with_page_size(config.google.page_size)
        .with_request_timeout(config.provider_timeout());

    let guard = AdminGuard::new(config.admin.admin_key.clone(), config.admin.admin_password.clone());
    if !guard.has_key() {
        warn!("No admin key configured, sync and link repair are unprotected");
    }

    let service = ReferralService::new(
        Arc::new(config.referral_settings()),
        store,
        Arc::new(provider),
        guard,
    )
    .with_provider_timeout(config.provider_timeout())
    .with_refresh_timeout(config.read_refresh_timeout());

    let state = AppState::new(service);
    if config.google.client_secrets_file.exists() {
        Ok(state.with_oauth(Arc::new(OAuthFlow::new(
            &config.google.client_secrets_file,
            config.google.redirect_url.clone(),
            credentials,
        ))))
    } else {
        warn!(
            path = %config.google.client_secrets_file.display(),
            "Google client secrets not found, /auth is disabled"
        );
        Ok(state)
    }
}
