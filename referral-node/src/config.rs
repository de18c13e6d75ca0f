//! Node configuration
//!
//! A TOML file gives the base values; CLI flags and environment variables
//! override the deployment-specific ones (port, secrets, GitHub target).

use chrono::{DateTime, Utc};
use clap::Parser;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::num::{NonZeroU32, NonZeroUsize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use referral_core::store::StoreKeys;
use referral_core::{LinkTable, ReferralSettings};

#[derive(Parser, Debug, Clone, Default)]
#[command(name = "referral-node")]
#[command(about = "Referral tally service", long_about = None)]
pub struct Cli {
    /// Path to config file
    #[arg(short, long, default_value = "referral-node.toml")]
    pub config: PathBuf,

    /// Data directory for the JSON documents
    #[arg(long, env = "REFERRAL_DATA_DIR")]
    pub data_dir: Option<PathBuf>,

    /// HTTP listen port
    #[arg(long, env = "PORT")]
    pub port: Option<u16>,

    /// Key guarding sync and link repair
    #[arg(long, env = "ADMIN_KEY")]
    pub admin_key: Option<String>,

    /// Password guarding registration and snapshots
    #[arg(long, env = "ADMIN_PASSWORD")]
    pub admin_password: Option<String>,

    /// GitHub token for the replicated store
    #[arg(long, env = "GITHUB_PAT")]
    pub github_token: Option<String>,

    /// GitHub repository, `owner/name`
    #[arg(long, env = "GITHUB_REPO")]
    pub github_repo: Option<String>,

    #[arg(long, env = "GITHUB_BRANCH")]
    pub github_branch: Option<String>,

    /// Seconds between background sync passes
    #[arg(long, env = "UPDATE_INTERVAL")]
    pub update_interval_secs: Option<u64>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub sync: SyncConfig,
    pub registry: RegistryConfig,
    pub storage: StorageConfig,
    pub github: GithubSection,
    pub google: GoogleConfig,
    pub admin: AdminConfig,
    pub links: LinkTable,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self { port: 5000 }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    pub update_interval_secs: u64,
    /// How long a read waits for its refresh before serving stored counts
    pub read_refresh_timeout_secs: u64,
    pub provider_timeout_secs: u64,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            update_interval_secs: default_update_interval(),
            read_refresh_timeout_secs: default_request_timeout(),
            provider_timeout_secs: default_request_timeout(),
        }
    }
}

fn default_update_interval() -> u64 {
    300
}

fn default_request_timeout() -> u64 {
    20
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RegistryConfig {
    pub teams_per_group: NonZeroU32,
    pub solo_count: NonZeroU32,
    pub team_goal: u64,
    /// Goal overrides keyed by team number
    pub team_goals: BTreeMap<String, u64>,
    pub solo_goal: u64,
    pub contest_start: DateTime<Utc>,
    pub contest_duration_days: u32,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        let settings = ReferralSettings::default();
        Self {
            teams_per_group: settings.teams_per_group,
            solo_count: settings.solo_count,
            team_goal: settings.team_goal,
            team_goals: settings.team_goals,
            solo_goal: settings.solo_goal,
            contest_start: settings.contest_start,
            contest_duration_days: settings.contest_duration_days,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub data_dir: PathBuf,
    pub roster_file: String,
    pub aggregate_file: String,
    pub history_file: String,
    pub history_cap: NonZeroUsize,
}

impl Default for StorageConfig {
    fn default() -> Self {
        let keys = StoreKeys::default();
        Self {
            data_dir: PathBuf::from("./data"),
            roster_file: keys.roster,
            aggregate_file: keys.aggregate,
            history_file: keys.history,
            history_cap: ReferralSettings::default().history_cap,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GithubSection {
    pub token: Option<String>,
    pub repo: Option<String>,
    pub branch: String,
}

impl Default for GithubSection {
    fn default() -> Self {
        Self {
            token: None,
            repo: None,
            branch: "master".to_string(),
        }
    }
}

impl GithubSection {
    /// Token and repo, when both are set and non-empty.
    pub fn target(&self) -> Option<(&str, &str)> {
        let token = self.token.as_deref().filter(|t| !t.is_empty())?;
        let repo = self.repo.as_deref().filter(|r| !r.is_empty())?;
        Some((token, repo))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GoogleConfig {
    /// Authorized-user token written by the consent flow
    pub token_file: PathBuf,
    /// OAuth client secrets downloaded from the console
    pub client_secrets_file: PathBuf,
    /// Callback registered with the OAuth client
    pub redirect_url: String,
    pub page_size: u32,
    /// Overridable for tests
    pub people_api_base: String,
}

impl Default for GoogleConfig {
    fn default() -> Self {
        Self {
            token_file: PathBuf::from("token.json"),
            client_secrets_file: PathBuf::from("credentials.json"),
            redirect_url: "http://localhost:5000/oauth2callback".to_string(),
            page_size: 1000,
            people_api_base: "https://people.googleapis.com/v1".to_string(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AdminConfig {
    pub admin_key: Option<String>,
    pub admin_password: Option<String>,
}

impl Config {
    /// Load from `path`, or defaults when the file does not exist.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        if path.exists() {
            let content = std::fs::read_to_string(path)?;
            Ok(toml::from_str(&content)?)
        } else {
            tracing::info!(path = %path.display(), "Config file not found, using defaults");
            Ok(Self::default())
        }
    }

    /// Apply CLI flags and environment overrides.
    pub fn apply_cli(&mut self, cli: &Cli) {
        if let Some(ref dir) = cli.data_dir {
            self.storage.data_dir = dir.clone();
        }
        if let Some(port) = cli.port {
            self.server.port = port;
        }
        if let Some(ref key) = cli.admin_key {
            self.admin.admin_key = Some(key.clone());
        }
        if let Some(ref password) = cli.admin_password {
            self.admin.admin_password = Some(password.clone());
        }
        if let Some(ref token) = cli.github_token {
            self.github.token = Some(token.clone());
        }
        if let Some(ref repo) = cli.github_repo {
            self.github.repo = Some(repo.clone());
        }
        if let Some(ref branch) = cli.github_branch {
            self.github.branch = branch.clone();
        }
        if let Some(secs) = cli.update_interval_secs {
            self.sync.update_interval_secs = secs;
        }
    }

    /// Settings handed to the referral service.
    pub fn referral_settings(&self) -> ReferralSettings {
        ReferralSettings {
            teams_per_group: self.registry.teams_per_group,
            solo_count: self.registry.solo_count,
            team_goal: self.registry.team_goal,
            team_goals: self.registry.team_goals.clone(),
            solo_goal: self.registry.solo_goal,
            contest_start: self.registry.contest_start,
            contest_duration_days: self.registry.contest_duration_days,
            history_cap: self.storage.history_cap,
            links: self.links.clone(),
        }
    }

    pub fn store_keys(&self) -> StoreKeys {
        StoreKeys {
            roster: self.storage.roster_file.clone(),
            aggregate: self.storage.aggregate_file.clone(),
            history: self.storage.history_file.clone(),
        }
    }

    pub fn update_interval(&self) -> Duration {
        Duration::from_secs(self.sync.update_interval_secs.max(1))
    }

    pub fn read_refresh_timeout(&self) -> Duration {
        Duration::from_secs(self.sync.read_refresh_timeout_secs)
    }

    pub fn provider_timeout(&self) -> Duration {
        Duration::from_secs(self.sync.provider_timeout_secs)
    }
}
