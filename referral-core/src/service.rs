//! ReferralService - the operations the HTTP layer exposes.
//!
//! Composes the roster, the aggregator and the history tracker over a
//! [`ReferralStore`] and a [`ContactsProvider`].

use chrono::{NaiveDate, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};

use crate::admin::AdminGuard;
use crate::aggregate::aggregate;
use crate::history::{build_snapshot, DailySnapshot};
use crate::label::{ref_label, LabelError, RegistrationKind, ALL_GROUP};
use crate::labelset::build_label_set;
use crate::provider::{ContactsProvider, ProviderError};
use crate::report::DailyReport;
use crate::roster::{RegisteredUser, Registration};
use crate::settings::ReferralSettings;
use crate::standings::{LabelEntry, ReferralAggregate, Standing};
use crate::store::{ReferralStore, ReplicaStatus, StoreError};

/// Error types for the service.
#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    /// Wrong or missing admin secret
    #[error("Forbidden: {0}")]
    Forbidden(String),

    /// Unknown referral id
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Name must not be empty")]
    EmptyName,

    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Label error: {0}")]
    Label(#[from] LabelError),
}

/// Result of one aggregation pass.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "kebab-case")]
pub enum SyncOutcome {
    /// Aggregate replaced
    Ok {
        groups: usize,
        #[serde(skip_serializing_if = "Option::is_none")]
        replica_error: Option<String>,
    },
    /// Provider has no credentials yet; stored aggregate untouched
    NoCredentials,
    /// Pass failed; stored aggregate untouched
    Error { message: String },
}

impl SyncOutcome {
    pub fn is_ok(&self) -> bool {
        matches!(self, Self::Ok { .. })
    }

    fn error(message: impl Into<String>) -> Self {
        Self::Error {
            message: message.into(),
        }
    }
}

/// Registration input as posted by the form.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct RegistrationForm {
    pub name: String,
    pub registration_type: Option<String>,
    pub admin_password: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ProgressView {
    pub user: RegisteredUser,
    pub team_label: String,
    pub team_info: LabelEntry,
    /// Group whose peers are listed
    pub group: String,
    pub group_teams: Vec<Standing>,
    pub referral_goal: u64,
    /// ISO-8601, UTC
    pub contest_end: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub refresh: Option<SyncOutcome>,
}

#[derive(Debug, Clone, Serialize)]
pub struct Leaderboard {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub refresh: Option<SyncOutcome>,
    pub groups: BTreeMap<String, Vec<Standing>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LinkRepair {
    pub status: &'static str,
    pub updated: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SnapshotResult {
    pub ok: bool,
    pub reason: &'static str,
    pub date: NaiveDate,
}

/// Entry point for every referral operation.
#[derive(Clone)]
pub struct ReferralService {
    settings: Arc<ReferralSettings>,
    store: Arc<ReferralStore>,
    provider: Arc<dyn ContactsProvider>,
    guard: AdminGuard,
    /// Bound on one contacts listing
    provider_timeout: Duration,
    /// How long a read path waits for its refresh
    refresh_timeout: Duration,
}

impl ReferralService {
    pub fn new(
        settings: Arc<ReferralSettings>,
        store: Arc<ReferralStore>,
        provider: Arc<dyn ContactsProvider>,
        guard: AdminGuard,
    ) -> Self {
        Self {
            settings,
            store,
            provider,
            guard,
            provider_timeout: Duration::from_secs(20),
            refresh_timeout: Duration::from_secs(20),
        }
    }

    pub fn with_provider_timeout(mut self, timeout: Duration) -> Self {
        self.provider_timeout = timeout;
        self
    }

    pub fn with_refresh_timeout(mut self, timeout: Duration) -> Self {
        self.refresh_timeout = timeout;
        self
    }

    pub fn settings(&self) -> &ReferralSettings {
        &self.settings
    }

    pub fn store(&self) -> &ReferralStore {
        &self.store
    }

    pub fn guard(&self) -> &AdminGuard {
        &self.guard
    }

    /// Recount every label from the full contact list and replace the
    /// stored aggregate. On any failure the stored aggregate is untouched.
    pub async fn run_aggregation(&self) -> SyncOutcome {
        let contacts = match tokio::time::timeout(self.provider_timeout, self.provider.list_contacts()).await {
            Ok(Ok(contacts)) => contacts,
            Ok(Err(ProviderError::NoCredentials)) => {
                info!(provider = self.provider.id(), "No contacts credentials yet, visit /auth to connect");
                return SyncOutcome::NoCredentials;
            }
            Ok(Err(e)) => {
                error!(provider = self.provider.id(), error = %e, "Failed to list contacts");
                return SyncOutcome::error(e.to_string());
            }
            Err(_) => {
                error!(provider = self.provider.id(), timeout = ?self.provider_timeout, "Contacts listing timed out");
                return SyncOutcome::error(format!(
                    "contacts listing timed out after {}s",
                    self.provider_timeout.as_secs()
                ));
            }
        };

        let roster = match self.store.load_roster().await {
            Ok(roster) => roster,
            Err(e) => {
                error!(error = %e, "Failed to load roster for aggregation");
                return SyncOutcome::error(e.to_string());
            }
        };

        let labels = build_label_set(roster.users(), self.settings.solo_count);
        let contact_count = contacts.len();
        let label_count = labels.len();

        // Matching is CPU-bound; keep it off the async workers
        let counts = match tokio::task::spawn_blocking(move || aggregate(&contacts, &labels)).await {
            Ok(Ok(counts)) => counts,
            Ok(Err(e)) => {
                error!(error = %e, "Invalid label in roster");
                return SyncOutcome::error(e.to_string());
            }
            Err(e) => {
                error!(error = %e, "Aggregation task failed");
                return SyncOutcome::error(e.to_string());
            }
        };

        let mut fresh = ReferralAggregate::from_counts(&counts);
        match self.store.replace_aggregate(&mut fresh).await {
            Ok(report) => {
                info!(
                    contacts = contact_count,
                    labels = label_count,
                    groups = fresh.group_count(),
                    "Referral counts synced from contacts"
                );
                SyncOutcome::Ok {
                    groups: fresh.group_count(),
                    replica_error: match report.replica {
                        ReplicaStatus::Failed(e) => Some(e),
                        _ => None,
                    },
                }
            }
            Err(e) => {
                error!(error = %e, "Failed to save referral counts");
                SyncOutcome::error(e.to_string())
            }
        }
    }

    /// Admin-triggered aggregation.
    pub async fn run_aggregation_now(&self, key: Option<&str>) -> Result<SyncOutcome, ServiceError> {
        if !self.guard.check_key(key) {
            return Err(ServiceError::Forbidden("invalid admin key".to_string()));
        }
        Ok(self.run_aggregation().await)
    }

    /// Refresh before serving a read. Never fails: on error or timeout the
    /// caller serves whatever is stored. A timed-out pass keeps running in
    /// the background so its write is never cut short.
    pub async fn refresh_best_effort(&self) -> Option<SyncOutcome> {
        let service = self.clone();
        let task = tokio::spawn(async move { service.run_aggregation().await });

        match tokio::time::timeout(self.refresh_timeout, task).await {
            Ok(Ok(outcome)) => {
                if !outcome.is_ok() {
                    debug!(outcome = ?outcome, "Read-path refresh did not update counts");
                }
                Some(outcome)
            }
            Ok(Err(e)) => {
                warn!(error = %e, "Read-path refresh task failed");
                None
            }
            Err(_) => {
                warn!(timeout = ?self.refresh_timeout, "Read-path refresh still running, serving stored counts");
                None
            }
        }
    }

    /// Register a user, or return the existing record for the same name.
    pub async fn register(&self, form: RegistrationForm) -> Result<Registration, ServiceError> {
        if !self.guard.check_password(form.admin_password.as_deref()) {
            return Err(ServiceError::Forbidden("invalid admin password".to_string()));
        }

        let name = form.name.trim().to_string();
        if name.is_empty() {
            return Err(ServiceError::EmptyName);
        }

        let kind = RegistrationKind::parse(form.registration_type.as_deref().unwrap_or("team"));
        if kind.is_none() {
            warn!(registration_type = ?form.registration_type, "Unknown registration type, assigning team 1");
        }

        let now = Utc::now().timestamp();
        let (registration, _) = self
            .store
            .modify_roster(|roster| {
                let registration = roster.register(&name, kind, &self.settings, now);
                let changed = registration.is_new();
                (registration, changed)
            })
            .await?;

        if let Registration::Created(user) = &registration {
            let spec = user.label_spec();
            self.store
                .modify_aggregate(|aggregate| {
                    let existed = aggregate.entry(&spec.group, &spec.entry_key()).is_some();
                    aggregate.ensure_entry(&spec);
                    ((), !existed)
                })
                .await?;
            info!(
                referral_id = %user.referral_id,
                label = %user.team_label(),
                kind = user.kind.as_str(),
                "Registered user"
            );
        }

        Ok(registration)
    }

    /// A user's own count, goal, and their group's standings.
    pub async fn progress(&self, referral_id: &str) -> Result<ProgressView, ServiceError> {
        let refresh = self.refresh_best_effort().await;

        let roster = self.store.load_roster().await?;
        let user = roster
            .find(referral_id)
            .cloned()
            .ok_or_else(|| ServiceError::NotFound(format!("Invalid referral ID: {}", referral_id)))?;
        let aggregate = self.store.load_aggregate().await?;
        let team_label = user.team_label();

        let (team_info, group, referral_goal) = match user.kind {
            RegistrationKind::Solo => {
                let number_label = ref_label(user.assigned_number);
                let candidates = [team_label.as_str(), user.referral_id.as_str(), number_label.as_str()];
                let entry = aggregate
                    .solo_entry(candidates)
                    .cloned()
                    .unwrap_or_else(|| LabelEntry::zero(team_label.clone()));
                (entry, user.label_spec().group, self.settings.solo_goal)
            }
            RegistrationKind::Team => {
                let entry = aggregate
                    .team_entry(user.group_key(), user.assigned_number)
                    .cloned()
                    .unwrap_or_else(|| LabelEntry::zero(team_label.clone()));
                let group = match aggregate.group(user.group_key()) {
                    Some(_) => user.group_key().to_string(),
                    None => ALL_GROUP.to_string(),
                };
                (entry, group, self.settings.goal_for_team(user.assigned_number))
            }
        };

        Ok(ProgressView {
            group_teams: aggregate.leaderboard(&group),
            team_label,
            team_info,
            group,
            referral_goal,
            contest_end: self
                .settings
                .contest_end()
                .to_rfc3339_opts(SecondsFormat::Secs, true),
            refresh,
            user,
        })
    }

    /// Every group's standings.
    pub async fn leaderboard(&self) -> Result<Leaderboard, ServiceError> {
        let refresh = self.refresh_best_effort().await;
        let aggregate = self.store.load_aggregate().await?;
        Ok(Leaderboard {
            refresh,
            groups: aggregate.leaderboards(),
        })
    }

    /// Fill missing cached links on team users.
    pub async fn migrate_team_links(&self, key: Option<&str>) -> Result<LinkRepair, ServiceError> {
        if !self.guard.check_key(key) {
            return Err(ServiceError::Forbidden("invalid admin key".to_string()));
        }

        let (updated, _) = self
            .store
            .modify_roster(|roster| {
                let updated = roster.repair_links(&self.settings.links);
                (updated, updated > 0)
            })
            .await?;

        info!(updated, "Repaired team links");
        Ok(LinkRepair { status: "ok", updated })
    }

    /// Snapshot of the current aggregate dated today (UTC).
    pub async fn build_today_snapshot(&self) -> Result<DailySnapshot, ServiceError> {
        let roster = self.store.load_roster().await?;
        let aggregate = self.store.load_aggregate().await?;
        Ok(build_snapshot(&aggregate, &roster, Utc::now().date_naive()))
    }

    /// Day-by-day table. An empty history is seeded with today first.
    pub async fn daily_history(&self) -> Result<DailyReport, ServiceError> {
        let mut history = self.store.load_history().await?;

        if history.is_empty() {
            let snapshot = self.build_today_snapshot().await?;
            let cap = self.settings.history_cap;
            let (seeded, _) = self
                .store
                .modify_history(|stored| {
                    let appended = stored.is_empty() && stored.append(snapshot, cap).accepted();
                    (stored.clone(), appended)
                })
                .await?;
            history = seeded;
        }

        let roster = self.store.load_roster().await?;
        let aggregate = self.store.load_aggregate().await?;
        Ok(DailyReport::build(&history, &aggregate, &roster))
    }

    /// Record today's snapshot now.
    pub async fn snapshot_now(&self, password: Option<&str>) -> Result<SnapshotResult, ServiceError> {
        if !self.guard.check_password(password) {
            return Err(ServiceError::Forbidden("invalid admin password".to_string()));
        }

        let snapshot = self.build_today_snapshot().await?;
        let date = snapshot.date;
        let cap = self.settings.history_cap;
        let (outcome, _) = self
            .store
            .modify_history(|history| {
                let outcome = history.append(snapshot, cap);
                (outcome, outcome.accepted())
            })
            .await?;

        info!(date = %date, reason = outcome.reason(), "Daily snapshot requested");
        Ok(SnapshotResult {
            ok: outcome.accepted(),
            reason: outcome.reason(),
            date,
        })
    }
}
