//! Typed access to the three referral documents.
//!
//! Each document has its own writer lock. Read-modify-write cycles hold it
//! from load to save so concurrent registrations cannot lose updates.
//! Lock order when both are needed: roster, then aggregate.

use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, warn};

use super::{BlobStore, StoreError, WriteReport};
use crate::history::History;
use crate::roster::Roster;
use crate::standings::ReferralAggregate;

/// Document names within the blob store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreKeys {
    pub roster: String,
    pub aggregate: String,
    pub history: String,
}

impl Default for StoreKeys {
    fn default() -> Self {
        Self {
            roster: "data.json".to_string(),
            aggregate: "referrals.json".to_string(),
            history: "daily_refs.json".to_string(),
        }
    }
}

pub struct ReferralStore {
    blobs: Arc<dyn BlobStore>,
    keys: StoreKeys,
    roster_lock: Mutex<()>,
    aggregate_lock: Mutex<()>,
    history_lock: Mutex<()>,
}

impl ReferralStore {
    pub fn new(blobs: Arc<dyn BlobStore>, keys: StoreKeys) -> Self {
        Self {
            blobs,
            keys,
            roster_lock: Mutex::new(()),
            aggregate_lock: Mutex::new(()),
            history_lock: Mutex::new(()),
        }
    }

    pub fn backend(&self) -> &str {
        self.blobs.id()
    }

    pub async fn load_roster(&self) -> Result<Roster, StoreError> {
        Ok(self.load(&self.keys.roster).await?.map(Roster::from_value).unwrap_or_default())
    }

    pub async fn load_aggregate(&self) -> Result<ReferralAggregate, StoreError> {
        Ok(self
            .load(&self.keys.aggregate)
            .await?
            .map(ReferralAggregate::from_value)
            .unwrap_or_default())
    }

    pub async fn load_history(&self) -> Result<History, StoreError> {
        Ok(self.load(&self.keys.history).await?.map(History::from_value).unwrap_or_default())
    }

    /// Apply `f` to the stored roster; saved only when `f` reports a change.
    pub async fn modify_roster<T, F>(&self, f: F) -> Result<(T, Option<WriteReport>), StoreError>
    where
        F: FnOnce(&mut Roster) -> (T, bool),
    {
        let _guard = self.roster_lock.lock().await;
        let mut roster = self.load_roster().await?;
        let (out, changed) = f(&mut roster);
        let report = if changed {
            Some(self.save(&self.keys.roster, &roster).await?)
        } else {
            None
        };
        Ok((out, report))
    }

    /// Apply `f` to the stored aggregate; saved only when `f` reports a change.
    pub async fn modify_aggregate<T, F>(&self, f: F) -> Result<(T, Option<WriteReport>), StoreError>
    where
        F: FnOnce(&mut ReferralAggregate) -> (T, bool),
    {
        let _guard = self.aggregate_lock.lock().await;
        let mut aggregate = self.load_aggregate().await?;
        let (out, changed) = f(&mut aggregate);
        let report = if changed {
            Some(self.save(&self.keys.aggregate, &aggregate).await?)
        } else {
            None
        };
        Ok((out, report))
    }

    /// Apply `f` to the stored history; saved only when `f` reports a change.
    pub async fn modify_history<T, F>(&self, f: F) -> Result<(T, Option<WriteReport>), StoreError>
    where
        F: FnOnce(&mut History) -> (T, bool),
    {
        let _guard = self.history_lock.lock().await;
        let mut history = self.load_history().await?;
        let (out, changed) = f(&mut history);
        let report = if changed {
            Some(self.save(&self.keys.history, &history).await?)
        } else {
            None
        };
        Ok((out, report))
    }

    /// Overwrite the aggregate with a freshly computed one. Users registered
    /// since the counts were taken still get their zero entry.
    pub async fn replace_aggregate(&self, aggregate: &mut ReferralAggregate) -> Result<WriteReport, StoreError> {
        let _roster_guard = self.roster_lock.lock().await;
        let _aggregate_guard = self.aggregate_lock.lock().await;

        let roster = self.load_roster().await?;
        for user in roster.users() {
            aggregate.ensure_entry(&user.label_spec());
        }
        self.save(&self.keys.aggregate, &*aggregate).await
    }

    async fn load(&self, key: &str) -> Result<Option<Value>, StoreError> {
        let Some(bytes) = self.blobs.read_blob(key).await? else {
            debug!(key = %key, "Document not written yet");
            return Ok(None);
        };
        match serde_json::from_slice::<Value>(&bytes) {
            Ok(value) => Ok(Some(value)),
            Err(e) => {
                warn!(key = %key, error = %e, "Stored document is not valid JSON, using empty default");
                Ok(None)
            }
        }
    }

    async fn save<T: Serialize>(&self, key: &str, doc: &T) -> Result<WriteReport, StoreError> {
        let bytes = serde_json::to_vec_pretty(doc)?;
        self.blobs.write_blob(key, &bytes).await
    }
}
