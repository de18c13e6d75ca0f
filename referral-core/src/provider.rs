//! Contacts provider seam.
//!
//! The node wires in the Google People API; tests and dev mode use
//! [`StaticContactsProvider`].

use async_trait::async_trait;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::RwLock;
use thiserror::Error;

use crate::contact::ContactRecord;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProviderError {
    /// No usable credentials; a status, not a crash
    #[error("No usable contacts credentials")]
    NoCredentials,

    #[error("Contacts provider error: {0}")]
    Transient(String),

    #[error("Contacts request timed out: {0}")]
    Timeout(String),

    #[error("Contacts response parse error: {0}")]
    Parse(String),
}

#[async_trait]
pub trait ContactsProvider: Send + Sync {
    /// Provider name for logs
    fn id(&self) -> &str;

    /// Every contact in the address book.
    async fn list_contacts(&self) -> Result<Vec<ContactRecord>, ProviderError>;
}

/// Fixed contact list or fixed failure.
pub struct StaticContactsProvider {
    contacts: RwLock<Result<Vec<ContactRecord>, ProviderError>>,
    call_count: AtomicU32,
}

impl StaticContactsProvider {
    pub fn new(contacts: Vec<ContactRecord>) -> Self {
        Self {
            contacts: RwLock::new(Ok(contacts)),
            call_count: AtomicU32::new(0),
        }
    }

    pub fn no_credentials() -> Self {
        Self::failing(ProviderError::NoCredentials)
    }

    pub fn failing(error: ProviderError) -> Self {
        Self {
            contacts: RwLock::new(Err(error)),
            call_count: AtomicU32::new(0),
        }
    }

    /// Replace what later calls return.
    pub fn set_contacts(&self, contacts: Result<Vec<ContactRecord>, ProviderError>) {
        match self.contacts.write() {
            Ok(mut guard) => *guard = contacts,
            Err(poisoned) => *poisoned.into_inner() = contacts,
        }
    }

    /// Number of times list_contacts was called.
    pub fn call_count(&self) -> u32 {
        self.call_count.load(Ordering::SeqCst)
    }
}

impl Default for StaticContactsProvider {
    fn default() -> Self {
        Self::new(Vec::new())
    }
}

#[async_trait]
impl ContactsProvider for StaticContactsProvider {
    fn id(&self) -> &str {
        "static"
    }

    async fn list_contacts(&self) -> Result<Vec<ContactRecord>, ProviderError> {
        self.call_count.fetch_add(1, Ordering::SeqCst);
        match self.contacts.read() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_static_provider() {
        let provider = StaticContactsProvider::new(vec![ContactRecord::named("Ada")]);
        assert_eq!(provider.list_contacts().await.unwrap().len(), 1);

        provider.set_contacts(Err(ProviderError::Transient("boom".into())));
        assert!(provider.list_contacts().await.is_err());
        assert_eq!(provider.call_count(), 2);
    }

    #[tokio::test]
    async fn test_no_credentials() {
        let provider = StaticContactsProvider::no_credentials();
        assert_eq!(provider.list_contacts().await, Err(ProviderError::NoCredentials));
    }
}
