//! Referral Core - contact-mention matching and referral aggregation
//!
//! Registered users share a team label (`TEAM3`) or a solo reference label
//! (`REF014`). The operator's address book is scanned periodically and every
//! contact whose free text mentions a label counts as one referral for it.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────┐   ┌──────────────┐   ┌──────────────┐
//! │   Roster     │──▶│  Label set   │──▶│  Aggregator  │◀── ContactsProvider
//! └──────────────┘   └──────────────┘   └──────┬───────┘
//!                                              │ matcher × extractor
//!                                              ▼
//!                    ┌──────────────┐   ┌──────────────┐
//!                    │   History    │◀──│  Standings   │──▶ ReferralStore
//!                    └──────────────┘   └──────────────┘
//! ```
//!
//! [`service::ReferralService`] wires these together behind the operations the
//! HTTP layer exposes.

pub mod admin;
pub mod aggregate;
pub mod coerce;
pub mod contact;
pub mod extract;
pub mod history;
pub mod label;
pub mod labelset;
pub mod matcher;
pub mod provider;
pub mod report;
pub mod roster;
pub mod service;
pub mod settings;
pub mod standings;
pub mod store;

// Re-export main types for convenience
pub use admin::AdminGuard;
pub use aggregate::{aggregate, LabelCounts};
pub use coerce::coerce_count;
pub use contact::{ContactItem, ContactRecord};
pub use extract::{contact_text, extract_text_fragments};
pub use history::{AppendOutcome, DailySnapshot, History};
pub use label::{LabelError, LabelSpec, RegistrationKind, ALL_GROUP, SOLO_GROUP};
pub use labelset::{build_label_set, LabelSet};
pub use matcher::{build_ref_matcher, build_team_matcher, Matcher};
pub use provider::{ContactsProvider, ProviderError, StaticContactsProvider};
pub use report::DailyReport;
pub use roster::{normalize_referral_id, RegisteredUser, Registration, Roster};
pub use service::{ReferralService, ServiceError, SyncOutcome};
pub use settings::{LinkTable, ReferralSettings};
pub use standings::{LabelEntry, ReferralAggregate, Standing};
pub use store::{BlobStore, ReferralStore, StoreError, WriteReport};
