//! Daily snapshots of the aggregate, one per UTC calendar day.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::num::NonZeroUsize;
use tracing::warn;

use crate::coerce::coerce_count;
use crate::label::{team_label, ALL_GROUP, SOLO_GROUP};
use crate::roster::Roster;
use crate::standings::ReferralAggregate;

/// Counts per display label captured on one day.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DailySnapshot {
    pub date: NaiveDate,
    pub counts: BTreeMap<String, u64>,
}

impl DailySnapshot {
    /// Parse a stored day. `None` when the date or the counts mapping is
    /// missing or unreadable; individual counts are coerced.
    pub fn from_value(value: &Value) -> Option<Self> {
        let date = value
            .get("date")?
            .as_str()
            .and_then(|s| NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d").ok())?;
        let counts = value
            .get("counts")?
            .as_object()?
            .iter()
            .map(|(label, c)| (label.clone(), coerce_count(c)))
            .collect();
        Some(Self { date, counts })
    }
}

/// Result of offering a snapshot to the history.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppendOutcome {
    Accepted,
    DuplicateDate,
    InvalidSnapshot,
}

impl AppendOutcome {
    pub fn accepted(&self) -> bool {
        matches!(self, Self::Accepted)
    }

    pub fn reason(&self) -> &'static str {
        match self {
            Self::Accepted => "saved",
            Self::DuplicateDate => "duplicate-date",
            Self::InvalidSnapshot => "invalid-snapshot",
        }
    }
}

/// Bounded, date-unique series of snapshots, oldest first.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct History {
    #[serde(default)]
    pub days: Vec<DailySnapshot>,
}

impl History {
    /// Load from stored JSON; unreadable days are dropped.
    pub fn from_value(value: Value) -> Self {
        let Some(days) = value.get("days").and_then(Value::as_array) else {
            warn!("Stored history has no day list, starting empty");
            return Self::default();
        };

        let mut history = Self::default();
        for day in days {
            match DailySnapshot::from_value(day) {
                Some(snapshot) if !history.contains(snapshot.date) => history.days.push(snapshot),
                Some(snapshot) => warn!(date = %snapshot.date, "Dropping duplicate stored day"),
                None => warn!("Dropping unreadable stored day"),
            }
        }
        history
    }

    pub fn is_empty(&self) -> bool {
        self.days.is_empty()
    }

    pub fn len(&self) -> usize {
        self.days.len()
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        self.days.iter().any(|d| d.date == date)
    }

    /// Append unless the date is already recorded, then evict the oldest
    /// days beyond `cap`.
    pub fn append(&mut self, snapshot: DailySnapshot, cap: NonZeroUsize) -> AppendOutcome {
        if self.contains(snapshot.date) {
            return AppendOutcome::DuplicateDate;
        }
        self.days.push(snapshot);
        let excess = self.days.len().saturating_sub(cap.get());
        self.days.drain(..excess);
        AppendOutcome::Accepted
    }

    /// [`History::append`] for a candidate that has not been validated yet.
    pub fn append_value(&mut self, candidate: &Value, cap: NonZeroUsize) -> AppendOutcome {
        match DailySnapshot::from_value(candidate) {
            Some(snapshot) => self.append(snapshot, cap),
            None => AppendOutcome::InvalidSnapshot,
        }
    }
}

/// Label a stored team key: numeric keys become `TEAM<n>`.
fn team_key_label(key: &str, stored_label: &str) -> String {
    match key.trim().parse::<u32>() {
        Ok(n) => team_label(n),
        Err(_) if !stored_label.is_empty() => stored_label.to_string(),
        Err(_) => format!("TEAM{}", key),
    }
}

/// Capture the aggregate as a snapshot for `date`.
///
/// Team counts come from `ALL` when present, otherwise summed over every
/// non-solo group. Solo counts are keyed by their display label. Every
/// label held by a roster user is present, zero if uncounted.
pub fn build_snapshot(aggregate: &ReferralAggregate, roster: &Roster, date: NaiveDate) -> DailySnapshot {
    let mut counts: BTreeMap<String, u64> = BTreeMap::new();

    match aggregate.group(ALL_GROUP) {
        Some(all) => {
            for (key, entry) in all {
                counts.insert(team_key_label(key, &entry.team_label), entry.referrals);
            }
        }
        None => {
            for (_, entries) in aggregate.groups().filter(|(g, _)| *g != SOLO_GROUP) {
                for (key, entry) in entries {
                    *counts.entry(team_key_label(key, &entry.team_label)).or_default() += entry.referrals;
                }
            }
        }
    }

    for (key, entry) in aggregate.group(SOLO_GROUP).into_iter().flatten() {
        let label = if entry.team_label.is_empty() {
            key.clone()
        } else {
            entry.team_label.clone()
        };
        *counts.entry(label).or_default() += entry.referrals;
    }

    for user in roster.users() {
        counts.entry(user.team_label()).or_default();
    }

    DailySnapshot { date, counts }
}
