//! Registry settings shared by registration, aggregation and reporting.
//!
//! Built once at startup from the node's config file and handed to the
//! service behind an `Arc`.

use chrono::{DateTime, Duration, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::num::{NonZeroU32, NonZeroUsize};

/// Numbering, goals and contest window.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ReferralSettings {
    /// Team numbers cycle through `1..=teams_per_group`
    pub teams_per_group: NonZeroU32,

    /// Solo indices cycle through `1..=solo_count`, all pre-populated
    pub solo_count: NonZeroU32,

    /// Default referral goal for a team
    pub team_goal: u64,

    /// Per-team goal overrides keyed by team number
    pub team_goals: BTreeMap<String, u64>,

    /// Referral goal for a solo reference
    pub solo_goal: u64,

    pub contest_start: DateTime<Utc>,

    pub contest_duration_days: u32,

    /// Maximum number of daily snapshots kept
    pub history_cap: NonZeroUsize,

    pub links: LinkTable,
}

impl Default for ReferralSettings {
    fn default() -> Self {
        Self {
            teams_per_group: NonZeroU32::new(5).unwrap_or(NonZeroU32::MIN),
            solo_count: NonZeroU32::new(25).unwrap_or(NonZeroU32::MIN),
            team_goal: 10_000,
            team_goals: BTreeMap::from([("2".to_string(), 100_000)]),
            solo_goal: 1_000,
            contest_start: default_contest_start(),
            contest_duration_days: 30,
            history_cap: NonZeroUsize::new(90).unwrap_or(NonZeroUsize::MIN),
            links: LinkTable::default(),
        }
    }
}

fn default_contest_start() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 11, 10, 0, 0, 0)
        .single()
        .unwrap_or_default()
}

impl ReferralSettings {
    /// Goal for a team number, honouring overrides.
    pub fn goal_for_team(&self, team_number: u32) -> u64 {
        self.team_goals
            .get(&team_number.to_string())
            .copied()
            .unwrap_or(self.team_goal)
    }

    pub fn contest_end(&self) -> DateTime<Utc> {
        self.contest_start + Duration::days(i64::from(self.contest_duration_days))
    }
}

/// Messaging deep links handed out at registration, keyed by number.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LinkTable {
    pub team: BTreeMap<String, String>,
    pub solo: BTreeMap<String, String>,
}

impl LinkTable {
    pub fn team_link(&self, number: u32) -> Option<String> {
        self.team.get(&number.to_string()).cloned()
    }

    pub fn solo_link(&self, number: u32) -> Option<String> {
        self.solo.get(&number.to_string()).cloned()
    }
}
