//! The stored referral aggregate and leaderboards derived from it.
//!
//! Layout on disk: `{ group: { key: {"team_label": .., "referrals": ..} } }`
//! where team keys are the team number and solo keys live under `SOLO` as
//! `REFnnn`.

use serde::{Serialize, Serializer};
use serde_json::Value;
use std::collections::BTreeMap;
use tracing::warn;

use crate::aggregate::LabelCounts;
use crate::coerce::coerce_count;
use crate::label::{LabelSpec, ALL_GROUP, SOLO_GROUP};

/// One label's stored count.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LabelEntry {
    pub team_label: String,
    pub referrals: u64,
}

impl LabelEntry {
    pub fn zero(team_label: impl Into<String>) -> Self {
        Self {
            team_label: team_label.into(),
            referrals: 0,
        }
    }

    fn from_value(key: &str, value: &Value) -> Self {
        let team_label = value
            .get("team_label")
            .and_then(Value::as_str)
            .map(str::to_string)
            .unwrap_or_else(|| key.to_string());
        Self {
            team_label,
            referrals: value.get("referrals").map(coerce_count).unwrap_or(0),
        }
    }
}

/// Group key to entry key to count.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReferralAggregate {
    groups: BTreeMap<String, BTreeMap<String, LabelEntry>>,
}

impl Serialize for ReferralAggregate {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.groups.serialize(serializer)
    }
}

/// A row of a leaderboard.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Standing {
    pub key: String,
    pub team_label: String,
    pub referrals: u64,
}

impl ReferralAggregate {
    /// Build a fresh aggregate from one pass of counts.
    pub fn from_counts(counts: &LabelCounts) -> Self {
        let mut aggregate = Self::default();
        for (spec, count) in counts {
            aggregate.ensure_entry(spec).referrals = *count;
        }
        aggregate
    }

    /// Load from stored JSON, coercing counts and skipping non-object groups.
    pub fn from_value(value: Value) -> Self {
        let Value::Object(groups) = value else {
            warn!("Stored aggregate is not an object, starting empty");
            return Self::default();
        };

        let groups = groups
            .into_iter()
            .filter_map(|(group, entries)| match entries {
                Value::Object(entries) => {
                    let entries = entries
                        .iter()
                        .map(|(key, v)| (key.clone(), LabelEntry::from_value(key, v)))
                        .collect();
                    Some((group, entries))
                }
                _ => None,
            })
            .collect();

        Self { groups }
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    pub fn group_count(&self) -> usize {
        self.groups.len()
    }

    pub fn groups(&self) -> impl Iterator<Item = (&str, &BTreeMap<String, LabelEntry>)> {
        self.groups.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn group(&self, group: &str) -> Option<&BTreeMap<String, LabelEntry>> {
        self.groups.get(group)
    }

    pub fn entry(&self, group: &str, key: &str) -> Option<&LabelEntry> {
        self.groups.get(group)?.get(key)
    }

    /// Entry for `spec`, inserting a zero entry when absent.
    pub fn ensure_entry(&mut self, spec: &LabelSpec) -> &mut LabelEntry {
        self.groups
            .entry(spec.group.clone())
            .or_default()
            .entry(spec.entry_key())
            .or_insert_with(|| LabelEntry::zero(spec.display_label()))
    }

    /// Count for a team number, preferring `group`, falling back to `ALL`.
    pub fn team_entry(&self, group: &str, team_number: u32) -> Option<&LabelEntry> {
        let key = team_number.to_string();
        self.entry(group, &key)
            .or_else(|| self.entry(ALL_GROUP, &key))
    }

    /// Solo entry by any of the given candidate keys, each tried as-is,
    /// upper-cased and lower-cased.
    pub fn solo_entry<'a>(&self, candidates: impl IntoIterator<Item = &'a str>) -> Option<&LabelEntry> {
        let solo = self.groups.get(SOLO_GROUP)?;
        candidates.into_iter().find_map(|c| {
            solo.get(c)
                .or_else(|| solo.get(&c.to_uppercase()))
                .or_else(|| solo.get(&c.to_lowercase()))
        })
    }

    /// One group's entries, highest count first; ties keep key order.
    pub fn leaderboard(&self, group: &str) -> Vec<Standing> {
        let mut rows: Vec<Standing> = self
            .groups
            .get(group)
            .into_iter()
            .flatten()
            .map(|(key, entry)| Standing {
                key: key.clone(),
                team_label: entry.team_label.clone(),
                referrals: entry.referrals,
            })
            .collect();
        rows.sort_by(|a, b| b.referrals.cmp(&a.referrals));
        rows
    }

    /// Leaderboards for every group.
    pub fn leaderboards(&self) -> BTreeMap<String, Vec<Standing>> {
        self.groups
            .keys()
            .map(|g| (g.clone(), self.leaderboard(g)))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_malformed_counts_load_as_zero() {
        let agg = ReferralAggregate::from_value(json!({
            "ALL": {
                "1": {"team_label": "TEAM1", "referrals": "abc"},
                "2": {"referrals": 5},
                "3": "not an object"
            },
            "broken": 7
        }));

        assert_eq!(agg.entry("ALL", "1").unwrap().referrals, 0);
        assert_eq!(agg.entry("ALL", "2").unwrap().team_label, "2");
        assert_eq!(agg.entry("ALL", "2").unwrap().referrals, 5);
        assert_eq!(agg.entry("ALL", "3").unwrap().referrals, 0);
        assert!(agg.group("broken").is_none());
    }

    #[test]
    fn test_from_counts_layout() {
        let counts: LabelCounts = [
            (LabelSpec::team(ALL_GROUP, 1), 3),
            (LabelSpec::solo(2), 1),
        ]
        .into_iter()
        .collect();

        let agg = ReferralAggregate::from_counts(&counts);
        assert_eq!(
            serde_json::to_value(&agg).unwrap(),
            json!({
                "ALL": {"1": {"team_label": "TEAM1", "referrals": 3}},
                "SOLO": {"REF002": {"team_label": "REF002", "referrals": 1}}
            })
        );
    }

    #[test]
    fn test_leaderboard_order() {
        let agg = ReferralAggregate::from_value(json!({
            "ALL": {
                "1": {"team_label": "TEAM1", "referrals": 2},
                "2": {"team_label": "TEAM2", "referrals": 9},
                "3": {"team_label": "TEAM3", "referrals": 2}
            }
        }));
        let keys: Vec<String> = agg.leaderboard("ALL").into_iter().map(|s| s.key).collect();
        assert_eq!(keys, vec!["2", "1", "3"]);
        assert!(agg.leaderboard("missing").is_empty());
    }

    #[test]
    fn test_lookups() {
        let agg = ReferralAggregate::from_value(json!({
            "ALL": {"4": {"team_label": "TEAM4", "referrals": 6}},
            "SOLO": {"REF003": {"team_label": "REF003", "referrals": 2}}
        }));
        assert_eq!(agg.team_entry("east", 4).unwrap().referrals, 6);
        assert_eq!(agg.solo_entry(["amaka", "ref003"]).unwrap().referrals, 2);
        assert!(agg.solo_entry(["REF009"]).is_none());
    }
}
