//! Day-by-day progress table built from the snapshot history.

use chrono::NaiveDate;
use serde::Serialize;
use std::cmp::Reverse;
use std::collections::{BTreeMap, BTreeSet};

use crate::history::History;
use crate::label::{team_label, ALL_GROUP, SOLO_GROUP};
use crate::roster::Roster;
use crate::standings::ReferralAggregate;

/// The table always shows at least this many day columns.
pub const MIN_REPORT_DAYS: usize = 30;

/// One label's counts across the report's days.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReportRow {
    pub label: String,
    pub name: String,
    pub day_counts: Vec<u64>,
    pub total: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DailyReport {
    /// Recorded dates, then `None` placeholders
    pub day_dates: Vec<Option<NaiveDate>>,
    /// Sorted by label
    pub rows: Vec<ReportRow>,
    /// Highest count on the latest recorded day first
    pub rows_by_latest: Vec<ReportRow>,
    /// Highest overall total first
    pub totals_sorted: Vec<ReportRow>,
    pub latest_index: usize,
    pub daily_totals: Vec<u64>,
    pub overall_total: u64,
}

impl DailyReport {
    pub fn build(history: &History, aggregate: &ReferralAggregate, roster: &Roster) -> Self {
        let width = history.len().max(MIN_REPORT_DAYS);
        let mut day_dates: Vec<Option<NaiveDate>> = history.days.iter().map(|d| Some(d.date)).collect();
        day_dates.resize(width, None);

        let mut labels: BTreeSet<String> = BTreeSet::new();
        for key in aggregate.group(ALL_GROUP).into_iter().flat_map(|g| g.keys()) {
            labels.insert(match key.trim().parse::<u32>() {
                Ok(n) => team_label(n),
                Err(_) => format!("TEAM{}", key),
            });
        }
        labels.extend(aggregate.group(SOLO_GROUP).into_iter().flat_map(|g| g.keys().cloned()));
        labels.extend(history.days.iter().flat_map(|d| d.counts.keys().cloned()));

        let names: BTreeMap<String, String> = roster
            .users()
            .iter()
            .map(|u| {
                let name = if u.name.trim().is_empty() { u.team_label() } else { u.name.clone() };
                (u.team_label(), name)
            })
            .collect();

        let rows: Vec<ReportRow> = labels
            .into_iter()
            .map(|label| {
                let mut day_counts: Vec<u64> = history
                    .days
                    .iter()
                    .map(|d| d.counts.get(&label).copied().unwrap_or(0))
                    .collect();
                day_counts.resize(width, 0);
                let total = day_counts.iter().sum();
                let name = names.get(&label).cloned().unwrap_or_else(|| unnamed(&label));
                ReportRow {
                    label,
                    name,
                    day_counts,
                    total,
                }
            })
            .collect();

        let latest_index = history.len().saturating_sub(1);

        let mut rows_by_latest = rows.clone();
        rows_by_latest.sort_by_key(|r| Reverse(r.day_counts[latest_index]));
        let mut totals_sorted = rows.clone();
        totals_sorted.sort_by_key(|r| Reverse(r.total));

        let daily_totals: Vec<u64> = (0..width)
            .map(|i| rows.iter().map(|r| r.day_counts[i]).sum())
            .collect();
        let overall_total = daily_totals.iter().sum();

        Self {
            day_dates,
            rows,
            rows_by_latest,
            totals_sorted,
            latest_index,
            daily_totals,
            overall_total,
        }
    }
}

/// `Team <n>` for unheld team labels, the label itself otherwise.
fn unnamed(label: &str) -> String {
    match label.strip_prefix("TEAM").map(str::parse::<u32>) {
        Some(Ok(n)) => format!("Team {}", n),
        _ => label.to_string(),
    }
}
