//! Conversion aggregation over the event table.
//!
//! For a grouping column this computes, per group value:
//! - distinct users that converted
//! - distinct users overall
//! - users that did not convert and the conversion rate
//!
//! Groups are the outer join of both counts, so a group with no conversions
//! still appears with `num_converted = 0`. Empty cells are missing values:
//! they form no group, and rows without a user id are not counted. Rows come back sorted by group
//! value, the order an index-aligned outer join produces.

use serde::Serialize;
use std::collections::{BTreeMap, HashSet};

use crate::dataset::{EventTable, GroupingKey};
use crate::Result;

/// Conversion counts for a single group value.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConversionRow {
    pub group: String,
    pub num_converted: u64,
    pub num_total: u64,
    pub num_not_converted: u64,
    pub conversion_rate: f64,
}

impl ConversionRow {
    fn from_counts(group: String, num_converted: u64, num_total: u64) -> Self {
        let conversion_rate = if num_total == 0 {
            0.0
        } else {
            num_converted as f64 / num_total as f64
        };
        Self {
            group,
            num_converted,
            num_total,
            num_not_converted: num_total.saturating_sub(num_converted),
            conversion_rate,
        }
    }
}

/// Per-group conversion summary for one grouping column.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConversionSummary {
    pub grouping: GroupingKey,
    pub rows: Vec<ConversionRow>,
    /// Distinct converted users across the whole table.
    pub total_converted: u64,
    /// Distinct users across the whole table.
    pub total_users: u64,
}

impl ConversionSummary {
    /// Overall conversion rate, 0 for an empty table.
    pub fn overall_rate(&self) -> f64 {
        if self.total_users == 0 {
            0.0
        } else {
            self.total_converted as f64 / self.total_users as f64
        }
    }

    pub fn groups(&self) -> Vec<&str> {
        self.rows.iter().map(|r| r.group.as_str()).collect()
    }

    pub fn row(&self, group: &str) -> Option<&ConversionRow> {
        self.rows.iter().find(|r| r.group == group)
    }
}

/// Aggregate by a column name. Unknown names fail with `Error::UnknownColumn`.
pub fn conversion_rate(table: &EventTable, grouping: &str) -> Result<ConversionSummary> {
    let key = grouping.parse::<GroupingKey>()?;
    Ok(summarize(table, key))
}

/// Aggregate by a known grouping column.
pub fn summarize(table: &EventTable, key: GroupingKey) -> ConversionSummary {
    let mut converted: BTreeMap<&str, HashSet<&str>> = BTreeMap::new();
    let mut total: BTreeMap<&str, HashSet<&str>> = BTreeMap::new();
    let mut all_users: HashSet<&str> = HashSet::new();
    let mut all_converted: HashSet<&str> = HashSet::new();

    for record in table.records() {
        let user = record.user_id.as_str();
        if user.is_empty() {
            continue;
        }

        all_users.insert(user);
        if record.converted {
            all_converted.insert(user);
        }

        let Some(group) = record.group(key) else {
            continue;
        };
        total.entry(group).or_default().insert(user);
        if record.converted {
            converted.entry(group).or_default().insert(user);
        }
    }

    // Outer join: every group seen on either side, missing counts as 0.
    let mut groups: Vec<&str> = total.keys().chain(converted.keys()).copied().collect();
    groups.sort_unstable();
    groups.dedup();

    let rows = groups
        .into_iter()
        .map(|group| {
            let num_converted = converted.get(group).map_or(0, |u| u.len() as u64);
            let num_total = total.get(group).map_or(0, |u| u.len() as u64);
            ConversionRow::from_counts(group.to_string(), num_converted, num_total)
        })
        .collect();

    ConversionSummary {
        grouping: key,
        rows,
        total_converted: all_converted.len() as u64,
        total_users: all_users.len() as u64,
    }
}

/// Render the summary as a plain-text table.
pub fn render_report(summary: &ConversionSummary) -> String {
    let header = format!("Conversion by {}", summary.grouping);
    let mut out = String::new();
    out.push_str(&header);
    out.push('\n');
    out.push_str(&"-".repeat(header.chars().count()));
    out.push('\n');

    if summary.rows.is_empty() {
        out.push_str("No events in dataset.\n");
        return out;
    }

    out.push_str(&format!(
        "{:24} {:>9} {:>9} {:>9} {:>7}\n",
        "Group", "Converted", "Not conv", "Total", "Rate %"
    ));

    for row in &summary.rows {
        let group: String = row.group.chars().take(24).collect();
        out.push_str(&format!(
            "{:24} {:>9} {:>9} {:>9} {:>7.2}\n",
            group,
            row.num_converted,
            row.num_not_converted,
            row.num_total,
            row.conversion_rate * 100.0
        ));
    }

    out.push_str(&format!(
        "Overall: {} of {} users converted ({:.2}%)\n",
        summary.total_converted,
        summary.total_users,
        summary.overall_rate() * 100.0
    ));
    out
}

/// Print the summary to stdout.
pub fn print_report(summary: &ConversionSummary) {
    print!("{}", render_report(summary));
}
