//! Marketing event table
//!
//! The dataset is a CSV export with one row per served impression. Only the
//! columns used for aggregation and prediction are kept; everything else
//! (the unnamed index column, dates, variant, ...) is ignored.

use serde::{Deserialize, Deserializer, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::path::Path;
use std::str::FromStr;
use tracing::info;

use crate::{Error, Result};

/// Categorical columns the table can be grouped by.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum GroupingKey {
    #[default]
    MarketingChannel,
    SubscribingChannel,
    AgeGroup,
}

impl GroupingKey {
    /// All selectable dimensions, in display order.
    pub const ALL: [GroupingKey; 3] = [
        GroupingKey::MarketingChannel,
        GroupingKey::SubscribingChannel,
        GroupingKey::AgeGroup,
    ];

    pub fn column_name(&self) -> &'static str {
        match self {
            GroupingKey::MarketingChannel => "marketing_channel",
            GroupingKey::SubscribingChannel => "subscribing_channel",
            GroupingKey::AgeGroup => "age_group",
        }
    }

    /// Column names of every dimension.
    pub fn column_names() -> Vec<&'static str> {
        Self::ALL.iter().map(|k| k.column_name()).collect()
    }
}

impl fmt::Display for GroupingKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.column_name())
    }
}

impl FromStr for GroupingKey {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::ALL
            .iter()
            .copied()
            .find(|k| k.column_name() == s)
            .ok_or_else(|| Error::UnknownColumn(s.to_string()))
    }
}

/// One row of the marketing dataset.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventRecord {
    pub user_id: String,
    #[serde(deserialize_with = "deserialize_flag")]
    pub converted: bool,
    pub marketing_channel: String,
    pub subscribing_channel: String,
    pub age_group: String,
}

impl EventRecord {
    pub fn new(
        user_id: impl Into<String>,
        converted: bool,
        marketing_channel: impl Into<String>,
        subscribing_channel: impl Into<String>,
        age_group: impl Into<String>,
    ) -> Self {
        Self {
            user_id: user_id.into(),
            converted,
            marketing_channel: marketing_channel.into(),
            subscribing_channel: subscribing_channel.into(),
            age_group: age_group.into(),
        }
    }

    /// Value of a categorical column for this row.
    pub fn value(&self, key: GroupingKey) -> &str {
        match key {
            GroupingKey::MarketingChannel => &self.marketing_channel,
            GroupingKey::SubscribingChannel => &self.subscribing_channel,
            GroupingKey::AgeGroup => &self.age_group,
        }
    }

    /// Grouping value, or `None` when the cell was empty.
    pub fn group(&self, key: GroupingKey) -> Option<&str> {
        Some(self.value(key)).filter(|v| !v.is_empty())
    }
}

/// Accepts the boolean spellings pandas and spreadsheets produce.
/// An empty cell counts as not converted.
fn deserialize_flag<'de, D>(deserializer: D) -> std::result::Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    use serde::de::Error as _;
    let raw = String::deserialize(deserializer)?;
    match raw.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" => Ok(true),
        "false" | "0" | "no" | "" => Ok(false),
        other => Err(D::Error::custom(format!(
            "expected boolean flag, got {:?}",
            other
        ))),
    }
}

/// Immutable event table, loaded once per process.
#[derive(Debug, Clone, Default)]
pub struct EventTable {
    records: Vec<EventRecord>,
}

impl EventTable {
    pub fn new(records: Vec<EventRecord>) -> Self {
        Self { records }
    }

    /// Load the table from a CSV file with a header row.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let file = std::fs::File::open(path).map_err(|e| {
            Error::Dataset(format!("failed to open {}: {}", path.display(), e))
        })?;
        let table = Self::from_reader(file)?;
        info!(
            path = %path.display(),
            rows = table.len(),
            "Loaded marketing dataset"
        );
        Ok(table)
    }

    /// Parse CSV data from any reader.
    pub fn from_reader<R: std::io::Read>(reader: R) -> Result<Self> {
        let mut csv_reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .trim(csv::Trim::All)
            .from_reader(reader);

        let headers = csv_reader.headers()?.clone();
        for required in ["user_id", "converted"]
            .into_iter()
            .chain(GroupingKey::column_names())
        {
            if !headers.iter().any(|h| h == required) {
                return Err(Error::UnknownColumn(required.to_string()));
            }
        }

        let records = csv_reader
            .deserialize::<EventRecord>()
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(Self { records })
    }

    pub fn records(&self) -> &[EventRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Sorted distinct non-empty values observed for a column.
    pub fn distinct_values(&self, key: GroupingKey) -> Vec<String> {
        self.records
            .iter()
            .filter_map(|r| r.group(key))
            .collect::<BTreeSet<_>>()
            .into_iter()
            .map(str::to_string)
            .collect()
    }

    /// Whether any row left this column empty.
    pub fn has_missing(&self, key: GroupingKey) -> bool {
        self.records.iter().any(|r| r.group(key).is_none())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = "\
,user_id,date_served,marketing_channel,variant,converted,language_displayed,age_group,subscribing_channel
0,a1000029,1/1/18,House Ads,personalization,True,English,0-18 years,House Ads
1,a1000030,1/1/18,House Ads,personalization,False,English,19-24 years,Email
2,a1000031,1/1/18,Email,control,,English,24-30 years,
";

    #[test]
    fn test_grouping_key_parse() {
        assert_eq!(
            "marketing_channel".parse::<GroupingKey>().unwrap(),
            GroupingKey::MarketingChannel
        );
        assert_eq!(
            "age_group".parse::<GroupingKey>().unwrap(),
            GroupingKey::AgeGroup
        );
    }

    #[test]
    fn test_grouping_key_unknown_column() {
        let err = "region".parse::<GroupingKey>().unwrap_err();
        assert!(matches!(err, Error::UnknownColumn(ref c) if c == "region"));
    }

    #[test]
    fn test_grouping_key_display_roundtrip() {
        for key in GroupingKey::ALL {
            assert_eq!(key.to_string().parse::<GroupingKey>().unwrap(), key);
        }
    }

    #[test]
    fn test_load_from_reader_ignores_extra_columns() {
        let table = EventTable::from_reader(SAMPLE.as_bytes()).unwrap();
        assert_eq!(table.len(), 3);

        let first = &table.records()[0];
        assert_eq!(first.user_id, "a1000029");
        assert!(first.converted);
        assert_eq!(first.marketing_channel, "House Ads");
        assert_eq!(first.age_group, "0-18 years");
    }

    #[test]
    fn test_empty_converted_cell_is_false() {
        let table = EventTable::from_reader(SAMPLE.as_bytes()).unwrap();
        assert!(!table.records()[2].converted);
        assert_eq!(table.records()[2].subscribing_channel, "");
    }

    #[test]
    fn test_missing_column_is_rejected() {
        let data = "user_id,converted,marketing_channel,age_group\nu1,True,Email,0-18 years\n";
        let err = EventTable::from_reader(data.as_bytes()).unwrap_err();
        assert!(matches!(err, Error::UnknownColumn(ref c) if c == "subscribing_channel"));
    }

    #[test]
    fn test_bad_flag_is_dataset_error() {
        let data = "user_id,converted,marketing_channel,subscribing_channel,age_group\n\
                    u1,maybe,Email,Email,0-18 years\n";
        let err = EventTable::from_reader(data.as_bytes()).unwrap_err();
        assert!(matches!(err, Error::Dataset(_)));
    }

    #[test]
    fn test_distinct_values_sorted() {
        let table = EventTable::from_reader(SAMPLE.as_bytes()).unwrap();
        assert_eq!(
            table.distinct_values(GroupingKey::MarketingChannel),
            vec!["Email".to_string(), "House Ads".to_string()]
        );
    }

    #[test]
    fn test_distinct_values_skip_empty_cells() {
        let table = EventTable::from_reader(SAMPLE.as_bytes()).unwrap();
        assert_eq!(
            table.distinct_values(GroupingKey::SubscribingChannel),
            vec!["Email".to_string(), "House Ads".to_string()]
        );
        assert!(table.has_missing(GroupingKey::SubscribingChannel));
        assert!(!table.has_missing(GroupingKey::AgeGroup));
        assert_eq!(table.records()[2].group(GroupingKey::SubscribingChannel), None);
    }

    #[test]
    fn test_load_missing_file() {
        let err = EventTable::load("/nonexistent/marketing.csv").unwrap_err();
        assert!(matches!(err, Error::Dataset(_)));
    }
}
