//! Query records and feature schema validation.

use serde::Serialize;
use std::collections::BTreeMap;

use crate::{Error, Result};

/// Feature values submitted for a single prediction.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct QueryRecord {
    values: BTreeMap<String, String>,
}

impl QueryRecord {
    pub fn new() -> Self {
        Self::default()
    }

    /// Decode an URL query string (`a=1&b=2`). For repeated keys the first
    /// value wins.
    pub fn from_query_string(query: &str) -> Self {
        Self::from_pairs(url::form_urlencoded::parse(query.as_bytes()).into_owned())
    }

    /// Build from `key=value` command line arguments.
    pub fn from_assignments<I, S>(args: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut pairs = Vec::new();
        for arg in args {
            let arg = arg.as_ref();
            let (key, value) = arg.split_once('=').ok_or_else(|| {
                Error::InvalidQuery(format!("expected key=value, got {:?}", arg))
            })?;
            if key.trim().is_empty() {
                return Err(Error::InvalidQuery(format!("empty feature name in {:?}", arg)));
            }
            pairs.push((key.trim().to_string(), value.trim().to_string()));
        }
        Ok(Self::from_pairs(pairs))
    }

    pub fn from_pairs<I>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (String, String)>,
    {
        let mut values = BTreeMap::new();
        for (key, value) in pairs {
            values.entry(key).or_insert(value);
        }
        Self { values }
    }

    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.values.insert(key.into(), value.into());
        self
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.values.get(key).map(String::as_str)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.values.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// A query record checked against a schema, values in schema order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeatureRow {
    values: Vec<(String, String)>,
}

impl FeatureRow {
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.values.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.iter().find(|(k, _)| *k == name).map(|(_, v)| v)
    }
}

/// Feature names a model expects, in model order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeatureSchema {
    names: Vec<String>,
}

impl FeatureSchema {
    pub fn new<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            names: names.into_iter().map(Into::into).collect(),
        }
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    /// Reject records missing any expected feature. Extra keys are dropped.
    pub fn validate(&self, record: &QueryRecord) -> Result<FeatureRow> {
        let missing: Vec<&str> = self
            .names
            .iter()
            .filter(|name| record.get(name).is_none())
            .map(String::as_str)
            .collect();
        if !missing.is_empty() {
            return Err(Error::MissingFeature(missing.join(", ")));
        }

        let values = self
            .names
            .iter()
            .filter_map(|name| record.get(name).map(|v| (name.clone(), v.to_string())))
            .collect();
        Ok(FeatureRow { values })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn schema() -> FeatureSchema {
        FeatureSchema::new(["marketing_channel", "subscribing_channel", "age_group"])
    }

    #[test]
    fn test_from_query_string_decodes_values() {
        let record = QueryRecord::from_query_string(
            "marketing_channel=House+Ads&subscribing_channel=Email&age_group=19-24%20years",
        );
        assert_eq!(record.get("marketing_channel"), Some("House Ads"));
        assert_eq!(record.get("age_group"), Some("19-24 years"));
        assert_eq!(record.len(), 3);
    }

    #[test]
    fn test_from_query_string_first_value_wins() {
        let record = QueryRecord::from_query_string("age_group=0-18+years&age_group=55%2B+years");
        assert_eq!(record.get("age_group"), Some("0-18 years"));
    }

    #[test]
    fn test_from_query_string_empty() {
        assert!(QueryRecord::from_query_string("").is_empty());
    }

    #[test]
    fn test_from_assignments() {
        let record =
            QueryRecord::from_assignments(["marketing_channel=Email", "age_group = 24-30 years"])
                .unwrap();
        assert_eq!(record.get("marketing_channel"), Some("Email"));
        assert_eq!(record.get("age_group"), Some("24-30 years"));
    }

    #[test]
    fn test_from_assignments_rejects_malformed() {
        let err = QueryRecord::from_assignments(["marketing_channel"]).unwrap_err();
        assert!(matches!(err, Error::InvalidQuery(_)));

        let err = QueryRecord::from_assignments(["=Email"]).unwrap_err();
        assert!(matches!(err, Error::InvalidQuery(_)));
    }

    #[test]
    fn test_validate_orders_by_schema_and_drops_extras() {
        let record = QueryRecord::new()
            .with("age_group", "0-18 years")
            .with("utm_source", "newsletter")
            .with("marketing_channel", "Email")
            .with("subscribing_channel", "Instagram");

        let row = schema().validate(&record).unwrap();
        let names: Vec<&str> = row.iter().map(|(k, _)| k).collect();
        assert_eq!(names, vec!["marketing_channel", "subscribing_channel", "age_group"]);
        assert_eq!(row.get("utm_source"), None);
    }

    #[test]
    fn test_validate_reports_all_missing_features() {
        let record = QueryRecord::new().with("marketing_channel", "Email");
        let err = schema().validate(&record).unwrap_err();
        match err {
            Error::MissingFeature(names) => {
                assert_eq!(names, "subscribing_channel, age_group");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }
}
