//! JSON wire types of the OpenTSDB HTTP API
//!
//! - `POST /api/put` takes an array of [`PutRequest`]
//! - `POST /api/query` takes a [`QueryRequest`] and answers with an array of
//!   [`QueryResult`] fragments
//!
//! Reference: http://opentsdb.net/docs/build/html/api_http/query/index.html

use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Deserializer, Serialize};

/// Metric name or tag value as sent to and received from OpenTSDB
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TagValue(String);

impl TagValue {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// Wire value for a possibly empty label value; OpenTSDB rejects empty tags
    pub fn or_placeholder(value: &str, placeholder: &str) -> Self {
        if value.is_empty() {
            Self::new(placeholder)
        } else {
            Self::new(value)
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl fmt::Display for TagValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for TagValue {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for TagValue {
    fn from(value: String) -> Self {
        Self(value)
    }
}

/// One data point of a `/api/put` batch
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PutRequest {
    pub metric: TagValue,
    /// Unix seconds
    pub timestamp: i64,
    pub value: f64,
    pub tags: HashMap<String, TagValue>,
}

/// Body of `/api/query`
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryRequest {
    /// Unix seconds
    pub start: i64,
    /// Unix seconds
    pub end: i64,
    pub queries: Vec<SubQuery>,
}

/// Aggregator that keeps every series untouched
pub const AGGREGATOR_NONE: &str = "none";

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubQuery {
    pub metric: TagValue,
    pub filters: Vec<Filter>,
    pub aggregator: String,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum FilterType {
    #[serde(rename = "literal_or")]
    LiteralOr,
    #[serde(rename = "not_literal_or")]
    NotLiteralOr,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Filter {
    #[serde(rename = "type")]
    pub filter_type: FilterType,
    pub tagk: String,
    pub filter: String,
    #[serde(rename = "groupBy")]
    pub group_by: bool,
}

/// One result fragment of `/api/query`
///
/// Several fragments may describe the same logical series; they are merged by tag
/// set, see [`crate::merge`].
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct QueryResult {
    pub metric: TagValue,
    /// Only populated for non-aggregated results; may be `null`
    #[serde(default, deserialize_with = "null_as_default")]
    pub tags: HashMap<String, TagValue>,
    /// Tags common to all aggregated series; unused with the `none` aggregator
    #[serde(
        rename = "aggregateTags",
        alias = "aggregatedTags",
        default,
        deserialize_with = "null_as_default"
    )]
    pub aggregated_tags: Vec<String>,
    /// Unix seconds → value
    #[serde(default, deserialize_with = "null_as_default")]
    pub dps: HashMap<i64, f64>,
}

fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}
