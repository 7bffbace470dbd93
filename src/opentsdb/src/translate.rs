//! Prometheus read query → OpenTSDB `/api/query` translation
//!
//! A query must carry exactly one `__name__="..."` matcher. Every other matcher
//! becomes a tag filter:
//!
//! | Prometheus      | OpenTSDB                           |
//! |-----------------|------------------------------------|
//! | `label="v"`     | `literal_or`, `groupBy: true`      |
//! | `label!="v"`    | `not_literal_or`, `groupBy: true`  |
//! | `label=~"..."`  | rejected                           |
//! | `label!~"..."`  | rejected                           |
//!
//! `groupBy` is always set and the aggregator is always `none` so the backend
//! returns every series with its full tag set; the merge step keys on it.

use common::prompb::{self, METRIC_NAME_LABEL};

use crate::error::{OpenTsdbError, TranslateError};
use crate::matcher::{LabelMatcher, MatchType, SeriesMatcher};
use crate::types::{AGGREGATOR_NONE, Filter, FilterType, QueryRequest, SubQuery, TagValue};

/// A single remote_read query with validated matchers
#[derive(Debug, Clone)]
pub struct ReadQuery {
    /// Milliseconds since epoch
    pub start_ms: i64,
    /// Milliseconds since epoch
    pub end_ms: i64,
    pub matchers: Vec<LabelMatcher>,
}

impl ReadQuery {
    /// Local evaluation of this query's matchers, see [`SeriesMatcher`]
    pub fn series_matcher(&self) -> SeriesMatcher {
        SeriesMatcher(self.matchers.clone())
    }
}

impl TryFrom<&prompb::Query> for ReadQuery {
    type Error = OpenTsdbError;

    fn try_from(query: &prompb::Query) -> Result<Self, Self::Error> {
        let matchers = query
            .matchers
            .iter()
            .map(LabelMatcher::try_from)
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            start_ms: query.start_timestamp_ms,
            end_ms: query.end_timestamp_ms,
            matchers,
        })
    }
}

/// Milliseconds to OpenTSDB's second resolution, truncating towards the past
pub fn millis_to_seconds(ms: i64) -> i64 {
    ms.div_euclid(1000)
}

#[derive(Debug, Clone)]
pub struct QueryTranslator {
    empty_tag_value: String,
}

impl QueryTranslator {
    /// `empty_tag_value` must match what the write path substitutes for empty tags
    pub fn new(empty_tag_value: impl Into<String>) -> Self {
        Self {
            empty_tag_value: empty_tag_value.into(),
        }
    }

    pub fn translate(&self, query: &ReadQuery) -> Result<QueryRequest, TranslateError> {
        let mut metric = None;
        let mut filters = Vec::with_capacity(query.matchers.len());

        for m in &query.matchers {
            if m.name == METRIC_NAME_LABEL {
                if m.match_type != MatchType::Equal {
                    return Err(TranslateError::MetricNameMatcher {
                        match_type: m.match_type,
                    });
                }
                if metric.replace(TagValue::new(m.value.as_str())).is_some() {
                    return Err(TranslateError::DuplicateMetricName);
                }
                continue;
            }

            let filter_type = match m.match_type {
                MatchType::Equal => FilterType::LiteralOr,
                MatchType::NotEqual => FilterType::NotLiteralOr,
                match_type @ (MatchType::RegexMatch | MatchType::RegexNoMatch) => {
                    return Err(TranslateError::UnsupportedRegex {
                        label: m.name.clone(),
                        match_type,
                    });
                }
            };

            filters.push(Filter {
                filter_type,
                tagk: m.name.clone(),
                filter: TagValue::or_placeholder(&m.value, &self.empty_tag_value).into_string(),
                group_by: true,
            });
        }

        let metric = metric.ok_or(TranslateError::MissingMetricName)?;

        Ok(QueryRequest {
            start: millis_to_seconds(query.start_ms),
            end: millis_to_seconds(query.end_ms),
            queries: vec![SubQuery {
                metric,
                filters,
                aggregator: AGGREGATOR_NONE.to_string(),
            }],
        })
    }
}
