//! Merging of OpenTSDB result fragments into Prometheus time series
//!
//! Fragments are grouped by [`series_key`] of their tag set. Within a series,
//! samples are kept sorted by timestamp with at most one sample per timestamp;
//! the first value folded for a timestamp wins.

use std::collections::HashMap;
use std::collections::hash_map::Entry;

use common::prompb::{Label, METRIC_NAME_LABEL, Sample, TimeSeries};

use crate::series_key::{SeriesKey, series_key};
use crate::types::{QueryResult, TagValue};

/// One logical series being assembled from fragments
#[derive(Debug, Clone, PartialEq)]
pub struct MergedSeries {
    /// Metric name of the first fragment seen for this tag set
    pub metric: TagValue,
    pub tags: HashMap<String, TagValue>,
    /// Sorted by timestamp, unique timestamps, milliseconds
    pub samples: Vec<Sample>,
}

impl MergedSeries {
    /// Labels are the tags plus `__name__`, sorted by label name
    pub fn into_timeseries(self) -> TimeSeries {
        let mut labels: Vec<Label> = self
            .tags
            .into_iter()
            .map(|(name, value)| Label {
                name,
                value: value.into_string(),
            })
            .collect();
        labels.push(Label {
            name: METRIC_NAME_LABEL.to_string(),
            value: self.metric.into_string(),
        });
        labels.sort_unstable_by(|a, b| a.name.cmp(&b.name));

        TimeSeries {
            labels,
            samples: self.samples,
        }
    }
}

/// Series key → series, the shared state of one read call
#[derive(Debug, Default)]
pub struct SeriesAccumulator {
    series: HashMap<SeriesKey, MergedSeries>,
}

impl SeriesAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.series.len()
    }

    pub fn is_empty(&self) -> bool {
        self.series.is_empty()
    }

    #[cfg(test)]
    pub fn get(&self, tags: &HashMap<String, TagValue>) -> Option<&MergedSeries> {
        self.series.get(&series_key(tags))
    }

    /// Fold one backend fragment into the series sharing its tag set
    pub fn fold(&mut self, fragment: QueryResult) {
        let incoming = samples_from_dps(&fragment.dps);

        match self.series.entry(series_key(&fragment.tags)) {
            Entry::Vacant(entry) => {
                entry.insert(MergedSeries {
                    metric: fragment.metric,
                    tags: fragment.tags,
                    samples: incoming,
                });
            }
            Entry::Occupied(mut entry) => {
                let series = entry.get_mut();
                if series.metric != fragment.metric {
                    tracing::warn!(
                        kept = %series.metric,
                        dropped = %fragment.metric,
                        "Fragments with identical tags carry different metric names, keeping the first"
                    );
                }
                let existing = std::mem::take(&mut series.samples);
                series.samples = merge_samples(existing, incoming);
            }
        }
    }

    pub fn fold_all(&mut self, fragments: impl IntoIterator<Item = QueryResult>) {
        for fragment in fragments {
            self.fold(fragment);
        }
    }

    /// Flatten into time series; output order is unspecified
    pub fn into_timeseries(self) -> Vec<TimeSeries> {
        self.series
            .into_values()
            .map(MergedSeries::into_timeseries)
            .collect()
    }
}

/// Convert OpenTSDB data points (seconds) to samples (milliseconds), sorted by
/// timestamp and then by value. Points whose timestamp does not fit in
/// milliseconds are skipped.
pub fn samples_from_dps(dps: &HashMap<i64, f64>) -> Vec<Sample> {
    let mut samples: Vec<Sample> = dps
        .iter()
        .filter_map(|(&ts, &value)| match ts.checked_mul(1000) {
            Some(timestamp) => Some(Sample { value, timestamp }),
            None => {
                tracing::warn!(timestamp = ts, "Data point timestamp out of range, skipping");
                None
            }
        })
        .collect();
    samples.sort_unstable_by(|a, b| {
        a.timestamp
            .cmp(&b.timestamp)
            .then_with(|| a.value.total_cmp(&b.value))
    });
    samples
}

/// Merge two sample lists sorted by timestamp, dropping duplicate timestamps.
/// On a tie the sample from `existing` is kept.
pub fn merge_samples(existing: Vec<Sample>, incoming: Vec<Sample>) -> Vec<Sample> {
    if existing.is_empty() {
        return incoming;
    }
    if incoming.is_empty() {
        return existing;
    }

    let mut result = Vec::with_capacity(existing.len() + incoming.len());
    let (mut i, mut j) = (0, 0);
    while i < existing.len() && j < incoming.len() {
        let (a, b) = (existing[i], incoming[j]);
        if a.timestamp < b.timestamp {
            result.push(a);
            i += 1;
        } else if a.timestamp > b.timestamp {
            result.push(b);
            j += 1;
        } else {
            result.push(a);
            i += 1;
            j += 1;
        }
    }
    result.extend_from_slice(&existing[i..]);
    result.extend_from_slice(&incoming[j..]);
    result
}
