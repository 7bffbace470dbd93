//! Write path: Prometheus samples → OpenTSDB `/api/put` data points

use std::collections::HashMap;

use common::prompb::{METRIC_NAME_LABEL, WriteRequest};

use crate::translate::millis_to_seconds;
use crate::types::{PutRequest, TagValue};

/// A single sample with its full label set (including `__name__`)
#[derive(Debug, Clone, PartialEq)]
pub struct MetricSample {
    pub labels: HashMap<String, String>,
    /// Milliseconds since epoch
    pub timestamp_ms: i64,
    pub value: f64,
}

impl MetricSample {
    pub fn metric_name(&self) -> &str {
        self.labels
            .get(METRIC_NAME_LABEL)
            .map(String::as_str)
            .unwrap_or_default()
    }
}

/// Flatten a remote_write request into one [`MetricSample`] per (series, sample)
pub fn samples_from_write_request(request: &WriteRequest) -> Vec<MetricSample> {
    let capacity = request.timeseries.iter().map(|ts| ts.samples.len()).sum();
    let mut samples = Vec::with_capacity(capacity);

    for ts in &request.timeseries {
        let labels: HashMap<String, String> = ts
            .labels
            .iter()
            .map(|l| (l.name.clone(), l.value.clone()))
            .collect();
        for s in &ts.samples {
            samples.push(MetricSample {
                labels: labels.clone(),
                timestamp_ms: s.timestamp,
                value: s.value,
            });
        }
    }

    samples
}

/// OpenTSDB tags for a label set: every label except `__name__`
pub fn tags_from_labels(
    labels: &HashMap<String, String>,
    empty_tag_value: &str,
) -> HashMap<String, TagValue> {
    labels
        .iter()
        .filter(|(name, _)| name.as_str() != METRIC_NAME_LABEL)
        .map(|(name, value)| (name.clone(), TagValue::or_placeholder(value, empty_tag_value)))
        .collect()
}

/// Build the `/api/put` batch. NaN and infinite values cannot be stored and are
/// skipped, so the batch may be shorter than `samples`.
pub fn build_put_requests(samples: &[MetricSample], empty_tag_value: &str) -> Vec<PutRequest> {
    samples
        .iter()
        .filter(|s| {
            let storable = s.value.is_finite();
            if !storable {
                tracing::debug!(
                    metric = s.metric_name(),
                    value = s.value,
                    "Cannot send value to OpenTSDB, skipping sample"
                );
            }
            storable
        })
        .map(|s| PutRequest {
            metric: TagValue::new(s.metric_name()),
            timestamp: millis_to_seconds(s.timestamp_ms),
            value: s.value,
            tags: tags_from_labels(&s.labels, empty_tag_value),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::prompb::{Label, Sample, TimeSeries};

    fn sample(labels: &[(&str, &str)], timestamp_ms: i64, value: f64) -> MetricSample {
        MetricSample {
            labels: labels
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
            timestamp_ms,
            value,
        }
    }

    #[test]
    fn test_non_finite_values_are_dropped() {
        let samples = vec![
            sample(&[("__name__", "a")], 1_000, f64::NAN),
            sample(&[("__name__", "a")], 2_000, 2.75),
            sample(&[("__name__", "a")], 3_000, f64::INFINITY),
            sample(&[("__name__", "a")], 4_000, f64::NEG_INFINITY),
        ];

        let points = build_put_requests(&samples, "_empty_");
        assert_eq!(points.len(), 1);
        assert_eq!(points[0].value, 2.75);
        assert_eq!(points[0].timestamp, 2);
    }

    #[test]
    fn test_put_request_mapping() {
        let samples = vec![sample(
            &[("__name__", "http_requests_total"), ("method", "GET"), ("zone", "")],
            1_700_000_000_999,
            42.0,
        )];

        let points = build_put_requests(&samples, "_empty_");
        assert_eq!(points.len(), 1);

        let point = &points[0];
        assert_eq!(point.metric.as_str(), "http_requests_total");
        assert_eq!(point.timestamp, 1_700_000_000);
        assert_eq!(
            point.tags,
            HashMap::from([
                ("method".to_string(), TagValue::from("GET")),
                ("zone".to_string(), TagValue::from("_empty_")),
            ])
        );
    }

    #[test]
    fn test_flatten_write_request() {
        let request = WriteRequest {
            timeseries: vec![
                TimeSeries {
                    labels: vec![
                        Label {
                            name: "__name__".to_string(),
                            value: "up".to_string(),
                        },
                        Label {
                            name: "job".to_string(),
                            value: "api".to_string(),
                        },
                    ],
                    samples: vec![
                        Sample {
                            value: 1.0,
                            timestamp: 1_000,
                        },
                        Sample {
                            value: 0.0,
                            timestamp: 2_000,
                        },
                    ],
                },
                TimeSeries {
                    labels: vec![Label {
                        name: "__name__".to_string(),
                        value: "down".to_string(),
                    }],
                    samples: vec![Sample {
                        value: 5.0,
                        timestamp: 3_000,
                    }],
                },
            ],
        };

        let samples = samples_from_write_request(&request);
        assert_eq!(samples.len(), 3);
        assert_eq!(samples[0].metric_name(), "up");
        assert_eq!(samples[0].labels["job"], "api");
        assert_eq!(samples[1].timestamp_ms, 2_000);
        assert_eq!(samples[2].metric_name(), "down");
    }
}
