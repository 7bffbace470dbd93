use std::time::Duration;

use crate::matcher::MatchType;

/// A Prometheus query that cannot be expressed as an OpenTSDB query
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TranslateError {
    #[error("query has no equality matcher on the metric name")]
    MissingMetricName,
    #[error("query has more than one matcher on the metric name")]
    DuplicateMetricName,
    #[error("metric name matcher not representable: {match_type} is not supported on __name__")]
    MetricNameMatcher { match_type: MatchType },
    #[error("regex matchers not supported by this backend: {label}{match_type}")]
    UnsupportedRegex { label: String, match_type: MatchType },
}

/// Errors from the OpenTSDB client
#[derive(Debug, thiserror::Error)]
pub enum OpenTsdbError {
    #[error("Translation error: {0}")]
    Translation(#[from] TranslateError),
    #[error("Invalid label matcher: {0}")]
    InvalidMatcher(String),
    #[error("HTTP error: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("OpenTSDB returned status {status}: {body}")]
    BackendStatus { status: u16, body: String },
    #[error("Failed to encode request: {0}")]
    Encode(#[source] serde_json::Error),
    #[error("Failed to decode response: {0}")]
    Decode(#[source] serde_json::Error),
    #[error("Read deadline of {timeout:?} exceeded")]
    DeadlineExceeded { timeout: Duration },
    #[error("Invalid OpenTSDB URL: {0}")]
    InvalidUrl(#[from] url::ParseError),
    #[error("Internal error: {0}")]
    Internal(String),
}

impl OpenTsdbError {
    /// True when the caller sent something this backend cannot answer
    pub fn is_bad_request(&self) -> bool {
        matches!(self, Self::Translation(_) | Self::InvalidMatcher(_))
    }
}
