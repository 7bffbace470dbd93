//! Prometheus remote storage on top of the OpenTSDB HTTP API
//!
//! The read path translates each Prometheus query into an OpenTSDB query
//! ([`translate`]), runs them concurrently ([`fanout`]) and merges the returned
//! fragments into de-duplicated, sorted time series ([`merge`]). The write path
//! ([`write`]) maps samples to `/api/put` data points.

pub mod client;
pub mod error;
pub mod fanout;
pub mod http;
pub mod matcher;
pub mod merge;
pub mod series_key;
pub mod translate;
pub mod types;
pub mod write;

pub use client::Client;
pub use error::{OpenTsdbError, TranslateError};
pub use matcher::{LabelMatcher, MatchType, SeriesMatcher};
pub use translate::{QueryTranslator, ReadQuery};
pub use types::TagValue;
pub use write::{MetricSample, samples_from_write_request};
