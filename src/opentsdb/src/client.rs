use std::sync::Arc;
use std::time::Duration;

use common::config::{HttpClientConfig, OpenTsdbConfig};
use common::prompb::{QueryResult as PromQueryResult, ReadRequest, ReadResponse};

use crate::error::OpenTsdbError;
use crate::fanout;
use crate::http::{HttpBackend, build_http_client};
use crate::translate::{QueryTranslator, ReadQuery};
use crate::write::{MetricSample, build_put_requests};

/// Sends Prometheus samples to OpenTSDB and answers Prometheus read requests from it
#[derive(Debug, Clone)]
pub struct Client {
    backend: Arc<HttpBackend>,
    translator: QueryTranslator,
    timeout: Duration,
    empty_tag_value: String,
    max_concurrent_queries: Option<usize>,
}

impl Client {
    pub fn new(config: &OpenTsdbConfig, http: &HttpClientConfig) -> Result<Self, OpenTsdbError> {
        let http = build_http_client(http)?;
        let backend = HttpBackend::new(http, &config.url)?;

        Ok(Self {
            backend: Arc::new(backend),
            translator: QueryTranslator::new(config.empty_tag_value.as_str()),
            timeout: config.timeout,
            empty_tag_value: config.empty_tag_value.clone(),
            max_concurrent_queries: config.max_concurrent_queries,
        })
    }

    /// Identifies the client as an OpenTSDB client
    pub fn name(&self) -> &'static str {
        "opentsdb"
    }

    /// Send a batch of samples; returns the number of data points transmitted
    pub async fn write(&self, samples: &[MetricSample]) -> Result<usize, OpenTsdbError> {
        let points = build_put_requests(samples, &self.empty_tag_value);
        if points.is_empty() {
            tracing::debug!(
                submitted = samples.len(),
                "No storable samples in batch, nothing to send"
            );
            return Ok(0);
        }

        self.backend.put(&points, self.timeout).await?;

        tracing::debug!(
            submitted = samples.len(),
            sent = points.len(),
            "Wrote samples to OpenTSDB"
        );
        Ok(points.len())
    }

    /// Answer a remote_read request
    ///
    /// Every query is translated up front; one untranslatable query fails the whole
    /// request before anything is sent. All series end up in a single result.
    pub async fn read(&self, request: &ReadRequest) -> Result<ReadResponse, OpenTsdbError> {
        let queries = request
            .queries
            .iter()
            .map(ReadQuery::try_from)
            .collect::<Result<Vec<_>, _>>()?;

        self.read_queries(&queries).await
    }

    pub async fn read_queries(&self, queries: &[ReadQuery]) -> Result<ReadResponse, OpenTsdbError> {
        let requests = queries
            .iter()
            .map(|q| self.translator.translate(q))
            .collect::<Result<Vec<_>, _>>()?;

        let timeseries = fanout::execute(
            Arc::clone(&self.backend),
            requests,
            self.timeout,
            self.max_concurrent_queries,
        )
        .await?;

        tracing::debug!(
            queries = queries.len(),
            series = timeseries.len(),
            "Read from OpenTSDB"
        );

        Ok(ReadResponse {
            results: vec![PromQueryResult { timeseries }],
        })
    }
}
