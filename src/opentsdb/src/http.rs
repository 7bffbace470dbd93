use async_trait::async_trait;
use common::config::HttpClientConfig;
use reqwest::{StatusCode, Url};

use crate::error::OpenTsdbError;
use crate::fanout::QueryBackend;
use crate::types::{PutRequest, QueryRequest, QueryResult};

/// Endpoints are relative so a path prefix on the base URL is kept
pub const PUT_ENDPOINT: &str = "api/put";
pub const QUERY_ENDPOINT: &str = "api/query";

/// Build the shared HTTP client from explicit configuration
pub fn build_http_client(config: &HttpClientConfig) -> Result<reqwest::Client, OpenTsdbError> {
    let client = reqwest::Client::builder()
        .connect_timeout(config.connect_timeout)
        .tcp_keepalive(config.tcp_keepalive)
        .pool_idle_timeout(config.pool_idle_timeout)
        .danger_accept_invalid_certs(config.accept_invalid_certs)
        .build()?;
    Ok(client)
}

/// Thin wrapper around the OpenTSDB HTTP endpoints
#[derive(Debug, Clone)]
pub struct HttpBackend {
    http: reqwest::Client,
    put_url: Url,
    query_url: Url,
}

impl HttpBackend {
    pub fn new(http: reqwest::Client, base_url: &str) -> Result<Self, OpenTsdbError> {
        let mut base = Url::parse(base_url)?;
        if !base.path().ends_with('/') {
            let path = format!("{}/", base.path());
            base.set_path(&path);
        }

        let mut put_url = base.join(PUT_ENDPOINT)?;
        // Ask for a summary instead of an empty 204 so failures carry details
        put_url.set_query(Some("summary"));
        let query_url = base.join(QUERY_ENDPOINT)?;

        Ok(Self {
            http,
            put_url,
            query_url,
        })
    }

    #[cfg(test)]
    pub fn put_url(&self) -> &Url {
        &self.put_url
    }

    #[cfg(test)]
    pub fn query_url(&self) -> &Url {
        &self.query_url
    }

    /// POST one batch of data points; 200 and 204 count as success
    pub async fn put(
        &self,
        points: &[PutRequest],
        timeout: std::time::Duration,
    ) -> Result<(), OpenTsdbError> {
        let body = serde_json::to_vec(points).map_err(OpenTsdbError::Encode)?;

        let resp = self
            .http
            .post(self.put_url.clone())
            .header(reqwest::header::CONTENT_TYPE, "application/json")
            .timeout(timeout)
            .body(body)
            .send()
            .await?;

        match resp.status() {
            StatusCode::OK | StatusCode::NO_CONTENT => Ok(()),
            status => {
                let body = resp.text().await.unwrap_or_default();
                Err(OpenTsdbError::BackendStatus {
                    status: status.as_u16(),
                    body,
                })
            }
        }
    }
}

#[async_trait]
impl QueryBackend for HttpBackend {
    async fn query(&self, request: &QueryRequest) -> Result<Vec<QueryResult>, OpenTsdbError> {
        let body = serde_json::to_vec(request).map_err(OpenTsdbError::Encode)?;

        let resp = self
            .http
            .post(self.query_url.clone())
            .header(reqwest::header::CONTENT_TYPE, "application/json")
            .body(body)
            .send()
            .await?;

        let status = resp.status();
        let bytes = resp.bytes().await?;
        if status != StatusCode::OK {
            return Err(OpenTsdbError::BackendStatus {
                status: status.as_u16(),
                body: String::from_utf8_lossy(&bytes).into_owned(),
            });
        }

        serde_json::from_slice(&bytes).map_err(OpenTsdbError::Decode)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_endpoint_urls() {
        let backend = HttpBackend::new(reqwest::Client::new(), "http://tsdb:4242").unwrap();
        assert_eq!(backend.put_url().as_str(), "http://tsdb:4242/api/put?summary");
        assert_eq!(backend.query_url().as_str(), "http://tsdb:4242/api/query");
    }

    #[test]
    fn test_endpoint_urls_keep_base_path() {
        for base in ["http://proxy:8080/opentsdb", "http://proxy:8080/opentsdb/"] {
            let backend = HttpBackend::new(reqwest::Client::new(), base).unwrap();
            assert_eq!(
                backend.put_url().as_str(),
                "http://proxy:8080/opentsdb/api/put?summary"
            );
            assert_eq!(
                backend.query_url().as_str(),
                "http://proxy:8080/opentsdb/api/query"
            );
        }
    }

    #[test]
    fn test_invalid_base_url() {
        let err = HttpBackend::new(reqwest::Client::new(), "not a url").unwrap_err();
        assert!(matches!(err, OpenTsdbError::InvalidUrl(_)));
    }

    #[test]
    fn test_build_http_client_from_defaults() {
        assert!(build_http_client(&HttpClientConfig::default()).is_ok());
    }
}
