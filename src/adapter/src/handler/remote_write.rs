//! Prometheus remote_write handler
//!
//! - Content-Type: `application/x-protobuf`
//! - Content-Encoding: `snappy` (block format, not framed)
//! - Endpoint: `POST /write`

use axum::{
    body::Bytes,
    extract::State,
    http::{HeaderMap, StatusCode},
};
use common::prompb::{HEADER_REMOTE_WRITE_VERSION, decode_write_request};
use opentsdb::samples_from_write_request;

use crate::AdapterState;
use crate::error::AdapterError;

/// Axum handler for POST /write
///
/// Every sample of every series is forwarded to OpenTSDB as one data point.
pub async fn handle_remote_write(
    State(state): State<AdapterState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<StatusCode, AdapterError> {
    let version = headers
        .get(HEADER_REMOTE_WRITE_VERSION)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("0.1.0");

    let request = decode_write_request(&body).map_err(|e| {
        tracing::error!(error = ?e, "Failed to decode remote_write request");
        AdapterError::Decode(format!("{e:#}"))
    })?;

    let samples = samples_from_write_request(&request);
    if samples.is_empty() {
        tracing::debug!("Empty remote_write request, skipping");
        return Ok(StatusCode::NO_CONTENT);
    }

    let sent = state.client.write(&samples).await.map_err(|e| {
        tracing::warn!(error = %e, "Failed to write samples to OpenTSDB");
        e
    })?;

    tracing::info!(
        version = %version,
        series_count = request.timeseries.len(),
        sample_count = samples.len(),
        sent,
        "Handled remote_write request"
    );

    // Prometheus expects 204 No Content on success
    Ok(StatusCode::NO_CONTENT)
}
