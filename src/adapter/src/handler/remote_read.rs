//! Prometheus remote_read handler
//!
//! Request and response bodies are snappy-compressed protobuf
//! (`prometheus.ReadRequest` / `prometheus.ReadResponse`).

use axum::{
    body::Bytes,
    extract::State,
    http::{
        HeaderMap,
        header::{CONTENT_ENCODING, CONTENT_TYPE},
    },
    response::{IntoResponse, Response},
};
use common::prompb::{
    HEADER_REMOTE_READ_VERSION, PROTOBUF_CONTENT_TYPE, SNAPPY_CONTENT_ENCODING,
    decode_read_request, encode_read_response,
};

use crate::AdapterState;
use crate::error::AdapterError;

/// Axum handler for POST /read
pub async fn handle_remote_read(
    State(state): State<AdapterState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Response, AdapterError> {
    let version = headers
        .get(HEADER_REMOTE_READ_VERSION)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("0.1.0");

    let request = decode_read_request(&body).map_err(|e| {
        tracing::error!(error = ?e, "Failed to decode remote_read request");
        AdapterError::Decode(format!("{e:#}"))
    })?;

    let response = state.client.read(&request).await.map_err(|e| {
        tracing::warn!(error = %e, query_count = request.queries.len(), "Remote read failed");
        e
    })?;

    let series_count: usize = response.results.iter().map(|r| r.timeseries.len()).sum();
    let encoded = encode_read_response(&response).map_err(|e| {
        tracing::error!(error = ?e, "Failed to encode remote_read response");
        AdapterError::Encode(format!("{e:#}"))
    })?;

    tracing::info!(
        version = %version,
        query_count = request.queries.len(),
        series_count,
        "Handled remote_read request"
    );

    Ok((
        [
            (CONTENT_TYPE, PROTOBUF_CONTENT_TYPE),
            (CONTENT_ENCODING, SNAPPY_CONTENT_ENCODING),
        ],
        encoded,
    )
        .into_response())
}
