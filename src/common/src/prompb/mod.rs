//! Prometheus remote storage wire format
//!
//! Both remote_write and remote_read bodies are protobuf messages compressed with
//! snappy in block format (not framed).

pub mod proto;

use prost::Message;

pub use proto::{
    Label, LabelMatcher, Query, QueryResult, ReadRequest, ReadResponse, Sample, TimeSeries,
    WriteRequest, label_matcher,
};

/// Content type for Prometheus remote storage requests and responses
pub const PROTOBUF_CONTENT_TYPE: &str = "application/x-protobuf";

/// Content encoding for Prometheus remote storage bodies (snappy compression)
pub const SNAPPY_CONTENT_ENCODING: &str = "snappy";

/// Header announcing the remote_read protocol version
pub const HEADER_REMOTE_READ_VERSION: &str = "X-Prometheus-Remote-Read-Version";

/// Header announcing the remote_write protocol version
pub const HEADER_REMOTE_WRITE_VERSION: &str = "X-Prometheus-Remote-Write-Version";

/// Label holding the metric name
pub const METRIC_NAME_LABEL: &str = "__name__";

/// Decompress a snappy block and decode the protobuf message inside it
pub fn decode_snappy<M: Message + Default>(data: &[u8]) -> anyhow::Result<M> {
    let decompressed = snap::raw::Decoder::new()
        .decompress_vec(data)
        .map_err(|e| anyhow::anyhow!("Snappy decompression failed: {e}"))?;

    M::decode(decompressed.as_slice()).map_err(|e| anyhow::anyhow!("Protobuf decode failed: {e}"))
}

/// Encode a protobuf message and compress it as a snappy block
pub fn encode_snappy<M: Message>(message: &M) -> anyhow::Result<Vec<u8>> {
    let proto_bytes = message.encode_to_vec();

    snap::raw::Encoder::new()
        .compress_vec(&proto_bytes)
        .map_err(|e| anyhow::anyhow!("Snappy compression failed: {e}"))
}

pub fn decode_write_request(data: &[u8]) -> anyhow::Result<WriteRequest> {
    decode_snappy(data)
}

pub fn decode_read_request(data: &[u8]) -> anyhow::Result<ReadRequest> {
    decode_snappy(data)
}

pub fn encode_read_response(response: &ReadResponse) -> anyhow::Result<Vec<u8>> {
    encode_snappy(response)
}
