use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use opentsdb::OpenTsdbError;

/// Errors that can occur while serving remote storage requests
#[derive(Debug, thiserror::Error)]
pub enum AdapterError {
    /// Body was not a snappy-compressed protobuf of the expected message
    #[error("Decode error: {0}")]
    Decode(String),

    #[error("Encode error: {0}")]
    Encode(String),

    #[error(transparent)]
    OpenTsdb(#[from] OpenTsdbError),
}

impl AdapterError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::Decode(_) => StatusCode::BAD_REQUEST,
            Self::Encode(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::OpenTsdb(err) => match err {
                OpenTsdbError::Translation(_) | OpenTsdbError::InvalidMatcher(_) => {
                    StatusCode::BAD_REQUEST
                }
                OpenTsdbError::Transport(_)
                | OpenTsdbError::BackendStatus { .. }
                | OpenTsdbError::Decode(_) => StatusCode::BAD_GATEWAY,
                OpenTsdbError::DeadlineExceeded { .. } => StatusCode::GATEWAY_TIMEOUT,
                _ => StatusCode::INTERNAL_SERVER_ERROR,
            },
        }
    }
}

impl IntoResponse for AdapterError {
    fn into_response(self) -> Response {
        (self.status_code(), self.to_string()).into_response()
    }
}
