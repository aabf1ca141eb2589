use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;
use switchboard_core::model::StreamId;
use thiserror::Error;

/// Everything a single broker request can fail with.
///
/// None of these stop the broker; each one ends only the request (and, for
/// negotiation, the half-built session) that produced it.
#[derive(Debug, Error)]
pub enum BrokerError {
    #[error("malformed request: {0}")]
    MalformedRequest(String),

    #[error("negotiation failed: {0}")]
    NegotiationFailure(String),

    #[error("unknown stream: {0}")]
    UnknownStream(StreamId),

    #[error("candidate rejected: {0}")]
    CandidateRejected(String),
}

pub type BrokerResult<T> = Result<T, BrokerError>;

impl BrokerError {
    pub fn status(&self) -> StatusCode {
        match self {
            BrokerError::MalformedRequest(_) => StatusCode::BAD_REQUEST,
            BrokerError::NegotiationFailure(_) => StatusCode::UNPROCESSABLE_ENTITY,
            BrokerError::UnknownStream(_) => StatusCode::NOT_FOUND,
            BrokerError::CandidateRejected(_) => StatusCode::SERVICE_UNAVAILABLE,
        }
    }
}

impl From<anyhow::Error> for BrokerError {
    fn from(e: anyhow::Error) -> Self {
        BrokerError::NegotiationFailure(format!("{e:#}"))
    }
}

impl IntoResponse for BrokerError {
    fn into_response(self) -> Response {
        let body = Json(json!({ "error": self.to_string() }));
        (self.status(), body).into_response()
    }
}
