use std::time::Duration;

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error;

/// How a relay run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelayStatus {
    /// The upstream stream ended and every token was delivered.
    Completed,
    /// The request could not be turned into a conversation.
    InvalidRequest,
    /// The upstream could not be reached or refused the request.
    UpstreamUnavailable,
    /// The upstream stream broke after it was opened.
    StreamError,
    /// The client went away, or a downstream deadline passed.
    DownstreamWriteFailed,
    /// The server cancelled the run.
    Cancelled,
}

impl RelayStatus {
    /// Label used in metrics, traces and the error log.
    pub fn label(self) -> &'static str {
        match self {
            RelayStatus::Completed => "completed",
            RelayStatus::InvalidRequest => "invalid_request",
            RelayStatus::UpstreamUnavailable => "upstream_unavailable",
            RelayStatus::StreamError => "stream_error",
            RelayStatus::DownstreamWriteFailed => "downstream_write_failed",
            RelayStatus::Cancelled => "cancelled",
        }
    }
}

/// Failures talking to the completion upstream.
#[derive(Debug, Error)]
pub enum UpstreamError {
    #[error("Failed to reach the model: {0}")]
    Connection(String),

    #[error("Model returned status {status}: {message}")]
    Status { status: u16, message: String },

    #[error("Model stream interrupted: {0}")]
    Stream(String),
}

#[derive(Debug, Error)]
pub enum RelayError {
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Error communicating with model: {0}")]
    UpstreamUnavailable(#[source] UpstreamError),

    #[error("Model stream failed: {0}")]
    Stream(#[source] UpstreamError),

    #[error("Client connection closed")]
    DownstreamClosed,

    #[error("No data could be sent within {0:?}")]
    DeadlineExceeded(Duration),

    #[error("Request cancelled")]
    Cancelled,
}

impl RelayError {
    pub fn status(&self) -> RelayStatus {
        match self {
            Self::InvalidRequest(_) => RelayStatus::InvalidRequest,
            Self::UpstreamUnavailable(_) => RelayStatus::UpstreamUnavailable,
            Self::Stream(_) => RelayStatus::StreamError,
            Self::DownstreamClosed | Self::DeadlineExceeded(_) => RelayStatus::DownstreamWriteFailed,
            Self::Cancelled => RelayStatus::Cancelled,
        }
    }

    /// The HTTP status for this error when no byte has been sent yet. A
    /// closed client gets no response at all.
    pub fn status_code(&self) -> Option<StatusCode> {
        match self {
            Self::InvalidRequest(_) => Some(StatusCode::BAD_REQUEST),
            Self::UpstreamUnavailable(_) | Self::Stream(_) => Some(StatusCode::BAD_GATEWAY),
            Self::DeadlineExceeded(_) => Some(StatusCode::GATEWAY_TIMEOUT),
            Self::Cancelled => Some(StatusCode::SERVICE_UNAVAILABLE),
            Self::DownstreamClosed => None,
        }
    }

    /// Whether the error is counted as a failure. Cancellation is a clean stop.
    pub fn is_failure(&self) -> bool {
        !matches!(self, Self::Cancelled)
    }

    fn public_message(&self) -> &'static str {
        match self {
            Self::InvalidRequest(_) => "Invalid request body",
            Self::UpstreamUnavailable(_) | Self::Stream(_) => "Error communicating with model",
            Self::DeadlineExceeded(_) => "Model did not respond in time",
            Self::Cancelled => "Server is shutting down",
            Self::DownstreamClosed => "",
        }
    }
}

impl IntoResponse for RelayError {
    fn into_response(self) -> Response {
        let status = self.status_code().unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);

        if status.is_server_error() {
            log::error!("Chat request failed ({}): {self}", status.as_u16());
        }

        (status, self.public_message()).into_response()
    }
}
