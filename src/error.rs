use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, error};

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    /// Unknown or unusable identity. Surfaces as a bodiless 404.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("event stream error: {0}")]
    EventStream(String),

    #[error("websocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),

    #[error("no reply within {0:?}")]
    Timeout(Duration),

    #[error("connection closed before a reply arrived")]
    ConnectionClosed,
}

impl Error {
    pub fn not_found(id: &str) -> Self {
        Self::InvalidArgument(format!("no user with id {id}"))
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        match self {
            Error::InvalidArgument(reason) => {
                debug!("{reason}");
                StatusCode::NOT_FOUND.into_response()
            }
            other => {
                error!("request failed: {other}");
                StatusCode::INTERNAL_SERVER_ERROR.into_response()
            }
        }
    }
}
