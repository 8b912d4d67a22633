use axum::{http::StatusCode, response::{IntoResponse, Response}};
use thiserror::Error;

pub type HubResult<T> = Result<T, HubError>;

/// Failures inside the hub. None of them are fatal to the process, each one
/// ends either a single connection or a single message.
#[derive(Debug, Error)]
pub enum HubError {
    #[error("no valid session")]
    Unauthenticated,

    #[error("room {0} not found")]
    RoomNotFound(String),

    #[error("store failure: {0:#}")]
    Store(anyhow::Error),

    #[error("connection closed before joining a room")]
    ClosedBeforeJoin,

    #[error("malformed join message: {0}")]
    BadJoin(#[source] serde_json::Error),
}

impl From<anyhow::Error> for HubError {
    fn from(err: anyhow::Error) -> Self {
        Self::Store(err)
    }
}

impl IntoResponse for HubError {
    fn into_response(self) -> Response {
        let status = match self {
            HubError::Unauthenticated => StatusCode::UNAUTHORIZED,
            HubError::RoomNotFound(_) => StatusCode::NOT_FOUND,
            HubError::ClosedBeforeJoin | HubError::BadJoin(_) => StatusCode::BAD_REQUEST,
            HubError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        (status, self.to_string()).into_response()
    }
}
