use axum::http::{StatusCode, header};
use axum::response::{IntoResponse, Response};

#[derive(Debug)]
pub enum GitHttpError {
    BadRequest(String),
    Unauthorized,
    NotFound,
    Timeout,
    /// The message is logged, never sent to the client.
    Internal(String),
}

impl GitHttpError {
    pub fn internal(err: impl std::fmt::Display) -> Self {
        GitHttpError::Internal(err.to_string())
    }

    pub fn status(&self) -> StatusCode {
        match self {
            GitHttpError::BadRequest(_) => StatusCode::BAD_REQUEST,
            GitHttpError::Unauthorized => StatusCode::UNAUTHORIZED,
            GitHttpError::NotFound => StatusCode::NOT_FOUND,
            GitHttpError::Timeout => StatusCode::REQUEST_TIMEOUT,
            GitHttpError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl std::fmt::Display for GitHttpError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            GitHttpError::BadRequest(msg) => write!(f, "bad request: {msg}"),
            GitHttpError::Unauthorized => f.write_str("unauthorized"),
            GitHttpError::NotFound => f.write_str("not found"),
            GitHttpError::Timeout => f.write_str("timed out"),
            GitHttpError::Internal(msg) => write!(f, "internal error: {msg}"),
        }
    }
}

impl std::error::Error for GitHttpError {}

impl From<anyhow::Error> for GitHttpError {
    fn from(err: anyhow::Error) -> Self {
        GitHttpError::Internal(format!("{err:#}"))
    }
}

impl IntoResponse for GitHttpError {
    fn into_response(self) -> Response {
        match self {
            GitHttpError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg).into_response(),
            GitHttpError::Unauthorized => (
                StatusCode::UNAUTHORIZED,
                [(header::WWW_AUTHENTICATE, "Bearer realm=\"forge\"")],
                "unauthorized",
            )
                .into_response(),
            GitHttpError::NotFound => (StatusCode::NOT_FOUND, "not found").into_response(),
            GitHttpError::Timeout => (StatusCode::REQUEST_TIMEOUT, "timed out").into_response(),
            GitHttpError::Internal(msg) => {
                tracing::error!(error = %msg, "git http request failed");
                (StatusCode::INTERNAL_SERVER_ERROR, "internal server error").into_response()
            }
        }
    }
}
