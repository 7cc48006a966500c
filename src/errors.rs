use crate::day_view::ViewError;
use axum::http::StatusCode;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("todo {0} not found")]
    NotFound(String),
    #[error("not signed in or session expired")]
    Unauthorized,
    #[error("duplicate entry: {0}")]
    Conflict(String),
    #[error("remote store returned {status}: {message}")]
    Remote { status: u16, message: String },
    #[error("remote store unreachable: {0}")]
    Http(#[from] reqwest::Error),
    #[error("local storage failed: {0}")]
    Storage(#[from] std::io::Error),
    #[error("malformed payload: {0}")]
    Decode(#[from] serde_json::Error),
}

#[derive(Debug)]
pub struct AppError {
    pub status: StatusCode,
    pub message: String,
}

impl AppError {
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            message: message.into(),
        }
    }

    pub fn internal(err: impl std::error::Error) -> Self {
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            message: err.to_string(),
        }
    }

    pub fn with_message(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }
}

impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        Self::internal(err)
    }
}

impl From<StoreError> for AppError {
    fn from(err: StoreError) -> Self {
        Self::with_message(store_status(&err), err.to_string())
    }
}

pub(crate) fn store_status(err: &StoreError) -> StatusCode {
    match err {
        StoreError::NotFound(_) => StatusCode::NOT_FOUND,
        StoreError::Unauthorized => StatusCode::UNAUTHORIZED,
        StoreError::Conflict(_) => StatusCode::CONFLICT,
        StoreError::Remote { .. } | StoreError::Http(_) => StatusCode::BAD_GATEWAY,
        StoreError::Storage(_) | StoreError::Decode(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl axum::response::IntoResponse for AppError {
    fn into_response(self) -> axum::response::Response {
        (self.status, self.message).into_response()
    }
}

impl From<ViewError> for AppError {
    fn from(err: ViewError) -> Self {
        match err {
            ViewError::EmptyTask => Self::bad_request(err.to_string()),
            ViewError::Missing(_) => Self::with_message(StatusCode::NOT_FOUND, err.to_string()),
            ViewError::Persist { message, source } => {
                Self::with_message(store_status(&source), format!("{message} ({source})"))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn store_errors_map_to_http_statuses() {
        let cases = [
            (StoreError::NotFound("7".into()), StatusCode::NOT_FOUND),
            (StoreError::Unauthorized, StatusCode::UNAUTHORIZED),
            (StoreError::Conflict("dup".into()), StatusCode::CONFLICT),
            (
                StoreError::Remote {
                    status: 500,
                    message: "boom".into(),
                },
                StatusCode::BAD_GATEWAY,
            ),
        ];
        for (err, status) in cases {
            assert_eq!(AppError::from(err).status, status);
        }
    }

    #[test]
    fn view_errors_keep_their_message() {
        let empty = AppError::from(ViewError::EmptyTask);
        assert_eq!(empty.status, StatusCode::BAD_REQUEST);
        assert_eq!(empty.message, "Please enter a todo task");

        let persist = AppError::from(ViewError::Persist {
            message: "Failed to delete todo",
            source: StoreError::Unauthorized,
        });
        assert_eq!(persist.status, StatusCode::UNAUTHORIZED);
        assert!(persist.message.starts_with("Failed to delete todo"));
    }
}
