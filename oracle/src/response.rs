use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use primitives::oracle::ErrorResponse;

use crate::Error;

#[derive(Debug, PartialEq, Eq)]
pub enum ResponseError {
    NotFound(String),
    BadRequest(String),
    Conflict(String),
    /// The storage or the chain failed, the request can be retried.
    Unavailable(String),
    Internal(String),
}

impl ResponseError {
    pub fn status(&self) -> StatusCode {
        match self {
            ResponseError::NotFound(_) => StatusCode::NOT_FOUND,
            ResponseError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ResponseError::Conflict(_) => StatusCode::CONFLICT,
            ResponseError::Unavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            ResponseError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ResponseError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = match self {
            ResponseError::NotFound(message)
            | ResponseError::BadRequest(message)
            | ResponseError::Conflict(message)
            | ResponseError::Unavailable(message)
            | ResponseError::Internal(message) => message,
        };

        (status, Json(ErrorResponse { message })).into_response()
    }
}

impl From<Error> for ResponseError {
    fn from(error: Error) -> Self {
        let message = error.to_string();

        match error {
            Error::ChannelNotFound(_) => ResponseError::NotFound(message),
            Error::ChannelAlreadyExists(_) => ResponseError::Conflict(message),
            Error::Signing(_) | Error::StorageCorrupt(_) => ResponseError::Internal(message),
            error if error.is_retryable() => ResponseError::Unavailable(message),
            Error::Chain(_) => ResponseError::Unavailable(message),
            _ => ResponseError::BadRequest(message),
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use primitives::{storage, Address};

    #[test]
    fn error_status_codes() {
        let status = |error: Error| ResponseError::from(error).status();

        assert_eq!(
            StatusCode::NOT_FOUND,
            status(Error::ChannelNotFound("c1".parse().unwrap()))
        );
        assert_eq!(
            StatusCode::CONFLICT,
            status(Error::ChannelAlreadyExists("c1".parse().unwrap()))
        );
        assert_eq!(
            StatusCode::BAD_REQUEST,
            status(Error::SignatureInvalid(Address::default()))
        );
        assert_eq!(StatusCode::BAD_REQUEST, status(Error::InvalidBalance));
        assert_eq!(
            StatusCode::SERVICE_UNAVAILABLE,
            status(storage::Error::Unavailable("offline".into()).into())
        );
        assert_eq!(StatusCode::SERVICE_UNAVAILABLE, status(Error::Timeout));
        assert_eq!(
            StatusCode::INTERNAL_SERVER_ERROR,
            status(storage::Error::NotFound("bafy".into()).into())
        );
        assert_eq!(
            StatusCode::INTERNAL_SERVER_ERROR,
            status(storage::Error::InvalidResponse("not hex".into()).into())
        );
    }
}
