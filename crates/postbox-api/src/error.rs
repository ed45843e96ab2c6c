use axum::{
    Json,
    http::{HeaderValue, StatusCode, header},
    response::{IntoResponse, Response},
};
use postbox_store::{ErrorKind, StoreError};
use postbox_types::api::ErrorResponse;

const BASIC_CHALLENGE: &str = "Basic realm=\"postbox\"";

/// Boundary representation of a [`StoreError`].
#[derive(Debug)]
pub struct ApiError(pub StoreError);

impl ApiError {
    pub fn unauthorized(description: &str) -> Self {
        Self(StoreError::Unauthorized(description.to_string()))
    }

    pub fn status(&self) -> StatusCode {
        match self.0.kind() {
            ErrorKind::BadRequest => StatusCode::BAD_REQUEST,
            ErrorKind::Unauthorized => StatusCode::UNAUTHORIZED,
            ErrorKind::NotFound => StatusCode::NOT_FOUND,
            ErrorKind::Conflict => StatusCode::CONFLICT,
            ErrorKind::Busy => StatusCode::SERVICE_UNAVAILABLE,
            ErrorKind::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<StoreError> for ApiError {
    fn from(e: StoreError) -> Self {
        Self(e)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let kind = self.0.kind();

        // Engine and cipher details stay in the logs.
        let description = match kind {
            ErrorKind::Internal => "Internal server error".to_string(),
            _ => self.0.detail(),
        };

        let mut response = (
            status,
            Json(ErrorResponse {
                error: kind.as_str().to_string(),
                description,
            }),
        )
            .into_response();

        if status == StatusCode::UNAUTHORIZED {
            response
                .headers_mut()
                .insert(header::WWW_AUTHENTICATE, HeaderValue::from_static(BASIC_CHALLENGE));
        }
        response
    }
}
