use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;

use crate::MarketError;

/// HTTP face of [`MarketError`].
#[derive(Debug)]
pub struct ApiError(pub MarketError);

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match &self.0 {
            MarketError::InvalidOperation(_) | MarketError::InvalidArgument(_) | MarketError::Validation(_) => {
                StatusCode::BAD_REQUEST
            }
            MarketError::ProductNotFound | MarketError::OrderNotFound | MarketError::NegotiationNotFound => {
                StatusCode::NOT_FOUND
            }
            MarketError::AccessDenied => StatusCode::FORBIDDEN,
            MarketError::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = if status == StatusCode::INTERNAL_SERVER_ERROR {
            tracing::error!("Internal Server Error: {}", self.0);
            "Internal Server Error".to_string()
        } else {
            self.0.to_string()
        };

        (status, Json(json!({ "status": "error", "message": message }))).into_response()
    }
}

impl<E> From<E> for ApiError
where
    E: Into<MarketError>,
{
    fn from(err: E) -> Self {
        Self(err.into())
    }
}
