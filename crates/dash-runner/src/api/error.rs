use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use dash_billing::BillingError;
use serde::Serialize;
use thiserror::Error;
use tracing::error;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    BadRequest(String),
    #[error("{0}")]
    Unauthorized(String),
    #[error("{0}")]
    NotFound(String),
    #[error("{0}")]
    Unavailable(String),
    #[error(transparent)]
    Billing(#[from] BillingError),
    #[error("{0:#}")]
    Internal(#[from] anyhow::Error),
}

#[derive(Serialize)]
struct ErrorBody {
    code: u16,
    message: String,
}

impl ApiError {
    fn status(&self) -> StatusCode {
        match self {
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Unavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            Self::Billing(e) => match e {
                BillingError::MissingField(_) | BillingError::Signature(_) | BillingError::Malformed(_) => {
                    StatusCode::BAD_REQUEST
                }
                BillingError::NoCustomer(_) => StatusCode::NOT_FOUND,
                BillingError::Config(_) => StatusCode::SERVICE_UNAVAILABLE,
                BillingError::Provider(_) | BillingError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
            },
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            error!("[api] {self}");
        }
        let body = Json(ErrorBody { code: status.as_u16(), message: self.to_string() });
        (status, body).into_response()
    }
}

pub type ApiResult<T> = Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn billing_errors_map_to_statuses() {
        let cases = [
            (BillingError::MissingField("x".into()), StatusCode::BAD_REQUEST),
            (BillingError::Signature("x".into()), StatusCode::BAD_REQUEST),
            (BillingError::NoCustomer("x".into()), StatusCode::NOT_FOUND),
            (BillingError::Config("x".into()), StatusCode::SERVICE_UNAVAILABLE),
            (BillingError::Provider("x".into()), StatusCode::INTERNAL_SERVER_ERROR),
        ];
        for (err, status) in cases {
            assert_eq!(ApiError::from(err).status(), status);
        }
    }
}
