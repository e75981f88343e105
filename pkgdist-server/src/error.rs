// SPDX-FileCopyrightText: The pkgdist authors
// SPDX-License-Identifier: MPL-2.0

use axum::{
    Json,
    extract::rejection::BytesRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub(crate) enum ApiError {
    #[error("Package not found")]
    PackageNotFound,

    #[error("Distribution not found")]
    DistributionNotFound,

    /// No route matches the method and path.
    #[error("Not found")]
    RouteNotFound,

    /// The path segment is not an integer.
    #[error("Invalid id")]
    InvalidId,

    #[error("Payload too large")]
    PayloadTooLarge,

    /// The request body could not be received.
    #[error("Invalid request body")]
    InvalidBody,

    /// The transaction has been rolled back.
    #[error("Internal server error")]
    Database(#[from] sqlx::Error),
}

impl ApiError {
    const fn status_code(&self) -> StatusCode {
        match self {
            Self::PackageNotFound | Self::DistributionNotFound | Self::RouteNotFound => {
                StatusCode::NOT_FOUND
            }
            Self::InvalidId | Self::InvalidBody => StatusCode::BAD_REQUEST,
            Self::PayloadTooLarge => StatusCode::PAYLOAD_TOO_LARGE,
            Self::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<BytesRejection> for ApiError {
    fn from(rejection: BytesRejection) -> Self {
        log::debug!("Rejected request body: {rejection}");
        if rejection.status() == StatusCode::PAYLOAD_TOO_LARGE {
            Self::PayloadTooLarge
        } else {
            Self::InvalidBody
        }
    }
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    error: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        if let Self::Database(err) = &self {
            // Details are only logged and never exposed to the client.
            log::error!("Database error: {err:#}");
        }
        let status = self.status_code();
        let body = ErrorBody {
            error: self.to_string(),
        };
        (status, Json(body)).into_response()
    }
}
