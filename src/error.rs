use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use thiserror::Error;

use crate::types::ApiResponse;

#[derive(Error, Debug)]
pub enum FarmError {
    #[error("Position not found: {0}")]
    PositionNotFound(String),
    #[error("Position is not open: {0}")]
    PositionNotOpen(String),
    #[error("No pending close for position: {0}")]
    NoPendingClose(String),
    #[error("Wallet not found: {0}")]
    WalletNotFound(String),
    #[error("Confirmation text does not match")]
    ConfirmationMismatch,
    #[error("No operation is staged")]
    NoPendingOperation,
    #[error("Duplicate id generated: {0}")]
    DuplicateId(String),
    #[error("Export failed: {0}")]
    Export(String),
    #[error("Invalid configuration: {0}")]
    Config(String),
    #[error("Internal error: {0}")]
    Internal(String),
}

impl FarmError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            FarmError::PositionNotFound(_)
            | FarmError::WalletNotFound(_)
            | FarmError::NoPendingClose(_) => StatusCode::NOT_FOUND,
            FarmError::PositionNotOpen(_)
            | FarmError::NoPendingOperation
            | FarmError::DuplicateId(_) => StatusCode::CONFLICT,
            FarmError::ConfirmationMismatch => StatusCode::FORBIDDEN,
            FarmError::Config(_) => StatusCode::BAD_REQUEST,
            FarmError::Export(_) | FarmError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for FarmError {
    fn into_response(self) -> Response {
        (self.status_code(), Json(ApiResponse::err(self.to_string()))).into_response()
    }
}

pub type FarmResult<T> = Result<T, FarmError>;
