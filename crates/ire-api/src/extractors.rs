//! # Custom Extractors & Validation
//!
//! The [`Validate`] trait for request DTOs and helpers that map axum's JSON
//! rejections onto [`AppError`].

use axum::extract::rejection::JsonRejection;
use axum::Json;

use crate::error::AppError;

/// Request types with business rules beyond what serde checks.
pub trait Validate {
    fn validate(&self) -> Result<(), String>;
}

/// Extract a JSON body, mapping deserialization errors to [`AppError::BadRequest`].
pub fn extract_json<T>(result: Result<Json<T>, JsonRejection>) -> Result<T, AppError> {
    result
        .map(|Json(v)| v)
        .map_err(|err| AppError::BadRequest(err.body_text()))
}

/// Extract a JSON body and validate it with [`Validate`].
pub fn extract_validated_json<T: Validate>(
    result: Result<Json<T>, JsonRejection>,
) -> Result<T, AppError> {
    let value = extract_json(result)?;
    value.validate().map_err(AppError::Validation)?;
    Ok(value)
}

/// Like [`extract_json`], but a request without a JSON body yields
/// `T::default()`.
pub fn extract_optional_json<T: Default>(
    result: Result<Json<T>, JsonRejection>,
) -> Result<T, AppError> {
    match result {
        Err(JsonRejection::MissingJsonContentType(_)) => Ok(T::default()),
        other => extract_json(other),
    }
}
