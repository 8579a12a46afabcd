pub mod activity;
pub mod grading;
pub mod report;

use serde::Serialize;

use crate::errors::AppError;

/// Serializes a value for a JSONB column.
pub fn to_json<T: Serialize + ?Sized>(value: &T) -> Result<serde_json::Value, AppError> {
    serde_json::to_value(value)
        .map_err(|e| AppError::Internal(anyhow::anyhow!("Failed to serialize JSON column: {e}")))
}
