use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;

use crate::errors::AppError;

pub fn utc_now() -> DateTime<Utc> {
    Utc::now()
}

/// Strict JSON payload decoding that reports the path of the offending
/// field, so a malformed grant entry is rejected with a usable message
/// before anything touches the database.
pub fn decode_payload<T: DeserializeOwned>(value: serde_json::Value) -> Result<T, AppError> {
    serde_path_to_error::deserialize(value).map_err(|err| {
        let path = err.path().to_string();
        AppError::bad_request(format!("invalid payload at `{path}`: {}", err.inner()))
    })
}
