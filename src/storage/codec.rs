//! Text encoding of persisted values.
//!
//! Save files hold indented JSON so they stay human readable and diffable.

use crate::core::{Result, SaveError};
use log::error;
use serde::{Serialize, de::DeserializeOwned};

pub fn encode<T: Serialize + ?Sized>(value: &T) -> Result<String> {
    serde_json::to_string_pretty(value).map_err(|err| {
        SaveError::EncodeError(format!(
            "Failed to encode '{}': {}",
            std::any::type_name::<T>(),
            err
        ))
    })
}

pub fn decode<T: DeserializeOwned>(text: &str) -> Result<T> {
    serde_json::from_str(text).map_err(|err| {
        SaveError::DecodeError(format!(
            "Failed to decode '{}': {}",
            std::any::type_name::<T>(),
            err
        ))
    })
}

/// Decodes `text`, logging and swallowing failures. Empty text is `None`.
pub fn try_parse<T: DeserializeOwned>(text: &str) -> Option<T> {
    if text.trim().is_empty() {
        return None;
    }
    match decode(text) {
        Ok(value) => Some(value),
        Err(err) => {
            error!("{}", err);
            None
        }
    }
}
