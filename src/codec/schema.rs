//! Wire decoding with field-named errors.
//!
//! Payloads are deserialized through `serde_path_to_error` so a failure names
//! the dotted path of the field that caused it. `null` is read as "absent"
//! wherever a field has a default.

use serde::de::{DeserializeOwned, Error as _};
use serde::{Deserialize, Deserializer};

use crate::codec::message::DEFAULT_TYPING_DELAY_MS;
use crate::utils::ValidationError;

/// Path used when the payload as a whole is rejected.
pub const ROOT: &str = "$";

/// Deserializes `raw` into `T`, rejecting trailing data.
pub(crate) fn from_wire<T: DeserializeOwned>(raw: &[u8]) -> Result<T, ValidationError> {
    let mut de = serde_json::Deserializer::from_slice(raw);
    let value = serde_path_to_error::deserialize(&mut de).map_err(|e| {
        let path = e.path().to_string();
        field_error(&path, &e.into_inner())
    })?;
    de.end().map_err(|e| ValidationError::new(ROOT, e))?;
    Ok(value)
}

fn field_error(path: &str, err: &serde_json::Error) -> ValidationError {
    let parent = if path == "." { "" } else { path };
    let message = err.to_string();

    // Missing fields are reported against their parent object
    if let Some(field) = message
        .strip_prefix("missing field `")
        .and_then(|rest| rest.split('`').next())
    {
        let field = if parent.is_empty() {
            field.to_string()
        } else {
            format!("{parent}.{field}")
        };
        return ValidationError::new(field, "is required");
    }

    if parent.is_empty() {
        ValidationError::new(ROOT, message)
    } else {
        ValidationError::new(parent, message)
    }
}

/// `null` or absent reads as `T::default()`.
pub(crate) fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de> + Default,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// `null` or absent reads as `true`.
pub(crate) fn null_as_true<'de, D>(deserializer: D) -> Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<bool>::deserialize(deserializer)?.unwrap_or(true))
}

pub(crate) fn default_true() -> bool {
    true
}

pub(crate) fn default_typing_delay() -> u64 {
    DEFAULT_TYPING_DELAY_MS
}

/// Typing delay in milliseconds; negative values are rejected.
pub(crate) fn typing_delay<'de, D>(deserializer: D) -> Result<u64, D::Error>
where
    D: Deserializer<'de>,
{
    match Option::<i64>::deserialize(deserializer)? {
        None => Ok(DEFAULT_TYPING_DELAY_MS),
        Some(delay) => u64::try_from(delay).map_err(|_| D::Error::custom("must be non-negative")),
    }
}
