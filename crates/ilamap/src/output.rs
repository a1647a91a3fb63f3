//! JSON rendering of table entries.
//!
//! Enabled by the `output` feature. Entry types serialize with their
//! textual field forms (locators as `W:X:Y:Z`, enums by name), so the JSON
//! matches what the `Display` impls print.

use serde::Serialize;

use crate::error::Result;

/// Serialize an entry, or any row tuple of serializable parts, to JSON.
pub fn to_json<T: Serialize>(value: &T) -> Result<String> {
    Ok(serde_json::to_string(value)?)
}
