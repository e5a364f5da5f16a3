//! Lenient deserialization helpers for degraded payloads.

use serde::{Deserialize, Deserializer};

/// Treats an explicit JSON `null` like a missing field.
///
/// Pair with `#[serde(default)]` so both shapes fall back to `T::default()`.
pub(crate) fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de> + Default,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}
