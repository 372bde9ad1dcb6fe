//! Decoding of opaque plugin parameters.

use bookkeeper_types::{Address, BookkeeperError, Capability, Result};
use serde::de::DeserializeOwned;

/// Decode JSON parameters, reporting failures as the plugin's own.
pub(crate) fn decode<T: DeserializeOwned>(
    capability: Capability,
    addr: Address,
    params: &[u8],
) -> Result<T> {
    serde_json::from_slice(params)
        .map_err(|e| BookkeeperError::plugin(capability, addr, format!("bad parameters: {e}")))
}

/// Like [`decode`], but empty parameters mean `T::default()`.
pub(crate) fn decode_or_default<T: DeserializeOwned + Default>(
    capability: Capability,
    addr: Address,
    params: &[u8],
) -> Result<T> {
    if params.is_empty() {
        Ok(T::default())
    } else {
        decode(capability, addr, params)
    }
}
