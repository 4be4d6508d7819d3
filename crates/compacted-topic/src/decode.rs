//! Ready-made decoders.
//!
//! Every decoder returns `None` for input it cannot decode, which makes the
//! processor skip the message. Failures are logged at debug level only: an
//! undecodable record is an expected outcome on a shared topic, not an error.

use serde::de::DeserializeOwned;
use tracing::debug;

/// Decodes UTF-8 text.
pub fn utf8(bytes: &[u8]) -> Option<String> {
    match std::str::from_utf8(bytes) {
        Ok(text) => Some(text.to_string()),
        Err(e) => {
            debug!("Bytes are not valid UTF-8: {e}");
            None
        }
    }
}

/// Passes the bytes through unchanged.
pub fn raw(bytes: &[u8]) -> Option<Vec<u8>> {
    Some(bytes.to_vec())
}

/// Deserializes a JSON document.
pub fn json_key<T: DeserializeOwned>(bytes: &[u8]) -> Option<T> {
    match serde_json::from_slice(bytes) {
        Ok(decoded) => Some(decoded),
        Err(e) => {
            debug!("Bytes are not a valid JSON document: {e}");
            None
        }
    }
}

/// Value decoder deserializing the payload as JSON, ignoring the key.
pub fn json<K, T: DeserializeOwned>(_key: &K, payload: &[u8]) -> Option<T> {
    json_key(payload)
}

/// Value decoder reading the payload as UTF-8 text, ignoring the key.
pub fn utf8_value<K>(_key: &K, payload: &[u8]) -> Option<String> {
    utf8(payload)
}

/// Value decoder keeping the raw payload, ignoring the key.
pub fn raw_value<K>(_key: &K, payload: &[u8]) -> Option<Vec<u8>> {
    raw(payload)
}
