use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;

use crate::error::AppError;

/// Encodes a redirect target into an opaque, URL-safe state parameter.
pub fn encode_state(value: &str) -> String {
    URL_SAFE_NO_PAD.encode(value.as_bytes())
}

/// Decodes a state parameter produced by [`encode_state`].
pub fn decode_state(token: &str) -> Result<String, AppError> {
    let bytes = URL_SAFE_NO_PAD
        .decode(token.as_bytes())
        .map_err(|e| AppError::BadRequest(format!("invalid state parameter: {}", e)))?;

    String::from_utf8(bytes)
        .map_err(|e| AppError::BadRequest(format!("invalid state parameter: {}", e)))
}
