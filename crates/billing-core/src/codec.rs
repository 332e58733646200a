//! Base64 codec used for keys, signatures and developer payloads.
//!
//! The backend speaks the standard, padded alphabet.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;

use crate::error::Result;

/// Encode bytes as standard padded base64.
pub fn base64_encode(bytes: impl AsRef<[u8]>) -> String {
    BASE64.encode(bytes)
}

/// Decode standard padded base64.
///
/// Fails on characters outside the alphabet and on wrong padding.
pub fn base64_decode(encoded: &str) -> Result<Vec<u8>> {
    Ok(BASE64.decode(encoded)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::CoreError;

    #[test]
    fn test_encode_known_value() {
        assert_eq!(base64_encode(b"billing"), "YmlsbGluZw==");
        assert_eq!(base64_encode([]), "");
    }

    #[test]
    fn test_decode_known_value() {
        assert_eq!(base64_decode("YmlsbGluZw==").unwrap(), b"billing");
    }

    #[test]
    fn test_decode_rejects_bad_alphabet() {
        let err = base64_decode("Ym*sbGluZw==").unwrap_err();
        assert!(matches!(err, CoreError::Decode(_)));
    }

    #[test]
    fn test_decode_rejects_bad_padding() {
        assert!(base64_decode("YmlsbGluZw=").is_err());
        assert!(base64_decode("YmlsbGluZw").is_err());
    }
}
