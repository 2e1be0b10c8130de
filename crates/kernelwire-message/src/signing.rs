use std::fmt;

use hmac::{Hmac, Mac};
use sha2::Sha256;

use crate::error::{MessageError, Result};

type HmacSha256 = Hmac<Sha256>;

/// Shared HMAC-SHA256 key. An empty key disables signing and verification.
///
/// The key bytes never appear in `Debug` output.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct SigningKey {
    key: Vec<u8>,
}

impl SigningKey {
    pub fn new(key: impl Into<Vec<u8>>) -> Self {
        Self { key: key.into() }
    }

    /// A key that neither signs nor verifies.
    pub fn unsigned() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.key.is_empty()
    }

    /// Hex digest over `parts`, or an empty string when unsigned.
    pub fn sign(&self, parts: &[&[u8]]) -> Result<String> {
        if self.is_empty() {
            return Ok(String::new());
        }
        let mac = self.mac(parts)?;
        Ok(hex::encode(mac.finalize().into_bytes()))
    }

    /// Check a hex `signature` over `parts` in constant time.
    ///
    /// Always succeeds when unsigned. Truncated or non-hex signatures fail.
    pub fn verify(&self, parts: &[&[u8]], signature: &[u8]) -> Result<()> {
        if self.is_empty() {
            return Ok(());
        }
        let expected = hex::decode(signature).map_err(|_| MessageError::InvalidSignature)?;
        self.mac(parts)?
            .verify_slice(&expected)
            .map_err(|_| MessageError::InvalidSignature)
    }

    fn mac(&self, parts: &[&[u8]]) -> Result<HmacSha256> {
        let mut mac = HmacSha256::new_from_slice(&self.key).map_err(|_| MessageError::InvalidKey)?;
        for part in parts {
            mac.update(part);
        }
        Ok(mac)
    }
}

impl From<&str> for SigningKey {
    fn from(key: &str) -> Self {
        Self::new(key.as_bytes())
    }
}

impl fmt::Debug for SigningKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SigningKey(<redacted:{} bytes>)", self.key.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PARTS: [&[u8]; 4] = [b"{\"msg_id\":\"1\"}", b"{}", b"{}", b"{\"code\":\"2+2\"}"];

    #[test]
    fn sign_matches_known_digest() {
        let key = SigningKey::from("key");
        // HMAC-SHA256("key", "The quick brown fox jumps over the lazy dog")
        let sig = key
            .sign(&[b"The quick brown fox ", b"jumps over the lazy dog"])
            .unwrap();
        assert_eq!(
            sig,
            "f7bc83f430538424b13298e6aa6fb143ef4d59a14946175997479dbc2d1a3cd8"
        );
    }

    #[test]
    fn verify_accepts_own_signature() {
        let key = SigningKey::from("secret");
        let sig = key.sign(&PARTS).unwrap();
        assert_eq!(sig.len(), 64);
        key.verify(&PARTS, sig.as_bytes()).unwrap();
    }

    #[test]
    fn verify_rejects_other_key_and_tampering() {
        let key = SigningKey::from("secret");
        let sig = key.sign(&PARTS).unwrap();

        let other = SigningKey::from("other");
        assert!(matches!(
            other.verify(&PARTS, sig.as_bytes()),
            Err(MessageError::InvalidSignature)
        ));

        let tampered: [&[u8]; 4] = [PARTS[0], PARTS[1], PARTS[2], b"{\"code\":\"2+3\"}"];
        assert!(key.verify(&tampered, sig.as_bytes()).is_err());
    }

    #[test]
    fn verify_rejects_truncated_and_malformed_hex() {
        let key = SigningKey::from("secret");
        let sig = key.sign(&PARTS).unwrap();
        assert!(key.verify(&PARTS, &sig.as_bytes()[..62]).is_err());
        assert!(key.verify(&PARTS, &sig.as_bytes()[..63]).is_err());
        assert!(key.verify(&PARTS, b"zz").is_err());
        assert!(key.verify(&PARTS, b"").is_err());
    }

    #[test]
    fn unsigned_key_skips_everything() {
        let key = SigningKey::unsigned();
        assert_eq!(key.sign(&PARTS).unwrap(), "");
        key.verify(&PARTS, b"not even hex").unwrap();
    }

    #[test]
    fn debug_redacts_key() {
        let rendered = format!("{:?}", SigningKey::from("hunter2"));
        assert!(!rendered.contains("hunter2"));
        assert!(rendered.contains("<redacted:7 bytes>"));
    }
}
