use hmac::{Hmac, Mac};
use sha2::Sha256;

use gorgone_common::GorgoneError;

type HmacSha256 = Hmac<Sha256>;

/// Verifies inbound job-callback requests from the queue service.
///
/// The queue signs the raw request body with HMAC-SHA256 under the shared
/// signing key and sends the hex digest in a header. When no signature
/// header is present, a bearer token equal to the queue token is accepted
/// as a local/dev alternative.
#[derive(Clone)]
pub struct CallbackVerifier {
    signing_key: String,
    bearer_token: String,
}

impl CallbackVerifier {
    pub fn new(signing_key: impl Into<String>, bearer_token: impl Into<String>) -> Self {
        Self {
            signing_key: signing_key.into(),
            bearer_token: bearer_token.into(),
        }
    }

    /// Verify a request given the raw body and the optional headers.
    pub fn verify(
        &self,
        body: &[u8],
        signature_hex: Option<&str>,
        authorization: Option<&str>,
    ) -> Result<(), GorgoneError> {
        match signature_hex {
            Some(signature) => self.verify_signature(body, signature),
            // Bearer fallback applies only when the signature header is
            // absent entirely.
            None => self.verify_bearer(authorization),
        }
    }

    fn verify_signature(&self, body: &[u8], signature_hex: &str) -> Result<(), GorgoneError> {
        let expected =
            hex::decode(signature_hex.trim()).map_err(|_| GorgoneError::SignatureInvalid)?;

        let mut mac = HmacSha256::new_from_slice(self.signing_key.as_bytes())
            .map_err(|_| GorgoneError::SignatureInvalid)?;
        mac.update(body);
        mac.verify_slice(&expected)
            .map_err(|_| GorgoneError::SignatureInvalid)
    }

    fn verify_bearer(&self, authorization: Option<&str>) -> Result<(), GorgoneError> {
        let header = authorization.ok_or(GorgoneError::SignatureInvalid)?;
        let token = header
            .strip_prefix("Bearer ")
            .ok_or(GorgoneError::SignatureInvalid)?;
        if token == self.bearer_token {
            Ok(())
        } else {
            Err(GorgoneError::SignatureInvalid)
        }
    }

    /// Sign a body the way the queue service does. Used when enqueueing
    /// through the external queue and in tests.
    pub fn sign(&self, body: &[u8]) -> String {
        let mut mac = HmacSha256::new_from_slice(self.signing_key.as_bytes())
            .expect("HMAC accepts any key length");
        mac.update(body);
        hex::encode(mac.finalize().into_bytes())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn verifier() -> CallbackVerifier {
        CallbackVerifier::new("signing-key", "queue-token")
    }

    #[test]
    fn valid_signature_verifies() {
        let v = verifier();
        let body = br#"{"item_id":"abc"}"#;
        let signature = v.sign(body);
        assert!(v.verify(body, Some(&signature), None).is_ok());
    }

    #[test]
    fn tampered_body_is_rejected() {
        let v = verifier();
        let signature = v.sign(b"original");
        assert!(v.verify(b"tampered", Some(&signature), None).is_err());
    }

    #[test]
    fn malformed_signature_is_rejected() {
        let v = verifier();
        assert!(v.verify(b"body", Some("not-hex!"), None).is_err());
    }

    #[test]
    fn bearer_fallback_only_without_signature_header() {
        let v = verifier();

        // No signature header: bearer token is accepted.
        assert!(v.verify(b"body", None, Some("Bearer queue-token")).is_ok());
        assert!(v.verify(b"body", None, Some("Bearer wrong")).is_err());
        assert!(v.verify(b"body", None, None).is_err());

        // Signature header present: bearer token is ignored.
        assert!(v
            .verify(b"body", Some("deadbeef"), Some("Bearer queue-token"))
            .is_err());
    }
}
