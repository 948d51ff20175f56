use crate::{HmacProvider, IdentificationData};
use std::sync::Arc;
use subtle::ConstantTimeEq;

/// Checks that the cipher text of a session token was signed by this server.
#[derive(Debug, Clone)]
pub struct SignatureValidator {
    hmac_provider: Arc<dyn HmacProvider>,
}

impl SignatureValidator {
    /// Create a validator for signatures made by `hmac_provider`.
    pub fn new(hmac_provider: Arc<dyn HmacProvider>) -> Self {
        Self { hmac_provider }
    }

    /// Returns true if the signature of `data` matches its cipher text.
    ///
    /// The comparison runs in constant time, so the response time does not reveal how many
    /// leading bytes of a forged signature were correct.
    pub fn is_valid(&self, data: &IdentificationData) -> bool {
        if data.signature.is_empty() {
            return false;
        }

        let length = self.hmac_provider.hmac_length();
        let expected = self
            .hmac_provider
            .generate_hmac(&data.session_id_cipher_text);
        if expected.len() != length || data.signature.len() != length {
            return false;
        }

        expected.as_slice().ct_eq(data.signature.as_slice()).into()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Blake3HmacProvider;

    fn validator_and_provider() -> (SignatureValidator, Arc<Blake3HmacProvider>) {
        let provider = Arc::new(Blake3HmacProvider::new([9; blake3::KEY_LEN]));
        (SignatureValidator::new(provider.clone()), provider)
    }

    #[test]
    fn accepts_matching_signature() {
        let (validator, provider) = validator_and_provider();
        let data = IdentificationData {
            session_id_cipher_text: "cipher".to_string(),
            signature: provider.generate_hmac("cipher"),
        };
        assert!(validator.is_valid(&data));
    }

    #[test]
    fn rejects_empty_signature() {
        let (validator, _) = validator_and_provider();
        let data = IdentificationData {
            session_id_cipher_text: "cipher".to_string(),
            signature: Vec::new(),
        };
        assert!(!validator.is_valid(&data));
    }

    #[test]
    fn rejects_signature_of_other_data() {
        let (validator, provider) = validator_and_provider();
        let data = IdentificationData {
            session_id_cipher_text: "cipher".to_string(),
            signature: provider.generate_hmac("other"),
        };
        assert!(!validator.is_valid(&data));
    }

    #[test]
    fn rejects_truncated_and_extended_signatures() {
        let (validator, provider) = validator_and_provider();
        let mut signature = provider.generate_hmac("cipher");
        signature.pop();
        let truncated = IdentificationData {
            session_id_cipher_text: "cipher".to_string(),
            signature: signature.clone(),
        };
        assert!(!validator.is_valid(&truncated));

        let mut signature = provider.generate_hmac("cipher");
        signature.push(0);
        let extended = IdentificationData {
            session_id_cipher_text: "cipher".to_string(),
            signature,
        };
        assert!(!validator.is_valid(&extended));
    }
}
