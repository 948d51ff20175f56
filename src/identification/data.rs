use crate::{HmacProvider, TokenSource};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use std::fmt::{Display, Formatter};
use std::sync::Arc;

/// The contents of a session token: the encrypted session id and its signature.
///
/// The token itself is the base64 encoded signature followed by the cipher text.
/// Since signatures have a fixed length, the boundary between both parts is known when parsing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdentificationData {
    /// The encrypted session id.
    pub session_id_cipher_text: String,
    /// The signature of [`IdentificationData::session_id_cipher_text`]. Empty if the token carried no valid signature.
    pub signature: Vec<u8>,
}

/// Returns the length of the padded base64 encoding of `byte_length` bytes.
pub fn base64_length(byte_length: usize) -> usize {
    (byte_length + 2) / 3 * 4
}

impl IdentificationData {
    /// Parse a decoded token whose signature is `signature_length` bytes long.
    ///
    /// Returns `None` if the token is too short to even hold a signature.
    /// If the signature part is not valid base64, the whole token is taken as the cipher text,
    /// with an empty signature, which never validates.
    pub fn parse(token: &str, signature_length: usize) -> Option<Self> {
        let encoded_length = base64_length(signature_length);
        if token.len() < encoded_length {
            // Definitely invalid
            return None;
        }

        let split = token
            .is_char_boundary(encoded_length)
            .then(|| token.split_at(encoded_length))
            .and_then(|(signature, cipher_text)| {
                BASE64
                    .decode(signature)
                    .ok()
                    .map(|signature| (signature, cipher_text))
            });

        Some(match split {
            Some((signature, cipher_text)) => Self {
                session_id_cipher_text: cipher_text.to_string(),
                signature,
            },
            None => Self {
                session_id_cipher_text: token.to_string(),
                signature: Vec::new(),
            },
        })
    }
}

impl Display for IdentificationData {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}{}",
            BASE64.encode(&self.signature),
            self.session_id_cipher_text
        )
    }
}

/// Reads [`IdentificationData`] from the values a client sent along with its request.
#[derive(Debug, Clone)]
pub struct IdentificationDataCodec {
    hmac_provider: Arc<dyn HmacProvider>,
}

impl IdentificationDataCodec {
    /// Create a codec for tokens signed by `hmac_provider`.
    pub fn new(hmac_provider: Arc<dyn HmacProvider>) -> Self {
        Self { hmac_provider }
    }

    /// Read the token stored under `key` in `source`.
    ///
    /// Returns `None` if `source` holds no decodable token under `key`,
    /// or if it is too short to hold a signature.
    pub fn provide_data(
        &self,
        source: &impl TokenSource,
        key: &str,
    ) -> Option<IdentificationData> {
        let token = source.token_value(key)?;
        IdentificationData::parse(&token, self.hmac_provider.hmac_length())
    }
}
