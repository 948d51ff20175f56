use crate::{
    Context, CryptographyConfiguration, EncryptionProvider, Error, HmacProvider, Request, Result,
    SessionId, SessionIdFactory,
};
use std::fmt::Debug;
use std::sync::Arc;

mod by_cookie;
mod by_query_string;
mod data;
mod signature;

pub use by_cookie::CookieTransport;
pub use by_query_string::QueryStringTransport;
pub use data::{base64_length, IdentificationData, IdentificationDataCodec};
pub use signature::SignatureValidator;

/// Decides which session a request belongs to, and tells clients about the sessions they belong to.
pub trait IdentificationMethod: Debug + Send + Sync {
    /// Returns the id of the session the client of `request` holds a valid token for,
    /// or a freshly minted id if it holds none.
    ///
    /// This never fails. A missing, malformed or forged token only costs the client its session.
    fn current_session_id(&self, request: &Request) -> SessionId;

    /// Communicate `id` to the client of `context`, if it does not know it already.
    ///
    /// Fails if `id` is empty.
    fn save_session_id(&self, id: &SessionId, context: &mut Context) -> Result;
}

/// The way a session token travels between server and client.
pub trait TokenTransport: Debug + Send + Sync {
    /// The name of the cookie or parameter that carries the token.
    fn name(&self) -> &str;

    /// Read the token from `request`.
    fn provide_data(
        &self,
        codec: &IdentificationDataCodec,
        request: &Request,
    ) -> Option<IdentificationData>;

    /// Hand the token to the client by modifying the response of `context`.
    fn write_data(&self, data: &IdentificationData, context: &mut Context) -> Result;
}

/// Identifies sessions by encrypted and signed session tokens that travel over `Transport`.
#[derive(Debug)]
pub struct SessionIdentification<Transport> {
    transport: Transport,
    codec: IdentificationDataCodec,
    signature_validator: SignatureValidator,
    encryption_provider: Arc<dyn EncryptionProvider>,
    hmac_provider: Arc<dyn HmacProvider>,
    session_id_factory: SessionIdFactory,
}

/// Identifies sessions by a session cookie.
pub type ByCookieIdentificationMethod = SessionIdentification<CookieTransport>;

/// Identifies sessions by a query string parameter.
pub type ByQueryStringParamIdentificationMethod = SessionIdentification<QueryStringTransport>;

impl<Transport: TokenTransport> SessionIdentification<Transport> {
    /// Create an identification method that protects tokens with `cryptography`,
    /// and mints new ids with `session_id_factory`.
    pub fn new(
        transport: Transport,
        cryptography: &CryptographyConfiguration,
        session_id_factory: SessionIdFactory,
    ) -> Self {
        let hmac_provider = Arc::clone(&cryptography.hmac_provider);
        Self {
            transport,
            codec: IdentificationDataCodec::new(Arc::clone(&hmac_provider)),
            signature_validator: SignatureValidator::new(Arc::clone(&hmac_provider)),
            encryption_provider: Arc::clone(&cryptography.encryption_provider),
            hmac_provider,
            session_id_factory,
        }
    }

    /// The transport tokens travel over.
    pub fn transport(&self) -> &Transport {
        &self.transport
    }

    fn new_session_id(&self, reason: &str) -> SessionId {
        log::debug!(
            "Issuing a new session id, {reason} in `{}`",
            self.transport.name()
        );
        self.session_id_factory.create_new()
    }
}

impl<Transport: TokenTransport> IdentificationMethod for SessionIdentification<Transport> {
    fn current_session_id(&self, request: &Request) -> SessionId {
        let Some(data) = self.transport.provide_data(&self.codec, request) else {
            return self.new_session_id("no session token was found");
        };
        if !self.signature_validator.is_valid(&data) {
            return self.new_session_id("the session token signature is invalid");
        }
        let Some(plain_text) = self
            .encryption_provider
            .decrypt(&data.session_id_cipher_text)
            .filter(|plain_text| !plain_text.is_empty())
        else {
            return self.new_session_id("the session token could not be decrypted");
        };

        match self.session_id_factory.create_from(&plain_text) {
            Some(id) => id,
            None => self.new_session_id("the session token does not hold a session id"),
        }
    }

    fn save_session_id(&self, id: &SessionId, context: &mut Context) -> Result {
        if id.is_empty() {
            return Err(Error::invalid_argument(
                "id",
                "a session cannot be saved under the empty session id",
            ));
        }
        if !id.is_new() {
            // The client already holds a token for this id.
            return Ok(());
        }

        let session_id_cipher_text = self
            .encryption_provider
            .encrypt(&id.to_string())
            .map_err(Error::Encryption)?;
        let signature = self.hmac_provider.generate_hmac(&session_id_cipher_text);
        let data = IdentificationData {
            session_id_cipher_text,
            signature,
        };
        self.transport.write_data(&data, context)?;
        log::debug!(
            "Sent a new session token in `{}`",
            self.transport.name()
        );
        Ok(())
    }
}
