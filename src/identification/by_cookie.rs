use crate::{Context, IdentificationData, IdentificationDataCodec, Request, Result, TokenTransport};
use cookie::Cookie;

/// Carries the session token in an HTTP-only session cookie.
///
/// The cookie has no expiry, so the browser discards it, and with it the session, when it is closed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CookieTransport {
    name: String,
    domain: Option<String>,
    path: Option<String>,
}

impl CookieTransport {
    /// Carry the token in the cookie called `name`, restricted to `domain` and `path` if given.
    pub fn new(name: impl Into<String>, domain: Option<String>, path: Option<String>) -> Self {
        Self {
            name: name.into(),
            domain,
            path,
        }
    }

    /// The domain the cookie is restricted to.
    pub fn domain(&self) -> Option<&str> {
        self.domain.as_deref()
    }

    /// The path the cookie is restricted to.
    pub fn path(&self) -> Option<&str> {
        self.path.as_deref()
    }
}

impl TokenTransport for CookieTransport {
    fn name(&self) -> &str {
        &self.name
    }

    fn provide_data(
        &self,
        codec: &IdentificationDataCodec,
        request: &Request,
    ) -> Option<IdentificationData> {
        codec.provide_data(request.cookies(), &self.name)
    }

    fn write_data(&self, data: &IdentificationData, context: &mut Context) -> Result {
        let mut cookie = Cookie::build((self.name.clone(), data.to_string())).http_only(true);
        if let Some(domain) = &self.domain {
            cookie = cookie.domain(domain.clone());
        }
        if let Some(path) = &self.path {
            cookie = cookie.path(path.clone());
        }
        context.response.add_cookie(cookie.build());
        Ok(())
    }
}
