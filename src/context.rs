//! The minimal view of an HTTP exchange that the session manager needs.
//!
//! Hosts translate their own request and response types into these.

use cookie::Cookie;
use std::borrow::Cow;
use std::collections::BTreeMap;
use url::Url;

/// The status code of a redirect that preserves the request method for `GET` requests.
pub const STATUS_FOUND: u16 = 302;

/// The origin relative request urls are resolved against. It never leaves this crate.
const RELATIVE_URL_BASE: &str = "http://localhost/";

/// A name/value lookup from which a session token can be read.
///
/// Returned values are decoded, i.e. without the percent-encoding they arrived in.
pub trait TokenSource {
    /// Returns the decoded value stored under `key`.
    fn token_value(&self, key: &str) -> Option<Cow<'_, str>>;
}

impl TokenSource for BTreeMap<String, String> {
    /// Cookie values are percent-decoded. Values that are not valid percent-encoded UTF-8 are ignored.
    fn token_value(&self, key: &str) -> Option<Cow<'_, str>> {
        urlencoding::decode(self.get(key)?).ok()
    }
}

/// An incoming request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Request {
    url: String,
    cookies: BTreeMap<String, String>,
}

impl Request {
    /// Create a request for `url` without cookies.
    ///
    /// The url is either absolute, or a path with optional query string and fragment.
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            cookies: BTreeMap::new(),
        }
    }

    /// Add a cookie as it was sent by the client, i.e. with its value still percent-encoded.
    pub fn with_cookie(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.cookies.insert(name.into(), value.into());
        self
    }

    /// The full url of the request, including the query string.
    pub fn url(&self) -> &str {
        &self.url
    }

    /// The cookies sent by the client.
    pub fn cookies(&self) -> &BTreeMap<String, String> {
        &self.cookies
    }

    /// The query string of the url. Empty if the url cannot be parsed.
    pub fn query(&self) -> QueryString {
        QueryString::from_url(&self.url)
    }
}

/// A parsed request url.
#[derive(Debug, Clone)]
pub(crate) struct RequestUrl {
    url: Url,
    relative: bool,
}

impl RequestUrl {
    /// Parse `url`, resolving a relative url against a placeholder origin.
    pub(crate) fn parse(url: &str) -> Result<Self, url::ParseError> {
        match Url::parse(url) {
            Ok(url) => Ok(Self {
                url,
                relative: false,
            }),
            Err(url::ParseError::RelativeUrlWithoutBase) => Ok(Self {
                url: Url::parse(RELATIVE_URL_BASE)?.join(url)?,
                relative: true,
            }),
            Err(error) => Err(error),
        }
    }

    pub(crate) fn url(&self) -> &Url {
        &self.url
    }

    pub(crate) fn url_mut(&mut self) -> &mut Url {
        &mut self.url
    }

    /// Serialize the url again, dropping the placeholder origin of a relative url.
    pub(crate) fn into_string(self) -> String {
        if self.relative {
            self.url[url::Position::BeforePath..].to_string()
        } else {
            self.url.into()
        }
    }
}

/// The decoded parameters of the query string of a url, in order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueryString {
    pairs: Vec<(String, String)>,
}

impl QueryString {
    /// Parse the query string of `url`. Empty if `url` cannot be parsed.
    pub fn from_url(url: &str) -> Self {
        match RequestUrl::parse(url) {
            Ok(url) => Self {
                pairs: url.url().query_pairs().into_owned().collect(),
            },
            Err(error) => {
                log::debug!("Ignoring the query string of an unparsable url: {error}");
                Self::default()
            }
        }
    }

    /// The decoded `(name, value)` pairs. A parameter without `=` has an empty value.
    pub fn pairs(&self) -> &[(String, String)] {
        &self.pairs
    }
}

impl TokenSource for QueryString {
    /// Returns the value of the first parameter called `key`.
    fn token_value(&self, key: &str) -> Option<Cow<'_, str>> {
        self.pairs
            .iter()
            .find(|(name, _)| name == key)
            .map(|(_, value)| Cow::Borrowed(value.as_str()))
    }
}

/// An outgoing response.
#[derive(Debug, Clone, PartialEq)]
pub struct Response {
    status: u16,
    headers: Vec<(String, String)>,
    cookies: Vec<Cookie<'static>>,
}

impl Response {
    /// Create a response with status `200 OK`, no headers and no cookies.
    pub fn new() -> Self {
        Self {
            status: 200,
            headers: Vec::new(),
            cookies: Vec::new(),
        }
    }

    /// The status code.
    pub fn status(&self) -> u16 {
        self.status
    }

    /// Set the status code.
    pub fn set_status(&mut self, status: u16) {
        self.status = status;
    }

    /// All headers, in the order they were added.
    pub fn headers(&self) -> &[(String, String)] {
        &self.headers
    }

    /// Returns the first header called `name`, compared case-insensitively.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(header, _)| header.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }

    /// Replace all headers called `name` with a single header.
    pub fn set_header(&mut self, name: impl Into<String>, value: impl Into<String>) {
        let name = name.into();
        self.headers
            .retain(|(header, _)| !header.eq_ignore_ascii_case(&name));
        self.headers.push((name, value.into()));
    }

    /// The cookies to be set on the client.
    pub fn cookies(&self) -> &[Cookie<'static>] {
        &self.cookies
    }

    /// Add a cookie, replacing any cookie of the same name that was added before.
    pub fn add_cookie(&mut self, cookie: Cookie<'static>) {
        self.cookies
            .retain(|existing| existing.name() != cookie.name());
        self.cookies.push(cookie);
    }

    /// The values of the `Set-Cookie` headers for the cookies of this response,
    /// with cookie values percent-encoded.
    pub fn set_cookie_headers(&self) -> Vec<String> {
        self.cookies
            .iter()
            .map(|cookie| cookie.encoded().to_string())
            .collect()
    }

    /// Turn this response into a `302 Found` redirect to `location`.
    pub fn redirect_to(&mut self, location: impl Into<String>) {
        self.status = STATUS_FOUND;
        self.set_header("Location", location);
    }
}

impl Default for Response {
    fn default() -> Self {
        Self::new()
    }
}

/// A request together with the response that is being prepared for it.
#[derive(Debug, Clone, PartialEq)]
pub struct Context {
    /// The incoming request.
    pub request: Request,
    /// The outgoing response.
    pub response: Response,
}

impl Context {
    /// Pair `request` with a fresh `200 OK` response.
    pub fn new(request: Request) -> Self {
        Self {
            request,
            response: Response::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn query_string_ignores_fragment() {
        let query = QueryString::from_url("http://example.com/a?x=1&y=2#y=3");
        assert_eq!(query.pairs().len(), 2);
        assert_eq!(query.token_value("y").as_deref(), Some("2"));
        assert!(QueryString::from_url("http://example.com/a#b").pairs().is_empty());
    }

    #[test]
    fn query_string_decodes_names_and_values() {
        let query = QueryString::from_url("/?a%20b=c%2Bd&flag&plus=x+y");
        assert_eq!(query.token_value("a b").as_deref(), Some("c+d"));
        assert_eq!(query.token_value("flag").as_deref(), Some(""));
        assert_eq!(query.token_value("plus").as_deref(), Some("x y"));
        assert_eq!(query.token_value("missing"), None);
    }

    #[test]
    fn unparsable_url_has_empty_query_string() {
        assert!(QueryString::from_url("http://[::1?x=1").pairs().is_empty());
    }

    #[test]
    fn relative_urls_keep_their_form() {
        let url = RequestUrl::parse("/a/b?x=1#top").unwrap();
        assert_eq!(url.url().path(), "/a/b");
        assert_eq!(url.into_string(), "/a/b?x=1#top");

        let url = RequestUrl::parse("https://example.com:8443/a?x=1").unwrap();
        assert_eq!(url.into_string(), "https://example.com:8443/a?x=1");
    }

    #[test]
    fn cookie_jar_values_are_percent_decoded() {
        let cookies = BTreeMap::from([
            ("_nsid".to_string(), "a%2Bb+c%2F".to_string()),
            ("broken".to_string(), "%FF".to_string()),
        ]);
        assert_eq!(cookies.token_value("_nsid").as_deref(), Some("a+b+c/"));
        assert_eq!(cookies.token_value("broken"), None);
        assert_eq!(cookies.token_value("missing"), None);
    }

    #[test]
    fn set_cookie_headers_encode_values() {
        let mut response = Response::new();
        response.add_cookie(
            Cookie::build(("_nsid", "a+b/c= ;"))
                .http_only(true)
                .domain("example.com")
                .path("/")
                .build(),
        );
        let headers = response.set_cookie_headers();
        assert_eq!(headers.len(), 1);
        assert!(!headers[0].contains(" ;"));

        let parsed = Cookie::parse_encoded(headers[0].clone()).unwrap();
        assert_eq!(parsed.name(), "_nsid");
        assert_eq!(parsed.value(), "a+b/c= ;");
        assert_eq!(parsed.http_only(), Some(true));
        assert_eq!(parsed.domain(), Some("example.com"));
        assert_eq!(parsed.path(), Some("/"));
    }

    #[test]
    fn add_cookie_replaces_cookie_of_same_name() {
        let mut response = Response::new();
        response.add_cookie(Cookie::new("_nsid", "first"));
        response.add_cookie(Cookie::new("other", "value"));
        response.add_cookie(Cookie::new("_nsid", "second"));
        assert_eq!(response.cookies().len(), 2);
        assert_eq!(response.cookies()[1].value(), "second");
    }

    #[test]
    fn redirect_replaces_location() {
        let mut response = Response::new();
        response.set_header("location", "/old");
        response.redirect_to("/new");
        assert_eq!(response.status(), STATUS_FOUND);
        assert_eq!(response.header("Location"), Some("/new"));
        assert_eq!(response.headers().len(), 1);
    }
}
