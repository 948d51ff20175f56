use crate::{
    ByCookieIdentificationMethod, ByQueryStringParamIdentificationMethod, Clock, Context,
    CookieTransport, CryptographyConfiguration, DefaultSessionIdGenerator, Error,
    IdentificationKind, IdentificationMethod, MemoryCache, PeriodicCacheCleaner,
    QueryStringTransport, Request, Result, Session, SessionCache, SessionConfig, SessionEntry,
    SessionId, SessionIdFactory, SessionIdGenerator, SystemClock, ThreadTimer, Timer,
};
use chrono::Duration;
use std::sync::Arc;

/// Turns sessions into cache entries, stamped with the current time and the configured timeout.
#[derive(Debug)]
pub struct SessionFactory {
    clock: Arc<dyn Clock>,
    timeout: Duration,
}

impl SessionFactory {
    /// Create a factory for entries that expire `timeout` after they were created.
    pub fn new(clock: Arc<dyn Clock>, timeout: Duration) -> Self {
        Self { clock, timeout }
    }

    /// Create the cache entry for `session` under `id`.
    ///
    /// Fails if `id` is empty or if `session` is the null session.
    pub fn create(&self, id: &SessionId, session: &Session) -> Result<SessionEntry> {
        let data = session.data().ok_or_else(|| {
            Error::invalid_argument("session", "the null session cannot be cached")
        })?;
        SessionEntry::new(*id, data.clone(), self.clock.now_utc(), self.timeout)
    }
}

/// The user-facing interface of the session store.
///
/// It loads the session of every request from an in-process [`MemoryCache`], and saves changed
/// sessions back. Clients are identified by an encrypted and signed session token that travels
/// in a cookie or a query parameter, depending on the [`SessionConfig`].
///
/// Dropping the manager stops the periodic cleanup and disposes the cache, losing all sessions.
///
/// ```
/// use inproc_session::{
///     Context, CryptographyConfiguration, Request, SessionConfig, SessionManager, SessionValue,
/// };
///
/// # fn main() -> inproc_session::Result {
/// let manager = SessionManager::new(SessionConfig::default(), CryptographyConfiguration::random())?;
///
/// // The first request of a client carries no token, so it gets a fresh session.
/// let request = Request::new("http://example.com/cart");
/// let mut session = manager.load(&request)?;
/// assert!(session.is_empty());
/// session.insert("items", 3);
///
/// // Saving stores the session and hands the client a session cookie.
/// let mut context = Context::new(request);
/// manager.save(&session, &mut context)?;
/// let cookie = context.response.cookies()[0].clone();
/// assert_eq!(cookie.name(), "_nsid");
///
/// // The next request sends the cookie back, percent-encoded as it was set, and finds the session.
/// let request = Request::new("http://example.com/checkout")
///     .with_cookie(cookie.name(), urlencoding::encode(cookie.value()));
/// let session = manager.load(&request)?;
/// assert_eq!(session.get("items"), Some(&SessionValue::Integer(3)));
/// # Ok(()) }
/// ```
#[derive(Debug)]
pub struct SessionManager {
    cache: Arc<MemoryCache>,
    session_factory: SessionFactory,
    identification: Box<dyn IdentificationMethod>,
    cleaner: PeriodicCacheCleaner,
}

impl SessionManager {
    /// Create a session manager that uses the system clock, a background thread for periodic
    /// cleanup and random session ids.
    ///
    /// Fails if `config` is invalid, or if the cleanup thread cannot be started.
    pub fn new(config: SessionConfig, cryptography: CryptographyConfiguration) -> Result<Self> {
        Self::builder(config, cryptography).build()
    }

    /// Start building a session manager whose clock, timer or id generator differ from the defaults.
    pub fn builder(
        config: SessionConfig,
        cryptography: CryptographyConfiguration,
    ) -> SessionManagerBuilder {
        SessionManagerBuilder {
            config,
            cryptography,
            clock: Arc::new(SystemClock),
            timer: Box::new(ThreadTimer::new()),
            id_generator: Box::new(DefaultSessionIdGenerator),
        }
    }

    /// Load the session of `request`.
    ///
    /// If the request carries no valid token, or its session does not exist or expired,
    /// a new empty session is returned. It is not cached until it is saved.
    pub fn load(&self, request: &Request) -> Result<Session> {
        let id = self.identification.current_session_id(request);
        Ok(match self.cache.get(&id)? {
            Some(entry) => Session::from_entry(&entry),
            None => Session::new(),
        })
    }

    /// Save `session` as the session of the request of `context`.
    ///
    /// Sessions that are unchanged, empty or null are not saved.
    /// If the client has no token for the session yet, one is written to the response of `context`.
    pub fn save(&self, session: &Session, context: &mut Context) -> Result {
        if !session.has_changed() || session.is_null() || session.is_empty() {
            return Ok(());
        }

        let id = self.identification.current_session_id(&context.request);
        let entry = self.session_factory.create(&id, session)?;
        self.cache.set(entry)?;
        self.identification.save_session_id(&id, context)
    }

    /// The cache holding the sessions of this manager.
    pub fn cache(&self) -> &MemoryCache {
        &self.cache
    }
}

impl Drop for SessionManager {
    fn drop(&mut self) {
        self.cleaner.stop();
        self.cache.dispose();
    }
}

/// Builds a [`SessionManager`], see [`SessionManager::builder`].
#[derive(Debug)]
pub struct SessionManagerBuilder {
    config: SessionConfig,
    cryptography: CryptographyConfiguration,
    clock: Arc<dyn Clock>,
    timer: Box<dyn Timer>,
    id_generator: Box<dyn SessionIdGenerator>,
}

impl SessionManagerBuilder {
    /// Decide session expiry by `clock` instead of the system clock.
    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Drive the periodic cleanup by `timer` instead of a background thread.
    pub fn timer(mut self, timer: impl Timer + 'static) -> Self {
        self.timer = Box::new(timer);
        self
    }

    /// Mint session ids with `id_generator` instead of randomly.
    pub fn id_generator(mut self, id_generator: impl SessionIdGenerator + 'static) -> Self {
        self.id_generator = Box::new(id_generator);
        self
    }

    /// Validate the configuration, create the manager and start the periodic cleanup.
    pub fn build(self) -> Result<SessionManager> {
        let Self {
            config,
            cryptography,
            clock,
            timer,
            id_generator,
        } = self;

        config.validate()?;
        if cryptography.hmac_provider.hmac_length() == 0 {
            return Err(Error::InvalidConfiguration(
                "the hmac provider must generate signatures of non-zero length".to_string(),
            ));
        }
        let timeout = Duration::from_std(config.session_timeout).map_err(|_| {
            Error::InvalidConfiguration("the session timeout is out of range".to_string())
        })?;

        let id_factory = SessionIdFactory::new(id_generator);
        let identification: Box<dyn IdentificationMethod> = match config.identification {
            IdentificationKind::Cookie => Box::new(ByCookieIdentificationMethod::new(
                CookieTransport::new(config.name.clone(), config.domain.clone(), config.path.clone()),
                &cryptography,
                id_factory,
            )),
            IdentificationKind::QueryString => {
                Box::new(ByQueryStringParamIdentificationMethod::new(
                    QueryStringTransport::new(config.name.clone()),
                    &cryptography,
                    id_factory,
                ))
            }
        };

        let cache = Arc::new(MemoryCache::new(Arc::clone(&clock)));
        let cleaner = PeriodicCacheCleaner::new(
            Arc::clone(&cache) as Arc<dyn SessionCache>,
            config.cache_trim_interval,
            timer,
        );
        cleaner.start()?;

        log::debug!(
            "Created a session manager identifying sessions by {:?} `{}`",
            config.identification,
            config.name
        );
        Ok(SessionManager {
            cache,
            session_factory: SessionFactory::new(clock, timeout),
            identification,
            cleaner,
        })
    }
}
