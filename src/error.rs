/// All errors that can occur in this crate.
///
/// Every variant describes a mistake of the caller or a broken deployment.
/// Anomalies in untrusted input, such as a missing, forged or expired session token, are never
/// reported as errors; they make the session store hand out a fresh session instead.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// An argument did not satisfy the precondition of the called operation.
    #[error("invalid argument `{argument}`: {reason}")]
    InvalidArgument {
        /// The name of the offending argument.
        argument: &'static str,
        /// Why the argument was rejected.
        reason: &'static str,
    },

    /// An operation was attempted on an object that was already disposed.
    #[error("cannot access a disposed {object}")]
    Disposed {
        /// The kind of object that was disposed.
        object: &'static str,
    },

    /// The configuration is invalid, the session store cannot be constructed from it.
    #[error("invalid session configuration: {0}")]
    InvalidConfiguration(String),

    /// The url of the request cannot be parsed, so no url carrying a session token can be built from it.
    #[error("the request url is invalid")]
    InvalidUrl(#[source] url::ParseError),

    /// The encryption provider failed to encrypt a session id.
    #[error("failed to encrypt the session id")]
    Encryption(#[source] anyhow::Error),

    /// The background thread of a [`ThreadTimer`](crate::ThreadTimer) could not be spawned.
    #[error("failed to spawn the timer thread")]
    TimerThread(#[source] std::io::Error),
}

impl Error {
    pub(crate) fn invalid_argument(argument: &'static str, reason: &'static str) -> Self {
        Self::InvalidArgument { argument, reason }
    }

    pub(crate) fn disposed(object: &'static str) -> Self {
        Self::Disposed { object }
    }
}

mod expect_impl_error {
    trait ExpectImplError: std::error::Error + Send + Sync + 'static {}

    impl ExpectImplError for super::Error {}
}
