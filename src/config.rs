use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// The name of the session cookie or query parameter if none is configured.
pub const DEFAULT_SESSION_NAME: &str = "_nsid";
/// How long a session lives after its last save if no timeout is configured.
pub const DEFAULT_SESSION_TIMEOUT: Duration = Duration::from_secs(20 * 60);
/// How often expired sessions are removed if no trim interval is configured.
pub const DEFAULT_CACHE_TRIM_INTERVAL: Duration = Duration::from_secs(30);

/// The way session tokens travel between server and client.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IdentificationKind {
    /// An HTTP-only session cookie.
    #[default]
    Cookie,
    /// A query string parameter. New tokens are handed out by redirecting.
    QueryString,
}

/// The configuration of a [`SessionManager`](crate::SessionManager).
///
/// Every field has a default, so a configuration can be deserialized from a partial document.
/// Durations are given in whole seconds.
///
/// ```
/// use inproc_session::{IdentificationKind, SessionConfig};
/// use std::time::Duration;
///
/// let config = SessionConfig {
///     identification: IdentificationKind::QueryString,
///     session_timeout: Duration::from_secs(5 * 60),
///     ..SessionConfig::default()
/// };
/// assert_eq!(config.name, "_nsid");
/// assert!(config.validate().is_ok());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// The name of the session cookie or query parameter.
    pub name: String,
    /// The domain the session cookie is restricted to.
    pub domain: Option<String>,
    /// The path the session cookie is restricted to.
    pub path: Option<String>,
    /// How long a session lives after it was last saved.
    #[serde(with = "seconds")]
    pub session_timeout: Duration,
    /// How often expired sessions are removed from the cache. Zero disables periodic removal,
    /// expired sessions are then only evicted when they are requested.
    #[serde(with = "seconds")]
    pub cache_trim_interval: Duration,
    /// The way session tokens travel between server and client.
    pub identification: IdentificationKind,
}

impl SessionConfig {
    /// Check that this configuration can be used to construct a session manager.
    pub fn validate(&self) -> Result {
        if self.name.is_empty() {
            return Err(invalid("the session name must not be empty"));
        }
        if let Some(character) = self
            .name
            .chars()
            .find(|&character| character.is_whitespace() || matches!(character, ';' | ',' | '='))
        {
            return Err(invalid(format!(
                "the session name must not contain {character:?}"
            )));
        }
        for (attribute, value) in [("domain", &self.domain), ("path", &self.path)] {
            if let Some(character) = value.as_deref().and_then(|value| {
                value
                    .chars()
                    .find(|&character| character.is_control() || matches!(character, ';' | ','))
            }) {
                return Err(invalid(format!(
                    "the cookie {attribute} must not contain {character:?}"
                )));
            }
        }
        if self.session_timeout.is_zero() {
            return Err(invalid("the session timeout must be greater than zero"));
        }
        if chrono::Duration::from_std(self.session_timeout).is_err() {
            return Err(invalid("the session timeout is out of range"));
        }
        Ok(())
    }
}

fn invalid(reason: impl Into<String>) -> Error {
    Error::InvalidConfiguration(reason.into())
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            name: DEFAULT_SESSION_NAME.to_string(),
            domain: None,
            path: None,
            session_timeout: DEFAULT_SESSION_TIMEOUT,
            cache_trim_interval: DEFAULT_CACHE_TRIM_INTERVAL,
            identification: IdentificationKind::default(),
        }
    }
}

mod seconds {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub(super) fn serialize<S: Serializer>(
        duration: &Duration,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(duration.as_secs())
    }

    pub(super) fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_secs)
    }
}
