use crate::{Error, Result, SessionId};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::btree_map::{self, BTreeMap};
use std::mem;

/// The data held by a session, ordered by key.
pub type SessionData = BTreeMap<String, SessionValue>;

/// A value stored in a session.
///
/// Session values are a closed set of plain data types, so that sessions can be copied,
/// compared and serialized without knowing anything about the application.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionValue {
    /// The absence of a value.
    Null,
    /// A boolean.
    Bool(bool),
    /// A signed integer.
    Integer(i64),
    /// A floating point number.
    Float(f64),
    /// A string.
    String(String),
    /// Raw bytes.
    Bytes(Vec<u8>),
}

macro_rules! impl_from_for_session_value {
    ($($source:ty => $variant:ident),* $(,)?) => {
        $(impl From<$source> for SessionValue {
            fn from(value: $source) -> Self {
                Self::$variant(value.into())
            }
        })*
    };
}

impl_from_for_session_value!(
    bool => Bool,
    i32 => Integer,
    i64 => Integer,
    u32 => Integer,
    f64 => Float,
    String => String,
    &str => String,
    Vec<u8> => Bytes,
    &[u8] => Bytes,
);

impl From<()> for SessionValue {
    fn from(_: ()) -> Self {
        Self::Null
    }
}

/// A session with a client.
///
/// A session is a bag of key/value pairs that lives for the duration of one request.
/// Loading it from the [`SessionManager`](crate::SessionManager) copies the data out of the cache,
/// and saving it copies the data back in, so changes only become visible to other requests once
/// the session is saved.
///
/// Changes are tracked automatically: every mutating method marks the session as changed,
/// even if it did not actually modify anything.
/// Unchanged sessions are never written back to the cache.
#[derive(Debug, Clone, PartialEq)]
#[must_use]
pub struct Session {
    state: SessionState,
}

#[derive(Debug, Clone, PartialEq)]
enum SessionState {
    /// The session was created or loaded for this request and not written to.
    Unchanged { data: SessionData },
    /// The session was written to during this request.
    Changed { data: SessionData },
    /// The placeholder session handed out when sessions are disabled. It ignores all writes.
    Null,
    /// Used internally to avoid unsafe code when replacing the session state through a mutable reference.
    Invalid,
}

impl Session {
    /// Create a new empty session that is not marked as changed.
    ///
    /// # Example
    ///
    /// ```rust
    /// # use inproc_session::Session;
    /// let mut session = Session::new();
    /// assert!(session.is_empty());
    /// assert!(!session.has_changed());
    /// session.insert("user", "alice");
    /// assert!(session.has_changed());
    /// ```
    pub fn new() -> Self {
        Self {
            state: SessionState::Unchanged {
                data: SessionData::new(),
            },
        }
    }

    /// Create the null session, which ignores all writes and is never saved.
    pub fn null() -> Self {
        Self {
            state: SessionState::Null,
        }
    }

    /// Create an unchanged session holding a copy of the data of the given cache entry.
    pub fn from_entry(entry: &SessionEntry) -> Self {
        Self {
            state: SessionState::Unchanged {
                data: entry.data().clone(),
            },
        }
    }

    /// Returns true if this session was changed since it was created or loaded.
    pub fn has_changed(&self) -> bool {
        matches!(self.state, SessionState::Changed { .. })
    }

    /// Returns true if this is the null session.
    pub fn is_null(&self) -> bool {
        matches!(self.state, SessionState::Null)
    }

    /// Returns the number of values in this session.
    pub fn len(&self) -> usize {
        self.data().map_or(0, BTreeMap::len)
    }

    /// Returns true if this session holds no values.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns the value stored under `key`.
    pub fn get(&self, key: &str) -> Option<&SessionValue> {
        self.data().and_then(|data| data.get(key))
    }

    /// Iterate over all key/value pairs in key order.
    pub fn iter(&self) -> btree_map::Iter<'_, String, SessionValue> {
        match self.data() {
            Some(data) => data.iter(),
            None => EMPTY_DATA.iter(),
        }
    }

    /// Returns the data of this session, or `None` for the null session.
    pub fn data(&self) -> Option<&SessionData> {
        match &self.state {
            SessionState::Unchanged { data } | SessionState::Changed { data } => Some(data),
            SessionState::Null => None,
            SessionState::Invalid => unreachable!("Invalid state is used internally only"),
        }
    }

    /// Store `value` under `key`, returning the previous value.
    /// Marks the session as changed.
    pub fn insert(
        &mut self,
        key: impl Into<String>,
        value: impl Into<SessionValue>,
    ) -> Option<SessionValue> {
        self.data_mut()?.insert(key.into(), value.into())
    }

    /// Remove the value stored under `key`, returning it.
    /// Marks the session as changed.
    pub fn remove(&mut self, key: &str) -> Option<SessionValue> {
        self.data_mut()?.remove(key)
    }

    /// Remove all values from this session.
    /// Marks the session as changed.
    pub fn clear(&mut self) {
        if let Some(data) = self.data_mut() {
            data.clear();
        }
    }

    fn data_mut(&mut self) -> Option<&mut SessionData> {
        self.change();

        match &mut self.state {
            SessionState::Changed { data } => Some(data),
            SessionState::Null => {
                log::warn!("Ignoring a write to the null session, sessions are not enabled");
                None
            }
            SessionState::Unchanged { .. } => {
                unreachable!("Cannot be unchanged after explicitly changing")
            }
            SessionState::Invalid => unreachable!("Invalid state is used internally only"),
        }
    }

    fn change(&mut self) {
        if let SessionState::Unchanged { .. } = self.state {
            let SessionState::Unchanged { data } = mem::replace(&mut self.state, SessionState::Invalid)
            else {
                unreachable!()
            };
            self.state = SessionState::Changed { data };
        }
    }
}

static EMPTY_DATA: SessionData = SessionData::new();

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}

impl<'session> IntoIterator for &'session Session {
    type Item = (&'session String, &'session SessionValue);
    type IntoIter = btree_map::Iter<'session, String, SessionValue>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

/// A snapshot of a session as it is held by the session cache.
///
/// Entries are immutable. Saving a session always creates a new entry that replaces
/// the previous entry with the same id.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionEntry {
    id: SessionId,
    data: SessionData,
    last_save: DateTime<Utc>,
    timeout: Duration,
}

impl SessionEntry {
    /// Create a cache entry.
    ///
    /// Fails if `id` is the empty session id.
    pub fn new(
        id: SessionId,
        data: SessionData,
        last_save: DateTime<Utc>,
        timeout: Duration,
    ) -> Result<Self> {
        if id.is_empty() {
            return Err(Error::invalid_argument(
                "id",
                "the session id cannot be empty",
            ));
        }

        Ok(Self {
            id,
            data,
            last_save,
            timeout,
        })
    }

    /// The id of the session.
    pub fn id(&self) -> &SessionId {
        &self.id
    }

    /// The data of the session.
    pub fn data(&self) -> &SessionData {
        &self.data
    }

    /// The UTC time at which the session was saved.
    pub fn last_save(&self) -> DateTime<Utc> {
        self.last_save
    }

    /// The time after the last save at which the session expires.
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Returns true if the session expired before `now`.
    /// A session is still valid at exactly `last_save + timeout`.
    ///
    /// # Example
    ///
    /// ```rust
    /// # use inproc_session::{SessionEntry, SessionId, SessionData};
    /// # use chrono::{Duration, Utc};
    /// # use uuid::Uuid;
    /// # fn main() -> inproc_session::Result {
    /// let saved = Utc::now();
    /// let id = SessionId::new(Uuid::from_u128(1), false);
    /// let entry = SessionEntry::new(id, SessionData::new(), saved, Duration::minutes(20))?;
    /// assert!(!entry.is_expired(saved + Duration::minutes(20)));
    /// assert!(entry.is_expired(saved + Duration::minutes(20) + Duration::milliseconds(1)));
    /// # Ok(()) }
    /// ```
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        match self.last_save.checked_add_signed(self.timeout) {
            Some(expiry) => now > expiry,
            None => false,
        }
    }
}
