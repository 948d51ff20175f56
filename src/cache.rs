use crate::{Result, SessionEntry, SessionId};
use std::fmt::Debug;
use std::sync::Arc;

/// This is the backend-facing interface of the session manager.
/// It defines a keyed store of [`SessionEntry`]s that expire after their timeout.
///
/// The session id is the key, uniquely identifying an entry.
/// Implementations must be safe to use from many request threads and the cleaner thread at once.
pub trait SessionCache: Debug + Send + Sync {
    /// Returns the number of entries currently held, including expired entries that were not evicted yet.
    fn count(&self) -> Result<usize>;

    /// Get the entry with the given `id`.
    ///
    /// If the entry exists but is expired, it is evicted and `None` is returned.
    fn get(&self, id: &SessionId) -> Result<Option<Arc<SessionEntry>>>;

    /// Insert `entry`, replacing any entry with the same id.
    fn set(&self, entry: SessionEntry) -> Result;

    /// Remove all expired entries.
    fn trim(&self) -> Result;

    /// Release all entries. Any further operation on this cache fails with [`Error::Disposed`](crate::Error::Disposed).
    fn dispose(&self);
}
