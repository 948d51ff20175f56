use crate::{Clock, Error, Result, SessionCache, SessionEntry, SessionId, SystemClock};
use parking_lot::{RwLock, RwLockUpgradableReadGuard};
use std::collections::HashMap;
use std::sync::Arc;

type SessionMap = HashMap<SessionId, Arc<SessionEntry>>;

/// # in-memory session cache
/// Because there is no external
/// persistence, this session cache is ephemeral and will be cleared
/// on server restart.
///
/// # ***READ THIS BEFORE USING IN A PRODUCTION DEPLOYMENT***
///
/// Storing sessions only in memory brings the following problems:
///
/// 1. All sessions must fit in available memory (important for high load services)
/// 2. Expired sessions are removed only when they are looked up, or when [SessionCache::trim] runs.
///    Make sure a [PeriodicCacheCleaner](crate::PeriodicCacheCleaner) runs, or memory accumulates.
/// 3. All sessions will be lost on shutdown
/// 4. If the service is clustered particular session will be stored only on a single instance.
///    This might be solved by using load balancers with sticky sessions.
///
/// Lookups take an upgradable read lock, so concurrent lookups of valid sessions never block each other.
/// Only a lookup that finds an expired entry upgrades to a write lock to evict it.
#[derive(Debug)]
pub struct MemoryCache {
    /// `None` once the cache is disposed.
    session_map: RwLock<Option<SessionMap>>,
    clock: Arc<dyn Clock>,
}

const OBJECT_NAME: &str = "MemoryCache";

impl MemoryCache {
    /// Create a new empty memory cache that uses `clock` to decide which entries are expired.
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            session_map: RwLock::new(Some(SessionMap::new())),
            clock,
        }
    }

    /// Returns a snapshot of all entries currently held, including expired entries that were not evicted yet.
    pub fn entries(&self) -> Result<Vec<Arc<SessionEntry>>> {
        let session_map = self.session_map.read();
        let sessions = session_map.as_ref().ok_or_else(|| Error::disposed(OBJECT_NAME))?;
        Ok(sessions.values().cloned().collect())
    }
}

impl Default for MemoryCache {
    fn default() -> Self {
        Self::new(Arc::new(SystemClock))
    }
}

impl SessionCache for MemoryCache {
    fn count(&self) -> Result<usize> {
        let session_map = self.session_map.read();
        let sessions = session_map.as_ref().ok_or_else(|| Error::disposed(OBJECT_NAME))?;
        Ok(sessions.len())
    }

    fn get(&self, id: &SessionId) -> Result<Option<Arc<SessionEntry>>> {
        if id.is_empty() {
            return Err(Error::invalid_argument(
                "id",
                "the session id cannot be empty",
            ));
        }

        let session_map = self.session_map.upgradable_read();
        let sessions = session_map.as_ref().ok_or_else(|| Error::disposed(OBJECT_NAME))?;
        let Some(entry) = sessions.get(id).cloned() else {
            return Ok(None);
        };
        if !entry.is_expired(self.clock.now_utc()) {
            return Ok(Some(entry));
        }

        // No other writer can have run since the lookup, an upgradable read excludes writers.
        let mut session_map = RwLockUpgradableReadGuard::upgrade(session_map);
        if let Some(sessions) = session_map.as_mut() {
            sessions.remove(id);
        }
        log::trace!("Evicted an expired session");
        Ok(None)
    }

    fn set(&self, entry: SessionEntry) -> Result {
        let mut session_map = self.session_map.write();
        let sessions = session_map.as_mut().ok_or_else(|| Error::disposed(OBJECT_NAME))?;
        sessions.insert(*entry.id(), Arc::new(entry));
        Ok(())
    }

    fn trim(&self) -> Result {
        log::trace!("Trimming memory cache...");
        let mut session_map = self.session_map.write();
        let sessions = session_map.as_mut().ok_or_else(|| Error::disposed(OBJECT_NAME))?;
        let now = self.clock.now_utc();
        let initial_len = sessions.len();
        sessions.retain(|_, entry| !entry.is_expired(now));
        log::trace!("Deleted {} expired sessions", initial_len - sessions.len());
        Ok(())
    }

    fn dispose(&self) {
        if self.session_map.write().take().is_some() {
            log::debug!("Disposed memory cache");
        }
    }
}
