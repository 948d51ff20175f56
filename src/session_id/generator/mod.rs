use rand::Rng;
use std::fmt::Debug;
use std::sync::atomic::{AtomicU64, Ordering};
use uuid::Uuid;

/// A type with the ability to generate session id values.
///
/// Generators are shared between all request threads, so they generate through `&self`.
pub trait SessionIdGenerator: Debug + Send + Sync {
    /// Generate a session id value. Generators should never return the nil uuid.
    fn generate_id(&self) -> Uuid;
}

/// The default session id generator with focus on security.
/// It uses [rand::rngs::ThreadRng] as a random source to fill a version 4 uuid.
/// This gives 122 bits of entropy per session id.
#[derive(Debug, Default, Clone, Copy)]
pub struct DefaultSessionIdGenerator;

impl SessionIdGenerator for DefaultSessionIdGenerator {
    fn generate_id(&self) -> Uuid {
        let bytes: [u8; 16] = rand::thread_rng().gen();
        uuid::Builder::from_random_bytes(bytes).into_uuid()
    }
}

/// A debug session id generator that generates an ascending sequence of uuids, starting at 1.
///
/// **This generator is supposed to be used in tests only.**
/// Two fresh instances generate the same sequence, which makes issued ids predictable.
#[derive(Debug, Default)]
pub struct DebugSessionIdGenerator {
    next_index: AtomicU64,
}

impl SessionIdGenerator for DebugSessionIdGenerator {
    fn generate_id(&self) -> Uuid {
        let index = self.next_index.fetch_add(1, Ordering::Relaxed) + 1;
        Uuid::from_u128(u128::from(index))
    }
}
