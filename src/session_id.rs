use std::fmt::{Debug, Display, Formatter};
use std::hash::{Hash, Hasher};
use uuid::Uuid;

mod generator;

pub use generator::{DebugSessionIdGenerator, DefaultSessionIdGenerator, SessionIdGenerator};

/// The identifier of a session.
///
/// Two session ids are equal if their values are equal.
/// Whether an id [is new](SessionId::is_new) is metadata about where the id came from, not part of its identity.
#[derive(Clone, Copy)]
pub struct SessionId {
    value: Uuid,
    is_new: bool,
}

impl SessionId {
    /// Create a session id from its parts.
    ///
    /// Usually session ids are obtained from a [`SessionIdFactory`].
    pub fn new(value: Uuid, is_new: bool) -> Self {
        Self { value, is_new }
    }

    /// The 128-bit value of this id.
    pub fn value(&self) -> Uuid {
        self.value
    }

    /// Returns true if this id was minted for the current request, i.e. the client does not know it yet.
    pub fn is_new(&self) -> bool {
        self.is_new
    }

    /// Returns true if this is the empty (all-zero) id, which never names a session.
    pub fn is_empty(&self) -> bool {
        self.value.is_nil()
    }
}

impl PartialEq for SessionId {
    fn eq(&self, other: &Self) -> bool {
        self.value == other.value
    }
}

impl Eq for SessionId {}

impl Hash for SessionId {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.value.hash(state);
    }
}

impl Display for SessionId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        Display::fmt(&self.value.hyphenated(), f)
    }
}

impl Debug for SessionId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        if self.is_new {
            write!(f, "SessionId({} (new))", self.value)
        } else {
            write!(f, "SessionId({})", self.value)
        }
    }
}

/// Mints new session ids and parses existing ones.
#[derive(Debug)]
pub struct SessionIdFactory {
    generator: Box<dyn SessionIdGenerator>,
}

impl SessionIdFactory {
    /// Create a factory that mints ids with the given generator.
    pub fn new(generator: Box<dyn SessionIdGenerator>) -> Self {
        Self { generator }
    }

    /// Mint a fresh id, marked as new.
    pub fn create_new(&self) -> SessionId {
        let mut value = self.generator.generate_id();
        while value.is_nil() {
            value = self.generator.generate_id();
        }
        SessionId::new(value, true)
    }

    /// Parse an id that was previously handed to a client, marked as not new.
    ///
    /// Returns `None` if `session_id` is not a uuid, or if it is the nil uuid.
    pub fn create_from(&self, session_id: &str) -> Option<SessionId> {
        Uuid::parse_str(session_id.trim())
            .ok()
            .filter(|value| !value.is_nil())
            .map(|value| SessionId::new(value, false))
    }
}

impl Default for SessionIdFactory {
    fn default() -> Self {
        Self::new(Box::new(DefaultSessionIdGenerator))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn equality_ignores_the_new_flag() {
        let value = Uuid::from_u128(7);
        assert_eq!(SessionId::new(value, true), SessionId::new(value, false));
        assert_ne!(
            SessionId::new(value, false),
            SessionId::new(Uuid::from_u128(8), false)
        );
    }

    #[test]
    fn minted_ids_are_new_and_not_empty() {
        let factory = SessionIdFactory::default();
        let id = factory.create_new();
        assert!(id.is_new());
        assert!(!id.is_empty());
        assert_ne!(id, factory.create_new());
    }

    #[test]
    fn parses_uuid_strings_as_existing_ids() {
        let factory = SessionIdFactory::default();
        let value = Uuid::from_u128(0x1234);
        for text in [
            value.hyphenated().to_string(),
            value.simple().to_string(),
            value.braced().to_string(),
        ] {
            let id = factory.create_from(&text).unwrap();
            assert_eq!(id.value(), value);
            assert!(!id.is_new());
        }
    }

    #[test]
    fn rejects_malformed_and_nil_ids() {
        let factory = SessionIdFactory::default();
        assert_eq!(factory.create_from(""), None);
        assert_eq!(factory.create_from("not a session id"), None);
        assert_eq!(factory.create_from(&Uuid::nil().to_string()), None);
    }

    #[test]
    fn debug_generator_is_predictable() {
        let factory = SessionIdFactory::new(Box::new(DebugSessionIdGenerator::default()));
        assert_eq!(factory.create_new().value(), Uuid::from_u128(1));
        assert_eq!(factory.create_new().value(), Uuid::from_u128(2));
    }
}
