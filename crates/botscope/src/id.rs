//! Session identifiers.
//!
//! Generated ids are short codes produced by `tiny_id`. Callers may also
//! supply their own ids, which are stored verbatim, so an [`Id`] is an opaque
//! string that only guarantees uniqueness for the codes it generates itself.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::{LazyLock, Mutex, PoisonError};
use tiny_id::ShortCodeGenerator;

/// Length of generated session ids.
pub const SESSION_ID_LEN: usize = 8;

// Alphanumeric without the easily confused 0, O, I, l, i, j, o.
const SESSION_ID_ALPHABET: &str = "123456789ABCDEFGHJKMNPQRSTUVWXYZabcdefghkmnpqrstuvwxyz";

// tiny_id generators need mutable access, so the shared one sits behind a Mutex
static SESSION_ID_GENERATOR: LazyLock<Mutex<ShortCodeGenerator<char>>> = LazyLock::new(|| {
    let alphabet: Vec<char> = SESSION_ID_ALPHABET.chars().collect();
    Mutex::new(ShortCodeGenerator::with_alphabet(alphabet, SESSION_ID_LEN))
});

/// A type-safe wrapper around string ids.
///
/// The marker type keeps ids of different entities from being mixed up while
/// the wire format stays a plain JSON string.
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Id<T> {
    value: String,
    _phantom: std::marker::PhantomData<T>,
}

impl<T> Serialize for Id<T> {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        self.value.serialize(serializer)
    }
}

impl<'de, T> Deserialize<'de> for Id<T> {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let value = String::deserialize(deserializer)?;
        Ok(Self::from_string(value))
    }
}

impl<T> Id<T> {
    /// Wraps a caller-supplied id.
    ///
    /// # Example
    /// ```
    /// use botscope::id::SessionId;
    ///
    /// let session_id = SessionId::from_string("abc123".to_string());
    /// assert_eq!(session_id.as_str(), "abc123");
    /// ```
    pub fn from_string(value: String) -> Self {
        Self {
            value,
            _phantom: std::marker::PhantomData,
        }
    }

    pub fn as_str(&self) -> &str {
        &self.value
    }

    pub fn into_string(self) -> String {
        self.value
    }
}

impl<T> fmt::Debug for Id<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Id({})", self.value)
    }
}

impl<T> fmt::Display for Id<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.value)
    }
}

impl<T> From<String> for Id<T> {
    fn from(value: String) -> Self {
        Self::from_string(value)
    }
}

impl<T> From<&str> for Id<T> {
    fn from(value: &str) -> Self {
        Self::from_string(value.to_string())
    }
}

impl<T> AsRef<str> for Id<T> {
    fn as_ref(&self) -> &str {
        &self.value
    }
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SessionMarker;

/// Type alias for Session IDs
pub type SessionId = Id<SessionMarker>;

impl SessionId {
    /// Generates a new session id (8 characters, no confusable characters).
    ///
    /// # Example
    /// ```
    /// use botscope::id::SessionId;
    ///
    /// let session_id = SessionId::new();
    /// assert_eq!(session_id.as_str().len(), 8);
    /// assert!(!session_id.as_str().chars().any(|c| "0OIl".contains(c)));
    /// ```
    pub fn new() -> Self {
        // A poisoned generator is still a valid generator.
        let mut generator = SESSION_ID_GENERATOR
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        Self::from_string(generator.next_string())
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}
