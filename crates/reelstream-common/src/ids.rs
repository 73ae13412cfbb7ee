//! Typed ID wrappers for type safety across reelstream.
//!
//! Chat and message ids are the upstream store's integer addresses; a
//! connection id names one registered upstream connection. Wrapping them keeps
//! a message id from being passed where a chat id is expected.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Identifier of a chat (channel) holding media messages upstream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ChatId(i64);

impl ChatId {
    /// Wrap a raw chat id.
    #[must_use]
    pub const fn new(raw: i64) -> Self {
        Self(raw)
    }

    /// The raw integer value.
    pub const fn get(self) -> i64 {
        self.0
    }
}

impl From<i64> for ChatId {
    fn from(raw: i64) -> Self {
        Self(raw)
    }
}

impl fmt::Display for ChatId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identifier of a message within a chat.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MessageId(i64);

impl MessageId {
    /// Wrap a raw message id.
    #[must_use]
    pub const fn new(raw: i64) -> Self {
        Self(raw)
    }

    /// The raw integer value.
    pub const fn get(self) -> i64 {
        self.0
    }
}

impl From<i64> for MessageId {
    fn from(raw: i64) -> Self {
        Self(raw)
    }
}

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identity of one registered upstream connection.
///
/// Ordering matters: the connection pool breaks load ties by ascending id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConnectionId(u32);

impl ConnectionId {
    #[must_use]
    pub const fn new(raw: u32) -> Self {
        Self(raw)
    }

    pub const fn get(self) -> u32 {
        self.0
    }
}

impl From<u32> for ConnectionId {
    fn from(raw: u32) -> Self {
        Self(raw)
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "conn-{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chat_id_roundtrip() {
        let id = ChatId::from(-1001234567890);
        assert_eq!(id.get(), -1001234567890);
        assert_eq!(id.to_string(), "-1001234567890");
    }

    #[test]
    fn test_ids_serialize_transparently() {
        let json = serde_json::to_string(&MessageId::new(42)).unwrap();
        assert_eq!(json, "42");

        let id: ChatId = serde_json::from_str("-100").unwrap();
        assert_eq!(id, ChatId::new(-100));
    }

    #[test]
    fn test_connection_id_ordering() {
        let mut ids = vec![ConnectionId::new(2), ConnectionId::new(0), ConnectionId::new(1)];
        ids.sort();
        assert_eq!(ids, vec![ConnectionId::new(0), ConnectionId::new(1), ConnectionId::new(2)]);
        assert_eq!(ConnectionId::new(3).to_string(), "conn-3");
    }
}
