//! Message payloads: the plaintext unit of a chat exchange.
//!
//! A payload is what the caller hands to `send` and what `receive` yields
//! after decryption and verification. The body is arbitrary JSON.

use rand::RngCore;
use serde::{Deserialize, Serialize};
use std::fmt;

/// An opaque message identifier, unique per channel.
///
/// Callers may supply their own; otherwise a fresh random id is
/// generated so messages never collide on last-write in the transport's
/// store.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MessageId(pub String);

impl MessageId {
    /// Generate a fresh random identifier (16 bytes, hex).
    pub fn generate() -> Self {
        let mut bytes = [0u8; 16];
        rand::thread_rng().fill_bytes(&mut bytes);
        Self(hex::encode(bytes))
    }

    /// Wrap a caller-supplied identifier.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// The identifier as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Discriminator for how a payload body is interpreted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageKind {
    /// An ordinary chat message.
    Message,
    /// Anything this version does not understand.
    #[serde(other)]
    Unknown,
}

/// The plaintext payload of a chat message.
///
/// Optional fields are omitted from the wire encoding entirely when
/// absent, which keeps the canonical bytes stable across versions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MessagePayload {
    /// Unique id within the channel. Filled by the pipeline when absent.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<MessageId>,

    /// Payload discriminator.
    #[serde(rename = "type")]
    pub kind: MessageKind,

    /// Arbitrary JSON body (e.g. `{"content": "hi"}`).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub body: Option<serde_json::Value>,

    /// Recipient user id.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub to: Option<String>,

    /// Sender user id. Filled by the pipeline when absent.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub from: Option<String>,

    /// Thread this message belongs to.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub thread_id: Option<String>,

    /// Creation time, Unix milliseconds. Author-claimed, untrusted.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_at: Option<i64>,

    /// Expiry time, Unix milliseconds.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<i64>,

    /// Where replies should be published.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reply_url: Option<String>,

    /// Message this one replies to.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reply_to: Option<String>,
}

impl MessagePayload {
    /// Create a plain chat message with the given JSON body.
    pub fn message(body: serde_json::Value) -> Self {
        Self {
            id: None,
            kind: MessageKind::Message,
            body: Some(body),
            to: None,
            from: None,
            thread_id: None,
            created_at: None,
            expires_at: None,
            reply_url: None,
            reply_to: None,
        }
    }

    /// Set the message id.
    pub fn with_id(mut self, id: MessageId) -> Self {
        self.id = Some(id);
        self
    }

    /// Set the recipient user id.
    pub fn with_to(mut self, to: impl Into<String>) -> Self {
        self.to = Some(to.into());
        self
    }

    /// Set the creation timestamp (Unix milliseconds).
    pub fn with_created_at(mut self, at: i64) -> Self {
        self.created_at = Some(at);
        self
    }

    /// The textual content of the body, if any.
    pub fn content(&self) -> Option<&str> {
        self.body.as_ref()?.get("content")?.as_str()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_generated_ids_are_unique() {
        let a = MessageId::generate();
        let b = MessageId::generate();
        assert_ne!(a, b);
        assert_eq!(a.as_str().len(), 32);
    }

    #[test]
    fn test_kind_wire_names() {
        let payload = MessagePayload::message(json!({"content": "hi"}));
        let encoded = serde_json::to_value(&payload).unwrap();
        assert_eq!(encoded["type"], "message");
        // Absent optionals are omitted entirely.
        assert!(encoded.get("to").is_none());
    }

    #[test]
    fn test_unknown_kind_tolerated() {
        let decoded: MessagePayload =
            serde_json::from_value(json!({"type": "poke", "body": {}})).unwrap();
        assert_eq!(decoded.kind, MessageKind::Unknown);
    }

    #[test]
    fn test_content_accessor() {
        let payload = MessagePayload::message(json!({"content": "hello"}));
        assert_eq!(payload.content(), Some("hello"));
        assert_eq!(MessagePayload::message(json!({})).content(), None);
    }
}
