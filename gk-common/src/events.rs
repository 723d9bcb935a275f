//! Inbound chat events and the event bus
//!
//! An external gateway relay pushes platform events into the service; the
//! bus fans them out to the dispatcher, which handles them one at a time.

use serde::de::{self, Deserializer, Visitor};
use serde::{Deserialize, Serialize, Serializer};
use std::fmt;
use tokio::sync::broadcast;

/// Chat platform identifier
///
/// Serialized as a decimal string; deserialized from either a string or an
/// integer, since relays disagree on how 64-bit ids travel in JSON.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Snowflake(pub u64);

impl Snowflake {
    pub fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for Snowflake {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u64> for Snowflake {
    fn from(value: u64) -> Self {
        Self(value)
    }
}

impl Serialize for Snowflake {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.0.to_string())
    }
}

impl<'de> Deserialize<'de> for Snowflake {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct SnowflakeVisitor;

        impl<'de> Visitor<'de> for SnowflakeVisitor {
            type Value = Snowflake;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("an unsigned integer id or its decimal string")
            }

            fn visit_u64<E: de::Error>(self, v: u64) -> Result<Snowflake, E> {
                Ok(Snowflake(v))
            }

            fn visit_i64<E: de::Error>(self, v: i64) -> Result<Snowflake, E> {
                u64::try_from(v)
                    .map(Snowflake)
                    .map_err(|_| E::custom("negative id"))
            }

            fn visit_str<E: de::Error>(self, v: &str) -> Result<Snowflake, E> {
                v.trim().parse::<u64>().map(Snowflake).map_err(E::custom)
            }
        }

        deserializer.deserialize_any(SnowflakeVisitor)
    }
}

/// Single embed field (name/value pair)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmbedField {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub value: String,
}

/// Rich embed attached to a message; only fields are consumed
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Embed {
    #[serde(default)]
    pub fields: Vec<EmbedField>,
}

/// Newly posted chat message
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub guild_id: Snowflake,
    pub channel_id: Snowflake,
    pub author_id: Snowflake,
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub embeds: Vec<Embed>,
}

impl ChatMessage {
    /// Values of every embed field across all embeds, in order
    pub fn embed_field_values(&self) -> impl Iterator<Item = &str> {
        self.embeds
            .iter()
            .flat_map(|embed| embed.fields.iter())
            .map(|field| field.value.as_str())
    }
}

/// Member role set change (role names before and after)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemberUpdate {
    pub guild_id: Snowflake,
    pub member_id: Snowflake,
    #[serde(default)]
    pub before_roles: Vec<String>,
    #[serde(default)]
    pub after_roles: Vec<String>,
}

/// Inbound chat platform events
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ChatEvent {
    /// A message was posted in a guild channel
    MessageCreated(ChatMessage),

    /// A member's roles changed
    MemberUpdated(MemberUpdate),
}

impl ChatEvent {
    /// Short name for logging
    pub fn kind(&self) -> &'static str {
        match self {
            ChatEvent::MessageCreated(_) => "MessageCreated",
            ChatEvent::MemberUpdated(_) => "MemberUpdated",
        }
    }
}

/// Central event distribution bus
///
/// Thin wrapper over a tokio broadcast channel. Subscribers that fall more
/// than `capacity` events behind lose the oldest events.
pub struct EventBus {
    tx: broadcast::Sender<ChatEvent>,
    capacity: usize,
}

impl EventBus {
    /// Creates a new EventBus with specified channel capacity
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx, capacity }
    }

    /// Subscribe to all future events
    pub fn subscribe(&self) -> broadcast::Receiver<ChatEvent> {
        self.tx.subscribe()
    }

    /// Emit an event to all subscribers
    ///
    /// Returns `Err` if no subscribers are listening.
    #[allow(clippy::result_large_err)]
    pub fn emit(&self, event: ChatEvent) -> Result<usize, broadcast::error::SendError<ChatEvent>> {
        self.tx.send(event)
    }

    /// Configured buffer capacity
    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

impl Clone for EventBus {
    fn clone(&self) -> Self {
        Self {
            tx: self.tx.clone(),
            capacity: self.capacity,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_snowflake_accepts_string_and_number() {
        let from_str: Snowflake = serde_json::from_str("\"251239170058616833\"").unwrap();
        let from_num: Snowflake = serde_json::from_str("251239170058616833").unwrap();
        assert_eq!(from_str, from_num);
        assert_eq!(from_str.get(), 251_239_170_058_616_833);
    }

    #[test]
    fn test_snowflake_serializes_as_string() {
        let json = serde_json::to_string(&Snowflake(42)).unwrap();
        assert_eq!(json, "\"42\"");
    }

    #[test]
    fn test_snowflake_rejects_negative() {
        assert!(serde_json::from_str::<Snowflake>("-1").is_err());
    }

    #[test]
    fn test_chat_event_tagged_json() {
        let json = r#"{
            "type": "MessageCreated",
            "guild_id": "1",
            "channel_id": "2",
            "author_id": "3",
            "content": "k!quiz gn1 nd 20 mmq=4"
        }"#;

        let event: ChatEvent = serde_json::from_str(json).unwrap();
        match event {
            ChatEvent::MessageCreated(message) => {
                assert_eq!(message.author_id, Snowflake(3));
                assert!(message.embeds.is_empty());
            }
            other => panic!("unexpected event {:?}", other),
        }
    }

    #[test]
    fn test_embed_field_values_flatten_in_order() {
        let message = ChatMessage {
            guild_id: Snowflake(1),
            channel_id: Snowflake(2),
            author_id: Snowflake(3),
            content: String::new(),
            embeds: vec![
                Embed {
                    fields: vec![EmbedField { name: "a".into(), value: "first".into() }],
                },
                Embed {
                    fields: vec![EmbedField { name: "b".into(), value: "second".into() }],
                },
            ],
        };

        let values: Vec<&str> = message.embed_field_values().collect();
        assert_eq!(values, vec!["first", "second"]);
    }

    #[tokio::test]
    async fn test_event_bus_delivers_to_subscriber() {
        let bus = EventBus::new(16);
        let mut rx = bus.subscribe();

        let event = ChatEvent::MemberUpdated(MemberUpdate {
            guild_id: Snowflake(1),
            member_id: Snowflake(2),
            before_roles: vec![],
            after_roles: vec!["GN1".to_string()],
        });

        assert_eq!(bus.emit(event.clone()).unwrap(), 1);
        assert_eq!(rx.recv().await.unwrap(), event);
    }

    #[test]
    fn test_emit_without_subscribers_errors() {
        let bus = EventBus::new(4);
        let event = ChatEvent::MemberUpdated(MemberUpdate {
            guild_id: Snowflake(1),
            member_id: Snowflake(2),
            before_roles: vec![],
            after_roles: vec![],
        });
        assert!(bus.emit(event).is_err());
        assert_eq!(bus.capacity(), 4);
    }
}
