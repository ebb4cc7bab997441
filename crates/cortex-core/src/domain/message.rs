//! Agent messages

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageKind {
    #[default]
    Chat,
    Command,
    System,
    Decision,
}

impl MessageKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Chat => "chat",
            Self::Command => "command",
            Self::System => "system",
            Self::Decision => "decision",
        }
    }
}

impl std::str::FromStr for MessageKind {
    type Err = crate::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "chat" => Ok(Self::Chat),
            "command" => Ok(Self::Command),
            "system" => Ok(Self::System),
            "decision" => Ok(Self::Decision),
            other => Err(crate::Error::InvalidInput(format!(
                "unknown message kind '{}', expected chat, command, system or decision",
                other
            ))),
        }
    }
}

/// An immutable message from an agent on a channel
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub id: String,
    pub author: String,
    pub channel: String,
    pub body: String,
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub kind: MessageKind,
}

impl Message {
    /// New chat message with a generated id, stamped now
    pub fn new(author: impl Into<String>, channel: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            author: author.into(),
            channel: channel.into(),
            body: body.into(),
            timestamp: Utc::now(),
            kind: MessageKind::Chat,
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = id.into();
        self
    }

    pub fn with_kind(mut self, kind: MessageKind) -> Self {
        self.kind = kind;
        self
    }

    pub fn with_timestamp(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = timestamp;
        self
    }

    pub fn timestamp_rfc3339(&self) -> String {
        self.timestamp.to_rfc3339()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_message_defaults() {
        let a = Message::new("atlas", "general", "hello");
        let b = Message::new("atlas", "general", "hello");
        assert_ne!(a.id, b.id);
        assert_eq!(a.kind, MessageKind::Chat);
    }

    #[test]
    fn test_kind_parsing() {
        assert_eq!("Decision".parse::<MessageKind>().expect("parse"), MessageKind::Decision);
        assert!("memo".parse::<MessageKind>().is_err());
        assert_eq!(MessageKind::System.as_str(), "system");
    }
}
