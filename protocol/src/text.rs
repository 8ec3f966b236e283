//! JSON payloads carried inside string fields: chat text components and the
//! server-list status document.

use serde::{Deserialize, Serialize};

use crate::error::{EncodeError, EncodeResult};
use crate::{PROTOCOL_VERSION, VERSION_NAME};

/// A plain chat component, `{"text": "..."}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TextComponent {
    pub text: String,
}

impl TextComponent {
    pub fn plain(text: impl Into<String>) -> Self {
        Self { text: text.into() }
    }

    pub fn to_json(&self) -> EncodeResult<String> {
        serde_json::to_string(self).map_err(|e| EncodeError::Json(e.to_string()))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusVersion {
    pub name: String,
    pub protocol: i32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayerSample {
    pub name: String,
    pub id: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusPlayers {
    pub max: u32,
    pub online: u32,
    #[serde(default)]
    pub sample: Vec<PlayerSample>,
}

/// Body of the Status-Response packet as shown in a client's server list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerStatus {
    pub version: StatusVersion,
    pub players: StatusPlayers,
    pub description: TextComponent,
}

impl ServerStatus {
    pub fn new(motd: &str, max_players: u32, online: u32) -> Self {
        Self {
            version: StatusVersion {
                name: VERSION_NAME.to_string(),
                protocol: PROTOCOL_VERSION,
            },
            players: StatusPlayers {
                max: max_players,
                online,
                sample: Vec::new(),
            },
            description: TextComponent::plain(motd),
        }
    }

    pub fn to_json(&self) -> EncodeResult<String> {
        serde_json::to_string(self).map_err(|e| EncodeError::Json(e.to_string()))
    }

    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_text_component_escapes_content() {
        let json = TextComponent::plain("<Alice> \"quoted\"").to_json().unwrap();
        assert_eq!(json, r#"{"text":"<Alice> \"quoted\""}"#);
    }

    #[test]
    fn test_status_document_shape() {
        let json = ServerStatus::new("Hello", 16, 3).to_json().unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();

        assert_eq!(value["version"]["name"], VERSION_NAME);
        assert_eq!(value["version"]["protocol"], PROTOCOL_VERSION);
        assert_eq!(value["players"]["max"], 16);
        assert_eq!(value["players"]["online"], 3);
        assert_eq!(value["description"]["text"], "Hello");
    }

    #[test]
    fn test_status_parses_without_sample() {
        let json = r#"{"version":{"name":"1.12.2","protocol":340},"players":{"max":20,"online":0},"description":{"text":"motd"}}"#;
        let status = ServerStatus::from_json(json).unwrap();
        assert_eq!(status.players.max, 20);
        assert!(status.players.sample.is_empty());
        assert_eq!(status.description.text, "motd");
    }
}
