use serde::{Deserialize, Serialize};

/// Sender name on every message the hub itself authors.
pub const SERVER_NAME: &str = "Server";

/// Message exchanged in both directions over a room connection. Clients only
/// fill `room_id`, `body`, `sender` and optionally `recipient`; the rosters
/// are set by the server on join/leave notifications.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    #[serde(rename = "roomid", default)]
    pub room_id: String,
    #[serde(rename = "message", default)]
    pub body: String,
    #[serde(rename = "name", default)]
    pub sender: String,
    /// Empty for a broadcast to the whole room.
    #[serde(rename = "toname", default)]
    pub recipient: String,
    #[serde(rename = "allusers", default)]
    pub all_participants: Option<Vec<String>>,
    #[serde(rename = "onlineusers", default)]
    pub online_participants: Option<Vec<String>>,
}

impl Message {
    pub fn is_broadcast(&self) -> bool {
        self.recipient.is_empty()
    }

    /// Whether a connection with this display name gets the message. Directed
    /// messages are echoed back to their sender.
    pub fn is_for(&self, name: &str) -> bool {
        self.is_broadcast() || self.recipient == name || self.sender == name
    }
}

/// First frame a client sends after connecting.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct JoinRequest {
    #[serde(rename = "roomid")]
    pub room_id: String,
    #[serde(rename = "message", default)]
    pub body: String,
    #[serde(rename = "name", default)]
    pub sender: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wire_names() {
        let msg = Message {
            room_id: "0007".into(),
            body: "hi".into(),
            sender: "Alice".into(),
            recipient: "Bob".into(),
            all_participants: None,
            online_participants: Some(vec!["Anonymous".into(), "Alice".into()]),
        };

        let json = serde_json::to_value(&msg).unwrap();
        assert_eq!(json, serde_json::json!({
            "roomid": "0007",
            "message": "hi",
            "name": "Alice",
            "toname": "Bob",
            "allusers": null,
            "onlineusers": ["Anonymous", "Alice"],
        }));
    }

    #[test]
    fn client_frames_may_omit_fields() {
        let msg: Message = serde_json::from_str(r#"{"roomid":"0007","message":"hi"}"#).unwrap();
        assert_eq!(msg.recipient, "");
        assert!(msg.is_broadcast());

        let join: JoinRequest = serde_json::from_str(r#"{"roomid":"0007","name":"Alice"}"#).unwrap();
        assert_eq!(join.room_id, "0007");
        assert_eq!(join.sender, "Alice");

        assert!(serde_json::from_str::<JoinRequest>(r#"{"name":"Alice"}"#).is_err());
    }

    #[test]
    fn directed_messages_reach_recipient_and_sender() {
        let msg = Message {
            sender: "Alice".into(),
            recipient: "Bob".into(),
            ..Default::default()
        };
        assert!(msg.is_for("Alice"));
        assert!(msg.is_for("Bob"));
        assert!(!msg.is_for("Carol"));
    }
}
