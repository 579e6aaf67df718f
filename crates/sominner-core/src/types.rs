use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::lenient;

// =============================================================================
// Enums
// =============================================================================

/// Who wrote a chat message.
///
/// Parsing is lenient: anything that is not `agent` or `system` (compared
/// case-insensitively) is a customer message.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase", from = "String")]
pub enum SenderType {
    #[default]
    Customer,
    Agent,
    System,
}

impl SenderType {
    pub fn parse(raw: &str) -> Self {
        match raw.trim().to_lowercase().as_str() {
            "agent" => SenderType::Agent,
            "system" => SenderType::System,
            _ => SenderType::Customer,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SenderType::Customer => "customer",
            SenderType::Agent => "agent",
            SenderType::System => "system",
        }
    }
}

impl From<String> for SenderType {
    fn from(raw: String) -> Self {
        SenderType::parse(&raw)
    }
}

impl fmt::Display for SenderType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Lifecycle state of a chat session.
///
/// The backend column is free text; values outside the known set are kept
/// verbatim in `Other`.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum SessionStatus {
    #[default]
    Active,
    Waiting,
    Closed,
    Other(String),
}

impl SessionStatus {
    pub fn as_str(&self) -> &str {
        match self {
            SessionStatus::Active => "active",
            SessionStatus::Waiting => "waiting",
            SessionStatus::Closed => "closed",
            SessionStatus::Other(raw) => raw,
        }
    }
}

impl From<String> for SessionStatus {
    fn from(raw: String) -> Self {
        match raw.as_str() {
            "active" => SessionStatus::Active,
            "waiting" => SessionStatus::Waiting,
            "closed" => SessionStatus::Closed,
            _ => SessionStatus::Other(raw),
        }
    }
}

impl From<SessionStatus> for String {
    fn from(status: SessionStatus) -> Self {
        status.as_str().to_string()
    }
}

impl fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// Customer contacts
// =============================================================================

/// Identity of a support requester (`customer_contacts`).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CustomerContact {
    pub id: Uuid,
    #[serde(default)]
    pub full_name: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub source: Option<String>,
}

/// Insert payload for `customer_contacts`.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct NewCustomerContact {
    pub full_name: String,
    pub email: String,
    pub source: String,
}

// =============================================================================
// Chat sessions
// =============================================================================

/// Customer details copied onto a session when it is created.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct SessionMetadata {
    #[serde(default)]
    pub customer_name: String,
    #[serde(default)]
    pub customer_email: Option<String>,
}

/// One support conversation (`chat_sessions`).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ChatSession {
    pub id: Uuid,
    #[serde(default)]
    pub customer_id: Option<Uuid>,
    #[serde(default, deserialize_with = "lenient::or_default")]
    pub status: SessionStatus,
    #[serde(default, deserialize_with = "lenient::optional_timestamp")]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(default, deserialize_with = "lenient::optional")]
    pub metadata: Option<SessionMetadata>,
}

/// Insert payload for `chat_sessions`.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct NewChatSession {
    pub customer_id: Uuid,
    pub status: SessionStatus,
    pub metadata: SessionMetadata,
}

// =============================================================================
// Chat messages
// =============================================================================

/// One message within a session (`chat_messages`). Immutable once stored.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub id: i64,
    pub session_id: Uuid,
    #[serde(default, deserialize_with = "lenient::or_default")]
    pub sender_type: SenderType,
    #[serde(default)]
    pub sender_id: Option<Uuid>,
    #[serde(default, deserialize_with = "lenient::string_or_empty")]
    pub message: String,
    #[serde(default = "Utc::now", deserialize_with = "lenient::timestamp_or_now")]
    pub created_at: DateTime<Utc>,
}

/// Insert payload for `chat_messages`.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct NewChatMessage {
    pub session_id: Uuid,
    pub sender_type: SenderType,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sender_id: Option<Uuid>,
    pub message: String,
}

// =============================================================================
// Team members
// =============================================================================

/// A support agent (`team_members`). Read-only from the client side.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Agent {
    #[serde(default, deserialize_with = "lenient::optional")]
    pub id: Option<Uuid>,
    #[serde(default, deserialize_with = "lenient::optional_string")]
    pub display_name: Option<String>,
    #[serde(default, deserialize_with = "lenient::optional_string")]
    pub email: Option<String>,
    #[serde(default, deserialize_with = "lenient::optional_string")]
    pub role: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_sender_type_parse_is_lenient() {
        assert_eq!(SenderType::parse("agent"), SenderType::Agent);
        assert_eq!(SenderType::parse("AGENT"), SenderType::Agent);
        assert_eq!(SenderType::parse("System"), SenderType::System);
        assert_eq!(SenderType::parse("customer"), SenderType::Customer);
        assert_eq!(SenderType::parse("bot"), SenderType::Customer);
        assert_eq!(SenderType::parse(""), SenderType::Customer);
    }

    #[test]
    fn test_sender_type_serde() {
        assert_eq!(
            serde_json::to_value(SenderType::Agent).unwrap(),
            json!("agent")
        );
        let parsed: SenderType = serde_json::from_value(json!("robot")).unwrap();
        assert_eq!(parsed, SenderType::Customer);
    }

    #[test]
    fn test_session_status_round_trip() {
        for (raw, status) in [
            ("active", SessionStatus::Active),
            ("waiting", SessionStatus::Waiting),
            ("closed", SessionStatus::Closed),
            ("escalated", SessionStatus::Other("escalated".into())),
        ] {
            let parsed: SessionStatus = serde_json::from_value(json!(raw)).unwrap();
            assert_eq!(parsed, status);
            assert_eq!(serde_json::to_value(&parsed).unwrap(), json!(raw));
        }
    }

    #[test]
    fn test_chat_message_tolerates_offsetless_timestamp_and_null_body() {
        let row = json!({
            "id": 8,
            "session_id": "550e8400-e29b-41d4-a716-446655440000",
            "sender_type": "agent",
            "message": null,
            "created_at": "2024-05-01T10:00:00.123456"
        });
        let msg: ChatMessage = serde_json::from_value(row).unwrap();
        assert_eq!(msg.message, "");
        assert_eq!(
            msg.created_at.to_rfc3339(),
            "2024-05-01T10:00:00.123456+00:00"
        );
    }

    #[test]
    fn test_chat_message_missing_timestamp_falls_back_to_now() {
        let before = Utc::now();
        let msg: ChatMessage = serde_json::from_value(json!({
            "id": 9,
            "session_id": "550e8400-e29b-41d4-a716-446655440000",
            "created_at": "yesterday"
        }))
        .unwrap();
        assert!(msg.created_at >= before);
        assert!(msg.message.is_empty());
    }

    #[test]
    fn test_chat_session_null_status_and_offsetless_start() {
        let session: ChatSession = serde_json::from_value(json!({
            "id": "550e8400-e29b-41d4-a716-446655440000",
            "status": null,
            "started_at": "2024-05-01 09:30:00"
        }))
        .unwrap();
        assert_eq!(session.status, SessionStatus::Active);
        assert_eq!(
            session.started_at.map(|ts| ts.to_rfc3339()).as_deref(),
            Some("2024-05-01T09:30:00+00:00")
        );
    }

    #[test]
    fn test_chat_message_decodes_unknown_sender() {
        let row = json!({
            "id": 7,
            "session_id": "550e8400-e29b-41d4-a716-446655440000",
            "sender_type": null,
            "message": "hi",
            "created_at": "2024-05-01T10:00:00+00:00"
        });
        let msg: ChatMessage = serde_json::from_value(row).unwrap();
        assert_eq!(msg.sender_type, SenderType::Customer);
        assert!(msg.sender_id.is_none());
    }

    #[test]
    fn test_id_only_rows_decode() {
        let id = Uuid::new_v4();
        let contact: CustomerContact = serde_json::from_value(json!({ "id": id })).unwrap();
        assert_eq!(contact.id, id);
        assert!(contact.email.is_empty());

        let session: ChatSession = serde_json::from_value(json!({ "id": id })).unwrap();
        assert_eq!(session.id, id);
        assert_eq!(session.status, SessionStatus::Active);
        assert!(session.metadata.is_none());
    }

    #[test]
    fn test_new_chat_message_omits_missing_sender() {
        let payload = NewChatMessage {
            session_id: Uuid::nil(),
            sender_type: SenderType::Customer,
            sender_id: None,
            message: "hello".into(),
        };
        let value = serde_json::to_value(&payload).unwrap();
        assert_eq!(value["sender_type"], json!("customer"));
        assert!(value.get("sender_id").is_none());
    }

    #[test]
    fn test_agent_tolerates_malformed_fields() {
        let agent: Agent = serde_json::from_value(json!({"id": "x", "display_name": 5})).unwrap();
        assert!(agent.id.is_none());
        assert!(agent.display_name.is_none());
    }
}
