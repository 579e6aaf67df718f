use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use sominner_core::lenient;
use sominner_core::{ChatMessage, SenderType, SessionStatus};

// =============================================================================
// Reconciliation
// =============================================================================

/// Outcome of starting or resuming a chat.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct ChatSessionCreation {
    pub session_id: Uuid,
    /// A customer contact with the given email already existed.
    pub is_returning_customer: bool,
    /// An open session was handed back instead of creating one.
    pub is_reusing_session: bool,
}

// =============================================================================
// Messages
// =============================================================================

/// A stored message plus the resolved agent name, if any.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ChatMessageDetail {
    pub id: i64,
    pub session_id: Uuid,
    pub message: String,
    pub sender_type: SenderType,
    pub sender_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub agent_name: Option<String>,
}

impl ChatMessageDetail {
    pub fn new(message: ChatMessage, agent_name: Option<String>) -> Self {
        Self {
            id: message.id,
            session_id: message.session_id,
            message: message.message,
            sender_type: message.sender_type,
            sender_id: message.sender_id,
            created_at: message.created_at,
            agent_name,
        }
    }
}

// =============================================================================
// Session listing
// =============================================================================

#[derive(Debug, Default, Deserialize)]
pub(crate) struct ContactPreview {
    #[serde(default, deserialize_with = "lenient::optional_string")]
    pub full_name: Option<String>,
    #[serde(default, deserialize_with = "lenient::optional_string")]
    pub email: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct MessagePreview {
    #[serde(default, deserialize_with = "lenient::string_or_empty")]
    pub message: String,
    #[serde(default, deserialize_with = "lenient::optional_timestamp")]
    pub created_at: Option<DateTime<Utc>>,
}

/// `chat_sessions` row with its customer and latest message embedded.
#[derive(Debug, Deserialize)]
pub(crate) struct SessionRow {
    pub id: Uuid,
    #[serde(default, deserialize_with = "lenient::or_default")]
    pub status: SessionStatus,
    #[serde(default, deserialize_with = "lenient::optional_timestamp")]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(default, deserialize_with = "lenient::embedded_one")]
    pub customer_contacts: Option<ContactPreview>,
    #[serde(default, deserialize_with = "lenient::embedded_many")]
    pub chat_messages: Vec<MessagePreview>,
}

/// One line of the agent inbox.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ChatSessionSummary {
    pub id: Uuid,
    pub status: SessionStatus,
    pub started_at: Option<DateTime<Utc>>,
    pub customer_name: Option<String>,
    pub customer_email: Option<String>,
    pub last_message_preview: Option<String>,
    pub last_message_at: Option<DateTime<Utc>>,
}

impl From<SessionRow> for ChatSessionSummary {
    fn from(row: SessionRow) -> Self {
        let customer = row.customer_contacts.unwrap_or_default();
        let preview = row.chat_messages.into_iter().next();
        Self {
            id: row.id,
            status: row.status,
            started_at: row.started_at,
            customer_name: customer.full_name,
            customer_email: customer.email,
            last_message_at: preview.as_ref().and_then(|p| p.created_at),
            last_message_preview: preview.map(|p| p.message),
        }
    }
}

// =============================================================================
// Customer submissions
// =============================================================================

/// A contact-form submission (`customer_submissions`).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CustomerSubmission {
    pub id: Uuid,
    #[serde(default, deserialize_with = "lenient::string_or_empty")]
    pub full_name: String,
    #[serde(default, deserialize_with = "lenient::string_or_empty")]
    pub email: String,
    #[serde(default, deserialize_with = "lenient::optional_string")]
    pub phone: Option<String>,
    #[serde(default, deserialize_with = "lenient::optional_string")]
    pub company: Option<String>,
    #[serde(default, deserialize_with = "lenient::optional_string")]
    pub category: Option<String>,
    #[serde(default, deserialize_with = "lenient::optional_string")]
    pub description: Option<String>,
    #[serde(default, deserialize_with = "lenient::string_or_empty")]
    pub status: String,
    #[serde(default, deserialize_with = "lenient::optional_timestamp")]
    pub submitted_at: Option<DateTime<Utc>>,
    #[serde(default, deserialize_with = "lenient::embedded_many")]
    pub tags: Vec<String>,
    #[serde(default, deserialize_with = "lenient::optional_string")]
    pub status_updated_by: Option<String>,
    #[serde(default, deserialize_with = "lenient::optional_timestamp")]
    pub status_updated_at: Option<DateTime<Utc>>,
}

/// PATCH body for a submission status change. Absent values are sent as
/// `null`.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub(crate) struct SubmissionStatusUpdate<'a> {
    pub status: &'a str,
    pub status_updated_by: Option<&'a str>,
    pub status_updated_at: Option<DateTime<Utc>>,
}
