//! Posting messages into a session.

use tracing::debug;
use uuid::Uuid;

use sominner_core::{ChatMessage, NewChatMessage, SenderType};
use sominner_rest::{CancellationToken, DataApi, DataApiExt};

use crate::error::{Result, SupportError};
use crate::service::{SupportService, CHAT_MESSAGES};

impl<A: DataApi> SupportService<A> {
    pub async fn add_customer_message(
        &self,
        session_id: Uuid,
        text: &str,
        cancel: &CancellationToken,
    ) -> Result<ChatMessage> {
        self.add_message(session_id, SenderType::Customer, None, text, cancel)
            .await
    }

    /// `agent_id` is stored as the sender so the history can show a name.
    pub async fn add_agent_message(
        &self,
        session_id: Uuid,
        text: &str,
        agent_id: Option<Uuid>,
        cancel: &CancellationToken,
    ) -> Result<ChatMessage> {
        self.add_message(session_id, SenderType::Agent, agent_id, text, cancel)
            .await
    }

    async fn add_message(
        &self,
        session_id: Uuid,
        sender_type: SenderType,
        sender_id: Option<Uuid>,
        text: &str,
        cancel: &CancellationToken,
    ) -> Result<ChatMessage> {
        if text.trim().is_empty() {
            return Err(SupportError::EmptyMessage);
        }
        let payload = NewChatMessage {
            session_id,
            sender_type,
            sender_id,
            message: text.to_string(),
        };
        let created: ChatMessage = self.api.insert_one(CHAT_MESSAGES, &payload, cancel).await?;
        debug!(session_id = %session_id, message_id = created.id, sender = %sender_type, "message stored");
        Ok(created)
    }
}
