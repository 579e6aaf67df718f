//! Message history with agent names attached.

use std::collections::HashMap;

use tracing::{debug, warn};
use uuid::Uuid;

use sominner_core::{Agent, ChatMessage, SenderType};
use sominner_rest::{CancellationToken, DataApi, DataApiExt, Filter, Order, Query};

use crate::error::Result;
use crate::models::ChatMessageDetail;
use crate::service::{SupportService, CHAT_MESSAGES, TEAM_MEMBERS};

/// Distinct agent ids in first-seen order.
pub fn agent_ids(messages: &[ChatMessage]) -> Vec<Uuid> {
    let mut ids: Vec<Uuid> = Vec::new();
    for id in messages
        .iter()
        .filter(|m| m.sender_type == SenderType::Agent)
        .filter_map(|m| m.sender_id)
    {
        if !ids.contains(&id) {
            ids.push(id);
        }
    }
    ids
}

/// Attach names to agent messages whose sender is in `names`.
pub fn annotate(
    messages: Vec<ChatMessage>,
    names: &HashMap<Uuid, String>,
) -> Vec<ChatMessageDetail> {
    messages
        .into_iter()
        .map(|message| {
            let name = match (message.sender_type, message.sender_id) {
                (SenderType::Agent, Some(id)) => names.get(&id).cloned(),
                _ => None,
            };
            ChatMessageDetail::new(message, name)
        })
        .collect()
}

impl<A: DataApi> SupportService<A> {
    /// All messages of a session, oldest first, with agent names resolved.
    ///
    /// The name lookup is best effort: if it fails the messages come back
    /// without names and a warning is logged. Cancellation still aborts.
    pub async fn messages(
        &self,
        session_id: Uuid,
        cancel: &CancellationToken,
    ) -> Result<Vec<ChatMessageDetail>> {
        let query = Query::table(CHAT_MESSAGES)
            .columns(&[
                "id",
                "session_id",
                "message",
                "sender_type",
                "sender_id",
                "created_at",
            ])
            .eq("session_id", session_id)
            .order(Order::asc("created_at"));
        let messages: Vec<ChatMessage> = self.api.select(&query, cancel).await?;

        let ids = agent_ids(&messages);
        let names = if ids.is_empty() {
            HashMap::new()
        } else {
            match self.agent_names(&ids, cancel).await {
                Ok(names) => names,
                Err(e) if e.is_cancelled() => return Err(e.into()),
                Err(e) => {
                    warn!(session_id = %session_id, error = %e, "failed to fetch agent names");
                    HashMap::new()
                }
            }
        };
        Ok(annotate(messages, &names))
    }

    async fn agent_names(
        &self,
        ids: &[Uuid],
        cancel: &CancellationToken,
    ) -> sominner_rest::Result<HashMap<Uuid, String>> {
        let query = Query::table(TEAM_MEMBERS)
            .columns(&["id", "display_name"])
            .filter(Filter::is_in("id", ids));
        let agents: Vec<Agent> = self.api.select(&query, cancel).await?;
        debug!(requested = ids.len(), found = agents.len(), "agent names resolved");
        Ok(agents
            .into_iter()
            .filter_map(|agent| {
                let name = agent.display_name.filter(|n| !n.trim().is_empty())?;
                Some((agent.id?, name))
            })
            .collect())
    }
}
