//! Session listing and lifecycle.

use serde_json::json;
use tracing::info;
use uuid::Uuid;

use sominner_core::SessionStatus;
use sominner_rest::{CancellationToken, DataApi, DataApiExt, Embed, Filter, Order, Query, Select};

use crate::error::Result;
use crate::models::{ChatSessionSummary, SessionRow};
use crate::service::{SupportService, CHAT_MESSAGES, CHAT_SESSIONS, CUSTOMER_CONTACTS};

impl<A: DataApi> SupportService<A> {
    /// Every session, newest first, with its customer and latest message.
    pub async fn list_sessions(
        &self,
        cancel: &CancellationToken,
    ) -> Result<Vec<ChatSessionSummary>> {
        let select = Select::columns(&["id", "status", "started_at"])
            .embed(Embed::new(CUSTOMER_CONTACTS, &["full_name", "email"]))
            .embed(
                Embed::new(CHAT_MESSAGES, &["message", "created_at"])
                    .order(Order::desc("created_at"))
                    .limit(1),
            );
        let query = Query::table(CHAT_SESSIONS)
            .select(select)
            .order(Order::desc("started_at"));
        let rows: Vec<SessionRow> = self.api.select(&query, cancel).await?;
        Ok(rows.into_iter().map(ChatSessionSummary::from).collect())
    }

    pub async fn set_session_status(
        &self,
        session_id: Uuid,
        status: SessionStatus,
        cancel: &CancellationToken,
    ) -> Result<()> {
        self.api
            .update_minimal(
                CHAT_SESSIONS,
                &[Filter::eq("id", session_id)],
                &json!({ "status": status }),
                cancel,
            )
            .await?;
        info!(session_id = %session_id, status = %status, "session status changed");
        Ok(())
    }

    /// A closed session is no longer picked up by reconciliation.
    pub async fn close_session(&self, session_id: Uuid, cancel: &CancellationToken) -> Result<()> {
        self.set_session_status(session_id, SessionStatus::Closed, cancel)
            .await
    }
}
