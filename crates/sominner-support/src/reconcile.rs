//! Starting or resuming a chat for a visitor.
//!
//! The store does not enforce "one open session per customer"; this module
//! does, by looking before it creates. Two reconciliations racing for the
//! same email can still both miss the open-session lookup and each create a
//! session. Closing that gap needs a uniqueness constraint or a server-side
//! transaction, so it is left to the backend.

use tracing::{debug, info};
use uuid::Uuid;

use sominner_core::{
    ChatSession, CustomerContact, NewChatSession, NewCustomerContact, SessionMetadata,
    SessionStatus,
};
use sominner_rest::{CancellationToken, DataApi, DataApiExt, Filter, Order, Query};

use crate::error::Result;
use crate::models::ChatSessionCreation;
use crate::placeholder::placeholder_email;
use crate::service::{SupportService, CHAT_SESSIONS, CUSTOMER_CONTACTS};

impl<A: DataApi> SupportService<A> {
    /// Map `(name, email)` onto exactly one chat session.
    ///
    /// 1. No email: new contact (placeholder email) and new session.
    /// 2. Email matches a contact with an active or waiting session: that
    ///    session is returned and nothing is written.
    /// 3. Email matches a contact without an open session: new session for
    ///    the existing contact.
    /// 4. Unknown email: new contact and new session.
    ///
    /// Emails are compared exactly after trimming.
    pub async fn create_chat_session(
        &self,
        customer_name: &str,
        customer_email: Option<&str>,
        cancel: &CancellationToken,
    ) -> Result<ChatSessionCreation> {
        let email = customer_email
            .map(str::trim)
            .filter(|email| !email.is_empty());

        if let Some(email) = email {
            if let Some(contact) = self.find_contact_by_email(email, cancel).await? {
                if let Some(session_id) = self.find_open_session(contact.id, cancel).await? {
                    info!(
                        session_id = %session_id,
                        customer_id = %contact.id,
                        "reusing open chat session"
                    );
                    return Ok(ChatSessionCreation {
                        session_id,
                        is_returning_customer: true,
                        is_reusing_session: true,
                    });
                }

                let session_id = self
                    .create_session(contact.id, customer_name, Some(email), cancel)
                    .await?;
                info!(
                    session_id = %session_id,
                    customer_id = %contact.id,
                    "new chat session for returning customer"
                );
                return Ok(ChatSessionCreation {
                    session_id,
                    is_returning_customer: true,
                    is_reusing_session: false,
                });
            }
        }

        let contact = self.create_contact(customer_name, email, cancel).await?;
        let session_id = self
            .create_session(contact.id, customer_name, email, cancel)
            .await?;
        info!(
            session_id = %session_id,
            customer_id = %contact.id,
            "new chat session for new customer"
        );
        Ok(ChatSessionCreation {
            session_id,
            is_returning_customer: false,
            is_reusing_session: false,
        })
    }

    async fn find_contact_by_email(
        &self,
        email: &str,
        cancel: &CancellationToken,
    ) -> Result<Option<CustomerContact>> {
        let query = Query::table(CUSTOMER_CONTACTS)
            .columns(&["id"])
            .eq("email", email)
            .limit(1);
        Ok(self.api.select_first(&query, cancel).await?)
    }

    async fn find_open_session(
        &self,
        customer_id: Uuid,
        cancel: &CancellationToken,
    ) -> Result<Option<Uuid>> {
        let query = Query::table(CHAT_SESSIONS)
            .columns(&["id"])
            .eq("customer_id", customer_id)
            .filter(Filter::or([
                Filter::eq("status", SessionStatus::Active),
                Filter::eq("status", SessionStatus::Waiting),
            ]))
            .order(Order::desc("started_at"))
            .limit(1);
        let session: Option<ChatSession> = self.api.select_first(&query, cancel).await?;
        Ok(session.map(|s| s.id))
    }

    async fn create_contact(
        &self,
        customer_name: &str,
        email: Option<&str>,
        cancel: &CancellationToken,
    ) -> Result<CustomerContact> {
        let email = match email {
            Some(email) => email.to_string(),
            None => {
                let generated = placeholder_email(customer_name, &self.settings.guest_email_domain);
                debug!(email = %generated, "generated placeholder email");
                generated
            }
        };
        let payload = NewCustomerContact {
            full_name: customer_name.to_string(),
            email,
            source: self.settings.contact_source.clone(),
        };
        Ok(self.api.insert_one(CUSTOMER_CONTACTS, &payload, cancel).await?)
    }

    async fn create_session(
        &self,
        customer_id: Uuid,
        customer_name: &str,
        email: Option<&str>,
        cancel: &CancellationToken,
    ) -> Result<Uuid> {
        let payload = NewChatSession {
            customer_id,
            status: SessionStatus::Active,
            metadata: SessionMetadata {
                customer_name: customer_name.to_string(),
                customer_email: email.map(str::to_string),
            },
        };
        let session: ChatSession = self.api.insert_one(CHAT_SESSIONS, &payload, cancel).await?;
        Ok(session.id)
    }
}
