//! Customer-support chat on top of the data endpoint.
//!
//! The centrepiece is [`SupportService::create_chat_session`], which maps a
//! visitor's name and optional email onto exactly one chat session while
//! reusing existing customers and open conversations. Message history is
//! returned with agent display names resolved in one batched lookup.

pub mod enrichment;
pub mod error;
pub mod messages;
pub mod models;
pub mod placeholder;
pub mod reconcile;
pub mod service;
pub mod sessions;
pub mod submissions;

pub use error::{Result, SupportError};
pub use models::{
    ChatMessageDetail, ChatSessionCreation, ChatSessionSummary, CustomerSubmission,
};
pub use placeholder::placeholder_email;
pub use service::SupportService;
