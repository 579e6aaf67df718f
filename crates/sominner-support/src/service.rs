use sominner_core::config::SupportConfig;
use sominner_rest::DataApi;

pub(crate) const CUSTOMER_CONTACTS: &str = "customer_contacts";
pub(crate) const CHAT_SESSIONS: &str = "chat_sessions";
pub(crate) const CHAT_MESSAGES: &str = "chat_messages";
pub(crate) const TEAM_MEMBERS: &str = "team_members";
pub(crate) const CUSTOMER_SUBMISSIONS: &str = "customer_submissions";

/// Support chat operations over any [`DataApi`].
///
/// Holds no mutable state; every call is an independent round trip.
pub struct SupportService<A> {
    pub(crate) api: A,
    pub(crate) settings: SupportConfig,
}

impl<A: DataApi> SupportService<A> {
    pub fn new(api: A, settings: SupportConfig) -> Self {
        Self { api, settings }
    }

    pub fn api(&self) -> &A {
        &self.api
    }

    pub fn settings(&self) -> &SupportConfig {
        &self.settings
    }
}
