use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use sominner_core::lenient;
use sominner_core::Agent;

/// Tokens and identity returned by a successful sign-in or refresh.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AuthSession {
    pub access_token: String,
    #[serde(default)]
    pub token_type: Option<String>,
    #[serde(default)]
    pub expires_in: i64,
    #[serde(default)]
    pub refresh_token: Option<String>,
    #[serde(default)]
    pub user: Option<AuthUser>,
}

/// Token endpoint body before the access token is known to be present.
#[derive(Debug, Deserialize)]
pub(crate) struct TokenResponse {
    #[serde(default, deserialize_with = "lenient::optional_string")]
    pub access_token: Option<String>,
    #[serde(default, deserialize_with = "lenient::optional_string")]
    pub token_type: Option<String>,
    #[serde(default, deserialize_with = "lenient::or_default")]
    pub expires_in: i64,
    #[serde(default, deserialize_with = "lenient::optional_string")]
    pub refresh_token: Option<String>,
    #[serde(default, deserialize_with = "lenient::optional")]
    pub user: Option<AuthUser>,
}

impl TokenResponse {
    /// `None` when the access token is missing or blank.
    pub(crate) fn into_session(self) -> Option<AuthSession> {
        let access_token = self.access_token.filter(|t| !t.trim().is_empty())?;
        Some(AuthSession {
            access_token,
            token_type: self.token_type,
            expires_in: self.expires_in,
            refresh_token: self.refresh_token,
            user: self.user,
        })
    }
}

/// Identity record held by the auth endpoint.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct AuthUser {
    #[serde(default, deserialize_with = "lenient::string_or_empty")]
    pub id: String,
    #[serde(default, deserialize_with = "lenient::optional_string")]
    pub email: Option<String>,
    #[serde(default, deserialize_with = "lenient::or_default")]
    pub user_metadata: Map<String, Value>,
    #[serde(default, deserialize_with = "lenient::optional_string")]
    pub aud: Option<String>,
    #[serde(default, deserialize_with = "lenient::optional_string")]
    pub role: Option<String>,
    #[serde(default, deserialize_with = "lenient::optional_timestamp")]
    pub created_at: Option<DateTime<Utc>>,
}

impl AuthUser {
    fn metadata_str(&self, key: &str) -> Option<&str> {
        self.user_metadata
            .get(key)
            .and_then(Value::as_str)
            .filter(|s| !s.trim().is_empty())
    }

    /// Name to show for this user: `display_name`, then `full_name` from the
    /// metadata.
    pub fn display_name(&self) -> Option<&str> {
        self.metadata_str("display_name")
            .or_else(|| self.metadata_str("full_name"))
    }
}

/// Payload for creating a user through the admin endpoint.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct NewUser {
    pub email: String,
    pub password: String,
    /// Skip the confirmation mail.
    pub email_confirm: bool,
    #[serde(skip_serializing_if = "Map::is_empty")]
    pub user_metadata: Map<String, Value>,
}

impl NewUser {
    pub fn new(email: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            email: email.into(),
            password: password.into(),
            email_confirm: true,
            user_metadata: Map::new(),
        }
    }

    pub fn with_metadata(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.user_metadata.insert(key.to_string(), value.into());
        self
    }
}

/// Partial update for an existing user; unset fields are left alone.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct UserPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_metadata: Option<Map<String, Value>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ban_duration: Option<String>,
}

/// One row of the user listing, from whichever source answered.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct UserSummary {
    pub id: String,
    pub email: Option<String>,
    pub display_name: Option<String>,
    pub role: Option<String>,
}

impl From<AuthUser> for UserSummary {
    fn from(user: AuthUser) -> Self {
        let display_name = user.display_name().map(str::to_string);
        let role = user
            .metadata_str("role")
            .map(str::to_string)
            .or(user.role);
        Self {
            id: user.id,
            email: user.email,
            display_name,
            role,
        }
    }
}

impl From<Agent> for UserSummary {
    fn from(agent: Agent) -> Self {
        Self {
            id: agent.id.map(|id| id.to_string()).unwrap_or_default(),
            email: agent.email,
            display_name: agent.display_name,
            role: agent.role,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_token_response_requires_access_token() {
        let raw: TokenResponse =
            serde_json::from_value(json!({"access_token": "", "expires_in": 3600})).unwrap();
        assert!(raw.into_session().is_none());

        let raw: TokenResponse = serde_json::from_value(json!({
            "access_token": "jwt",
            "token_type": "bearer",
            "expires_in": 3600,
            "refresh_token": "r1",
            "user": {"id": "u1", "email": "a@x.io"}
        }))
        .unwrap();
        let session = raw.into_session().unwrap();
        assert_eq!(session.access_token, "jwt");
        assert_eq!(session.expires_in, 3600);
        assert_eq!(session.user.unwrap().email.as_deref(), Some("a@x.io"));
    }

    #[test]
    fn test_auth_user_lenient_fields() {
        let user: AuthUser = serde_json::from_value(json!({
            "id": "u1",
            "user_metadata": null,
            "role": 7,
            "created_at": "not a date"
        }))
        .unwrap();
        assert!(user.user_metadata.is_empty());
        assert!(user.role.is_none());
        assert!(user.created_at.is_none());
    }

    #[test]
    fn test_summary_from_auth_user() {
        let user: AuthUser = serde_json::from_value(json!({
            "id": "u1",
            "email": "a@x.io",
            "role": "authenticated",
            "user_metadata": {"full_name": "Ann Lee", "role": "admin"}
        }))
        .unwrap();
        let summary = UserSummary::from(user);
        assert_eq!(summary.display_name.as_deref(), Some("Ann Lee"));
        assert_eq!(summary.role.as_deref(), Some("admin"));
    }

    #[test]
    fn test_new_user_payload() {
        let payload = serde_json::to_value(NewUser::new("a@x.io", "pw")).unwrap();
        assert_eq!(
            payload,
            json!({"email": "a@x.io", "password": "pw", "email_confirm": true})
        );
        let patch = serde_json::to_value(UserPatch {
            password: Some("new".into()),
            ..Default::default()
        })
        .unwrap();
        assert_eq!(patch, json!({"password": "new"}));
    }
}
