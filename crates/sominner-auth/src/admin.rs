//! Admin user management. Every call here runs with the service key.

use reqwest::Method;
use serde_json::Value;
use tracing::{info, warn};

use sominner_core::Agent;
use sominner_rest::client::AUTH_PREFIX;
use sominner_rest::{CancellationToken, DataApiExt, Order, Query, RestClient};

use crate::client::AuthClient;
use crate::error::{AuthError, Result};
use crate::models::{AuthUser, NewUser, UserPatch, UserSummary};

const ADMIN_USERS: &str = "admin/users";

impl AuthClient {
    fn service(&self) -> Result<RestClient> {
        if !self.rest.config().has_service_key() {
            return Err(AuthError::MissingServiceKey);
        }
        Ok(self.rest.as_service())
    }

    pub async fn create_user(
        &self,
        user: &NewUser,
        cancel: &CancellationToken,
    ) -> Result<AuthUser> {
        let service = self.service()?;
        let request = service
            .request(Method::POST, &format!("{AUTH_PREFIX}/{ADMIN_USERS}"))?
            .json(user);
        let body = service.execute(request, cancel).await?;
        let created: AuthUser = serde_json::from_str(&body)?;
        info!(user_id = %created.id, "user created");
        Ok(created)
    }

    pub async fn update_user(
        &self,
        user_id: &str,
        patch: &UserPatch,
        cancel: &CancellationToken,
    ) -> Result<AuthUser> {
        let service = self.service()?;
        let request = service
            .request(Method::PUT, &format!("{AUTH_PREFIX}/{ADMIN_USERS}/{user_id}"))?
            .json(patch);
        let body = service.execute(request, cancel).await?;
        let updated: AuthUser = serde_json::from_str(&body)?;
        info!(user_id = %updated.id, "user updated");
        Ok(updated)
    }

    /// List users, best effort.
    ///
    /// Tries the admin endpoint first, then the `team_members` table, then
    /// gives up with an empty list. Only cancellation is surfaced.
    pub async fn list_users(&self, cancel: &CancellationToken) -> Result<Vec<UserSummary>> {
        match self.list_admin_users(cancel).await {
            Ok(users) => return Ok(users),
            Err(AuthError::Rest(e)) if e.is_cancelled() => return Err(e.into()),
            Err(e) => warn!(error = %e, "admin user listing unavailable, falling back to team members"),
        }

        let query = Query::table("team_members")
            .columns(&["id", "display_name", "email", "role"])
            .order(Order::asc("display_name"));
        match self.rest.select::<Agent>(&query, cancel).await {
            Ok(members) => Ok(members.into_iter().map(UserSummary::from).collect()),
            Err(e) if e.is_cancelled() => Err(e.into()),
            Err(e) => {
                warn!(error = %e, "team member listing failed, returning no users");
                Ok(Vec::new())
            }
        }
    }

    async fn list_admin_users(&self, cancel: &CancellationToken) -> Result<Vec<UserSummary>> {
        let service = self.service()?;
        let request = service.request(Method::GET, &format!("{AUTH_PREFIX}/{ADMIN_USERS}"))?;
        let body = service.execute(request, cancel).await?;
        Ok(parse_user_list(&body)?
            .into_iter()
            .map(UserSummary::from)
            .collect())
    }
}

/// The listing comes back as `{"users": [...]}`; a bare array is accepted too.
fn parse_user_list(body: &str) -> Result<Vec<AuthUser>> {
    let users = match serde_json::from_str::<Value>(body)? {
        Value::Array(users) => users,
        Value::Object(mut obj) => match obj.remove("users") {
            Some(Value::Array(users)) => users,
            _ => Vec::new(),
        },
        _ => Vec::new(),
    };
    Ok(users
        .into_iter()
        .filter_map(|user| serde_json::from_value(user).ok())
        .collect())
}
