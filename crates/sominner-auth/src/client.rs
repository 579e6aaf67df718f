use reqwest::Method;
use serde_json::json;
use tracing::{debug, info, warn};

use sominner_rest::client::AUTH_PREFIX;
use sominner_rest::{CancellationToken, RestClient, RestError};

use crate::error::{AuthError, Result};
use crate::models::{AuthSession, AuthUser, TokenResponse};

/// End-user authentication flows.
#[derive(Clone)]
pub struct AuthClient {
    pub(crate) rest: RestClient,
}

impl AuthClient {
    /// The client's credential is only used for the admin fallback listing;
    /// every end-user call picks its own.
    pub fn new(rest: RestClient) -> Self {
        Self { rest }
    }

    pub fn rest(&self) -> &RestClient {
        &self.rest
    }

    /// Exchange email and password for a session.
    pub async fn sign_in(
        &self,
        email: &str,
        password: &str,
        cancel: &CancellationToken,
    ) -> Result<AuthSession> {
        let body = json!({ "email": email, "password": password });
        let session = self.token_grant("password", body, cancel).await?;
        info!(email = %email, "signed in");
        Ok(session)
    }

    /// Trade a refresh token for a new session.
    pub async fn refresh(
        &self,
        refresh_token: &str,
        cancel: &CancellationToken,
    ) -> Result<AuthSession> {
        let body = json!({ "refresh_token": refresh_token });
        self.token_grant("refresh_token", body, cancel).await
    }

    async fn token_grant(
        &self,
        grant_type: &str,
        body: serde_json::Value,
        cancel: &CancellationToken,
    ) -> Result<AuthSession> {
        let anon = self.rest.as_anon();
        let request = anon
            .request(Method::POST, &format!("{AUTH_PREFIX}/token"))?
            .query(&[("grant_type", grant_type)])
            .json(&body);
        debug!(grant_type = %grant_type, "requesting token");
        let body = anon.execute(request, cancel).await?;
        let raw: TokenResponse = serde_json::from_str(&body)?;
        raw.into_session().ok_or(AuthError::MissingAccessToken)
    }

    /// Fetch the user behind `access_token`.
    ///
    /// A blank token or a rejected one yields `None`; cancellation and
    /// transport faults still propagate.
    pub async fn get_user(
        &self,
        access_token: &str,
        cancel: &CancellationToken,
    ) -> Result<Option<AuthUser>> {
        if access_token.trim().is_empty() {
            return Ok(None);
        }
        let user_client = self.rest.as_user(access_token);
        let request = user_client.request(Method::GET, &format!("{AUTH_PREFIX}/user"))?;
        match user_client.execute(request, cancel).await {
            Ok(body) => Ok(Some(serde_json::from_str(&body)?)),
            Err(RestError::Remote { status, .. }) => {
                debug!(status, "access token rejected");
                Ok(None)
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Revoke `access_token`. A blank token is a no-op and a rejected
    /// logout is only logged.
    pub async fn sign_out(&self, access_token: &str, cancel: &CancellationToken) -> Result<()> {
        if access_token.trim().is_empty() {
            return Ok(());
        }
        let user_client = self.rest.as_user(access_token);
        let request = user_client.request(Method::POST, &format!("{AUTH_PREFIX}/logout"))?;
        match user_client.execute(request, cancel).await {
            Ok(_) => {
                info!("signed out");
                Ok(())
            }
            Err(RestError::Remote { status, .. }) => {
                warn!(status, "sign-out was not accepted");
                Ok(())
            }
            Err(e) => Err(e.into()),
        }
    }
}
