//! HTTP transport for the hosted backend.
//!
//! `RestClient` wraps a `reqwest::Client` together with an immutable backend
//! configuration and the credential to present. Every request carries the
//! `apikey` header and a `Bearer` authorization; both are derived from the
//! credential at send time so one client can be cheaply re-scoped with
//! [`RestClient::as_user`] or [`RestClient::as_service`].

use std::sync::Arc;
use std::time::Duration;

use reqwest::{Client, Method, RequestBuilder};
use serde_json::Value;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use sominner_core::config::{BackendConfig, HttpConfig};

use crate::api::{DataApi, UserScoped};
use crate::error::{RestError, Result};
use crate::query::{filter_params, Filter, Query, Returning};

/// Path prefix of the tabular data endpoint.
pub const REST_PREFIX: &str = "rest/v1";
/// Path prefix of the authentication endpoint.
pub const AUTH_PREFIX: &str = "auth/v1";

/// Which identity a request is made as.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub enum Credential {
    /// The public anonymous key.
    #[default]
    Anon,
    /// An end-user access token.
    User(String),
    /// The elevated service key.
    Service,
}

#[derive(Clone)]
pub struct RestClient {
    http: Client,
    config: Arc<BackendConfig>,
    credential: Credential,
}

impl RestClient {
    /// Build a client with its own connection pool.
    pub fn new(config: BackendConfig, http: &HttpConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(http.timeout_secs))
            .user_agent(http.user_agent.clone())
            .build()?;
        Ok(Self::with_http_client(client, Arc::new(config)))
    }

    /// Share an existing connection pool.
    pub fn with_http_client(http: Client, config: Arc<BackendConfig>) -> Self {
        Self {
            http,
            config,
            credential: Credential::Anon,
        }
    }

    /// Same client, acting as the given end user. A blank token falls back
    /// to the anonymous key.
    pub fn as_user(&self, access_token: &str) -> Self {
        let credential = if access_token.trim().is_empty() {
            Credential::Anon
        } else {
            Credential::User(access_token.to_string())
        };
        Self {
            credential,
            ..self.clone()
        }
    }

    /// Same client, acting with the service key.
    pub fn as_service(&self) -> Self {
        Self {
            credential: Credential::Service,
            ..self.clone()
        }
    }

    /// Same client, acting anonymously.
    pub fn as_anon(&self) -> Self {
        Self {
            credential: Credential::Anon,
            ..self.clone()
        }
    }

    pub fn config(&self) -> &BackendConfig {
        &self.config
    }

    pub fn credential(&self) -> &Credential {
        &self.credential
    }

    /// Full URL for a path below the base, e.g. `rest/v1/projects`.
    pub fn endpoint(&self, path: &str) -> String {
        format!(
            "{}/{}",
            self.config.trimmed_base_url(),
            path.trim_start_matches('/')
        )
    }

    fn ensure_configured(&self) -> Result<()> {
        self.config.ensure_configured()?;
        if self.credential == Credential::Service && !self.config.has_service_key() {
            return Err(RestError::NotConfigured);
        }
        Ok(())
    }

    /// `(apikey, bearer)` for the current credential.
    fn keys(&self) -> (&str, &str) {
        let anon = self.config.anon_key.as_str();
        match &self.credential {
            Credential::Anon => (anon, anon),
            Credential::User(token) => (anon, token.as_str()),
            Credential::Service => {
                let service = self.config.service_role_key.as_deref().unwrap_or(anon);
                (service, service)
            }
        }
    }

    /// Start an authenticated request. Fails with `NotConfigured` before
    /// anything touches the network.
    pub fn request(&self, method: Method, path: &str) -> Result<RequestBuilder> {
        self.ensure_configured()?;
        let (api_key, bearer) = self.keys();
        Ok(self
            .http
            .request(method, self.endpoint(path))
            .header("apikey", api_key)
            .bearer_auth(bearer))
    }

    /// Send a request and return the body of a success response.
    ///
    /// Non-success statuses become `Remote` with the raw body. The call is
    /// abandoned as soon as `cancel` fires.
    pub async fn execute(
        &self,
        request: RequestBuilder,
        cancel: &CancellationToken,
    ) -> Result<String> {
        if cancel.is_cancelled() {
            return Err(RestError::Cancelled);
        }
        tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(RestError::Cancelled),
            result = send_and_read(request) => result,
        }
    }
}

async fn send_and_read(request: RequestBuilder) -> Result<String> {
    let response = request.send().await?;
    let status = response.status();
    let body = response.text().await?;
    if !status.is_success() {
        return Err(RestError::Remote {
            status: status.as_u16(),
            body,
        });
    }
    Ok(body)
}

/// Interpret a success body as rows.
///
/// Empty bodies are zero rows and a lone object is one row; any other
/// non-array JSON is a decode fault.
pub fn parse_rows(body: &str) -> Result<Vec<Value>> {
    if body.trim().is_empty() {
        return Ok(Vec::new());
    }
    match serde_json::from_str::<Value>(body)? {
        Value::Array(rows) => Ok(rows),
        obj @ Value::Object(_) => Ok(vec![obj]),
        other => Err(RestError::Decode(format!(
            "expected an array of rows, got {}",
            json_kind(&other)
        ))),
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

fn table_path(table: &str) -> String {
    format!("{REST_PREFIX}/{table}")
}

impl UserScoped for RestClient {
    fn for_user(&self, access_token: &str) -> Self {
        self.as_user(access_token)
    }
}

impl DataApi for RestClient {
    async fn query(&self, query: &Query, cancel: &CancellationToken) -> Result<Vec<Value>> {
        let request = self
            .request(Method::GET, &table_path(&query.table))?
            .query(&query.to_params());
        debug!(table = %query.table, "data api query");
        let body = self.execute(request, cancel).await?;
        parse_rows(&body)
    }

    async fn insert(
        &self,
        table: &str,
        rows: Value,
        returning: Returning,
        cancel: &CancellationToken,
    ) -> Result<Vec<Value>> {
        let request = self
            .request(Method::POST, &table_path(table))?
            .header("Prefer", returning.prefer_header())
            .json(&rows);
        debug!(table = %table, ?returning, "data api insert");
        let body = self.execute(request, cancel).await?;
        match returning {
            Returning::Representation => parse_rows(&body),
            Returning::Minimal => Ok(Vec::new()),
        }
    }

    async fn update(
        &self,
        table: &str,
        filters: &[Filter],
        patch: Value,
        returning: Returning,
        cancel: &CancellationToken,
    ) -> Result<Vec<Value>> {
        let request = self
            .request(Method::PATCH, &table_path(table))?
            .query(&filter_params(filters))
            .header("Prefer", returning.prefer_header())
            .json(&patch);
        debug!(table = %table, ?returning, "data api update");
        let body = self.execute(request, cancel).await?;
        match returning {
            Returning::Representation => parse_rows(&body),
            Returning::Minimal => Ok(Vec::new()),
        }
    }

    async fn delete(
        &self,
        table: &str,
        filters: &[Filter],
        cancel: &CancellationToken,
    ) -> Result<()> {
        let request = self
            .request(Method::DELETE, &table_path(table))?
            .query(&filter_params(filters));
        debug!(table = %table, "data api delete");
        self.execute(request, cancel).await?;
        Ok(())
    }
}
