//! Remote Approval Client
//!
//! Thin client for the hosted approval script. Every call is a GET to the
//! script URL with an `action` query parameter plus action-specific fields.
//!
//! The response body is passed back as opaque JSON; deciding what a given
//! payload means is left to the caller. Failures of any kind on the way
//! (connect, HTTP status, undecodable body) come back as
//! `RemoteError::Transport`. Nothing is retried.

use reqwest::Client;
use serde_json::Value;
use std::time::Duration;
use thiserror::Error;

use crate::config::Config;
use crate::models::ApplicationFields;

pub type RemoteResult<T> = Result<T, RemoteError>;

#[derive(Error, Debug)]
pub enum RemoteError {
    #[error("Remote approval endpoint is not configured")]
    NotConfigured,
    #[error("Transport error: {0}")]
    Transport(String),
}

/// Actions understood by the approval script.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Register,
    Apply,
    Status,
    Verify,
    Login,
}

impl Action {
    pub fn as_str(&self) -> &'static str {
        match self {
            Action::Register => "register",
            Action::Apply => "apply",
            Action::Status => "status",
            Action::Verify => "verify",
            Action::Login => "login",
        }
    }
}

pub struct ApprovalClient {
    base_url: String,
    http_client: Client,
}

impl ApprovalClient {
    /// Client without a request timeout: a hung request waits forever.
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            http_client: Client::new(),
        }
    }

    pub fn from_config(config: &Config) -> Self {
        let http_client = match config.request_timeout {
            Some(timeout) => Client::builder()
                .timeout(timeout)
                .build()
                .unwrap_or_else(|_| Client::new()),
            None => Client::new(),
        };
        Self {
            base_url: config.approval_api_url.clone(),
            http_client,
        }
    }

    /// Same client with a per-request timeout.
    pub fn with_timeout(self, timeout: Duration) -> Self {
        Self {
            http_client: Client::builder()
                .timeout(timeout)
                .build()
                .unwrap_or(self.http_client),
            base_url: self.base_url,
        }
    }

    pub fn is_configured(&self) -> bool {
        !self.base_url.trim().is_empty()
    }

    /// Full member registration with the profile fields.
    pub async fn register(&self, external_id: &str, fields: &ApplicationFields) -> RemoteResult<Value> {
        self.call(Action::Register, &application_params(external_id, fields)).await
    }

    /// Submit a membership application.
    pub async fn apply(&self, external_id: &str, fields: &ApplicationFields) -> RemoteResult<Value> {
        self.call(Action::Apply, &application_params(external_id, fields)).await
    }

    /// Ask where the application for `external_id` stands.
    pub async fn status(&self, external_id: &str) -> RemoteResult<Value> {
        self.call(Action::Status, &[("lineUserId", external_id)]).await
    }

    /// Check a member id + PIN pair issued on approval.
    pub async fn verify(&self, external_id: &str, member_id: &str, pin: &str) -> RemoteResult<Value> {
        self.call(
            Action::Verify,
            &[("lineUserId", external_id), ("memberId", member_id), ("pin", pin)],
        )
        .await
    }

    /// Member login without the login SDK.
    pub async fn login(&self, member_id: &str, name: &str, age: &str, phone: &str) -> RemoteResult<Value> {
        self.call(
            Action::Login,
            &[("memberId", member_id), ("name", name), ("age", age), ("phone", phone)],
        )
        .await
    }

    /// Issue `action` with `params` and return the decoded JSON body.
    pub async fn call(&self, action: Action, params: &[(&str, &str)]) -> RemoteResult<Value> {
        if !self.is_configured() {
            log::warn!("Approval endpoint missing, skipping '{}'", action.as_str());
            return Err(RemoteError::NotConfigured);
        }

        let mut query: Vec<(&str, &str)> = Vec::with_capacity(params.len() + 1);
        query.push(("action", action.as_str()));
        query.extend_from_slice(params);

        log::debug!("Calling approval endpoint: action={}", action.as_str());

        let response = self
            .http_client
            .get(&self.base_url)
            .query(&query)
            .send()
            .await
            .map_err(|e| RemoteError::Transport(format!("HTTP error: {}", e)))?;

        if !response.status().is_success() {
            return Err(RemoteError::Transport(format!(
                "HTTP {} for action {}",
                response.status(),
                action.as_str()
            )));
        }

        response
            .json::<Value>()
            .await
            .map_err(|e| RemoteError::Transport(format!("JSON parse error: {}", e)))
    }
}

fn application_params<'a>(external_id: &'a str, fields: &'a ApplicationFields) -> [(&'static str, &'a str); 5] {
    [
        ("lineUserId", external_id),
        ("displayName", fields.display_name.as_str()),
        ("name", fields.name.as_str()),
        ("age", fields.age.as_str()),
        ("phone", fields.phone.as_str()),
    ]
}
