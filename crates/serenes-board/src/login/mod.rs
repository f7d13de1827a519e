use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config::Config;

#[derive(Error, Debug, Clone, PartialEq)]
#[error("{0}")]
pub struct SdkError(pub String);

/// Profile as reported by the messaging-platform login SDK.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SdkProfile {
    #[serde(alias = "userId")]
    pub external_id: String,
    pub display_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub picture_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status_message: Option<String>,
}

impl SdkProfile {
    pub fn is_empty(&self) -> bool {
        self.external_id.is_empty()
    }
}

/// Capabilities the login SDK exposes to this crate.
#[allow(async_fn_in_trait)]
pub trait LoginSdk {
    async fn init(&self, channel_id: &str) -> Result<(), SdkError>;

    fn is_logged_in(&self) -> bool;

    /// Starts the platform's redirect-based login. In a browser this ends
    /// the current page load.
    fn login(&self, redirect_uri: Option<&str>);

    fn logout(&self) -> Result<(), SdkError>;

    async fn get_profile(&self) -> Result<SdkProfile, SdkError>;
}

/// Result shape handed to UI code: render `message` when `ok` is false.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SdkOutcome {
    pub ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    /// A login redirect was started; nothing else should happen on this page.
    pub redirected: bool,
}

impl SdkOutcome {
    fn ok() -> Self {
        Self {
            ok: true,
            ..Default::default()
        }
    }

    fn failed(message: impl Into<String>) -> Self {
        Self {
            ok: false,
            message: Some(message.into()),
            redirected: false,
        }
    }
}

const PLACEHOLDER_CHANNEL_ID: &str = "YOUR_LIFF_ID";

/// Defensive wrapper around an optional login SDK. No method here returns
/// an error; failures become `SdkOutcome` values or empty profiles.
pub struct LoginAdapter<S> {
    sdk: Option<S>,
    channel_id: String,
}

impl<S: LoginSdk> LoginAdapter<S> {
    /// `sdk` is `None` when the SDK failed to load.
    pub fn new(sdk: Option<S>, channel_id: impl Into<String>) -> Self {
        Self {
            sdk,
            channel_id: channel_id.into(),
        }
    }

    pub fn from_config(sdk: Option<S>, config: &Config) -> Self {
        Self::new(sdk, config.liff_id.clone())
    }

    pub fn sdk(&self) -> Option<&S> {
        self.sdk.as_ref()
    }

    pub async fn init(&self) -> SdkOutcome {
        let Some(sdk) = &self.sdk else {
            return SdkOutcome::failed("login SDK is not loaded; check the network connection");
        };
        if self.channel_id.is_empty() || self.channel_id.contains(PLACEHOLDER_CHANNEL_ID) {
            return SdkOutcome::failed("login channel id is not configured");
        }
        match sdk.init(&self.channel_id).await {
            Ok(()) => SdkOutcome::ok(),
            Err(e) => {
                log::error!("Login SDK init error: {}", e);
                SdkOutcome::failed(format!("login SDK initialization failed: {}", e))
            }
        }
    }

    /// Succeeds when already logged in; otherwise starts the redirect login
    /// and reports `redirected`.
    pub async fn ensure_login(&self, redirect_uri: Option<&str>) -> SdkOutcome {
        let outcome = self.init().await;
        if !outcome.ok {
            return outcome;
        }
        let Some(sdk) = &self.sdk else {
            return SdkOutcome::failed("login SDK is not loaded; check the network connection");
        };
        if sdk.is_logged_in() {
            return SdkOutcome::ok();
        }
        log::info!("Not logged in, redirecting to platform login");
        sdk.login(redirect_uri);
        SdkOutcome {
            ok: false,
            message: Some("redirecting to login".to_string()),
            redirected: true,
        }
    }

    /// Profile of the logged-in user, or an empty profile on any failure.
    pub async fn get_profile(&self) -> SdkProfile {
        let Some(sdk) = &self.sdk else {
            return SdkProfile::default();
        };
        match sdk.get_profile().await {
            Ok(profile) => profile,
            Err(e) => {
                log::error!("Failed to fetch login profile: {}", e);
                SdkProfile::default()
            }
        }
    }

    /// Best effort; errors are logged and dropped.
    pub fn logout(&self) {
        if let Some(sdk) = &self.sdk {
            if let Err(e) = sdk.logout() {
                log::warn!("Login SDK logout failed: {}", e);
            }
        }
    }
}
