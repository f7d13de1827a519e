use std::env;
use std::time::Duration;

/// Which identity a session must carry to count as logged in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AuthMode {
    /// Sessions must carry the login SDK's external identity.
    #[default]
    ExternalIdentityRequired,
    /// Only approved member sessions (with a member id) count.
    MemberIdOnly,
}

impl AuthMode {
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "external" | "external-identity" | "line" => Some(AuthMode::ExternalIdentityRequired),
            "member" | "member-id" | "member-id-only" => Some(AuthMode::MemberIdOnly),
            _ => None,
        }
    }
}

/// Runtime configuration for the board core.
#[derive(Debug, Clone, Default)]
pub struct Config {
    /// SQLite file backing the key-value store. `None` keeps everything in memory.
    pub database_path: Option<String>,
    /// Base URL of the remote approval endpoint. Empty disables remote calls.
    pub approval_api_url: String,
    /// Channel id handed to the login SDK on init.
    pub liff_id: String,
    pub auth_mode: AuthMode,
    /// Identities granted the administrative override on deletes.
    pub admin_ids: Vec<String>,
    /// Per-request timeout for remote calls. `None` waits indefinitely.
    pub request_timeout: Option<Duration>,
}

impl Config {
    /// Build a config from the process environment, reading `.env` first if present.
    pub fn from_env() -> Self {
        dotenvy::dotenv().ok();

        let database_path = env::var("DATABASE_PATH").ok().filter(|p| !p.is_empty());

        let approval_api_url = env::var("APPROVAL_API_URL").unwrap_or_default();
        if approval_api_url.is_empty() {
            log::warn!("APPROVAL_API_URL not set, remote approval calls are disabled");
        }

        let liff_id = env::var("LIFF_ID").unwrap_or_default();

        let auth_mode = match env::var("AUTH_MODE") {
            Ok(raw) => AuthMode::parse(&raw).unwrap_or_else(|| {
                log::warn!("Unknown AUTH_MODE '{}', falling back to external identity", raw);
                AuthMode::default()
            }),
            Err(_) => AuthMode::default(),
        };

        let admin_ids = env::var("ADMIN_IDS")
            .map(|v| parse_list(&v))
            .unwrap_or_default();

        let request_timeout = env::var("APPROVAL_TIMEOUT_SECS")
            .ok()
            .and_then(|v| match v.parse::<u64>() {
                Ok(secs) => Some(Duration::from_secs(secs)),
                Err(_) => {
                    log::warn!("APPROVAL_TIMEOUT_SECS must be a number, ignoring '{}'", v);
                    None
                }
            });

        Self {
            database_path,
            approval_api_url,
            liff_id,
            auth_mode,
            admin_ids,
            request_timeout,
        }
    }
}

fn parse_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
        .collect()
}
