use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Storage keys. Each holds one JSON document.
pub mod keys {
    /// Pre-approval session. Older builds also kept member sessions here,
    /// so it is the last entry of `MEMBER_SESSION_KEYS` too.
    pub const SESSION: &str = "ma_session";
    pub const MEMBER_SESSION: &str = "ma_member_session";
    /// Older builds wrote the member session here.
    pub const LEGACY_MEMBER_SESSION: &str = "member_session";
    pub const MEMBERS: &str = "ma_members_v1";
    pub const PROFILES: &str = "ma_profiles_v1";
    pub const POSTS: &str = "ma_board_posts_v1";
    pub const REPLIES: &str = "ma_board_replies_v1";
    pub const APPLICATIONS: &str = "ma_applications_v1";
    pub const APPROVED: &str = "ma_approved_v1";

    /// Member session lookup order, newest layout first. This is also
    /// every key a session can live under.
    pub const MEMBER_SESSION_KEYS: &[&str] = &[MEMBER_SESSION, LEGACY_MEMBER_SESSION, SESSION];
}

/// Session is the identity currently logged in on this storage scope.
/// Before approval it only carries the external identity; afterwards it
/// also carries the member id.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Session {
    #[serde(alias = "lineUserId")]
    pub external_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub member_id: Option<String>,
    pub login_at: DateTime<Utc>,
}

impl Session {
    pub fn is_member(&self) -> bool {
        self.member_id.as_deref().is_some_and(|id| !id.is_empty())
    }
}

/// Member is a registered profile keyed by external identity.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Member {
    #[serde(alias = "lineUserId")]
    pub external_id: String,
    pub display_name: String,
    pub name: String,
    pub age: String,
    pub phone: String,
    pub created_at: DateTime<Utc>,
}

/// Profile holds the self-edited part of a member page.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Profile {
    pub external_id: String,
    pub bio: String,
    pub area: String,
    pub contact: String,
    pub updated_at: DateTime<Utc>,
}

/// Partial profile update. `None` keeps the stored value.
#[derive(Debug, Clone, Default)]
pub struct ProfileUpdate {
    pub bio: Option<String>,
    pub area: Option<String>,
    pub contact: Option<String>,
}

/// Post is a top-level board entry, owned by its author.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Post {
    pub id: String,
    #[serde(alias = "lineUserId")]
    pub author_id: String,
    pub title: String,
    pub body: String,
    /// Display timestamp. Ordering uses `created_at_epoch`.
    pub created_at: String,
    /// Milliseconds since the Unix epoch.
    pub created_at_epoch: i64,
}

/// Reply belongs to one Post through `post_id`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Reply {
    pub id: String,
    pub post_id: String,
    #[serde(alias = "lineUserId")]
    pub author_id: String,
    pub body: String,
    pub created_at: String,
    pub created_at_epoch: i64,
    pub reply_to: Option<ReplyTo>,
}

/// Mention of another reply on the same post. Not an ownership link.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ReplyTo {
    pub name: String,
    #[serde(alias = "lineUserId")]
    pub author_id: String,
    pub reply_id: String,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApprovalStatus {
    #[default]
    Pending,
    Approved,
    Rejected,
}

/// Fields a member submits when applying or registering.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ApplicationFields {
    pub display_name: String,
    pub name: String,
    pub age: String,
    pub phone: String,
}

/// Application is a pending membership request, cached locally.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Application {
    #[serde(default)]
    pub external_id: String,
    #[serde(default)]
    pub status: ApprovalStatus,
    #[serde(flatten)]
    pub fields: ApplicationFields,
    #[serde(default)]
    pub requested_at: DateTime<Utc>,
}

impl Application {
    pub fn pending(external_id: &str, fields: ApplicationFields) -> Self {
        Self {
            external_id: external_id.to_string(),
            status: ApprovalStatus::Pending,
            fields,
            requested_at: Utc::now(),
        }
    }
}

/// Approved records what the remote service issued on approval.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Approved {
    pub external_id: String,
    pub status: ApprovalStatus,
    pub member_id: String,
    pub pin: String,
    pub issued_at: DateTime<Utc>,
}

impl Approved {
    pub fn new(external_id: &str, member_id: &str, pin: &str) -> Self {
        Self {
            external_id: external_id.to_string(),
            status: ApprovalStatus::Approved,
            member_id: member_id.to_string(),
            pin: pin.to_string(),
            issued_at: Utc::now(),
        }
    }
}

/// Display timestamp stored alongside the epoch on posts and replies.
pub fn display_timestamp(now: DateTime<Utc>) -> String {
    now.format("%Y/%m/%d %H:%M:%S").to_string()
}
