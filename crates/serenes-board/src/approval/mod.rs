//! Approval Module
//!
//! `ApprovalRegistry` is a local cache of what the remote approval service
//! has said about each external identity: a pending application, and once
//! approved, the issued member id and PIN. It never decides approval itself.
//!
//! `ApprovalFlow` drives the remote client and writes accepted results back
//! into the registry, the member registry and the session.
//!
//! Flow: register/apply -> pending Application -> status/verify ->
//! Approved record -> member session

use chrono::Utc;
use serde_json::Value;
use thiserror::Error;

use crate::members::MemberRegistry;
use crate::models::*;
use crate::remote::{ApprovalClient, RemoteError};
use crate::session::{SessionError, SessionManager};
use crate::store::{RecordMap, Store, StoreError, StoreResult};

#[derive(Error, Debug)]
pub enum ApprovalError {
    #[error(transparent)]
    Remote(#[from] RemoteError),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Session(#[from] SessionError),
    #[error("Rejected by approval service: {0}")]
    Rejected(String),
}

pub type ApprovalResult<T> = Result<T, ApprovalError>;

/// Where an identity stands, as far as local records know.
#[derive(Debug, Clone, PartialEq)]
pub enum ApplicationState {
    NotApplied,
    Pending(Application),
    Rejected(Application),
    Approved(Approved),
}

#[derive(Clone)]
pub struct ApprovalRegistry {
    store: Store,
}

impl ApprovalRegistry {
    pub fn new(store: Store) -> Self {
        Self { store }
    }

    pub fn get_application(&self, external_id: &str) -> Option<Application> {
        let mut apps: RecordMap<Application> = self.store.load_record_map(keys::APPLICATIONS);
        apps.items.remove(external_id)
    }

    pub fn set_application(&self, app: Application) -> StoreResult<()> {
        let mut apps: RecordMap<Application> = self.store.load_record_map(keys::APPLICATIONS);
        apps.items.insert(app.external_id.clone(), app);
        self.store.save_record_map(keys::APPLICATIONS, &apps)
    }

    pub fn get_approved(&self, external_id: &str) -> Option<Approved> {
        let mut approved: RecordMap<Approved> = self.store.load_record_map(keys::APPROVED);
        approved.items.remove(external_id)
    }

    /// Record an approval. An approval without a prior application is kept
    /// (the remote side is authoritative) but logged.
    pub fn set_approved(&self, record: Approved) -> StoreResult<()> {
        if self.get_application(&record.external_id).is_none() {
            log::warn!("Recording approval for {} without a local application", record.external_id);
        }
        let mut approved: RecordMap<Approved> = self.store.load_record_map(keys::APPROVED);
        approved.items.insert(record.external_id.clone(), record);
        self.store.save_record_map(keys::APPROVED, &approved)
    }

    pub fn local_state(&self, external_id: &str) -> ApplicationState {
        if let Some(approved) = self.get_approved(external_id) {
            return ApplicationState::Approved(approved);
        }
        match self.get_application(external_id) {
            Some(app) if app.status == ApprovalStatus::Rejected => ApplicationState::Rejected(app),
            Some(app) => ApplicationState::Pending(app),
            None => ApplicationState::NotApplied,
        }
    }
}

/// Application -> approval -> login, against the remote service.
pub struct ApprovalFlow {
    client: ApprovalClient,
    registry: ApprovalRegistry,
    members: MemberRegistry,
    sessions: SessionManager,
}

impl ApprovalFlow {
    pub fn new(client: ApprovalClient, store: Store, sessions: SessionManager) -> Self {
        Self {
            client,
            registry: ApprovalRegistry::new(store.clone()),
            members: MemberRegistry::new(store),
            sessions,
        }
    }

    pub fn registry(&self) -> &ApprovalRegistry {
        &self.registry
    }

    pub fn local_state(&self, external_id: &str) -> ApplicationState {
        self.registry.local_state(external_id)
    }

    /// Register the member with the remote service and keep a local copy.
    pub async fn register_member(&self, external_id: &str, fields: ApplicationFields) -> ApprovalResult<Member> {
        let response = self.client.register(external_id, &fields).await?;
        check_accepted(&response)?;

        let member = Member {
            external_id: external_id.to_string(),
            display_name: fields.display_name,
            name: fields.name,
            age: fields.age,
            phone: fields.phone,
            created_at: Utc::now(),
        };
        self.members.upsert_member(member.clone())?;
        Ok(member)
    }

    pub async fn submit_application(
        &self,
        external_id: &str,
        fields: ApplicationFields,
    ) -> ApprovalResult<Application> {
        let response = self.client.apply(external_id, &fields).await?;
        check_accepted(&response)?;

        let app = Application::pending(external_id, fields);
        self.registry.set_application(app.clone())?;
        log::info!("Application submitted for {}", external_id);
        Ok(app)
    }

    /// Ask the remote service for the current status and cache the answer.
    pub async fn refresh_status(&self, external_id: &str) -> ApprovalResult<ApplicationState> {
        let response = self.client.status(external_id).await?;
        check_accepted(&response)?;

        match string_field(&response, &["status"]).as_deref() {
            Some("approved") => {
                let member_id = string_field(&response, &["memberId"]);
                let pin = string_field(&response, &["pin"]);
                let (Some(member_id), Some(pin)) = (member_id, pin) else {
                    return Err(ApprovalError::Rejected(
                        "approval response is missing memberId or pin".to_string(),
                    ));
                };
                let record = Approved::new(external_id, &member_id, &pin);
                self.registry.set_approved(record.clone())?;
                Ok(ApplicationState::Approved(record))
            }
            Some("rejected") => {
                let mut app = self
                    .registry
                    .get_application(external_id)
                    .unwrap_or_else(|| Application::pending(external_id, ApplicationFields::default()));
                app.status = ApprovalStatus::Rejected;
                self.registry.set_application(app.clone())?;
                Ok(ApplicationState::Rejected(app))
            }
            Some("pending") => {
                let app = match self.registry.get_application(external_id) {
                    Some(app) => app,
                    None => {
                        let app = Application::pending(external_id, ApplicationFields::default());
                        self.registry.set_application(app.clone())?;
                        app
                    }
                };
                Ok(ApplicationState::Pending(app))
            }
            _ => Ok(self.registry.local_state(external_id)),
        }
    }

    /// Confirm the member id + PIN with the remote service, record the
    /// approval and open a member session.
    pub async fn verify(&self, external_id: &str, member_id: &str, pin: &str) -> ApprovalResult<Session> {
        let response = self.client.verify(external_id, member_id, pin).await?;
        check_accepted(&response)?;

        self.registry.set_approved(Approved::new(external_id, member_id, pin))?;
        Ok(self.sessions.login_member(external_id, member_id)?)
    }

    /// Member login by id + personal details, without the login SDK.
    /// The external identity comes from the response, else from the
    /// session already open on this storage scope.
    pub async fn login(&self, member_id: &str, name: &str, age: &str, phone: &str) -> ApprovalResult<Session> {
        let response = self.client.login(member_id, name, age, phone).await?;
        check_accepted(&response)?;

        let external_id = string_field(&response, &["externalId", "lineUserId"])
            .or_else(|| self.sessions.current().map(|s| s.external_id))
            .unwrap_or_default();
        Ok(self.sessions.login_member(&external_id, member_id)?)
    }
}

/// A response counts as accepted only when it is an object with `"ok": true`.
fn check_accepted(response: &Value) -> ApprovalResult<()> {
    if response.get("ok").and_then(Value::as_bool) == Some(true) {
        return Ok(());
    }
    let message = string_field(response, &["message", "error"])
        .unwrap_or_else(|| "request was not accepted".to_string());
    Err(ApprovalError::Rejected(message))
}

/// First non-empty string (or number, stringified) among `names`.
fn string_field(response: &Value, names: &[&str]) -> Option<String> {
    names.iter().find_map(|name| match response.get(*name)? {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    })
}
