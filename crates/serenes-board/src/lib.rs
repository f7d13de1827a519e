// Library entry point for serenes-board
// Session, member, board and approval state over a pluggable key-value store

pub mod approval;
pub mod auth;
pub mod board;
pub mod config;
pub mod login;
pub mod members;
pub mod models;
pub mod remote;
pub mod replies;
pub mod session;
pub mod store;

pub use approval::{ApplicationState, ApprovalError, ApprovalFlow, ApprovalRegistry};
pub use auth::{AdminCheck, AdminList, NoAdmins};
pub use board::BoardStore;
pub use config::{AuthMode, Config};
pub use login::{LoginAdapter, LoginSdk, SdkOutcome, SdkProfile};
pub use members::{MemberRegistry, ProfileStore};
pub use remote::{ApprovalClient, RemoteError};
pub use replies::ReplyStore;
pub use session::{SessionError, SessionManager};
pub use store::{KvBackend, MemoryBackend, RecordMap, Records, SqliteBackend, Store, StoreError};
