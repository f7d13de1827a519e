use std::collections::HashSet;
use std::sync::Arc;

use crate::config::Config;

/// Decides whether an identity holds the administrative override.
/// Supplied by the caller; the stores never decide this themselves.
pub trait AdminCheck: Send + Sync {
    fn is_admin(&self, id: &str) -> bool;
}

impl<F> AdminCheck for F
where
    F: Fn(&str) -> bool + Send + Sync,
{
    fn is_admin(&self, id: &str) -> bool {
        self(id)
    }
}

/// Nobody is an admin.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoAdmins;

impl AdminCheck for NoAdmins {
    fn is_admin(&self, _id: &str) -> bool {
        false
    }
}

/// Fixed set of admin identities.
#[derive(Debug, Clone, Default)]
pub struct AdminList {
    ids: HashSet<String>,
}

impl AdminList {
    pub fn new<I, S>(ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            ids: ids.into_iter().map(Into::into).collect(),
        }
    }
}

impl AdminCheck for AdminList {
    fn is_admin(&self, id: &str) -> bool {
        !id.is_empty() && self.ids.contains(id)
    }
}

/// The admin check a config asks for: the configured list, or nobody.
pub fn admin_check_from_config(config: &Config) -> Arc<dyn AdminCheck> {
    if config.admin_ids.is_empty() {
        Arc::new(NoAdmins)
    } else {
        Arc::new(AdminList::new(config.admin_ids.iter().cloned()))
    }
}

/// Whether `by_id` may delete or change a record written by `author_id`.
pub fn can_modify(author_id: &str, by_id: &str, admin: &dyn AdminCheck) -> bool {
    // An empty id never owns anything, even a record with a blank author.
    if !by_id.is_empty() && author_id == by_id {
        return true;
    }
    admin.is_admin(by_id)
}
