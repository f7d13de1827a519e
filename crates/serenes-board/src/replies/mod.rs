use chrono::Utc;
use std::sync::Arc;

use crate::auth::{can_modify, AdminCheck, NoAdmins};
use crate::models::{display_timestamp, keys, Reply, ReplyTo};
use crate::store::{unique_id, Records, Store, StoreResult};

/// Replies on board posts, all kept in one list.
#[derive(Clone)]
pub struct ReplyStore {
    store: Store,
    admin: Arc<dyn AdminCheck>,
}

impl ReplyStore {
    pub fn new(store: Store) -> Self {
        Self {
            store,
            admin: Arc::new(NoAdmins),
        }
    }

    pub fn with_admin_check(self, admin: Arc<dyn AdminCheck>) -> Self {
        Self { admin, ..self }
    }

    fn all(&self) -> Records<Reply> {
        self.store.load_records(keys::REPLIES)
    }

    /// Replies for `post_id` (or every reply when `None`), oldest first.
    /// Equal timestamps keep their stored order.
    pub fn list_replies(&self, post_id: Option<&str>) -> Vec<Reply> {
        let mut replies: Vec<Reply> = match post_id {
            Some(post_id) => self.all().items.into_iter().filter(|r| r.post_id == post_id).collect(),
            None => self.all().items,
        };
        replies.sort_by_key(|r| r.created_at_epoch);
        replies
    }

    pub fn add_reply(
        &self,
        post_id: &str,
        author_id: &str,
        body: &str,
        reply_to: Option<ReplyTo>,
    ) -> StoreResult<Reply> {
        let mut replies = self.all();
        let now = Utc::now();

        let reply = Reply {
            id: unique_id(|id| replies.items.iter().any(|r| r.id == id)),
            post_id: post_id.to_string(),
            author_id: author_id.to_string(),
            body: body.to_string(),
            created_at: display_timestamp(now),
            created_at_epoch: now.timestamp_millis(),
            reply_to,
        };

        replies.items.push(reply.clone());
        self.store.save_records(keys::REPLIES, &replies)?;
        log::debug!("Reply {} added to post {}", reply.id, post_id);
        Ok(reply)
    }

    /// Delete a reply written by `by_id` (or any reply, for an admin).
    /// Returns false when the reply is missing or not theirs.
    pub fn delete_reply(&self, id: &str, by_id: &str) -> StoreResult<bool> {
        let mut replies = self.all();
        let Some(idx) = replies.items.iter().position(|r| r.id == id) else {
            return Ok(false);
        };

        if !can_modify(&replies.items[idx].author_id, by_id, self.admin.as_ref()) {
            log::warn!("{} may not delete reply {}", by_id, id);
            return Ok(false);
        }

        replies.items.remove(idx);
        self.store.save_records(keys::REPLIES, &replies)?;
        Ok(true)
    }

    /// Drop every reply on `post_id`. Returns how many went.
    pub(crate) fn delete_for_post(&self, post_id: &str) -> StoreResult<usize> {
        let mut replies = self.all();
        let before = replies.items.len();
        replies.items.retain(|r| r.post_id != post_id);
        let removed = before - replies.items.len();
        if removed > 0 {
            self.store.save_records(keys::REPLIES, &replies)?;
        }
        Ok(removed)
    }
}
