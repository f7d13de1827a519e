use chrono::Utc;
use std::cmp::Reverse;
use std::sync::Arc;

use crate::auth::{can_modify, AdminCheck, NoAdmins};
use crate::models::{display_timestamp, keys, Post};
use crate::replies::ReplyStore;
use crate::store::{unique_id, Records, Store, StoreResult};

/// Board posts. Deleting a post takes its replies with it.
#[derive(Clone)]
pub struct BoardStore {
    store: Store,
    replies: ReplyStore,
    admin: Arc<dyn AdminCheck>,
}

impl BoardStore {
    pub fn new(store: Store) -> Self {
        Self {
            replies: ReplyStore::new(store.clone()),
            store,
            admin: Arc::new(NoAdmins),
        }
    }

    /// Use `admin` for both post and reply deletes.
    pub fn with_admin_check(self, admin: Arc<dyn AdminCheck>) -> Self {
        Self {
            replies: self.replies.with_admin_check(admin.clone()),
            admin,
            store: self.store,
        }
    }

    /// The reply store sharing this board's storage and admin check.
    pub fn replies(&self) -> &ReplyStore {
        &self.replies
    }

    fn all(&self) -> Records<Post> {
        self.store.load_records(keys::POSTS)
    }

    /// Every post, newest first. Equal timestamps keep their stored order.
    pub fn list_posts(&self) -> Vec<Post> {
        let mut posts = self.all().items;
        posts.sort_by_key(|p| Reverse(p.created_at_epoch));
        posts
    }

    pub fn get_post(&self, id: &str) -> Option<Post> {
        self.all().items.into_iter().find(|p| p.id == id)
    }

    pub fn add_post(&self, author_id: &str, title: &str, body: &str) -> StoreResult<Post> {
        let mut posts = self.all();
        let now = Utc::now();

        let post = Post {
            id: unique_id(|id| posts.items.iter().any(|p| p.id == id)),
            author_id: author_id.to_string(),
            title: title.to_string(),
            body: body.to_string(),
            created_at: display_timestamp(now),
            created_at_epoch: now.timestamp_millis(),
        };

        posts.items.push(post.clone());
        self.store.save_records(keys::POSTS, &posts)?;
        log::info!("Post {} created by {}", post.id, author_id);
        Ok(post)
    }

    /// Delete a post written by `by_id` (or any post, for an admin), and
    /// every reply on it. Returns false, leaving storage untouched, when the
    /// post is missing or not theirs.
    pub fn delete_post(&self, id: &str, by_id: &str) -> StoreResult<bool> {
        let mut posts = self.all();
        let Some(idx) = posts.items.iter().position(|p| p.id == id) else {
            return Ok(false);
        };

        if !can_modify(&posts.items[idx].author_id, by_id, self.admin.as_ref()) {
            log::warn!("{} may not delete post {}", by_id, id);
            return Ok(false);
        }

        posts.items.remove(idx);
        self.store.save_records(keys::POSTS, &posts)?;

        let removed = self.replies.delete_for_post(id)?;
        log::info!("Post {} deleted by {} ({} replies removed)", id, by_id, removed);
        Ok(true)
    }
}
