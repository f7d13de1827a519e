use serde_json::Value;
use std::collections::HashSet;
use std::sync::Arc;

use serenes_board::auth::AdminList;
use serenes_board::models::{keys, ReplyTo};
use serenes_board::{BoardStore, Store};

fn raw(store: &Store, key: &str) -> Value {
    store.load(key, Value::Null)
}

#[test]
fn test_post_lifecycle_scenario() {
    let board = BoardStore::new(Store::in_memory());

    let post = board.add_post("u1", "Hello", "World").unwrap();
    let posts = board.list_posts();
    assert_eq!(posts.len(), 1);
    assert_eq!(posts[0].title, "Hello");
    assert_eq!(posts[0].body, "World");
    assert_eq!(posts[0].author_id, "u1");

    assert!(!board.delete_post(&post.id, "u2").unwrap());
    assert_eq!(board.list_posts().len(), 1);

    assert!(board.delete_post(&post.id, "u1").unwrap());
    assert!(board.list_posts().is_empty());
}

#[test]
fn test_delete_post_cascades_to_its_replies_only() {
    let board = BoardStore::new(Store::in_memory());
    let keep = board.add_post("u1", "keep", "").unwrap();
    let doomed = board.add_post("u1", "doomed", "").unwrap();

    let first = board.replies().add_reply(&doomed.id, "u2", "first", None).unwrap();
    board
        .replies()
        .add_reply(
            &doomed.id,
            "u3",
            "second",
            Some(ReplyTo {
                name: "u2".to_string(),
                author_id: "u2".to_string(),
                reply_id: first.id.clone(),
            }),
        )
        .unwrap();
    board.replies().add_reply(&keep.id, "u2", "stays", None).unwrap();

    assert!(board.delete_post(&doomed.id, "u1").unwrap());

    assert!(board.replies().list_replies(Some(&doomed.id)).is_empty());
    let remaining = board.replies().list_replies(None);
    assert_eq!(remaining.len(), 1);
    assert_eq!(remaining[0].post_id, keep.id);
}

#[test]
fn test_rejected_delete_leaves_storage_unchanged() {
    let store = Store::in_memory();
    let board = BoardStore::new(store.clone());
    let post = board.add_post("u1", "mine", "body").unwrap();
    board.replies().add_reply(&post.id, "u2", "reply", None).unwrap();

    let posts_before = raw(&store, keys::POSTS);
    let replies_before = raw(&store, keys::REPLIES);

    assert!(!board.delete_post(&post.id, "u2").unwrap());
    assert!(!board.delete_post(&post.id, "").unwrap());

    assert_eq!(raw(&store, keys::POSTS), posts_before);
    assert_eq!(raw(&store, keys::REPLIES), replies_before);
}

#[test]
fn test_admin_override_deletes_posts_and_replies() {
    let board = BoardStore::new(Store::in_memory()).with_admin_check(Arc::new(AdminList::new(["admin"])));
    let post = board.add_post("u1", "t", "b").unwrap();
    let reply = board.replies().add_reply(&post.id, "u2", "r", None).unwrap();
    let other = board.add_post("u3", "t", "b").unwrap();
    let other_reply = board.replies().add_reply(&other.id, "u2", "r", None).unwrap();

    assert!(board.replies().delete_reply(&reply.id, "admin").unwrap());
    assert!(board.delete_post(&post.id, "admin").unwrap());
    assert_eq!(board.list_posts().len(), 1);

    // A non-admin still only gets their own.
    assert!(!board.replies().delete_reply(&other_reply.id, "u3").unwrap());
    assert!(board.replies().delete_reply(&other_reply.id, "u2").unwrap());
}

#[test]
fn test_closure_admin_check() {
    let board = BoardStore::new(Store::in_memory()).with_admin_check(Arc::new(|id: &str| id == "root"));
    let post = board.add_post("u1", "t", "b").unwrap();
    assert!(board.delete_post(&post.id, "root").unwrap());
}

#[test]
fn test_ids_unique_over_many_inserts() {
    let board = BoardStore::new(Store::in_memory());
    let post = board.add_post("u1", "t", "b").unwrap();

    let mut post_ids = HashSet::from([post.id.clone()]);
    for i in 0..200 {
        let p = board.add_post("u1", &format!("post {}", i), "").unwrap();
        assert!(post_ids.insert(p.id));
    }

    let mut reply_ids = HashSet::new();
    for i in 0..200 {
        let r = board.replies().add_reply(&post.id, "u2", &format!("reply {}", i), None).unwrap();
        assert!(reply_ids.insert(r.id));
    }

    assert_eq!(board.list_posts().len(), 201);
    assert_eq!(board.replies().list_replies(Some(&post.id)).len(), 200);
}

#[test]
fn test_listing_order_over_inserted_posts() {
    let board = BoardStore::new(Store::in_memory());
    for i in 0..20 {
        board.add_post("u1", &i.to_string(), "").unwrap();
    }
    let post = board.list_posts()[0].clone();
    for i in 0..20 {
        board.replies().add_reply(&post.id, "u1", &i.to_string(), None).unwrap();
    }

    let posts = board.list_posts();
    assert!(posts.windows(2).all(|w| w[0].created_at_epoch >= w[1].created_at_epoch));

    let replies = board.replies().list_replies(Some(&post.id));
    assert!(replies.windows(2).all(|w| w[0].created_at_epoch <= w[1].created_at_epoch));
}

#[test]
fn test_legacy_posts_are_readable() {
    let store = Store::in_memory();
    store
        .save(
            keys::POSTS,
            &serde_json::json!([
                {"id": "id_a", "lineUserId": "U1", "title": "old", "body": "", "createdAt": "2024/5/1 10:00:00", "createdAtEpoch": 1714525200000i64},
                {"id": "id_b", "lineUserId": "U2", "title": "older", "body": ""}
            ]),
        )
        .unwrap();
    let board = BoardStore::new(store);

    let posts = board.list_posts();
    assert_eq!(posts[0].id, "id_a");
    assert_eq!(posts[1].created_at_epoch, 0);
    assert!(board.delete_post("id_a", "U1").unwrap());
}

#[test]
fn test_null_field_post_does_not_wipe_the_board() {
    let store = Store::in_memory();
    store
        .save(
            keys::POSTS,
            &serde_json::json!([
                {"id": "keep", "lineUserId": "U1", "title": "t", "body": "b", "createdAtEpoch": 1},
                {"id": "odd", "lineUserId": "U2", "title": null, "body": "b", "createdAtEpoch": null}
            ]),
        )
        .unwrap();
    store
        .save(
            keys::REPLIES,
            &serde_json::json!([
                {"id": "r1", "postId": "keep", "lineUserId": "U1", "body": "x", "createdAtEpoch": null},
                {"id": "r2", "postId": "keep", "body": ["not", "text"]}
            ]),
        )
        .unwrap();
    let board = BoardStore::new(store.clone());

    let ids: Vec<String> = board.list_posts().into_iter().map(|p| p.id).collect();
    assert_eq!(ids, vec!["keep", "odd"]);

    let added = board.add_post("u3", "new", "post").unwrap();
    let ids: Vec<String> = board.list_posts().into_iter().map(|p| p.id).collect();
    assert_eq!(ids, vec![added.id.clone(), "keep".to_string(), "odd".to_string()]);

    board.replies().add_reply("keep", "u3", "hi", None).unwrap();
    assert_eq!(board.replies().list_replies(Some("keep")).len(), 2);
    let stored = raw(&store, keys::REPLIES);
    assert_eq!(stored.as_array().map(Vec::len), Some(3));
}

#[test]
fn test_malformed_storage_reads_as_empty() {
    let store = Store::with_backend(
        serenes_board::MemoryBackend::new()
            .with_raw(keys::POSTS, "[{broken")
            .with_raw(keys::REPLIES, "42"),
    );
    let board = BoardStore::new(store);
    assert!(board.list_posts().is_empty());
    assert!(board.replies().list_replies(None).is_empty());

    board.add_post("u1", "fresh", "start").unwrap();
    assert_eq!(board.list_posts().len(), 1);
}

#[test]
fn test_board_survives_reopen_on_sqlite() {
    let path = std::env::temp_dir().join(format!("serenes-board-{}.db", uuid_like()));
    let path_str = path.to_string_lossy().to_string();

    let post_id = {
        let board = BoardStore::new(Store::new(&path_str).unwrap());
        board.add_post("u1", "durable", "yes").unwrap().id
    };

    let board = BoardStore::new(Store::new(&path_str).unwrap());
    assert_eq!(board.get_post(&post_id).map(|p| p.title), Some("durable".to_string()));

    let _ = std::fs::remove_file(&path);
}

fn uuid_like() -> String {
    format!(
        "{}-{}",
        std::process::id(),
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .map(|d| d.as_nanos())
            .unwrap_or_default()
    )
}
