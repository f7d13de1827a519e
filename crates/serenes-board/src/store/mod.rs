use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{Map, Value};
use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex};
use thiserror::Error;
use uuid::Uuid;

use crate::config::Config;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Storage lock poisoned")]
    Lock,
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Host key-value storage: string keys, string values.
pub trait KvBackend: Send {
    fn get(&self, key: &str) -> Option<String>;

    /// Overwrites any prior value entirely.
    fn set(&mut self, key: &str, value: String) -> StoreResult<()>;

    /// Returns whether the key existed.
    fn remove(&mut self, key: &str) -> StoreResult<bool>;
}

/// Process-local backend. Nothing survives the process.
#[derive(Debug, Default)]
pub struct MemoryBackend {
    data: HashMap<String, String>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a raw value, bypassing JSON encoding.
    pub fn with_raw(mut self, key: &str, value: &str) -> Self {
        self.data.insert(key.to_string(), value.to_string());
        self
    }
}

impl KvBackend for MemoryBackend {
    fn get(&self, key: &str) -> Option<String> {
        self.data.get(key).cloned()
    }

    fn set(&mut self, key: &str, value: String) -> StoreResult<()> {
        self.data.insert(key.to_string(), value);
        Ok(())
    }

    fn remove(&mut self, key: &str) -> StoreResult<bool> {
        Ok(self.data.remove(key).is_some())
    }
}

/// Durable backend: one `kv` table in a SQLite file.
pub struct SqliteBackend {
    conn: Connection,
}

impl SqliteBackend {
    pub fn open(db_path: &str) -> StoreResult<Self> {
        let backend = Self {
            conn: Connection::open(db_path)?,
        };
        backend.init_schema()?;
        Ok(backend)
    }

    pub fn in_memory() -> StoreResult<Self> {
        let backend = Self {
            conn: Connection::open_in_memory()?,
        };
        backend.init_schema()?;
        Ok(backend)
    }

    fn init_schema(&self) -> StoreResult<()> {
        self.conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS kv (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL,
                updated_at TEXT NOT NULL
            );
            "#,
        )?;
        Ok(())
    }
}

impl KvBackend for SqliteBackend {
    fn get(&self, key: &str) -> Option<String> {
        let result = self
            .conn
            .query_row("SELECT value FROM kv WHERE key = ?1", params![key], |row| row.get(0))
            .optional();
        match result {
            Ok(value) => value,
            Err(e) => {
                log::warn!("Failed to read key '{}': {}", key, e);
                None
            }
        }
    }

    fn set(&mut self, key: &str, value: String) -> StoreResult<()> {
        self.conn.execute(
            r#"INSERT INTO kv (key, value, updated_at) VALUES (?1, ?2, ?3)
               ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at"#,
            params![key, value, Utc::now().to_rfc3339()],
        )?;
        Ok(())
    }

    fn remove(&mut self, key: &str) -> StoreResult<bool> {
        let rows = self.conn.execute("DELETE FROM kv WHERE key = ?1", params![key])?;
        Ok(rows > 0)
    }
}

/// JSON view over a shared key-value backend. Cheap to clone; all clones
/// see the same storage.
#[derive(Clone)]
pub struct Store {
    backend: Arc<Mutex<Box<dyn KvBackend>>>,
}

impl Store {
    /// Open a SQLite-backed store at `db_path` (`:memory:` works too).
    pub fn new(db_path: &str) -> StoreResult<Self> {
        Ok(Self::with_backend(SqliteBackend::open(db_path)?))
    }

    pub fn in_memory() -> Self {
        Self::with_backend(MemoryBackend::new())
    }

    pub fn with_backend(backend: impl KvBackend + 'static) -> Self {
        Self {
            backend: Arc::new(Mutex::new(Box::new(backend))),
        }
    }

    pub fn from_config(config: &Config) -> StoreResult<Self> {
        match &config.database_path {
            Some(path) => {
                log::info!("Opening board storage at {}", path);
                Self::new(path)
            }
            None => Ok(Self::in_memory()),
        }
    }

    /// Parsed JSON at `key`, or `fallback` when the key is absent or the
    /// content does not decode as `T`. Never fails.
    pub fn load<T: DeserializeOwned>(&self, key: &str, fallback: T) -> T {
        let raw = match self.backend.lock() {
            Ok(backend) => backend.get(key),
            Err(_) => {
                log::warn!("Storage lock poisoned while reading '{}'", key);
                None
            }
        };
        let Some(raw) = raw else {
            return fallback;
        };
        match serde_json::from_str(&raw) {
            Ok(value) => value,
            Err(e) => {
                log::debug!("Discarding malformed value at '{}': {}", key, e);
                fallback
            }
        }
    }

    pub fn save<T: Serialize + ?Sized>(&self, key: &str, value: &T) -> StoreResult<()> {
        let json = serde_json::to_string(value)?;
        let mut backend = self.backend.lock().map_err(|_| StoreError::Lock)?;
        backend.set(key, json)
    }

    pub fn remove(&self, key: &str) -> StoreResult<bool> {
        let mut backend = self.backend.lock().map_err(|_| StoreError::Lock)?;
        backend.remove(key)
    }

    /// JSON array at `key`, decoded one record at a time. Records that do
    /// not decode are held aside and written back by `save_records`.
    pub fn load_records<T: DeserializeOwned>(&self, key: &str) -> Records<T> {
        let mut records = Records::default();
        let Value::Array(raw) = self.load(key, Value::Null) else {
            return records;
        };
        for value in raw {
            match decode_record(&value) {
                Some(record) => records.items.push(record),
                None => {
                    log::warn!("Keeping undecodable record in '{}'", key);
                    records.unreadable.push(value);
                }
            }
        }
        records
    }

    pub fn save_records<T: Serialize>(&self, key: &str, records: &Records<T>) -> StoreResult<()> {
        let mut out = Vec::with_capacity(records.items.len() + records.unreadable.len());
        for item in &records.items {
            out.push(serde_json::to_value(item)?);
        }
        out.extend(records.unreadable.iter().cloned());
        self.save(key, &out)
    }

    /// JSON object at `key`, decoded one entry at a time, like `load_records`.
    pub fn load_record_map<T: DeserializeOwned>(&self, key: &str) -> RecordMap<T> {
        let mut records = RecordMap::default();
        let Value::Object(raw) = self.load(key, Value::Null) else {
            return records;
        };
        for (id, value) in raw {
            match decode_record(&value) {
                Some(record) => {
                    records.items.insert(id, record);
                }
                None => {
                    log::warn!("Keeping undecodable entry '{}' in '{}'", id, key);
                    records.unreadable.insert(id, value);
                }
            }
        }
        records
    }

    /// A decoded entry replaces an undecodable one under the same id.
    pub fn save_record_map<T: Serialize>(&self, key: &str, records: &RecordMap<T>) -> StoreResult<()> {
        let mut out = records.unreadable.clone();
        for (id, item) in &records.items {
            out.insert(id.clone(), serde_json::to_value(item)?);
        }
        self.save(key, &out)
    }
}

/// A stored list split into decoded records and raw ones that failed.
#[derive(Debug)]
pub struct Records<T> {
    pub items: Vec<T>,
    unreadable: Vec<Value>,
}

impl<T> Default for Records<T> {
    fn default() -> Self {
        Self {
            items: Vec::new(),
            unreadable: Vec::new(),
        }
    }
}

/// Keyed counterpart of `Records`.
#[derive(Debug)]
pub struct RecordMap<T> {
    pub items: BTreeMap<String, T>,
    unreadable: Map<String, Value>,
}

impl<T> Default for RecordMap<T> {
    fn default() -> Self {
        Self {
            items: BTreeMap::new(),
            unreadable: Map::new(),
        }
    }
}

/// Null fields read as absent, so they take the field's default.
fn decode_record<T: DeserializeOwned>(value: &Value) -> Option<T> {
    let value = match value {
        Value::Object(fields) => Value::Object(
            fields
                .iter()
                .filter(|(_, v)| !v.is_null())
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect(),
        ),
        other => other.clone(),
    };
    serde_json::from_value(value).ok()
}

/// Opaque record id: `id_<random base36>_<millis base36>`.
/// Not a security token.
pub fn new_id() -> String {
    let random = Uuid::new_v4().as_u128() as u64;
    let millis = Utc::now().timestamp_millis().max(0) as u64;
    format!("id_{}_{}", to_base36(random), to_base36(millis))
}

/// Draw ids until one is not already `taken`.
pub fn unique_id(taken: impl Fn(&str) -> bool) -> String {
    loop {
        let id = new_id();
        if !taken(&id) {
            return id;
        }
        log::debug!("Id collision on {}, drawing again", id);
    }
}

fn to_base36(mut n: u64) -> String {
    const DIGITS: &[u8; 36] = b"0123456789abcdefghijklmnopqrstuvwxyz";
    if n == 0 {
        return "0".to_string();
    }
    let mut buf = Vec::new();
    while n > 0 {
        buf.push(DIGITS[(n % 36) as usize]);
        n /= 36;
    }
    buf.reverse();
    String::from_utf8(buf).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{json, Value};
    use std::collections::HashSet;

    #[test]
    fn test_load_returns_saved_value() {
        let store = Store::in_memory();
        let value = json!({"a": [1, 2, {"b": null}], "c": "text"});

        store.save("k", &value).unwrap();
        assert_eq!(store.load("k", Value::Null), value);
    }

    #[test]
    fn test_load_missing_key_returns_fallback() {
        let store = Store::in_memory();
        let posts: Vec<String> = store.load("nothing", vec!["fallback".to_string()]);
        assert_eq!(posts, vec!["fallback"]);
    }

    #[test]
    fn test_load_malformed_returns_fallback() {
        let store = Store::with_backend(MemoryBackend::new().with_raw("k", "{not json"));
        assert_eq!(store.load("k", json!([])), json!([]));
    }

    #[test]
    fn test_load_wrong_shape_returns_fallback() {
        let store = Store::with_backend(MemoryBackend::new().with_raw("k", r#"{"x":1}"#));
        let list: Vec<u32> = store.load("k", Vec::new());
        assert!(list.is_empty());
    }

    #[test]
    fn test_save_overwrites() {
        let store = Store::in_memory();
        store.save("k", &json!([1, 2, 3])).unwrap();
        store.save("k", &json!({"only": true})).unwrap();
        assert_eq!(store.load("k", Value::Null), json!({"only": true}));
    }

    #[test]
    fn test_remove() {
        let store = Store::in_memory();
        store.save("k", &1).unwrap();
        assert!(store.remove("k").unwrap());
        assert!(!store.remove("k").unwrap());
        assert_eq!(store.load("k", 0), 0);
    }

    #[test]
    fn test_sqlite_backend_round_trip() {
        let store = Store::new(":memory:").unwrap();
        store.save("k", &json!({"n": 1})).unwrap();
        store.save("k", &json!({"n": 2})).unwrap();
        assert_eq!(store.load("k", Value::Null), json!({"n": 2}));
        assert!(store.remove("k").unwrap());
        assert_eq!(store.load("k", Value::Null), Value::Null);
    }

    #[test]
    fn test_clones_share_storage() {
        let store = Store::in_memory();
        let other = store.clone();
        store.save("k", &"v").unwrap();
        assert_eq!(other.load("k", String::new()), "v");
    }

    #[derive(Debug, Default, PartialEq, Serialize, serde::Deserialize)]
    #[serde(default)]
    struct Item {
        id: String,
        n: i64,
    }

    #[test]
    fn test_load_records_null_fields_default() {
        let store = Store::in_memory();
        store.save("k", &json!([{"id": "a", "n": null}, {"id": "b", "n": 2}])).unwrap();

        let records: Records<Item> = store.load_records("k");
        assert_eq!(records.items.len(), 2);
        assert_eq!(records.items[0].n, 0);
    }

    #[test]
    fn test_undecodable_records_survive_save() {
        let store = Store::in_memory();
        store.save("k", &json!([{"id": "a", "n": 1}, {"id": "bad", "n": "x"}, 7])).unwrap();

        let mut records: Records<Item> = store.load_records("k");
        assert_eq!(records.items.len(), 1);
        records.items.push(Item {
            id: "c".to_string(),
            n: 3,
        });
        store.save_records("k", &records).unwrap();

        let raw: Vec<Value> = store.load("k", Vec::new());
        assert_eq!(raw.len(), 4);
        assert!(raw.contains(&json!({"id": "bad", "n": "x"})));
        assert!(raw.contains(&json!(7)));
    }

    #[test]
    fn test_record_map_keeps_bad_entries() {
        let store = Store::in_memory();
        store.save("k", &json!({"a": {"id": "a", "n": 1}, "b": {"n": [1]}})).unwrap();

        let mut records: RecordMap<Item> = store.load_record_map("k");
        assert_eq!(records.items.len(), 1);
        records.items.insert("c".to_string(), Item::default());
        store.save_record_map("k", &records).unwrap();

        let raw: Value = store.load("k", Value::Null);
        assert_eq!(raw["b"], json!({"n": [1]}));
        assert_eq!(raw["a"]["n"], 1);
        assert!(raw.get("c").is_some());
    }

    #[test]
    fn test_new_id_shape_and_uniqueness() {
        let mut seen = HashSet::new();
        for _ in 0..2000 {
            let id = new_id();
            assert!(id.starts_with("id_"));
            assert_eq!(id.split('_').count(), 3);
            assert!(seen.insert(id));
        }
    }

    #[test]
    fn test_unique_id_skips_taken() {
        let taken = HashSet::from(["id_x".to_string()]);
        let id = unique_id(|candidate| taken.contains(candidate));
        assert!(!taken.contains(&id));
    }

    #[test]
    fn test_to_base36() {
        assert_eq!(to_base36(0), "0");
        assert_eq!(to_base36(35), "z");
        assert_eq!(to_base36(36), "10");
    }
}
