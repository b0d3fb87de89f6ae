//! Redis-backed note store
//!
//! Notes are stored as JSON strings under `<prefix><id>`. The prefix keeps our
//! keys apart from anything else living in a shared Redis.

use async_trait::async_trait;
use note_core::{Note, NoteError, NoteStore, Result};
use redis::aio::{ConnectionLike, ConnectionManager};
use redis::AsyncCommands;
use std::collections::HashSet;
use tracing::{debug, info};

/// Keys requested per SCAN round trip
const SCAN_BATCH: usize = 100;

/// Note store over any async Redis connection; `ConnectionManager` in production
pub struct RedisStore<C = ConnectionManager> {
    conn: C,
    key_prefix: String,
    ttl_secs: Option<u64>,
}

impl RedisStore<ConnectionManager> {
    pub async fn connect(url: &str, key_prefix: &str, ttl_secs: Option<u64>) -> Result<Self> {
        info!("Connecting to Redis at {}", url);
        let client = redis::Client::open(url).map_err(unavailable)?;
        let conn = ConnectionManager::new(client).await.map_err(unavailable)?;

        Ok(Self::new(conn, key_prefix, ttl_secs))
    }
}

impl<C> RedisStore<C> {
    pub fn new(conn: C, key_prefix: &str, ttl_secs: Option<u64>) -> Self {
        Self {
            conn,
            key_prefix: key_prefix.to_string(),
            ttl_secs: ttl_secs.filter(|ttl| *ttl > 0),
        }
    }

    fn namespaced(&self, key: &str) -> String {
        format!("{}{}", self.key_prefix, key)
    }

    fn strip_namespace<'a>(&self, stored: &'a str) -> Option<&'a str> {
        stored.strip_prefix(self.key_prefix.as_str())
    }

    fn scan_pattern(&self) -> String {
        format!("{}*", escape_glob(&self.key_prefix))
    }
}

fn unavailable(e: redis::RedisError) -> NoteError {
    NoteError::Unavailable(format!("redis: {}", e))
}

/// Escape glob metacharacters so the prefix matches literally in SCAN MATCH
fn escape_glob(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for c in raw.chars() {
        if matches!(c, '*' | '?' | '[' | ']' | '\\') {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

#[async_trait]
impl<C> NoteStore for RedisStore<C>
where
    C: ConnectionLike + Clone + Send + Sync + 'static,
{
    fn name(&self) -> &'static str {
        "redis"
    }

    async fn get(&self, key: &str) -> Result<Note> {
        let mut conn = self.conn.clone();
        let raw: Option<String> = conn.get(self.namespaced(key)).await.map_err(unavailable)?;

        match raw {
            Some(json) => Ok(serde_json::from_str(&json)?),
            None => Err(NoteError::NotFound(key.to_string())),
        }
    }

    async fn set(&self, key: &str, note: &Note) -> Result<()> {
        let json = serde_json::to_string(note)?;
        let mut conn = self.conn.clone();

        match self.ttl_secs {
            Some(ttl) => {
                redis::cmd("SET")
                    .arg(self.namespaced(key))
                    .arg(json)
                    .arg("EX")
                    .arg(ttl)
                    .query_async::<_, ()>(&mut conn)
                    .await
                    .map_err(unavailable)?;
            }
            None => {
                conn.set::<_, _, ()>(self.namespaced(key), json)
                    .await
                    .map_err(unavailable)?;
            }
        }

        Ok(())
    }

    async fn keys(&self) -> Result<Vec<String>> {
        let mut conn = self.conn.clone();
        let pattern = self.scan_pattern();
        // SCAN can hand back the same key twice across iterations
        let mut seen = HashSet::new();
        let mut cursor: u64 = 0;

        loop {
            let (next, batch): (u64, Vec<String>) = redis::cmd("SCAN")
                .arg(cursor)
                .arg("MATCH")
                .arg(&pattern)
                .arg("COUNT")
                .arg(SCAN_BATCH)
                .query_async(&mut conn)
                .await
                .map_err(unavailable)?;

            for stored in batch {
                if let Some(id) = self.strip_namespace(&stored) {
                    seen.insert(id.to_string());
                }
            }

            if next == 0 {
                break;
            }
            cursor = next;
        }

        debug!("Redis SCAN found {} notes", seen.len());
        Ok(seen.into_iter().collect())
    }
}
