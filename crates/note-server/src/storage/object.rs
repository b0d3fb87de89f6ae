//! Object storage note store
//!
//! One JSON object per note at `<prefix>/<id>` inside a single bucket. Google
//! Cloud Storage in production; any `ObjectStore` works, which is how the tests
//! run it against `InMemory`.

use async_trait::async_trait;
use futures::TryStreamExt;
use note_core::{Note, NoteError, NoteStore, Result};
use object_store::gcp::GoogleCloudStorageBuilder;
use object_store::path::Path;
use object_store::{ObjectMeta, ObjectStore, PutPayload};
use percent_encoding::percent_decode_str;
use std::sync::Arc;
use tracing::{debug, info, warn};

pub struct ObjectNoteStore {
    store: Arc<dyn ObjectStore>,
    prefix: Option<Path>,
    label: &'static str,
}

impl ObjectNoteStore {
    pub fn new(store: Arc<dyn ObjectStore>, prefix: &str, label: &'static str) -> Self {
        let trimmed = prefix.trim_matches('/');
        let prefix = if trimmed.is_empty() {
            None
        } else {
            Some(Path::from(trimmed))
        };

        Self {
            store,
            prefix,
            label,
        }
    }

    /// Bind to a GCS bucket, picking up credentials from the usual Google env vars
    pub fn gcs(bucket: &str, prefix: &str) -> Result<Self> {
        info!("Opening GCS bucket {} (prefix {:?})", bucket, prefix);
        let gcs = GoogleCloudStorageBuilder::from_env()
            .with_bucket_name(bucket)
            .build()
            .map_err(unavailable)?;

        Ok(Self::new(Arc::new(gcs), prefix, "gcs"))
    }

    fn object_path(&self, key: &str) -> Path {
        match &self.prefix {
            Some(prefix) => prefix.child(key),
            None => Path::from_iter(std::iter::once(key)),
        }
    }

    /// Note id for a listed object, skipping anything nested below the prefix.
    ///
    /// Path segments come back percent-encoded; decoding yields the id that was
    /// passed to `set`.
    fn key_of(&self, meta: &ObjectMeta) -> Option<String> {
        let mut parts: Vec<_> = match &self.prefix {
            Some(prefix) => meta.location.prefix_match(prefix)?.collect(),
            None => meta.location.parts().collect(),
        };

        if parts.len() != 1 {
            return None;
        }
        let part = parts.pop()?;
        match percent_decode_str(part.as_ref()).decode_utf8() {
            Ok(key) => Some(key.into_owned()),
            Err(e) => {
                warn!("Skipping object {} with non-UTF-8 name: {}", meta.location, e);
                None
            }
        }
    }
}

fn unavailable(e: object_store::Error) -> NoteError {
    NoteError::Unavailable(format!("object store: {}", e))
}

#[async_trait]
impl NoteStore for ObjectNoteStore {
    fn name(&self) -> &'static str {
        self.label
    }

    async fn get(&self, key: &str) -> Result<Note> {
        let path = self.object_path(key);
        let fetched = match self.store.get(&path).await {
            Ok(result) => result,
            Err(object_store::Error::NotFound { .. }) => {
                return Err(NoteError::NotFound(key.to_string()))
            }
            Err(e) => return Err(unavailable(e)),
        };

        let body = fetched.bytes().await.map_err(unavailable)?;
        Ok(serde_json::from_slice(&body)?)
    }

    async fn set(&self, key: &str, note: &Note) -> Result<()> {
        let body = serde_json::to_vec(note)?;
        self.store
            .put(&self.object_path(key), PutPayload::from(body))
            .await
            .map_err(unavailable)?;
        Ok(())
    }

    async fn keys(&self) -> Result<Vec<String>> {
        // The listing stream follows page tokens on its own; drain it fully
        let objects: Vec<ObjectMeta> = self
            .store
            .list(self.prefix.as_ref())
            .try_collect()
            .await
            .map_err(unavailable)?;

        let keys: Vec<String> = objects.iter().filter_map(|meta| self.key_of(meta)).collect();
        debug!("Listed {} note objects", keys.len());
        Ok(keys)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use object_store::memory::InMemory;
    use std::collections::HashSet;

    fn in_memory(prefix: &str) -> (Arc<InMemory>, ObjectNoteStore) {
        let raw = Arc::new(InMemory::new());
        let store = ObjectNoteStore::new(raw.clone(), prefix, "test");
        (raw, store)
    }

    #[tokio::test]
    async fn test_round_trip() {
        let (_, store) = in_memory("notes");

        store.set("abc", &Note::new("hello")).await.unwrap();
        assert_eq!(store.get("abc").await.unwrap(), Note::new("hello"));

        store.set("abc", &Note::new("updated")).await.unwrap();
        assert_eq!(store.get("abc").await.unwrap(), Note::new("updated"));
    }

    #[tokio::test]
    async fn test_missing_is_not_found() {
        let (_, store) = in_memory("notes");
        let err = store.get("does-not-exist").await.unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_object_layout() {
        let (raw, store) = in_memory("/notes/");
        store.set("abc", &Note::new("hello")).await.unwrap();

        let body = raw
            .get(&Path::from("notes/abc"))
            .await
            .unwrap()
            .bytes()
            .await
            .unwrap();
        let value: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(value, serde_json::json!({ "content": "hello" }));
    }

    #[tokio::test]
    async fn test_keys_only_under_prefix() {
        let (raw, store) = in_memory("notes");
        for i in 0..25 {
            store
                .set(&format!("n{}", i), &Note::new("x"))
                .await
                .unwrap();
        }
        // Unrelated data sharing the bucket
        raw.put(&Path::from("other/thing"), PutPayload::from(b"{}".to_vec()))
            .await
            .unwrap();
        raw.put(&Path::from("notes/nested/deep"), PutPayload::from(b"{}".to_vec()))
            .await
            .unwrap();

        let keys: HashSet<String> = store.keys().await.unwrap().into_iter().collect();
        assert_eq!(keys.len(), 25);
        assert!(keys.contains("n0"));
        assert!(keys.contains("n24"));
    }

    #[tokio::test]
    async fn test_keys_round_trip_reserved_characters() {
        let (_, store) = in_memory("notes");
        let ids = ["a~b", "50%", "x#y", "dot.", "[bracket]"];
        for id in ids {
            store.set(id, &Note::new(id)).await.unwrap();
        }

        let keys: HashSet<String> = store.keys().await.unwrap().into_iter().collect();
        let expected: HashSet<String> = ids.iter().map(|s| s.to_string()).collect();
        assert_eq!(keys, expected);

        for key in &keys {
            assert_eq!(store.get(key).await.unwrap(), Note::new(key.as_str()));
        }
    }

    #[tokio::test]
    async fn test_empty_prefix_uses_bucket_root() {
        let (raw, store) = in_memory("");
        store.set("abc", &Note::new("root")).await.unwrap();

        assert!(raw.head(&Path::from("abc")).await.is_ok());
        assert_eq!(store.keys().await.unwrap(), vec!["abc".to_string()]);
    }

    #[tokio::test]
    async fn test_corrupt_object_is_unavailable() {
        let (raw, store) = in_memory("notes");
        raw.put(&Path::from("notes/bad"), PutPayload::from(b"not json".to_vec()))
            .await
            .unwrap();

        let err = store.get("bad").await.unwrap_err();
        assert!(matches!(err, NoteError::Unavailable(_)));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_sets() {
        let (_, store) = in_memory("notes");
        let store = Arc::new(store);

        let handles: Vec<_> = ["a", "b"]
            .into_iter()
            .map(|key| {
                let store = store.clone();
                tokio::spawn(async move { store.set(key, &Note::new(key)).await })
            })
            .collect();
        for handle in handles {
            handle.await.unwrap().unwrap();
        }

        assert_eq!(store.get("a").await.unwrap(), Note::new("a"));
        assert_eq!(store.get("b").await.unwrap(), Note::new("b"));
    }
}
