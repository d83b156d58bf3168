use crate::domain::ports::Storage;
use crate::utils::error::{BlockerError, Result};
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tokio::sync::Mutex;

const STORAGE_FILE: &str = "storage.json";

/// All keys live in one JSON object file; each write replaces the file
/// atomically through a temp file and rename.
#[derive(Debug)]
pub struct FileStorage {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl FileStorage {
    pub async fn open<P: AsRef<Path>>(data_dir: P) -> Result<Self> {
        tokio::fs::create_dir_all(&data_dir).await?;
        Ok(Self {
            path: data_dir.as_ref().join(STORAGE_FILE),
            write_lock: Mutex::new(()),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn read_all(&self) -> Result<Map<String, Value>> {
        let data = match tokio::fs::read(&self.path).await {
            Ok(data) => data,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Map::new()),
            Err(e) => return Err(e.into()),
        };

        match serde_json::from_slice::<Value>(&data)? {
            Value::Object(map) => Ok(map),
            other => Err(BlockerError::storage(format!(
                "{} does not hold a JSON object (found {})",
                self.path.display(),
                type_name(&other)
            ))),
        }
    }
}

impl Storage for FileStorage {
    async fn get(&self, key: &str) -> Result<Option<Value>> {
        let mut all = self.read_all().await?;
        Ok(all.remove(key))
    }

    async fn set(&self, key: &str, value: Value) -> Result<()> {
        let _guard = self.write_lock.lock().await;

        let mut all = self.read_all().await?;
        all.insert(key.to_string(), value);

        let data = serde_json::to_vec_pretty(&Value::Object(all))?;
        let tmp_path = self.path.with_extension("json.tmp");
        tokio::fs::write(&tmp_path, data).await?;
        tokio::fs::rename(&tmp_path, &self.path).await?;

        tracing::debug!("Persisted key '{}' to {}", key, self.path.display());
        Ok(())
    }
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// Process-local storage; nothing outlives the instance.
#[derive(Debug, Default)]
pub struct MemoryStorage {
    entries: Mutex<HashMap<String, Value>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Storage for MemoryStorage {
    async fn get(&self, key: &str) -> Result<Option<Value>> {
        Ok(self.entries.lock().await.get(key).cloned())
    }

    async fn set(&self, key: &str, value: Value) -> Result<()> {
        self.entries.lock().await.insert(key.to_string(), value);
        Ok(())
    }
}

impl<S: Storage> Storage for std::sync::Arc<S> {
    async fn get(&self, key: &str) -> Result<Option<Value>> {
        (**self).get(key).await
    }

    async fn set(&self, key: &str, value: Value) -> Result<()> {
        (**self).set(key, value).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_file_storage_round_trip() {
        let dir = TempDir::new().unwrap();
        let storage = FileStorage::open(dir.path()).await.unwrap();

        assert_eq!(storage.get("blockingState").await.unwrap(), None);

        storage.set("blockingState", json!({"a": 1})).await.unwrap();
        storage.set("other", json!([1, 2])).await.unwrap();

        let reopened = FileStorage::open(dir.path()).await.unwrap();
        assert_eq!(reopened.get("blockingState").await.unwrap(), Some(json!({"a": 1})));
        assert_eq!(reopened.get("other").await.unwrap(), Some(json!([1, 2])));
        assert!(!dir.path().join("storage.json.tmp").exists());
    }

    #[tokio::test]
    async fn test_file_storage_rejects_non_object_file() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join(STORAGE_FILE), "[1, 2, 3]").unwrap();

        let storage = FileStorage::open(dir.path()).await.unwrap();
        let err = storage.get("blockingState").await.unwrap_err();
        assert!(matches!(err, BlockerError::StorageError { .. }));
    }

    #[test]
    fn test_memory_storage_overwrites() {
        let storage = MemoryStorage::new();
        tokio_test::block_on(async {
            storage.set("k", json!(1)).await.unwrap();
            storage.set("k", json!(2)).await.unwrap();
            assert_eq!(storage.get("k").await.unwrap(), Some(json!(2)));
            assert_eq!(storage.get("missing").await.unwrap(), None);
        });
    }
}
