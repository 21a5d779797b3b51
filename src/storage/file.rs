use super::Storage;
use anyhow::{Context, Error};
use async_trait::async_trait;
use std::collections::HashMap;
use std::io::ErrorKind;
use std::path::PathBuf;
use tokio::sync::Mutex;

/// Single JSON-object file, one writer at a time
pub struct FileStore {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl FileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    async fn read_map(&self) -> Result<HashMap<String, String>, Error> {
        match tokio::fs::read_to_string(&self.path).await {
            Ok(content) => {
                serde_json::from_str(&content).context("corrupt state file")
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(HashMap::new()),
            Err(e) => Err(e).context("read state file"),
        }
    }
}

#[async_trait]
impl Storage for FileStore {
    async fn get(&self, key: &str) -> Result<Option<String>, Error> {
        Ok(self.read_map().await?.remove(key))
    }

    async fn set(&self, key: &str, value: String) -> Result<(), Error> {
        let _guard = self.write_lock.lock().await;

        let mut map = self.read_map().await?;
        map.insert(key.to_string(), value);

        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        // write to a sibling then rename, so readers never see a torn file
        let tmp = self.path.with_extension("tmp");
        tokio::fs::write(&tmp, serde_json::to_vec_pretty(&map)?).await?;
        tokio::fs::rename(&tmp, &self.path).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn set_get_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::new(dir.path().join("state.json"));

        assert_eq!(store.get("torStatus").await.unwrap(), None);

        store
            .set("torStatus", "Running".to_string())
            .await
            .unwrap();
        store.set("lastUpdate", "12345".to_string()).await.unwrap();

        assert_eq!(
            store.get("torStatus").await.unwrap(),
            Some("Running".to_string())
        );
        assert_eq!(
            store.get("lastUpdate").await.unwrap(),
            Some("12345".to_string())
        );
    }

    #[tokio::test]
    async fn overwrite_is_last_writer_wins() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::new(dir.path().join("state.json"));

        store.set("k", "a".to_string()).await.unwrap();
        store.set("k", "b".to_string()).await.unwrap();
        assert_eq!(store.get("k").await.unwrap(), Some("b".to_string()));
    }
}
