use super::Storage;
use anyhow::Error;
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashMap;

/// In-memory store for tests and ephemeral runs
#[derive(Default)]
pub struct MemoryStore {
    data: Mutex<HashMap<String, String>>,
}

#[async_trait]
impl Storage for MemoryStore {
    async fn get(&self, key: &str) -> Result<Option<String>, Error> {
        Ok(self.data.lock().get(key).cloned())
    }

    async fn set(&self, key: &str, value: String) -> Result<(), Error> {
        self.data.lock().insert(key.to_string(), value);
        Ok(())
    }
}
