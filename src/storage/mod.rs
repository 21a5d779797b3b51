mod file;
mod memory;

pub use file::FileStore;
pub use memory::MemoryStore;

use anyhow::Error;
use async_trait::async_trait;

/// Storage keys shared with external readers (UI polls these)
pub const KEY_CACHED_BLOCKLIST: &str = "cachedBlocklist";
pub const KEY_LAST_UPDATE: &str = "lastUpdate";
pub const KEY_TOR_STATUS: &str = "torStatus";

/// Async key/value persistence, last-writer-wins
#[async_trait]
pub trait Storage: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>, Error>;
    async fn set(&self, key: &str, value: String) -> Result<(), Error>;
}
