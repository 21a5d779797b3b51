mod engine;
mod fetch;

pub use engine::{normalize, BlocklistEngine, CACHE_CAP, SEED_TRACKERS};
pub use fetch::{Fetch, HttpFetch};

use crate::runtime::ArcRuntime;
use log::{info, warn};
use std::time::Duration;

/// Periodic refresh with exponential backoff after failures
pub async fn auto_refresh(runtime: ArcRuntime) {
    let interval = Duration::from_secs(runtime.setting.refresh_interval);
    let min_backoff = Duration::from_secs(60).min(interval);

    let mut delay = interval;
    let mut backoff = min_backoff;

    loop {
        tokio::time::sleep(delay).await;

        match runtime.blocklist.refresh().await {
            Ok(size) => {
                info!("blocklist updated, {} rules", size);
                delay = interval;
                backoff = min_backoff;
            }
            Err(e) => {
                warn!("blocklist refresh failed, retry in {:?}: {:?}", backoff, e);
                delay = backoff;
                backoff = (backoff * 2).min(interval);
            }
        }
    }
}
