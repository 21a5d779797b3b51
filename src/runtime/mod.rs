use crate::blocklist::BlocklistEngine;
use crate::channel::NativeChannel;
use crate::config::Setting;
use crate::ledger::Ledger;
use crate::storage::Storage;
use crate::tap::TapEvent;
use std::sync::Arc;
use tokio::sync::mpsc;

/// Process-wide services, explicitly constructed at startup and injected
/// into collaborators so tests can build isolated instances
pub struct RuntimeContext {
    pub setting: Arc<Setting>,
    pub store: Arc<dyn Storage>,
    pub blocklist: BlocklistEngine,
    pub ledger: Ledger,
    pub channel: Arc<NativeChannel>,
    pub tap_tx: mpsc::Sender<TapEvent>,
}

pub type ArcRuntime = Arc<RuntimeContext>;
