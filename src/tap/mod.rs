use crate::metrics;
use crate::runtime::{ArcRuntime, RuntimeContext};
use log::debug;
use tokio::sync::mpsc;

/// Interception events use this context id for requests with no
/// associated browsing context; those are discarded unseen
pub const NO_CONTEXT: i64 = -1;

/// Events delivered by the interception and lifecycle collaborators
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TapEvent {
    Request { context_id: i64, hostname: String },
    ContextClosed { context_id: i64 },
}

/// The only place classification and recording are coupled
pub async fn serve(runtime: ArcRuntime, mut events: mpsc::Receiver<TapEvent>) {
    while let Some(event) = events.recv().await {
        handle(&runtime, event);
    }
}

fn handle(runtime: &RuntimeContext, event: TapEvent) {
    match event {
        TapEvent::Request {
            context_id,
            hostname,
        } => {
            if context_id == NO_CONTEXT {
                return;
            }
            let Ok(context_id) = u32::try_from(context_id) else {
                return;
            };

            let hostname = crate::blocklist::normalize(&hostname);
            let tracked = runtime.blocklist.is_tracked(&hostname);
            metrics::classified(tracked);

            if tracked {
                let score = runtime.ledger.record(context_id, &hostname);
                debug!(
                    "tracker {} on context {}, score {}",
                    hostname, context_id, score
                );
            }
        }
        TapEvent::ContextClosed { context_id } => {
            if let Ok(context_id) = u32::try_from(context_id) {
                runtime.ledger.evict(context_id);
            }
        }
    }
}
