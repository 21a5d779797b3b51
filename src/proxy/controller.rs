use super::status::ProxyStatus;
use super::switch::ProxySwitch;
use crate::metrics;
use crate::storage::{Storage, KEY_TOR_STATUS};
use anyhow::Error;
use log::warn;
use parking_lot::Mutex;
use std::sync::Arc;

/// Actual local proxy configuration, owned by this crate
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ProxyState {
    #[default]
    Disabled,
    Enabled,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Event {
    Status(ProxyStatus),
    Disconnected,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Effect {
    EnableProxy,
    DisableProxy,
    /// Schedule one follow-up GET_STATUS (slow-starting host)
    PollStatus,
}

/// Single transition function; every (state, event) pair is enumerable.
///
/// Starting and Running both enable; Stopped and Terminated both disable;
/// a channel disconnect forces the configuration off regardless of the
/// last reported status, so outbound traffic is never pinned through a
/// proxy whose backing process is in an unknown state.
pub fn transition(state: ProxyState, event: Event) -> (ProxyState, Vec<Effect>) {
    match event {
        Event::Status(status) => match status {
            ProxyStatus::Starting | ProxyStatus::Running => {
                let mut effects = vec![];
                if state == ProxyState::Disabled {
                    effects.push(Effect::EnableProxy);
                }
                if status == ProxyStatus::Starting {
                    effects.push(Effect::PollStatus);
                }
                (ProxyState::Enabled, effects)
            }
            ProxyStatus::Stopped | ProxyStatus::Terminated => {
                let effects = if state == ProxyState::Enabled {
                    vec![Effect::DisableProxy]
                } else {
                    vec![]
                };
                (ProxyState::Disabled, effects)
            }
            ProxyStatus::Initializing | ProxyStatus::HostDisconnected => (state, vec![]),
        },
        Event::Disconnected => (ProxyState::Disabled, vec![Effect::DisableProxy]),
    }
}

/// Drives the transition table, applies effects through the switch and
/// persists every observed status for external readers
pub struct ProxyController {
    state: Mutex<ProxyState>,
    switch: Box<dyn ProxySwitch>,
    store: Arc<dyn Storage>,
}

impl ProxyController {
    pub fn new(switch: Box<dyn ProxySwitch>, store: Arc<dyn Storage>) -> Self {
        Self {
            state: Mutex::new(ProxyState::Disabled),
            switch,
            store,
        }
    }

    pub fn state(&self) -> ProxyState {
        *self.state.lock()
    }

    /// Handle a status report. Returns true when the caller should
    /// schedule a single follow-up status query.
    pub async fn on_status(&self, status: ProxyStatus) -> bool {
        let effects = self.step(Event::Status(status));
        self.persist(status).await;
        self.apply(&effects).await
    }

    /// Channel lost; force the safe configuration
    pub async fn on_disconnect(&self) {
        let effects = self.step(Event::Disconnected);
        self.persist(ProxyStatus::HostDisconnected).await;
        self.apply(&effects).await;
    }

    fn step(&self, event: Event) -> Vec<Effect> {
        let mut state = self.state.lock();
        let (next, effects) = transition(*state, event);
        *state = next;
        effects
    }

    async fn apply(&self, effects: &[Effect]) -> bool {
        let mut poll = false;
        for effect in effects {
            let result: Result<(), Error> = match effect {
                Effect::EnableProxy => {
                    metrics::proxy_switch("enable");
                    self.switch.enable().await
                }
                Effect::DisableProxy => {
                    metrics::proxy_switch("disable");
                    self.switch.disable().await
                }
                Effect::PollStatus => {
                    poll = true;
                    Ok(())
                }
            };
            if let Err(e) = result {
                warn!("apply proxy configuration failed: {:?}", e);
            }
        }
        poll
    }

    async fn persist(&self, status: ProxyStatus) {
        if let Err(e) = self
            .store
            .set(KEY_TOR_STATUS, status.as_str().to_string())
            .await
        {
            warn!("persist proxy status failed: {:?}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStore;
    use async_trait::async_trait;

    #[derive(Default)]
    struct RecordingSwitch {
        calls: Mutex<Vec<&'static str>>,
    }

    #[async_trait]
    impl ProxySwitch for RecordingSwitch {
        async fn enable(&self) -> Result<(), Error> {
            self.calls.lock().push("enable");
            Ok(())
        }

        async fn disable(&self) -> Result<(), Error> {
            self.calls.lock().push("disable");
            Ok(())
        }
    }

    fn controller() -> (Arc<ProxyController>, Arc<RecordingSwitch>, Arc<MemoryStore>) {
        let switch = Arc::new(RecordingSwitch::default());
        let store = Arc::new(MemoryStore::default());

        struct Forward(Arc<RecordingSwitch>);

        #[async_trait]
        impl ProxySwitch for Forward {
            async fn enable(&self) -> Result<(), Error> {
                self.0.enable().await
            }
            async fn disable(&self) -> Result<(), Error> {
                self.0.disable().await
            }
        }

        let controller = Arc::new(ProxyController::new(
            Box::new(Forward(switch.clone())),
            store.clone(),
        ));
        (controller, switch, store)
    }

    #[test]
    fn transition_table_is_total() {
        // every (state, event) pair resolves without surprises
        for state in [ProxyState::Disabled, ProxyState::Enabled] {
            for status in ProxyStatus::ALL {
                let (next, _) = transition(state, Event::Status(status));
                match status {
                    ProxyStatus::Starting | ProxyStatus::Running => {
                        assert_eq!(next, ProxyState::Enabled)
                    }
                    ProxyStatus::Stopped | ProxyStatus::Terminated => {
                        assert_eq!(next, ProxyState::Disabled)
                    }
                    _ => assert_eq!(next, state),
                }
            }
            let (next, effects) = transition(state, Event::Disconnected);
            assert_eq!(next, ProxyState::Disabled);
            assert_eq!(effects, vec![Effect::DisableProxy]);
        }
    }

    #[test]
    fn starting_requests_one_poll() {
        let (_, effects) = transition(ProxyState::Disabled, Event::Status(ProxyStatus::Starting));
        assert_eq!(effects, vec![Effect::EnableProxy, Effect::PollStatus]);

        // already enabled: no reconfiguration, still one poll
        let (_, effects) = transition(ProxyState::Enabled, Event::Status(ProxyStatus::Starting));
        assert_eq!(effects, vec![Effect::PollStatus]);
    }

    #[tokio::test]
    async fn enable_is_idempotent() {
        let (controller, switch, _) = controller();

        controller.on_status(ProxyStatus::Running).await;
        controller.on_status(ProxyStatus::Running).await;

        assert_eq!(controller.state(), ProxyState::Enabled);
        assert_eq!(*switch.calls.lock(), vec!["enable"]);
    }

    #[tokio::test]
    async fn disconnect_forces_disabled_from_running() {
        let (controller, switch, store) = controller();

        controller.on_status(ProxyStatus::Running).await;
        controller.on_disconnect().await;

        assert_eq!(controller.state(), ProxyState::Disabled);
        assert_eq!(*switch.calls.lock(), vec!["enable", "disable"]);
        assert_eq!(
            store.get(KEY_TOR_STATUS).await.unwrap(),
            Some("Host Disconnected".to_string())
        );
    }

    #[tokio::test]
    async fn disconnect_disables_even_when_already_disabled() {
        let (controller, switch, _) = controller();

        controller.on_disconnect().await;

        // fail-safe is unconditional
        assert_eq!(*switch.calls.lock(), vec!["disable"]);
        assert_eq!(controller.state(), ProxyState::Disabled);
    }

    #[tokio::test]
    async fn stopped_and_terminated_both_disable() {
        for status in [ProxyStatus::Stopped, ProxyStatus::Terminated] {
            let (controller, switch, _) = controller();
            controller.on_status(ProxyStatus::Running).await;
            controller.on_status(status).await;
            assert_eq!(controller.state(), ProxyState::Disabled);
            assert_eq!(*switch.calls.lock(), vec!["enable", "disable"]);
        }
    }

    #[tokio::test]
    async fn status_is_persisted() {
        let (controller, _, store) = controller();
        controller.on_status(ProxyStatus::Starting).await;
        assert_eq!(
            store.get(KEY_TOR_STATUS).await.unwrap(),
            Some("Starting".to_string())
        );
    }
}
