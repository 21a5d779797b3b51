mod codec;

use crate::config::setting;
use crate::proxy::{ProxyController, ProxyStatus};
use anyhow::{Context, Error};
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use std::process::Stdio;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::process::{Child, ChildStdin, ChildStdout, Command as ProcessCommand};
use tokio::sync::Mutex;

/// Outbound command frames understood by the host process
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Command {
    #[serde(rename = "START_TOR")]
    StartTor,
    #[serde(rename = "STOP_TOR")]
    StopTor,
    #[serde(rename = "GET_STATUS")]
    GetStatus,
}

#[derive(Debug, Serialize)]
struct CommandFrame {
    command: Command,
}

/// Inbound frame shape; everything is optional so an unrecognized frame
/// deserializes instead of erroring, and gets ignored downstream
#[derive(Debug, Default, Deserialize)]
struct StatusFrame {
    #[serde(default)]
    data: Option<StatusData>,
}

#[derive(Debug, Default, Deserialize)]
struct StatusData {
    #[serde(default)]
    status: Option<String>,
}

struct Handle {
    // held for kill-on-drop; all traffic goes through stdin/stdout
    _child: Child,
    stdin: ChildStdin,
    generation: u64,
}

/// Duplex connection to the external Tor host process over framed stdio.
///
/// The handle is exclusively owned and lazily (re)created: never opened
/// at rest, only on the first outbound command. A generation counter is
/// bumped on every connect and disconnect so delayed sends and the
/// one-shot status poll never post to a dead or replaced handle.
pub struct NativeChannel {
    command: String,
    args: Vec<String>,
    command_delay: Duration,
    status_poll_delay: Duration,
    controller: Arc<ProxyController>,
    inner: Mutex<Option<Handle>>,
    generation: AtomicU64,
}

impl NativeChannel {
    pub fn new(host: &setting::Host, controller: Arc<ProxyController>) -> Self {
        Self {
            command: host.command.clone(),
            args: host.args.clone(),
            command_delay: Duration::from_millis(host.command_delay_ms),
            status_poll_delay: Duration::from_millis(host.status_poll_delay_ms),
            controller,
            inner: Mutex::new(None),
            generation: AtomicU64::new(0),
        }
    }

    /// Spawn the host process if no live handle exists. Re-checks the
    /// handle under the lock, so concurrent triggers connect once.
    pub async fn ensure_connected(self: &Arc<Self>) -> Result<(), Error> {
        let mut inner = self.inner.lock().await;
        if inner.is_some() {
            return Ok(());
        }

        info!("connecting to host process: {}", self.command);
        let spawned = ProcessCommand::new(&self.command)
            .args(&self.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn();

        let mut child = match spawned {
            Ok(v) => v,
            Err(e) => {
                drop(inner);
                // host absent is a safe, visible condition, not a crash
                self.controller.on_disconnect().await;
                return Err(e).context("spawn host process");
            }
        };

        let stdin = child.stdin.take().context("host stdin unavailable")?;
        let stdout = child.stdout.take().context("host stdout unavailable")?;

        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        *inner = Some(Handle {
            _child: child,
            stdin,
            generation,
        });
        drop(inner);

        let channel = self.clone();
        tokio::spawn(async move {
            channel.read_loop(stdout, generation).await;
        });

        Ok(())
    }

    /// Connect on demand, then dispatch after the configured delay. The
    /// delay re-validates the generation so the command is dropped rather
    /// than sent over a connection that changed underneath it.
    pub async fn send(self: &Arc<Self>, command: Command) -> Result<(), Error> {
        self.ensure_connected().await?;
        let generation = self.generation.load(Ordering::SeqCst);

        tokio::time::sleep(self.command_delay).await;

        if self.generation.load(Ordering::SeqCst) != generation {
            debug!("drop {:?}, channel changed while command was pending", command);
            return Ok(());
        }

        self.write_command(command).await
    }

    async fn write_command(&self, command: Command) -> Result<(), Error> {
        let mut inner = self.inner.lock().await;
        let handle = inner.as_mut().context("host not connected")?;
        debug!("send command: {:?}", command);
        codec::write_frame(&mut handle.stdin, &CommandFrame { command }).await
    }

    async fn read_loop(self: Arc<Self>, mut stdout: ChildStdout, generation: u64) {
        loop {
            let body = match codec::read_frame(&mut stdout).await {
                Ok(Some(v)) => v,
                Ok(None) => break,
                Err(e) => {
                    debug!("channel read error: {:?}", e);
                    break;
                }
            };

            let frame: StatusFrame = match serde_json::from_slice(&body) {
                Ok(v) => v,
                Err(e) => {
                    debug!("ignore malformed frame: {}", e);
                    continue;
                }
            };

            let Some(raw) = frame.data.and_then(|d| d.status) else {
                debug!("ignore frame without status");
                continue;
            };

            let Some(status) = ProxyStatus::parse(&raw) else {
                debug!("ignore unrecognized status: {}", raw);
                continue;
            };

            debug!("host status: {}", status.as_str());
            if self.controller.on_status(status).await {
                self.schedule_status_poll(generation);
            }
        }

        self.on_disconnect(generation).await;
    }

    /// One follow-up GET_STATUS after the configured delay, dropped if
    /// the connection is gone by the time it fires
    fn schedule_status_poll(self: &Arc<Self>, generation: u64) {
        let channel = self.clone();
        tokio::spawn(async move {
            tokio::time::sleep(channel.status_poll_delay).await;

            if channel.generation.load(Ordering::SeqCst) != generation {
                debug!("drop stale status poll");
                return;
            }

            if let Err(e) = channel.write_command(Command::GetStatus).await {
                warn!("status poll failed: {:?}", e);
            }
        });
    }

    async fn on_disconnect(&self, generation: u64) {
        {
            let mut inner = self.inner.lock().await;
            match inner.as_ref() {
                Some(handle) if handle.generation == generation => {
                    *inner = None;
                    self.generation.fetch_add(1, Ordering::SeqCst);
                }
                // a newer connection already replaced this one
                _ => return,
            }
        }

        info!("host disconnected");
        self.controller.on_disconnect().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::proxy::{ProxyState, ProxySwitch};
    use crate::storage::{MemoryStore, Storage, KEY_TOR_STATUS};
    use async_trait::async_trait;

    struct NullSwitch;

    #[async_trait]
    impl ProxySwitch for NullSwitch {
        async fn enable(&self) -> Result<(), Error> {
            Ok(())
        }
        async fn disable(&self) -> Result<(), Error> {
            Ok(())
        }
    }

    fn channel_for(
        command: &str,
        args: &[&str],
    ) -> (Arc<NativeChannel>, Arc<ProxyController>, Arc<MemoryStore>) {
        let store = Arc::new(MemoryStore::default());
        let controller = Arc::new(ProxyController::new(Box::new(NullSwitch), store.clone()));
        let host = setting::Host {
            command: command.to_string(),
            args: args.iter().map(|v| v.to_string()).collect(),
            command_delay_ms: 10,
            status_poll_delay_ms: 50,
        };
        let channel = Arc::new(NativeChannel::new(&host, controller.clone()));
        (channel, controller, store)
    }

    #[tokio::test]
    async fn missing_host_surfaces_disconnected_status() {
        let (channel, controller, store) = channel_for("/nonexistent/torwarden-host", &[]);

        assert!(channel.ensure_connected().await.is_err());

        assert_eq!(controller.state(), ProxyState::Disabled);
        assert_eq!(
            store.get(KEY_TOR_STATUS).await.unwrap(),
            Some("Host Disconnected".to_string())
        );
    }

    #[tokio::test]
    async fn host_exit_is_a_disconnect() {
        let (channel, _, store) = channel_for("true", &[]);

        channel.ensure_connected().await.unwrap();
        tokio::time::sleep(Duration::from_millis(200)).await;

        assert_eq!(
            store.get(KEY_TOR_STATUS).await.unwrap(),
            Some("Host Disconnected".to_string())
        );
        assert!(channel.inner.lock().await.is_none());
    }

    #[tokio::test]
    async fn status_frame_drives_the_controller() {
        // emit {"data":{"status":"Running"}} framed, then stay alive
        let script = r#"printf '\035\000\000\000{"data":{"status":"Running"}}'; sleep 5"#;
        let (channel, controller, store) = channel_for("sh", &["-c", script]);

        channel.ensure_connected().await.unwrap();
        tokio::time::sleep(Duration::from_millis(300)).await;

        assert_eq!(controller.state(), ProxyState::Enabled);
        assert_eq!(
            store.get(KEY_TOR_STATUS).await.unwrap(),
            Some("Running".to_string())
        );
    }

    #[tokio::test]
    async fn echoed_command_frames_are_ignored() {
        // cat echoes our own command frames back; they carry no status
        // and must be dropped without effect
        let (channel, controller, _) = channel_for("cat", &[]);

        channel.ensure_connected().await.unwrap();
        channel.send(Command::GetStatus).await.unwrap();
        tokio::time::sleep(Duration::from_millis(200)).await;

        assert_eq!(controller.state(), ProxyState::Disabled);
        assert!(channel.inner.lock().await.is_some());
    }

    #[tokio::test]
    async fn ensure_connected_is_idempotent() {
        let (channel, _, _) = channel_for("cat", &[]);

        channel.ensure_connected().await.unwrap();
        let generation = channel.generation.load(Ordering::SeqCst);
        channel.ensure_connected().await.unwrap();
        assert_eq!(channel.generation.load(Ordering::SeqCst), generation);
    }

    #[tokio::test]
    async fn reconnect_after_disconnect_bumps_generation() {
        let (channel, _, _) = channel_for("true", &[]);

        channel.ensure_connected().await.unwrap();
        tokio::time::sleep(Duration::from_millis(200)).await;
        let after_drop = channel.generation.load(Ordering::SeqCst);

        channel.ensure_connected().await.unwrap();
        assert!(channel.generation.load(Ordering::SeqCst) > after_drop);
    }
}
