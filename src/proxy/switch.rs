use crate::config::setting;
use anyhow::{bail, Error};
use async_trait::async_trait;
use log::info;

/// Applies the local proxy configuration. The controller only ever calls
/// this through its transition effects, so implementations see each state
/// change exactly once.
#[async_trait]
pub trait ProxySwitch: Send + Sync {
    /// Fixed-servers SOCKS configuration
    async fn enable(&self) -> Result<(), Error>;
    /// System / direct configuration
    async fn disable(&self) -> Result<(), Error>;
}

/// Shells out to configured commands, passing the SOCKS endpoint and
/// bypass list in the environment. With no commands configured the state
/// change is only logged, which keeps the daemon usable on hosts where
/// proxy settings are managed elsewhere.
pub struct CommandSwitch {
    socks_host: String,
    socks_port: u16,
    bypass: Vec<String>,
    enable_cmd: Option<String>,
    disable_cmd: Option<String>,
}

impl CommandSwitch {
    pub fn new(proxy: &setting::Proxy) -> Self {
        Self {
            socks_host: proxy.socks_host.clone(),
            socks_port: proxy.socks_port,
            bypass: proxy.bypass.clone(),
            enable_cmd: proxy.enable_cmd.clone(),
            disable_cmd: proxy.disable_cmd.clone(),
        }
    }

    async fn run(&self, cmd: &str) -> Result<(), Error> {
        let output = tokio::process::Command::new("sh")
            .arg("-c")
            .arg(cmd)
            .env("SOCKS_HOST", &self.socks_host)
            .env("SOCKS_PORT", self.socks_port.to_string())
            .env("BYPASS", self.bypass.join(","))
            .output()
            .await?;

        if !output.status.success() {
            bail!(
                "proxy command failed: {}",
                String::from_utf8_lossy(&output.stderr).trim()
            );
        }
        Ok(())
    }
}

#[async_trait]
impl ProxySwitch for CommandSwitch {
    async fn enable(&self) -> Result<(), Error> {
        info!(
            "enable proxy, socks5 {}:{}, bypass {:?}",
            self.socks_host, self.socks_port, self.bypass
        );
        if let Some(cmd) = &self.enable_cmd {
            self.run(cmd).await?;
        }
        Ok(())
    }

    async fn disable(&self) -> Result<(), Error> {
        info!("disable proxy, reset to system configuration");
        if let Some(cmd) = &self.disable_cmd {
            self.run(cmd).await?;
        }
        Ok(())
    }
}
