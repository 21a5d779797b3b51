use serde::Deserialize;

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct Setting {
    /// Control / metrics API listen address
    pub bind: String,
    pub blocklist_url: String,
    /// Seconds between automatic blocklist refreshes
    pub refresh_interval: u64,
    /// A refresh producing fewer rules than this is treated as failed
    pub min_rules: usize,
    /// State file for the cached blocklist and proxy status
    pub storage_path: String,
    pub host: Host,
    pub proxy: Proxy,
}

impl Default for Setting {
    fn default() -> Self {
        Self {
            bind: "127.0.0.1:8653".to_string(),
            blocklist_url: "https://raw.githubusercontent.com/StevenBlack/hosts/master/hosts"
                .to_string(),
            refresh_interval: 86400,
            min_rules: 100,
            storage_path: "data/torwarden.json".to_string(),
            host: Default::default(),
            proxy: Default::default(),
        }
    }
}

/// External Tor host process, spoken to over framed stdio
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct Host {
    pub command: String,
    pub args: Vec<String>,
    /// Delay before dispatching a command after connect, milliseconds
    pub command_delay_ms: u64,
    /// Delay before the single follow-up GET_STATUS while Starting, milliseconds
    pub status_poll_delay_ms: u64,
}

impl Default for Host {
    fn default() -> Self {
        Self {
            command: "torwarden-host".to_string(),
            args: vec![],
            command_delay_ms: 100,
            status_poll_delay_ms: 2000,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct Proxy {
    pub socks_host: String,
    pub socks_port: u16,
    pub bypass: Vec<String>,
    /// Shell command applying the SOCKS configuration; runs with
    /// SOCKS_HOST, SOCKS_PORT and BYPASS in the environment
    pub enable_cmd: Option<String>,
    /// Shell command restoring the system / direct configuration
    pub disable_cmd: Option<String>,
}

impl Default for Proxy {
    fn default() -> Self {
        Self {
            socks_host: "127.0.0.1".to_string(),
            socks_port: 9050,
            bypass: vec![
                "localhost".to_string(),
                "127.0.0.1".to_string(),
                "::1".to_string(),
            ],
            enable_cmd: None,
            disable_cmd: None,
        }
    }
}
