/// State reported by the external Tor host process, mirrored verbatim to
/// storage for UI polling. Not to be confused with the local proxy
/// configuration state, which this crate owns.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProxyStatus {
    Initializing,
    Starting,
    Running,
    Stopped,
    Terminated,
    HostDisconnected,
}

impl ProxyStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProxyStatus::Initializing => "Initializing",
            ProxyStatus::Starting => "Starting",
            ProxyStatus::Running => "Running",
            ProxyStatus::Stopped => "Stopped",
            ProxyStatus::Terminated => "Terminated",
            ProxyStatus::HostDisconnected => "Host Disconnected",
        }
    }

    /// Wire strings from the host process; anything else (the host also
    /// emits free-form diagnostics like "Idle") is unrecognized
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "Initializing" => Some(ProxyStatus::Initializing),
            "Starting" => Some(ProxyStatus::Starting),
            "Running" => Some(ProxyStatus::Running),
            "Stopped" => Some(ProxyStatus::Stopped),
            "Terminated" => Some(ProxyStatus::Terminated),
            "Host Disconnected" => Some(ProxyStatus::HostDisconnected),
            _ => None,
        }
    }

    pub const ALL: [ProxyStatus; 6] = [
        ProxyStatus::Initializing,
        ProxyStatus::Starting,
        ProxyStatus::Running,
        ProxyStatus::Stopped,
        ProxyStatus::Terminated,
        ProxyStatus::HostDisconnected,
    ];
}
