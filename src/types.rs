use crate::tags::TagSet;
use std::collections::HashMap;
use std::fmt;
use std::net::IpAddr;

/// Backend state reported by the node's daemon.
///
/// Only `Running` means the node is connected and the peer list is valid;
/// every other value is "not ready yet".
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum BackendState {
    NoState,
    NeedsLogin,
    NeedsMachineAuth,
    Stopped,
    Starting,
    Running,
    Other(String),
}

impl BackendState {
    pub fn is_running(&self) -> bool {
        matches!(self, BackendState::Running)
    }

    /// The node already holds a login and is up or coming up.
    pub fn is_logged_in(&self) -> bool {
        matches!(self, BackendState::Running | BackendState::Starting)
    }
}

impl From<&str> for BackendState {
    fn from(value: &str) -> Self {
        match value {
            "NoState" => BackendState::NoState,
            "NeedsLogin" => BackendState::NeedsLogin,
            "NeedsMachineAuth" => BackendState::NeedsMachineAuth,
            "Stopped" => BackendState::Stopped,
            "Starting" => BackendState::Starting,
            "Running" => BackendState::Running,
            other => BackendState::Other(other.to_string()),
        }
    }
}

impl fmt::Display for BackendState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            BackendState::NoState => "NoState",
            BackendState::NeedsLogin => "NeedsLogin",
            BackendState::NeedsMachineAuth => "NeedsMachineAuth",
            BackendState::Stopped => "Stopped",
            BackendState::Starting => "Starting",
            BackendState::Running => "Running",
            BackendState::Other(other) => other,
        };
        f.write_str(name)
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct PeerInfo {
    pub id: String,
    pub hostname: String,
    pub addresses: Vec<IpAddr>,
    pub tags: TagSet,
    pub online: bool,
}

impl PeerInfo {
    pub fn new(id: impl Into<String>, hostname: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            hostname: hostname.into(),
            addresses: Vec::new(),
            tags: TagSet::new(),
            online: false,
        }
    }

    pub fn with_addresses(mut self, addresses: impl IntoIterator<Item = IpAddr>) -> Self {
        self.addresses = addresses.into_iter().collect();
        self
    }

    pub fn with_tags(mut self, tags: TagSet) -> Self {
        self.tags = tags;
        self
    }
}

/// Point-in-time view of the backend, fetched fresh on every poll.
#[derive(Clone, Debug)]
pub struct StatusSnapshot {
    pub backend_state: BackendState,
    /// Keyed by peer identifier. Iteration order is unspecified.
    pub peers: HashMap<String, PeerInfo>,
}

impl StatusSnapshot {
    pub fn new(backend_state: BackendState, peers: impl IntoIterator<Item = PeerInfo>) -> Self {
        Self {
            backend_state,
            peers: peers.into_iter().map(|peer| (peer.id.clone(), peer)).collect(),
        }
    }
}
