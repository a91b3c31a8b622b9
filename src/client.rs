use crate::config::AuthKey;
use crate::error::ClientError;
use crate::types::StatusSnapshot;
use async_trait::async_trait;

/// What the node presents to the control plane when it joins.
#[derive(Clone, Debug)]
pub struct StartOptions {
    pub hostname: String,
    pub auth_key: Option<AuthKey>,
    pub control_url: Option<String>,
    /// Log the node out again once the run is over.
    pub ephemeral: bool,
}

/// The overlay network node this tool drives.
#[async_trait]
pub trait NetworkClient: Send + Sync {
    /// Join the network.
    async fn start(&self, options: &StartOptions) -> Result<(), ClientError>;

    /// Fetch a fresh status snapshot.
    async fn status(&self) -> Result<StatusSnapshot, ClientError>;

    /// Leave the network, removing the node from the control plane.
    async fn logout(&self) -> Result<(), ClientError>;
}
