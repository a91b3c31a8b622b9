//! `NetworkClient` backed by a tailscaled LocalAPI.
//!
//! The daemon is reached over its unix socket, or over TCP when the endpoint
//! is written `tcp://<ip>:<port>`. Each call opens one HTTP/1.1 connection
//! and is abandoned after a request timeout.
//!
//! Joining never replaces the daemon's prefs wholesale: the hostname, control
//! URL and want-running bits are sent as masked prefs, then `start` carries
//! only the auth key.

use crate::client::{NetworkClient, StartOptions};
use crate::error::{ClientError, ConfigError};
use crate::tags::TagSet;
use crate::types::{BackendState, PeerInfo, StatusSnapshot};
use async_trait::async_trait;
use hyper::body::Bytes;
use hyper::client::conn::{self, SendRequest};
use hyper::header::{CONTENT_TYPE, HOST};
use hyper::{Body, Method, Request};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpStream;
use tokio::time;
use tracing::trace;

/// How long one LocalAPI round trip may take.
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

const LOCALAPI_HOST: &str = "local-tailscaled.sock";
const STATUS_PATH: &str = "/localapi/v0/status";
const PREFS_PATH: &str = "/localapi/v0/prefs";
const START_PATH: &str = "/localapi/v0/start";
const LOGOUT_PATH: &str = "/localapi/v0/logout";

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum LocalApiEndpoint {
    Unix(PathBuf),
    Tcp(SocketAddr),
}

impl FromStr for LocalApiEndpoint {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.is_empty() {
            return Err(ConfigError::Endpoint(s.to_string()));
        }
        match s.strip_prefix("tcp://") {
            Some(addr) => addr
                .parse()
                .map(LocalApiEndpoint::Tcp)
                .map_err(|_| ConfigError::Endpoint(s.to_string())),
            None => Ok(LocalApiEndpoint::Unix(PathBuf::from(s))),
        }
    }
}

impl fmt::Display for LocalApiEndpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LocalApiEndpoint::Unix(path) => write!(f, "{}", path.display()),
            LocalApiEndpoint::Tcp(addr) => write!(f, "tcp://{}", addr),
        }
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct StatusResponse {
    backend_state: String,
    #[serde(default)]
    peer: Option<HashMap<String, PeerStatus>>,
}

#[derive(Deserialize)]
struct PeerStatus {
    #[serde(rename = "HostName", default)]
    host_name: String,
    #[serde(rename = "TailscaleIPs", default)]
    tailscale_ips: Option<Vec<IpAddr>>,
    #[serde(rename = "Tags", default)]
    tags: Option<Vec<String>>,
    #[serde(rename = "Online", default)]
    online: bool,
}

impl From<StatusResponse> for StatusSnapshot {
    fn from(response: StatusResponse) -> Self {
        // null tags and null peer maps become empty values here, once
        let peers = response
            .peer
            .unwrap_or_default()
            .into_iter()
            .map(|(id, peer)| {
                let mut info = PeerInfo::new(id, peer.host_name)
                    .with_addresses(peer.tailscale_ips.unwrap_or_default())
                    .with_tags(TagSet::from(peer.tags.unwrap_or_default()));
                info.online = peer.online;
                info
            });
        StatusSnapshot::new(BackendState::from(response.backend_state.as_str()), peers)
    }
}

/// Decode a `/localapi/v0/status` body.
pub fn parse_status(body: &[u8]) -> Result<StatusSnapshot, ClientError> {
    let response: StatusResponse = serde_json::from_slice(body)?;
    Ok(response.into())
}

/// `PATCH /localapi/v0/prefs` body. Only fields whose `*Set` flag is true
/// are applied by the daemon; everything else keeps its current value.
#[derive(Serialize)]
#[serde(rename_all = "PascalCase")]
struct MaskedPrefs<'a> {
    #[serde(rename = "ControlURL", skip_serializing_if = "Option::is_none")]
    control_url: Option<&'a str>,
    #[serde(rename = "ControlURLSet")]
    control_url_set: bool,
    hostname: &'a str,
    hostname_set: bool,
    want_running: bool,
    want_running_set: bool,
}

impl<'a> From<&'a StartOptions> for MaskedPrefs<'a> {
    fn from(options: &'a StartOptions) -> Self {
        Self {
            control_url: options.control_url.as_deref(),
            control_url_set: options.control_url.is_some(),
            hostname: &options.hostname,
            hostname_set: true,
            want_running: true,
            want_running_set: true,
        }
    }
}

#[derive(Serialize)]
#[serde(rename_all = "PascalCase")]
struct StartRequest<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    auth_key: Option<&'a str>,
}

impl<'a> From<&'a StartOptions> for StartRequest<'a> {
    fn from(options: &'a StartOptions) -> Self {
        Self {
            auth_key: options.auth_key.as_ref().map(|key| key.expose()),
        }
    }
}

pub struct LocalApiClient {
    endpoint: LocalApiEndpoint,
    request_timeout: Duration,
}

impl LocalApiClient {
    pub fn new(endpoint: LocalApiEndpoint) -> Self {
        Self {
            endpoint,
            request_timeout: REQUEST_TIMEOUT,
        }
    }

    pub fn with_request_timeout(mut self, request_timeout: Duration) -> Self {
        self.request_timeout = request_timeout;
        self
    }

    async fn connect(&self) -> Result<SendRequest<Body>, ClientError> {
        match &self.endpoint {
            LocalApiEndpoint::Tcp(addr) => {
                let stream = TcpStream::connect(addr)
                    .await
                    .map_err(|source| self.connect_error(source))?;
                handshake(stream).await
            }
            #[cfg(unix)]
            LocalApiEndpoint::Unix(path) => {
                let stream = tokio::net::UnixStream::connect(path)
                    .await
                    .map_err(|source| self.connect_error(source))?;
                handshake(stream).await
            }
            #[cfg(not(unix))]
            LocalApiEndpoint::Unix(_) => Err(self.connect_error(std::io::Error::new(
                std::io::ErrorKind::Unsupported,
                "unix sockets are not available on this platform",
            ))),
        }
    }

    fn connect_error(&self, source: std::io::Error) -> ClientError {
        ClientError::Connect {
            endpoint: self.endpoint.to_string(),
            source,
        }
    }

    async fn send(&self, method: Method, path: &str, body: Body) -> Result<Bytes, ClientError> {
        match time::timeout(self.request_timeout, self.round_trip(method, path, body)).await {
            Ok(result) => result,
            Err(_) => Err(ClientError::Timeout {
                path: path.to_string(),
                after: self.request_timeout,
            }),
        }
    }

    async fn round_trip(&self, method: Method, path: &str, body: Body) -> Result<Bytes, ClientError> {
        let mut sender = self.connect().await?;
        trace!(%method, path, "LocalAPI request");

        let request = Request::builder()
            .method(method)
            .uri(path)
            .header(HOST, LOCALAPI_HOST)
            .header("Sec-Tailscale", "localapi")
            .header(CONTENT_TYPE, "application/json")
            .body(body)?;

        let response = sender.send_request(request).await?;
        let status = response.status();
        let bytes = hyper::body::to_bytes(response.into_body()).await?;

        if !status.is_success() {
            return Err(ClientError::Status {
                path: path.to_string(),
                status: status.as_u16(),
                body: String::from_utf8_lossy(&bytes).trim().to_string(),
            });
        }
        Ok(bytes)
    }
}

async fn handshake<S>(io: S) -> Result<SendRequest<Body>, ClientError>
where
    S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
{
    let (sender, connection) = conn::handshake(io).await?;
    tokio::spawn(async move {
        if let Err(e) = connection.await {
            trace!("LocalAPI connection closed: {}", e);
        }
    });
    Ok(sender)
}

#[async_trait]
impl NetworkClient for LocalApiClient {
    async fn start(&self, options: &StartOptions) -> Result<(), ClientError> {
        let prefs = serde_json::to_vec(&MaskedPrefs::from(options))?;
        self.send(Method::PATCH, PREFS_PATH, Body::from(prefs)).await?;

        let body = serde_json::to_vec(&StartRequest::from(options))?;
        self.send(Method::POST, START_PATH, Body::from(body)).await?;
        Ok(())
    }

    async fn status(&self) -> Result<StatusSnapshot, ClientError> {
        let body = self.send(Method::GET, STATUS_PATH, Body::empty()).await?;
        parse_status(&body)
    }

    async fn logout(&self) -> Result<(), ClientError> {
        self.send(Method::POST, LOGOUT_PATH, Body::empty()).await?;
        Ok(())
    }
}
