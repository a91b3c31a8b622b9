//! Node configuration from an env file and the process environment.
//!
//! # Environment Variables
//!
//! - `TS_AUTHKEY`: auth key used to join the tailnet (optional)
//! - `TS_CONTROL_URL`: control server URL (optional, daemon default otherwise)
//! - `TS_SOCKET`: LocalAPI endpoint of the tailscaled that tsls drives (required
//!   unless `--socket` is given). There is no default; the daemon behind the
//!   endpoint gets its hostname and control URL set.
//!
//! Variables already set in the process environment win over the env file.

use crate::client::StartOptions;
use crate::error::ConfigError;
use crate::localapi::LocalApiEndpoint;
use regex::Regex;
use std::collections::HashMap;
use std::fmt;
use std::fs;
use std::path::Path;
use std::sync::OnceLock;

pub const AUTH_KEY_VAR: &str = "TS_AUTHKEY";
pub const CONTROL_URL_VAR: &str = "TS_CONTROL_URL";
pub const SOCKET_VAR: &str = "TS_SOCKET";

const VISIBLE_KEY_PREFIX: usize = 8;

/// Auth key that never prints in full.
#[derive(Clone, PartialEq, Eq)]
pub struct AuthKey(String);

impl AuthKey {
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    /// The full key, for handing to the daemon only.
    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for AuthKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // a key no longer than the prefix would be shown whole
        if self.0.chars().count() <= VISIBLE_KEY_PREFIX {
            return f.write_str("...");
        }
        let prefix: String = self.0.chars().take(VISIBLE_KEY_PREFIX).collect();
        write!(f, "{}...", prefix)
    }
}

impl fmt::Debug for AuthKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "AuthKey({})", self)
    }
}

fn line_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"^\s*(?:export\s+)?([A-Za-z_][A-Za-z0-9_.]*)\s*=\s*(.*?)\s*$")
            .expect("env line pattern is valid")
    })
}

/// Variables read from a dotenv-style file.
#[derive(Clone, Debug, Default)]
pub struct EnvFile {
    vars: HashMap<String, String>,
}

impl EnvFile {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let contents = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse(&contents).map_err(|line| ConfigError::Parse {
            path: path.to_path_buf(),
            line,
        })
    }

    /// Parse `KEY=VALUE` lines. On failure returns the 1-based line number.
    pub fn parse(contents: &str) -> Result<Self, usize> {
        let mut vars = HashMap::new();
        for (index, line) in contents.lines().enumerate() {
            let trimmed = line.trim();
            if trimmed.is_empty() || trimmed.starts_with('#') {
                continue;
            }
            let captures = line_pattern().captures(line).ok_or(index + 1)?;
            let value = unquote(&captures[2]).ok_or(index + 1)?;
            vars.insert(captures[1].to_string(), value);
        }
        Ok(Self { vars })
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.vars.get(key).map(String::as_str)
    }
}

fn unquote(raw: &str) -> Option<String> {
    for quote in ['"', '\''] {
        if let Some(rest) = raw.strip_prefix(quote) {
            let end = rest.find(quote)?;
            let trailing = rest[end + 1..].trim_start();
            if !trailing.is_empty() && !trailing.starts_with('#') {
                return None;
            }
            let inner = &rest[..end];
            return Some(if quote == '"' {
                inner.replace("\\n", "\n")
            } else {
                inner.to_string()
            });
        }
    }
    let value = match raw.find(" #") {
        Some(comment) => &raw[..comment],
        None => raw,
    };
    Some(value.trim_end().to_string())
}

#[derive(Clone, Debug)]
pub struct NodeConfig {
    pub hostname: String,
    pub auth_key: Option<AuthKey>,
    pub control_url: Option<String>,
    pub endpoint: LocalApiEndpoint,
    pub ephemeral: bool,
}

impl NodeConfig {
    /// Resolve settings, asking `lookup` (the process environment in
    /// production) before falling back to `file`. `socket` comes from the
    /// command line and overrides both.
    pub fn resolve(
        file: &EnvFile,
        lookup: impl Fn(&str) -> Option<String>,
        hostname: &str,
        socket: Option<&str>,
        ephemeral: bool,
    ) -> Result<Self, ConfigError> {
        let var = |key: &str| {
            lookup(key)
                .or_else(|| file.get(key).map(str::to_string))
                .filter(|value| !value.is_empty())
        };

        let endpoint = match socket {
            Some(socket) => socket.to_string(),
            None => var(SOCKET_VAR).ok_or(ConfigError::MissingEndpoint)?,
        };

        Ok(Self {
            hostname: hostname.to_string(),
            auth_key: var(AUTH_KEY_VAR).map(AuthKey::new),
            control_url: var(CONTROL_URL_VAR),
            endpoint: endpoint.parse()?,
            ephemeral,
        })
    }

    pub fn start_options(&self) -> StartOptions {
        StartOptions {
            hostname: self.hostname.clone(),
            auth_key: self.auth_key.clone(),
            control_url: self.control_url.clone(),
            ephemeral: self.ephemeral,
        }
    }
}
