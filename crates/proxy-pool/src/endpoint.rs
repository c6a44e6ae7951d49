//! Proxy endpoint identity and parsing
//!
//! An endpoint is immutable once created. Its canonical address string
//! (`http://host:port`) is its identity in the pool's status map; the
//! optional credential never participates in identity and never appears in
//! Display output or logs.

use std::fmt;
use std::str::FromStr;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;

use crate::error::Error;

/// Runtime status of a pool endpoint.
///
/// The only transition is Free → Banned. Banned is terminal for the life of
/// the process.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EndpointStatus {
    Free,
    Banned,
}

impl EndpointStatus {
    /// Status label for health/logging.
    pub fn label(&self) -> &'static str {
        match self {
            EndpointStatus::Free => "free",
            EndpointStatus::Banned => "banned",
        }
    }
}

/// Username/password pair for an authenticated proxy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProxyCredential {
    pub username: String,
    pub password: String,
}

impl ProxyCredential {
    /// `Proxy-Authorization` header value: `Basic base64(user:pass)`.
    pub fn authorization(&self) -> String {
        let encoded = STANDARD.encode(format!("{}:{}", self.username, self.password));
        format!("Basic {encoded}")
    }
}

/// A single network-egress identity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProxyEndpoint {
    host: String,
    port: u16,
    credential: Option<ProxyCredential>,
}

impl ProxyEndpoint {
    pub fn new(host: impl Into<String>, port: u16, credential: Option<ProxyCredential>) -> Self {
        Self {
            host: host.into(),
            port,
            credential,
        }
    }

    /// Canonical address string — the endpoint's identity in the pool.
    pub fn addr(&self) -> String {
        format!("http://{}:{}", self.host, self.port)
    }

    pub fn credential(&self) -> Option<&ProxyCredential> {
        self.credential.as_ref()
    }
}

impl fmt::Display for ProxyEndpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.addr())
    }
}

impl FromStr for ProxyEndpoint {
    type Err = Error;

    /// Parse `host:port` or `host:port:username:password`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parts: Vec<&str> = s.split(':').collect();
        let (host, port_str, credential) = match parts.as_slice() {
            [host, port] => (*host, *port, None),
            [host, port, username, password] => (
                *host,
                *port,
                Some(ProxyCredential {
                    username: (*username).to_string(),
                    password: (*password).to_string(),
                }),
            ),
            _ => return Err(Error::InvalidEndpoint(s.to_string())),
        };

        if host.is_empty() {
            return Err(Error::InvalidEndpoint(s.to_string()));
        }

        let port = port_str
            .parse::<u16>()
            .map_err(|_| Error::InvalidEndpoint(s.to_string()))?;

        Ok(ProxyEndpoint::new(host, port, credential))
    }
}
