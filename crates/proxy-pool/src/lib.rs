//! Shared pool of network-egress proxy endpoints
//!
//! Workflows lease endpoints from the pool and report bans back to it. A
//! lease is advisory: nothing stops two workflows from drawing the same
//! endpoint, and a ban only guarantees the endpoint is excluded from every
//! lease issued after the ban lands. Bans are permanent for the life of the
//! process — there is no unban and no cooldown.
//!
//! Endpoint lifecycle:
//! 1. Config lists endpoints as `host:port` or `host:port:user:pass` strings
//! 2. Workflow leases an endpoint → bounded random draw over Free endpoints
//! 3. Remote service rejects traffic from the endpoint → workflow bans it
//! 4. Banned endpoints are skipped by all subsequent draws, process-wide

pub mod endpoint;
pub mod error;
pub mod pool;

pub use endpoint::{EndpointStatus, ProxyCredential, ProxyEndpoint};
pub use error::{Error, Result};
pub use pool::ProxyPool;
