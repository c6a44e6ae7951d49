//! Pool state and bounded-draw endpoint leasing
//!
//! The pool holds per-endpoint status (Free, Banned) keyed by canonical
//! address. Leasing makes a small fixed number of random draws and hands out
//! the first Free endpoint it hits; a miss means the caller proceeds without
//! a fresh endpoint this round. Bans are visible to every workflow as soon
//! as the write lock releases — there is no transactional isolation, and two
//! workflows drawing the same endpoint before one bans it is an accepted
//! race.

use std::collections::HashMap;

use rand::RngExt;
use tokio::sync::RwLock;
use tracing::{info, warn};

use crate::endpoint::{EndpointStatus, ProxyEndpoint};

/// Random draws attempted per lease before giving up.
const LEASE_DRAWS: usize = 5;

/// Shared pool of proxy endpoints with permanent bans.
pub struct ProxyPool {
    endpoints: Vec<ProxyEndpoint>,
    statuses: RwLock<HashMap<String, EndpointStatus>>,
}

impl ProxyPool {
    /// Create a pool from the configured endpoint set. All start Free.
    pub fn new(endpoints: Vec<ProxyEndpoint>) -> Self {
        let statuses: HashMap<String, EndpointStatus> = endpoints
            .iter()
            .map(|e| (e.addr(), EndpointStatus::Free))
            .collect();
        info!(endpoints = endpoints.len(), "proxy pool initialized");
        Self {
            endpoints,
            statuses: RwLock::new(statuses),
        }
    }

    /// Lease an endpoint via bounded random draws.
    ///
    /// Up to `LEASE_DRAWS` draws; the first Free endpoint wins. Returns
    /// `None` when every draw hits a Banned endpoint or the pool is empty.
    /// Deliberately not an exhaustive scan: bans are rare relative to pool
    /// size, and a miss just means the caller keeps its current egress.
    pub async fn lease(&self) -> Option<ProxyEndpoint> {
        let n = self.endpoints.len();
        if n == 0 {
            return None;
        }

        let statuses = self.statuses.read().await;
        let mut rng = rand::rng();
        for _ in 0..LEASE_DRAWS {
            let candidate = &self.endpoints[rng.random_range(0..n)];
            if statuses.get(&candidate.addr()) == Some(&EndpointStatus::Free) {
                return Some(candidate.clone());
            }
        }
        None
    }

    /// Permanently ban an endpoint. Idempotent; there is no unban.
    pub async fn ban(&self, endpoint: &ProxyEndpoint) {
        let addr = endpoint.addr();
        let mut statuses = self.statuses.write().await;
        match statuses.insert(addr.clone(), EndpointStatus::Banned) {
            Some(EndpointStatus::Banned) => {}
            _ => {
                warn!(endpoint = %addr, "endpoint banned");
                metrics::counter!("pool_bans_total").increment(1);
            }
        }
    }

    /// Whether an endpoint has been banned.
    pub async fn is_banned(&self, endpoint: &ProxyEndpoint) -> bool {
        self.statuses.read().await.get(&endpoint.addr()) == Some(&EndpointStatus::Banned)
    }

    /// Number of configured endpoints.
    pub fn len(&self) -> usize {
        self.endpoints.len()
    }

    pub fn is_empty(&self) -> bool {
        self.endpoints.is_empty()
    }

    /// Pool summary for the health endpoint.
    ///
    /// Status mapping: all free → healthy, some free → degraded, none free
    /// → unhealthy.
    pub async fn health(&self) -> serde_json::Value {
        let statuses = self.statuses.read().await;

        let mut entries = Vec::new();
        let mut free_count = 0usize;
        let mut banned_count = 0usize;

        for endpoint in &self.endpoints {
            let addr = endpoint.addr();
            let status = statuses
                .get(&addr)
                .copied()
                .unwrap_or(EndpointStatus::Banned);
            match status {
                EndpointStatus::Free => free_count += 1,
                EndpointStatus::Banned => banned_count += 1,
            }
            entries.push(serde_json::json!({
                "endpoint": addr,
                "status": status.label(),
            }));
        }

        let total = self.endpoints.len();
        let pool_status = if free_count == total && total > 0 {
            "healthy"
        } else if free_count > 0 {
            "degraded"
        } else {
            "unhealthy"
        };

        serde_json::json!({
            "status": pool_status,
            "endpoints_total": total,
            "endpoints_free": free_count,
            "endpoints_banned": banned_count,
            "endpoints": entries,
        })
    }
}
