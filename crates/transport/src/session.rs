//! Session execution with transparent challenge retry
//!
//! Two clients share one cookie jar so a clearance cookie earned on any call
//! benefits every later call, redirect-following or not. Rotating the proxy
//! rebuilds both clients but keeps the jar, mirroring how a real browser
//! keeps its cookies across a network change.

use std::sync::Arc;
use std::time::Duration;

use reqwest::cookie::Jar;
use reqwest::header::HeaderValue;
use reqwest::{Client, Url};
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use proxy_pool::ProxyEndpoint;

use crate::challenge::ChallengeSolver;
use crate::error::{Error, Result};
use crate::request::{RequestSpec, TransportResponse};

/// Challenge rounds absorbed per logical request before giving up. The
/// original naive behavior was unbounded recursion on a persistently
/// challenging endpoint; this is an explicit loop with a hard ceiling.
const MAX_CHALLENGE_SOLVES: usize = 3;

/// Pause between installing solved cookies and re-issuing the request.
const CHALLENGE_RETRY_DELAY: Duration = Duration::from_millis(250);

/// Session tunables supplied by the service config.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub user_agent: String,
    /// Substring of the `Server` response header that identifies the
    /// anti-automation vendor.
    pub challenge_marker: String,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            user_agent: concat!(
                "Mozilla/5.0 (iPhone; CPU iPhone OS 13_3 like Mac OS X) ",
                "AppleWebKit/605.1.15 (KHTML, like Gecko) Version/13.0.4 Mobile/15E148 Safari/604.1",
            )
            .to_string(),
            challenge_marker: "Variti".to_string(),
        }
    }
}

struct ClientPair {
    follow: Client,
    direct: Client,
}

/// One workflow's HTTP identity: cookie jar, user agent, egress proxy.
pub struct TransportSession {
    jar: Arc<Jar>,
    solver: Arc<dyn ChallengeSolver>,
    config: SessionConfig,
    clients: RwLock<ClientPair>,
}

impl TransportSession {
    pub fn new(config: SessionConfig, solver: Arc<dyn ChallengeSolver>) -> Result<Self> {
        let jar = Arc::new(Jar::default());
        let clients = build_clients(&config, &jar, None)?;
        Ok(Self {
            jar,
            solver,
            config,
            clients: RwLock::new(clients),
        })
    }

    /// Point the session at a new egress proxy. The cookie jar survives.
    pub async fn set_proxy(&self, endpoint: &ProxyEndpoint) -> Result<()> {
        let rebuilt = build_clients(&self.config, &self.jar, Some(endpoint))?;
        *self.clients.write().await = rebuilt;
        info!(proxy = %endpoint, "session proxy set");
        Ok(())
    }

    /// Execute one logical request.
    ///
    /// `follow_redirects: false` routes through the non-following client so
    /// the caller can capture a `Location` header instead of chasing it.
    ///
    /// A response whose `Server` header carries the challenge marker is fed
    /// to the solver; returned cookies are installed for the request's
    /// domain and the identical request is re-issued after a short pause, at
    /// most `MAX_CHALLENGE_SOLVES` times.
    pub async fn execute(
        &self,
        spec: &RequestSpec,
        follow_redirects: bool,
    ) -> Result<TransportResponse> {
        let url = Url::parse(&spec.url).map_err(|e| Error::InvalidUrl(e.to_string()))?;

        for attempt in 0..=MAX_CHALLENGE_SOLVES {
            let client = {
                let pair = self.clients.read().await;
                if follow_redirects {
                    pair.follow.clone()
                } else {
                    pair.direct.clone()
                }
            };

            let mut builder = client.request(spec.method.clone(), url.clone());
            for (name, value) in &spec.headers {
                builder = builder.header(name, value);
            }
            if let Some(body) = &spec.json {
                builder = builder.json(body);
            }

            let response = builder.send().await?;
            let status = response.status().as_u16();
            let headers = response.headers().clone();
            let body = response.text().await?;

            if !self.is_challenge(&headers, &body) {
                return Ok(TransportResponse {
                    status,
                    headers,
                    body,
                });
            }

            if attempt == MAX_CHALLENGE_SOLVES {
                break;
            }

            warn!(url = %spec.url, attempt, "challenge detected");
            let cookies = self.solver.solve(&body);
            if cookies.is_empty() {
                debug!(url = %spec.url, "solver produced no cookies");
            } else {
                for (name, value) in &cookies {
                    self.jar
                        .add_cookie_str(&format!("{name}={value}; Path=/"), &url);
                }
                info!(url = %spec.url, cookies = cookies.len(), "challenge cookies installed");
            }

            tokio::time::sleep(CHALLENGE_RETRY_DELAY).await;
        }

        Err(Error::ChallengeUnsolved {
            attempts: MAX_CHALLENGE_SOLVES,
        })
    }

    fn is_challenge(&self, headers: &reqwest::header::HeaderMap, body: &str) -> bool {
        let from_vendor = headers
            .get(reqwest::header::SERVER)
            .and_then(|v| v.to_str().ok())
            .is_some_and(|server| server.contains(&self.config.challenge_marker));
        from_vendor && !body.is_empty()
    }
}

fn build_clients(
    config: &SessionConfig,
    jar: &Arc<Jar>,
    proxy: Option<&ProxyEndpoint>,
) -> Result<ClientPair> {
    let follow = client_builder(config, jar, proxy, true)?;
    let direct = client_builder(config, jar, proxy, false)?;
    Ok(ClientPair { follow, direct })
}

fn client_builder(
    config: &SessionConfig,
    jar: &Arc<Jar>,
    proxy: Option<&ProxyEndpoint>,
    follow_redirects: bool,
) -> Result<Client> {
    let policy = if follow_redirects {
        reqwest::redirect::Policy::limited(10)
    } else {
        reqwest::redirect::Policy::none()
    };

    let mut builder = Client::builder()
        .user_agent(&config.user_agent)
        .cookie_provider(jar.clone())
        .redirect(policy);

    if let Some(endpoint) = proxy {
        let mut p = reqwest::Proxy::all(endpoint.addr()).map_err(Error::Client)?;
        if let Some(credential) = endpoint.credential() {
            let value = HeaderValue::from_str(&credential.authorization())
                .map_err(|e| Error::InvalidUrl(e.to_string()))?;
            p = p.custom_http_auth(value);
        }
        builder = builder.proxy(p);
    }

    builder.build().map_err(Error::Client)
}
