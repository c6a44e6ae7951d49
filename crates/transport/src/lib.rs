//! Challenge-aware HTTP session layer
//!
//! One `TransportSession` per workflow: a cookie jar shared by two reqwest
//! clients (one follows redirects, one never does), an optional egress proxy
//! that can be swapped at runtime, and transparent handling of the remote
//! anti-automation challenge — detect it on the response, hand the body to
//! the configured solver, install the derived cookies, and re-issue the
//! identical request inside an explicit bounded loop.

pub mod challenge;
pub mod error;
pub mod request;
pub mod session;

pub use challenge::{ChallengeSolver, NoopSolver};
pub use error::{Error, Result};
pub use request::{RequestSpec, TransportResponse};
pub use session::{SessionConfig, TransportSession};
