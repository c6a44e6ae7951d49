//! Challenge solver boundary
//!
//! The remote service occasionally answers a request with a verification
//! page instead of the requested content. Deriving the cookies that pass the
//! gate is vendor-specific and lives behind this trait; the session only
//! knows how to detect the page, install whatever cookies the solver
//! returns, and re-issue the request.

/// Derives clearance cookies from a challenge page body.
///
/// Returns name/value pairs to install into the session's cookie jar. An
/// empty vec means the solve failed — the session still re-issues the
/// request, which then fails the normal way.
pub trait ChallengeSolver: Send + Sync {
    fn solve(&self, body: &str) -> Vec<(String, String)>;
}

/// Solver that never produces cookies.
///
/// Used when no vendor solver is wired in; challenged requests surface as
/// `Error::ChallengeUnsolved` once the retry bound is hit.
pub struct NoopSolver;

impl ChallengeSolver for NoopSolver {
    fn solve(&self, _body: &str) -> Vec<(String, String)> {
        Vec::new()
    }
}
