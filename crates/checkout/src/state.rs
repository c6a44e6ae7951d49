//! Workflow progress marker
//!
//! Linear progression with two bounded-retry re-entry points: the whole
//! setup sequence restarts from `Idle` after a ban rotation, and the run
//! phase re-enters `AttemptingAddToCart` on every watch round.

use std::fmt;

/// Internal progress marker for one workflow. Monotonic during a
/// successful pass; only ever restarts from `Idle`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkflowState {
    Idle,
    AttemptingLogin,
    LoggedIn,
    ResolvingRegion,
    ObtainedRegion,
    AttemptingAntiForgeryToken,
    ObtainedToken,
    AttemptingClearCart,
    ClearedCart,
    AttemptingResolveOrder,
    ObtainedOrder,
    AttemptingAddToCart,
    ItemCarted,
    AttemptingAdvance,
    Advanced,
    AttemptingPaymentLink,
    ObtainedPaymentLink,
}

impl fmt::Display for WorkflowState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{self:?}")
    }
}
