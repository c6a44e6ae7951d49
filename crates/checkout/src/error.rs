//! Workflow error taxonomy
//!
//! `Banned` is the only kind that triggers automatic recovery (endpoint ban,
//! lease rotation, bounded setup restart). Every other kind propagates
//! immediately, paired with the state the workflow had reached.

use crate::state::WorkflowState;

/// Classified failure from a storefront call or workflow step.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ErrorKind {
    #[error("network failure: {0}")]
    Transport(String),

    #[error("egress identity banned by remote")]
    Banned,

    #[error("invalid account credentials")]
    InvalidCredentials,

    #[error("response decode failed: {0}")]
    Decode(String),

    #[error("anti-forgery token missing from cart page")]
    MissingToken,

    #[error("variant out of stock")]
    OutOfStock,

    #[error("product not found")]
    ProductMissing,

    #[error("cart is not empty")]
    CartNotEmpty,

    #[error("order state does not permit this operation")]
    InvalidOrderState,

    #[error("account has no billing address on file")]
    NoAddress,

    #[error("country does not resolve to a storefront region")]
    CountryNotResolvable,

    #[error("no open order found")]
    NoOrder,

    #[error("malformed api response")]
    InvalidApiResponse,

    #[error("operation not supported for this task kind")]
    Unsupported,

    #[error("unmapped status code {0}")]
    Status(u16),
}

impl From<transport::Error> for ErrorKind {
    fn from(err: transport::Error) -> Self {
        ErrorKind::Transport(err.to_string())
    }
}

/// An error kind paired with the workflow state it occurred in — the unit
/// of failure reporting to the supervisor.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{kind} (state: {state})")]
pub struct ErrorState {
    pub kind: ErrorKind,
    pub state: WorkflowState,
}

impl ErrorState {
    pub fn new(kind: ErrorKind, state: WorkflowState) -> Self {
        Self { kind, state }
    }
}
