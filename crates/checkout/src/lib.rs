//! Checkout orchestration core
//!
//! Drives multi-step checkout transactions against a remote commerce
//! service that rate-limits and challenges automated clients. Each account
//! gets a `CheckoutWorkflow` — a linear state machine covering login,
//! region resolution, anti-forgery token capture, cart hygiene and order
//! adoption (setup), then variant watching through to a captured payment
//! link (run). The `Supervisor` owns the live workflows and fans bulk
//! control commands out across them as tracked background jobs.
//!
//! The remote service's wire surface sits behind the `Storefront` trait;
//! `RestStorefront` is the production implementation over a
//! `TransportSession`. Outbound notifications sit behind `Notifier`.

pub mod control;
pub mod error;
pub mod markup;
pub mod models;
pub mod notify;
pub mod rest;
pub mod state;
pub mod storefront;
pub mod supervisor;
pub mod watch;
pub mod workflow;

#[cfg(test)]
pub(crate) mod testutil;

pub use control::{Message, MessageKind, Response, ResponseKind};
pub use error::{ErrorKind, ErrorState};
pub use models::{
    AccountCredential, Address, CartEvent, CartPage, CartSnapshot, CheckoutOrder, LineItem,
    LoginSnapshot, OrderState, TaskKind, User,
};
pub use notify::{CheckoutNotice, Notifier, NullNotifier};
pub use state::WorkflowState;
pub use storefront::{ApiResult, Storefront};
pub use supervisor::Supervisor;
pub use watch::WatchSet;
pub use workflow::{CheckoutWorkflow, Collaborators, WorkflowLimits};

pub use rest::RestStorefront;
