//! Outbound notification boundary
//!
//! Fired once per captured payment link. Delivery is best-effort: a
//! notifier may retry internally but never surfaces an error into the
//! workflow.

use std::future::Future;
use std::pin::Pin;

use tracing::info;

use crate::models::LineItem;

/// A captured payment link ready for a human to complete.
#[derive(Debug, Clone)]
pub struct CheckoutNotice {
    pub payment_url: String,
    pub account_email: String,
    /// Top line item of the carted order, when known.
    pub item: Option<LineItem>,
}

/// Outbound notification channel.
pub trait Notifier: Send + Sync {
    fn notify<'a>(&'a self, notice: &'a CheckoutNotice) -> Pin<Box<dyn Future<Output = ()> + Send + 'a>>;
}

/// Notifier that only logs. Used when no webhook is configured.
pub struct NullNotifier;

impl Notifier for NullNotifier {
    fn notify<'a>(&'a self, notice: &'a CheckoutNotice) -> Pin<Box<dyn Future<Output = ()> + Send + 'a>> {
        Box::pin(async move {
            info!(
                account = %notice.account_email,
                payment_url = %notice.payment_url,
                "payment link captured (no webhook configured)"
            );
        })
    }
}
