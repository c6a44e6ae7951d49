//! Commerce service collaborator contract
//!
//! The workflow depends on this trait, never on concrete endpoints, so the
//! wire surface can be swapped or mocked wholesale. Methods use
//! `Pin<Box<dyn Future>>` return types for dyn-compatibility
//! (`Arc<dyn Storefront>`).
//!
//! The `region` and auth arguments are the workflow's cached session
//! context: the region resolved from the billing country, the anti-forgery
//! token scraped from the cart page, and the API token captured at login.

use std::future::Future;
use std::pin::Pin;

use crate::error::ErrorKind;
use crate::models::{
    AccountCredential, CartEvent, CartPage, CartSnapshot, CheckoutOrder, LoginSnapshot, OrderState,
};

/// Result alias for storefront calls.
pub type ApiResult<T> = std::result::Result<T, ErrorKind>;

/// Boxed future alias for dyn-compatible async trait methods.
pub type ApiFuture<'a, T> = Pin<Box<dyn Future<Output = ApiResult<T>> + Send + 'a>>;

/// Abstraction over the remote commerce service.
///
/// Status mapping contract: a response from a banned egress identity is
/// `ErrorKind::Banned`; operation-specific rejections map to the matching
/// business kind; anything unmapped is `ErrorKind::Status`.
pub trait Storefront: Send + Sync {
    /// Authenticate and capture the account snapshot.
    /// 403 → Banned, 422 → InvalidCredentials.
    fn login<'a>(&'a self, credential: &'a AccountCredential) -> ApiFuture<'a, LoginSnapshot>;

    /// Resolve a billing country id to a storefront region code.
    fn resolve_country<'a>(&'a self, country_id: u64) -> ApiFuture<'a, String>;

    /// Fetch the server-rendered cart page: anti-forgery token + emptiness.
    fn fetch_cart_page<'a>(&'a self, region: &'a str) -> ApiFuture<'a, CartPage>;

    /// Empty the cart. Clearing an already-empty cart succeeds.
    fn clear_cart<'a>(&'a self, region: &'a str, token: &'a str) -> ApiFuture<'a, ()>;

    /// Fetch the cart's JSON snapshot.
    fn fetch_cart<'a>(&'a self, region: &'a str) -> ApiFuture<'a, CartSnapshot>;

    /// List the account's orders in the given lifecycle state.
    fn list_orders<'a>(
        &'a self,
        api_token: &'a str,
        state: OrderState,
    ) -> ApiFuture<'a, Vec<CheckoutOrder>>;

    /// Ask the remote to move an order to the target state.
    fn set_order_state<'a>(
        &'a self,
        api_token: &'a str,
        number: &'a str,
        target: OrderState,
    ) -> ApiFuture<'a, CheckoutOrder>;

    /// Add a variant to the cart. 404 → ProductMissing, 422 → OutOfStock.
    fn add_to_cart<'a>(
        &'a self,
        region: &'a str,
        token: &'a str,
        variant_id: u64,
    ) -> ApiFuture<'a, CartEvent>;

    /// Advance the checkout one step; returns the updated order.
    fn advance_order<'a>(&'a self, api_token: &'a str, number: &'a str)
    -> ApiFuture<'a, CheckoutOrder>;

    /// Request the hosted-payment redirect and capture its target URL
    /// without following it.
    fn payment_redirect<'a>(
        &'a self,
        region: &'a str,
        token: &'a str,
        number: &'a str,
    ) -> ApiFuture<'a, String>;
}
