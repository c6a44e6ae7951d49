//! Data model for accounts, carts and checkout orders
//!
//! Order and cart types are cached snapshots of remote state — the remote
//! service is always authoritative. Wire names follow the storefront's JSON
//! payloads.

use common::Secret;
use serde::{Deserialize, Serialize};

/// Immutable account credential supplied at construction.
#[derive(Debug, Clone)]
pub struct AccountCredential {
    pub email: String,
    pub password: Secret<String>,
}

impl AccountCredential {
    pub fn new(email: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            email: email.into(),
            password: Secret::new(password.into()),
        }
    }
}

/// What a task watches for.
///
/// `Product` is a named extension point: accepted by the control surface
/// but not driven by any run loop yet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskKind {
    Variant,
    Product,
}

/// Server-authoritative order lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderState {
    Cart,
    Address,
    Delivery,
    Payment,
    Complete,
}

impl OrderState {
    /// The non-terminal states an open order can sit in.
    pub const OPEN: [OrderState; 4] = [
        OrderState::Cart,
        OrderState::Address,
        OrderState::Delivery,
        OrderState::Payment,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            OrderState::Cart => "cart",
            OrderState::Address => "address",
            OrderState::Delivery => "delivery",
            OrderState::Payment => "payment",
            OrderState::Complete => "complete",
        }
    }
}

/// Account identity returned by login. `api_token` authenticates the
/// order/checkout API.
#[derive(Debug, Clone, Deserialize)]
pub struct User {
    pub id: u64,
    pub email: String,
    pub api_token: String,
    #[serde(default)]
    pub ship_address_id: Option<u64>,
    #[serde(default)]
    pub bill_address_id: Option<u64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Address {
    pub id: u64,
    pub firstname: String,
    pub lastname: String,
    pub address1: String,
    #[serde(default)]
    pub address2: Option<String>,
    pub city: String,
    pub zipcode: String,
    pub phone: String,
    pub country_id: u64,
}

/// Login response: the user plus whatever addresses are on file.
#[derive(Debug, Clone, Deserialize)]
pub struct LoginSnapshot {
    pub user: User,
    #[serde(rename = "bill_address")]
    pub billing: Option<Address>,
    #[serde(rename = "ship_address")]
    pub shipping: Option<Address>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LineItem {
    pub variant_id: u64,
    pub name: String,
    #[serde(default)]
    pub brand: Option<String>,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub image_url: Option<String>,
    pub quantity: u32,
}

/// The cart's JSON representation.
#[derive(Debug, Clone, Deserialize)]
pub struct CartSnapshot {
    pub item_count: u32,
    pub line_items: Vec<LineItem>,
}

/// What the server-rendered cart page yields: the anti-forgery token plus
/// an emptiness marker (any removable line item means non-empty).
#[derive(Debug, Clone)]
pub struct CartPage {
    pub token: String,
    pub is_empty: bool,
}

/// A checkout order snapshot. Owned by the workflow that adopted it.
#[derive(Debug, Clone, Deserialize)]
pub struct CheckoutOrder {
    pub id: u64,
    pub number: String,
    #[serde(default)]
    pub total: Option<String>,
    #[serde(default)]
    pub currency: Option<String>,
    pub state: OrderState,
    #[serde(default)]
    pub line_items: Vec<LineItem>,
    /// Payment attempts the remote has attached. Orders over the adoption
    /// ceiling are likely flagged and are never adopted.
    #[serde(default)]
    pub payments_count: u32,
}

/// One page of the remote order listing.
#[derive(Debug, Clone, Deserialize)]
pub struct OrderPage {
    pub count: u32,
    #[serde(default)]
    pub current_page: u32,
    #[serde(default)]
    pub pages: u32,
    pub orders: Vec<CheckoutOrder>,
}

/// Reference to the line item an add-to-cart call created.
#[derive(Debug, Clone, Deserialize)]
pub struct CartLineRef {
    pub order_id: u64,
    pub variant_id: u64,
    pub quantity: u32,
}

/// Successful add-to-cart result.
#[derive(Debug, Clone, Deserialize)]
pub struct CartEvent {
    pub line_item: CartLineRef,
    pub cart: CartSnapshot,
}
