//! Shared test doubles for workflow and supervisor tests
//!
//! `MockStorefront` is closure-per-endpoint: tests start from `happy()` and
//! override only the calls they care about, capturing counters or flags in
//! the closures. Every trait call is also recorded by name so tests can
//! assert on call counts.

use std::sync::Mutex;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;

use crate::models::{
    AccountCredential, Address, CartEvent, CartLineRef, CartPage, CartSnapshot, CheckoutOrder,
    LineItem, LoginSnapshot, OrderState, TaskKind, User,
};
use crate::notify::{CheckoutNotice, Notifier};
use crate::storefront::{ApiFuture, ApiResult, Storefront};
use crate::watch::WatchSet;
use crate::workflow::{CheckoutWorkflow, Collaborators, WorkflowLimits};

use proxy_pool::{ProxyEndpoint, ProxyPool};
use transport::{NoopSolver, SessionConfig, TransportSession};

type Stub<A, T> = Box<dyn Fn(A) -> ApiResult<T> + Send + Sync>;

pub(crate) struct MockStorefront {
    calls: Mutex<Vec<&'static str>>,
    pub login: Stub<(), LoginSnapshot>,
    pub resolve_country: Stub<u64, String>,
    pub cart_page: Stub<(), CartPage>,
    pub clear_cart: Stub<(), ()>,
    pub fetch_cart: Stub<(), CartSnapshot>,
    pub list_orders: Stub<OrderState, Vec<CheckoutOrder>>,
    pub set_order_state: Stub<(String, OrderState), CheckoutOrder>,
    pub add_to_cart: Stub<u64, CartEvent>,
    pub advance_order: Stub<String, CheckoutOrder>,
    pub payment_redirect: Stub<String, String>,
}

impl MockStorefront {
    /// A storefront where everything works: one Cart order (id 42) is open,
    /// the cart is empty, and every carted variant lands on order 42.
    pub fn happy() -> Self {
        Self {
            calls: Mutex::new(Vec::new()),
            login: Box::new(|()| Ok(snapshot())),
            resolve_country: Box::new(|_| Ok("GB".into())),
            cart_page: Box::new(|()| {
                Ok(CartPage {
                    token: "tok-csrf".into(),
                    is_empty: true,
                })
            }),
            clear_cart: Box::new(|()| Ok(())),
            fetch_cart: Box::new(|()| {
                Ok(CartSnapshot {
                    item_count: 0,
                    line_items: vec![],
                })
            }),
            list_orders: Box::new(|state| {
                if state == OrderState::Cart {
                    Ok(vec![order(42, OrderState::Cart, 0)])
                } else {
                    Ok(vec![])
                }
            }),
            set_order_state: Box::new(|(_, target)| Ok(order(42, target, 0))),
            add_to_cart: Box::new(|variant_id| Ok(event(42, variant_id))),
            advance_order: Box::new(|_| Ok(order(42, OrderState::Payment, 0))),
            payment_redirect: Box::new(|_| Ok("https://pay.example/x".into())),
        }
    }

    fn record(&self, name: &'static str) {
        self.calls.lock().unwrap().push(name);
    }

    pub fn call_count(&self, name: &str) -> usize {
        self.calls.lock().unwrap().iter().filter(|c| **c == name).count()
    }
}

impl Storefront for MockStorefront {
    fn login<'a>(&'a self, _credential: &'a AccountCredential) -> ApiFuture<'a, LoginSnapshot> {
        self.record("login");
        let result = (self.login)(());
        Box::pin(async move { result })
    }

    fn resolve_country<'a>(&'a self, country_id: u64) -> ApiFuture<'a, String> {
        self.record("resolve_country");
        let result = (self.resolve_country)(country_id);
        Box::pin(async move { result })
    }

    fn fetch_cart_page<'a>(&'a self, _region: &'a str) -> ApiFuture<'a, CartPage> {
        self.record("fetch_cart_page");
        let result = (self.cart_page)(());
        Box::pin(async move { result })
    }

    fn clear_cart<'a>(&'a self, _region: &'a str, _token: &'a str) -> ApiFuture<'a, ()> {
        self.record("clear_cart");
        let result = (self.clear_cart)(());
        Box::pin(async move { result })
    }

    fn fetch_cart<'a>(&'a self, _region: &'a str) -> ApiFuture<'a, CartSnapshot> {
        self.record("fetch_cart");
        let result = (self.fetch_cart)(());
        Box::pin(async move { result })
    }

    fn list_orders<'a>(
        &'a self,
        _api_token: &'a str,
        state: OrderState,
    ) -> ApiFuture<'a, Vec<CheckoutOrder>> {
        self.record("list_orders");
        let result = (self.list_orders)(state);
        Box::pin(async move { result })
    }

    fn set_order_state<'a>(
        &'a self,
        _api_token: &'a str,
        number: &'a str,
        target: OrderState,
    ) -> ApiFuture<'a, CheckoutOrder> {
        self.record("set_order_state");
        let result = (self.set_order_state)((number.to_string(), target));
        Box::pin(async move { result })
    }

    fn add_to_cart<'a>(
        &'a self,
        _region: &'a str,
        _token: &'a str,
        variant_id: u64,
    ) -> ApiFuture<'a, CartEvent> {
        self.record("add_to_cart");
        let result = (self.add_to_cart)(variant_id);
        Box::pin(async move { result })
    }

    fn advance_order<'a>(
        &'a self,
        _api_token: &'a str,
        number: &'a str,
    ) -> ApiFuture<'a, CheckoutOrder> {
        self.record("advance_order");
        let result = (self.advance_order)(number.to_string());
        Box::pin(async move { result })
    }

    fn payment_redirect<'a>(
        &'a self,
        _region: &'a str,
        _token: &'a str,
        number: &'a str,
    ) -> ApiFuture<'a, String> {
        self.record("payment_redirect");
        let result = (self.payment_redirect)(number.to_string());
        Box::pin(async move { result })
    }
}

/// Notifier that records every notice.
#[derive(Default)]
pub(crate) struct RecordingNotifier {
    pub notices: Mutex<Vec<CheckoutNotice>>,
}

impl Notifier for RecordingNotifier {
    fn notify<'a>(
        &'a self,
        notice: &'a CheckoutNotice,
    ) -> std::pin::Pin<Box<dyn std::future::Future<Output = ()> + Send + 'a>> {
        Box::pin(async move {
            self.notices.lock().unwrap().push(notice.clone());
        })
    }
}

pub(crate) fn snapshot() -> LoginSnapshot {
    LoginSnapshot {
        user: User {
            id: 9,
            email: "user@example.net".into(),
            api_token: "tok-api".into(),
            ship_address_id: Some(1),
            bill_address_id: Some(2),
        },
        billing: Some(address(2, 77)),
        shipping: Some(address(1, 77)),
    }
}

pub(crate) fn address(id: u64, country_id: u64) -> Address {
    Address {
        id,
        firstname: "Jo".into(),
        lastname: "Bloggs".into(),
        address1: "1 High Street".into(),
        address2: None,
        city: "London".into(),
        zipcode: "E1 6AN".into(),
        phone: "07000000000".into(),
        country_id,
    }
}

pub(crate) fn order(id: u64, state: OrderState, payments_count: u32) -> CheckoutOrder {
    CheckoutOrder {
        id,
        number: format!("R{id}"),
        total: Some("420.00".into()),
        currency: Some("GBP".into()),
        state,
        line_items: vec![],
        payments_count,
    }
}

pub(crate) fn event(order_id: u64, variant_id: u64) -> CartEvent {
    CartEvent {
        line_item: CartLineRef {
            order_id,
            variant_id,
            quantity: 1,
        },
        cart: CartSnapshot {
            item_count: 1,
            line_items: vec![LineItem {
                variant_id,
                name: "Arrow Low-Top".into(),
                brand: Some("SLATE".into()),
                url: None,
                image_url: None,
                quantity: 1,
            }],
        },
    }
}

pub(crate) struct Harness {
    pub collab: Collaborators,
    pub pool: Arc<ProxyPool>,
    pub notifier: Arc<RecordingNotifier>,
    pub watch: Arc<WatchSet>,
    pub stop: Arc<AtomicBool>,
}

/// Real pool + real session (never used for I/O here) around a mock
/// storefront.
pub(crate) fn harness(api: Arc<dyn Storefront>) -> Harness {
    let endpoints: Vec<ProxyEndpoint> = (0..3u16)
        .map(|i| ProxyEndpoint::new(format!("10.0.0.{i}"), 8000 + i, None))
        .collect();
    let pool = Arc::new(ProxyPool::new(endpoints));
    let session = Arc::new(
        TransportSession::new(SessionConfig::default(), Arc::new(NoopSolver))
            .expect("session build"),
    );
    let notifier = Arc::new(RecordingNotifier::default());
    Harness {
        collab: Collaborators {
            session,
            pool: pool.clone(),
            storefront: api,
            notifier: notifier.clone(),
        },
        pool,
        notifier,
        watch: Arc::new(WatchSet::new()),
        stop: Arc::new(AtomicBool::new(false)),
    }
}

pub(crate) fn credential() -> AccountCredential {
    AccountCredential::new("user@example.net", "pw")
}

/// A workflow wired to the given storefront with default limits.
pub(crate) fn build_workflow(kind: TaskKind, api: Arc<dyn Storefront>) -> (CheckoutWorkflow, Harness) {
    let h = harness(api);
    let wf = CheckoutWorkflow::new(
        kind,
        credential(),
        h.collab.clone(),
        h.watch.clone(),
        h.stop.clone(),
        WorkflowLimits::default(),
    );
    (wf, h)
}
