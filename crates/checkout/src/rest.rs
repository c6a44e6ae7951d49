//! REST storefront client
//!
//! Production `Storefront` implementation over a `TransportSession`. Page
//! endpoints live under `{base}/{locale}/{region}`; the order/checkout API
//! lives under `{base}/api` and authenticates with the per-account API
//! token. Login runs against the configured default region — the real
//! region isn't known until the billing address has been seen.

use std::sync::Arc;

use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::json;

use transport::{RequestSpec, TransportResponse, TransportSession};

use crate::error::ErrorKind;
use crate::markup;
use crate::models::{
    AccountCredential, CartEvent, CartPage, CartSnapshot, CheckoutOrder, LoginSnapshot, OrderPage,
    OrderState,
};
use crate::storefront::{ApiFuture, ApiResult, Storefront};

#[derive(Debug, Clone, Deserialize)]
struct Country {
    iso: String,
}

/// HTTP-backed storefront.
pub struct RestStorefront {
    session: Arc<TransportSession>,
    base_url: String,
    locale: String,
    login_region: String,
}

impl RestStorefront {
    pub fn new(
        session: Arc<TransportSession>,
        base_url: impl Into<String>,
        locale: impl Into<String>,
        login_region: impl Into<String>,
    ) -> Self {
        Self {
            session,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            locale: locale.into(),
            login_region: login_region.into(),
        }
    }

    fn page_url(&self, region: &str, path: &str) -> String {
        format!("{}/{}/{}{}", self.base_url, self.locale, region, path)
    }

    fn api_url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn login_inner(&self, credential: &AccountCredential) -> ApiResult<LoginSnapshot> {
        let spec = RequestSpec::post(self.page_url(&self.login_region, "/login"))
            .header("Accept", "application/json")
            .json(json!({
                "spree_user": {
                    "email": credential.email,
                    "password": credential.password.expose(),
                    "remember_me": 1,
                }
            }));

        let resp = self.session.execute(&spec, true).await?;
        match resp.status {
            200 => decode(&resp),
            403 => Err(ErrorKind::Banned),
            422 => Err(ErrorKind::InvalidCredentials),
            s => Err(ErrorKind::Status(s)),
        }
    }

    async fn resolve_country_inner(&self, country_id: u64) -> ApiResult<String> {
        let spec = RequestSpec::get(self.api_url(&format!("/api/countries/{country_id}")))
            .header("Accept", "application/json");

        let resp = self.session.execute(&spec, true).await?;
        match resp.status {
            200 => {
                let country: Country = decode(&resp)?;
                if country.iso.is_empty() {
                    Err(ErrorKind::CountryNotResolvable)
                } else {
                    Ok(country.iso)
                }
            }
            404 => Err(ErrorKind::CountryNotResolvable),
            403 => Err(ErrorKind::Banned),
            s => Err(ErrorKind::Status(s)),
        }
    }

    async fn fetch_cart_page_inner(&self, region: &str) -> ApiResult<CartPage> {
        let spec = RequestSpec::get(self.page_url(region, "/cart"));

        let resp = self.session.execute(&spec, true).await?;
        match resp.status {
            200 => {
                let token =
                    markup::extract_csrf_token(&resp.body).ok_or(ErrorKind::MissingToken)?;
                let removable = markup::extract_removable_variant_ids(&resp.body);
                Ok(CartPage {
                    token,
                    is_empty: removable.is_empty(),
                })
            }
            403 => Err(ErrorKind::Banned),
            s => Err(ErrorKind::Status(s)),
        }
    }

    async fn clear_cart_inner(&self, region: &str, token: &str) -> ApiResult<()> {
        let spec = RequestSpec::put(self.page_url(region, "/cart/empty"))
            .header("Accept", "application/json")
            .header("X-CSRF-Token", token);

        let resp = self.session.execute(&spec, true).await?;
        match resp.status {
            // The remote answers 404 for an already-empty cart.
            200 | 204 | 404 => Ok(()),
            403 => Err(ErrorKind::Banned),
            s => Err(ErrorKind::Status(s)),
        }
    }

    async fn fetch_cart_inner(&self, region: &str) -> ApiResult<CartSnapshot> {
        let spec = RequestSpec::get(self.page_url(region, "/cart.json"));

        let resp = self.session.execute(&spec, true).await?;
        match resp.status {
            200 => decode(&resp),
            403 => Err(ErrorKind::Banned),
            s => Err(ErrorKind::Status(s)),
        }
    }

    async fn list_orders_inner(
        &self,
        api_token: &str,
        state: OrderState,
    ) -> ApiResult<Vec<CheckoutOrder>> {
        let url = self.api_url(&format!("/api/orders/mine?q[state_eq]={}", state.as_str()));
        let spec = RequestSpec::get(url)
            .header("Accept", "application/json")
            .header("X-Api-Token", api_token);

        let resp = self.session.execute(&spec, true).await?;
        match resp.status {
            200 => {
                let page: OrderPage = decode(&resp)?;
                Ok(page.orders)
            }
            401 => Err(ErrorKind::InvalidCredentials),
            403 => Err(ErrorKind::Banned),
            422 => Err(ErrorKind::InvalidApiResponse),
            s => Err(ErrorKind::Status(s)),
        }
    }

    async fn set_order_state_inner(
        &self,
        api_token: &str,
        number: &str,
        target: OrderState,
    ) -> ApiResult<CheckoutOrder> {
        let spec = RequestSpec::put(self.api_url(&format!("/api/checkouts/{number}.json")))
            .header("Accept", "application/json")
            .header("X-Api-Token", api_token)
            .json(json!({ "state": target.as_str() }));

        let resp = self.session.execute(&spec, true).await?;
        match resp.status {
            200 => decode(&resp),
            403 => Err(ErrorKind::Banned),
            422 => Err(ErrorKind::InvalidApiResponse),
            s => Err(ErrorKind::Status(s)),
        }
    }

    async fn add_to_cart_inner(
        &self,
        region: &str,
        token: &str,
        variant_id: u64,
    ) -> ApiResult<CartEvent> {
        let spec = RequestSpec::post(self.page_url(region, "/orders/populate"))
            .header("Accept", "application/json")
            .header("X-CSRF-Token", token)
            .json(json!({ "variant_id": variant_id, "quantity": 1 }));

        let resp = self.session.execute(&spec, true).await?;
        match resp.status {
            200 => {
                let event: CartEvent = decode(&resp)?;
                if event.line_item.variant_id != variant_id {
                    return Err(ErrorKind::InvalidApiResponse);
                }
                Ok(event)
            }
            403 => Err(ErrorKind::Banned),
            404 => Err(ErrorKind::ProductMissing),
            422 => Err(ErrorKind::OutOfStock),
            s => Err(ErrorKind::Status(s)),
        }
    }

    async fn advance_order_inner(
        &self,
        api_token: &str,
        number: &str,
    ) -> ApiResult<CheckoutOrder> {
        let spec = RequestSpec::put(self.api_url(&format!("/api/checkouts/{number}/advance")))
            .header("Accept", "application/json")
            .header("X-Api-Token", api_token);

        let resp = self.session.execute(&spec, true).await?;
        match resp.status {
            200 => decode(&resp),
            403 => Err(ErrorKind::Banned),
            422 => Err(ErrorKind::InvalidApiResponse),
            s => Err(ErrorKind::Status(s)),
        }
    }

    async fn payment_redirect_inner(
        &self,
        region: &str,
        token: &str,
        number: &str,
    ) -> ApiResult<String> {
        let spec = RequestSpec::post(self.page_url(region, &format!("/orders/{number}/payment_redirect")))
            .header("X-CSRF-Token", token);

        // Redirects suppressed: the Location header is the payload.
        let resp = self.session.execute(&spec, false).await?;
        match resp.status {
            302 => resp.location().ok_or(ErrorKind::InvalidApiResponse),
            403 => Err(ErrorKind::Banned),
            s => Err(ErrorKind::Status(s)),
        }
    }
}

fn decode<T: DeserializeOwned>(resp: &TransportResponse) -> ApiResult<T> {
    resp.json::<T>().map_err(|e| ErrorKind::Decode(e.to_string()))
}

impl Storefront for RestStorefront {
    fn login<'a>(&'a self, credential: &'a AccountCredential) -> ApiFuture<'a, LoginSnapshot> {
        Box::pin(self.login_inner(credential))
    }

    fn resolve_country<'a>(&'a self, country_id: u64) -> ApiFuture<'a, String> {
        Box::pin(self.resolve_country_inner(country_id))
    }

    fn fetch_cart_page<'a>(&'a self, region: &'a str) -> ApiFuture<'a, CartPage> {
        Box::pin(self.fetch_cart_page_inner(region))
    }

    fn clear_cart<'a>(&'a self, region: &'a str, token: &'a str) -> ApiFuture<'a, ()> {
        Box::pin(self.clear_cart_inner(region, token))
    }

    fn fetch_cart<'a>(&'a self, region: &'a str) -> ApiFuture<'a, CartSnapshot> {
        Box::pin(self.fetch_cart_inner(region))
    }

    fn list_orders<'a>(
        &'a self,
        api_token: &'a str,
        state: OrderState,
    ) -> ApiFuture<'a, Vec<CheckoutOrder>> {
        Box::pin(self.list_orders_inner(api_token, state))
    }

    fn set_order_state<'a>(
        &'a self,
        api_token: &'a str,
        number: &'a str,
        target: OrderState,
    ) -> ApiFuture<'a, CheckoutOrder> {
        Box::pin(self.set_order_state_inner(api_token, number, target))
    }

    fn add_to_cart<'a>(
        &'a self,
        region: &'a str,
        token: &'a str,
        variant_id: u64,
    ) -> ApiFuture<'a, CartEvent> {
        Box::pin(self.add_to_cart_inner(region, token, variant_id))
    }

    fn advance_order<'a>(
        &'a self,
        api_token: &'a str,
        number: &'a str,
    ) -> ApiFuture<'a, CheckoutOrder> {
        Box::pin(self.advance_order_inner(api_token, number))
    }

    fn payment_redirect<'a>(
        &'a self,
        region: &'a str,
        token: &'a str,
        number: &'a str,
    ) -> ApiFuture<'a, String> {
        Box::pin(self.payment_redirect_inner(region, token, number))
    }
}
