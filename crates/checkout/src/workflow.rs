//! Per-account checkout workflow
//!
//! Linear state machine in two phases. Setup is idempotent intent: login,
//! region resolution, anti-forgery token capture, cart hygiene, order
//! adoption — restarted wholesale from Idle when the remote bans the
//! current egress identity, up to a configured ceiling. The run phase
//! watches candidate variants, carts one, advances the order to payment and
//! captures the hosted-payment redirect.
//!
//! Within one workflow everything is sequential: each network call blocks
//! this workflow's task until it concludes. The only cross-task shared
//! state is the proxy pool and the watch set.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use tracing::{debug, info, warn};

use proxy_pool::{ProxyEndpoint, ProxyPool};
use transport::TransportSession;

use crate::error::{ErrorKind, ErrorState};
use crate::models::{
    AccountCredential, CartEvent, CheckoutOrder, LoginSnapshot, OrderState, TaskKind,
};
use crate::notify::{CheckoutNotice, Notifier};
use crate::state::WorkflowState;
use crate::storefront::Storefront;
use crate::watch::WatchSet;

/// Everything a workflow shares with the rest of the process.
#[derive(Clone)]
pub struct Collaborators {
    pub session: Arc<TransportSession>,
    pub pool: Arc<ProxyPool>,
    pub storefront: Arc<dyn Storefront>,
    pub notifier: Arc<dyn Notifier>,
}

/// Workflow tunables.
#[derive(Debug, Clone)]
pub struct WorkflowLimits {
    /// Ban-triggered whole-setup restarts allowed after the first attempt.
    pub max_setup_attempts: u32,
    /// Advance calls per carted item.
    pub max_advance_attempts: u32,
    /// Payment-redirect calls per advanced order.
    pub max_payment_attempts: u32,
    /// Orders with this many payment attempts or more are never adopted.
    pub payment_attempt_ceiling: u32,
    /// Variant carted to implicitly create an order when none exists.
    pub filler_variant_id: u64,
    /// Pause after a transient failure in the watch loop.
    pub watch_retry_delay: Duration,
}

impl Default for WorkflowLimits {
    fn default() -> Self {
        Self {
            max_setup_attempts: 5,
            max_advance_attempts: 3,
            max_payment_attempts: 3,
            payment_attempt_ceiling: 5,
            filler_variant_id: 1,
            watch_retry_delay: Duration::from_millis(500),
        }
    }
}

enum SetupOutcome {
    Complete,
    /// A filler item was carted to create an order; rerun the sequence.
    Restart,
}

struct RunContext {
    region: String,
    token: String,
    api_token: String,
}

/// One account's checkout state machine.
pub struct CheckoutWorkflow {
    id: String,
    kind: TaskKind,
    credential: AccountCredential,
    collab: Collaborators,
    watch: Arc<WatchSet>,
    stop: Arc<AtomicBool>,
    limits: WorkflowLimits,

    state: WorkflowState,
    leased: Option<ProxyEndpoint>,
    account: Option<LoginSnapshot>,
    region: Option<String>,
    token: Option<String>,
    order: Option<CheckoutOrder>,
    setup_complete: bool,
}

impl CheckoutWorkflow {
    pub fn new(
        kind: TaskKind,
        credential: AccountCredential,
        collab: Collaborators,
        watch: Arc<WatchSet>,
        stop: Arc<AtomicBool>,
        limits: WorkflowLimits,
    ) -> Self {
        Self {
            id: uuid::Uuid::new_v4().as_simple().to_string(),
            kind,
            credential,
            collab,
            watch,
            stop,
            limits,
            state: WorkflowState::Idle,
            leased: None,
            account: None,
            region: None,
            token: None,
            order: None,
            setup_complete: false,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn kind(&self) -> TaskKind {
        self.kind
    }

    pub fn state(&self) -> WorkflowState {
        self.state
    }

    pub fn is_setup_complete(&self) -> bool {
        self.setup_complete
    }

    pub fn adopted_order(&self) -> Option<&CheckoutOrder> {
        self.order.as_ref()
    }

    pub fn watch_handle(&self) -> Arc<WatchSet> {
        self.watch.clone()
    }

    pub fn stop_handle(&self) -> Arc<AtomicBool> {
        self.stop.clone()
    }

    /// Ask the run loop to exit at its next iteration. Sampled only at the
    /// head of the watch loop; in-flight requests are never interrupted.
    pub fn request_stop(&self) {
        self.stop.store(true, Ordering::SeqCst);
    }

    /// Run the setup sequence to completion.
    ///
    /// A ban at any step bans the leased endpoint, rotates the lease and
    /// restarts the whole sequence from Idle, at most
    /// `max_setup_attempts` more times. Every other error kind is terminal
    /// for this invocation and reported with the state reached. Re-invoking
    /// after success is a no-op.
    pub async fn setup(&mut self) -> Result<(), ErrorState> {
        if self.setup_complete {
            debug!(task = %self.id, "setup already complete");
            return Ok(());
        }

        let mut ban_retries = 0u32;
        let mut filler_used = false;
        loop {
            self.state = WorkflowState::Idle;
            self.ensure_lease().await;

            match self.setup_once(!filler_used).await {
                Ok(SetupOutcome::Complete) => {
                    self.setup_complete = true;
                    info!(task = %self.id, "setup complete");
                    return Ok(());
                }
                Ok(SetupOutcome::Restart) => {
                    filler_used = true;
                }
                Err(err) if err.kind == ErrorKind::Banned => {
                    ban_retries += 1;
                    if ban_retries > self.limits.max_setup_attempts {
                        warn!(task = %self.id, attempts = ban_retries, "setup ban ceiling exceeded");
                        return Err(err);
                    }
                    warn!(
                        task = %self.id,
                        state = %err.state,
                        attempt = ban_retries,
                        "banned during setup, rotating egress"
                    );
                    self.rotate_egress().await;
                }
                Err(err) => {
                    warn!(task = %self.id, error = %err, "setup failed");
                    return Err(err);
                }
            }
        }
    }

    async fn setup_once(&mut self, allow_filler: bool) -> Result<SetupOutcome, ErrorState> {
        self.state = WorkflowState::AttemptingLogin;
        let snapshot = self
            .collab
            .storefront
            .login(&self.credential)
            .await
            .map_err(|k| self.fail(k))?;
        self.state = WorkflowState::LoggedIn;

        // Region is resolved once per workflow and cached forever.
        let region = match self.region.clone() {
            Some(region) => region,
            None => {
                self.state = WorkflowState::ResolvingRegion;
                let billing = snapshot
                    .billing
                    .as_ref()
                    .ok_or_else(|| self.fail(ErrorKind::NoAddress))?;
                let region = self
                    .collab
                    .storefront
                    .resolve_country(billing.country_id)
                    .await
                    .map_err(|k| self.fail(k))?;
                self.region = Some(region.clone());
                region
            }
        };
        self.state = WorkflowState::ObtainedRegion;

        let api_token = snapshot.user.api_token.clone();
        self.account = Some(snapshot);

        self.state = WorkflowState::AttemptingAntiForgeryToken;
        let page = self
            .collab
            .storefront
            .fetch_cart_page(&region)
            .await
            .map_err(|k| self.fail(k))?;
        self.token = Some(page.token.clone());
        self.state = WorkflowState::ObtainedToken;

        if !page.is_empty {
            self.state = WorkflowState::AttemptingClearCart;
            self.collab
                .storefront
                .clear_cart(&region, &page.token)
                .await
                .map_err(|k| self.fail(k))?;
            let cart = self
                .collab
                .storefront
                .fetch_cart(&region)
                .await
                .map_err(|k| self.fail(k))?;
            if !cart.line_items.is_empty() {
                return Err(self.fail(ErrorKind::CartNotEmpty));
            }
            self.state = WorkflowState::ClearedCart;
        }

        self.state = WorkflowState::AttemptingResolveOrder;
        let mut candidates: Vec<CheckoutOrder> = Vec::new();
        for state in OrderState::OPEN {
            let mut orders = self
                .collab
                .storefront
                .list_orders(&api_token, state)
                .await
                .map_err(|k| self.fail(k))?;
            candidates.append(&mut orders);
        }

        // Adopt the highest-id order the service hasn't already flagged
        // with too many payment attempts.
        let best = candidates
            .into_iter()
            .filter(|o| o.payments_count < self.limits.payment_attempt_ceiling)
            .max_by_key(|o| o.id);

        let adopted = match best {
            Some(order) if order.state == OrderState::Cart => Some(order),
            Some(order) => {
                debug!(order = order.id, state = order.state.as_str(), "resetting adopted order to cart");
                match self
                    .collab
                    .storefront
                    .set_order_state(&api_token, &order.number, OrderState::Cart)
                    .await
                {
                    Ok(reset) if reset.state == OrderState::Cart => Some(reset),
                    Ok(reset) => {
                        warn!(
                            order = order.id,
                            state = reset.state.as_str(),
                            "reset did not land in cart, discarding candidate"
                        );
                        None
                    }
                    Err(ErrorKind::Banned) => return Err(self.fail(ErrorKind::Banned)),
                    Err(kind) => {
                        warn!(order = order.id, error = %kind, "state reset rejected, discarding candidate");
                        None
                    }
                }
            }
            None => None,
        };

        match adopted {
            Some(order) => {
                info!(task = %self.id, order = order.id, number = %order.number, "order adopted");
                self.order = Some(order);
                self.state = WorkflowState::ObtainedOrder;
                Ok(SetupOutcome::Complete)
            }
            None if allow_filler => {
                // An add-to-cart implicitly creates an order; rerun the
                // sequence so the next pass can adopt it.
                info!(
                    task = %self.id,
                    variant = self.limits.filler_variant_id,
                    "no adoptable order, carting filler item"
                );
                self.collab
                    .storefront
                    .add_to_cart(&region, &page.token, self.limits.filler_variant_id)
                    .await
                    .map_err(|k| self.fail(k))?;
                Ok(SetupOutcome::Restart)
            }
            None => Err(self.fail(ErrorKind::NoOrder)),
        }
    }

    /// Run phase. Only valid after setup has completed.
    pub async fn run(&mut self) -> Result<(), ErrorState> {
        if !self.setup_complete {
            return Err(ErrorState::new(ErrorKind::InvalidOrderState, self.state));
        }
        match self.kind {
            TaskKind::Variant => self.watch_variants().await,
            TaskKind::Product => {
                warn!(task = %self.id, "product watch is not implemented");
                Err(ErrorState::new(ErrorKind::Unsupported, self.state))
            }
        }
    }

    /// Variant-watch loop: cart one watched variant, then drive the order
    /// to a payment link.
    ///
    /// The loop has no success ceiling — it runs until a verified cart
    /// success or cooperative cancellation. Bans rotate the egress; every
    /// other failure sleeps a fixed delay and retries.
    async fn watch_variants(&mut self) -> Result<(), ErrorState> {
        let ctx = self.run_context()?;
        loop {
            if self.stop.swap(false, Ordering::SeqCst) {
                info!(task = %self.id, "stop requested, leaving watch loop");
                return Ok(());
            }

            let Some(variant_id) = self.watch.pick() else {
                tokio::time::sleep(self.limits.watch_retry_delay).await;
                continue;
            };

            self.state = WorkflowState::AttemptingAddToCart;
            let event = match self
                .collab
                .storefront
                .add_to_cart(&ctx.region, &ctx.token, variant_id)
                .await
            {
                Ok(event) => event,
                Err(ErrorKind::Banned) => {
                    warn!(task = %self.id, variant_id, "banned while carting, rotating egress");
                    self.rotate_egress().await;
                    continue;
                }
                Err(kind) => {
                    warn!(task = %self.id, variant_id, error = %kind, "add to cart failed");
                    tokio::time::sleep(self.limits.watch_retry_delay).await;
                    continue;
                }
            };

            self.state = WorkflowState::ItemCarted;
            self.watch.consume(variant_id);

            let Some(adopted_id) = self.order.as_ref().map(|o| o.id) else {
                debug!(task = %self.id, "cart success with no adopted order, ignoring event");
                continue;
            };
            if event.line_item.order_id != adopted_id {
                debug!(
                    task = %self.id,
                    event_order = event.line_item.order_id,
                    adopted = adopted_id,
                    "cart event belongs to a different order, ignoring"
                );
                continue;
            }

            info!(task = %self.id, variant_id, order = adopted_id, "item carted");
            return self.complete_checkout(&ctx, &event).await;
        }
    }

    /// Advance the adopted order to Payment and capture the redirect link.
    async fn complete_checkout(
        &mut self,
        ctx: &RunContext,
        event: &CartEvent,
    ) -> Result<(), ErrorState> {
        let Some(order) = self.order.as_ref() else {
            return Err(ErrorState::new(ErrorKind::NoOrder, self.state));
        };
        let mut number = order.number.clone();

        self.state = WorkflowState::AttemptingAdvance;
        let mut reached_payment = false;
        for attempt in 1..=self.limits.max_advance_attempts {
            match self
                .collab
                .storefront
                .advance_order(&ctx.api_token, &number)
                .await
            {
                Ok(order) => {
                    self.state = WorkflowState::Advanced;
                    reached_payment = order.state == OrderState::Payment;
                    number = order.number.clone();
                    self.order = Some(order);
                    if reached_payment {
                        break;
                    }
                    debug!(task = %self.id, attempt, "order advanced, not yet at payment");
                }
                Err(ErrorKind::Banned) => {
                    warn!(task = %self.id, attempt, "banned while advancing, rotating egress");
                    self.rotate_egress().await;
                }
                Err(kind) => {
                    return Err(ErrorState::new(kind, WorkflowState::AttemptingAdvance));
                }
            }
        }
        if !reached_payment {
            return Err(ErrorState::new(
                ErrorKind::InvalidOrderState,
                WorkflowState::Advanced,
            ));
        }

        self.state = WorkflowState::AttemptingPaymentLink;
        for attempt in 1..=self.limits.max_payment_attempts {
            // Always against the most recently advanced order snapshot.
            match self
                .collab
                .storefront
                .payment_redirect(&ctx.region, &ctx.token, &number)
                .await
            {
                Ok(link) => {
                    self.state = WorkflowState::ObtainedPaymentLink;
                    metrics::counter!("checkout_payment_links_total").increment(1);
                    info!(task = %self.id, order = %number, "payment link obtained");
                    let notice = CheckoutNotice {
                        payment_url: link,
                        account_email: self.credential.email.clone(),
                        item: event.cart.line_items.first().cloned(),
                    };
                    self.collab.notifier.notify(&notice).await;
                    return Ok(());
                }
                Err(ErrorKind::Banned) => {
                    warn!(task = %self.id, attempt, "banned while requesting payment link, rotating egress");
                    self.rotate_egress().await;
                }
                Err(kind) => {
                    return Err(ErrorState::new(kind, WorkflowState::AttemptingPaymentLink));
                }
            }
        }
        Err(ErrorState::new(
            ErrorKind::Banned,
            WorkflowState::AttemptingPaymentLink,
        ))
    }

    fn run_context(&self) -> Result<RunContext, ErrorState> {
        let region = self
            .region
            .clone()
            .ok_or_else(|| ErrorState::new(ErrorKind::CountryNotResolvable, self.state))?;
        let token = self
            .token
            .clone()
            .ok_or_else(|| ErrorState::new(ErrorKind::MissingToken, self.state))?;
        let api_token = self
            .account
            .as_ref()
            .map(|a| a.user.api_token.clone())
            .ok_or_else(|| ErrorState::new(ErrorKind::InvalidCredentials, self.state))?;
        Ok(RunContext {
            region,
            token,
            api_token,
        })
    }

    fn fail(&self, kind: ErrorKind) -> ErrorState {
        ErrorState::new(kind, self.state)
    }

    /// Ban the current lease (if any) and try to pick up a replacement.
    async fn rotate_egress(&mut self) {
        if let Some(current) = self.leased.take() {
            self.collab.pool.ban(&current).await;
        }
        self.ensure_lease().await;
    }

    /// Lease an endpoint if this workflow doesn't hold one. A miss is fine:
    /// the workflow proceeds on its current egress.
    async fn ensure_lease(&mut self) {
        if self.leased.is_some() {
            return;
        }
        match self.collab.pool.lease().await {
            Some(endpoint) => match self.collab.session.set_proxy(&endpoint).await {
                Ok(()) => {
                    debug!(task = %self.id, proxy = %endpoint, "lease acquired");
                    self.leased = Some(endpoint);
                }
                Err(e) => {
                    warn!(task = %self.id, proxy = %endpoint, error = %e, "failed to apply leased proxy");
                }
            },
            None => {
                debug!(task = %self.id, "no free endpoint available this round");
            }
        }
    }
}
