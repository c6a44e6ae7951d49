//! Webhook notifier
//!
//! Posts each captured payment link to the configured webhook as a
//! Slack-style attachment. Delivery is best-effort: a 429 earns one retry
//! after a fixed pause, anything else is logged and dropped. The workflow
//! never sees a notification failure.

use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use tracing::{debug, warn};

use checkout::{CheckoutNotice, Notifier};
use common::Secret;

/// Pause before the single retry after a rate-limited post.
const RATE_LIMIT_RETRY_DELAY: Duration = Duration::from_secs(5);

pub struct WebhookNotifier {
    client: reqwest::Client,
    url: Secret<String>,
    retry_delay: Duration,
}

impl WebhookNotifier {
    pub fn new(url: Secret<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            url,
            retry_delay: RATE_LIMIT_RETRY_DELAY,
        }
    }

    fn payload(notice: &CheckoutNotice) -> serde_json::Value {
        let item_name = notice
            .item
            .as_ref()
            .map(|i| i.name.as_str())
            .unwrap_or("(unknown item)");
        let mut attachment = serde_json::json!({
            "fallback": format!(
                "Payment link ready for {}: {}",
                notice.account_email, notice.payment_url
            ),
            "color": "#36a64f",
            "title": item_name,
            "title_link": notice.payment_url,
            "fields": [
                { "title": "Account", "value": notice.account_email, "short": true },
                { "title": "Item", "value": item_name, "short": true },
            ],
        });
        if let Some(thumb) = notice.item.as_ref().and_then(|i| i.image_url.as_deref()) {
            attachment["thumb_url"] = serde_json::Value::String(thumb.to_string());
        }
        serde_json::json!({ "attachments": [attachment] })
    }

    async fn post(&self, body: &serde_json::Value) -> Result<u16, reqwest::Error> {
        let response = self
            .client
            .post(self.url.expose())
            .json(body)
            .send()
            .await?;
        Ok(response.status().as_u16())
    }

    async fn deliver(&self, notice: &CheckoutNotice) {
        let body = Self::payload(notice);
        match self.post(&body).await {
            Ok(200) => {
                debug!(account = %notice.account_email, "webhook delivered");
            }
            Ok(429) => {
                warn!(account = %notice.account_email, "webhook rate limited, retrying once");
                tokio::time::sleep(self.retry_delay).await;
                match self.post(&body).await {
                    Ok(200) => debug!(account = %notice.account_email, "webhook retry delivered"),
                    Ok(status) => {
                        warn!(account = %notice.account_email, status, "webhook retry dropped")
                    }
                    Err(e) => warn!(account = %notice.account_email, error = %e, "webhook retry failed"),
                }
            }
            Ok(status) => {
                warn!(account = %notice.account_email, status, "webhook dropped");
            }
            Err(e) => {
                warn!(account = %notice.account_email, error = %e, "webhook post failed");
            }
        }
    }
}

impl Notifier for WebhookNotifier {
    fn notify<'a>(
        &'a self,
        notice: &'a CheckoutNotice,
    ) -> Pin<Box<dyn Future<Output = ()> + Send + 'a>> {
        Box::pin(self.deliver(notice))
    }
}
