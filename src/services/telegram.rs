// src/services/telegram.rs

//! Telegram Bot API notifier.
//!
//! Sends one message per change with HTML parse mode. Failures are logged
//! and tallied, never propagated.

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::{Value, json};

use crate::error::{AppError, Result};
use crate::models::{Product, TelegramConfig};
use crate::pipeline::{ChangeReport, PriceChange};
use crate::services::{Delivery, Notifier};
use crate::utils::{format_price, http};

/// Envelope returned by every Bot API method.
#[derive(Debug, Deserialize)]
struct ApiResponse {
    ok: bool,
    #[serde(default)]
    description: Option<String>,
}

/// Notifier posting to a single Telegram chat.
pub struct TelegramNotifier {
    client: Client,
    api_base: String,
    bot_token: String,
    chat_id: String,
}

impl TelegramNotifier {
    pub fn new(config: &TelegramConfig) -> Result<Self> {
        Ok(Self {
            client: http::create_telegram_client(config)?,
            api_base: config.api_base.trim_end_matches('/').to_string(),
            bot_token: config.bot_token.clone(),
            chat_id: config.chat_id.clone(),
        })
    }

    fn endpoint(&self, method: &str) -> String {
        format!("{}/bot{}/{}", self.api_base, self.bot_token, method)
    }

    /// POST a Bot API method. The endpoint URL carries the bot token, so
    /// transport errors are stripped of it before they are returned.
    async fn call(&self, method: &str, payload: Value) -> Result<()> {
        let transport = |e: reqwest::Error| {
            AppError::notification(format!("{} request failed: {}", method, e.without_url()))
        };

        let response = self
            .client
            .post(self.endpoint(method))
            .json(&payload)
            .send()
            .await
            .map_err(transport)?;

        let status = response.status();
        let body = response.text().await.map_err(transport)?;
        let parsed: Option<ApiResponse> = serde_json::from_str(&body).ok();

        match parsed {
            Some(api) if api.ok && status.is_success() => Ok(()),
            Some(api) => Err(AppError::notification(format!(
                "{} failed ({}): {}",
                method,
                status,
                api.description.unwrap_or_else(|| "no description".into())
            ))),
            None => Err(AppError::notification(format!(
                "{} failed ({}): unexpected response",
                method, status
            ))),
        }
    }

    pub async fn send_message(&self, text: &str) -> Result<()> {
        self.call(
            "sendMessage",
            json!({
                "chat_id": self.chat_id,
                "text": text,
                "parse_mode": "HTML",
            }),
        )
        .await
    }

    pub async fn send_photo(&self, photo: &str, caption: &str) -> Result<()> {
        self.call(
            "sendPhoto",
            json!({
                "chat_id": self.chat_id,
                "photo": photo,
                "caption": caption,
                "parse_mode": "HTML",
            }),
        )
        .await
    }

    async fn send_new_product(&self, product: &Product, site_label: &str) -> Result<()> {
        let text = format_new_product(product, site_label);
        if product.image.is_empty() {
            return self.send_message(&text).await;
        }

        // Telegram rejects some image URLs; fall back to plain text.
        match self.send_photo(&product.image, &text).await {
            Ok(()) => Ok(()),
            Err(e) => {
                log::warn!("sendPhoto failed for SKU {}: {}. Retrying as text", product.sku, e);
                self.send_message(&text).await
            }
        }
    }
}

#[async_trait]
impl Notifier for TelegramNotifier {
    async fn notify(&self, report: &ChangeReport, site_label: &str) -> Delivery {
        let mut delivery = Delivery::default();

        for product in &report.new {
            let result = self.send_new_product(product, site_label).await;
            delivery.record(logged(result, "new product", &product.sku));
        }

        for product in &report.removed {
            let result = self.send_message(&format_removed(product)).await;
            delivery.record(logged(result, "removed product", &product.sku));
        }

        for change in &report.price_changes {
            let result = self.send_message(&format_price_change(change)).await;
            delivery.record(logged(result, "price change", &change.product.sku));
        }

        log::info!(
            "Notifications: {} sent, {} failed",
            delivery.sent,
            delivery.failed
        );
        delivery
    }

    async fn notify_error(&self, message: &str) -> bool {
        match self.send_message(&format_error(message)).await {
            Ok(()) => {
                log::info!("Error notification sent");
                true
            }
            Err(e) => {
                log::error!("Error sending error notification: {}", e);
                false
            }
        }
    }

    async fn test_connectivity(&self) -> bool {
        match self.send_message(TEST_MESSAGE).await {
            Ok(()) => {
                log::info!("Test message sent successfully");
                true
            }
            Err(e) => {
                log::error!("Error sending test message: {}", e);
                false
            }
        }
    }
}

fn logged(result: Result<()>, kind: &str, sku: &str) -> bool {
    match result {
        Ok(()) => {
            log::info!("Sent {} notification for SKU {}", kind, sku);
            true
        }
        Err(e) => {
            log::error!("Error sending {} notification for SKU {}: {}", kind, sku, e);
            false
        }
    }
}

const TEST_MESSAGE: &str = "✅ Shelfwatch is running!";

fn escape(text: &str) -> String {
    html_escape::encode_text(text).into_owned()
}

fn link(url: &str) -> String {
    format!(
        "🔗 <a href=\"{}\">View Product</a>",
        html_escape::encode_double_quoted_attribute(url)
    )
}

pub(crate) fn format_new_product(product: &Product, site_label: &str) -> String {
    let mut price = format_price(product.price);
    if product.is_discounted() {
        if let Some(original) = product.original_price {
            price.push_str(&format!(" (was {})", format_price(original)));
        }
    }

    let mut text = format!(
        "🆕 New {} Product!\n\n{}\n💰 {}\n",
        escape(site_label),
        escape(&product.title),
        price
    );
    if let Some(discount) = &product.discount {
        text.push_str(&format!("🔥 {}\n", escape(discount)));
    }
    text.push_str(&format!("🏷️ SKU: {}\n\n{}", escape(&product.sku), link(&product.url)));
    text
}

pub(crate) fn format_removed(product: &Product) -> String {
    format!(
        "❌ Product No Longer Available\n\n{}\n🏷️ SKU: {}\n",
        escape(&product.title),
        escape(&product.sku)
    )
}

pub(crate) fn format_price_change(change: &PriceChange) -> String {
    let (marker, delta) = if change.is_increase() {
        ("📈", format!("+{}", format_price(change.delta)))
    } else {
        ("📉", format_price(change.delta))
    };

    format!(
        "💲 Price Update!\n\n{}\n{} {} → {} ({})\n🏷️ SKU: {}\n\n{}",
        escape(&change.product.title),
        marker,
        format_price(change.old_price),
        format_price(change.new_price),
        delta,
        escape(&change.product.sku),
        link(&change.product.url)
    )
}

pub(crate) fn format_error(message: &str) -> String {
    format!("⚠️ Scraper Error\n\n{}", escape(message))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal::Decimal;
    use std::str::FromStr;
    use wiremock::matchers::{body_partial_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn dec(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    fn product(sku: &str, price: &str) -> Product {
        Product::new(
            sku,
            format!("Lens <{sku}> & hood"),
            dec(price),
            format!("https://shop.example.com/p/{sku}?a=1&b=2"),
        )
    }

    fn notifier(server: &MockServer) -> TelegramNotifier {
        TelegramNotifier::new(&TelegramConfig {
            bot_token: "123:ABC".into(),
            chat_id: "42".into(),
            api_base: format!("{}/", server.uri()),
            timeout_secs: 5,
        })
        .unwrap()
    }

    fn ok() -> ResponseTemplate {
        ResponseTemplate::new(200).set_body_json(json!({"ok": true, "result": {}}))
    }

    #[test]
    fn test_format_new_product_escapes_and_shows_discount() {
        let mut p = product("48213", "3299");
        p.original_price = Some(dec("3999"));
        p.discount = Some("Save $700".into());

        let text = format_new_product(&p, "Camera & Co");

        assert!(text.starts_with("🆕 New Camera &amp; Co Product!"));
        assert!(text.contains("Lens &lt;48213&gt; &amp; hood"));
        assert!(text.contains("💰 $3,299.00 (was $3,999.00)"));
        assert!(text.contains("🔥 Save $700"));
        assert!(text.contains("🏷️ SKU: 48213"));
        assert!(text.contains("href=\"https://shop.example.com/p/48213?a=1&amp;b=2\""));
    }

    #[test]
    fn test_format_new_product_without_discount() {
        let text = format_new_product(&product("A", "10"), "Shop");
        assert!(text.contains("💰 $10.00\n"));
        assert!(!text.contains("was"));
        assert!(!text.contains("🔥"));
    }

    #[test]
    fn test_format_price_change_direction() {
        let down = PriceChange {
            product: product("A", "80"),
            old_price: dec("100"),
            new_price: dec("80"),
            delta: dec("-20"),
        };
        let text = format_price_change(&down);
        assert!(text.contains("📉 $100.00 → $80.00 (-$20.00)"));

        let up = PriceChange {
            product: product("A", "1250"),
            old_price: dec("1000"),
            new_price: dec("1250"),
            delta: dec("250"),
        };
        let text = format_price_change(&up);
        assert!(text.contains("📈 $1,000.00 → $1,250.00 (+$250.00)"));
    }

    #[test]
    fn test_format_removed_and_error() {
        assert!(format_removed(&product("B", "5")).contains("🏷️ SKU: B"));
        assert_eq!(
            format_error("acquire failed: <timeout>"),
            "⚠️ Scraper Error\n\nacquire failed: &lt;timeout&gt;"
        );
    }

    #[tokio::test]
    async fn test_notify_sends_one_message_per_change() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/bot123:ABC/sendMessage"))
            .and(body_partial_json(json!({"chat_id": "42", "parse_mode": "HTML"})))
            .respond_with(ok())
            .expect(3)
            .mount(&server)
            .await;

        let report = ChangeReport {
            new: vec![product("N", "10")],
            removed: vec![product("R", "20")],
            price_changes: vec![PriceChange {
                product: product("P", "9"),
                old_price: dec("10"),
                new_price: dec("9"),
                delta: dec("-1"),
            }],
        };

        let delivery = notifier(&server).notify(&report, "Shop").await;
        assert_eq!(delivery, Delivery { sent: 3, failed: 0 });
    }

    #[tokio::test]
    async fn test_new_product_with_image_uses_photo() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/bot123:ABC/sendPhoto"))
            .and(body_partial_json(json!({"photo": "https://cdn.example.com/n.jpg"})))
            .respond_with(ok())
            .expect(1)
            .mount(&server)
            .await;

        let mut p = product("N", "10");
        p.image = "https://cdn.example.com/n.jpg".into();
        let report = ChangeReport {
            new: vec![p],
            ..ChangeReport::default()
        };

        let delivery = notifier(&server).notify(&report, "Shop").await;
        assert_eq!(delivery.sent, 1);
    }

    #[tokio::test]
    async fn test_rejected_photo_falls_back_to_text() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/bot123:ABC/sendPhoto"))
            .respond_with(ResponseTemplate::new(400).set_body_json(json!({
                "ok": false,
                "description": "Bad Request: wrong file identifier"
            })))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/bot123:ABC/sendMessage"))
            .respond_with(ok())
            .expect(1)
            .mount(&server)
            .await;

        let mut p = product("N", "10");
        p.image = "https://cdn.example.com/broken.jpg".into();
        let report = ChangeReport {
            new: vec![p],
            ..ChangeReport::default()
        };

        let delivery = notifier(&server).notify(&report, "Shop").await;
        assert_eq!(delivery, Delivery { sent: 1, failed: 0 });
    }

    #[tokio::test]
    async fn test_failures_are_counted_not_propagated() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(401).set_body_json(json!({
                "ok": false,
                "description": "Unauthorized"
            })))
            .mount(&server)
            .await;

        let report = ChangeReport {
            removed: vec![product("R1", "1"), product("R2", "2")],
            ..ChangeReport::default()
        };

        let notifier = notifier(&server);
        let delivery = notifier.notify(&report, "Shop").await;
        assert_eq!(delivery, Delivery { sent: 0, failed: 2 });
        assert!(delivery.all_failed());
        assert!(!notifier.notify_error("boom").await);
        assert!(!notifier.test_connectivity().await);
    }

    #[tokio::test]
    async fn test_send_message_reports_api_description() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/bot123:ABC/sendMessage"))
            .respond_with(ResponseTemplate::new(400).set_body_json(json!({
                "ok": false,
                "description": "Bad Request: chat not found"
            })))
            .mount(&server)
            .await;

        let err = notifier(&server).send_message("hi").await.unwrap_err();
        assert!(matches!(err, AppError::Notification(_)));
        assert!(err.to_string().contains("chat not found"));
    }

    #[tokio::test]
    async fn test_transport_error_hides_bot_token() {
        let notifier = TelegramNotifier::new(&TelegramConfig {
            bot_token: "123456:SECRET-TOKEN".into(),
            chat_id: "42".into(),
            api_base: "http://127.0.0.1:9".into(),
            timeout_secs: 5,
        })
        .unwrap();

        let err = notifier.send_message("hi").await.unwrap_err();
        let text = format!("{err} {err:?}");

        assert!(matches!(err, AppError::Notification(_)));
        assert!(text.contains("sendMessage request failed"));
        assert!(!text.contains("SECRET-TOKEN"), "token leaked: {text}");
    }

    #[tokio::test]
    async fn test_connectivity_succeeds() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/bot123:ABC/sendMessage"))
            .and(body_partial_json(json!({"text": TEST_MESSAGE})))
            .respond_with(ok())
            .expect(1)
            .mount(&server)
            .await;

        assert!(notifier(&server).test_connectivity().await);
    }
}
