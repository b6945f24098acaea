//! Discord-style webhook delivery

use std::time::Duration;

use async_trait::async_trait;

use super::{format_alert, Breach, Notifier, NotifyError};

/// Posts `{"content": <message>}` to a webhook URL
#[derive(Debug, Clone)]
pub struct WebhookNotifier {
    client: reqwest::Client,
    url: String,
    measurement: String,
    timeout: Duration,
}

impl WebhookNotifier {
    /// Create a notifier posting to `url`, giving up after `timeout`
    pub fn new(
        url: impl Into<String>,
        measurement: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, reqwest::Error> {
        Ok(Self {
            client: reqwest::Client::builder().timeout(timeout).build()?,
            url: url.into(),
            measurement: measurement.into(),
            timeout,
        })
    }
}

#[async_trait]
impl Notifier for WebhookNotifier {
    async fn notify(&self, breach: &Breach) -> Result<(), NotifyError> {
        let payload = serde_json::json!({
            "content": format_alert(&self.measurement, breach),
        });

        let response = self
            .client
            .post(&self.url)
            .json(&payload)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    NotifyError::Timeout(self.timeout)
                } else {
                    NotifyError::Webhook(format!("Failed to send webhook: {}", e))
                }
            })?;

        if !response.status().is_success() {
            return Err(NotifyError::Status(response.status().as_u16()));
        }

        tracing::debug!(signal = %breach.signal, "Webhook notification sent");

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::alerts::Condition;
    use chrono::{TimeZone, Utc};
    use wiremock::matchers::{body_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn breach() -> Breach {
        Breach {
            signal: "temp".to_string(),
            value: 61.5,
            observed_at: Utc.with_ymd_and_hms(2024, 5, 1, 11, 59, 30).unwrap(),
            condition: Condition::greater_than(50.0),
        }
    }

    #[tokio::test]
    async fn test_posts_content_body() {
        let server = MockServer::start().await;
        let expected = serde_json::json!({
            "content": "⚠️ Check sensor: 61.5 > 50 in `station.temp`\nTime (UTC): 2024-05-01T11:59:30Z ⚠️",
        });

        Mock::given(method("POST"))
            .and(path("/hook"))
            .and(body_json(&expected))
            .respond_with(ResponseTemplate::new(204))
            .expect(1)
            .mount(&server)
            .await;

        let notifier =
            WebhookNotifier::new(format!("{}/hook", server.uri()), "station", Duration::from_secs(5)).unwrap();
        notifier.notify(&breach()).await.unwrap();
    }

    #[tokio::test]
    async fn test_rate_limited_is_failure() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(429))
            .mount(&server)
            .await;

        let notifier = WebhookNotifier::new(server.uri(), "station", Duration::from_secs(5)).unwrap();
        let err = notifier.notify(&breach()).await.unwrap_err();
        assert!(matches!(err, NotifyError::Status(429)));
    }

    #[tokio::test]
    async fn test_slow_endpoint_times_out() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(204).set_delay(Duration::from_secs(5)))
            .mount(&server)
            .await;

        let notifier = WebhookNotifier::new(server.uri(), "station", Duration::from_millis(200)).unwrap();
        let err = notifier.notify(&breach()).await.unwrap_err();
        assert!(matches!(err, NotifyError::Timeout(_)));
    }

    #[tokio::test]
    async fn test_unreachable_endpoint() {
        let notifier = WebhookNotifier::new("http://127.0.0.1:1/hook", "station", Duration::from_secs(2)).unwrap();
        let err = notifier.notify(&breach()).await.unwrap_err();
        assert!(matches!(err, NotifyError::Webhook(_)));
    }
}
