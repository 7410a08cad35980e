//! The notification-sender interface (spec §6 `send_webhook`), consumed only
//! through this trait — the real notification sender is out of scope
//! (spec §1).

/// Which rule action triggered a webhook send.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotificationEvent {
    Route,
    Process,
    Notification,
}

/// Fire-and-forget webhook sender.
pub trait Notifier: Send + Sync {
    fn send_webhook(&self, url: &str, payload: &serde_json::Value, event: NotificationEvent);
}

/// Default for tests and configurations with no webhook configured.
pub struct NoopNotifier;

impl Notifier for NoopNotifier {
    fn send_webhook(&self, _url: &str, _payload: &serde_json::Value, _event: NotificationEvent) {}
}

/// Sends webhooks over HTTP with `reqwest`'s blocking client, matching the
/// synchronous nature of the rest of the routing engine. Errors are logged
/// and never propagated, per spec's "fire-and-forget" framing.
pub struct HttpNotifier {
    client: reqwest::blocking::Client,
}

impl Default for HttpNotifier {
    fn default() -> Self {
        Self {
            client: reqwest::blocking::Client::new(),
        }
    }
}

impl Notifier for HttpNotifier {
    fn send_webhook(&self, url: &str, payload: &serde_json::Value, event: NotificationEvent) {
        match self.client.post(url).json(payload).send() {
            Ok(res) if !res.status().is_success() => {
                tracing::warn!(url, status = %res.status(), ?event, "webhook returned non-success status");
            }
            Ok(_) => {
                tracing::debug!(url, ?event, "webhook delivered");
            }
            Err(e) => {
                tracing::warn!(url, error = %e, ?event, "webhook delivery failed");
            }
        }
    }
}

#[cfg(any(test, feature = "test-util"))]
pub mod recording {
    use super::*;
    use std::sync::Mutex;

    #[derive(Debug, Clone, PartialEq)]
    pub struct RecordedWebhook {
        pub url: String,
        pub payload: serde_json::Value,
        pub event: NotificationEvent,
    }

    #[derive(Default)]
    pub struct RecordingNotifier {
        pub sent: Mutex<Vec<RecordedWebhook>>,
    }

    impl Notifier for RecordingNotifier {
        fn send_webhook(&self, url: &str, payload: &serde_json::Value, event: NotificationEvent) {
            self.sent.lock().unwrap().push(RecordedWebhook {
                url: url.to_string(),
                payload: payload.clone(),
                event,
            });
        }
    }
}
