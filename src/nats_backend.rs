//! NATS-backed example [`Telemetry`]/[`Notifier`] implementations. Neither a
//! real bookkeeper backend nor a real notification sender is this crate's
//! job (spec §1); these exist to show how a caller wires the synchronous
//! routing core up to an async publish-only sink, mirroring how
//! `lonk_publisher` fire-and-forgets messages onto NATS elsewhere in this
//! codebase's lineage.
use crate::ascconv::{ascconv_tree_to_json, AscconvTree};
use crate::ids::SeriesUid;
use crate::notification::{NotificationEvent, Notifier};
use crate::tags::TagDocument;
use crate::telemetry::{Severity, SeriesEventKind, Telemetry};

/// Publishes every telemetry call as a JSON payload to a NATS subject
/// derived from `root_subject`. Requires a running Tokio runtime on the
/// calling thread since publishing is spawned fire-and-forget.
pub struct NatsTelemetry {
    client: async_nats::Client,
    root_subject: String,
}

impl NatsTelemetry {
    pub fn new(client: async_nats::Client, root_subject: impl Into<String>) -> Self {
        Self {
            client,
            root_subject: root_subject.into(),
        }
    }

    fn publish(&self, suffix: &str, payload: serde_json::Value) {
        let subject = format!("{}.{suffix}", self.root_subject);
        let client = self.client.clone();
        let bytes = payload.to_string().into_bytes();
        tokio::spawn(async move {
            if let Err(e) = client.publish(subject, bytes.into()).await {
                tracing::warn!(error = %e, "failed to publish telemetry event to NATS");
            }
        });
    }
}

impl Telemetry for NatsTelemetry {
    fn send_event(&self, channel: &str, severity: Severity, message: &str) {
        self.publish(
            "event",
            serde_json::json!({ "channel": channel, "severity": format!("{severity:?}"), "message": message }),
        );
    }

    fn send_series_event(
        &self,
        kind: SeriesEventKind,
        series_uid: &SeriesUid,
        file_count: usize,
        context: &str,
        info: &str,
    ) {
        self.publish(
            "series_event",
            serde_json::json!({
                "kind": format!("{kind:?}"),
                "series_uid": series_uid.as_str(),
                "file_count": file_count,
                "context": context,
                "info": info,
            }),
        );
    }

    fn send_register_series(&self, tags: &TagDocument) {
        self.publish("register_series", serde_json::json!({ "tags": tags.as_map() }));
    }

    fn send_series_sequence_data(&self, series_uid: &SeriesUid, header: &AscconvTree) {
        self.publish(
            "sequence_data",
            serde_json::json!({ "series_uid": series_uid.as_str(), "header": ascconv_tree_to_json(header) }),
        );
    }
}

/// Publishes webhook payloads to a NATS subject instead of an HTTP endpoint.
pub struct NatsNotifier {
    client: async_nats::Client,
}

impl NatsNotifier {
    pub fn new(client: async_nats::Client) -> Self {
        Self { client }
    }
}

impl Notifier for NatsNotifier {
    fn send_webhook(&self, url: &str, payload: &serde_json::Value, event: NotificationEvent) {
        let subject = url.to_string();
        let client = self.client.clone();
        let bytes = serde_json::json!({ "event": format!("{event:?}"), "payload": payload })
            .to_string()
            .into_bytes();
        tokio::spawn(async move {
            if let Err(e) = client.publish(subject, bytes.into()).await {
                tracing::warn!(error = %e, "failed to publish webhook to NATS");
            }
        });
    }
}
