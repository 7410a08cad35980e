//! The telemetry/bookkeeper sink interface (spec §6), consumed only through
//! this trait — the real bookkeeper backend is out of scope (spec §1).
use crate::ascconv::AscconvTree;
use crate::ids::SeriesUid;
use crate::tags::TagDocument;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Info,
    Warning,
    Error,
}

/// Kinds of per-series events emitted over the course of a dispatch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SeriesEventKind {
    Registered,
    Discard,
    Route,
    Process,
    Notification,
    Move,
}

/// Fire-and-forget telemetry sink (spec §6).
pub trait Telemetry: Send + Sync {
    fn send_event(&self, channel: &str, severity: Severity, message: &str);

    fn send_series_event(
        &self,
        kind: SeriesEventKind,
        series_uid: &SeriesUid,
        file_count: usize,
        context: &str,
        info: &str,
    );

    fn send_register_series(&self, tags: &TagDocument);

    fn send_series_sequence_data(&self, series_uid: &SeriesUid, header: &AscconvTree);
}

/// Default/testing implementation: logs every call via `tracing`, mirroring
/// the original's `logger.info`/`logger.error` pairing every `monitor.send_*`
/// call.
pub struct TracingTelemetry;

impl Telemetry for TracingTelemetry {
    fn send_event(&self, channel: &str, severity: Severity, message: &str) {
        match severity {
            Severity::Info => tracing::info!(channel, message),
            Severity::Warning => tracing::warn!(channel, message),
            Severity::Error => tracing::error!(channel, message),
        }
    }

    fn send_series_event(
        &self,
        kind: SeriesEventKind,
        series_uid: &SeriesUid,
        file_count: usize,
        context: &str,
        info: &str,
    ) {
        tracing::info!(
            event = ?kind,
            series_uid = %series_uid,
            file_count,
            context,
            info,
            "series event"
        );
    }

    fn send_register_series(&self, tags: &TagDocument) {
        tracing::info!(tags = ?tags.as_map(), "registered series");
    }

    fn send_series_sequence_data(&self, series_uid: &SeriesUid, header: &AscconvTree) {
        tracing::debug!(series_uid = %series_uid, header = ?header, "parsed sequence data");
    }
}

/// Silently discards every call. Used in unit tests that don't care about
/// telemetry side effects.
pub struct NoopTelemetry;

impl Telemetry for NoopTelemetry {
    fn send_event(&self, _channel: &str, _severity: Severity, _message: &str) {}

    fn send_series_event(
        &self,
        _kind: SeriesEventKind,
        _series_uid: &SeriesUid,
        _file_count: usize,
        _context: &str,
        _info: &str,
    ) {
    }

    fn send_register_series(&self, _tags: &TagDocument) {}

    fn send_series_sequence_data(&self, _series_uid: &SeriesUid, _header: &AscconvTree) {}
}

/// Records every call for assertions in tests (spec §8's scenarios assert on
/// the exact sequence of telemetry events).
#[cfg(any(test, feature = "test-util"))]
pub mod recording {
    use super::*;
    use std::sync::Mutex;

    #[derive(Debug, Clone, PartialEq)]
    pub enum Recorded {
        Event {
            channel: String,
            severity: Severity,
            message: String,
        },
        SeriesEvent {
            kind: SeriesEventKind,
            series_uid: SeriesUid,
            file_count: usize,
            context: String,
            info: String,
        },
        RegisterSeries,
        SequenceData { series_uid: SeriesUid },
    }

    #[derive(Default)]
    pub struct RecordingTelemetry {
        pub events: Mutex<Vec<Recorded>>,
    }

    impl Telemetry for RecordingTelemetry {
        fn send_event(&self, channel: &str, severity: Severity, message: &str) {
            self.events.lock().unwrap().push(Recorded::Event {
                channel: channel.to_string(),
                severity,
                message: message.to_string(),
            });
        }

        fn send_series_event(
            &self,
            kind: SeriesEventKind,
            series_uid: &SeriesUid,
            file_count: usize,
            context: &str,
            info: &str,
        ) {
            self.events.lock().unwrap().push(Recorded::SeriesEvent {
                kind,
                series_uid: series_uid.clone(),
                file_count,
                context: context.to_string(),
                info: info.to_string(),
            });
        }

        fn send_register_series(&self, _tags: &TagDocument) {
            self.events.lock().unwrap().push(Recorded::RegisterSeries);
        }

        fn send_series_sequence_data(&self, series_uid: &SeriesUid, _header: &AscconvTree) {
            self.events.lock().unwrap().push(Recorded::SequenceData {
                series_uid: series_uid.clone(),
            });
        }
    }
}
