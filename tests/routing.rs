//! End-to-end exercises of the public routing API against a real temp
//! filesystem: one incoming pair in, a `route_series` call, assert on
//! where the files ended up.
use std::sync::Mutex;

use camino::{Utf8Path, Utf8PathBuf};
use figment::providers::Serialized;
use figment::Figment;
use mercure_router::{
    load_config, route_series, Outcome, RoutingConfig, RuleEvalError, Severity, SeriesEventKind,
    SeriesUid, TagDocument, Telemetry,
};

/// Evaluates `key=value` rule expressions against the tag document, matching
/// the toy grammar the unit tests elsewhere in this crate use in place of a
/// real expression engine (out of scope here, spec §1).
struct EqualsEvaluator;

impl mercure_router::RuleEvaluator for EqualsEvaluator {
    fn evaluate(&self, expression: &str, tags: &TagDocument) -> Result<bool, RuleEvalError> {
        if expression == "true" {
            return Ok(true);
        }
        let (key, value) = expression
            .split_once('=')
            .expect("test rule expressions are always key=value or \"true\"");
        Ok(tags.get(key).and_then(|v| v.as_str()) == Some(value))
    }
}

#[derive(Default)]
struct CountingTelemetry {
    series_events: Mutex<Vec<SeriesEventKind>>,
    error_events: Mutex<usize>,
}

impl Telemetry for CountingTelemetry {
    fn send_event(&self, _channel: &str, severity: Severity, _message: &str) {
        if severity == Severity::Error {
            *self.error_events.lock().unwrap() += 1;
        }
    }

    fn send_series_event(
        &self,
        kind: SeriesEventKind,
        _series_uid: &SeriesUid,
        _file_count: usize,
        _context: &str,
        _info: &str,
    ) {
        self.series_events.lock().unwrap().push(kind);
    }

    fn send_register_series(&self, _tags: &TagDocument) {}

    fn send_series_sequence_data(&self, _series_uid: &SeriesUid, _header: &mercure_router::AscconvTree) {}
}

struct NoopNotifier;
impl mercure_router::Notifier for NoopNotifier {
    fn send_webhook(&self, _url: &str, _payload: &serde_json::Value, _event: mercure_router::NotificationEvent) {}
}

fn workdir() -> (tempfile::TempDir, Utf8PathBuf) {
    let dir = tempfile::tempdir().unwrap();
    let root = Utf8Path::from_path(dir.path()).unwrap().to_path_buf();
    for sub in ["incoming", "outgoing", "processing", "discard", "studies", "error"] {
        fs_err::create_dir(root.join(sub)).unwrap();
    }
    (dir, root)
}

fn config_with_rules(root: &Utf8Path, rules: serde_json::Value, targets: serde_json::Value) -> RoutingConfig {
    let json = serde_json::json!({
        "incoming": root.join("incoming"),
        "outgoing": root.join("outgoing"),
        "processing": root.join("processing"),
        "discard": root.join("discard"),
        "studies": root.join("studies"),
        "error": root.join("error"),
        "rules": rules,
        "targets": targets,
    });
    load_config(Figment::new().merge(Serialized::defaults(json))).unwrap()
}

fn write_series(incoming: &Utf8Path, series: &str, slice: &str, study_uid: &str, modality: &str) {
    let stem = format!("{series}#{slice}");
    fs_err::write(incoming.join(format!("{stem}.dcm")), b"binary-payload").unwrap();
    fs_err::write(
        incoming.join(format!("{stem}.tags")),
        format!(r#"{{"StudyInstanceUID": "{study_uid}", "Modality": "{modality}"}}"#),
    )
    .unwrap();
}

fn count_files(dir: &Utf8Path) -> usize {
    std::fs::read_dir(dir)
        .map(|it| it.count())
        .unwrap_or(0)
}

/// The single staging folder the engine created under `parent` (a unique
/// `<uuid>` directory), for tests that need to inspect its contents without
/// hardcoding the generated name.
fn only_subdir(parent: &Utf8Path) -> Utf8PathBuf {
    let mut entries = std::fs::read_dir(parent).unwrap();
    let entry = entries.next().expect("expected exactly one staging folder").unwrap();
    assert!(entries.next().is_none(), "expected exactly one staging folder");
    Utf8PathBuf::from_path_buf(entry.path()).unwrap()
}

/// Recursively list files under `root`, as paths relative to it, sorted.
async fn list_relative_files(root: &Utf8Path) -> Vec<String> {
    use async_walkdir::WalkDir;
    use futures::TryStreamExt;

    let mut files: Vec<String> = WalkDir::new(root)
        .try_filter_map(|entry| async move {
            if entry.file_type().await?.is_file() {
                let path = Utf8PathBuf::from_path_buf(entry.path()).expect("non-UTF-8 path");
                let rel = pathdiff::diff_utf8_paths(&path, root).expect("entry under root");
                Ok(Some(rel.into_string()))
            } else {
                Ok(None)
            }
        })
        .try_collect()
        .await
        .unwrap();
    files.sort();
    files
}

#[test]
fn single_route_rule_delivers_to_one_target() {
    let (_dir, root) = workdir();
    let config = config_with_rules(
        &root,
        serde_json::json!({ "r1": { "rule": "Modality=MR", "action": "route", "target": "pacs-a" } }),
        serde_json::json!({ "pacs-a": {} }),
    );
    write_series(config.incoming(), "S1", "a", "ST1", "MR");

    let telemetry = CountingTelemetry::default();
    let outcome = route_series(
        &SeriesUid::from_static("S1"),
        &config,
        &EqualsEvaluator,
        &telemetry,
        &NoopNotifier,
    )
    .unwrap();

    assert!(matches!(outcome, Outcome::Dispatched { .. }));
    assert_eq!(count_files(config.incoming()), 0);
    assert_eq!(count_files(config.outgoing()), 1);
    assert!(telemetry.series_events.lock().unwrap().contains(&SeriesEventKind::Route));
}

#[test]
fn two_triggered_rules_copy_to_both_destinations() {
    let (_dir, root) = workdir();
    let config = config_with_rules(
        &root,
        serde_json::json!({
            "route-mr": { "rule": "Modality=MR", "action": "route", "target": "pacs-a" },
            "process-all": { "rule": "true", "action": "process" },
        }),
        serde_json::json!({ "pacs-a": {} }),
    );
    write_series(config.incoming(), "S1", "a", "ST1", "MR");

    let telemetry = CountingTelemetry::default();
    let outcome = route_series(
        &SeriesUid::from_static("S1"),
        &config,
        &EqualsEvaluator,
        &telemetry,
        &NoopNotifier,
    )
    .unwrap();

    assert!(matches!(outcome, Outcome::Dispatched { .. }));
    // Two triggered rules => both destinations get a copy, and since neither
    // consumer holds the only reference, the originals are removed afterward.
    assert_eq!(count_files(config.outgoing()), 1);
    assert_eq!(count_files(config.processing()), 1);
    assert_eq!(count_files(config.incoming()), 0);
}

#[test]
fn discard_rule_overrides_everything_else() {
    let (_dir, root) = workdir();
    let config = config_with_rules(
        &root,
        serde_json::json!({
            "discard-ct": { "rule": "Modality=CT", "action": "discard" },
            "route-all": { "rule": "true", "action": "route", "target": "pacs-a" },
        }),
        serde_json::json!({ "pacs-a": {} }),
    );
    write_series(config.incoming(), "S1", "a", "ST1", "CT");

    let telemetry = CountingTelemetry::default();
    let outcome = route_series(
        &SeriesUid::from_static("S1"),
        &config,
        &EqualsEvaluator,
        &telemetry,
        &NoopNotifier,
    )
    .unwrap();

    assert_eq!(outcome, Outcome::Discarded);
    assert_eq!(count_files(config.discard()), 1);
    assert_eq!(count_files(config.outgoing()), 0);
}

#[test]
fn study_level_rule_stages_once_per_study() {
    let (_dir, root) = workdir();
    let config = config_with_rules(
        &root,
        serde_json::json!({
            "study-mr": {
                "rule": "Modality=MR",
                "action": "process",
                "action_trigger": "study",
            }
        }),
        serde_json::json!({}),
    );
    write_series(config.incoming(), "S1", "a", "ST1", "MR");
    write_series(config.incoming(), "S2", "a", "ST1", "MR");

    let telemetry = CountingTelemetry::default();
    for series in ["S1", "S2"] {
        route_series(
            &SeriesUid::from_static(series),
            &config,
            &EqualsEvaluator,
            &telemetry,
            &NoopNotifier,
        )
        .unwrap();
    }

    let study_entries: Vec<_> = std::fs::read_dir(config.studies()).unwrap().collect();
    assert_eq!(study_entries.len(), 1, "both series share one study folder");
    let study_folder = study_entries.into_iter().next().unwrap().unwrap().path();
    assert!(study_folder.join("task.json").exists());
    assert!(study_folder.join("S1#a.dcm").exists());
    assert!(study_folder.join("S2#a.dcm").exists());
}

#[test]
fn unknown_target_is_skipped_and_reported() {
    let (_dir, root) = workdir();
    let config = config_with_rules(
        &root,
        serde_json::json!({ "r1": { "rule": "true", "action": "route", "target": "nonexistent" } }),
        serde_json::json!({}),
    );
    write_series(config.incoming(), "S1", "a", "ST1", "MR");

    let telemetry = CountingTelemetry::default();
    route_series(
        &SeriesUid::from_static("S1"),
        &config,
        &EqualsEvaluator,
        &telemetry,
        &NoopNotifier,
    )
    .unwrap();

    assert_eq!(count_files(config.outgoing()), 0);
    assert!(*telemetry.error_events.lock().unwrap() > 0);
}

#[tokio::test]
async fn single_route_rule_produces_expected_file_tree() {
    let (_dir, root) = workdir();
    let config = config_with_rules(
        &root,
        serde_json::json!({ "r1": { "rule": "Modality=MR", "action": "route", "target": "pacs-a" } }),
        serde_json::json!({ "pacs-a": {} }),
    );
    write_series(config.incoming(), "S1", "a", "ST1", "MR");
    write_series(config.incoming(), "S1", "b", "ST1", "MR");

    let telemetry = CountingTelemetry::default();
    route_series(
        &SeriesUid::from_static("S1"),
        &config,
        &EqualsEvaluator,
        &telemetry,
        &NoopNotifier,
    )
    .unwrap();

    let staged = only_subdir(config.outgoing());
    let files = list_relative_files(&staged).await;
    pretty_assertions::assert_eq!(
        files,
        vec![
            "S1#a.dcm".to_string(),
            "S1#a.tags".to_string(),
            "S1#b.dcm".to_string(),
            "S1#b.tags".to_string(),
            "task.json".to_string(),
        ]
    );
}

#[test]
fn routes_a_series_whose_identifier_is_an_arbitrary_generated_name() {
    // Series identifiers are opaque strings (spec §3); exercise the engine
    // with a name that isn't one of this file's usual `S1`/`S2` fixtures to
    // make sure nothing here secretly assumes a particular shape.
    let series_name = names::Generator::default().next().unwrap();

    let (_dir, root) = workdir();
    let config = config_with_rules(
        &root,
        serde_json::json!({ "r1": { "rule": "true", "action": "route", "target": "pacs-a" } }),
        serde_json::json!({ "pacs-a": {} }),
    );
    write_series(config.incoming(), &series_name, "a", "ST1", "MR");

    let telemetry = CountingTelemetry::default();
    let outcome = route_series(
        &SeriesUid::from(series_name.as_str()),
        &config,
        &EqualsEvaluator,
        &telemetry,
        &NoopNotifier,
    )
    .unwrap();

    assert!(matches!(outcome, Outcome::Dispatched { .. }));
    assert_eq!(count_files(config.outgoing()), 1);
}

#[test]
fn locked_series_is_left_untouched() {
    let (_dir, root) = workdir();
    let config = config_with_rules(
        &root,
        serde_json::json!({ "r1": { "rule": "true", "action": "route", "target": "pacs-a" } }),
        serde_json::json!({ "pacs-a": {} }),
    );
    write_series(config.incoming(), "S1", "a", "ST1", "MR");
    let held = mercure_router::Lock::acquire(config.incoming().join("S1.lock")).unwrap();

    let telemetry = CountingTelemetry::default();
    let outcome = route_series(
        &SeriesUid::from_static("S1"),
        &config,
        &EqualsEvaluator,
        &telemetry,
        &NoopNotifier,
    )
    .unwrap();

    assert_eq!(outcome, Outcome::AlreadyLocked);
    assert_eq!(count_files(config.outgoing()), 0);
    assert!(config.incoming().join("S1#a.dcm").exists());
    held.release().unwrap();
}
