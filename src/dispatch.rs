//! Dispatch fan-out (spec §4.E): the routing controller's body, driving
//! study-level staging, series-level routing, processing, and notification
//! in order, given a triggered set and the series lock already held.
use indexmap::IndexMap;

use crate::config::RoutingConfig;
use crate::lock::Lock;
use crate::ids::{FileStem, RuleName, SeriesUid, StudyUid, TargetName};
use crate::notification::{NotificationEvent, Notifier};
use crate::rule::{Action, ActionTrigger, MatchOutcome, Rule};
use crate::stager::{self, StageOutcome, TransferMode};
use crate::tags::TagDocument;
use crate::taskfile;
use crate::telemetry::{Severity, SeriesEventKind, Telemetry};

/// What the fan-out actually did, for the controller's [`crate::controller::Outcome`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchOutcome {
    Discarded,
    Dispatched,
}

/// Drive the full decision tree of spec §4.E.
pub fn dispatch(
    outcome: &MatchOutcome,
    series_uid: &SeriesUid,
    stems: &[FileStem],
    tags: &TagDocument,
    config: &RoutingConfig,
    telemetry: &dyn Telemetry,
    notifier: &dyn Notifier,
) -> DispatchOutcome {
    if outcome.is_empty() || outcome.discard.is_some() {
        discard(outcome.discard.as_ref(), series_uid, stems, config, telemetry);
        return DispatchOutcome::Discarded;
    }

    let triggered_count = outcome.len();

    stage_studies(
        &outcome.triggered,
        series_uid,
        stems,
        tags,
        config,
        telemetry,
        triggered_count,
    );
    route(
        &outcome.triggered,
        series_uid,
        stems,
        tags,
        config,
        telemetry,
        notifier,
        triggered_count,
    );
    process(
        &outcome.triggered,
        series_uid,
        stems,
        tags,
        config,
        telemetry,
        notifier,
        triggered_count,
    );
    notify(
        &outcome.triggered,
        series_uid,
        stems,
        config,
        telemetry,
        notifier,
        triggered_count,
    );

    if triggered_count > 1 {
        stager::remove_originals(config.incoming(), stems, telemetry);
    }

    DispatchOutcome::Dispatched
}

/// spec §4.E.i
fn discard(
    discard_rule: Option<&RuleName>,
    series_uid: &SeriesUid,
    stems: &[FileStem],
    config: &RoutingConfig,
    telemetry: &dyn Telemetry,
) {
    let info = discard_rule.map(RuleName::as_str).unwrap_or("");
    let task = taskfile::discard_task(series_uid, discard_rule);
    let folder_name = stager::unique_folder_name();
    if let StageOutcome::Staged { .. } = stager::stage(
        config.discard(),
        &folder_name,
        stems,
        config.incoming(),
        TransferMode::Move,
        &task,
        telemetry,
    ) {
        telemetry.send_series_event(SeriesEventKind::Discard, series_uid, stems.len(), "discard", info);
        telemetry.send_series_event(SeriesEventKind::Move, series_uid, stems.len(), "discard", info);
    }
}

/// spec §4.E.ii
fn stage_studies(
    triggered: &[RuleName],
    series_uid: &SeriesUid,
    stems: &[FileStem],
    tags: &TagDocument,
    config: &RoutingConfig,
    telemetry: &dyn Telemetry,
    triggered_count: usize,
) {
    for rule_name in triggered {
        let Some(rule) = config.rules().get(rule_name) else {
            continue;
        };
        if rule.action_trigger != ActionTrigger::Study {
            continue;
        }
        let study_uid = match tags.study_instance_uid() {
            Ok(uid) => StudyUid::from(uid),
            Err(e) => {
                tracing::error!(rule = %rule_name, error = %e, "cannot stage study folder without StudyInstanceUID");
                telemetry.send_event(
                    "routing",
                    Severity::Error,
                    &format!("cannot stage study folder for rule \"{rule_name}\": {e}"),
                );
                continue;
            }
        };
        let folder_name = format!("{study_uid}#{rule_name}");
        let folder = config.studies().join(&folder_name);
        let is_first = match fs_err::create_dir(&folder) {
            Ok(()) => true,
            Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => false,
            Err(e) => {
                tracing::error!(folder = %folder, error = %e, "failed to create study folder");
                telemetry.send_event(
                    "routing",
                    Severity::Error,
                    &format!("failed to create study folder {folder}: {e}"),
                );
                continue;
            }
        };
        let lock = match Lock::acquire_in(&folder) {
            Ok(lock) => lock,
            Err(e) => {
                tracing::error!(folder = %folder, error = %e, "failed to lock study folder");
                telemetry.send_event(
                    "routing",
                    Severity::Error,
                    &format!("failed to lock study folder {folder}: {e}"),
                );
                continue;
            }
        };
        if is_first {
            let task = taskfile::study_task(&study_uid, rule_name, tags);
            if let Err(e) = fs_err::write(folder.join("task.json"), task.to_string()) {
                tracing::error!(folder = %folder, error = %e, "failed to write study task descriptor");
                telemetry.send_event(
                    "routing",
                    Severity::Error,
                    &format!("failed to write study task descriptor in {folder}: {e}"),
                );
            }
        }
        let mode = if triggered_count > 1 {
            TransferMode::Copy
        } else {
            TransferMode::Move
        };
        for stem in stems {
            stager::transfer_pair(config.incoming(), &folder, stem, mode, telemetry);
        }
        if let Err(e) = lock.release() {
            tracing::error!(folder = %folder, error = %e, "failed to release study folder lock");
            telemetry.send_event(
                "routing",
                Severity::Error,
                &format!("failed to release lock on {folder}: {e}"),
            );
        }
    }
}

/// spec §4.E.iii. Only `action == route` rules select an outgoing target;
/// `both` rules are handled exclusively by [`process`], which stages to the
/// processing parent and fires its own reception webhook.
fn route(
    triggered: &[RuleName],
    series_uid: &SeriesUid,
    stems: &[FileStem],
    tags: &TagDocument,
    config: &RoutingConfig,
    telemetry: &dyn Telemetry,
    notifier: &dyn Notifier,
    triggered_count: usize,
) {
    let mut target_selection: IndexMap<TargetName, RuleName> = IndexMap::new();
    for rule_name in triggered {
        let Some(rule) = config.rules().get(rule_name) else {
            continue;
        };
        if rule.action_trigger != ActionTrigger::Series || !is_route_like(rule) {
            continue;
        }
        let Some(target) = &rule.target else {
            continue;
        };
        // Last writer wins: this deliberately deduplicates destinations.
        target_selection.insert(target.clone(), rule_name.clone());
        fire_reception_webhook(rule, series_uid, rule_name, tags, notifier, NotificationEvent::Route);
    }

    let mode = if triggered_count == 1 {
        TransferMode::Move
    } else {
        TransferMode::Copy
    };
    for (target, rule_name) in &target_selection {
        if !config.has_target(target) {
            tracing::error!(target = %target, rule = %rule_name, "target not configured");
            telemetry.send_event(
                "routing",
                Severity::Error,
                &format!("rule \"{rule_name}\" selected unknown target \"{target}\""),
            );
            continue;
        }
        let task = taskfile::route_task(series_uid, rule_name, target, tags);
        let folder_name = stager::unique_folder_name();
        if let StageOutcome::Staged { .. } = stager::stage(
            config.outgoing(),
            &folder_name,
            stems,
            config.incoming(),
            mode,
            &task,
            telemetry,
        ) {
            telemetry.send_series_event(SeriesEventKind::Route, series_uid, stems.len(), target.as_str(), rule_name.as_str());
            telemetry.send_series_event(SeriesEventKind::Move, series_uid, stems.len(), target.as_str(), rule_name.as_str());
        }
    }
}

/// spec §4.E.iv
fn process(
    triggered: &[RuleName],
    series_uid: &SeriesUid,
    stems: &[FileStem],
    tags: &TagDocument,
    config: &RoutingConfig,
    telemetry: &dyn Telemetry,
    notifier: &dyn Notifier,
    triggered_count: usize,
) {
    let mode = if triggered_count > 1 {
        TransferMode::Copy
    } else {
        TransferMode::Move
    };
    for rule_name in triggered {
        let Some(rule) = config.rules().get(rule_name) else {
            continue;
        };
        if rule.action_trigger != ActionTrigger::Series || !is_process_like(rule) {
            continue;
        }
        let task = taskfile::process_task(series_uid, rule_name, tags);
        let folder_name = stager::unique_folder_name();
        if let StageOutcome::Staged { .. } = stager::stage(
            config.processing(),
            &folder_name,
            stems,
            config.incoming(),
            mode,
            &task,
            telemetry,
        ) {
            telemetry.send_series_event(SeriesEventKind::Process, series_uid, stems.len(), rule_name.as_str(), "");
            telemetry.send_series_event(SeriesEventKind::Move, series_uid, stems.len(), rule_name.as_str(), "");
            fire_reception_webhook(rule, series_uid, rule_name, tags, notifier, NotificationEvent::Process);
        }
    }
}

/// spec §4.E.v. Note the corrected source bug (Design Note #1): `triggered_count`
/// here is `triggered.len()`, not `len(triggered == 1)`.
fn notify(
    triggered: &[RuleName],
    series_uid: &SeriesUid,
    stems: &[FileStem],
    config: &RoutingConfig,
    telemetry: &dyn Telemetry,
    notifier: &dyn Notifier,
    triggered_count: usize,
) {
    let mut any_notification = false;
    for rule_name in triggered {
        let Some(rule) = config.rules().get(rule_name) else {
            continue;
        };
        if rule.action_trigger != ActionTrigger::Series || rule.action != Action::Notification {
            continue;
        }
        any_notification = true;
        if let Some(url) = &rule.notification_webhook {
            let payload = rule
                .notification_payload
                .clone()
                .unwrap_or_else(|| default_payload(series_uid, rule_name));
            notifier.send_webhook(url, &payload, NotificationEvent::Notification);
        }
        telemetry.send_series_event(SeriesEventKind::Notification, series_uid, stems.len(), rule_name.as_str(), "");
    }
    if any_notification && triggered_count == 1 {
        stager::remove_originals(config.incoming(), stems, telemetry);
    }
}

fn is_route_like(rule: &Rule) -> bool {
    matches!(rule.action, Action::Route)
}

fn is_process_like(rule: &Rule) -> bool {
    matches!(rule.action, Action::Process | Action::Both)
}

fn fire_reception_webhook(
    rule: &Rule,
    series_uid: &SeriesUid,
    rule_name: &RuleName,
    tags: &TagDocument,
    notifier: &dyn Notifier,
    event: NotificationEvent,
) {
    let Some(url) = &rule.notification_webhook else {
        return;
    };
    let payload = rule.notification_payload.clone().unwrap_or_else(|| {
        serde_json::json!({
            "series_uid": series_uid.as_str(),
            "rule": rule_name.as_str(),
            "tags": tags.as_map(),
        })
    });
    notifier.send_webhook(url, &payload, event);
}

fn default_payload(series_uid: &SeriesUid, rule_name: &RuleName) -> serde_json::Value {
    serde_json::json!({ "series_uid": series_uid.as_str(), "rule": rule_name.as_str() })
}
