//! Routing controller (spec §4.G): the entry point orchestrating tag
//! reading, rule matching, and dispatch fan-out under the series' incoming
//! lock.
use fs_err as fs;

use crate::ascconv;
use crate::config::RoutingConfig;
use crate::dispatch::{self, DispatchOutcome};
use crate::error::{LockError, RouterError};
use crate::ids::{FileStem, RuleName, SeriesUid};
use crate::lock::Lock;
use crate::notification::Notifier;
use crate::rule::{self, RuleEvaluator};
use crate::tags::{self, TagDocument};
use crate::telemetry::{Severity, SeriesEventKind, Telemetry};

/// How a `route_series` invocation concluded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// Another invocation already holds the series lock; no side effects.
    AlreadyLocked,
    /// No files were found for this series; `REGISTERED` was emitted with a
    /// zero file count and the invocation aborted cleanly (spec §9
    /// "Degenerate zero-file series").
    Empty,
    /// The triggered set was empty or a discard rule fired.
    Discarded,
    /// The series was fanned out to at least one destination.
    Dispatched { triggered: Vec<RuleName> },
}

/// Entry point: `route_series(uid)` implements spec §4.G steps 1-8.
pub fn route_series(
    series_uid: &SeriesUid,
    config: &RoutingConfig,
    evaluator: &dyn RuleEvaluator,
    telemetry: &dyn Telemetry,
    notifier: &dyn Notifier,
) -> Result<Outcome, RouterError> {
    let lock_path = config.incoming().join(format!("{series_uid}.lock"));
    let lock = match Lock::acquire(lock_path) {
        Ok(lock) => lock,
        Err(LockError::AlreadyHeld(_)) => return Ok(Outcome::AlreadyLocked),
        Err(LockError::Create(path, e)) => {
            tracing::error!(series_uid = %series_uid, path = %path, error = %e, "failed to acquire series lock");
            telemetry.send_event(
                "routing",
                Severity::Error,
                &format!("failed to acquire lock for series {series_uid}: {e}"),
            );
            return Err(RouterError::LockCreate(series_uid.clone(), e));
        }
    };

    let result = route_series_locked(series_uid, config, evaluator, telemetry, notifier);

    if let Err(e) = lock.release() {
        tracing::error!(series_uid = %series_uid, error = %e, "failed to release series lock");
        telemetry.send_event(
            "routing",
            Severity::Error,
            &format!("failed to release lock for series {series_uid}: {e}"),
        );
    }

    result
}

fn route_series_locked(
    series_uid: &SeriesUid,
    config: &RoutingConfig,
    evaluator: &dyn RuleEvaluator,
    telemetry: &dyn Telemetry,
    notifier: &dyn Notifier,
) -> Result<Outcome, RouterError> {
    let stems = scan_series_stems(config.incoming(), series_uid);

    if stems.is_empty() {
        telemetry.send_series_event(SeriesEventKind::Registered, series_uid, 0, "", "");
        return Ok(Outcome::Empty);
    }

    let first_stem = &stems[0];
    let payload_path = config.incoming().join(format!("{first_stem}.dcm"));
    match ascconv::parse_ascconv(&payload_path) {
        Ok(header) => {
            tracing::debug!(series_uid = %series_uid, header = ?header, "parsed ASCCONV header");
            telemetry.send_series_sequence_data(series_uid, &header);
        }
        Err(e) => {
            // Non-fatal: spec §9 Design Note #4, §7 "Header parse failure".
            tracing::warn!(series_uid = %series_uid, error = %e, "failed to parse ASCCONV header");
            telemetry.send_event(
                "routing",
                Severity::Warning,
                &format!("failed to parse ASCCONV header for series {series_uid}: {e}"),
            );
        }
    }

    let tags_path = config.incoming().join(format!("{first_stem}.tags"));
    let tag_doc = tags::read_tag_doc(&tags_path).map_err(|source| {
        tracing::error!(series_uid = %series_uid, error = %source, "invalid tag information");
        telemetry.send_event(
            "routing",
            Severity::Error,
            &format!("invalid tag information for series {series_uid}: {source}"),
        );
        RouterError::InvalidTags {
            series: series_uid.clone(),
            source,
        }
    })?;

    telemetry.send_register_series(&tag_doc);
    telemetry.send_series_event(SeriesEventKind::Registered, series_uid, stems.len(), "", "");

    let match_outcome = rule::match_rules(config.rules(), &tag_doc, evaluator, telemetry);

    let dispatch_outcome = dispatch::dispatch(
        &match_outcome,
        series_uid,
        &stems,
        &tag_doc,
        config,
        telemetry,
        notifier,
    );

    Ok(match dispatch_outcome {
        DispatchOutcome::Discarded => Outcome::Discarded,
        DispatchOutcome::Dispatched => Outcome::Dispatched {
            triggered: match_outcome.triggered,
        },
    })
}

/// Scan `incoming` for tag sidecars whose name begins with `<series_uid>#`,
/// returning their stems in scan order. The first entry is the
/// representative used for both ASCCONV parsing and tag reading.
fn scan_series_stems(incoming: &camino::Utf8Path, series_uid: &SeriesUid) -> Vec<FileStem> {
    let prefix = format!("{series_uid}#");
    let entries = match fs::read_dir(incoming) {
        Ok(entries) => entries,
        Err(e) => {
            tracing::error!(dir = %incoming, error = %e, "failed to scan incoming folder");
            return Vec::new();
        }
    };

    let mut stems = Vec::new();
    for entry in entries {
        let Ok(entry) = entry else { continue };
        let Some(name) = entry.file_name().to_str().map(str::to_string) else {
            continue;
        };
        if !name.starts_with(&prefix) {
            continue;
        }
        if let Some(stem) = name.strip_suffix(".tags") {
            stems.push(FileStem::from(stem));
        }
    }
    stems
}
