//! Error sweeper (spec §4.F): an independent pass relocating `*.error`
//! markers and their corresponding payload out of the incoming folder.
use camino::Utf8Path;
use fs_err as fs;

use crate::lock::Lock;
use crate::telemetry::{Severity, Telemetry};

const ERROR_SUFFIX: &str = ".error";

/// Scan `incoming` for `*.error` entries, relocating each (plus its payload)
/// into `error_dir` if a sibling `.lock` can be acquired. Returns the number
/// of error files relocated; the caller is responsible for the aggregate
/// telemetry event, which must only fire when the count is nonzero
/// (spec §9 Design Note #3).
pub fn sweep_errors(incoming: &Utf8Path, error_dir: &Utf8Path, telemetry: &dyn Telemetry) -> usize {
    let entries = match fs::read_dir(incoming) {
        Ok(entries) => entries,
        Err(e) => {
            tracing::error!(dir = %incoming, error = %e, "failed to scan incoming for error files");
            telemetry.send_event(
                "routing",
                Severity::Error,
                &format!("failed to scan {incoming} for error files: {e}"),
            );
            return 0;
        }
    };

    let mut relocated = 0;
    for entry in entries {
        let Ok(entry) = entry else { continue };
        let name = entry.file_name();
        let Some(name) = name.to_str() else { continue };
        if !name.ends_with(ERROR_SUFFIX) {
            continue;
        }
        if sweep_one(incoming, error_dir, name, telemetry) {
            relocated += 1;
        }
    }
    relocated
}

fn sweep_one(incoming: &Utf8Path, error_dir: &Utf8Path, name: &str, telemetry: &dyn Telemetry) -> bool {
    let marker_path = incoming.join(name);
    let lock = match Lock::acquire(incoming.join(format!("{name}.lock"))) {
        Ok(lock) => lock,
        Err(_) => return false,
    };

    let mut ok = true;
    if let Err(e) = fs::rename(&marker_path, error_dir.join(name)) {
        tracing::error!(file = %marker_path, error = %e, "failed to move error marker");
        telemetry.send_event(
            "routing",
            Severity::Error,
            &format!("failed to move error marker {marker_path}: {e}"),
        );
        ok = false;
    }

    let payload_name = &name[..name.len() - ERROR_SUFFIX.len()];
    let payload_path = incoming.join(payload_name);
    if payload_path.exists() {
        if let Err(e) = fs::rename(&payload_path, error_dir.join(payload_name)) {
            tracing::error!(file = %payload_path, error = %e, "failed to move error payload");
            telemetry.send_event(
                "routing",
                Severity::Error,
                &format!("failed to move error payload {payload_path}: {e}"),
            );
            ok = false;
        }
    }

    if let Err(e) = lock.release() {
        tracing::error!(error = %e, "failed to release error-sweep lock");
        telemetry.send_event(
            "routing",
            Severity::Error,
            &format!("failed to release error-sweep lock for {name}: {e}"),
        );
    }
    ok
}
