//! Stager (spec §4.D): assembles files into a fresh uniquely-named staging
//! folder for exactly one downstream consumer.
use camino::{Utf8Path, Utf8PathBuf};
use fs_err as fs;

use crate::ids::FileStem;
use crate::lock::Lock;
use crate::telemetry::{Severity, Telemetry};

/// Whether the stager moves the originals (single-consumer case) or copies
/// them, leaving the originals for the caller's later cleanup pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferMode {
    Move,
    Copy,
}

/// Result of a staging attempt.
pub enum StageOutcome {
    /// The folder was created, locked, populated, and released.
    Staged { folder: Utf8PathBuf },
    /// The folder could not be created (or didn't exist after creation);
    /// the sub-dispatch that requested it is aborted.
    FolderCreateFailed,
}

/// Generate a fresh, not-yet-existing folder name under `parent`. Any UUID
/// variant is acceptable since `fs::create_dir`'s atomic `AlreadyExists`
/// failure is itself the non-existence check (spec §9 "UUID collisions").
pub fn unique_folder_name() -> String {
    uuid::Uuid::new_v4().to_string()
}

/// Create `parent/folder_name`, lock it, write `task_json` as `task.json`,
/// then transfer every stem's `.dcm` and `.tags` pair from `incoming` in,
/// per spec §4.D steps 1-6.
pub fn stage(
    parent: &Utf8Path,
    folder_name: &str,
    stems: &[FileStem],
    incoming: &Utf8Path,
    mode: TransferMode,
    task_json: &serde_json::Value,
    telemetry: &dyn Telemetry,
) -> StageOutcome {
    let folder = parent.join(folder_name);
    if let Err(e) = fs::create_dir(&folder) {
        tracing::error!(folder = %folder, error = %e, "failed to create staging folder");
        telemetry.send_event(
            "routing",
            Severity::Error,
            &format!("failed to create staging folder {folder}: {e}"),
        );
        return StageOutcome::FolderCreateFailed;
    }
    if !folder.exists() {
        tracing::error!(folder = %folder, "staging folder does not exist after creation");
        telemetry.send_event(
            "routing",
            Severity::Error,
            &format!("staging folder {folder} does not exist after creation"),
        );
        return StageOutcome::FolderCreateFailed;
    }

    let lock = match Lock::acquire_in(&folder) {
        Ok(lock) => lock,
        Err(e) => {
            tracing::error!(folder = %folder, error = %e, "failed to lock staging folder");
            telemetry.send_event(
                "routing",
                Severity::Error,
                &format!("failed to lock staging folder {folder}: {e}"),
            );
            return StageOutcome::FolderCreateFailed;
        }
    };

    if let Err(e) = fs::write(folder.join("task.json"), task_json.to_string()) {
        tracing::error!(folder = %folder, error = %e, "failed to write task descriptor");
        telemetry.send_event(
            "routing",
            Severity::Error,
            &format!("failed to write task descriptor in {folder}: {e}"),
        );
    }

    for stem in stems {
        transfer_pair(incoming, &folder, stem, mode, telemetry);
    }

    if let Err(e) = lock.release() {
        tracing::error!(folder = %folder, error = %e, "failed to release staging folder lock");
        telemetry.send_event(
            "routing",
            Severity::Error,
            &format!("failed to release lock on {folder}: {e}"),
        );
    }

    StageOutcome::Staged { folder }
}

pub(crate) fn transfer_pair(
    incoming: &Utf8Path,
    dest: &Utf8Path,
    stem: &FileStem,
    mode: TransferMode,
    telemetry: &dyn Telemetry,
) {
    for ext in ["dcm", "tags"] {
        let src = incoming.join(format!("{stem}.{ext}"));
        let dst = dest.join(format!("{stem}.{ext}"));
        let result = match mode {
            TransferMode::Move => fs::rename(&src, &dst),
            TransferMode::Copy => fs::copy(&src, &dst).map(|_| ()),
        };
        if let Err(e) = result {
            tracing::error!(src = %src, dst = %dst, error = %e, "failed to transfer file");
            telemetry.send_event(
                "routing",
                Severity::Error,
                &format!("failed to transfer {src} to {dst}: {e}"),
            );
        }
    }
}

/// Remove the original `.dcm`/`.tags` pairs from `incoming` (spec §4.E.vi,
/// used when the pair was copied to every destination rather than moved).
pub fn remove_originals(incoming: &Utf8Path, stems: &[FileStem], telemetry: &dyn Telemetry) {
    for stem in stems {
        for ext in ["dcm", "tags"] {
            let path = incoming.join(format!("{stem}.{ext}"));
            if let Err(e) = fs::remove_file(&path) {
                tracing::error!(path = %path, error = %e, "failed to remove original file");
                telemetry.send_event(
                    "routing",
                    Severity::Error,
                    &format!("failed to remove original {path}: {e}"),
                );
            }
        }
    }
}
