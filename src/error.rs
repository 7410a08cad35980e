use crate::ids::SeriesUid;

/// Errors which abort an entire [`crate::controller::route_series`] invocation.
///
/// Per-rule, per-target, and per-file errors are *not* represented here: those
/// are logged, reported to telemetry, and skipped without aborting the
/// invocation. This type is reserved for series-wide failures.
#[derive(thiserror::Error, Debug)]
pub enum RouterError {
    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("could not acquire lock for series {0}")]
    LockCreate(SeriesUid, #[source] std::io::Error),

    #[error("invalid tag information for series {series}")]
    InvalidTags {
        series: SeriesUid,
        #[source]
        source: TagReadError,
    },
}

/// Errors reading the representative tag sidecar for a series.
#[derive(thiserror::Error, Debug)]
pub enum TagReadError {
    #[error("tag sidecar does not exist: {0}")]
    Missing(camino::Utf8PathBuf, #[source] std::io::Error),

    #[error("tag sidecar is not valid JSON: {0}")]
    Malformed(camino::Utf8PathBuf, #[source] serde_json::Error),
}

/// The representative tag document is missing a required key.
#[derive(thiserror::Error, Debug)]
#[error("tag document does not have the required key: \"{0}\"")]
pub struct MissingRequiredTag(pub &'static str);

/// Errors acquiring or releasing a [`crate::lock::Lock`].
#[derive(thiserror::Error, Debug)]
pub enum LockError {
    /// The lock file already exists. Callers decide per call site whether
    /// this means "owned by someone else" (series lock) or a hard error
    /// (everywhere else).
    #[error("lock already held: {0}")]
    AlreadyHeld(camino::Utf8PathBuf),

    #[error("could not create lock file {0}")]
    Create(camino::Utf8PathBuf, #[source] std::io::Error),
}

/// Failure to locate or decode an ASCCONV header inside a payload file.
#[derive(thiserror::Error, Debug)]
pub enum AscconvError {
    #[error("could not open payload file {0}")]
    Open(camino::Utf8PathBuf, #[source] std::io::Error),

    #[error("could not memory-map payload file {0}")]
    Map(camino::Utf8PathBuf, #[source] std::io::Error),

    #[error("ASCCONV BEGIN marker not found in {0}")]
    MissingBegin(camino::Utf8PathBuf),

    #[error("ASCCONV END marker not found in {0}")]
    MissingEnd(camino::Utf8PathBuf),

    #[error("ASCCONV block in {0} is not valid ASCII")]
    NotAscii(camino::Utf8PathBuf),
}

/// A rule predicate raised an error while being evaluated.
#[derive(thiserror::Error, Debug)]
#[error("rule \"{rule}\" failed to evaluate: {message}")]
pub struct RuleEvalError {
    pub rule: String,
    pub message: String,
}
