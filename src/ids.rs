//! Newtype string wrappers for the identifiers threaded through the
//! routing engine, built with the same [`aliri_braid`] pattern used for
//! AE titles elsewhere in this codebase's lineage.
use aliri_braid::braid;

/// `SeriesInstanceUID` of a DICOM series.
#[braid(serde)]
pub struct SeriesUid;

/// `StudyInstanceUID` of a DICOM study.
#[braid(serde)]
pub struct StudyUid;

/// Name of a configured rule.
#[braid(serde)]
pub struct RuleName;

/// Name of a configured routing target.
#[braid(serde)]
pub struct TargetName;

/// Stem (everything before `.dcm`/`.tags`) of a file pair in the incoming folder,
/// of the shape `<seriesUID>#<slice-suffix>`.
#[braid(serde)]
pub struct FileStem;
