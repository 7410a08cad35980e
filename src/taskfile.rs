//! Task descriptor generators (spec §4.D step 4). Structure is intentionally
//! a thin, versionless JSON envelope — opaque beyond being valid JSON.
use serde_json::{json, Value};

use crate::ids::{RuleName, SeriesUid, StudyUid, TargetName};
use crate::tags::TagDocument;

pub fn route_task(series_uid: &SeriesUid, rule: &RuleName, target: &TargetName, tags: &TagDocument) -> Value {
    json!({
        "action": "route",
        "series_uid": series_uid.as_str(),
        "rule": rule.as_str(),
        "target": target.as_str(),
        "tags": tags.as_map(),
    })
}

pub fn process_task(series_uid: &SeriesUid, rule: &RuleName, tags: &TagDocument) -> Value {
    json!({
        "action": "process",
        "series_uid": series_uid.as_str(),
        "rule": rule.as_str(),
        "tags": tags.as_map(),
    })
}

pub fn study_task(study_uid: &StudyUid, rule: &RuleName, tags: &TagDocument) -> Value {
    json!({
        "action": "study",
        "study_uid": study_uid.as_str(),
        "rule": rule.as_str(),
        "tags": tags.as_map(),
    })
}

pub fn discard_task(series_uid: &SeriesUid, rule: Option<&RuleName>) -> Value {
    json!({
        "action": "discard",
        "series_uid": series_uid.as_str(),
        "rule": rule.map(RuleName::as_str),
    })
}
