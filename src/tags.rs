//! Tag sidecar reading (spec §4.B, §6).
use camino::Utf8Path;
use fs_err as fs;
use serde_json::{Map, Value};

use crate::error::{MissingRequiredTag, TagReadError};

/// An unordered mapping from tag name to string/number/nested-mapping value,
/// decoded from a `.tags` JSON sidecar.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct TagDocument(Map<String, Value>);

impl TagDocument {
    pub fn new(map: Map<String, Value>) -> Self {
        Self(map)
    }

    pub fn as_map(&self) -> &Map<String, Value> {
        &self.0
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    /// The required `StudyInstanceUID` key.
    pub fn study_instance_uid(&self) -> Result<&str, MissingRequiredTag> {
        self.0
            .get("StudyInstanceUID")
            .and_then(Value::as_str)
            .ok_or(MissingRequiredTag("StudyInstanceUID"))
    }
}

/// Read and JSON-decode a `.tags` sidecar. Missing file and malformed JSON
/// are distinguished only for logging; both are treated as series-wide
/// aborts by the controller.
pub fn read_tag_doc(path: &Utf8Path) -> Result<TagDocument, TagReadError> {
    let contents = fs::read_to_string(path).map_err(|e| TagReadError::Missing(path.to_owned(), e))?;
    let map: Map<String, Value> = serde_json::from_str(&contents)
        .map_err(|e| TagReadError::Malformed(path.to_owned(), e))?;
    Ok(TagDocument::new(map))
}
