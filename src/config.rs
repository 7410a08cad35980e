//! Read-only routing configuration (spec §6 "Configuration surface",
//! §9 "Global configuration").
use std::collections::HashMap;
use std::sync::Arc;

use camino::Utf8PathBuf;
use figment::providers::Env;
use figment::Figment;
use indexmap::IndexMap;
use serde::Deserialize;

use crate::ids::{RuleName, TargetName};
use crate::rule::Rule;

/// An opaque descriptor for a downstream target. The core validates only
/// that a selected target's name exists in this table (spec §3 "Target").
#[derive(Debug, Clone, Deserialize)]
pub struct TargetSpec(pub serde_json::Value);

#[derive(Debug, Deserialize)]
struct RoutingConfigData {
    incoming: Utf8PathBuf,
    outgoing: Utf8PathBuf,
    processing: Utf8PathBuf,
    discard: Utf8PathBuf,
    studies: Utf8PathBuf,
    error: Utf8PathBuf,
    #[serde(default)]
    rules: IndexMap<RuleName, Rule>,
    #[serde(default)]
    targets: HashMap<TargetName, TargetSpec>,
}

/// The four (plus studies/error) folder paths, the rules table (order
/// matters: an `IndexMap` preserves configuration order, which
/// [`crate::rule::match_rules`] relies on for first-match semantics), and the
/// targets table.
///
/// Cheap to clone (`Arc`-backed) so a caller can snapshot a fresh clone per
/// invocation for hot-reload without this crate needing to know about it
/// (spec §9 "Global configuration").
#[derive(Debug, Clone)]
pub struct RoutingConfig(Arc<RoutingConfigData>);

impl<'de> Deserialize<'de> for RoutingConfig {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        RoutingConfigData::deserialize(deserializer).map(|data| Self(Arc::new(data)))
    }
}

impl RoutingConfig {
    pub fn incoming(&self) -> &camino::Utf8Path {
        &self.0.incoming
    }

    pub fn outgoing(&self) -> &camino::Utf8Path {
        &self.0.outgoing
    }

    pub fn processing(&self) -> &camino::Utf8Path {
        &self.0.processing
    }

    pub fn discard(&self) -> &camino::Utf8Path {
        &self.0.discard
    }

    pub fn studies(&self) -> &camino::Utf8Path {
        &self.0.studies
    }

    pub fn error(&self) -> &camino::Utf8Path {
        &self.0.error
    }

    pub fn rules(&self) -> &IndexMap<RuleName, Rule> {
        &self.0.rules
    }

    pub fn targets(&self) -> &HashMap<TargetName, TargetSpec> {
        &self.0.targets
    }

    pub fn has_target(&self, target: &TargetName) -> bool {
        self.0.targets.contains_key(target)
    }
}

/// Load configuration by merging `MERCURE_`-prefixed environment variables
/// with whatever file/value providers the caller has already merged into
/// `figment`, matching the upstream project's pattern of merging a prefixed
/// `figment::providers::Env` provider into a `Figment`. The rules and
/// targets tables are naturally structured data and are expected to come
/// from a merged file provider (TOML/JSON) rather than flat env vars.
pub fn load_config(figment: Figment) -> Result<RoutingConfig, figment::Error> {
    figment.merge(Env::prefixed("MERCURE_").split("_")).extract()
}
