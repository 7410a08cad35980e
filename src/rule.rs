//! Rule matcher (spec §4.C, §3 "Rule").
use serde::{Deserialize, Serialize};

use crate::error::RuleEvalError;
use crate::ids::{RuleName, TargetName};
use crate::tags::TagDocument;
use crate::telemetry::{Severity, Telemetry};

/// What a triggered rule does.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Action {
    Route,
    Process,
    Both,
    Notification,
    Discard,
}

/// Whether a triggered rule acts immediately on the series, or buffers until
/// study completion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActionTrigger {
    Series,
    Study,
}

impl Default for ActionTrigger {
    fn default() -> Self {
        Self::Series
    }
}

/// Accepts both the native boolean and the source's string-typed
/// `"True"`/`"False"` flags (spec §9 "String-typed flags").
fn deserialize_disabled<'de, D>(deserializer: D) -> Result<bool, D::Error>
where
    D: serde::Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum BoolOrString {
        Bool(bool),
        Str(String),
    }
    match BoolOrString::deserialize(deserializer)? {
        BoolOrString::Bool(b) => Ok(b),
        BoolOrString::Str(s) => Ok(s.eq_ignore_ascii_case("true")),
    }
}

/// A named routing rule, as read from configuration (spec §3).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Rule {
    #[serde(default, deserialize_with = "deserialize_disabled")]
    pub disabled: bool,
    pub rule: String,
    pub action: Action,
    #[serde(default)]
    pub action_trigger: ActionTrigger,
    pub target: Option<TargetName>,
    pub notification_webhook: Option<String>,
    pub notification_payload: Option<serde_json::Value>,
}

/// The external predicate-evaluation interface (spec §6 `parse_rule`).
pub trait RuleEvaluator: Send + Sync {
    fn evaluate(&self, expression: &str, tags: &TagDocument) -> Result<bool, RuleEvalError>;
}

/// Outcome of matching every configured rule against a tag document.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MatchOutcome {
    /// Triggered rules, in first-match-over-configuration-order.
    pub triggered: Vec<RuleName>,
    /// The name of the first discard-actioned rule to trigger, if any.
    pub discard: Option<RuleName>,
}

impl MatchOutcome {
    pub fn is_empty(&self) -> bool {
        self.triggered.is_empty()
    }

    pub fn len(&self) -> usize {
        self.triggered.len()
    }
}

/// Evaluate every enabled rule, in configuration order, against `tags`.
/// Stops as soon as a discard-actioned rule triggers (spec §4.C, invariant 4).
pub fn match_rules(
    rules: &indexmap::IndexMap<RuleName, Rule>,
    tags: &TagDocument,
    evaluator: &dyn RuleEvaluator,
    telemetry: &dyn Telemetry,
) -> MatchOutcome {
    let mut outcome = MatchOutcome::default();
    for (name, rule) in rules {
        if rule.disabled {
            continue;
        }
        match evaluator.evaluate(&rule.rule, tags) {
            Ok(true) => {
                outcome.triggered.push(name.clone());
                if rule.action == Action::Discard {
                    outcome.discard = Some(name.clone());
                    break;
                }
            }
            Ok(false) => {}
            Err(e) => {
                tracing::warn!(rule = %name, error = %e, "rule predicate failed to evaluate");
                telemetry.send_event(
                    "routing",
                    Severity::Warning,
                    &format!("rule \"{name}\" failed to evaluate: {e}"),
                );
            }
        }
    }
    outcome
}
