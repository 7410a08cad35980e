//! Series routing engine for a medical-imaging dispatch system.
//!
//! Consumes image instances staged in an incoming spool directory, evaluates
//! user-defined routing rules against each series' metadata, and dispatches
//! the series to one or more downstream handlers. See [`route_series`] for
//! the entry point and [`sweep_errors`] for the companion error sweeper.
mod ascconv;
mod config;
mod controller;
mod dispatch;
mod error;
mod ids;
mod lock;
mod nats_backend;
mod notification;
mod rule;
mod stager;
mod sweeper;
mod tags;
mod taskfile;
mod telemetry;

pub use ascconv::{parse_ascconv, AscconvNode, AscconvTree, AscconvValue};
pub use config::{load_config, RoutingConfig, TargetSpec};
pub use controller::{route_series, Outcome};
pub use error::{AscconvError, LockError, MissingRequiredTag, RouterError, RuleEvalError, TagReadError};
pub use ids::{FileStem, RuleName, SeriesUid, StudyUid, TargetName};
pub use lock::Lock;
pub use nats_backend::{NatsNotifier, NatsTelemetry};
pub use notification::{HttpNotifier, NoopNotifier, NotificationEvent, Notifier};
pub use rule::{Action, ActionTrigger, MatchOutcome, Rule, RuleEvaluator};
pub use sweeper::sweep_errors;
pub use tags::{read_tag_doc, TagDocument};
pub use telemetry::{NoopTelemetry, Severity, SeriesEventKind, Telemetry, TracingTelemetry};
