//! Thin CLI wrapper around the routing engine.
//!
//! `mercure-router sweep` runs the error sweeper (spec §4.F) once.
//! `mercure-router route <series-uid>` calls [`mercure_router::route_series`];
//! since the rule-expression evaluator is an external collaborator this
//! crate does not implement (spec §1), this subcommand only works once a
//! real [`mercure_router::RuleEvaluator`] has been wired in by whatever
//! deployment embeds this crate — this binary exists to exercise the
//! sweeper and to document the expected wiring.
use anyhow::Context;
use figment::providers::{Format, Toml};
use figment::Figment;
use mercure_router::{load_config, sweep_errors, Severity, Telemetry, TracingTelemetry};

fn main() -> anyhow::Result<()> {
    init_tracing();

    let mut args = std::env::args().skip(1);
    match args.next().as_deref() {
        Some("sweep") => run_sweep(),
        Some("route") => {
            let series_uid = args.next().context("usage: mercure-router route <series-uid>")?;
            tracing::error!(
                series_uid,
                "route_series requires a RuleEvaluator wired in by the embedding deployment; \
                 this CLI only demonstrates config loading and the error sweeper"
            );
            Ok(())
        }
        _ => {
            eprintln!("usage: mercure-router <sweep|route SERIES_UID>");
            std::process::exit(2);
        }
    }
}

fn run_sweep() -> anyhow::Result<()> {
    let config = load_routing_config()?;
    let telemetry = TracingTelemetry;
    let count = sweep_errors(config.incoming(), config.error(), &telemetry);
    // Aggregate event fires only when count > 0 (spec §9 Design Note #3).
    if count > 0 {
        telemetry.send_event(
            "routing",
            Severity::Info,
            &format!("Error parsing {count} incoming files"),
        );
    }
    Ok(())
}

fn load_routing_config() -> anyhow::Result<mercure_router::RoutingConfig> {
    let mut figment = Figment::new();
    if let Ok(path) = std::env::var("MERCURE_CONFIG_FILE") {
        figment = figment.merge(Toml::file(path));
    }
    load_config(figment).context("failed to load routing configuration")
}

fn init_tracing() {
    let subscriber = tracing_subscriber::FmtSubscriber::builder()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .finish();
    let _ = tracing::subscriber::set_global_default(subscriber);
}
