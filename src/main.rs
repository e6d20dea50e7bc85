//! Binary entry point for the compute janitor.

use std::io::{self, Write};
use std::process;
use std::sync::Arc;

use clap::Parser;
use thiserror::Error;
use tracing::{error, info};

use compute_janitor::compute::{ComputeClient, ComputeError};
use compute_janitor::config::{ConfigError, JanitorSettings};
use compute_janitor::filter::TracingDecisionSink;
use compute_janitor::janitor::{Janitor, JanitorError, KindReport};
use compute_janitor::logging::{self, LoggingError};

mod cli;

use cli::Cli;

#[derive(Debug, Error)]
enum CliError {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),
    #[error("logging error: {0}")]
    Logging(#[from] LoggingError),
    #[error("client error: {0}")]
    Client(#[from] ComputeError),
    #[error("janitor error: {0}")]
    Janitor(#[from] JanitorError),
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    let exit_code = match run(cli).await {
        Ok(code) => code,
        Err(err) => {
            report_error(&err);
            1
        }
    };

    process::exit(exit_code);
}

async fn run(cli: Cli) -> Result<i32, CliError> {
    let mut settings = JanitorSettings::load_without_cli_args()?;
    apply_overrides(cli, &mut settings);
    let resolved = settings.resolve()?;
    logging::init(&resolved.logging)?;

    let client = ComputeClient::new(&resolved.api_endpoint, &resolved.access_token)?;
    let janitor = Janitor::new(
        Arc::new(client),
        resolved.janitor,
        Arc::new(TracingDecisionSink),
    )?;
    let config = janitor.config();
    info!(
        event = "janitor.run.start",
        project = %config.project,
        dry_run = config.dry_run,
        workers = config.workers.get(),
        max_age_secs = config.max_age.as_secs(),
    );

    let summary = janitor.sweep().await;
    let mut exit_code = 0;
    for outcome in summary.outcomes() {
        match outcome {
            Ok(report) => write_report(io::stdout(), report),
            Err(err) => {
                error!(event = "janitor.run.kind_failed", error = %err);
                report_error(&CliError::Janitor(err.clone()));
                exit_code = 1;
            }
        }
    }
    Ok(exit_code)
}

fn apply_overrides(cli: Cli, settings: &mut JanitorSettings) {
    if cli.project.is_some() {
        settings.project = cli.project;
    }
    if let Some(endpoint) = cli.api_endpoint {
        settings.api_endpoint = endpoint;
    }
    if let Some(delimiter) = cli.name_delimiter {
        settings.name_delimiter = delimiter;
    }
    if let Some(workers) = cli.workers {
        settings.workers = workers;
    }
    if let Some(seconds) = cli.older_than {
        settings.older_than_secs = seconds;
    }
    if cli.not_dry_run {
        settings.not_dry_run = true;
    }
    if cli.delete_singletons {
        settings.delete_singletons = true;
    }
    if cli.blacklist_file.is_some() {
        settings.blacklist_file = cli.blacklist_file;
    }
    if let Some(seconds) = cli.poll_interval {
        settings.poll_interval_secs = seconds;
    }
    if let Some(seconds) = cli.operation_timeout {
        settings.operation_timeout_secs = seconds;
    }
    if cli.log_file.is_some() {
        settings.log_file = cli.log_file;
    }
    if let Some(level) = cli.verbosity {
        settings.verbosity = level;
    }
    if let Some(format) = cli.log_type {
        settings.log_format = format;
    }
}

fn write_report(mut target: impl Write, report: &KindReport) {
    let mode = if report.dry_run { " (dry run)" } else { "" };
    writeln!(
        target,
        "{}: eligible={}, deleted={}, skipped={}{mode}",
        report.kind,
        report.eligible.len(),
        report.deleted.len(),
        report.skipped.len(),
    )
    .ok();
}

fn report_error(err: &CliError) {
    write_error(io::stderr(), err);
}

fn write_error(mut target: impl Write, err: &CliError) {
    writeln!(target, "{err}").ok();
}

#[cfg(test)]
mod tests {
    use super::*;
    use compute_janitor::resource::ResourceKind;

    fn base_settings() -> JanitorSettings {
        JanitorSettings {
            project: Some(String::from("from-file")),
            access_token: Some(String::from("token")),
            api_endpoint: String::from("https://compute.example/v1/"),
            name_delimiter: String::from("-"),
            workers: 10,
            older_than_secs: 100,
            not_dry_run: false,
            delete_singletons: false,
            blacklist_file: None,
            poll_interval_secs: 3,
            operation_timeout_secs: 600,
            log_file: None,
            verbosity: String::from("info"),
            log_format: String::from("text"),
        }
    }

    #[test]
    fn cli_flags_override_loaded_settings() {
        let cli = Cli::parse_from([
            "compute-janitor",
            "--project",
            "from-cli",
            "--image-delimiter",
            "_",
            "--workers",
            "3",
            "--older-than",
            "60",
            "--not-dry-run",
            "--log-type",
            "json",
        ]);
        let mut settings = base_settings();
        apply_overrides(cli, &mut settings);

        assert_eq!(settings.project.as_deref(), Some("from-cli"));
        assert_eq!(settings.name_delimiter, "_");
        assert_eq!(settings.workers, 3);
        assert_eq!(settings.older_than_secs, 60);
        assert!(settings.not_dry_run);
        assert_eq!(settings.log_format, "json");
        assert_eq!(settings.access_token.as_deref(), Some("token"));
    }

    #[test]
    fn absent_flags_keep_loaded_settings() {
        let cli = Cli::parse_from(["compute-janitor"]);
        let mut settings = base_settings();
        apply_overrides(cli, &mut settings);
        assert_eq!(settings, base_settings());
    }

    #[test]
    fn write_report_marks_dry_runs() {
        let mut buf = Vec::new();
        let report = KindReport {
            kind: ResourceKind::Image,
            eligible: vec![String::from("web-1")],
            skipped: Vec::new(),
            deleted: Vec::new(),
            dry_run: true,
        };
        write_report(&mut buf, &report);
        let rendered = String::from_utf8(buf).unwrap_or_else(|err| panic!("utf8: {err}"));
        assert_eq!(rendered, "image: eligible=1, deleted=0, skipped=0 (dry run)\n");
    }

    #[test]
    fn write_error_writes_cli_error() {
        let mut buf = Vec::new();
        let err = CliError::Config(ConfigError::MissingField(String::from("missing project")));
        write_error(&mut buf, &err);
        let rendered = String::from_utf8(buf).unwrap_or_else(|err| panic!("utf8: {err}"));
        assert!(
            rendered.contains("missing project"),
            "rendered: {rendered}"
        );
    }
}
