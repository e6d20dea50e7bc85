//! Unit tests for settings validation and resolution.

use camino::Utf8PathBuf;
use cap_std::{ambient_authority, fs_utf8::Dir};
use rstest::{fixture, rstest};
use tempfile::TempDir;

use super::*;
use crate::test_support::EnvGuard;

#[fixture]
fn settings() -> JanitorSettings {
    JanitorSettings {
        project: Some(String::from("my-project")),
        access_token: Some(String::from("ya29.token")),
        api_endpoint: String::from(DEFAULT_API_ENDPOINT),
        name_delimiter: String::from("-"),
        workers: 10,
        older_than_secs: 2_592_000,
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

#[rstest]
fn valid_settings_resolve_to_a_dry_run(settings: JanitorSettings) {
    let resolved = settings
        .resolve()
        .unwrap_or_else(|err| panic!("settings should resolve: {err}"));
    assert_eq!(resolved.janitor.project, "my-project");
    assert!(resolved.janitor.dry_run);
    assert_eq!(resolved.janitor.workers.get(), 10);
    assert_eq!(resolved.janitor.max_age, Duration::from_secs(2_592_000));
    assert_eq!(resolved.janitor.poll_interval, Duration::from_secs(3));
    assert_eq!(resolved.janitor.operation_timeout, Duration::from_secs(600));
    assert_eq!(resolved.access_token, "ya29.token");
    assert_eq!(resolved.logging, LogOptions::default());
}

#[rstest]
fn not_dry_run_enables_deletion(mut settings: JanitorSettings) {
    settings.not_dry_run = true;
    settings.delete_singletons = true;
    let resolved = settings
        .resolve()
        .unwrap_or_else(|err| panic!("settings should resolve: {err}"));
    assert!(!resolved.janitor.dry_run);
    assert!(resolved.janitor.delete_singletons);
}

#[rstest]
#[case::project(
    |cfg: &mut JanitorSettings| cfg.project = None,
    "JANITOR_PROJECT",
    "project"
)]
#[case::blank_project(
    |cfg: &mut JanitorSettings| cfg.project = Some(String::from("  ")),
    "JANITOR_PROJECT",
    "project"
)]
#[case::token(
    |cfg: &mut JanitorSettings| cfg.access_token = None,
    "JANITOR_ACCESS_TOKEN",
    "access_token"
)]
fn missing_fields_produce_actionable_errors(
    mut settings: JanitorSettings,
    #[case] mutate: fn(&mut JanitorSettings),
    #[case] env_var: &str,
    #[case] toml_key: &str,
) {
    mutate(&mut settings);
    let error = settings.validate().expect_err("validation should fail");
    let ConfigError::MissingField(ref message) = error else {
        panic!("expected MissingField error, got {error:?}");
    };
    assert!(
        message.contains(env_var),
        "error should mention env var {env_var}: {message}"
    );
    assert!(
        message.contains("compute-janitor.toml"),
        "error should mention config file: {message}"
    );
    assert!(
        message.contains(toml_key),
        "error should mention TOML key {toml_key}: {message}"
    );
}

#[rstest]
#[case::delimiter(|cfg: &mut JanitorSettings| cfg.name_delimiter.clear(), "JANITOR_NAME_DELIMITER")]
#[case::workers(|cfg: &mut JanitorSettings| cfg.workers = 0, "JANITOR_WORKERS")]
#[case::poll(|cfg: &mut JanitorSettings| cfg.poll_interval_secs = 0, "JANITOR_POLL_INTERVAL_SECS")]
#[case::timeout(
    |cfg: &mut JanitorSettings| cfg.operation_timeout_secs = 0,
    "JANITOR_OPERATION_TIMEOUT_SECS"
)]
#[case::verbosity(
    |cfg: &mut JanitorSettings| cfg.verbosity = String::from("chatty"),
    "JANITOR_VERBOSITY"
)]
#[case::format(
    |cfg: &mut JanitorSettings| cfg.log_format = String::from("xml"),
    "JANITOR_LOG_FORMAT"
)]
fn unusable_values_are_rejected(
    mut settings: JanitorSettings,
    #[case] mutate: fn(&mut JanitorSettings),
    #[case] env_var: &str,
) {
    mutate(&mut settings);
    let error = settings.resolve().expect_err("resolution should fail");
    let ConfigError::Invalid(ref message) = error else {
        panic!("expected Invalid error, got {error:?}");
    };
    assert!(
        message.contains(env_var),
        "error should mention env var {env_var}: {message}"
    );
}

#[rstest]
fn blacklist_file_is_loaded_per_kind(mut settings: JanitorSettings) {
    let tmp = TempDir::new().unwrap_or_else(|err| panic!("tempdir: {err}"));
    let root = Utf8PathBuf::from_path_buf(tmp.path().to_path_buf())
        .unwrap_or_else(|path| panic!("temp dir should be utf8: {}", path.display()));
    Dir::open_ambient_dir(&root, ambient_authority())
        .unwrap_or_else(|err| panic!("open temp dir: {err}"))
        .write(
            "blacklist.yaml",
            "images:\n  - '^base-.*'\ninstances:\n  - '^bastion$'\n",
        )
        .unwrap_or_else(|err| panic!("write blacklist: {err}"));
    settings.blacklist_file = Some(root.join("blacklist.yaml").into_string());

    let resolved = settings
        .resolve()
        .unwrap_or_else(|err| panic!("settings should resolve: {err}"));
    assert_eq!(resolved.janitor.image_blacklist, vec!["^base-.*"]);
    assert_eq!(resolved.janitor.instance_blacklist, vec!["^bastion$"]);
}

#[rstest]
fn missing_blacklist_file_is_reported(mut settings: JanitorSettings) {
    settings.blacklist_file = Some(String::from("/nonexistent/compute-janitor/blacklist.yaml"));
    let error = settings.resolve().expect_err("file is missing");
    assert!(matches!(error, ConfigError::Blacklist(BlacklistError::Read { .. })));
}

#[rstest]
fn logging_options_follow_settings(mut settings: JanitorSettings) {
    settings.verbosity = String::from("debug");
    settings.log_format = String::from("json");
    settings.log_file = Some(String::from("/var/log/janitor.log"));
    let resolved = settings
        .resolve()
        .unwrap_or_else(|err| panic!("settings should resolve: {err}"));
    assert_eq!(
        resolved.logging,
        LogOptions {
            verbosity: Verbosity::Debug,
            format: LogFormat::Json,
            file: Some(String::from("/var/log/janitor.log")),
        }
    );
}

#[tokio::test]
async fn settings_load_from_environment() {
    let _guard = EnvGuard::set_vars(&[
        ("JANITOR_PROJECT", "env-project"),
        ("JANITOR_ACCESS_TOKEN", "env-token"),
        ("JANITOR_WORKERS", "4"),
    ])
    .await;

    let loaded = JanitorSettings::load_without_cli_args()
        .unwrap_or_else(|err| panic!("settings should load from env: {err}"));

    assert_eq!(loaded.project.as_deref(), Some("env-project"));
    assert_eq!(loaded.access_token.as_deref(), Some("env-token"));
    assert_eq!(loaded.workers, 4);
    assert_eq!(loaded.name_delimiter, "-");
    assert_eq!(loaded.older_than_secs, 2_592_000);
    assert!(!loaded.not_dry_run);
}
