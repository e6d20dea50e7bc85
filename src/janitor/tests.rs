//! Unit tests for the janitor module.

use std::sync::Arc;
use std::time::Duration;

use rstest::rstest;

use super::*;
use crate::compute::{ComputeError, OperationStatus, Page};
use crate::filter::{Stage, Verdict};
use crate::resource::{Resource, Scope};
use crate::test_support::{ComputeCall, RecordingSink, ScriptedCompute, operation};

const OLD: &str = "2020-01-01T00:00:00Z";
const OLDER: &str = "2019-01-01T00:00:00Z";

fn config() -> JanitorConfig {
    let mut cfg = JanitorConfig::new("proj").unwrap_or_else(|err| panic!("config: {err}"));
    cfg.poll_interval = Duration::from_millis(5);
    cfg.operation_timeout = Duration::from_secs(5);
    cfg
}

fn janitor(fake: &ScriptedCompute, cfg: JanitorConfig, sink: &RecordingSink) -> Janitor {
    Janitor::new(Arc::new(fake.clone()), cfg, Arc::new(sink.clone()))
        .unwrap_or_else(|err| panic!("janitor: {err}"))
}

fn seed_images(fake: &ScriptedCompute) {
    fake.push_image_page(Ok(Page::last(vec![
        Resource::image("web-2", OLD),
        Resource::image("web-1", OLDER),
        Resource::image("api-1", OLDER),
        Resource::image("tmp-ephemeral-9", OLDER),
        Resource::image("tmp-ephemeral-8", OLDER),
    ])));
}

fn seed_instances(fake: &ScriptedCompute) {
    fake.push_zone_page(Ok(Page::last(vec![String::from("us-central1-a")])));
    fake.push_instance_page(
        "us-central1-a",
        Ok(Page::last(vec![
            Resource::instance("worker-2", OLD, "us-central1-a"),
            Resource::instance("worker-1", OLDER, "us-central1-a"),
        ])),
    );
}

fn has_delete_calls(fake: &ScriptedCompute) -> bool {
    fake.calls().iter().any(|call| {
        matches!(
            call,
            ComputeCall::DeleteImage { .. } | ComputeCall::DeleteInstance { .. }
        )
    })
}

#[rstest]
fn janitor_config_defaults_to_dry_run() {
    let cfg = JanitorConfig::new("  proj ").unwrap_or_else(|err| panic!("config: {err}"));
    assert_eq!(cfg.project, "proj");
    assert!(cfg.dry_run);
    assert_eq!(cfg.workers.get(), 10);
    assert_eq!(cfg.max_age, Duration::from_secs(2_592_000));
    assert_eq!(cfg.naming_delimiter, "-");
}

#[rstest]
fn janitor_config_rejects_blank_project() {
    let err = JanitorConfig::new("  ").expect_err("blank project");
    assert_eq!(
        err,
        JanitorError::InvalidConfig {
            field: String::from("project"),
            message: String::from("must not be blank"),
        }
    );
}

#[rstest]
fn janitor_rejects_empty_delimiter() {
    let mut cfg = config();
    cfg.naming_delimiter = String::new();
    let result = Janitor::new(
        Arc::new(ScriptedCompute::new()),
        cfg,
        Arc::new(RecordingSink::new()),
    );
    assert!(matches!(
        result,
        Err(JanitorError::InvalidConfig { ref field, .. }) if field == "naming_delimiter"
    ));
}

#[rstest]
fn janitor_rejects_invalid_blacklist_pattern() {
    let mut cfg = config();
    cfg.instance_blacklist = vec![String::from("[broken")];
    let result = Janitor::new(
        Arc::new(ScriptedCompute::new()),
        cfg,
        Arc::new(RecordingSink::new()),
    );
    assert!(matches!(result, Err(JanitorError::Filter(_))));
}

#[tokio::test]
async fn select_eligible_applies_every_stage() {
    let fake = ScriptedCompute::new();
    seed_images(&fake);
    let sink = RecordingSink::new();
    let mut cfg = config();
    cfg.image_blacklist = vec![String::from("^tmp-.*")];

    let selection = janitor(&fake, cfg, &sink)
        .select_eligible(ResourceKind::Image)
        .await
        .unwrap_or_else(|err| panic!("selection: {err}"));

    let names: Vec<_> = selection
        .eligible
        .iter()
        .map(|resource| resource.name.as_str())
        .collect();
    assert_eq!(names, vec!["web-1"]);
    assert_eq!(sink.for_stage(Stage::Blacklist).len(), 5);
    assert!(
        sink.for_stage(Stage::Singleton)
            .iter()
            .any(|decision| decision.resource == "api-1" && decision.verdict == Verdict::Retained)
    );
}

#[tokio::test]
async fn dry_run_selects_but_never_deletes() {
    let fake = ScriptedCompute::new();
    seed_images(&fake);
    let sink = RecordingSink::new();

    let report = janitor(&fake, config(), &sink)
        .sweep_kind(ResourceKind::Image)
        .await
        .unwrap_or_else(|err| panic!("sweep: {err}"));

    assert!(report.dry_run);
    assert_eq!(report.eligible, vec!["web-1", "tmp-ephemeral-8"]);
    assert!(report.deleted.is_empty());
    assert!(!has_delete_calls(&fake));
    assert!(!sink.decisions().is_empty());
}

#[tokio::test]
async fn live_run_deletes_eligible_resources() {
    let fake = ScriptedCompute::new();
    seed_instances(&fake);
    let zone = Scope::Zone(String::from("us-central1-a"));
    fake.on_delete("worker-1", Ok(operation("op-w1", OperationStatus::Pending, zone.clone())));
    fake.push_operation("op-w1", Ok(operation("op-w1", OperationStatus::Done, zone)));
    let mut cfg = config();
    cfg.dry_run = false;

    let report = janitor(&fake, cfg, &RecordingSink::new())
        .sweep_kind(ResourceKind::Instance)
        .await
        .unwrap_or_else(|err| panic!("sweep: {err}"));

    assert_eq!(report.deleted, vec!["worker-1"]);
    assert!(fake.calls().contains(&ComputeCall::DeleteInstance {
        zone: String::from("us-central1-a"),
        name: String::from("worker-1"),
    }));
}

#[tokio::test]
async fn deletion_failures_surface_as_janitor_errors() {
    let fake = ScriptedCompute::new();
    seed_instances(&fake);
    fake.on_delete(
        "worker-1",
        Err(ComputeError::Api {
            status: 409,
            url: String::from("https://compute.test/instances/worker-1"),
            body: String::from("conflict"),
        }),
    );
    let mut cfg = config();
    cfg.dry_run = false;

    let err = janitor(&fake, cfg, &RecordingSink::new())
        .sweep_kind(ResourceKind::Instance)
        .await
        .expect_err("delete fails");
    let JanitorError::Deletion { kind, source } = err else {
        panic!("expected deletion error, got {err:?}");
    };
    assert_eq!(kind, ResourceKind::Instance);
    assert_eq!(source.failures.len(), 1);
}

#[tokio::test]
async fn listing_failure_in_one_kind_does_not_abort_the_other() {
    let fake = ScriptedCompute::new();
    seed_images(&fake);
    fake.push_zone_page(Err(ComputeError::Transport {
        url: String::from("https://compute.test/zones"),
        message: String::from("timed out"),
    }));

    let summary = janitor(&fake, config(), &RecordingSink::new())
        .sweep()
        .await;

    assert!(!summary.is_clean());
    assert!(summary.images.is_ok());
    assert!(matches!(summary.instances, Err(JanitorError::List(_))));
    assert_eq!(summary.outcomes().count(), 2);
}

#[tokio::test]
async fn delete_singletons_makes_lone_resources_eligible() {
    let fake = ScriptedCompute::new();
    fake.push_image_page(Ok(Page::last(vec![Resource::image("lonely", OLD)])));
    let mut cfg = config();
    cfg.delete_singletons = true;

    let report = janitor(&fake, cfg, &RecordingSink::new())
        .sweep_kind(ResourceKind::Image)
        .await
        .unwrap_or_else(|err| panic!("sweep: {err}"));
    assert_eq!(report.eligible, vec!["lonely"]);
}

#[tokio::test]
async fn max_age_keeps_recent_resources() {
    let fake = ScriptedCompute::new();
    fake.push_image_page(Ok(Page::last(vec![
        Resource::image("web-2", OLD),
        Resource::image("web-1", OLDER),
    ])));
    let mut cfg = config();
    cfg.max_age = Duration::from_secs(100 * 365 * 24 * 60 * 60);

    let report = janitor(&fake, cfg, &RecordingSink::new())
        .sweep_kind(ResourceKind::Image)
        .await
        .unwrap_or_else(|err| panic!("sweep: {err}"));
    assert!(report.eligible.is_empty());
}
