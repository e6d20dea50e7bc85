//! Configuration and report types used by the janitor.

use std::num::NonZeroUsize;
use std::time::Duration;

use crate::engine::{DEFAULT_OPERATION_TIMEOUT, DEFAULT_POLL_INTERVAL};
use crate::filter::TimestampParseError;
use crate::resource::ResourceKind;

use super::JanitorError;

/// Default naming-scheme delimiter.
pub const DEFAULT_NAME_DELIMITER: &str = "-";

/// Default number of deletion workers per resource kind.
pub const DEFAULT_WORKERS: NonZeroUsize = NonZeroUsize::MIN.saturating_add(9);

/// Default maximum age before a resource becomes eligible (30 days).
pub const DEFAULT_MAX_AGE: Duration = Duration::from_secs(30 * 24 * 60 * 60);

/// Core configuration for a sweep.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct JanitorConfig {
    /// Project whose resources are reclaimed.
    pub project: String,
    /// Delimiter separating a naming scheme from its version suffix.
    pub naming_delimiter: String,
    /// Concurrent deletions per resource kind.
    pub workers: NonZeroUsize,
    /// Resources older than this are candidates.
    pub max_age: Duration,
    /// Log what would be deleted without deleting.
    pub dry_run: bool,
    /// Allow deleting the only member of a naming scheme.
    pub delete_singletons: bool,
    /// Image name patterns that are never deleted.
    pub image_blacklist: Vec<String>,
    /// Instance name patterns that are never deleted.
    pub instance_blacklist: Vec<String>,
    /// Delay between operation status queries.
    pub poll_interval: Duration,
    /// Deadline for each delete operation.
    pub operation_timeout: Duration,
}

impl JanitorConfig {
    /// Creates a dry-run configuration for `project` with default settings.
    ///
    /// # Errors
    ///
    /// Returns [`JanitorError::InvalidConfig`] when the project is blank.
    pub fn new(project: impl Into<String>) -> Result<Self, JanitorError> {
        let trimmed_project = project.into().trim().to_owned();
        if trimmed_project.is_empty() {
            return Err(JanitorError::InvalidConfig {
                field: String::from("project"),
                message: String::from("must not be blank"),
            });
        }
        Ok(Self {
            project: trimmed_project,
            naming_delimiter: String::from(DEFAULT_NAME_DELIMITER),
            workers: DEFAULT_WORKERS,
            max_age: DEFAULT_MAX_AGE,
            dry_run: true,
            delete_singletons: false,
            image_blacklist: Vec::new(),
            instance_blacklist: Vec::new(),
            poll_interval: DEFAULT_POLL_INTERVAL,
            operation_timeout: DEFAULT_OPERATION_TIMEOUT,
        })
    }

    /// Returns the exclusion patterns for `kind`.
    #[must_use]
    pub fn blacklist_for(&self, kind: ResourceKind) -> &[String] {
        match kind {
            ResourceKind::Image => &self.image_blacklist,
            ResourceKind::Instance => &self.instance_blacklist,
        }
    }
}

/// Outcome of sweeping one resource kind.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct KindReport {
    /// Kind swept.
    pub kind: ResourceKind,
    /// Names selected for deletion, in listing order.
    pub eligible: Vec<String>,
    /// Resources left alone because their timestamp was unparsable.
    pub skipped: Vec<TimestampParseError>,
    /// Names actually deleted; empty on a dry run.
    pub deleted: Vec<String>,
    /// Whether deletion was skipped.
    pub dry_run: bool,
}

/// Results of sweeping every kind.
#[derive(Debug)]
pub struct SweepSummary {
    /// Image sweep outcome.
    pub images: Result<KindReport, JanitorError>,
    /// Instance sweep outcome.
    pub instances: Result<KindReport, JanitorError>,
}

impl SweepSummary {
    /// Returns `true` when neither kind reported an error.
    #[must_use]
    pub const fn is_clean(&self) -> bool {
        self.images.is_ok() && self.instances.is_ok()
    }

    /// Iterates over both outcomes, images first.
    pub fn outcomes(&self) -> impl Iterator<Item = &Result<KindReport, JanitorError>> {
        [&self.images, &self.instances].into_iter()
    }
}
