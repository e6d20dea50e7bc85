//! Stale-resource janitor.
//!
//! The janitor runs one pipeline per resource kind: list everything, select
//! the eligible subset through the filter, then hand the candidates to the
//! deletion engine. Images and instances are swept concurrently; a failure in
//! one kind never aborts the other. On a dry run selection and decision
//! logging still happen in full but nothing is deleted.

mod types;

use std::sync::Arc;

use chrono::{DateTime, TimeDelta, Utc};
use thiserror::Error;
use tracing::{info, warn};

use crate::compute::ComputeApi;
use crate::deleter::deletion_jobs;
use crate::engine::{DeletionEngine, DeletionError};
use crate::filter::{self, Blacklist, DecisionSink, FilterError, FilterPolicy, Selection};
use crate::lister::{self, ListError};
use crate::resource::ResourceKind;

pub use types::{
    DEFAULT_MAX_AGE, DEFAULT_NAME_DELIMITER, DEFAULT_WORKERS, JanitorConfig, KindReport,
    SweepSummary,
};

/// Errors returned by the janitor.
#[derive(Clone, Debug, Error, Eq, PartialEq)]
pub enum JanitorError {
    /// Raised when configuration holds an unusable value.
    #[error("invalid {field}: {message}")]
    InvalidConfig {
        /// Name of the offending field.
        field: String,
        /// What is wrong with it.
        message: String,
    },
    /// Raised when an exclusion pattern does not compile.
    #[error(transparent)]
    Filter(#[from] FilterError),
    /// Raised when listing a kind fails.
    #[error(transparent)]
    List(#[from] ListError),
    /// Raised when at least one deletion failed.
    #[error("{kind} deletion incomplete: {source}")]
    Deletion {
        /// Kind being deleted.
        kind: ResourceKind,
        /// Aggregated per-job failures.
        #[source]
        source: DeletionError,
    },
}

/// Lists, filters and deletes stale images and instances.
pub struct Janitor {
    api: Arc<dyn ComputeApi>,
    config: JanitorConfig,
    image_blacklist: Blacklist,
    instance_blacklist: Blacklist,
    max_age: TimeDelta,
    engine: DeletionEngine,
    sink: Arc<dyn DecisionSink>,
}

impl Janitor {
    /// Creates a janitor talking to `api` and reporting decisions to `sink`.
    ///
    /// # Errors
    ///
    /// Returns [`JanitorError`] when the project or delimiter is blank, the
    /// maximum age is out of range or an exclusion pattern is invalid.
    pub fn new(
        api: Arc<dyn ComputeApi>,
        config: JanitorConfig,
        sink: Arc<dyn DecisionSink>,
    ) -> Result<Self, JanitorError> {
        if config.project.trim().is_empty() {
            return Err(JanitorError::InvalidConfig {
                field: String::from("project"),
                message: String::from("must not be blank"),
            });
        }
        if config.naming_delimiter.is_empty() {
            return Err(JanitorError::InvalidConfig {
                field: String::from("naming_delimiter"),
                message: String::from("must not be empty"),
            });
        }
        let max_age =
            TimeDelta::from_std(config.max_age).map_err(|err| JanitorError::InvalidConfig {
                field: String::from("max_age"),
                message: err.to_string(),
            })?;
        let image_blacklist = Blacklist::new(config.blacklist_for(ResourceKind::Image))?;
        let instance_blacklist = Blacklist::new(config.blacklist_for(ResourceKind::Instance))?;
        let engine = DeletionEngine::new(config.workers)
            .with_poll_interval(config.poll_interval)
            .with_operation_timeout(config.operation_timeout);
        Ok(Self {
            api,
            config,
            image_blacklist,
            instance_blacklist,
            max_age,
            engine,
            sink,
        })
    }

    /// Returns the configuration this janitor runs with.
    #[must_use]
    pub const fn config(&self) -> &JanitorConfig {
        &self.config
    }

    /// Lists every resource of `kind` and returns the deletion candidates.
    ///
    /// # Errors
    ///
    /// Returns [`ListError`] when listing fails; no partial selection is made.
    pub async fn select_eligible(&self, kind: ResourceKind) -> Result<Selection, ListError> {
        self.select_eligible_at(kind, Utc::now()).await
    }

    /// Sweeps a single kind.
    ///
    /// # Errors
    ///
    /// Returns [`JanitorError::List`] when listing fails and
    /// [`JanitorError::Deletion`] when any deletion fails.
    pub async fn sweep_kind(&self, kind: ResourceKind) -> Result<KindReport, JanitorError> {
        self.sweep_kind_at(kind, Utc::now()).await
    }

    /// Sweeps images and instances concurrently against the same clock
    /// reading.
    pub async fn sweep(&self) -> SweepSummary {
        let now = Utc::now();
        let (images, instances) = tokio::join!(
            self.sweep_kind_at(ResourceKind::Image, now),
            self.sweep_kind_at(ResourceKind::Instance, now),
        );
        SweepSummary { images, instances }
    }

    async fn select_eligible_at(
        &self,
        kind: ResourceKind,
        now: DateTime<Utc>,
    ) -> Result<Selection, ListError> {
        let resources = lister::list(self.api.as_ref(), &self.config.project, kind).await?;
        let listed = resources.len();
        let selection = filter::select(resources, &self.policy(kind, now), self.sink.as_ref());
        info!(
            event = "janitor.sweep.selected",
            kind = %kind,
            listed,
            eligible = selection.eligible.len(),
            skipped = selection.skipped.len(),
        );
        Ok(selection)
    }

    async fn sweep_kind_at(
        &self,
        kind: ResourceKind,
        now: DateTime<Utc>,
    ) -> Result<KindReport, JanitorError> {
        let Selection { eligible, skipped } = self.select_eligible_at(kind, now).await?;
        for error in &skipped {
            warn!(event = "janitor.sweep.timestamp_skipped", kind = %kind, error = %error);
        }
        let names: Vec<String> = eligible.iter().map(|resource| resource.name.clone()).collect();

        if self.config.dry_run {
            for name in &names {
                info!(event = "janitor.sweep.would_delete", kind = %kind, resource = %name);
            }
            return Ok(KindReport {
                kind,
                eligible: names,
                skipped,
                deleted: Vec::new(),
                dry_run: true,
            });
        }

        let jobs = deletion_jobs(kind, &self.api, &self.config.project, eligible);
        let summary = self
            .engine
            .delete_all(jobs)
            .await
            .map_err(|source| JanitorError::Deletion { kind, source })?;
        Ok(KindReport {
            kind,
            eligible: names,
            skipped,
            deleted: summary.deleted,
            dry_run: false,
        })
    }

    fn policy(&self, kind: ResourceKind, now: DateTime<Utc>) -> FilterPolicy {
        let blacklist = match kind {
            ResourceKind::Image => self.image_blacklist.clone(),
            ResourceKind::Instance => self.instance_blacklist.clone(),
        };
        FilterPolicy {
            blacklist,
            naming_delimiter: self.config.naming_delimiter.clone(),
            delete_singletons: self.config.delete_singletons,
            expired_before: now
                .checked_sub_signed(self.max_age)
                .unwrap_or(DateTime::<Utc>::MIN_UTC),
        }
    }
}

#[cfg(test)]
mod tests;
