//! Core library for the Compute Engine janitor.
//!
//! The crate lists a project's images and instances, filters them down to
//! stale candidates (blacklist, then newest-per-scheme, then age) and deletes
//! the survivors through a bounded pool of workers that poll each long-running
//! operation to completion.

pub mod compute;
pub mod config;
pub mod deleter;
pub mod engine;
pub mod filter;
pub mod janitor;
pub mod lister;
pub mod logging;
pub mod resource;
pub mod test_support;

pub use compute::{ComputeApi, ComputeClient, ComputeError, Operation, OperationStatus};
pub use config::{ConfigError, JanitorSettings, ResolvedSettings};
pub use deleter::{DeletionJob, ImageDeleter, InstanceDeleter, ResourceDeleter, StatusQuerier};
pub use engine::{DeletionEngine, DeletionError, DeletionSummary, JobFailure};
pub use filter::{Decision, DecisionSink, FilterPolicy, Selection, TracingDecisionSink};
pub use janitor::{Janitor, JanitorConfig, JanitorError, KindReport, SweepSummary};
pub use lister::ListError;
pub use resource::{Resource, ResourceKind, Scope};
