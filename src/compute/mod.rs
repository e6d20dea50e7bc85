//! Compute Engine API abstraction.
//!
//! The janitor core talks to the provider through [`ComputeApi`], a small
//! trait covering the paginated list calls, the delete calls and the three
//! scope-specific operation endpoints. [`ComputeClient`] implements it over
//! the REST API; tests substitute a scripted double.

mod client;
mod error;
mod types;

use std::fmt;
use std::future::Future;
use std::pin::Pin;

use crate::resource::{Resource, Scope};

pub use client::{ComputeClient, DEFAULT_API_ENDPOINT, REQUEST_TIMEOUT};
pub use error::ComputeError;

/// Future returned by [`ComputeApi`] calls.
pub type ComputeFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, ComputeError>> + Send + 'a>>;

/// One page of a listing together with its continuation token.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Page<T> {
    /// Items in API order.
    pub items: Vec<T>,
    /// Token for the next page; `None` on the last page.
    pub next_page_token: Option<String>,
}

impl<T> Page<T> {
    /// Builds a terminal page.
    #[must_use]
    pub const fn last(items: Vec<T>) -> Self {
        Self {
            items,
            next_page_token: None,
        }
    }

    /// Builds a page that continues with `token`.
    #[must_use]
    pub fn continued(items: Vec<T>, token: impl Into<String>) -> Self {
        Self {
            items,
            next_page_token: Some(token.into()),
        }
    }
}

/// Lifecycle state of an asynchronous operation.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum OperationStatus {
    /// Accepted but not started.
    Pending,
    /// In progress.
    Running,
    /// Completed successfully.
    Done,
    /// Completed with an error.
    Failed,
}

impl OperationStatus {
    /// Returns `true` once no further transitions are possible.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Done | Self::Failed)
    }

    /// Returns the upper-case label used by the API.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "PENDING",
            Self::Running => "RUNNING",
            Self::Done => "DONE",
            Self::Failed => "FAILED",
        }
    }
}

impl fmt::Display for OperationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Snapshot of an asynchronous delete operation.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Operation {
    /// Operation name, used to query its status.
    pub id: String,
    /// Self-link of the resource being acted on.
    pub target_link: String,
    /// Current status.
    pub status: OperationStatus,
    /// Endpoint family that tracks the operation.
    pub scope: Scope,
    /// Server-side start time, when reported.
    pub start_time: Option<String>,
    /// Error summary for failed operations.
    pub error: Option<String>,
}

/// Calls the janitor needs from the Compute Engine API.
pub trait ComputeApi: Send + Sync {
    /// Lists one page of images in `project`, newest first.
    fn list_images<'a>(
        &'a self,
        project: &'a str,
        page_token: Option<&'a str>,
    ) -> ComputeFuture<'a, Page<Resource>>;

    /// Lists one page of zone names available to `project`.
    fn list_zones<'a>(
        &'a self,
        project: &'a str,
        page_token: Option<&'a str>,
    ) -> ComputeFuture<'a, Page<String>>;

    /// Lists one page of instances in `zone`, newest first.
    fn list_instances<'a>(
        &'a self,
        project: &'a str,
        zone: &'a str,
        page_token: Option<&'a str>,
    ) -> ComputeFuture<'a, Page<Resource>>;

    /// Issues an image delete and returns the resulting operation.
    fn delete_image<'a>(&'a self, project: &'a str, name: &'a str)
    -> ComputeFuture<'a, Operation>;

    /// Issues an instance delete and returns the resulting operation.
    fn delete_instance<'a>(
        &'a self,
        project: &'a str,
        zone: &'a str,
        name: &'a str,
    ) -> ComputeFuture<'a, Operation>;

    /// Fetches a zonal operation.
    fn get_zone_operation<'a>(
        &'a self,
        project: &'a str,
        zone: &'a str,
        operation: &'a str,
    ) -> ComputeFuture<'a, Operation>;

    /// Fetches a regional operation.
    fn get_region_operation<'a>(
        &'a self,
        project: &'a str,
        region: &'a str,
        operation: &'a str,
    ) -> ComputeFuture<'a, Operation>;

    /// Fetches a global operation.
    fn get_global_operation<'a>(
        &'a self,
        project: &'a str,
        operation: &'a str,
    ) -> ComputeFuture<'a, Operation>;
}

#[cfg(test)]
mod tests;
