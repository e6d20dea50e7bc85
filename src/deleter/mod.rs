//! Kind-specific delete capability used by the deletion engine.
//!
//! Each [`ResourceDeleter`] knows how to issue the delete for one resource and
//! how to reach the status endpoint that tracks the resulting operation. The
//! engine stays agnostic of resource kinds.

use std::sync::Arc;

use crate::compute::{ComputeApi, ComputeFuture, Operation};
use crate::resource::{Resource, ResourceKind, Scope};

/// Queries the status of operations on one endpoint family.
#[derive(Clone)]
pub struct StatusQuerier {
    api: Arc<dyn ComputeApi>,
    project: String,
    endpoint: Scope,
}

impl StatusQuerier {
    /// Creates a querier for operations tracked on `endpoint`.
    #[must_use]
    pub fn new(api: Arc<dyn ComputeApi>, project: impl Into<String>, endpoint: Scope) -> Self {
        Self {
            api,
            project: project.into(),
            endpoint,
        }
    }

    /// Endpoint family this querier talks to.
    #[must_use]
    pub const fn endpoint(&self) -> &Scope {
        &self.endpoint
    }

    /// Fetches the current state of operation `id`.
    pub fn fetch<'a>(&'a self, id: &'a str) -> ComputeFuture<'a, Operation> {
        match &self.endpoint {
            Scope::Zone(zone) => self.api.get_zone_operation(&self.project, zone, id),
            Scope::Region(region) => self.api.get_region_operation(&self.project, region, id),
            Scope::Global => self.api.get_global_operation(&self.project, id),
        }
    }
}

impl std::fmt::Debug for StatusQuerier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StatusQuerier")
            .field("project", &self.project)
            .field("endpoint", &self.endpoint)
            .finish_non_exhaustive()
    }
}

/// Deletes one resource and exposes how to track the resulting operation.
pub trait ResourceDeleter: Send + Sync {
    /// Resource this deleter acts on.
    fn resource(&self) -> &Resource;

    /// Project owning the resource.
    fn project(&self) -> &str;

    /// Location the delete is issued against.
    fn scope(&self) -> Scope;

    /// Issues the delete request.
    fn issue_delete(&self) -> ComputeFuture<'_, Operation>;

    /// Returns a querier for the endpoint that tracks `operation`.
    fn status_querier(&self, operation: &Operation) -> StatusQuerier;
}

/// A unit of work for the deletion engine.
pub type DeletionJob = Box<dyn ResourceDeleter>;

/// Deletes a global image.
pub struct ImageDeleter {
    api: Arc<dyn ComputeApi>,
    project: String,
    resource: Resource,
}

impl ImageDeleter {
    /// Creates a deleter for `resource` in `project`.
    #[must_use]
    pub fn new(api: Arc<dyn ComputeApi>, project: impl Into<String>, resource: Resource) -> Self {
        Self {
            api,
            project: project.into(),
            resource,
        }
    }
}

impl ResourceDeleter for ImageDeleter {
    fn resource(&self) -> &Resource {
        &self.resource
    }

    fn project(&self) -> &str {
        &self.project
    }

    fn scope(&self) -> Scope {
        Scope::Global
    }

    fn issue_delete(&self) -> ComputeFuture<'_, Operation> {
        self.api.delete_image(self.project(), &self.resource.name)
    }

    fn status_querier(&self, operation: &Operation) -> StatusQuerier {
        StatusQuerier::new(Arc::clone(&self.api), self.project(), operation.scope.clone())
    }
}

/// Deletes a zonal instance.
pub struct InstanceDeleter {
    api: Arc<dyn ComputeApi>,
    project: String,
    resource: Resource,
}

impl InstanceDeleter {
    /// Creates a deleter for `resource` in `project`.
    #[must_use]
    pub fn new(api: Arc<dyn ComputeApi>, project: impl Into<String>, resource: Resource) -> Self {
        Self {
            api,
            project: project.into(),
            resource,
        }
    }

    fn zone(&self) -> &str {
        match &self.resource.scope {
            Scope::Zone(zone) => zone,
            Scope::Region(region) => region,
            Scope::Global => "",
        }
    }
}

impl ResourceDeleter for InstanceDeleter {
    fn resource(&self) -> &Resource {
        &self.resource
    }

    fn project(&self) -> &str {
        &self.project
    }

    fn scope(&self) -> Scope {
        Scope::zone(self.zone())
    }

    fn issue_delete(&self) -> ComputeFuture<'_, Operation> {
        self.api
            .delete_instance(self.project(), self.zone(), &self.resource.name)
    }

    fn status_querier(&self, operation: &Operation) -> StatusQuerier {
        // Instance operations are zonal even when the response omits the zone.
        let endpoint = match &operation.scope {
            Scope::Global => self.scope(),
            other => other.clone(),
        };
        StatusQuerier::new(Arc::clone(&self.api), self.project(), endpoint)
    }
}

/// Wraps each resource in the deleter for `kind`.
#[must_use]
pub fn deletion_jobs(
    kind: ResourceKind,
    api: &Arc<dyn ComputeApi>,
    project: &str,
    resources: Vec<Resource>,
) -> Vec<DeletionJob> {
    resources
        .into_iter()
        .map(|resource| -> DeletionJob {
            match kind {
                ResourceKind::Image => {
                    Box::new(ImageDeleter::new(Arc::clone(api), project, resource))
                }
                ResourceKind::Instance => {
                    Box::new(InstanceDeleter::new(Arc::clone(api), project, resource))
                }
            }
        })
        .collect()
}
