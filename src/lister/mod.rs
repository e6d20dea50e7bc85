//! Paginated enumeration of images and instances.
//!
//! Listing is all-or-nothing: a failure on any page (or any zone) aborts the
//! listing for that kind so the filter never sees a partial view.

use thiserror::Error;
use tracing::debug;

use crate::compute::{ComputeApi, ComputeError};
use crate::resource::{Resource, ResourceKind};

/// Errors raised while enumerating resources.
#[derive(Clone, Debug, Error, Eq, PartialEq)]
pub enum ListError {
    /// Raised when listing zones fails.
    #[error("failed to list zones: {source}")]
    Zones {
        /// Underlying API error.
        #[source]
        source: ComputeError,
    },
    /// Raised when a page of resources cannot be fetched.
    #[error("failed to list {kind}s{}: {source}", zone_suffix(.zone.as_deref()))]
    Resources {
        /// Kind being listed.
        kind: ResourceKind,
        /// Zone being listed, for instances.
        zone: Option<String>,
        /// Underlying API error.
        #[source]
        source: ComputeError,
    },
}

fn zone_suffix(zone: Option<&str>) -> String {
    zone.map_or_else(String::new, |name| format!(" in zone {name}"))
}

/// Lists every image in `project`, following continuation tokens.
///
/// # Errors
///
/// Returns [`ListError::Resources`] when any page fails.
pub async fn list_images(api: &dyn ComputeApi, project: &str) -> Result<Vec<Resource>, ListError> {
    let mut images = Vec::new();
    let mut token: Option<String> = None;
    loop {
        let page = api
            .list_images(project, token.as_deref())
            .await
            .map_err(|source| ListError::Resources {
                kind: ResourceKind::Image,
                zone: None,
                source,
            })?;
        record_found(&mut images, page.items, project);
        match page.next_page_token {
            Some(next) => token = Some(next),
            None => break,
        }
    }
    debug!(
        event = "janitor.list.complete",
        kind = %ResourceKind::Image,
        count = images.len(),
    );
    Ok(images)
}

fn record_found(found: &mut Vec<Resource>, items: Vec<Resource>, project: &str) {
    for resource in items {
        debug!(
            event = "janitor.list.found",
            kind = %resource.kind,
            project,
            resource = %resource.name,
            creation_timestamp = %resource.creation_timestamp,
            scope = %resource.scope,
            family = resource.family.as_deref().unwrap_or(""),
        );
        found.push(resource);
    }
}

/// Lists every zone visible to `project`.
///
/// # Errors
///
/// Returns [`ListError::Zones`] when any page fails.
pub async fn list_zones(api: &dyn ComputeApi, project: &str) -> Result<Vec<String>, ListError> {
    let mut zones = Vec::new();
    let mut token: Option<String> = None;
    loop {
        let page = api
            .list_zones(project, token.as_deref())
            .await
            .map_err(|source| ListError::Zones { source })?;
        zones.extend(page.items);
        match page.next_page_token {
            Some(next) => token = Some(next),
            None => break,
        }
    }
    Ok(zones)
}

/// Lists every instance in every zone of `project`.
///
/// Zones are visited in the order the API returns them; instances keep the
/// API order within each zone.
///
/// # Errors
///
/// Returns [`ListError`] when the zone listing or any instance page fails.
pub async fn list_instances(
    api: &dyn ComputeApi,
    project: &str,
) -> Result<Vec<Resource>, ListError> {
    let zones = list_zones(api, project).await?;
    let mut instances = Vec::new();
    for zone in &zones {
        let mut token: Option<String> = None;
        loop {
            let page = api
                .list_instances(project, zone, token.as_deref())
                .await
                .map_err(|source| ListError::Resources {
                    kind: ResourceKind::Instance,
                    zone: Some(zone.clone()),
                    source,
                })?;
            record_found(&mut instances, page.items, project);
            match page.next_page_token {
                Some(next) => token = Some(next),
                None => break,
            }
        }
    }
    debug!(
        event = "janitor.list.complete",
        kind = %ResourceKind::Instance,
        zones = zones.len(),
        count = instances.len(),
    );
    Ok(instances)
}

/// Lists every resource of `kind`.
///
/// # Errors
///
/// Propagates the error of the kind-specific listing.
pub async fn list(
    api: &dyn ComputeApi,
    project: &str,
    kind: ResourceKind,
) -> Result<Vec<Resource>, ListError> {
    match kind {
        ResourceKind::Image => list_images(api, project).await,
        ResourceKind::Instance => list_instances(api, project).await,
    }
}
