//! Wire representations of Compute Engine responses.

use serde::Deserialize;

use crate::resource::{Resource, Scope};

use super::{ComputeError, Operation, OperationStatus, Page};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(super) struct ListResponse<T> {
    #[serde(default = "Vec::new")]
    pub(super) items: Vec<T>,
    pub(super) next_page_token: Option<String>,
}

impl<T> ListResponse<T> {
    pub(super) fn into_page<U>(self, convert: impl Fn(T) -> U) -> Page<U> {
        Page {
            items: self.items.into_iter().map(convert).collect(),
            next_page_token: self.next_page_token.filter(|token| !token.is_empty()),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(super) struct ImageItem {
    pub(super) name: String,
    #[serde(default)]
    pub(super) creation_timestamp: String,
    pub(super) family: Option<String>,
}

impl From<ImageItem> for Resource {
    fn from(value: ImageItem) -> Self {
        Self::image(value.name, value.creation_timestamp).with_family(value.family)
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(super) struct InstanceItem {
    pub(super) name: String,
    #[serde(default)]
    pub(super) creation_timestamp: String,
    #[serde(default)]
    pub(super) zone: String,
}

impl InstanceItem {
    /// Falls back to the zone being listed when the item omits its own.
    pub(super) fn into_resource(self, listed_zone: &str) -> Resource {
        let zone = if self.zone.is_empty() {
            listed_zone
        } else {
            self.zone.as_str()
        };
        Resource::instance(self.name, self.creation_timestamp, zone)
    }
}

#[derive(Debug, Deserialize)]
pub(super) struct ZoneItem {
    pub(super) name: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(super) struct OperationBody {
    name: String,
    status: String,
    #[serde(default)]
    target_link: String,
    zone: Option<String>,
    region: Option<String>,
    start_time: Option<String>,
    error: Option<OperationErrorBody>,
}

#[derive(Debug, Deserialize)]
struct OperationErrorBody {
    #[serde(default)]
    errors: Vec<OperationErrorItem>,
}

#[derive(Debug, Deserialize)]
struct OperationErrorItem {
    #[serde(default)]
    code: String,
    #[serde(default)]
    message: String,
}

impl TryFrom<OperationBody> for Operation {
    type Error = ComputeError;

    fn try_from(value: OperationBody) -> Result<Self, Self::Error> {
        let error = value.error.and_then(|body| {
            let rendered = body
                .errors
                .iter()
                .map(|item| format!("{}: {}", item.code, item.message))
                .collect::<Vec<_>>();
            (!rendered.is_empty()).then(|| rendered.join("; "))
        });

        let status = match value.status.as_str() {
            "PENDING" => OperationStatus::Pending,
            "RUNNING" => OperationStatus::Running,
            "DONE" if error.is_some() => OperationStatus::Failed,
            "DONE" => OperationStatus::Done,
            other => {
                return Err(ComputeError::Decode {
                    resource: String::from("operation"),
                    message: format!("unknown operation status '{other}'"),
                });
            }
        };

        let scope = match (value.zone.as_deref(), value.region.as_deref()) {
            (Some(zone), _) if !zone.is_empty() => Scope::zone(zone),
            (_, Some(region)) if !region.is_empty() => Scope::region(region),
            _ => Scope::Global,
        };

        Ok(Self {
            id: value.name,
            target_link: value.target_link,
            status,
            scope,
            start_time: value.start_time,
            error,
        })
    }
}
