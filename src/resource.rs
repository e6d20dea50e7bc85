//! Immutable snapshots of the compute resources the janitor reasons about.

use std::fmt;

use chrono::{DateTime, FixedOffset};

/// Resource kinds the janitor knows how to reclaim.
#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub enum ResourceKind {
    /// Virtual-machine images (global resources).
    Image,
    /// Running or stopped instances (zonal resources).
    Instance,
}

impl ResourceKind {
    /// Returns the lowercase label used in logs and reports.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Image => "image",
            Self::Instance => "instance",
        }
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Location a resource, or the operation acting on it, lives in.
#[derive(Clone, Debug, Eq, Hash, PartialEq)]
pub enum Scope {
    /// A single zone, for example `us-central1-a`.
    Zone(String),
    /// A region, for example `us-central1`.
    Region(String),
    /// Project-wide resources such as images.
    Global,
}

impl Scope {
    /// Builds a zonal scope from either a bare zone name or a self-link.
    #[must_use]
    pub fn zone(value: &str) -> Self {
        Self::Zone(resource_name_from_url(value).to_owned())
    }

    /// Builds a regional scope from either a bare region name or a self-link.
    #[must_use]
    pub fn region(value: &str) -> Self {
        Self::Region(resource_name_from_url(value).to_owned())
    }
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Zone(zone) => write!(f, "zone:{zone}"),
            Self::Region(region) => write!(f, "region:{region}"),
            Self::Global => f.write_str("global"),
        }
    }
}

/// Point-in-time view of a single image or instance.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Resource {
    /// Resource name, unique within its kind and scope.
    pub name: String,
    /// Creation time as reported by the API (RFC3339).
    pub creation_timestamp: String,
    /// Where the resource lives.
    pub scope: Scope,
    /// Image or instance.
    pub kind: ResourceKind,
    /// Image family, when the API reports one.
    pub family: Option<String>,
}

impl Resource {
    /// Creates a global image snapshot.
    #[must_use]
    pub fn image(name: impl Into<String>, creation_timestamp: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            creation_timestamp: creation_timestamp.into(),
            scope: Scope::Global,
            kind: ResourceKind::Image,
            family: None,
        }
    }

    /// Creates a zonal instance snapshot.
    #[must_use]
    pub fn instance(
        name: impl Into<String>,
        creation_timestamp: impl Into<String>,
        zone: &str,
    ) -> Self {
        Self {
            name: name.into(),
            creation_timestamp: creation_timestamp.into(),
            scope: Scope::zone(zone),
            kind: ResourceKind::Instance,
            family: None,
        }
    }

    /// Sets the image family.
    #[must_use]
    pub fn with_family(mut self, family: Option<String>) -> Self {
        self.family = family;
        self
    }

    /// Parses the creation timestamp as RFC3339.
    ///
    /// # Errors
    ///
    /// Returns the `chrono` parse error when the timestamp is malformed.
    pub fn created_at(&self) -> Result<DateTime<FixedOffset>, chrono::ParseError> {
        DateTime::parse_from_rfc3339(&self.creation_timestamp)
    }

    /// Returns the naming scheme this resource belongs to.
    #[must_use]
    pub fn naming_scheme<'a>(&'a self, delimiter: &str) -> &'a str {
        naming_scheme(&self.name, delimiter)
    }
}

/// Strips the final delimiter-separated segment from `name`.
///
/// `web-v12` with delimiter `-` yields `web`. Names without the delimiter
/// form their own scheme and are returned unchanged.
#[must_use]
pub fn naming_scheme<'a>(name: &'a str, delimiter: &str) -> &'a str {
    if delimiter.is_empty() {
        return name;
    }
    name.rsplit_once(delimiter).map_or(name, |(scheme, _)| scheme)
}

/// Returns the last path segment of a self-link.
///
/// The API reports zones and regions as full URLs
/// (`.../projects/p/zones/us-central1-a`); bare names pass through.
#[must_use]
pub fn resource_name_from_url(value: &str) -> &str {
    value.rsplit('/').next().unwrap_or(value)
}
