//! Command-line interface definitions for the `compute-janitor` binary.
//!
//! This module centralises the clap parser structures so both the main binary
//! and the build script can reuse them when generating the manual page.

use clap::Parser;

/// Top-level CLI for the `compute-janitor` binary.
///
/// Every flag is optional and overrides the value loaded from
/// `compute-janitor.toml` or `JANITOR_*` environment variables.
#[derive(Debug, Parser)]
#[command(
    name = "compute-janitor",
    version,
    about = "Delete stale Compute Engine images and instances"
)]
pub(crate) struct Cli {
    /// Project whose images and instances are reclaimed.
    #[arg(long, value_name = "PROJECT")]
    pub(crate) project: Option<String>,
    /// Compute Engine API base URL.
    #[arg(long, value_name = "URL")]
    pub(crate) api_endpoint: Option<String>,
    /// Delimiter separating a naming scheme from its version suffix.
    #[arg(long, alias = "image-delimiter", value_name = "DELIMITER")]
    pub(crate) name_delimiter: Option<String>,
    /// Concurrent deletions per resource kind.
    #[arg(long, value_name = "COUNT")]
    pub(crate) workers: Option<usize>,
    /// Minimum age in seconds before a resource may be deleted.
    #[arg(long, value_name = "SECONDS")]
    pub(crate) older_than: Option<u64>,
    /// Actually delete resources instead of logging what would be deleted.
    #[arg(long)]
    pub(crate) not_dry_run: bool,
    /// Allow deleting the only resource of a naming scheme.
    #[arg(long)]
    pub(crate) delete_singletons: bool,
    /// YAML file listing name patterns that are never deleted.
    #[arg(long, value_name = "PATH")]
    pub(crate) blacklist_file: Option<String>,
    /// Seconds between operation status queries.
    #[arg(long, value_name = "SECONDS")]
    pub(crate) poll_interval: Option<u64>,
    /// Seconds to wait for a delete operation before giving up.
    #[arg(long, value_name = "SECONDS")]
    pub(crate) operation_timeout: Option<u64>,
    /// Append logs to this file instead of standard error.
    #[arg(long, value_name = "PATH")]
    pub(crate) log_file: Option<String>,
    /// Minimum level logged.
    #[arg(
        long,
        value_name = "LEVEL",
        value_parser = ["trace", "debug", "info", "warn", "error"]
    )]
    pub(crate) verbosity: Option<String>,
    /// Log line format.
    #[arg(long, value_name = "FORMAT", value_parser = ["text", "json"])]
    pub(crate) log_type: Option<String>,
}
