//! Decision records emitted by the eligibility pipeline.

use std::fmt;

use tracing::{info, warn};

use crate::resource::ResourceKind;

/// Pipeline stage that produced a decision.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum Stage {
    /// Exclusion by name pattern.
    Blacklist,
    /// Newest-of-naming-scheme retention.
    Singleton,
    /// Age threshold.
    Age,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Blacklist => "blacklist",
            Self::Singleton => "singleton",
            Self::Age => "age",
        })
    }
}

/// Outcome of a stage for one resource.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum Verdict {
    /// The resource is kept and leaves the pipeline.
    Retained,
    /// The resource moves on to the next stage (or is eligible after the
    /// last stage).
    Passed,
    /// The resource could not be evaluated and leaves the pipeline.
    Error,
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Retained => "retained",
            Self::Passed => "passed",
            Self::Error => "error",
        })
    }
}

/// Why a stage reached its verdict.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum Reason {
    /// Name matched an exclusion pattern.
    BlacklistMatch {
        /// Pattern that matched.
        pattern: String,
    },
    /// Name matched no exclusion pattern.
    NotBlacklisted,
    /// Only member of its naming scheme.
    Singleton {
        /// Naming scheme key.
        scheme: String,
    },
    /// Newest member of a scheme with older siblings.
    LatestVersion {
        /// Naming scheme key.
        scheme: String,
    },
    /// A newer member of the same scheme exists.
    Superseded {
        /// Naming scheme key.
        scheme: String,
    },
    /// Singleton retention is disabled by configuration.
    SingletonsIncluded,
    /// Created strictly before the cutoff.
    OlderThanCutoff {
        /// Cutoff in RFC3339.
        cutoff: String,
    },
    /// Created at or after the cutoff.
    NewerThanCutoff {
        /// Cutoff in RFC3339.
        cutoff: String,
    },
    /// Creation timestamp is not valid RFC3339.
    UnparsableTimestamp {
        /// Parser message.
        message: String,
    },
}

impl fmt::Display for Reason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::BlacklistMatch { pattern } => write!(f, "matches blacklist pattern {pattern}"),
            Self::NotBlacklisted => f.write_str("not blacklisted"),
            Self::Singleton { scheme } => write!(f, "only resource of naming scheme '{scheme}'"),
            Self::LatestVersion { scheme } => {
                write!(f, "newest resource of naming scheme '{scheme}'")
            }
            Self::Superseded { scheme } => {
                write!(f, "superseded by a newer resource of naming scheme '{scheme}'")
            }
            Self::SingletonsIncluded => f.write_str("singleton retention disabled"),
            Self::OlderThanCutoff { cutoff } => write!(f, "created before {cutoff}"),
            Self::NewerThanCutoff { cutoff } => write!(f, "created at or after {cutoff}"),
            Self::UnparsableTimestamp { message } => {
                write!(f, "unparsable creation timestamp: {message}")
            }
        }
    }
}

/// Structured record of one stage's verdict on one resource.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Decision {
    /// Resource name.
    pub resource: String,
    /// Resource kind.
    pub kind: ResourceKind,
    /// Stage that decided.
    pub stage: Stage,
    /// Verdict reached.
    pub verdict: Verdict,
    /// Explanation.
    pub reason: Reason,
}

/// Receives decision records from the eligibility pipeline.
pub trait DecisionSink: Send + Sync {
    /// Records a single decision.
    fn record(&self, decision: &Decision);
}

/// Sink that emits every decision as a `tracing` event.
#[derive(Clone, Copy, Debug, Default)]
pub struct TracingDecisionSink;

impl DecisionSink for TracingDecisionSink {
    fn record(&self, decision: &Decision) {
        if decision.verdict == Verdict::Error {
            warn!(
                event = "janitor.filter.decision",
                kind = %decision.kind,
                resource = %decision.resource,
                stage = %decision.stage,
                verdict = %decision.verdict,
                reason = %decision.reason,
            );
        } else {
            info!(
                event = "janitor.filter.decision",
                kind = %decision.kind,
                resource = %decision.resource,
                stage = %decision.stage,
                verdict = %decision.verdict,
                reason = %decision.reason,
            );
        }
    }
}
