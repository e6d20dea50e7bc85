//! Eligibility pipeline deciding which resources may be deleted.
//!
//! Stages run in a fixed order: blacklist exclusion, then singleton
//! retention, then the age threshold. Each stage is a pure function over an
//! ordered `Vec<Resource>` and reports one [`Decision`] per input resource to
//! the injected [`DecisionSink`].

mod decision;

use std::collections::HashMap;

use chrono::{DateTime, SecondsFormat, Utc};
use regex::Regex;
use thiserror::Error;

use crate::resource::{Resource, ResourceKind};

pub use decision::{Decision, DecisionSink, Reason, Stage, TracingDecisionSink, Verdict};

/// Errors raised while building a filter policy.
#[derive(Clone, Debug, Error, Eq, PartialEq)]
pub enum FilterError {
    /// Raised when a blacklist pattern is not a valid regular expression.
    #[error("invalid blacklist pattern '{pattern}': {message}")]
    InvalidPattern {
        /// Pattern as written in the exclusion list.
        pattern: String,
        /// Compiler message.
        message: String,
    },
}

/// Raised for a resource whose creation timestamp is not RFC3339.
///
/// The resource is left out of the eligible set; the rest of the selection
/// proceeds.
#[derive(Clone, Debug, Error, Eq, PartialEq)]
#[error("cannot parse creation timestamp '{timestamp}' of {kind} {name}: {message}")]
pub struct TimestampParseError {
    /// Resource name.
    pub name: String,
    /// Resource kind.
    pub kind: ResourceKind,
    /// Raw timestamp.
    pub timestamp: String,
    /// Parser message.
    pub message: String,
}

/// Compiled set of name patterns that protect resources from deletion.
#[derive(Clone, Debug, Default)]
pub struct Blacklist {
    patterns: Vec<Regex>,
}

impl Blacklist {
    /// Compiles `patterns`.
    ///
    /// # Errors
    ///
    /// Returns [`FilterError::InvalidPattern`] for the first pattern that
    /// fails to compile.
    pub fn new<I, S>(patterns: I) -> Result<Self, FilterError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let compiled = patterns
            .into_iter()
            .map(|pattern| {
                Regex::new(pattern.as_ref()).map_err(|err| FilterError::InvalidPattern {
                    pattern: pattern.as_ref().to_owned(),
                    message: err.to_string(),
                })
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { patterns: compiled })
    }

    /// Returns `true` when no patterns are configured.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }

    /// Returns the first pattern matching `name`.
    #[must_use]
    pub fn matching(&self, name: &str) -> Option<&str> {
        self.patterns
            .iter()
            .find(|pattern| pattern.is_match(name))
            .map(Regex::as_str)
    }
}

/// Retention policy applied to one resource kind.
#[derive(Clone, Debug)]
pub struct FilterPolicy {
    /// Name patterns that are never deleted.
    pub blacklist: Blacklist,
    /// Delimiter used to derive naming schemes.
    pub naming_delimiter: String,
    /// Skip singleton retention entirely.
    pub delete_singletons: bool,
    /// Resources created strictly before this instant are old enough.
    pub expired_before: DateTime<Utc>,
}

/// Result of running the full pipeline.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct Selection {
    /// Resources eligible for deletion, in listing order.
    pub eligible: Vec<Resource>,
    /// Resources dropped because their timestamp could not be parsed.
    pub skipped: Vec<TimestampParseError>,
}

/// Runs blacklist, singleton and age stages in that order.
#[must_use]
pub fn select(
    resources: Vec<Resource>,
    policy: &FilterPolicy,
    sink: &dyn DecisionSink,
) -> Selection {
    let survivors = blacklist_stage(resources, &policy.blacklist, sink);
    let candidates = singleton_stage(
        survivors,
        &policy.naming_delimiter,
        policy.delete_singletons,
        sink,
    );
    let (eligible, skipped) = age_stage(candidates, policy.expired_before, sink);
    Selection { eligible, skipped }
}

/// Removes resources whose name matches any blacklist pattern.
#[must_use]
pub fn blacklist_stage(
    resources: Vec<Resource>,
    blacklist: &Blacklist,
    sink: &dyn DecisionSink,
) -> Vec<Resource> {
    resources
        .into_iter()
        .filter(|resource| {
            let matched = blacklist.matching(&resource.name);
            let (verdict, reason) = match matched {
                Some(pattern) => (
                    Verdict::Retained,
                    Reason::BlacklistMatch {
                        pattern: pattern.to_owned(),
                    },
                ),
                None => (Verdict::Passed, Reason::NotBlacklisted),
            };
            sink.record(&decision(resource, Stage::Blacklist, verdict, reason));
            matched.is_none()
        })
        .collect()
}

/// Keeps the newest member of every naming scheme; the rest pass on.
///
/// With `delete_singletons` set, every resource passes.
#[must_use]
pub fn singleton_stage(
    resources: Vec<Resource>,
    delimiter: &str,
    delete_singletons: bool,
    sink: &dyn DecisionSink,
) -> Vec<Resource> {
    if delete_singletons {
        for resource in &resources {
            sink.record(&decision(
                resource,
                Stage::Singleton,
                Verdict::Passed,
                Reason::SingletonsIncluded,
            ));
        }
        return resources;
    }

    let verdicts = singleton_verdicts(&resources, delimiter);
    resources
        .into_iter()
        .zip(verdicts)
        .filter_map(|(resource, (verdict, reason))| {
            sink.record(&decision(&resource, Stage::Singleton, verdict, reason));
            (verdict == Verdict::Passed).then_some(resource)
        })
        .collect()
}

fn singleton_verdicts(resources: &[Resource], delimiter: &str) -> Vec<(Verdict, Reason)> {
    let mut groups: HashMap<&str, (usize, &Resource, usize)> = HashMap::new();
    for (index, resource) in resources.iter().enumerate() {
        let scheme = resource.naming_scheme(delimiter);
        groups
            .entry(scheme)
            .and_modify(|(newest_index, newest, size)| {
                *size += 1;
                if is_newer(resource, newest) {
                    *newest_index = index;
                    *newest = resource;
                }
            })
            .or_insert((index, resource, 1));
    }

    resources
        .iter()
        .enumerate()
        .map(|(index, resource)| {
            let scheme = resource.naming_scheme(delimiter);
            let (newest_index, size) = groups
                .get(scheme)
                .map_or((index, 1), |(newest_index, _, size)| (*newest_index, *size));
            let scheme_key = scheme.to_owned();
            if newest_index != index {
                (Verdict::Passed, Reason::Superseded { scheme: scheme_key })
            } else if size == 1 {
                (Verdict::Retained, Reason::Singleton { scheme: scheme_key })
            } else {
                (Verdict::Retained, Reason::LatestVersion { scheme: scheme_key })
            }
        })
        .collect()
}

/// Orders by parsed creation time; unparsable timestamps never win against
/// parsable ones and ties keep the earlier entry.
fn is_newer(candidate: &Resource, current: &Resource) -> bool {
    match (candidate.created_at(), current.created_at()) {
        (Ok(lhs), Ok(rhs)) => lhs > rhs,
        (Ok(_), Err(_)) => true,
        (Err(_), Ok(_)) => false,
        (Err(_), Err(_)) => candidate.creation_timestamp > current.creation_timestamp,
    }
}

/// Keeps resources created strictly before `expired_before`.
///
/// Resources with unparsable timestamps are reported and dropped.
#[must_use]
pub fn age_stage(
    resources: Vec<Resource>,
    expired_before: DateTime<Utc>,
    sink: &dyn DecisionSink,
) -> (Vec<Resource>, Vec<TimestampParseError>) {
    let cutoff = expired_before.to_rfc3339_opts(SecondsFormat::Secs, true);
    let mut eligible = Vec::new();
    let mut skipped = Vec::new();

    for resource in resources {
        match resource.created_at() {
            Ok(created) if created.with_timezone(&Utc) < expired_before => {
                sink.record(&decision(
                    &resource,
                    Stage::Age,
                    Verdict::Passed,
                    Reason::OlderThanCutoff {
                        cutoff: cutoff.clone(),
                    },
                ));
                eligible.push(resource);
            }
            Ok(_) => sink.record(&decision(
                &resource,
                Stage::Age,
                Verdict::Retained,
                Reason::NewerThanCutoff {
                    cutoff: cutoff.clone(),
                },
            )),
            Err(err) => {
                sink.record(&decision(
                    &resource,
                    Stage::Age,
                    Verdict::Error,
                    Reason::UnparsableTimestamp {
                        message: err.to_string(),
                    },
                ));
                skipped.push(TimestampParseError {
                    name: resource.name,
                    kind: resource.kind,
                    timestamp: resource.creation_timestamp,
                    message: err.to_string(),
                });
            }
        }
    }

    (eligible, skipped)
}

fn decision(resource: &Resource, stage: Stage, verdict: Verdict, reason: Reason) -> Decision {
    Decision {
        resource: resource.name.clone(),
        kind: resource.kind,
        stage,
        verdict,
        reason,
    }
}
