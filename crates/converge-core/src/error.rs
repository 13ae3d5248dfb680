//! Error types for convergence
//!
//! Provides error handling for:
//! - Storage lookups of stacks, templates and resources
//! - Template validation
//! - Scheduler handoff
//! - Convergence passes (cycles, ambiguous stacks)
//! - Configuration loading
//! - The simulated converger

use converge_graph::CycleError;
use std::path::PathBuf;

/// Main convergence error type
#[derive(Debug, thiserror::Error)]
pub enum ConvergeError {
    /// The merged graph cannot be ordered; the pass was aborted
    #[error("dependency cycle: {0}")]
    Cycle(#[from] CycleError),

    /// Storage failure (including missing records)
    #[error("storage error: {0}")]
    Store(#[from] StoreError),

    /// Template failed validation
    #[error("invalid template: {0}")]
    Template(#[from] TemplateError),

    /// Ready node could not be handed to the scheduler
    #[error("scheduler error: {0}")]
    Scheduler(#[from] SchedulerError),

    /// More than one stack shares a name
    #[error("multiple stacks named \"{name}\" found ({count})")]
    AmbiguousStack {
        /// Shared name
        name: String,
        /// Number of stacks with it
        count: usize,
    },

    /// Operation needs a stored stack
    #[error("stack \"{0}\" has not been stored")]
    StackNotStored(String),

    /// Operation needs a stored template generation
    #[error("template has not been stored")]
    TemplateNotStored,

    /// A requirer was not resolved before the resource it requires
    #[error("resource \"{0}\" was not resolved")]
    UnresolvedResource(String),
}

impl ConvergeError {
    /// Check if a record was missing
    #[inline]
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            Self::Store(StoreError::NotFound { .. } | StoreError::NameNotFound { .. })
        )
    }

    /// Check if an operator has to fix data or templates before retrying
    #[inline]
    #[must_use]
    pub fn requires_operator(&self) -> bool {
        matches!(
            self,
            Self::Cycle(_) | Self::AmbiguousStack { .. } | Self::Template(_)
        )
    }

    /// Check if error is retryable
    #[inline]
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Scheduler(_))
    }
}

/// Storage errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    /// No record with this key
    #[error("{kind} {key} not found")]
    NotFound {
        /// Record kind
        kind: &'static str,
        /// Missing key
        key: String,
    },

    /// No record with this name
    #[error("{kind} \"{name}\" not found")]
    NameNotFound {
        /// Record kind
        kind: &'static str,
        /// Missing name
        name: String,
    },
}

impl StoreError {
    /// Create not-found error for a key
    pub fn not_found(kind: &'static str, key: impl ToString) -> Self {
        Self::NotFound {
            kind,
            key: key.to_string(),
        }
    }
}

/// Template validation errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TemplateError {
    /// A resource requires a name the template does not define
    #[error("resource \"{resource}\" requires unknown resource \"{requirement}\"")]
    UnknownRequirement {
        /// Requiring resource
        resource: String,
        /// Undefined name
        requirement: String,
    },
}

/// Scheduler handoff errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SchedulerError {
    /// Nobody is consuming check requests any more
    #[error("scheduler queue closed")]
    Closed,

    /// Scheduler refused the request
    #[error("check rejected: {0}")]
    Rejected(String),
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// IO error reading the configuration file
    #[error("io error reading {path}: {source}")]
    Io {
        /// File being read
        path: PathBuf,
        /// Underlying error
        #[source]
        source: std::io::Error,
    },

    /// Invalid TOML
    #[error("invalid configuration: {0}")]
    Parse(#[from] toml::de::Error),

    /// Value out of range
    #[error("invalid value for {field}: {message}")]
    InvalidValue {
        /// Offending field
        field: &'static str,
        /// What is wrong with it
        message: String,
    },
}

/// Errors from the simulated converger
#[derive(Debug, thiserror::Error)]
pub enum SimulationError {
    /// Stack operation failed
    #[error(transparent)]
    Converge(#[from] ConvergeError),

    /// Storage failure during a check
    #[error(transparent)]
    Store(#[from] StoreError),

    /// Dispatching a follow-up check failed
    #[error(transparent)]
    Scheduler(#[from] SchedulerError),

    /// Reality refused a change
    #[error("provisioning {resource} failed: {message}")]
    Provision {
        /// Resource name
        resource: String,
        /// Failure reported by reality
        message: String,
    },

    /// A check task panicked or was cancelled
    #[error("check task failed: {0}")]
    Task(#[from] tokio::task::JoinError),

    /// The simulator lost its request queue
    #[error("simulator queue closed")]
    QueueClosed,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn not_found_is_detected_through_store_variant() {
        let err = ConvergeError::from(StoreError::not_found("stack", 4));

        assert!(err.is_not_found());
        assert!(!err.requires_operator());
        assert_eq!(err.to_string(), "storage error: stack 4 not found");
    }

    #[test]
    fn cycle_requires_operator_and_is_not_retryable() {
        let err = ConvergeError::from(CycleError::new(vec![vec!["a".into(), "b".into()]]));

        assert!(err.requires_operator());
        assert!(!err.is_retryable());
    }

    #[test]
    fn scheduler_failure_is_retryable() {
        let err = ConvergeError::from(SchedulerError::Closed);

        assert!(err.is_retryable());
    }
}
