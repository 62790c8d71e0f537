use std::path::PathBuf;

use thiserror::Error;

use crate::model::{NodeKind, PolicyType};

// ── Error codes ─────────────────────────────────────────────────────
//
// Stable identifiers for pipelines that react to specific failures.

pub mod error_code {
    pub const STRUCTURAL_VIOLATION: &str = "STRUCTURAL_VIOLATION";
    pub const DUPLICATE_CANONICAL_SOURCE: &str = "DUPLICATE_CANONICAL_SOURCE";
    pub const DUPLICATE_TARGET: &str = "DUPLICATE_TARGET";
    pub const MISSING_MIRROR_NODE: &str = "MISSING_MIRROR_NODE";
    pub const EXTERNAL_SOURCE: &str = "EXTERNAL_SOURCE";
    pub const INVALID_POLICY_NAME: &str = "INVALID_POLICY_NAME";
    pub const IO: &str = "IO";
    pub const SERIALIZATION: &str = "SERIALIZATION";
    pub const CONFIG: &str = "CONFIG";
}

/// Failure reported by an organization source. Passed through unchanged.
#[derive(Error, Debug)]
pub enum SourceError {
    #[error("request throttled: {0}")]
    Throttled(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("{0}")]
    Other(String),
}

/// Every error is terminal for the current pass.
#[derive(Error, Debug)]
pub enum MirrorError {
    #[error(
        "{} ({kind} {node_id}) has {count} {policy_type} attachments but at most {allowed} \
         are allowed; fix it before continuing",
        path.display()
    )]
    StructuralViolation {
        path: PathBuf,
        node_id: String,
        kind: NodeKind,
        policy_type: PolicyType,
        count: usize,
        allowed: usize,
    },

    #[error(
        "{policy_type} {policy} has two content sources: {} and {}",
        first.display(),
        second.display()
    )]
    DuplicateCanonicalSource {
        policy: String,
        policy_type: PolicyType,
        first: PathBuf,
        second: PathBuf,
    },

    #[error("{policy_type} {policy} is attached to {target} more than once")]
    DuplicateTarget {
        policy: String,
        policy_type: PolicyType,
        target: String,
    },

    #[error(
        "node {node_id} has no mirror directory at {}; run the capture pass to regenerate \
         the mirror",
        expected.display()
    )]
    MissingMirrorNode { node_id: String, expected: PathBuf },

    #[error("organization source error: {0}")]
    ExternalSource(#[from] SourceError),

    #[error(
        "{policy_type} {name:?} (path: {}) contains whitespace in its name; fix it before \
         continuing",
        path.display()
    )]
    InvalidPolicyName {
        name: String,
        policy_type: PolicyType,
        path: PathBuf,
    },

    #[error("io error at {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("config error: {0}")]
    Config(String),
}

impl MirrorError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        MirrorError::Io {
            path: path.into(),
            source,
        }
    }

    pub fn error_code(&self) -> &'static str {
        match self {
            MirrorError::StructuralViolation { .. } => error_code::STRUCTURAL_VIOLATION,
            MirrorError::DuplicateCanonicalSource { .. } => error_code::DUPLICATE_CANONICAL_SOURCE,
            MirrorError::DuplicateTarget { .. } => error_code::DUPLICATE_TARGET,
            MirrorError::MissingMirrorNode { .. } => error_code::MISSING_MIRROR_NODE,
            MirrorError::ExternalSource(_) => error_code::EXTERNAL_SOURCE,
            MirrorError::InvalidPolicyName { .. } => error_code::INVALID_POLICY_NAME,
            MirrorError::Io { .. } => error_code::IO,
            MirrorError::Serialization(_) => error_code::SERIALIZATION,
            MirrorError::Config(_) => error_code::CONFIG,
        }
    }
}
