//! # Core Error Types
//!
//! Errors raised by the foundational types. Domain state machines in
//! `acr-state` and `acr-governance` define their own `thiserror` enums and
//! wrap these where needed.

use thiserror::Error;

/// Errors during canonical serialization.
#[derive(Error, Debug)]
pub enum CanonicalizationError {
    /// Float values are not permitted in canonical representations.
    #[error("float values are not permitted in canonical representations: {0}")]
    FloatRejected(f64),

    /// JSON serialization failed during canonicalization.
    #[error("serialization failed: {0}")]
    SerializationFailed(#[from] serde_json::Error),
}

/// Validation errors for identifier newtypes and boundary values.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// Actor identifier is empty, too long, or contains forbidden characters.
    #[error("invalid actor id: \"{0}\" (expected 1-128 characters from [A-Za-z0-9._@-])")]
    InvalidActorId(String),

    /// Evidence link is not an absolute URI.
    #[error("invalid evidence link \"{value}\": {reason}")]
    InvalidUri {
        /// The rejected input.
        value: String,
        /// Parser diagnostic.
        reason: String,
    },
}

/// Errors loading a ruleset catalog.
#[derive(Error, Debug)]
pub enum RulesetError {
    /// The ruleset file could not be read.
    #[error("failed to read ruleset file {path}: {source}")]
    Io {
        /// Path that was read.
        path: String,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// The ruleset document is not valid YAML for a catalog.
    #[error("invalid ruleset document: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// A regulation was configured with a blank version tag.
    #[error("ruleset version for {regulation} must not be blank")]
    BlankVersion {
        /// The regulation whose tag was blank.
        regulation: String,
    },
}
