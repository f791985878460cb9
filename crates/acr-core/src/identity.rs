//! # Identity Newtypes
//!
//! UUID-based identifiers for every persisted record, plus the validated
//! [`ActorId`] carried by the authentication context.
//!
//! UUID identifiers are always valid by construction. [`ActorId`] validates
//! its format at construction and on deserialization, so a malformed actor
//! can never reach a four-eyes comparison.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::ValidationError;

macro_rules! uuid_identifier {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        pub struct $name(Uuid);

        impl $name {
            /// Create a new random identifier.
            pub fn new() -> Self {
                Self(Uuid::new_v4())
            }

            /// Wrap an existing UUID.
            pub fn from_uuid(id: Uuid) -> Self {
                Self(id)
            }

            /// Access the underlying UUID.
            pub fn as_uuid(&self) -> &Uuid {
                &self.0
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<Uuid> for $name {
            fn from(id: Uuid) -> Self {
                Self(id)
            }
        }
    };
}

uuid_identifier!(
    /// Identifier of a registered AI system. Immutable for the system's lifetime.
    SystemId
);
uuid_identifier!(
    /// Identifier of a single risk assessment row.
    AssessmentId
);
uuid_identifier!(
    /// Identifier of one generated compliance document version.
    DocumentId
);
uuid_identifier!(
    /// Identifier of an internal or external policy.
    PolicyId
);
uuid_identifier!(
    /// Identifier of a policy-to-system mapping.
    MappingId
);

/// The authenticated principal performing an operation.
///
/// 1 to 128 characters from `[A-Za-z0-9._@-]`. Colons are excluded because
/// bearer tokens use them as field separators.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ActorId(String);

impl ActorId {
    /// Validate and wrap an actor identifier.
    pub fn new(s: impl Into<String>) -> Result<Self, ValidationError> {
        let s = s.into();
        let valid = !s.is_empty()
            && s.len() <= 128
            && s
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '@' | '-'));
        if valid {
            Ok(Self(s))
        } else {
            Err(ValidationError::InvalidActorId(s))
        }
    }

    /// The identifier as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for ActorId {
    type Error = ValidationError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::new(s)
    }
}

impl From<ActorId> for String {
    fn from(id: ActorId) -> Self {
        id.0
    }
}

impl std::fmt::Display for ActorId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Validate an evidence link as an absolute URI.
///
/// Returns the trimmed input on success. Relative references and bare paths
/// are rejected.
pub fn validate_evidence_uri(raw: &str) -> Result<String, ValidationError> {
    let trimmed = raw.trim();
    match url::Url::parse(trimmed) {
        Ok(parsed) if !parsed.cannot_be_a_base() || parsed.scheme() == "urn" => {
            Ok(trimmed.to_string())
        }
        Ok(_) => Err(ValidationError::InvalidUri {
            value: raw.to_string(),
            reason: "URI has no authority or path".to_string(),
        }),
        Err(e) => Err(ValidationError::InvalidUri {
            value: raw.to_string(),
            reason: e.to_string(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn uuid_ids_serialize_as_bare_strings() {
        let id = SystemId::from_uuid(Uuid::nil());
        assert_eq!(
            serde_json::to_string(&id).unwrap(),
            "\"00000000-0000-0000-0000-000000000000\""
        );
    }

    #[test]
    fn distinct_ids_differ() {
        assert_ne!(AssessmentId::new(), AssessmentId::new());
    }

    #[test]
    fn actor_id_accepts_common_forms() {
        for ok in ["alice", "bob.smith@example.com", "svc_reviewer-01"] {
            assert!(ActorId::new(ok).is_ok(), "{ok} should be accepted");
        }
    }

    #[test]
    fn actor_id_rejects_bad_input() {
        let too_long = "x".repeat(129);
        for bad in ["", "has space", "role:alice", too_long.as_str()] {
            assert!(ActorId::new(bad).is_err(), "{bad:?} should be rejected");
        }
    }

    #[test]
    fn actor_id_deserialization_validates() {
        let ok: Result<ActorId, _> = serde_json::from_str("\"alice\"");
        assert!(ok.is_ok());
        let bad: Result<ActorId, _> = serde_json::from_str("\"a b\"");
        assert!(bad.is_err());
    }

    #[test]
    fn evidence_uri_validation() {
        assert_eq!(
            validate_evidence_uri(" https://evidence.example.com/report.pdf ").unwrap(),
            "https://evidence.example.com/report.pdf"
        );
        assert!(validate_evidence_uri("urn:isbn:0451450523").is_ok());
        assert!(validate_evidence_uri("report.pdf").is_err());
        assert!(validate_evidence_uri("/relative/path").is_err());
        assert!(validate_evidence_uri("").is_err());
    }
}
