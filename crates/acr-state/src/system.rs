//! # AI System Registry
//!
//! An [`AiSystem`] is the subject every assessment, document and task hangs
//! off. Its `system_version` is the only signal staleness evaluation uses to
//! detect that a system changed after a document was generated:
//!
//! - registration sets `system_version = 1`;
//! - every successful logical mutation increments it by exactly one, in the
//!   same `&mut self` call that mutates the fields;
//! - a rejected mutation leaves the record untouched.
//!
//! Status changes are kept in `status_history` with the version at which
//! they happened, so "did this system become prohibited after version N" is
//! answerable without a separate event log.
//!
//! ## Guarded writes on prohibited systems
//!
//! While a system is `prohibited`, a patch that would understate its risk
//! (clearing a jurisdiction flag or moving the status away from
//! `prohibited`) must carry a remediation note. The note is recorded
//! alongside the version it applied to.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use acr_core::{
    sha256_hex, ActorId, CanonicalBytes, CanonicalizationError, DataUsage, JurisdictionFlags,
    LifecycleStage, SystemId, SystemStatus, Timestamp,
};

const MAX_NAME_LEN: usize = 255;

// ─── Errors ──────────────────────────────────────────────────────────

/// Errors raised by registry operations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SystemError {
    /// Input failed validation.
    #[error("{0}")]
    Validation(String),

    /// The caller's expected version does not match the stored version.
    #[error("system {system_id} is at version {actual}, caller expected {expected}")]
    VersionConflict {
        /// The system.
        system_id: SystemId,
        /// Version the caller read.
        expected: u64,
        /// Version currently stored.
        actual: u64,
    },

    /// A patch would understate the risk of a prohibited system without a
    /// remediation note.
    #[error("system {system_id} is prohibited: {reason}")]
    GuardedWrite {
        /// The system.
        system_id: SystemId,
        /// Which part of the patch was refused.
        reason: String,
    },

    /// The requested status change is not available through this path.
    #[error("system {system_id} cannot move from {from} to {to}: {reason}")]
    InvalidStatusChange {
        /// The system.
        system_id: SystemId,
        /// Current status.
        from: SystemStatus,
        /// Requested status.
        to: SystemStatus,
        /// Why it was refused.
        reason: String,
    },
}

// ─── Records ─────────────────────────────────────────────────────────

/// One status change, stamped with the version it produced.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusChange {
    /// Status before the change.
    pub from: SystemStatus,
    /// Status after the change.
    pub to: SystemStatus,
    /// `system_version` after the change was applied.
    pub at_version: u64,
    /// Who made the change.
    pub changed_by: ActorId,
    /// When.
    pub changed_at: Timestamp,
}

/// A remediation note accepted with a guarded write.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemediationNote {
    /// The note text.
    pub note: String,
    /// `system_version` the note was recorded with.
    pub at_version: u64,
    /// Who supplied it.
    pub recorded_by: ActorId,
    /// When.
    pub recorded_at: Timestamp,
}

/// A registered AI system.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AiSystem {
    /// Immutable identifier.
    pub id: SystemId,
    /// Display name.
    pub name: String,
    /// Free-text description of purpose and context.
    pub description: String,
    /// Regimes the system is subject to.
    pub jurisdictions: JurisdictionFlags,
    /// How the system uses data.
    pub data_usage: DataUsage,
    /// Registry status.
    pub status: SystemStatus,
    /// Engineering lifecycle stage.
    pub lifecycle_stage: LifecycleStage,
    /// Actor who registered the system.
    pub registered_by: ActorId,
    /// Monotonic mutation counter, starting at 1.
    pub system_version: u64,
    /// Ordered status changes.
    pub status_history: Vec<StatusChange>,
    /// Notes accepted with guarded writes.
    pub remediation_notes: Vec<RemediationNote>,
    /// Registration time.
    pub created_at: Timestamp,
    /// Time of the last successful mutation.
    pub updated_at: Timestamp,
}

/// Input for registering a system.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct NewSystem {
    /// Display name.
    pub name: String,
    /// Description.
    #[serde(default)]
    pub description: String,
    /// Applicable regimes.
    #[serde(default)]
    pub jurisdictions: JurisdictionFlags,
    /// Data usage.
    #[serde(default)]
    pub data_usage: DataUsage,
    /// Initial status; defaults to `draft`. `active` is granted only by sign-off.
    #[serde(default)]
    pub status: Option<SystemStatus>,
    /// Initial lifecycle stage; defaults to `design`.
    #[serde(default)]
    pub lifecycle_stage: Option<LifecycleStage>,
}

/// Partial update of a system. `None` fields are left unchanged.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SystemPatch {
    /// New name.
    #[serde(default)]
    pub name: Option<String>,
    /// New description.
    #[serde(default)]
    pub description: Option<String>,
    /// New jurisdiction flags (replaces all three).
    #[serde(default)]
    pub jurisdictions: Option<JurisdictionFlags>,
    /// New data usage (replaces all fields).
    #[serde(default)]
    pub data_usage: Option<DataUsage>,
    /// New status.
    #[serde(default)]
    pub status: Option<SystemStatus>,
    /// New lifecycle stage.
    #[serde(default)]
    pub lifecycle_stage: Option<LifecycleStage>,
    /// Required for writes that understate the risk of a prohibited system.
    #[serde(default)]
    pub remediation_note: Option<String>,
    /// Optimistic concurrency check against `system_version`.
    #[serde(default)]
    pub expected_version: Option<u64>,
}

impl SystemPatch {
    /// Whether the patch changes no field.
    pub fn is_empty(&self) -> bool {
        self.name.is_none()
            && self.description.is_none()
            && self.jurisdictions.is_none()
            && self.data_usage.is_none()
            && self.status.is_none()
            && self.lifecycle_stage.is_none()
    }
}

/// Descriptive content of a system, digested into document provenance.
#[derive(Serialize)]
struct SystemContent<'a> {
    id: &'a SystemId,
    name: &'a str,
    description: &'a str,
    jurisdictions: &'a JurisdictionFlags,
    data_usage: &'a DataUsage,
    status: SystemStatus,
    lifecycle_stage: LifecycleStage,
    system_version: u64,
}

fn validate_name(name: &str) -> Result<String, SystemError> {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        return Err(SystemError::Validation("name must not be empty".to_string()));
    }
    if trimmed.chars().count() > MAX_NAME_LEN {
        return Err(SystemError::Validation(format!(
            "name must not exceed {MAX_NAME_LEN} characters"
        )));
    }
    Ok(trimmed.to_string())
}

fn non_blank(note: Option<&String>) -> Option<String> {
    note.map(|n| n.trim().to_string()).filter(|n| !n.is_empty())
}

impl AiSystem {
    /// Register a new system at version 1.
    pub fn register(input: NewSystem, actor: ActorId) -> Result<Self, SystemError> {
        let id = SystemId::new();
        let name = validate_name(&input.name)?;
        let status = input.status.unwrap_or(SystemStatus::Draft);
        if status == SystemStatus::Active {
            return Err(SystemError::InvalidStatusChange {
                system_id: id,
                from: SystemStatus::Draft,
                to: SystemStatus::Active,
                reason: "active status is granted by sign-off".to_string(),
            });
        }
        let now = Timestamp::now();
        Ok(Self {
            id,
            name,
            description: input.description.trim().to_string(),
            jurisdictions: input.jurisdictions,
            data_usage: input.data_usage,
            status,
            lifecycle_stage: input.lifecycle_stage.unwrap_or(LifecycleStage::Design),
            registered_by: actor,
            system_version: 1,
            status_history: Vec::new(),
            remediation_notes: Vec::new(),
            created_at: now,
            updated_at: now,
        })
    }

    /// Whether the system is currently prohibited.
    pub fn is_prohibited(&self) -> bool {
        self.status == SystemStatus::Prohibited
    }

    /// The version at which the system most recently became prohibited after
    /// `version`, if any.
    pub fn prohibited_since(&self, version: u64) -> Option<u64> {
        self.status_history
            .iter()
            .rev()
            .find(|c| c.to == SystemStatus::Prohibited && c.at_version > version)
            .map(|c| c.at_version)
    }

    /// Apply a partial update.
    ///
    /// The patch is validated in full before any field changes; on error the
    /// record is untouched. On success `system_version` is incremented by
    /// exactly one.
    pub fn apply_patch(&mut self, patch: &SystemPatch, actor: &ActorId) -> Result<(), SystemError> {
        if let Some(expected) = patch.expected_version {
            if expected != self.system_version {
                return Err(SystemError::VersionConflict {
                    system_id: self.id,
                    expected,
                    actual: self.system_version,
                });
            }
        }
        if patch.is_empty() {
            return Err(SystemError::Validation(
                "patch must change at least one field".to_string(),
            ));
        }

        let name = patch.name.as_deref().map(validate_name).transpose()?;

        if let Some(to) = patch.status {
            if to == SystemStatus::Active && self.status != SystemStatus::Active {
                return Err(SystemError::InvalidStatusChange {
                    system_id: self.id,
                    from: self.status,
                    to,
                    reason: "active status is granted by sign-off".to_string(),
                });
            }
        }

        let note = non_blank(patch.remediation_note.as_ref());
        if self.is_prohibited() && note.is_none() {
            if let Some(to) = patch.status.filter(|s| *s != SystemStatus::Prohibited) {
                return Err(SystemError::GuardedWrite {
                    system_id: self.id,
                    reason: format!("moving status to {to} requires a remediation note"),
                });
            }
            if let Some(flags) = &patch.jurisdictions {
                let cleared = self.jurisdictions.cleared_by(flags);
                if !cleared.is_empty() {
                    let names: Vec<&str> = cleared.iter().map(|r| r.as_str()).collect();
                    return Err(SystemError::GuardedWrite {
                        system_id: self.id,
                        reason: format!(
                            "clearing jurisdiction {} requires a remediation note",
                            names.join(", ")
                        ),
                    });
                }
            }
        }

        let next_version = self.system_version + 1;
        let now = Timestamp::now();

        if let Some(name) = name {
            self.name = name;
        }
        if let Some(description) = &patch.description {
            self.description = description.trim().to_string();
        }
        if let Some(flags) = patch.jurisdictions {
            self.jurisdictions = flags;
        }
        if let Some(usage) = &patch.data_usage {
            self.data_usage = usage.clone();
        }
        if let Some(stage) = patch.lifecycle_stage {
            self.lifecycle_stage = stage;
        }
        if let Some(to) = patch.status {
            self.record_status(to, next_version, actor, now);
        }
        if let Some(note) = note {
            self.remediation_notes.push(RemediationNote {
                note,
                at_version: next_version,
                recorded_by: actor.clone(),
                recorded_at: now,
            });
        }

        self.system_version = next_version;
        self.updated_at = now;
        Ok(())
    }

    /// Move the system to `active` after sign-off admission.
    ///
    /// Readiness (no outstanding blocking tasks) is decided by the caller;
    /// this only enforces the status rules.
    pub fn activate(&mut self, actor: &ActorId) -> Result<(), SystemError> {
        match self.status {
            SystemStatus::Draft | SystemStatus::Deprecated => {}
            from => {
                return Err(SystemError::InvalidStatusChange {
                    system_id: self.id,
                    from,
                    to: SystemStatus::Active,
                    reason: "only draft or deprecated systems can be activated".to_string(),
                });
            }
        }
        let next_version = self.system_version + 1;
        let now = Timestamp::now();
        self.record_status(SystemStatus::Active, next_version, actor, now);
        self.system_version = next_version;
        self.updated_at = now;
        Ok(())
    }

    /// Digest of the descriptive content at the current version.
    pub fn content_digest(&self) -> Result<String, CanonicalizationError> {
        let content = SystemContent {
            id: &self.id,
            name: &self.name,
            description: &self.description,
            jurisdictions: &self.jurisdictions,
            data_usage: &self.data_usage,
            status: self.status,
            lifecycle_stage: self.lifecycle_stage,
            system_version: self.system_version,
        };
        Ok(sha256_hex(&CanonicalBytes::new(&content)?))
    }

    fn record_status(
        &mut self,
        to: SystemStatus,
        at_version: u64,
        actor: &ActorId,
        now: Timestamp,
    ) {
        if to == self.status {
            return;
        }
        self.status_history.push(StatusChange {
            from: self.status,
            to,
            at_version,
            changed_by: actor.clone(),
            changed_at: now,
        });
        self.status = to;
    }
}

// ─── Tests ───────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn actor(name: &str) -> ActorId {
        ActorId::new(name).unwrap()
    }

    fn make_system() -> AiSystem {
        AiSystem::register(
            NewSystem {
                name: "  Credit Scoring Model ".to_string(),
                description: "Scores consumer credit applications".to_string(),
                jurisdictions: JurisdictionFlags {
                    eu: true,
                    uk: true,
                    mas: false,
                },
                ..Default::default()
            },
            actor("alice"),
        )
        .unwrap()
    }

    fn status_patch(status: SystemStatus) -> SystemPatch {
        SystemPatch {
            status: Some(status),
            ..Default::default()
        }
    }

    #[test]
    fn register_starts_at_version_one() {
        let sys = make_system();
        assert_eq!(sys.system_version, 1);
        assert_eq!(sys.name, "Credit Scoring Model");
        assert_eq!(sys.status, SystemStatus::Draft);
        assert_eq!(sys.lifecycle_stage, LifecycleStage::Design);
        assert!(sys.status_history.is_empty());
    }

    #[test]
    fn register_rejects_blank_name() {
        let err = AiSystem::register(NewSystem::default(), actor("alice")).unwrap_err();
        assert!(matches!(err, SystemError::Validation(_)));
    }

    #[test]
    fn register_refuses_active_status() {
        let input = NewSystem {
            name: "x".to_string(),
            status: Some(SystemStatus::Active),
            ..Default::default()
        };
        assert!(matches!(
            AiSystem::register(input, actor("alice")),
            Err(SystemError::InvalidStatusChange { .. })
        ));
    }

    #[test]
    fn each_update_increments_version_by_one() {
        let mut sys = make_system();
        for i in 0..5 {
            let patch = SystemPatch {
                description: Some(format!("revision {i}")),
                ..Default::default()
            };
            sys.apply_patch(&patch, &actor("bob")).unwrap();
        }
        assert_eq!(sys.system_version, 6);
        assert_eq!(sys.description, "revision 4");
    }

    #[test]
    fn empty_patch_is_validation_error_and_keeps_version() {
        let mut sys = make_system();
        let patch = SystemPatch {
            remediation_note: Some("nothing else".to_string()),
            ..Default::default()
        };
        assert!(matches!(
            sys.apply_patch(&patch, &actor("bob")),
            Err(SystemError::Validation(_))
        ));
        assert_eq!(sys.system_version, 1);
    }

    #[test]
    fn failed_patch_leaves_record_untouched() {
        let mut sys = make_system();
        let before = sys.clone();
        let patch = SystemPatch {
            description: Some("changed".to_string()),
            name: Some("   ".to_string()),
            ..Default::default()
        };
        assert!(sys.apply_patch(&patch, &actor("bob")).is_err());
        assert_eq!(sys, before);
    }

    #[test]
    fn stale_expected_version_conflicts() {
        let mut sys = make_system();
        let patch = SystemPatch {
            description: Some("x".to_string()),
            expected_version: Some(1),
            ..Default::default()
        };
        sys.apply_patch(&patch, &actor("bob")).unwrap();
        let err = sys.apply_patch(&patch, &actor("carol")).unwrap_err();
        assert_eq!(
            err,
            SystemError::VersionConflict {
                system_id: sys.id,
                expected: 1,
                actual: 2,
            }
        );
    }

    #[test]
    fn status_history_records_version_of_change() {
        let mut sys = make_system();
        sys.apply_patch(&SystemPatch {
            name: Some("Renamed".to_string()),
            ..Default::default()
        }, &actor("bob"))
        .unwrap();
        sys.apply_patch(&status_patch(SystemStatus::Prohibited), &actor("bob"))
            .unwrap();
        assert_eq!(sys.system_version, 3);
        assert_eq!(sys.status_history.len(), 1);
        assert_eq!(sys.status_history[0].at_version, 3);
        assert_eq!(sys.prohibited_since(2), Some(3));
        assert_eq!(sys.prohibited_since(3), None);
    }

    #[test]
    fn prohibited_system_refuses_unannotated_downgrade() {
        let mut sys = make_system();
        sys.apply_patch(&status_patch(SystemStatus::Prohibited), &actor("bob"))
            .unwrap();
        let err = sys
            .apply_patch(&status_patch(SystemStatus::Deprecated), &actor("bob"))
            .unwrap_err();
        assert!(matches!(err, SystemError::GuardedWrite { .. }));

        let clear_eu = SystemPatch {
            jurisdictions: Some(JurisdictionFlags {
                eu: false,
                uk: true,
                mas: false,
            }),
            ..Default::default()
        };
        assert!(matches!(
            sys.apply_patch(&clear_eu, &actor("bob")),
            Err(SystemError::GuardedWrite { .. })
        ));
        assert_eq!(sys.system_version, 2);
    }

    #[test]
    fn prohibited_system_accepts_annotated_downgrade() {
        let mut sys = make_system();
        sys.apply_patch(&status_patch(SystemStatus::Prohibited), &actor("bob"))
            .unwrap();
        let patch = SystemPatch {
            status: Some(SystemStatus::Deprecated),
            remediation_note: Some("Use case withdrawn from EU market".to_string()),
            ..Default::default()
        };
        sys.apply_patch(&patch, &actor("carol")).unwrap();
        assert_eq!(sys.status, SystemStatus::Deprecated);
        assert_eq!(sys.remediation_notes.len(), 1);
        assert_eq!(sys.remediation_notes[0].at_version, 3);
    }

    #[test]
    fn prohibited_system_allows_adding_jurisdictions_without_note() {
        let mut sys = make_system();
        sys.apply_patch(&status_patch(SystemStatus::Prohibited), &actor("bob"))
            .unwrap();
        let add_mas = SystemPatch {
            jurisdictions: Some(JurisdictionFlags {
                eu: true,
                uk: true,
                mas: true,
            }),
            ..Default::default()
        };
        sys.apply_patch(&add_mas, &actor("bob")).unwrap();
        assert!(sys.jurisdictions.mas);
    }

    #[test]
    fn patch_cannot_grant_active() {
        let mut sys = make_system();
        assert!(matches!(
            sys.apply_patch(&status_patch(SystemStatus::Active), &actor("bob")),
            Err(SystemError::InvalidStatusChange { .. })
        ));
    }

    #[test]
    fn activate_from_draft() {
        let mut sys = make_system();
        sys.activate(&actor("rita")).unwrap();
        assert_eq!(sys.status, SystemStatus::Active);
        assert_eq!(sys.system_version, 2);
        assert!(sys.activate(&actor("rita")).is_err());
    }

    #[test]
    fn content_digest_tracks_version() {
        let mut sys = make_system();
        let d1 = sys.content_digest().unwrap();
        assert_eq!(d1, sys.content_digest().unwrap());
        sys.apply_patch(&SystemPatch {
            description: Some("new".to_string()),
            ..Default::default()
        }, &actor("bob"))
        .unwrap();
        assert_ne!(d1, sys.content_digest().unwrap());
    }
}

#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        #[test]
        fn version_equals_one_plus_successful_updates(
            descriptions in prop::collection::vec("[a-z ]{0,20}", 0..20)
        ) {
            let actor = ActorId::new("alice").unwrap();
            let mut sys = AiSystem::register(
                NewSystem { name: "model".to_string(), ..Default::default() },
                actor.clone(),
            ).unwrap();
            let mut applied = 0u64;
            for d in &descriptions {
                let patch = SystemPatch { description: Some(d.clone()), ..Default::default() };
                if sys.apply_patch(&patch, &actor).is_ok() {
                    applied += 1;
                }
            }
            prop_assert_eq!(sys.system_version, 1 + applied);
            prop_assert_eq!(applied, descriptions.len() as u64);
        }
    }
}
