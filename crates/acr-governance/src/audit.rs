//! # Compliance Audit Trail
//!
//! Append-only record of every mutation in the compliance core: system
//! registration and edits, assessment transitions, document generation,
//! task completions and policy changes.
//!
//! Entries are individually digestable through `CanonicalBytes` and
//! `sha256_digest`. The trail is bounded; past capacity the oldest 10% is
//! dropped, so deployments that need the full history persist entries as
//! they are appended.

use serde::{Deserialize, Serialize};

use acr_core::{sha256_digest, ActorId, CanonicalBytes, ContentDigest, SystemId, Timestamp};

/// Kind of audited event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditEntryType {
    /// An AI system was registered.
    SystemRegistered,
    /// An AI system was updated.
    SystemUpdated,
    /// An AI system was signed off and activated.
    SystemActivated,
    /// A guarded write on a prohibited system was refused.
    GuardedWriteRefused,
    /// An assessment was created.
    AssessmentCreated,
    /// An assessment was submitted.
    AssessmentSubmitted,
    /// An assessment was approved.
    AssessmentApproved,
    /// An assessment was rejected.
    AssessmentRejected,
    /// An assessment's mitigation status changed.
    MitigationUpdated,
    /// The lifecycle gate vetoed an assessment action.
    GateVetoed,
    /// A document version was generated.
    DocumentGenerated,
    /// A document version was regenerated.
    DocumentRegenerated,
    /// A governance task was completed.
    TaskCompleted,
    /// A policy was created.
    PolicyCreated,
    /// A policy was mapped to a system.
    PolicyMapped,
    /// A policy mapping's compliance status changed.
    PolicyMappingUpdated,
}

impl AuditEntryType {
    /// Wire name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::SystemRegistered => "system_registered",
            Self::SystemUpdated => "system_updated",
            Self::SystemActivated => "system_activated",
            Self::GuardedWriteRefused => "guarded_write_refused",
            Self::AssessmentCreated => "assessment_created",
            Self::AssessmentSubmitted => "assessment_submitted",
            Self::AssessmentApproved => "assessment_approved",
            Self::AssessmentRejected => "assessment_rejected",
            Self::MitigationUpdated => "mitigation_updated",
            Self::GateVetoed => "gate_vetoed",
            Self::DocumentGenerated => "document_generated",
            Self::DocumentRegenerated => "document_regenerated",
            Self::TaskCompleted => "task_completed",
            Self::PolicyCreated => "policy_created",
            Self::PolicyMapped => "policy_mapped",
            Self::PolicyMappingUpdated => "policy_mapping_updated",
        }
    }
}

impl std::fmt::Display for AuditEntryType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One audited event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditEntry {
    /// Event kind.
    pub entry_type: AuditEntryType,
    /// When it happened.
    pub timestamp: Timestamp,
    /// Who did it.
    pub actor: ActorId,
    /// The system concerned, if any.
    pub system_id: Option<SystemId>,
    /// Id of the record acted on (assessment, document, mapping, task).
    pub subject_id: Option<String>,
    /// Structured detail.
    pub metadata: Option<serde_json::Value>,
}

impl AuditEntry {
    /// New entry stamped now.
    pub fn new(entry_type: AuditEntryType, actor: &ActorId) -> Self {
        Self {
            entry_type,
            timestamp: Timestamp::now(),
            actor: actor.clone(),
            system_id: None,
            subject_id: None,
            metadata: None,
        }
    }

    /// Attach the system.
    pub fn system(mut self, system_id: SystemId) -> Self {
        self.system_id = Some(system_id);
        self
    }

    /// Attach the subject record id.
    pub fn subject(mut self, subject_id: impl ToString) -> Self {
        self.subject_id = Some(subject_id.to_string());
        self
    }

    /// Attach structured metadata.
    pub fn metadata(mut self, metadata: serde_json::Value) -> Self {
        self.metadata = Some(metadata);
        self
    }

    /// SHA-256 over the canonical form of the entry.
    ///
    /// `None` when the metadata cannot be canonicalized (floats).
    pub fn digest(&self) -> Option<ContentDigest> {
        match CanonicalBytes::new(self) {
            Ok(canonical) => Some(sha256_digest(&canonical)),
            Err(e) => {
                tracing::warn!(
                    entry_type = %self.entry_type,
                    error = %e,
                    "audit entry cannot be canonicalized"
                );
                None
            }
        }
    }
}

/// Bounded append-only trail. Share behind `Arc<Mutex<_>>`.
pub struct AuditTrail {
    entries: Vec<AuditEntry>,
    max_entries: usize,
}

impl AuditTrail {
    /// A trail holding at most `max_entries`.
    pub fn new(max_entries: usize) -> Self {
        Self {
            entries: Vec::new(),
            max_entries,
        }
    }

    /// Append, dropping the oldest 10% once capacity is exceeded.
    pub fn append(&mut self, entry: AuditEntry) {
        self.entries.push(entry);
        if self.entries.len() > self.max_entries {
            let trim = (self.max_entries / 10).max(1);
            self.entries.drain(..trim);
        }
    }

    /// All entries, oldest first.
    pub fn entries(&self) -> &[AuditEntry] {
        &self.entries
    }

    /// Number of entries held.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the trail is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entries concerning one system.
    pub fn for_system(&self, system_id: SystemId) -> Vec<&AuditEntry> {
        self.entries
            .iter()
            .filter(|e| e.system_id == Some(system_id))
            .collect()
    }

    /// Entries of one kind.
    pub fn by_type(&self, entry_type: AuditEntryType) -> Vec<&AuditEntry> {
        self.entries
            .iter()
            .filter(|e| e.entry_type == entry_type)
            .collect()
    }

    /// The most recent `n` entries.
    pub fn last_n(&self, n: usize) -> &[AuditEntry] {
        let start = self.entries.len().saturating_sub(n);
        &self.entries[start..]
    }

    /// `(index, digest)` for every digestable entry.
    pub fn compute_digests(&self) -> Vec<(usize, ContentDigest)> {
        self.entries
            .iter()
            .enumerate()
            .filter_map(|(i, e)| e.digest().map(|d| (i, d)))
            .collect()
    }
}

impl Default for AuditTrail {
    fn default() -> Self {
        Self::new(10_000)
    }
}

impl std::fmt::Debug for AuditTrail {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuditTrail")
            .field("entries", &self.entries.len())
            .field("max_entries", &self.max_entries)
            .finish()
    }
}
