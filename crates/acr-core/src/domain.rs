//! # Closed Domain Enums
//!
//! Every categorical field in the record model is a closed enum with
//! `snake_case` serialization. Unknown values fail deserialization at the
//! API boundary instead of flowing into the state machines.

use serde::{Deserialize, Serialize};

// ─── Risk ────────────────────────────────────────────────────────────

/// Risk dimension an assessment covers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RiskCategory {
    /// Discriminatory or unfair outcomes.
    Bias,
    /// Accuracy, resilience and security under adverse input.
    Robustness,
    /// Personal data handling and data minimisation.
    Privacy,
    /// Interpretability of outputs for affected persons.
    Explainability,
}

impl RiskCategory {
    /// All categories in declaration order.
    pub const ALL: [RiskCategory; 4] = [
        Self::Bias,
        Self::Robustness,
        Self::Privacy,
        Self::Explainability,
    ];

    /// Wire name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Bias => "bias",
            Self::Robustness => "robustness",
            Self::Privacy => "privacy",
            Self::Explainability => "explainability",
        }
    }
}

impl std::fmt::Display for RiskCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Assessed risk level. Ordered `Low < Medium < High` for rollups.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RiskLevel {
    /// Low residual risk.
    Low,
    /// Medium residual risk.
    Medium,
    /// High residual risk. Requires evidence at creation.
    High,
}

impl RiskLevel {
    /// Wire name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
        }
    }
}

impl std::fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Progress of the mitigation plan attached to an assessment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MitigationStatus {
    /// No mitigation work started.
    NotStarted,
    /// Mitigation under way.
    InProgress,
    /// Mitigation complete.
    Mitigated,
}

impl MitigationStatus {
    /// Wire name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NotStarted => "not_started",
            Self::InProgress => "in_progress",
            Self::Mitigated => "mitigated",
        }
    }
}

impl std::fmt::Display for MitigationStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ─── AI System ───────────────────────────────────────────────────────

/// Registry status of an AI system.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SystemStatus {
    /// Registered, not yet signed off.
    Draft,
    /// Signed off and in use.
    Active,
    /// Being phased out.
    Deprecated,
    /// Use is prohibited under at least one applicable regime.
    Prohibited,
}

impl SystemStatus {
    /// Wire name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Draft => "draft",
            Self::Active => "active",
            Self::Deprecated => "deprecated",
            Self::Prohibited => "prohibited",
        }
    }
}

impl std::fmt::Display for SystemStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Engineering lifecycle stage of an AI system, consulted by the lifecycle gate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LifecycleStage {
    /// Requirements and architecture.
    Design,
    /// Model building and training.
    Development,
    /// Pre-deployment testing.
    Validation,
    /// Rolling out to production.
    Deployment,
    /// In production under post-market monitoring.
    Monitoring,
    /// Decommissioned.
    Retired,
}

impl LifecycleStage {
    /// Wire name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Design => "design",
            Self::Development => "development",
            Self::Validation => "validation",
            Self::Deployment => "deployment",
            Self::Monitoring => "monitoring",
            Self::Retired => "retired",
        }
    }
}

impl std::fmt::Display for LifecycleStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Free-text description of how an AI system uses data.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DataUsage {
    /// Sources and nature of training data.
    #[serde(default)]
    pub training_data: Option<String>,
    /// Data consumed at inference time.
    #[serde(default)]
    pub input_data: Option<String>,
    /// How outputs are used downstream.
    #[serde(default)]
    pub output_usage: Option<String>,
    /// Personal data categories processed, if any.
    #[serde(default)]
    pub personal_data: Option<String>,
}

// ─── Documentation ───────────────────────────────────────────────────

/// Kind of generated compliance document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentType {
    /// Cross-regulation compliance summary.
    ComplianceSummary,
    /// Public-facing model/system card.
    AiSystemCard,
    /// Risk management system report.
    RiskManagementReport,
    /// Technical documentation file.
    TechnicalDocumentation,
    /// Conformity assessment record.
    ConformityAssessment,
    /// Transparency notice for affected persons.
    TransparencyNotice,
}

impl DocumentType {
    /// Wire name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ComplianceSummary => "compliance_summary",
            Self::AiSystemCard => "ai_system_card",
            Self::RiskManagementReport => "risk_management_report",
            Self::TechnicalDocumentation => "technical_documentation",
            Self::ConformityAssessment => "conformity_assessment",
            Self::TransparencyNotice => "transparency_notice",
        }
    }

    /// Human-readable title.
    pub fn title(&self) -> &'static str {
        match self {
            Self::ComplianceSummary => "Compliance Summary",
            Self::AiSystemCard => "AI System Card",
            Self::RiskManagementReport => "Risk Management Report",
            Self::TechnicalDocumentation => "Technical Documentation",
            Self::ConformityAssessment => "Conformity Assessment",
            Self::TransparencyNotice => "Transparency Notice",
        }
    }
}

impl std::fmt::Display for DocumentType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ─── Policies ────────────────────────────────────────────────────────

/// Origin of a policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PolicyKind {
    /// Organisation-authored policy.
    Internal,
    /// Externally imposed standard or guideline.
    External,
}

impl PolicyKind {
    /// Wire name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Internal => "internal",
            Self::External => "external",
        }
    }
}

impl std::fmt::Display for PolicyKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Compliance of one system against one policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ComplianceStatus {
    /// Not yet evaluated.
    NotAssessed,
    /// Fully compliant.
    Compliant,
    /// Some requirements unmet.
    PartiallyCompliant,
    /// Requirements unmet.
    NonCompliant,
}

impl ComplianceStatus {
    /// Wire name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NotAssessed => "not_assessed",
            Self::Compliant => "compliant",
            Self::PartiallyCompliant => "partially_compliant",
            Self::NonCompliant => "non_compliant",
        }
    }
}

impl std::fmt::Display for ComplianceStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serde_names_match_as_str() {
        for c in RiskCategory::ALL {
            assert_eq!(serde_json::to_value(c).unwrap(), c.as_str());
        }
        assert_eq!(
            serde_json::to_value(DocumentType::AiSystemCard).unwrap(),
            "ai_system_card"
        );
        assert_eq!(
            serde_json::to_value(ComplianceStatus::PartiallyCompliant).unwrap(),
            "partially_compliant"
        );
        assert_eq!(
            serde_json::to_value(MitigationStatus::NotStarted).unwrap(),
            "not_started"
        );
    }

    #[test]
    fn unknown_values_are_rejected() {
        assert!(serde_json::from_str::<RiskCategory>("\"safety\"").is_err());
        assert!(serde_json::from_str::<DocumentType>("\"press_release\"").is_err());
        assert!(serde_json::from_str::<SystemStatus>("\"archived\"").is_err());
    }

    #[test]
    fn risk_levels_are_ordered() {
        assert!(RiskLevel::Low < RiskLevel::Medium);
        assert!(RiskLevel::Medium < RiskLevel::High);
        assert_eq!(
            [RiskLevel::Medium, RiskLevel::High, RiskLevel::Low]
                .into_iter()
                .max(),
            Some(RiskLevel::High)
        );
    }

    #[test]
    fn data_usage_fields_default_to_none() {
        let usage: DataUsage =
            serde_json::from_str(r#"{"training_data": "public corpus"}"#).unwrap();
        assert_eq!(usage.training_data.as_deref(), Some("public corpus"));
        assert!(usage.personal_data.is_none());
    }
}
