//! # Regulation Requirements
//!
//! What each regulation expects of a system before sign-off: the risk
//! categories that need an approved assessment, the documents that must
//! exist and be fresh, and whether documentation is only trusted once the
//! underlying assessments have been reviewed.

use acr_core::{DocumentType, Regulation, RiskCategory};

/// Static requirement table for one regulation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RegulationRequirements {
    /// The regulation.
    pub regulation: Regulation,
    /// Risk categories that need an approved assessment in scope.
    pub required_categories: &'static [RiskCategory],
    /// Documents that must be generated and kept current.
    pub required_documents: &'static [DocumentType],
    /// Missing assessments block sign-off, not just the drafted ones.
    pub requires_review_before_documentation: bool,
}

const EU_AI_ACT: RegulationRequirements = RegulationRequirements {
    regulation: Regulation::EuAiAct,
    required_categories: &[
        RiskCategory::Bias,
        RiskCategory::Robustness,
        RiskCategory::Privacy,
        RiskCategory::Explainability,
    ],
    required_documents: &[
        DocumentType::TechnicalDocumentation,
        DocumentType::RiskManagementReport,
        DocumentType::ConformityAssessment,
    ],
    requires_review_before_documentation: true,
};

const UK_AI_ACT: RegulationRequirements = RegulationRequirements {
    regulation: Regulation::UkAiAct,
    required_categories: &[
        RiskCategory::Bias,
        RiskCategory::Robustness,
        RiskCategory::Explainability,
    ],
    required_documents: &[DocumentType::AiSystemCard, DocumentType::TransparencyNotice],
    requires_review_before_documentation: false,
};

const MAS: RegulationRequirements = RegulationRequirements {
    regulation: Regulation::Mas,
    required_categories: &[
        RiskCategory::Bias,
        RiskCategory::Explainability,
        RiskCategory::Robustness,
    ],
    required_documents: &[
        DocumentType::ComplianceSummary,
        DocumentType::RiskManagementReport,
    ],
    requires_review_before_documentation: false,
};

/// Requirement table for `regulation`.
pub fn requirements_for(regulation: Regulation) -> &'static RegulationRequirements {
    match regulation {
        Regulation::EuAiAct => &EU_AI_ACT,
        Regulation::UkAiAct => &UK_AI_ACT,
        Regulation::Mas => &MAS,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_regulation_has_a_table() {
        for reg in Regulation::ALL {
            let req = requirements_for(reg);
            assert_eq!(req.regulation, reg);
            assert!(!req.required_categories.is_empty());
            assert!(!req.required_documents.is_empty());
        }
    }

    #[test]
    fn only_eu_gates_documentation_on_review() {
        assert!(requirements_for(Regulation::EuAiAct).requires_review_before_documentation);
        assert!(!requirements_for(Regulation::UkAiAct).requires_review_before_documentation);
        assert!(!requirements_for(Regulation::Mas).requires_review_before_documentation);
    }

    #[test]
    fn privacy_is_required_under_eu_only() {
        assert!(requirements_for(Regulation::EuAiAct)
            .required_categories
            .contains(&RiskCategory::Privacy));
        assert!(!requirements_for(Regulation::UkAiAct)
            .required_categories
            .contains(&RiskCategory::Privacy));
    }
}
