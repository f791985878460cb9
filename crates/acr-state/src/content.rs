//! # Content Generation
//!
//! Rendering the body of a compliance document is delegated to a
//! [`ContentGenerator`]. The versioning engine stores whatever the generator
//! returns and only digests it; it never parses generated content.
//!
//! [`MarkdownGenerator`] is a deterministic default that lays out the
//! provenance stamps and the approved assessments. Deployments with a
//! natural-language or PDF pipeline inject their own generator.

use thiserror::Error;

use acr_core::{DocumentType, Regulation, Timestamp};

use crate::assessment::RiskAssessment;
use crate::system::AiSystem;

/// Failure reported by a content generator.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("content generation failed: {0}")]
pub struct ContentError(pub String);

/// Everything a generator may read when rendering one document version.
pub struct RenderInput<'a> {
    /// The system at its current version.
    pub system: &'a AiSystem,
    /// Target regulation.
    pub regulation: Regulation,
    /// Target document type.
    pub document_type: DocumentType,
    /// Version number being produced.
    pub version: u32,
    /// Approved assessments in scope, sorted by id.
    pub approved: &'a [&'a RiskAssessment],
    /// Ruleset version in force.
    pub ruleset_version: &'a str,
    /// Risk fingerprint stamped on the document.
    pub fingerprint: &'a str,
    /// Generation time.
    pub generated_at: Timestamp,
}

/// Renders document content.
pub trait ContentGenerator: Send + Sync {
    /// Render the body for one document version.
    fn render(&self, input: &RenderInput<'_>) -> Result<String, ContentError>;
}

/// Deterministic Markdown renderer.
#[derive(Debug, Clone, Copy, Default)]
pub struct MarkdownGenerator;

impl ContentGenerator for MarkdownGenerator {
    fn render(&self, input: &RenderInput<'_>) -> Result<String, ContentError> {
        let sys = input.system;
        let mut out = String::new();
        out.push_str(&format!(
            "# {}: {}\n\n",
            input.document_type.title(),
            sys.name
        ));
        out.push_str(&format!(
            "- Regulation: {} (ruleset {})\n",
            input.regulation.display_name(),
            input.ruleset_version
        ));
        out.push_str(&format!("- Document version: {}\n", input.version));
        out.push_str(&format!("- System version: {}\n", sys.system_version));
        out.push_str(&format!("- System status: {}\n", sys.status));
        out.push_str(&format!("- Lifecycle stage: {}\n", sys.lifecycle_stage));
        out.push_str(&format!("- Risk fingerprint: {}\n", input.fingerprint));
        out.push_str(&format!("- Generated at: {}\n\n", input.generated_at));

        out.push_str("## System description\n\n");
        if sys.description.is_empty() {
            out.push_str("_No description provided._\n\n");
        } else {
            out.push_str(&sys.description);
            out.push_str("\n\n");
        }

        let usage = [
            ("Training data", &sys.data_usage.training_data),
            ("Input data", &sys.data_usage.input_data),
            ("Output usage", &sys.data_usage.output_usage),
            ("Personal data", &sys.data_usage.personal_data),
        ];
        if usage.iter().any(|(_, v)| v.is_some()) {
            out.push_str("## Data usage\n\n");
            for (label, value) in usage {
                if let Some(v) = value {
                    out.push_str(&format!("- {label}: {v}\n"));
                }
            }
            out.push('\n');
        }

        out.push_str("## Approved risk assessments\n\n");
        if input.approved.is_empty() {
            out.push_str("_No approved assessments in scope._\n");
        } else {
            out.push_str("| Category | Level | Mitigation | Reviewed by | Summary |\n");
            out.push_str("|----------|-------|------------|-------------|---------|\n");
            for a in input.approved {
                let reviewer = a
                    .reviewed_by
                    .as_ref()
                    .map(|r| r.as_str())
                    .unwrap_or("-");
                out.push_str(&format!(
                    "| {} | {} | {} | {} | {} |\n",
                    a.category,
                    a.risk_level,
                    a.mitigation_status,
                    reviewer,
                    a.summary.replace('|', "\\|")
                ));
            }
        }
        Ok(out)
    }
}
