//! # Regulations and Rulesets
//!
//! The three regulatory regimes an AI system can be subject to, the
//! per-system jurisdiction flags that select them, and the
//! [`RulesetCatalog`] recording which version of each regime's rules is in
//! force.
//!
//! A ruleset version change makes every document generated under the
//! previous version require regeneration. The catalog is therefore a value
//! passed into staleness evaluation, never a global.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::RulesetError;

/// A regulatory framework.
///
/// Variant order is the fixed presentation priority: EU, UK, MAS.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Regulation {
    /// EU Artificial Intelligence Act.
    EuAiAct,
    /// UK pro-innovation AI regulation framework.
    UkAiAct,
    /// Monetary Authority of Singapore FEAT principles.
    Mas,
}

impl Regulation {
    /// All regulations in priority order.
    pub const ALL: [Regulation; 3] = [Self::EuAiAct, Self::UkAiAct, Self::Mas];

    /// Wire name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::EuAiAct => "eu_ai_act",
            Self::UkAiAct => "uk_ai_act",
            Self::Mas => "mas",
        }
    }

    /// Human-readable name.
    pub fn display_name(&self) -> &'static str {
        match self {
            Self::EuAiAct => "EU AI Act",
            Self::UkAiAct => "UK AI Framework",
            Self::Mas => "MAS FEAT",
        }
    }
}

impl std::fmt::Display for Regulation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which regimes an AI system is subject to.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct JurisdictionFlags {
    /// Subject to the EU AI Act.
    #[serde(default)]
    pub eu: bool,
    /// Subject to the UK framework.
    #[serde(default)]
    pub uk: bool,
    /// Subject to MAS guidance.
    #[serde(default)]
    pub mas: bool,
}

impl JurisdictionFlags {
    /// Whether the given regulation applies.
    pub fn applies(&self, regulation: Regulation) -> bool {
        match regulation {
            Regulation::EuAiAct => self.eu,
            Regulation::UkAiAct => self.uk,
            Regulation::Mas => self.mas,
        }
    }

    /// Applicable regulations in priority order (EU, UK, MAS).
    pub fn applicable(&self) -> Vec<Regulation> {
        Regulation::ALL
            .into_iter()
            .filter(|r| self.applies(*r))
            .collect()
    }

    /// Regulations set in `self` but not in `next`.
    pub fn cleared_by(&self, next: &JurisdictionFlags) -> Vec<Regulation> {
        Regulation::ALL
            .into_iter()
            .filter(|r| self.applies(*r) && !next.applies(*r))
            .collect()
    }
}

fn default_eu_version() -> String {
    "2024/1689".to_string()
}

fn default_uk_version() -> String {
    "2023-white-paper".to_string()
}

fn default_mas_version() -> String {
    "2018-feat".to_string()
}

/// Ruleset version tag in force for each regulation.
///
/// Loaded from YAML; missing keys fall back to the built-in tags.
///
/// ```yaml
/// eu_ai_act: "2024/1689"
/// uk_ai_act: "2023-white-paper"
/// mas: "2018-feat"
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RulesetCatalog {
    #[serde(default = "default_eu_version")]
    eu_ai_act: String,
    #[serde(default = "default_uk_version")]
    uk_ai_act: String,
    #[serde(default = "default_mas_version")]
    mas: String,
}

impl Default for RulesetCatalog {
    fn default() -> Self {
        Self {
            eu_ai_act: default_eu_version(),
            uk_ai_act: default_uk_version(),
            mas: default_mas_version(),
        }
    }
}

impl RulesetCatalog {
    /// The version tag in force for a regulation.
    pub fn version_for(&self, regulation: Regulation) -> &str {
        match regulation {
            Regulation::EuAiAct => &self.eu_ai_act,
            Regulation::UkAiAct => &self.uk_ai_act,
            Regulation::Mas => &self.mas,
        }
    }

    /// Return a copy with one regulation's tag replaced.
    pub fn with_version(
        mut self,
        regulation: Regulation,
        version: impl Into<String>,
    ) -> Result<Self, RulesetError> {
        let version = version.into();
        if version.trim().is_empty() {
            return Err(RulesetError::BlankVersion {
                regulation: regulation.to_string(),
            });
        }
        match regulation {
            Regulation::EuAiAct => self.eu_ai_act = version,
            Regulation::UkAiAct => self.uk_ai_act = version,
            Regulation::Mas => self.mas = version,
        }
        Ok(self)
    }

    /// Parse a catalog from a YAML document.
    pub fn from_yaml_str(yaml: &str) -> Result<Self, RulesetError> {
        let catalog: RulesetCatalog = serde_yaml::from_str(yaml)?;
        catalog.validate()?;
        Ok(catalog)
    }

    /// Load a catalog from a YAML file.
    pub fn load(path: &Path) -> Result<Self, RulesetError> {
        let raw = std::fs::read_to_string(path).map_err(|source| RulesetError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_yaml_str(&raw)
    }

    fn validate(&self) -> Result<(), RulesetError> {
        for regulation in Regulation::ALL {
            if self.version_for(regulation).trim().is_empty() {
                return Err(RulesetError::BlankVersion {
                    regulation: regulation.to_string(),
                });
            }
        }
        Ok(())
    }
}
