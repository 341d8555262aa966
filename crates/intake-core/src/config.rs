//! Intake configuration
//!
//! Loaded from TOML; every field has a default so an empty file is valid.

use crate::error::ConfigError;
use intake_model::{Payload, SectionId, SectionRegistry};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::path::Path;

/// Which subsection of the user's latest submission pre-fills new documents
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PrefillConfig {
    /// Section that must be unvisited for the prefill to apply
    pub section: SectionId,
    /// Top-level payload key copied from the prior submission
    pub payload_key: String,
}

impl Default for PrefillConfig {
    fn default() -> Self {
        Self {
            section: SectionId::from("A"),
            payload_key: "pi".to_string(),
        }
    }
}

/// Intake configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IntakeConfig {
    /// Ordered sections plus the Review pseudo-section
    pub sections: SectionRegistry,
    /// Prefill from the most recent submission
    pub prefill: PrefillConfig,
    /// Section forced back to `In Progress` on a duplicate study rejection
    pub duplicate_study_section: SectionId,
    /// Payload of a brand-new document; also fills keys missing from fetched ones
    pub initial_payload: Payload,
    /// Maximum review comment length, in characters
    pub comment_max_len: usize,
}

impl Default for IntakeConfig {
    fn default() -> Self {
        Self {
            sections: SectionRegistry::default(),
            prefill: PrefillConfig::default(),
            duplicate_study_section: SectionId::from("B"),
            initial_payload: default_initial_payload(),
            comment_max_len: 500,
        }
    }
}

impl IntakeConfig {
    /// Parse and validate TOML text
    ///
    /// # Errors
    /// `ConfigError::Parse` on malformed TOML, `ConfigError::UnknownSection`
    /// if a section reference is not an editable section
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Read, parse and validate a TOML file
    ///
    /// # Errors
    /// `ConfigError::Io` if the file cannot be read, otherwise as [`Self::from_toml_str`]
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path.as_ref())?;
        tracing::debug!("Loading config from {}", path.as_ref().display());
        Self::from_toml_str(&text)
    }

    /// Check cross-field references
    ///
    /// # Errors
    /// `ConfigError::UnknownSection` for a reference outside the editable sections
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.sections.is_editable(&self.prefill.section) {
            return Err(ConfigError::UnknownSection {
                field: "prefill.section",
                id: self.prefill.section.clone(),
            });
        }
        if !self.sections.is_editable(&self.duplicate_study_section) {
            return Err(ConfigError::UnknownSection {
                field: "duplicate_study_section",
                id: self.duplicate_study_section.clone(),
            });
        }
        if self.prefill.payload_key.trim().is_empty() {
            return Err(ConfigError::InitialPayload(
                "prefill.payload_key must not be blank".to_string(),
            ));
        }
        Ok(())
    }

    /// With section registry
    #[inline]
    #[must_use]
    pub fn with_sections(mut self, sections: SectionRegistry) -> Self {
        self.sections = sections;
        self
    }

    /// With prefill source
    #[inline]
    #[must_use]
    pub fn with_prefill(mut self, section: impl Into<SectionId>, payload_key: impl Into<String>) -> Self {
        self.prefill = PrefillConfig {
            section: section.into(),
            payload_key: payload_key.into(),
        };
        self
    }

    /// With section forced back on a duplicate study rejection
    #[inline]
    #[must_use]
    pub fn with_duplicate_study_section(mut self, section: impl Into<SectionId>) -> Self {
        self.duplicate_study_section = section.into();
        self
    }

    /// With initial payload
    #[inline]
    #[must_use]
    pub fn with_initial_payload(mut self, payload: Payload) -> Self {
        self.initial_payload = payload;
        self
    }

    /// With comment length limit
    #[inline]
    #[must_use]
    pub fn with_comment_max_len(mut self, max: usize) -> Self {
        self.comment_max_len = max;
        self
    }
}

/// Empty questionnaire: every field present with its blank value
#[must_use]
pub fn default_initial_payload() -> Payload {
    let value = json!({
        "pi": {
            "firstName": "",
            "lastName": "",
            "position": "",
            "email": "",
            "institution": "",
            "address": ""
        },
        "piAsPrimaryContact": false,
        "primaryContact": null,
        "additionalContacts": [],
        "program": { "name": "", "abbreviation": "", "description": "" },
        "study": {
            "name": "",
            "abbreviation": "",
            "description": "",
            "publications": [],
            "plannedPublications": [],
            "repositories": [],
            "funding": {
                "agency": "",
                "grantNumbers": "",
                "nciProgramOfficer": "",
                "nciGPA": ""
            },
            "isDbGapRegistered": false,
            "dbGaPPPHSNumber": ""
        },
        "accessTypes": [],
        "targetedSubmissionDate": "",
        "targetedReleaseDate": "",
        "timeConstraints": [],
        "cancerTypes": [],
        "otherCancerTypes": "",
        "preCancerTypes": [],
        "otherPreCancerTypes": "",
        "numberOfParticipants": null,
        "species": [],
        "cellLines": false,
        "modelSystems": false,
        "imagingDataDeIdentified": null,
        "dataDeIdentified": null,
        "dataTypes": [],
        "otherDataTypes": "",
        "clinicalData": { "dataTypes": [], "otherDataTypes": "", "futureDataTypes": false },
        "files": [],
        "submitterComment": ""
    });

    match value {
        serde_json::Value::Object(map) => map,
        _ => Payload::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn defaults() {
        let config = IntakeConfig::default();
        assert_eq!(config.comment_max_len, 500);
        assert_eq!(config.duplicate_study_section.as_str(), "B");
        assert_eq!(config.prefill.payload_key, "pi");
        assert!(config.initial_payload.contains_key("study"));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn empty_toml_is_default() {
        let config = IntakeConfig::from_toml_str("").unwrap();
        assert_eq!(config, IntakeConfig::default());
    }

    #[test]
    fn custom_sections() {
        let text = r#"
            comment_max_len = 120
            duplicate_study_section = "STUDY"

            [prefill]
            section = "CONTACT"
            payload_key = "contact"

            [sections]
            review = { id = "REVIEW", title = "Review" }

            [[sections.sections]]
            id = "CONTACT"
            title = "Contact"

            [[sections.sections]]
            id = "STUDY"
            title = "Study"
        "#;

        let config = IntakeConfig::from_toml_str(text).unwrap();
        assert_eq!(config.sections.len(), 2);
        assert_eq!(config.comment_max_len, 120);
        assert_eq!(config.prefill.section.as_str(), "CONTACT");
    }

    #[test]
    fn rejects_unknown_duplicate_section() {
        let err = IntakeConfig::from_toml_str("duplicate_study_section = \"Z\"").unwrap_err();
        assert!(matches!(err, ConfigError::UnknownSection { field: "duplicate_study_section", .. }));
    }

    #[test]
    fn rejects_review_as_prefill_section() {
        let err = IntakeConfig::default()
            .with_prefill("REVIEW", "pi")
            .validate()
            .unwrap_err();
        assert!(matches!(err, ConfigError::UnknownSection { field: "prefill.section", .. }));
    }

    #[test]
    fn from_path_reads_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "comment_max_len = 42").unwrap();

        let config = IntakeConfig::from_path(file.path()).unwrap();
        assert_eq!(config.comment_max_len, 42);
    }

    #[test]
    fn from_path_missing_file() {
        let err = IntakeConfig::from_path("/definitely/not/here.toml").unwrap_err();
        assert!(matches!(err, ConfigError::Io(_)));
    }
}
