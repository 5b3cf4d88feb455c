//! Pipeline configuration
//!
//! Every field has a default, so an empty file (or no file at all) yields the
//! stock behaviour. Relative directory names are resolved against the folder
//! being processed.

use crate::error::PipelineError;
use section_engine::{DetectorConfig, RuleTable, SectionDetector};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Main configuration structure loaded from TOML files
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Process documents of a batch in parallel. Log order is then not stable.
    pub parallel: bool,
    pub detection: DetectionConfig,
    pub extraction: ExtractionConfig,
    pub diagnosis: DiagnosisConfig,
    pub normalize: NormalizeConfig,
    pub logging: LoggingConfig,
}

impl PipelineConfig {
    /// Load configuration from a TOML file
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or the TOML is malformed
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, PipelineError> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|source| PipelineError::ConfigRead {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_str(&content)
    }

    /// Parse configuration from a TOML string
    ///
    /// # Example
    ///
    /// ```
    /// use segment_core::config::PipelineConfig;
    ///
    /// let config = PipelineConfig::from_str(r#"
    ///     parallel = true
    ///
    ///     [detection]
    ///     min_confidence = 0.6
    ///
    ///     [extraction]
    ///     date_placeholder = "SIN.FECHA"
    /// "#).unwrap();
    /// assert!(config.parallel);
    /// assert_eq!(config.extraction.date_placeholder, "SIN.FECHA");
    /// ```
    pub fn from_str(s: &str) -> Result<Self, PipelineError> {
        Ok(toml::from_str(s)?)
    }

    /// Build the section detector, loading a custom rule table when one is configured
    pub fn detector(&self) -> Result<SectionDetector, PipelineError> {
        let Some(path) = &self.detection.rules_file else {
            return Ok(SectionDetector::new(self.detection.tuning.clone()));
        };

        let content = fs::read_to_string(path).map_err(|source| PipelineError::ConfigRead {
            path: path.clone(),
            source,
        })?;
        let rules_error = |source| PipelineError::Rules {
            path: path.clone(),
            source,
        };
        let table = RuleTable::from_toml_str(&content).map_err(rules_error)?;
        SectionDetector::with_rules(self.detection.tuning.clone(), table).map_err(rules_error)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectionConfig {
    #[serde(flatten)]
    pub tuning: DetectorConfig,
    /// TOML file replacing the built-in rule table
    pub rules_file: Option<PathBuf>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtractionConfig {
    /// Stands in for the contract date in file names when none was found
    pub date_placeholder: String,
    /// Output root, relative to the source folder unless absolute
    pub output_dir: PathBuf,
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            date_placeholder: "00.0000".into(),
            output_dir: PathBuf::from("pdfs_extraidos"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DiagnosisConfig {
    /// Artifact directory, relative to the source folder unless absolute
    pub artifact_dir: PathBuf,
    /// Documents with fewer found sections are listed as incomplete
    pub incomplete_threshold: usize,
}

impl Default for DiagnosisConfig {
    fn default() -> Self {
        Self {
            artifact_dir: PathBuf::from("diagnosticos"),
            incomplete_threshold: 10,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NormalizeConfig {
    /// Filename segments dropped before the person name is taken
    pub boilerplate: Vec<String>,
}

impl Default for NormalizeConfig {
    fn default() -> Self {
        Self {
            boilerplate: vec![
                "Contrato".into(),
                "Contrato de Trabajo".into(),
                "Renovacion de Contrato".into(),
                "Prorroga de Contrato".into(),
            ],
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Write a run log file per invocation
    pub enabled: bool,
    /// Root of the run log tree
    pub log_root: PathBuf,
    /// Workflow directory under the root
    pub workflow: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            log_root: PathBuf::from("logs"),
            workflow: "contratos".into(),
        }
    }
}

/// `dir` itself when absolute, otherwise `dir` under `base`
pub(crate) fn resolve_dir(base: &Path, dir: &Path) -> PathBuf {
    if dir.is_absolute() {
        dir.to_path_buf()
    } else {
        base.join(dir)
    }
}
