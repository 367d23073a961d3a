//! Run configuration: explicit column roles instead of name matching.
//!
//! Every field has a default, so a run without a config file is a purely
//! generic pipeline (inferred kinds, capping on all numeric columns, no
//! text/temporal/floor roles and no grouped sales summaries).

use crate::error::{PipelineError, Result};
use crate::table::ColumnKind;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct PipelineConfig {
    pub load: LoadConfig,
    pub lookups: Vec<LookupJoin>,
    pub quality: QualityConfig,
    pub cleaning: CleaningConfig,
    pub analysis: AnalysisConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct LoadConfig {
    /// Trimmed cell contents treated as missing (the empty cell always is).
    pub null_tokens: Vec<String>,
    /// chrono formats tried in order for temporal inference and coercion.
    pub date_formats: Vec<String>,
    /// Declared kinds overriding inference.
    pub kinds: BTreeMap<String, ColumnKind>,
    pub delimiter: char,
}

impl Default for LoadConfig {
    fn default() -> Self {
        Self {
            null_tokens: ["NA", "N/A", "NaN", "nan", "null", "NULL", "None"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
            date_formats: vec![
                "%Y-%m-%d".to_string(),
                "%Y-%m-%d %H:%M:%S".to_string(),
                "%Y-%m-%dT%H:%M:%S".to_string(),
                "%m/%d/%Y".to_string(),
                "%m/%d/%Y %H:%M".to_string(),
            ],
            kinds: BTreeMap::new(),
            delimiter: ',',
        }
    }
}

/// Left join of a secondary lookup table (e.g. taxi zone codes).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct LookupJoin {
    pub path: PathBuf,
    /// Column in the main table.
    pub key: String,
    /// Column in the lookup table.
    pub lookup_key: String,
    #[serde(default)]
    pub prefix: String,
    /// Lookup columns to bring over; all non-key columns when empty.
    #[serde(default)]
    pub columns: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct QualityConfig {
    /// Categorical columns with fewer distinct values list them verbatim.
    pub max_listed_levels: usize,
}

impl Default for QualityConfig {
    fn default() -> Self {
        Self {
            max_listed_levels: 10,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TextRule {
    Lower,
    Title,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct CleaningConfig {
    pub iqr_multiplier: f64,
    pub blank_as_missing: bool,
    pub text: BTreeMap<String, TextRule>,
    pub temporal: Vec<String>,
    pub floor_zero: Vec<String>,
    /// When non-empty, only these numeric columns are capped.
    pub cap_include: Vec<String>,
    pub cap_exclude: Vec<String>,
}

impl Default for CleaningConfig {
    fn default() -> Self {
        Self {
            iqr_multiplier: 1.5,
            blank_as_missing: true,
            text: BTreeMap::new(),
            temporal: Vec::new(),
            floor_zero: Vec::new(),
            cap_include: Vec::new(),
            cap_exclude: Vec::new(),
        }
    }
}

impl CleaningConfig {
    pub fn caps(&self, column: &str) -> bool {
        let included = self.cap_include.is_empty() || self.cap_include.iter().any(|c| c == column);
        included && !self.cap_exclude.iter().any(|c| c == column)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct AnalysisConfig {
    pub amount: Option<String>,
    pub group_by: Vec<String>,
    /// Defaults to the first temporal column of the cleaned table.
    pub date: Option<String>,
    pub customer: Option<String>,
    pub top_n: usize,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            amount: None,
            group_by: Vec::new(),
            date: None,
            customer: None,
            top_n: 10,
        }
    }
}

impl PipelineConfig {
    pub fn from_yaml_str(s: &str) -> Result<Self> {
        let config: PipelineConfig = serde_yaml::from_str(s)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(PipelineError::SourceNotFound(path.to_path_buf()));
        }
        info!(path = %path.display(), "Loading pipeline config");
        let content = fs::read_to_string(path)?;
        let mut config = Self::from_yaml_str(&content)?;
        // Lookup paths are relative to the config file.
        if let Some(dir) = path.parent() {
            for lookup in &mut config.lookups {
                if lookup.path.is_relative() {
                    lookup.path = dir.join(&lookup.path);
                }
            }
        }
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        let k = self.cleaning.iqr_multiplier;
        if !k.is_finite() || k <= 0.0 {
            return Err(PipelineError::Config(format!(
                "iqr_multiplier must be a positive number, got {}",
                k
            )));
        }
        if self.analysis.top_n == 0 {
            return Err(PipelineError::Config("top_n must be at least 1".into()));
        }
        if let Some(c) = self
            .cleaning
            .cap_include
            .iter()
            .find(|c| self.cleaning.cap_exclude.contains(*c))
        {
            return Err(PipelineError::Config(format!(
                "column '{}' is both included in and excluded from capping",
                c
            )));
        }
        if self.load.date_formats.is_empty() {
            return Err(PipelineError::Config("date_formats must not be empty".into()));
        }
        if !self.load.delimiter.is_ascii() {
            return Err(PipelineError::Config("delimiter must be an ASCII character".into()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_yaml_gives_defaults() {
        let c = PipelineConfig::from_yaml_str("{}").unwrap();
        assert_eq!(c, PipelineConfig::default());
        assert_eq!(c.cleaning.iqr_multiplier, 1.5);
        assert_eq!(c.analysis.top_n, 10);
    }

    #[test]
    fn parses_roles() {
        let yaml = r#"
cleaning:
  text:
    region: lower
    product: title
  temporal: [date]
  floor_zero: [sales, quantity]
  cap_exclude: [customer_id]
analysis:
  amount: sales
  group_by: [region, product]
  customer: customer_id
"#;
        let c = PipelineConfig::from_yaml_str(yaml).unwrap();
        assert_eq!(c.cleaning.text.get("region"), Some(&TextRule::Lower));
        assert_eq!(c.cleaning.text.get("product"), Some(&TextRule::Title));
        assert!(c.cleaning.caps("sales"));
        assert!(!c.cleaning.caps("customer_id"));
        assert_eq!(c.analysis.amount.as_deref(), Some("sales"));
    }

    #[test]
    fn rejects_invalid_values() {
        assert!(PipelineConfig::from_yaml_str("cleaning: {iqr_multiplier: 0}").is_err());
        assert!(PipelineConfig::from_yaml_str("analysis: {top_n: 0}").is_err());
        assert!(PipelineConfig::from_yaml_str(
            "cleaning: {cap_include: [a], cap_exclude: [a]}"
        )
        .is_err());
        assert!(PipelineConfig::from_yaml_str("unknown_section: 1").is_err());
    }

    #[test]
    fn cap_include_restricts_capping() {
        let c = CleaningConfig {
            cap_include: vec!["fare".into()],
            ..Default::default()
        };
        assert!(c.caps("fare"));
        assert!(!c.caps("tip"));
    }
}
