use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::RabError;
use crate::model::TaxRate;

/// Tunables for one analysis run. Every field has a default, so an empty JSON
/// object is a valid config.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtractionConfig {
    /// PPN rate added on top of every item amount, in percent.
    pub tax_rate_percent: Decimal,
    /// Worksheet to analyse. The first sheet is used when unset.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sheet: Option<String>,
    /// Decimal places kept when rounding PDF fragment y-positions into rows.
    pub row_merge_precision: u32,
    /// Unit-of-measure tokens recognised in PDF rows on top of the built-in set.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub extra_units: Vec<String>,
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            tax_rate_percent: TaxRate::default().percent(),
            sheet: None,
            row_merge_precision: 0,
            extra_units: Vec::new(),
        }
    }
}

impl ExtractionConfig {
    pub fn tax_rate(&self) -> TaxRate {
        TaxRate::from_percent(self.tax_rate_percent)
    }
}

/// Load a config from a JSON file.
pub fn load_config(path: &Path) -> Result<ExtractionConfig, RabError> {
    let content = std::fs::read_to_string(path).map_err(|e| RabError::ConfigLoad {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })?;
    let config: ExtractionConfig =
        serde_json::from_str(&content).map_err(|e| RabError::ConfigLoad {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
    validate_config(&config)?;
    Ok(config)
}

/// Parse a config from a JSON string (no file path context).
pub fn parse_config_str(json: &str) -> Result<ExtractionConfig, RabError> {
    let config: ExtractionConfig = serde_json::from_str(json)?;
    validate_config(&config)?;
    Ok(config)
}

pub fn validate_config(config: &ExtractionConfig) -> Result<(), RabError> {
    if config.tax_rate_percent.is_sign_negative() || config.tax_rate_percent > Decimal::ONE_HUNDRED
    {
        return Err(RabError::ConfigInvalid(format!(
            "tax_rate_percent must be between 0 and 100, got {}",
            config.tax_rate_percent
        )));
    }

    if config.row_merge_precision > 4 {
        return Err(RabError::ConfigInvalid(format!(
            "row_merge_precision must be at most 4, got {}",
            config.row_merge_precision
        )));
    }

    if let Some(ref sheet) = config.sheet {
        if sheet.trim().is_empty() {
            return Err(RabError::ConfigInvalid("sheet name must not be empty".into()));
        }
    }

    if config.extra_units.iter().any(|u| u.trim().is_empty()) {
        return Err(RabError::ConfigInvalid(
            "extra_units must not contain empty entries".into(),
        ));
    }

    Ok(())
}
