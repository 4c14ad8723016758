//! Error taxonomy for the analysis engine

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::srm::SrmResult;

pub type Result<T> = std::result::Result<T, AbError>;

/// Structured data-validation failure, renderable by UI/API layers
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationError {
    pub code: String,
    pub title: String,
    pub details: String,
    pub fix_hint: String,
}

impl ValidationError {
    pub fn new(code: &str, title: impl Into<String>, details: impl Into<String>, fix_hint: impl Into<String>) -> Self {
        ValidationError {
            code: code.to_string(),
            title: title.into(),
            details: details.into(),
            fix_hint: fix_hint.into(),
        }
    }

    pub fn missing_column(col: &str) -> Self {
        Self::new(
            "missing_column",
            format!("Column '{}' not found", col),
            format!("Column '{}' was not found in the data table", col),
            "Check the column name or update the DataSchema",
        )
    }

    pub fn empty_column(col: &str) -> Self {
        Self::new(
            "empty_column",
            format!("Column '{}' is entirely empty", col),
            format!("Column '{}' contains only missing values", col),
            "Make sure the column is populated or remove it from the schema",
        )
    }
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}] {}: {}", self.code, self.title, self.details)
    }
}

#[derive(Debug, Error)]
pub enum AbError {
    #[error("validation failed: {0}")]
    Validation(ValidationError),

    #[error("invalid parameter: {0}")]
    InvalidParameter(String),

    #[error("SRM: traffic imbalance (p = {:.3e}, alpha = {})", .0.p_value, .0.alpha)]
    SrmCheckFailed(SrmResult),

    #[error(transparent)]
    Csv(#[from] csv::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

impl AbError {
    pub fn invalid(msg: impl Into<String>) -> Self {
        AbError::InvalidParameter(msg.into())
    }

    /// Machine-readable code for clients
    pub fn code(&self) -> &str {
        match self {
            AbError::Validation(v) => &v.code,
            AbError::InvalidParameter(_) => "invalid_parameter",
            AbError::SrmCheckFailed(_) => "srm_failed",
            AbError::Csv(_) => "csv_error",
            AbError::Io(_) => "io_error",
            AbError::Json(_) => "json_error",
        }
    }

    pub fn fix_hint(&self) -> Option<&str> {
        match self {
            AbError::Validation(v) => Some(&v.fix_hint),
            AbError::SrmCheckFailed(_) => {
                Some("Check the traffic allocation or rerun with force_run_when_srm_failed")
            }
            _ => None,
        }
    }
}

impl From<ValidationError> for AbError {
    fn from(e: ValidationError) -> Self {
        AbError::Validation(e)
    }
}

/// Fail fast on an alpha outside (0, 1)
pub fn check_alpha(alpha: f64) -> Result<()> {
    if alpha.is_finite() && alpha > 0.0 && alpha < 1.0 {
        Ok(())
    } else {
        Err(AbError::invalid(format!("alpha must be in (0, 1), got {}", alpha)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_check_alpha_bounds() {
        assert!(check_alpha(0.05).is_ok());
        assert!(check_alpha(0.0).is_err());
        assert!(check_alpha(1.0).is_err());
        assert!(check_alpha(f64::NAN).is_err());
    }

    #[test]
    fn test_codes() {
        let e: AbError = ValidationError::missing_column("metric").into();
        assert_eq!(e.code(), "missing_column");
        assert!(e.fix_hint().is_some());
        assert_eq!(AbError::invalid("k").code(), "invalid_parameter");
    }
}
