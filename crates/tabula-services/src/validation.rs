//! Local pre-flight checks for cell edits

use regex::Regex;
use tabula_grid::ValidationRules;

use crate::error::{ServiceError, ServiceResult};

/// Check committed text against a column's rules.
///
/// Blank text only fails `required`; pattern and range checks apply to
/// non-blank text. Patterns must match the whole value.
pub fn validate(column: &str, text: &str, rules: &ValidationRules) -> ServiceResult<()> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        if rules.required {
            return Err(ServiceError::Validation(format!("{column} is required")));
        }
        return Ok(());
    }

    if let Some(pattern) = rules.pattern.as_deref().filter(|p| !p.is_empty()) {
        let anchored = Regex::new(&format!("^(?:{pattern})$")).map_err(|e| {
            ServiceError::Validation(format!("{column} has an invalid pattern: {e}"))
        })?;
        if !anchored.is_match(text) {
            return Err(ServiceError::Validation(format!(
                "{column} must match {pattern}"
            )));
        }
    }

    if rules.min.is_some() || rules.max.is_some() {
        let number: f64 = trimmed
            .parse()
            .ok()
            .filter(|n: &f64| n.is_finite())
            .ok_or_else(|| ServiceError::Validation(format!("{column} must be a number")))?;
        if let Some(min) = rules.min {
            if number < min {
                return Err(ServiceError::Validation(format!(
                    "{column} must be at least {min}"
                )));
            }
        }
        if let Some(max) = rules.max {
            if number > max {
                return Err(ServiceError::Validation(format!(
                    "{column} must be at most {max}"
                )));
            }
        }
    }

    Ok(())
}
