use crate::utils::error::{BlockerError, Result};
use regex::Regex;
use std::sync::OnceLock;

pub const MAX_DOMAIN_LEN: usize = 253;
pub const MIN_TIMER_MINUTES: u32 = 1;
pub const MAX_TIMER_MINUTES: u32 = 1440;

pub trait Validate {
    fn validate(&self) -> Result<()>;
}

fn domain_regex() -> Result<&'static Regex> {
    static DOMAIN_RE: OnceLock<Regex> = OnceLock::new();
    if let Some(re) = DOMAIN_RE.get() {
        return Ok(re);
    }
    let re = Regex::new(r"(?i)^[a-z0-9]([a-z0-9-]*[a-z0-9])?(\.[a-z0-9]([a-z0-9-]*[a-z0-9])?)*$")
        .map_err(|e| BlockerError::ConfigError {
            message: format!("domain pattern: {}", e),
        })?;
    Ok(DOMAIN_RE.get_or_init(|| re))
}

/// Normalizes and checks a user-entered domain, returning the form that
/// should be sent to the coordinator.
pub fn validate_domain(field_name: &str, domain: &str) -> Result<String> {
    let normalized = domain.trim().to_lowercase();

    if normalized.is_empty() {
        return Err(BlockerError::validation(field_name, "Domain cannot be empty"));
    }

    if normalized.len() > MAX_DOMAIN_LEN {
        return Err(BlockerError::validation(
            field_name,
            format!("Domain must be at most {} characters", MAX_DOMAIN_LEN),
        ));
    }

    if normalized.contains(' ') || !domain_regex()?.is_match(&normalized) {
        return Err(BlockerError::validation(
            field_name,
            format!("'{}' is not a valid domain", domain),
        ));
    }

    Ok(normalized)
}

pub fn validate_timer_duration(field_name: &str, minutes: u32) -> Result<()> {
    validate_range(field_name, minutes, MIN_TIMER_MINUTES, MAX_TIMER_MINUTES)
}

/// Trims the justification text and enforces its length bounds (in chars).
pub fn validate_justification(
    field_name: &str,
    reason: &str,
    min_len: usize,
    max_len: usize,
) -> Result<String> {
    let trimmed = reason.trim();

    if trimmed.is_empty() {
        return Err(BlockerError::validation(
            field_name,
            "Please provide a justification",
        ));
    }

    let len = trimmed.chars().count();
    if len < min_len || len > max_len {
        return Err(BlockerError::validation(
            field_name,
            format!(
                "Justification must be between {} and {} characters (got {})",
                min_len, max_len, len
            ),
        ));
    }

    Ok(trimmed.to_string())
}

pub fn validate_positive_number(field_name: &str, value: u64, min_value: u64) -> Result<()> {
    if value < min_value {
        return Err(BlockerError::validation(
            field_name,
            format!("Value must be at least {}", min_value),
        ));
    }
    Ok(())
}

pub fn validate_non_empty_string(field_name: &str, value: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(BlockerError::validation(
            field_name,
            "Value cannot be empty or whitespace-only",
        ));
    }
    Ok(())
}

pub fn validate_range<T: PartialOrd + std::fmt::Display + Copy>(
    field_name: &str,
    value: T,
    min: T,
    max: T,
) -> Result<()> {
    if value < min || value > max {
        return Err(BlockerError::validation(
            field_name,
            format!("Value must be between {} and {} (got {})", min, max, value),
        ));
    }
    Ok(())
}
