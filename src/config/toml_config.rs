use crate::core::interstitial::ChallengeMode;
use crate::domain::model::LedgerDurability;
use crate::utils::error::{BlockerError, Result};
use crate::utils::validation::{validate_non_empty_string, validate_positive_number, Validate};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// On-disk configuration. Every section and key is optional; missing
/// values fall back to the built-in defaults.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TomlConfig {
    pub storage: Option<StorageSection>,
    pub timer: Option<TimerSection>,
    pub ledger: Option<LedgerSection>,
    pub guard: Option<GuardSection>,
    pub interstitial: Option<InterstitialSection>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StorageSection {
    pub data_dir: Option<String>,
    pub key: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TimerSection {
    pub check_interval_secs: Option<u64>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LedgerSection {
    pub durability: Option<LedgerDurability>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GuardSection {
    pub redirect_delay_ms: Option<u64>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct InterstitialSection {
    pub mode: Option<ChallengeMode>,
    pub return_delay_ms: Option<u64>,
    pub min_reason_len: Option<usize>,
    pub max_reason_len: Option<usize>,
}

impl TomlConfig {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(&path)?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        let processed = Self::substitute_env_vars(content)?;
        Ok(toml::from_str(&processed)?)
    }

    /// Replaces `${VAR}` with the environment value; unknown variables are
    /// left untouched.
    fn substitute_env_vars(content: &str) -> Result<String> {
        use regex::Regex;

        let re = Regex::new(r"\$\{([^}]+)\}").map_err(|e| BlockerError::ConfigError {
            message: format!("env var pattern: {}", e),
        })?;

        Ok(re
            .replace_all(content, |caps: &regex::Captures| {
                let var_name = &caps[1];
                std::env::var(var_name).unwrap_or_else(|_| format!("${{{}}}", var_name))
            })
            .into_owned())
    }
}

impl Validate for TomlConfig {
    fn validate(&self) -> Result<()> {
        if let Some(storage) = &self.storage {
            if let Some(dir) = &storage.data_dir {
                validate_non_empty_string("storage.data_dir", dir)?;
            }
            if let Some(key) = &storage.key {
                validate_non_empty_string("storage.key", key)?;
            }
        }

        if let Some(secs) = self.timer.as_ref().and_then(|t| t.check_interval_secs) {
            validate_positive_number("timer.check_interval_secs", secs, 1)?;
        }

        if let Some(interstitial) = &self.interstitial {
            if let (Some(min), Some(max)) = (interstitial.min_reason_len, interstitial.max_reason_len)
            {
                if min > max {
                    return Err(BlockerError::ConfigError {
                        message: format!(
                            "interstitial.min_reason_len ({}) exceeds max_reason_len ({})",
                            min, max
                        ),
                    });
                }
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_parse_full_config() {
        let toml_content = r#"
[storage]
data_dir = "/var/lib/site-blocker"
key = "state"

[timer]
check_interval_secs = 2

[ledger]
durability = "full"

[guard]
redirect_delay_ms = 250

[interstitial]
mode = "challenge"
return_delay_ms = 1000
min_reason_len = 5
max_reason_len = 200
"#;

        let config = TomlConfig::from_toml_str(toml_content).unwrap();
        assert_eq!(config.storage.as_ref().unwrap().key.as_deref(), Some("state"));
        assert_eq!(config.timer.as_ref().unwrap().check_interval_secs, Some(2));
        assert_eq!(
            config.ledger.as_ref().unwrap().durability,
            Some(LedgerDurability::Full)
        );
        assert_eq!(
            config.interstitial.as_ref().unwrap().mode,
            Some(ChallengeMode::Challenge)
        );
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_empty_config_is_valid() {
        let config = TomlConfig::from_toml_str("").unwrap();
        assert!(config.storage.is_none());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_env_var_substitution() {
        std::env::set_var("SITE_BLOCKER_TEST_DIR", "/tmp/blocker");

        let config = TomlConfig::from_toml_str(
            r#"
[storage]
data_dir = "${SITE_BLOCKER_TEST_DIR}"
"#,
        )
        .unwrap();
        assert_eq!(
            config.storage.unwrap().data_dir.as_deref(),
            Some("/tmp/blocker")
        );

        std::env::remove_var("SITE_BLOCKER_TEST_DIR");
    }

    #[test]
    fn test_config_validation() {
        let zero_interval = TomlConfig::from_toml_str("[timer]\ncheck_interval_secs = 0\n").unwrap();
        assert!(zero_interval.validate().is_err());

        let inverted = TomlConfig::from_toml_str(
            "[interstitial]\nmin_reason_len = 50\nmax_reason_len = 10\n",
        )
        .unwrap();
        assert!(inverted.validate().is_err());

        assert!(TomlConfig::from_toml_str("[ledger]\ndurability = \"forever\"\n").is_err());
    }

    #[test]
    fn test_load_from_file() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "[guard]\nredirect_delay_ms = 0").unwrap();

        let config = TomlConfig::from_file(file.path()).unwrap();
        assert_eq!(config.guard.unwrap().redirect_delay_ms, Some(0));
    }
}
