#[cfg(feature = "cli")]
pub mod cli;
pub mod toml_config;

#[cfg(feature = "cli")]
pub use cli::CliConfig;

use crate::core::coordinator::CoordinatorConfig;
use crate::core::guard::GuardConfig;
use crate::core::interstitial::InterstitialConfig;
use crate::utils::error::Result;
use crate::utils::validation::{validate_non_empty_string, validate_positive_number, Validate};
use std::path::PathBuf;
use std::time::Duration;
use self::toml_config::TomlConfig;

pub const DEFAULT_DATA_DIR: &str = "./site-blocker-data";

/// Fully resolved settings: defaults, then the TOML file, then CLI flags.
///
/// The `site-blocker` binary only hosts the coordinator and reads
/// `data_dir` and `coordinator`. `guard` and `interstitial` are resolved
/// for hosts that embed [`PageGuard`](crate::core::guard::PageGuard) or
/// [`InterstitialFlow`](crate::core::interstitial::InterstitialFlow).
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub data_dir: PathBuf,
    pub coordinator: CoordinatorConfig,
    pub guard: GuardConfig,
    pub interstitial: InterstitialConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from(DEFAULT_DATA_DIR),
            coordinator: CoordinatorConfig::default(),
            guard: GuardConfig::default(),
            interstitial: InterstitialConfig::default(),
        }
    }
}

impl AppConfig {
    pub fn from_toml(file: &TomlConfig) -> Self {
        let mut config = Self::default();
        config.apply_toml(file);
        config
    }

    pub fn apply_toml(&mut self, file: &TomlConfig) {
        if let Some(storage) = &file.storage {
            if let Some(dir) = &storage.data_dir {
                self.data_dir = PathBuf::from(dir);
            }
            if let Some(key) = &storage.key {
                self.coordinator.storage_key = key.clone();
            }
        }
        if let Some(secs) = file.timer.as_ref().and_then(|t| t.check_interval_secs) {
            self.coordinator.check_interval = Duration::from_secs(secs);
        }
        if let Some(durability) = file.ledger.as_ref().and_then(|l| l.durability) {
            self.coordinator.ledger_durability = durability;
        }
        if let Some(ms) = file.guard.as_ref().and_then(|g| g.redirect_delay_ms) {
            self.guard.redirect_delay = Duration::from_millis(ms);
        }
        if let Some(section) = &file.interstitial {
            if let Some(mode) = section.mode {
                self.interstitial.mode = mode;
            }
            if let Some(ms) = section.return_delay_ms {
                self.interstitial.return_delay = Duration::from_millis(ms);
            }
            if let Some(min) = section.min_reason_len {
                self.interstitial.min_reason_len = min;
            }
            if let Some(max) = section.max_reason_len {
                self.interstitial.max_reason_len = max;
            }
        }
    }

    #[cfg(feature = "cli")]
    pub fn resolve(cli: &CliConfig) -> Result<Self> {
        let mut config = match &cli.config {
            Some(path) => {
                let file = TomlConfig::from_file(path)?;
                file.validate()?;
                Self::from_toml(&file)
            }
            None => Self::default(),
        };

        if let Some(dir) = &cli.data_dir {
            config.data_dir = PathBuf::from(dir);
        }
        if let Some(secs) = cli.check_interval_secs {
            config.coordinator.check_interval = Duration::from_secs(secs);
        }
        if let Some(durability) = cli.ledger_durability {
            config.coordinator.ledger_durability = durability;
        }

        config.validate()?;
        Ok(config)
    }
}

impl Validate for AppConfig {
    fn validate(&self) -> Result<()> {
        validate_non_empty_string("data_dir", &self.data_dir.to_string_lossy())?;
        validate_non_empty_string("storage_key", &self.coordinator.storage_key)?;
        validate_positive_number(
            "check_interval_millis",
            self.coordinator.check_interval.as_millis() as u64,
            1,
        )?;
        validate_positive_number(
            "max_reason_len",
            self.interstitial.max_reason_len as u64,
            self.interstitial.min_reason_len.max(1) as u64,
        )?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::interstitial::ChallengeMode;
    use crate::domain::model::LedgerDurability;

    #[test]
    fn test_defaults() {
        let config = AppConfig::default();
        assert_eq!(config.coordinator.check_interval, Duration::from_secs(5));
        assert_eq!(config.coordinator.storage_key, "blockingState");
        assert_eq!(config.coordinator.ledger_durability, LedgerDurability::DomainsOnly);
        assert_eq!(config.guard.redirect_delay, Duration::from_millis(500));
        assert_eq!(config.interstitial.return_delay, Duration::from_millis(2000));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_toml_overrides_defaults() {
        let file = TomlConfig::from_toml_str(
            r#"
[timer]
check_interval_secs = 1

[ledger]
durability = "full"

[guard]
redirect_delay_ms = 250

[interstitial]
mode = "challenge"
return_delay_ms = 100
"#,
        )
        .unwrap();

        let config = AppConfig::from_toml(&file);
        assert_eq!(config.coordinator.check_interval, Duration::from_secs(1));
        assert_eq!(config.coordinator.ledger_durability, LedgerDurability::Full);
        assert_eq!(config.guard.redirect_delay, Duration::from_millis(250));
        assert_eq!(config.interstitial.mode, ChallengeMode::Challenge);
        assert_eq!(config.interstitial.return_delay, Duration::from_millis(100));
        assert_eq!(config.data_dir, PathBuf::from(DEFAULT_DATA_DIR));
    }

    #[cfg(feature = "cli")]
    #[test]
    fn test_cli_overrides_toml() {
        use clap::Parser;
        use std::io::Write;

        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[storage]\ndata_dir = \"/from/toml\"\n[timer]\ncheck_interval_secs = 9").unwrap();
        let path = file.path().to_string_lossy().to_string();

        let cli = CliConfig::parse_from([
            "site-blocker",
            "--config",
            path.as_str(),
            "--data-dir",
            "/from/cli",
            "--ledger-durability",
            "full",
        ]);
        let config = AppConfig::resolve(&cli).unwrap();
        assert_eq!(config.data_dir, PathBuf::from("/from/cli"));
        assert_eq!(config.coordinator.check_interval, Duration::from_secs(9));
        assert_eq!(config.coordinator.ledger_durability, LedgerDurability::Full);
    }
}
