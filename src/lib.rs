pub mod adapters;
pub mod config;
pub mod core;
pub mod domain;
pub mod utils;

#[cfg(feature = "cli")]
pub use crate::config::CliConfig;

pub use crate::adapters::storage::{FileStorage, MemoryStorage};
pub use crate::config::AppConfig;
pub use crate::core::coordinator::{Coordinator, CoordinatorConfig};
pub use crate::domain::model::{BlockedDomain, BlockingTimer, LedgerDurability};
pub use crate::domain::ports::{ManualClock, SystemClock};
pub use crate::utils::error::{BlockerError, Result};
