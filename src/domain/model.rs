use serde::{Deserialize, Serialize};

/// Passes granted by one accepted justification.
pub const PASSES_PER_JUSTIFICATION: u32 = 3;

/// Unix time in milliseconds.
pub type Timestamp = i64;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BlockedDomain {
    pub id: String,
    pub domain: String,
    pub added_at: Timestamp,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BlockingTimer {
    pub enabled: bool,
    pub start_time: Option<Timestamp>,
    /// Minutes.
    pub duration: u32,
    pub justification_required: bool,
}

impl Default for BlockingTimer {
    fn default() -> Self {
        Self {
            enabled: false,
            start_time: None,
            duration: 30,
            justification_required: true,
        }
    }
}

impl BlockingTimer {
    pub fn duration_millis(&self) -> i64 {
        i64::from(self.duration) * 60 * 1000
    }

    /// Whole seconds left, rounded up. Zero when disabled or unstamped.
    pub fn remaining_seconds(&self, now: Timestamp) -> u64 {
        let start = match (self.enabled, self.start_time) {
            (true, Some(start)) => start,
            _ => return 0,
        };

        let elapsed = now.saturating_sub(start);
        let remaining = self.duration_millis().saturating_sub(elapsed).max(0);
        // remaining is non-negative here
        (remaining as u64).div_ceil(1000)
    }

    /// `start_time` comes from the caller unchecked, so the arithmetic
    /// saturates instead of overflowing on extreme values.
    pub fn has_elapsed(&self, now: Timestamp) -> bool {
        match self.start_time {
            Some(start) => now.saturating_sub(start) >= self.duration_millis(),
            None => false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LedgerEntry {
    pub remaining_passes: u32,
    pub session_id: String,
}

impl LedgerEntry {
    pub fn fresh() -> Self {
        Self {
            remaining_passes: PASSES_PER_JUSTIFICATION,
            session_id: format!("session-{}", uuid::Uuid::new_v4()),
        }
    }
}

/// One element of the persisted `justifications` array.
///
/// `remainingPasses` and `sessionId` are only written under
/// [`LedgerDurability::Full`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JustificationRecord {
    pub domain: String,
    pub reason: String,
    pub justified: bool,
    pub timestamp: Timestamp,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub remaining_passes: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
}

/// The single durable record, stored under one storage key.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PersistedState {
    #[serde(default)]
    pub blocked_domains: Vec<BlockedDomain>,
    #[serde(default)]
    pub blocking_timer: Option<BlockingTimer>,
    #[serde(default)]
    pub justifications: Vec<JustificationRecord>,
}

/// How much of the pass ledger survives a coordinator restart.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
#[cfg_attr(feature = "cli", derive(clap::ValueEnum))]
pub enum LedgerDurability {
    /// Only domain names are written, with an empty reason; nothing is
    /// restored, so a restart resets every pass.
    #[default]
    DomainsOnly,
    /// Pass counts and session ids are written and restored.
    Full,
}
