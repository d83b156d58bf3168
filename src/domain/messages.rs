use crate::domain::model::{BlockedDomain, BlockingTimer, Timestamp};
use crate::utils::error::{BlockerError, Result};
use crate::utils::validation::{validate_domain, validate_timer_duration};
use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DomainAction {
    Add,
    Remove,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DomainUpdate {
    pub domain: String,
    pub action: DomainAction,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Justification {
    pub domain: String,
    pub reason: String,
    pub timestamp: Timestamp,
    #[serde(default = "default_justified")]
    pub justified: bool,
}

fn default_justified() -> bool {
    true
}

/// Requests addressed to the coordinator, tagged by `type` with the body
/// under `payload`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Request {
    UpdateDomains(DomainUpdate),
    UpdateTimer(BlockingTimer),
    GetBlockingState,
    IsBlocked { url: String },
    SubmitJustification(Justification),
    CheckTimer,
    UsePass { domain: String },
}

impl Request {
    pub const TAGS: [&'static str; 7] = [
        "UPDATE_DOMAINS",
        "UPDATE_TIMER",
        "GET_BLOCKING_STATE",
        "IS_BLOCKED",
        "SUBMIT_JUSTIFICATION",
        "CHECK_TIMER",
        "USE_PASS",
    ];

    pub fn tag(&self) -> &'static str {
        match self {
            Request::UpdateDomains(_) => "UPDATE_DOMAINS",
            Request::UpdateTimer(_) => "UPDATE_TIMER",
            Request::GetBlockingState => "GET_BLOCKING_STATE",
            Request::IsBlocked { .. } => "IS_BLOCKED",
            Request::SubmitJustification(_) => "SUBMIT_JUSTIFICATION",
            Request::CheckTimer => "CHECK_TIMER",
            Request::UsePass { .. } => "USE_PASS",
        }
    }

    /// Validated add request; the domain is trimmed and lower-cased.
    pub fn add_domain(domain: &str) -> Result<Self> {
        let domain = validate_domain("domain", domain)?;
        Ok(Request::UpdateDomains(DomainUpdate {
            domain,
            action: DomainAction::Add,
        }))
    }

    /// Starts the timer at `now`. Callers read the clock; the coordinator
    /// never stamps `startTime` itself.
    pub fn enable_timer(duration: u32, now: Timestamp) -> Result<Self> {
        validate_timer_duration("duration", duration)?;
        Ok(Request::UpdateTimer(BlockingTimer {
            enabled: true,
            start_time: Some(now),
            duration,
            justification_required: true,
        }))
    }

    pub fn disable_timer(duration: u32) -> Self {
        Request::UpdateTimer(BlockingTimer {
            enabled: false,
            start_time: None,
            duration,
            justification_required: true,
        })
    }
}

/// Decodes a raw `{type, payload}` envelope, telling an unknown tag apart
/// from a known tag with a bad payload.
pub fn parse_request(raw: Value) -> Result<Request> {
    let tag = match raw.get("type").and_then(Value::as_str) {
        Some(tag) => tag.to_string(),
        None => {
            return Err(BlockerError::MalformedPayload {
                tag: "<missing>".to_string(),
                message: "envelope has no string 'type' field".to_string(),
            })
        }
    };

    if !Request::TAGS.contains(&tag.as_str()) {
        return Err(BlockerError::UnknownMessage { tag });
    }

    serde_json::from_value(raw).map_err(|e| BlockerError::MalformedPayload {
        tag,
        message: e.to_string(),
    })
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Response {
    BlockingState {
        domains: Vec<BlockedDomain>,
        timer: BlockingTimer,
    },
    #[serde(rename_all = "camelCase")]
    BlockStatus {
        is_blocked: bool,
        remaining_passes: u32,
    },
    #[serde(rename_all = "camelCase")]
    TimerStatus {
        enabled: bool,
        /// Seconds.
        remaining_time: u64,
    },
    #[serde(rename_all = "camelCase")]
    PassUsage {
        success: bool,
        remaining_passes: u32,
    },
    Ack {
        success: bool,
    },
    Error {
        error: String,
    },
}

impl Response {
    pub fn ok() -> Self {
        Response::Ack { success: true }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Response::Error {
            error: message.into(),
        }
    }
}

/// Fire-and-forget notifications pushed to every page context.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CoordinatorEvent {
    TimerExpired,
}
