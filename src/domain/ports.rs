use crate::domain::messages::{Request, Response};
use crate::domain::model::Timestamp;
use crate::utils::error::Result;
use async_trait::async_trait;
use serde_json::Value;
use std::sync::atomic::{AtomicI64, Ordering};

/// Durable key-value persistence.
pub trait Storage: Send + Sync + 'static {
    fn get(&self, key: &str) -> impl std::future::Future<Output = Result<Option<Value>>> + Send;
    fn set(&self, key: &str, value: Value)
        -> impl std::future::Future<Output = Result<()>> + Send;
}

pub trait Clock: Send + Sync + 'static {
    fn now_millis(&self) -> Timestamp;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_millis(&self) -> Timestamp {
        chrono::Utc::now().timestamp_millis()
    }
}

/// A clock that only moves when told to.
#[derive(Debug, Default)]
pub struct ManualClock {
    now: AtomicI64,
}

impl ManualClock {
    pub fn new(start: Timestamp) -> Self {
        Self {
            now: AtomicI64::new(start),
        }
    }

    pub fn set(&self, now: Timestamp) {
        self.now.store(now, Ordering::SeqCst);
    }

    pub fn advance_secs(&self, secs: i64) {
        self.now.fetch_add(secs * 1000, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now_millis(&self) -> Timestamp {
        self.now.load(Ordering::SeqCst)
    }
}

/// Request/response channel to the coordinator, as seen by page contexts.
#[async_trait]
pub trait BlockingService: Send + Sync {
    async fn handle(&self, request: Request) -> Response;
}

/// The browsing context a page guard or interstitial runs in.
#[async_trait]
pub trait PageHost: Send + Sync {
    fn current_url(&self) -> String;

    /// `false` for embedded frames.
    fn is_top_level(&self) -> bool;

    async fn wait_until_interactive(&self);

    fn navigate(&self, url: &str);

    /// Leaves the current page the way the browser's back button would.
    fn history_back(&self);

    /// Base URL of the interstitial page, without query.
    fn interstitial_url(&self) -> String;
}
