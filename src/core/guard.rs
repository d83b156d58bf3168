//! Per-page enforcement: ask the coordinator whether the loaded page is
//! blocked, spend a pass when one is available, otherwise redirect the
//! whole context to the interstitial.

use crate::core::coordinator::extract_host;
use crate::domain::messages::{CoordinatorEvent, Request, Response};
use crate::domain::ports::{BlockingService, PageHost};
use crate::utils::error::{BlockerError, Result};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

pub const DEFAULT_REDIRECT_DELAY: Duration = Duration::from_millis(500);

#[derive(Debug, Clone)]
pub struct GuardConfig {
    /// Pause before redirecting, so the page's first paint is not raced.
    pub redirect_delay: Duration,
}

impl Default for GuardConfig {
    fn default() -> Self {
        Self {
            redirect_delay: DEFAULT_REDIRECT_DELAY,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GuardOutcome {
    SkippedFrame,
    Allowed,
    /// Page let through on a pass; the pass was spent in the background.
    PassSpent { domain: String },
    Redirected { to: String },
    AlreadyRedirecting,
    RedirectFailed { reason: String },
}

pub struct PageGuard<C: BlockingService + 'static, H: PageHost> {
    service: Arc<C>,
    host: H,
    config: GuardConfig,
    redirecting: AtomicBool,
}

impl<C: BlockingService + 'static, H: PageHost> PageGuard<C, H> {
    pub fn new(service: Arc<C>, host: H, config: GuardConfig) -> Self {
        Self {
            service,
            host,
            config,
            redirecting: AtomicBool::new(false),
        }
    }

    pub fn host(&self) -> &H {
        &self.host
    }

    pub async fn run(&self) -> GuardOutcome {
        if !self.host.is_top_level() {
            return GuardOutcome::SkippedFrame;
        }

        self.host.wait_until_interactive().await;

        let url = self.host.current_url();
        let (is_blocked, remaining_passes) = match self
            .service
            .handle(Request::IsBlocked { url: url.clone() })
            .await
        {
            Response::BlockStatus {
                is_blocked,
                remaining_passes,
            } => (is_blocked, remaining_passes),
            other => {
                tracing::warn!("Unexpected IS_BLOCKED answer {:?}, treating page as blocked", other);
                (true, 0)
            }
        };

        if is_blocked {
            tokio::time::sleep(self.config.redirect_delay).await;
            return self.redirect(&url);
        }

        if remaining_passes > 0 {
            let domain = extract_host(&url);
            let service = Arc::clone(&self.service);
            let request = Request::UsePass {
                domain: domain.clone(),
            };
            tokio::spawn(async move {
                service.handle(request).await;
            });
            tracing::debug!("Spending one of {} passes on {}", remaining_passes, domain);
            return GuardOutcome::PassSpent { domain };
        }

        GuardOutcome::Allowed
    }

    fn redirect(&self, url: &str) -> GuardOutcome {
        if self.redirecting.swap(true, Ordering::SeqCst) {
            return GuardOutcome::AlreadyRedirecting;
        }

        match build_interstitial_url(&self.host.interstitial_url(), url) {
            Ok(to) => {
                tracing::info!("Redirecting {} to interstitial", url);
                self.host.navigate(&to);
                GuardOutcome::Redirected { to }
            }
            Err(e) => {
                tracing::error!("Cannot build interstitial URL for {}: {}", url, e);
                GuardOutcome::RedirectFailed {
                    reason: e.to_string(),
                }
            }
        }
    }

    pub fn on_event(&self, event: CoordinatorEvent) {
        match event {
            CoordinatorEvent::TimerExpired => {
                tracing::info!("Timer expired, page {} is no longer enforced", self.host.current_url());
            }
        }
    }
}

/// `<base>?target=<url>&domain=<host>`, both values URL-encoded.
pub fn build_interstitial_url(base: &str, target: &str) -> Result<String> {
    let mut url = url::Url::parse(base)
        .map_err(|e| BlockerError::validation("interstitial_url", e.to_string()))?;
    let domain = extract_host(target);
    url.query_pairs_mut()
        .clear()
        .append_pair("target", target)
        .append_pair("domain", &domain);
    Ok(url.into())
}
