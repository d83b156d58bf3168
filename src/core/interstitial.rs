use crate::domain::messages::{Justification, Request, Response};
use crate::domain::ports::{BlockingService, Clock, PageHost, SystemClock};
use crate::utils::error::{BlockerError, Result};
use crate::utils::validation::validate_justification;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

pub const DEFAULT_RETURN_DELAY: Duration = Duration::from_millis(2000);
pub const DEFAULT_MIN_REASON_LEN: usize = 10;
pub const DEFAULT_MAX_REASON_LEN: usize = 500;
/// Slider position (percent) at which the challenge counts as solved.
pub const CHALLENGE_THRESHOLD: u8 = 95;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    Warning,
    Form,
    Confirmation,
    Submitted,
}

impl std::fmt::Display for Step {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Step::Warning => "warning",
            Step::Form => "form",
            Step::Confirmation => "confirmation",
            Step::Submitted => "submitted",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ChallengeMode {
    /// Warning, free-text form, confirmation, submit.
    #[default]
    FreeText,
    /// Warning, then a challenge whose completion submits directly.
    Challenge,
}

#[derive(Debug, Clone)]
pub struct InterstitialConfig {
    pub mode: ChallengeMode,
    pub min_reason_len: usize,
    pub max_reason_len: usize,
    pub return_delay: Duration,
}

impl Default for InterstitialConfig {
    fn default() -> Self {
        Self {
            mode: ChallengeMode::default(),
            min_reason_len: DEFAULT_MIN_REASON_LEN,
            max_reason_len: DEFAULT_MAX_REASON_LEN,
            return_delay: DEFAULT_RETURN_DELAY,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackOutcome {
    /// The flow was abandoned and the browser went back.
    Exited,
    MovedTo(Step),
    Stayed,
}

pub struct InterstitialFlow<C: BlockingService, H: PageHost> {
    service: Arc<C>,
    host: H,
    config: InterstitialConfig,
    clock: Arc<dyn Clock>,
    domain: String,
    target_url: String,
    step: Step,
    reason: String,
    error: Option<String>,
    submitted: bool,
}

impl<C: BlockingService, H: PageHost> InterstitialFlow<C, H> {
    /// Reads `target` and `domain` from the host's current (interstitial) URL.
    pub fn from_host(service: Arc<C>, host: H, config: InterstitialConfig) -> Result<Self> {
        let current = host.current_url();
        let url = url::Url::parse(&current)
            .map_err(|e| BlockerError::validation("interstitial_url", e.to_string()))?;

        let mut target_url = None;
        let mut domain = None;
        for (key, value) in url.query_pairs() {
            match key.as_ref() {
                "target" => target_url = Some(value.into_owned()),
                "domain" => domain = Some(value.into_owned()),
                _ => {}
            }
        }

        let target_url = target_url
            .ok_or_else(|| BlockerError::validation("target", "missing from interstitial URL"))?;
        let domain = domain
            .ok_or_else(|| BlockerError::validation("domain", "missing from interstitial URL"))?;

        Ok(Self {
            service,
            host,
            config,
            clock: Arc::new(SystemClock),
            domain,
            target_url,
            step: Step::Warning,
            reason: String::new(),
            error: None,
            submitted: false,
        })
    }

    /// Clock used to stamp the submitted justification.
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn step(&self) -> Step {
        self.step
    }

    pub fn domain(&self) -> &str {
        &self.domain
    }

    pub fn target_url(&self) -> &str {
        &self.target_url
    }

    pub fn reason(&self) -> &str {
        &self.reason
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn host(&self) -> &H {
        &self.host
    }

    pub fn clear_error(&mut self) {
        self.error = None;
    }

    fn invalid(&self, action: &str) -> BlockerError {
        BlockerError::InvalidTransition {
            action: action.to_string(),
            step: self.step.to_string(),
        }
    }

    pub fn proceed(&mut self) -> Result<()> {
        if self.step != Step::Warning {
            return Err(self.invalid("proceed"));
        }
        self.step = Step::Form;
        Ok(())
    }

    pub fn go_back(&mut self) -> BackOutcome {
        match self.step {
            Step::Warning => {
                self.host.history_back();
                BackOutcome::Exited
            }
            Step::Form => {
                self.step = Step::Warning;
                BackOutcome::MovedTo(Step::Warning)
            }
            Step::Confirmation => {
                self.step = Step::Form;
                BackOutcome::MovedTo(Step::Form)
            }
            Step::Submitted => BackOutcome::Stayed,
        }
    }

    pub fn set_reason(&mut self, reason: &str) {
        self.reason = reason.to_string();
    }

    /// Free-text mode: validates the reason and moves to confirmation.
    pub fn submit_form(&mut self) -> Result<()> {
        if self.config.mode != ChallengeMode::FreeText || self.step != Step::Form {
            return Err(self.invalid("submit form"));
        }

        match validate_justification(
            "reason",
            &self.reason,
            self.config.min_reason_len,
            self.config.max_reason_len,
        ) {
            Ok(trimmed) => {
                self.reason = trimmed;
                self.error = None;
                self.step = Step::Confirmation;
                Ok(())
            }
            Err(e) => {
                self.error = Some(e.to_string());
                Err(e)
            }
        }
    }

    pub async fn confirm(&mut self) -> Result<()> {
        if self.step != Step::Confirmation {
            return Err(self.invalid("confirm"));
        }
        self.submit().await
    }

    /// Challenge mode: a solved challenge submits with a synthesized reason.
    pub async fn complete_challenge(&mut self, progress: u8) -> Result<()> {
        if self.config.mode != ChallengeMode::Challenge || self.step != Step::Form {
            return Err(self.invalid("complete challenge"));
        }
        if progress < CHALLENGE_THRESHOLD {
            return Err(BlockerError::validation(
                "challenge",
                format!("progress {}% is below {}%", progress, CHALLENGE_THRESHOLD),
            ));
        }

        self.reason = format!(
            "Unblock requested for {} after security confirmation",
            self.domain
        );
        self.submit().await
    }

    async fn submit(&mut self) -> Result<()> {
        if self.submitted {
            return Ok(());
        }

        let request = Request::SubmitJustification(Justification {
            domain: self.domain.clone(),
            reason: self.reason.clone(),
            timestamp: self.clock.now_millis(),
            justified: true,
        });

        match self.service.handle(request).await {
            Response::Ack { success: true } => {}
            other => {
                let message = match other {
                    Response::Error { error } => error,
                    _ => "justification was not accepted".to_string(),
                };
                self.error = Some(message.clone());
                return Err(BlockerError::Rejected {
                    tag: "SUBMIT_JUSTIFICATION".to_string(),
                    message,
                });
            }
        }

        self.submitted = true;
        self.step = Step::Submitted;
        self.error = None;
        tracing::info!("Justification submitted for {}", self.domain);

        tokio::time::sleep(self.config.return_delay).await;
        self.host.navigate(&self.target_url);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::storage::MemoryStorage;
    use crate::core::coordinator::{Coordinator, CoordinatorConfig};
    use crate::core::guard::build_interstitial_url;
    use crate::core::testing::FakeHost;
    use crate::domain::ports::ManualClock;
    use async_trait::async_trait;

    struct Refusing;

    #[derive(Default)]
    struct Recording {
        requests: std::sync::Mutex<Vec<Request>>,
    }

    #[async_trait]
    impl BlockingService for Recording {
        async fn handle(&self, request: Request) -> Response {
            self.requests.lock().unwrap().push(request);
            Response::ok()
        }
    }

    #[async_trait]
    impl BlockingService for Refusing {
        async fn handle(&self, _request: Request) -> Response {
            Response::error("storage unavailable")
        }
    }

    async fn coordinator() -> Arc<Coordinator<MemoryStorage>> {
        let clock = Arc::new(ManualClock::new(0));
        Arc::new(Coordinator::start(MemoryStorage::new(), clock, CoordinatorConfig::default()).await)
    }

    fn host() -> FakeHost {
        let url = build_interstitial_url(
            "chrome-extension://site-blocker/block-page.html",
            "https://example.com/watch?v=1",
        )
        .unwrap();
        FakeHost::top_level(&url)
    }

    fn config(mode: ChallengeMode) -> InterstitialConfig {
        InterstitialConfig {
            mode,
            return_delay: Duration::from_millis(1),
            ..InterstitialConfig::default()
        }
    }

    #[tokio::test]
    async fn test_parses_interstitial_url() {
        let flow =
            InterstitialFlow::from_host(coordinator().await, host(), config(ChallengeMode::FreeText))
                .unwrap();
        assert_eq!(flow.domain(), "example.com");
        assert_eq!(flow.target_url(), "https://example.com/watch?v=1");
        assert_eq!(flow.step(), Step::Warning);

        let bare = FakeHost::top_level("chrome-extension://site-blocker/block-page.html?domain=x.com");
        assert!(InterstitialFlow::from_host(coordinator().await, bare, InterstitialConfig::default()).is_err());
    }

    #[tokio::test]
    async fn test_free_text_flow_submits_and_returns() {
        let service = coordinator().await;
        let mut flow = InterstitialFlow::from_host(
            Arc::clone(&service),
            host(),
            config(ChallengeMode::FreeText),
        )
        .unwrap();

        flow.proceed().unwrap();
        flow.set_reason("short");
        assert!(flow.submit_form().is_err());
        assert!(flow.error().is_some());
        assert_eq!(flow.step(), Step::Form);

        flow.set_reason("  checking the release announcement  ");
        flow.submit_form().unwrap();
        assert_eq!(flow.step(), Step::Confirmation);
        assert_eq!(flow.reason(), "checking the release announcement");

        flow.confirm().await.unwrap();
        assert_eq!(flow.step(), Step::Submitted);
        assert_eq!(service.remaining_passes("example.com").await, 3);
        assert_eq!(flow.host().navigations(), vec!["https://example.com/watch?v=1".to_string()]);

        assert!(flow.confirm().await.is_err());
        assert_eq!(flow.go_back(), BackOutcome::Stayed);
    }

    #[tokio::test]
    async fn test_challenge_mode_collapses_form_and_confirmation() {
        let service = coordinator().await;
        let mut flow = InterstitialFlow::from_host(
            Arc::clone(&service),
            host(),
            config(ChallengeMode::Challenge),
        )
        .unwrap();

        flow.proceed().unwrap();
        assert!(flow.submit_form().is_err());
        assert!(flow.complete_challenge(60).await.is_err());
        assert_eq!(flow.step(), Step::Form);

        flow.complete_challenge(100).await.unwrap();
        assert_eq!(flow.step(), Step::Submitted);
        assert!(flow.reason().contains("example.com"));
        assert_eq!(service.remaining_passes("example.com").await, 3);
    }

    #[tokio::test]
    async fn test_back_navigation() {
        let mut flow =
            InterstitialFlow::from_host(coordinator().await, host(), config(ChallengeMode::FreeText))
                .unwrap();

        flow.proceed().unwrap();
        flow.set_reason("a perfectly fine reason");
        flow.submit_form().unwrap();

        assert_eq!(flow.go_back(), BackOutcome::MovedTo(Step::Form));
        assert_eq!(flow.go_back(), BackOutcome::MovedTo(Step::Warning));
        assert_eq!(flow.go_back(), BackOutcome::Exited);
        assert_eq!(flow.host().backs(), 1);
        assert!(flow.host().navigations().is_empty());
    }

    #[tokio::test]
    async fn test_rejected_submission_keeps_step() {
        let mut flow =
            InterstitialFlow::from_host(Arc::new(Refusing), host(), config(ChallengeMode::FreeText))
                .unwrap();
        flow.proceed().unwrap();
        flow.set_reason("need it for a ticket");
        flow.submit_form().unwrap();

        let err = flow.confirm().await.unwrap_err();
        assert!(matches!(err, BlockerError::Rejected { .. }));
        assert_eq!(flow.step(), Step::Confirmation);
        assert_eq!(flow.error(), Some("storage unavailable"));
        assert!(flow.host().navigations().is_empty());
    }

    #[tokio::test]
    async fn test_submission_is_stamped_by_clock() {
        let service = Arc::new(Recording::default());
        let clock = Arc::new(ManualClock::new(1_700_000_123_456));
        let mut flow = InterstitialFlow::from_host(
            Arc::clone(&service),
            host(),
            config(ChallengeMode::Challenge),
        )
        .unwrap()
        .with_clock(clock);

        flow.proceed().unwrap();
        flow.complete_challenge(CHALLENGE_THRESHOLD).await.unwrap();
        assert!(flow.complete_challenge(CHALLENGE_THRESHOLD).await.is_err());

        let requests = service.requests.lock().unwrap();
        assert_eq!(requests.len(), 1);
        match &requests[0] {
            Request::SubmitJustification(justification) => {
                assert_eq!(justification.domain, "example.com");
                assert_eq!(justification.timestamp, 1_700_000_123_456);
            }
            other => panic!("unexpected request: {:?}", other),
        }
    }
}
