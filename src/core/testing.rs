use crate::domain::ports::PageHost;
use async_trait::async_trait;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Mutex;

pub struct FakeHost {
    url: String,
    top_level: bool,
    navigations: Mutex<Vec<String>>,
    backs: AtomicU32,
}

impl FakeHost {
    pub fn top_level(url: &str) -> Self {
        Self {
            url: url.to_string(),
            top_level: true,
            navigations: Mutex::new(Vec::new()),
            backs: AtomicU32::new(0),
        }
    }

    pub fn frame(url: &str) -> Self {
        Self {
            top_level: false,
            ..Self::top_level(url)
        }
    }

    pub fn navigations(&self) -> Vec<String> {
        self.navigations.lock().unwrap().clone()
    }

    pub fn backs(&self) -> u32 {
        self.backs.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl PageHost for FakeHost {
    fn current_url(&self) -> String {
        self.url.clone()
    }

    fn is_top_level(&self) -> bool {
        self.top_level
    }

    async fn wait_until_interactive(&self) {}

    fn navigate(&self, url: &str) {
        self.navigations.lock().unwrap().push(url.to_string());
    }

    fn history_back(&self) {
        self.backs.fetch_add(1, Ordering::SeqCst);
    }

    fn interstitial_url(&self) -> String {
        "chrome-extension://site-blocker/block-page.html".to_string()
    }
}
