//! Headless-browser rendering of the Google Flights results page.
//!
//! Google Flights is a dynamic single-page application; the offer list only
//! exists after client-side rendering, so a plain HTTP fetch is useless. This
//! module owns one shared Chromium process, lazily launched on first use, and
//! hands out rendered HTML per URL. Every call gets its own tab with a
//! cleared cookie jar and a fixed user agent, and the tab is closed on every
//! exit path.

use crate::{SearchError, SearchMode};
use async_trait::async_trait;
use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::cdp::browser_protocol::network::{
    ClearBrowserCookiesParams, SetUserAgentOverrideParams,
};
use chromiumoxide::handler::viewport::Viewport;
use chromiumoxide::Page;
use futures::StreamExt;
use serde::Deserialize;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, Semaphore};
use tokio::time::Instant;
use tracing::{debug, info, warn};

/// Fixed user agent for reproducible rendering. Chrome's headless mode
/// otherwise advertises "HeadlessChrome", which the target site detects.
const USER_AGENT: &str = "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) \
     AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

/// Consent dialog dismissal candidates, tried in order. Absence of a dialog
/// is not an error.
const CONSENT_SELECTORS: &[&str] = &[
    r#"button[aria-label="Accept all"]"#,
    r#"button[aria-label="Agree to the use of cookies and other data for the purposes described"]"#,
    r#"form[action*="consent"] button"#,
    "#onetrust-accept-btn-handler",
    "div.VfPpkd-RLmnJb",
];

/// The rendered results container. Its appearance means offers (or the
/// explicit "no results" state) are on the page.
const RESULTS_SELECTOR: &str = "ul.Rk10dc";

/// Marker text Google shows when a route genuinely has no offers.
const NO_RESULTS_MARKERS: &[&str] = &["No results returned", "no flights found"];

/// Pause between result-container probes while waiting for the page to
/// finish its client-side render.
const RESULTS_POLL_INTERVAL: Duration = Duration::from_millis(500);

/// Browser tuning, loaded from configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct BrowserSettings {
    pub headless: bool,
    /// Explicit Chrome/Chromium executable; auto-detected when absent.
    pub chrome_path: Option<String>,
    /// Cap on concurrently open tabs. Chromium tabs are memory-hungry;
    /// unbounded concurrency exhausts the host under load.
    pub max_pages: usize,
    /// Budget for the results-container wait. Navigation and consent
    /// dismissal carry their own short fixed timeouts.
    pub fetch_timeout_secs: u64,
    pub viewport_width: u32,
    pub viewport_height: u32,
    pub extra_args: Vec<String>,
}

impl Default for BrowserSettings {
    fn default() -> Self {
        Self {
            headless: true,
            chrome_path: None,
            max_pages: 4,
            fetch_timeout_secs: 30,
            viewport_width: 1280,
            viewport_height: 900,
            extra_args: Vec::new(),
        }
    }
}

/// Classification of a fetch that completed without a hard failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchStatus {
    /// The results container rendered; HTML is usable.
    Rendered,
    /// The page rendered an explicit empty state for this route.
    NoResults,
    /// The results container never appeared within the budget.
    TimedOut,
}

/// Outcome of one rendered fetch. A timeout or empty route is a successful
/// outcome with no HTML to parse, never an error.
#[derive(Debug, Clone)]
pub struct FetchOutcome {
    pub status: FetchStatus,
    pub html: Option<String>,
}

impl FetchOutcome {
    fn rendered(html: String) -> Self {
        Self {
            status: FetchStatus::Rendered,
            html: Some(html),
        }
    }

    fn empty(status: FetchStatus) -> Self {
        Self { status, html: None }
    }
}

/// Seam between the facade and the rendering engine, so tests can substitute
/// a stub for the real browser.
#[async_trait]
pub trait RenderedHtmlSource: Send + Sync {
    async fn fetch_rendered(&self, url: &str) -> Result<FetchOutcome, SearchError>;
}

/// Shared headless-browser session.
///
/// One Chromium process serves all callers. Initialization is guarded by a
/// mutex so concurrent first callers trigger at most one launch; a failed
/// launch leaves the slot empty and is retried on the next call. Tabs are
/// independent and bounded by a semaphore.
pub struct BrowserSession {
    settings: BrowserSettings,
    browser: Mutex<Option<Arc<Browser>>>,
    page_permits: Semaphore,
}

impl BrowserSession {
    pub fn new(settings: BrowserSettings) -> Self {
        let max_pages = settings.max_pages.max(1);
        Self {
            settings,
            browser: Mutex::new(None),
            page_permits: Semaphore::new(max_pages),
        }
    }

    /// Idempotent lazy launch. Returns the shared browser handle.
    async fn ensure_ready(&self) -> Result<Arc<Browser>, SearchError> {
        let mut guard = self.browser.lock().await;

        if let Some(ref browser) = *guard {
            return Ok(Arc::clone(browser));
        }

        info!(headless = self.settings.headless, "Launching browser");
        let config = self.build_config()?;

        let (browser, mut handler) = Browser::launch(config)
            .await
            .map_err(|e| SearchError::Browser(format!("Failed to launch browser: {}", e)))?;

        // CDP event pump; runs for the lifetime of the browser process
        tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if let Err(e) = event {
                    warn!("CDP handler error: {}", e);
                }
            }
            debug!("CDP handler exited");
        });

        let browser = Arc::new(browser);
        *guard = Some(Arc::clone(&browser));
        Ok(browser)
    }

    fn build_config(&self) -> Result<BrowserConfig, SearchError> {
        let mut builder = BrowserConfig::builder()
            .viewport(Viewport {
                width: self.settings.viewport_width,
                height: self.settings.viewport_height,
                device_scale_factor: Some(1.0),
                emulating_mobile: false,
                is_landscape: true,
                has_touch: false,
            })
            .window_size(self.settings.viewport_width, self.settings.viewport_height)
            .arg("--disable-gpu")
            .arg("--no-sandbox")
            .arg("--disable-dev-shm-usage")
            .arg("--disable-extensions")
            .arg("--disable-background-networking")
            .arg("--disable-sync")
            .arg("--disable-translate")
            .arg("--disable-blink-features=AutomationControlled")
            .arg("--lang=en-US")
            .arg("--no-first-run")
            .arg("--no-default-browser-check")
            .arg("--hide-scrollbars")
            .arg("--mute-audio")
            .arg(format!("--user-agent={}", USER_AGENT));

        if !self.settings.headless {
            builder = builder.with_head();
        }

        if let Some(ref path) = self.settings.chrome_path {
            builder = builder.chrome_executable(path);
        }

        for arg in &self.settings.extra_args {
            builder = builder.arg(arg);
        }

        builder
            .build()
            .map_err(|e| SearchError::Browser(format!("Failed to build browser config: {}", e)))
    }

    /// Drops the browser handle, terminating the process once the last tab
    /// is gone. Subsequent fetches relaunch lazily.
    pub async fn shutdown(&self) {
        let mut guard = self.browser.lock().await;
        if guard.take().is_some() {
            info!("Browser session shut down");
        }
    }

    /// Navigation, consent handling, and the results wait. Tab cleanup is
    /// the caller's job so it happens on every exit path.
    async fn fetch_inner(&self, page: &Page, url: &str) -> Result<FetchOutcome, SearchError> {
        page.execute(SetUserAgentOverrideParams::new(USER_AGENT.to_string()))
            .await
            .map_err(|e| SearchError::Browser(format!("Failed to set user agent: {}", e)))?;

        // Fresh cookie jar per fetch; state never leaks between searches
        page.execute(ClearBrowserCookiesParams::default())
            .await
            .map_err(|e| SearchError::Browser(format!("Failed to clear cookies: {}", e)))?;

        page.goto(url)
            .await
            .map_err(|e| SearchError::Browser(format!("Navigation failed: {}", e)))?;
        page.wait_for_navigation()
            .await
            .map_err(|e| SearchError::Browser(format!("Navigation wait failed: {}", e)))?;

        self.dismiss_consent(page).await;

        // The offer list is filled in by XHR well after the load event, so a
        // single DOM query right after navigation misses it. Poll until the
        // container exists or the budget runs out.
        let wait_budget = Duration::from_secs(self.settings.fetch_timeout_secs);
        let found = poll_with_deadline(wait_budget, RESULTS_POLL_INTERVAL, || async move {
            page.find_element(RESULTS_SELECTOR).await.ok()
        })
        .await;

        match found {
            Some(_) => {
                // Give the list a moment to finish filling in
                tokio::time::sleep(Duration::from_millis(500)).await;
                let html = page
                    .content()
                    .await
                    .map_err(|e| SearchError::Browser(format!("Failed to get content: {}", e)))?;
                Ok(FetchOutcome::rendered(html))
            }
            None => {
                // Selector never appeared: classify before giving up on the page
                let html = page.content().await.unwrap_or_default();
                if NO_RESULTS_MARKERS
                    .iter()
                    .any(|marker| html.to_lowercase().contains(&marker.to_lowercase()))
                {
                    debug!(url = %url, "Route rendered an explicit empty state");
                    Ok(FetchOutcome::empty(FetchStatus::NoResults))
                } else {
                    warn!(url = %url, "Results container did not appear within budget");
                    Ok(FetchOutcome::empty(FetchStatus::TimedOut))
                }
            }
        }
    }

    /// Best-effort dismissal of the cookie-consent overlay. Tries each known
    /// selector once; a missing dialog is the common case and not an error.
    async fn dismiss_consent(&self, page: &Page) {
        for selector in CONSENT_SELECTORS {
            let found =
                tokio::time::timeout(Duration::from_secs(2), page.find_element(*selector)).await;
            if let Ok(Ok(element)) = found {
                match element.click().await {
                    Ok(_) => {
                        debug!(selector = %selector, "Consent dialog dismissed");
                        // Let the overlay animate out before the results wait
                        tokio::time::sleep(Duration::from_millis(300)).await;
                        return;
                    }
                    Err(e) => debug!(selector = %selector, "Consent click failed: {}", e),
                }
            }
        }
        debug!("No consent dialog found");
    }
}

#[async_trait]
impl RenderedHtmlSource for BrowserSession {
    async fn fetch_rendered(&self, url: &str) -> Result<FetchOutcome, SearchError> {
        let _permit = self
            .page_permits
            .acquire()
            .await
            .map_err(|e| SearchError::Browser(format!("Page semaphore closed: {}", e)))?;

        let browser = self.ensure_ready().await?;

        let page = browser
            .new_page("about:blank")
            .await
            .map_err(|e| SearchError::Browser(format!("Failed to open tab: {}", e)))?;

        // Inner call so the tab closes on success, timeout, and error alike
        let result = self.fetch_inner(&page, url).await;
        if let Err(e) = page.close().await {
            warn!("Failed to close tab: {}", e);
        }
        result
    }
}

/// Repeats `probe` until it yields a value or `budget` elapses. Probes once
/// immediately, then every `interval`, with a final probe at the deadline.
async fn poll_with_deadline<T, F, Fut>(budget: Duration, interval: Duration, mut probe: F) -> Option<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Option<T>>,
{
    let deadline = Instant::now() + budget;
    loop {
        if let Some(value) = probe().await {
            return Some(value);
        }
        let now = Instant::now();
        if now >= deadline {
            return None;
        }
        tokio::time::sleep_until(deadline.min(now + interval)).await;
    }
}

/// Builds the renderer for the configured mode: a live browser session for
/// scraping, nothing for simulation.
pub fn renderer_for_mode(
    mode: SearchMode,
    settings: &BrowserSettings,
) -> Option<Arc<dyn RenderedHtmlSource>> {
    match mode {
        SearchMode::Scrape => Some(Arc::new(BrowserSession::new(settings.clone()))),
        SearchMode::Simulate => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_settings_default() {
        let settings = BrowserSettings::default();
        assert!(settings.headless);
        assert_eq!(settings.max_pages, 4);
        assert_eq!(settings.fetch_timeout_secs, 30);
        assert!(settings.chrome_path.is_none());
    }

    #[test]
    fn test_session_permits_match_settings() {
        let session = BrowserSession::new(BrowserSettings {
            max_pages: 2,
            ..Default::default()
        });
        assert_eq!(session.page_permits.available_permits(), 2);
    }

    #[test]
    fn test_zero_max_pages_clamped_to_one() {
        let session = BrowserSession::new(BrowserSettings {
            max_pages: 0,
            ..Default::default()
        });
        assert_eq!(session.page_permits.available_permits(), 1);
    }

    #[tokio::test]
    async fn test_shutdown_without_launch_is_noop() {
        let session = BrowserSession::new(BrowserSettings::default());
        session.shutdown().await;
        session.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_poll_retries_until_value_appears() {
        use std::sync::atomic::{AtomicUsize, Ordering};
        let attempts = Arc::new(AtomicUsize::new(0));

        let counter = Arc::clone(&attempts);
        let found = poll_with_deadline(
            Duration::from_secs(10),
            Duration::from_millis(500),
            move || {
                let counter = Arc::clone(&counter);
                async move {
                    // Appears on the fourth probe, well inside the budget
                    let n = counter.fetch_add(1, Ordering::SeqCst);
                    (n >= 3).then_some(n)
                }
            },
        )
        .await;

        assert_eq!(found, Some(3));
        assert_eq!(attempts.load(Ordering::SeqCst), 4);
    }

    #[tokio::test(start_paused = true)]
    async fn test_poll_gives_up_at_deadline() {
        use std::sync::atomic::{AtomicUsize, Ordering};
        let attempts = Arc::new(AtomicUsize::new(0));

        let counter = Arc::clone(&attempts);
        let started = Instant::now();
        let found: Option<()> = poll_with_deadline(
            Duration::from_secs(5),
            Duration::from_millis(500),
            move || {
                counter.fetch_add(1, Ordering::SeqCst);
                async move { None }
            },
        )
        .await;

        assert!(found.is_none());
        // The full budget is spent waiting, probing throughout
        assert!(started.elapsed() >= Duration::from_secs(5));
        assert_eq!(attempts.load(Ordering::SeqCst), 11);
    }

    #[test]
    fn test_fetch_outcome_constructors() {
        let rendered = FetchOutcome::rendered("<html></html>".to_string());
        assert_eq!(rendered.status, FetchStatus::Rendered);
        assert!(rendered.html.is_some());

        let timed_out = FetchOutcome::empty(FetchStatus::TimedOut);
        assert_eq!(timed_out.status, FetchStatus::TimedOut);
        assert!(timed_out.html.is_none());
    }
}
