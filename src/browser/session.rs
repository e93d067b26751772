use crate::browser::auth_state::AuthState;
use crate::browser::download::{Artifact, DownloadWatcher};
use crate::core::{Config, PageDriver};
use crate::dom::Locator;
use crate::errors::{E2eError, Result};
use crate::types::{ElementState, LoadState};
use crate::utils::screenshot::ScreenshotManager;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, info, warn};

/// Interval between condition checks while waiting.
pub const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// A page counts as network-idle once no new resources were requested for
/// this long.
pub const NETWORK_IDLE_QUIET: Duration = Duration::from_millis(500);

/// One authenticated browsing context, driven by a single scenario.
///
/// Page objects borrow the session, so they can never outlive it. Every wait
/// suspends the caller until its condition holds or its timeout fires; a
/// timed-out wait fails only the current operation and is never retried.
pub struct Session<D: PageDriver> {
    driver: D,
    config: Arc<Config>,
    session_id: String,
}

impl<D: PageDriver> Session<D> {
    pub fn new(driver: D, config: Arc<Config>) -> Self {
        Self {
            driver,
            config,
            session_id: uuid::Uuid::new_v4().to_string(),
        }
    }

    pub fn id(&self) -> &str {
        &self.session_id
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn driver(&self) -> &D {
        &self.driver
    }

    pub fn default_timeout(&self) -> Duration {
        self.config.default_timeout()
    }

    /// Resolves `path` against the configured base URL.
    pub fn url_for(&self, path: &str) -> Result<String> {
        let base = url::Url::parse(&self.config.base_url)?;
        Ok(base.join(path)?.to_string())
    }

    pub async fn goto(&self, path: &str) -> Result<()> {
        let url = self.url_for(path)?;
        debug!("[{}] goto {}", self.session_id, url);
        self.driver.goto(&url).await?;
        self.wait_for_load_state(LoadState::Load, self.default_timeout())
            .await
    }

    pub async fn reload(&self, state: LoadState, timeout: Duration) -> Result<()> {
        self.driver.reload().await?;
        self.wait_for_load_state(state, timeout).await
    }

    pub async fn current_url(&self) -> Result<String> {
        self.driver.current_url().await
    }

    pub async fn title(&self) -> Result<String> {
        self.driver.title().await
    }

    pub async fn wait_for_load_state(&self, state: LoadState, timeout: Duration) -> Result<()> {
        let deadline = Instant::now() + timeout;
        let mut last_count: Option<u64> = None;
        let mut last_change = Instant::now();

        loop {
            match self.driver.load_snapshot().await {
                Ok(snapshot) => {
                    let reached = match state {
                        LoadState::DomContentLoaded => snapshot.is_interactive(),
                        LoadState::Load => snapshot.is_complete(),
                        LoadState::NetworkIdle => {
                            if last_count != Some(snapshot.resource_count) {
                                last_count = Some(snapshot.resource_count);
                                last_change = Instant::now();
                            }
                            snapshot.is_complete() && last_change.elapsed() >= NETWORK_IDLE_QUIET
                        }
                    };
                    if reached {
                        debug!("[{}] reached {}", self.session_id, state);
                        return Ok(());
                    }
                }
                Err(e) => debug!("[{}] load state check failed: {}", self.session_id, e),
            }

            let now = Instant::now();
            if now >= deadline {
                return Err(E2eError::LoadStateTimeout {
                    state: state.to_string(),
                    timeout,
                });
            }
            tokio::time::sleep(POLL_INTERVAL.min(deadline - now)).await;
        }
    }

    /// Polls `check` until it yields `true` or `timeout` elapses. Check errors
    /// count as "not yet". Always checks at least once.
    async fn poll_until<F, Fut>(&self, timeout: Duration, mut check: F) -> bool
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<bool>>,
    {
        let deadline = Instant::now() + timeout;
        loop {
            match check().await {
                Ok(true) => return true,
                Ok(false) => {}
                Err(e) => debug!("[{}] check failed: {}", self.session_id, e),
            }
            let now = Instant::now();
            if now >= deadline {
                return false;
            }
            tokio::time::sleep(POLL_INTERVAL.min(deadline - now)).await;
        }
    }

    async fn reached(&self, locator: &Locator, state: ElementState) -> Result<bool> {
        match state {
            ElementState::Attached => Ok(self.driver.count(locator).await? > 0),
            ElementState::Detached => Ok(self.driver.count(locator).await? == 0),
            ElementState::Visible => self.driver.is_visible(locator).await,
            ElementState::Hidden => Ok(!self.driver.is_visible(locator).await?),
        }
    }

    /// Waits for `locator` to reach `state`.
    ///
    /// Fails with `ElementNotFound` when nothing ever matched and
    /// `ElementNotVisible` when a match exists but never became visible.
    pub async fn wait_for(
        &self,
        locator: &Locator,
        state: ElementState,
        timeout: Duration,
    ) -> Result<()> {
        if self
            .poll_until(timeout, || self.reached(locator, state))
            .await
        {
            return Ok(());
        }

        let attached = self.driver.count(locator).await.unwrap_or(0) > 0;
        Err(match state {
            ElementState::Visible if attached => E2eError::ElementNotVisible {
                locator: locator.to_string(),
                timeout,
            },
            ElementState::Visible | ElementState::Attached => E2eError::ElementNotFound {
                locator: locator.to_string(),
                timeout,
            },
            ElementState::Detached | ElementState::Hidden => {
                E2eError::assertion(locator.to_string(), state, "still present")
            }
        })
    }

    /// Visibility check that treats absence as a plain `false`.
    pub async fn is_visible_within(&self, locator: &Locator, timeout: Duration) -> bool {
        self.poll_until(timeout, || self.driver.is_visible(locator))
            .await
    }

    pub async fn click(&self, locator: &Locator, timeout: Duration) -> Result<()> {
        let start = Instant::now();
        self.wait_for(locator, ElementState::Visible, timeout).await?;
        let remaining = timeout.saturating_sub(start.elapsed());
        if !self
            .poll_until(remaining, || self.driver.is_enabled(locator))
            .await
        {
            return Err(E2eError::assertion(locator.to_string(), "enabled", "disabled"));
        }
        self.driver.click(locator).await?;
        debug!("[{}] clicked {}", self.session_id, locator);
        Ok(())
    }

    /// Fills without submitting.
    pub async fn fill(&self, locator: &Locator, value: &str, timeout: Duration) -> Result<()> {
        self.wait_for(locator, ElementState::Visible, timeout).await?;
        self.driver.fill(locator, value).await?;
        debug!("[{}] filled {}", self.session_id, locator);
        Ok(())
    }

    pub async fn press(&self, locator: &Locator, key: &str, timeout: Duration) -> Result<()> {
        self.wait_for(locator, ElementState::Visible, timeout).await?;
        self.driver.press(locator, key).await?;
        debug!("[{}] pressed {} on {}", self.session_id, key, locator);
        Ok(())
    }

    /// Chooses an option by its visible label, waiting for the options to render.
    pub async fn select_option(
        &self,
        locator: &Locator,
        label: &str,
        timeout: Duration,
    ) -> Result<String> {
        let start = Instant::now();
        self.wait_for(locator, ElementState::Visible, timeout).await?;
        let deadline = start + timeout;

        loop {
            match self.driver.select_option(locator, label).await {
                Ok(chosen) => {
                    debug!("[{}] selected {:?} in {}", self.session_id, chosen, locator);
                    return Ok(chosen);
                }
                Err(e) => debug!("[{}] option {:?} not ready: {}", self.session_id, label, e),
            }
            let now = Instant::now();
            if now >= deadline {
                return Err(E2eError::ElementNotFound {
                    locator: format!("option {:?} of {}", label, locator),
                    timeout,
                });
            }
            tokio::time::sleep(POLL_INTERVAL.min(deadline - now)).await;
        }
    }

    pub async fn set_checked(
        &self,
        locator: &Locator,
        checked: bool,
        timeout: Duration,
    ) -> Result<()> {
        self.wait_for(locator, ElementState::Visible, timeout).await?;
        self.driver.set_checked(locator, checked).await
    }

    pub async fn text_content(&self, locator: &Locator, timeout: Duration) -> Result<String> {
        self.wait_for(locator, ElementState::Attached, timeout).await?;
        Ok(self.driver.text_content(locator).await?.unwrap_or_default())
    }

    pub async fn count(&self, locator: &Locator) -> Result<usize> {
        self.driver.count(locator).await
    }

    pub async fn attribute(&self, locator: &Locator, name: &str) -> Result<Option<String>> {
        self.driver.attribute(locator, name).await
    }

    pub async fn tag_name(&self, locator: &Locator) -> Result<Option<String>> {
        self.driver.tag_name(locator).await
    }

    pub async fn is_enabled(&self, locator: &Locator) -> Result<bool> {
        self.driver.is_enabled(locator).await
    }

    pub async fn expect_visible(&self, locator: &Locator, timeout: Duration) -> Result<()> {
        if self.is_visible_within(locator, timeout).await {
            return Ok(());
        }
        let actual = if self.driver.count(locator).await.unwrap_or(0) > 0 {
            "hidden"
        } else {
            "not attached"
        };
        Err(E2eError::assertion(
            locator.to_string(),
            format!("visible within {:?}", timeout),
            actual,
        ))
    }

    pub async fn expect_enabled(&self, locator: &Locator, timeout: Duration) -> Result<()> {
        if self
            .poll_until(timeout, || self.driver.is_enabled(locator))
            .await
        {
            Ok(())
        } else {
            Err(E2eError::assertion(locator.to_string(), "enabled", "disabled"))
        }
    }

    /// Asserts the trimmed text content equals `expected`.
    pub async fn expect_text(
        &self,
        locator: &Locator,
        expected: &str,
        timeout: Duration,
    ) -> Result<()> {
        let last_seen: Mutex<Option<String>> = Mutex::new(None);
        let matched = self
            .poll_until(timeout, || {
                let seen = &last_seen;
                async move {
                    let text = self.driver.text_content(locator).await?;
                    let trimmed = text.map(|t| t.trim().to_string());
                    let hit = trimmed.as_deref() == Some(expected);
                    *seen.lock().unwrap_or_else(PoisonError::into_inner) = trimmed;
                    Ok(hit)
                }
            })
            .await;
        if matched {
            return Ok(());
        }
        let last_seen = last_seen
            .into_inner()
            .unwrap_or_else(PoisonError::into_inner);
        Err(E2eError::assertion(
            locator.to_string(),
            format!("{:?}", expected),
            last_seen
                .map(|t| format!("{:?}", t))
                .unwrap_or_else(|| "<no element>".to_string()),
        ))
    }

    pub async fn expect_count_at_least(&self, locator: &Locator, min: usize) -> Result<usize> {
        let count = self.driver.count(locator).await?;
        if count >= min {
            Ok(count)
        } else {
            Err(E2eError::assertion(
                locator.to_string(),
                format!("at least {} matches", min),
                count,
            ))
        }
    }

    pub async fn expect_absent(&self, locator: &Locator) -> Result<()> {
        let count = self.driver.count(locator).await?;
        if count == 0 {
            Ok(())
        } else {
            Err(E2eError::assertion(locator.to_string(), "no matches", count))
        }
    }

    pub async fn expect_url_contains(&self, fragment: &str) -> Result<()> {
        let url = self.driver.current_url().await?;
        if url.contains(fragment) {
            Ok(())
        } else {
            Err(E2eError::assertion(
                "current URL",
                format!("to contain {:?}", fragment),
                url,
            ))
        }
    }

    /// Saves a PNG under the screenshot directory. Capture problems are logged
    /// and never fail the caller.
    pub async fn screenshot(&self, name: &str) -> Option<PathBuf> {
        let dir = &self.config.artifacts.screenshot_dir;
        match ScreenshotManager::save_to_file(&self.driver, dir, name).await {
            Ok(path) => {
                info!("Screenshot saved to {}", path.display());
                Some(path)
            }
            Err(e) => {
                warn!("Screenshot {} failed: {}", name, e);
                None
            }
        }
    }

    pub async fn screenshot_timestamped(&self, name: &str) -> Option<PathBuf> {
        let dir = &self.config.artifacts.screenshot_dir;
        match ScreenshotManager::save_timestamped(&self.driver, dir, name).await {
            Ok(path) => Some(path),
            Err(e) => {
                warn!("Screenshot {} failed: {}", name, e);
                None
            }
        }
    }

    /// Clicks `trigger` and waits for the resulting download to finish.
    pub async fn expect_download(&self, trigger: &Locator, timeout: Duration) -> Result<Artifact> {
        let dir = self.config.artifacts.download_dir.clone();
        let watcher = DownloadWatcher::arm(&dir).await?;
        self.driver.set_download_dir(&dir).await?;
        self.click(trigger, self.default_timeout()).await?;
        info!("Waiting up to {:?} for download into {}", timeout, dir.display());
        watcher.wait(timeout).await
    }

    pub async fn save_auth_state(&self, path: &Path) -> Result<AuthState> {
        let state = self.driver.export_auth_state().await?;
        state.save(path).await?;
        Ok(state)
    }

    /// Restores a saved snapshot; `false` when none exists.
    pub async fn restore_auth_state(&self, path: &Path) -> Result<bool> {
        let Some(state) = AuthState::load(path).await? else {
            debug!("No auth state at {}", path.display());
            return Ok(false);
        };
        self.goto("/").await?;
        self.driver.import_auth_state(&state).await?;
        info!(
            "Restored auth state saved at {} ({} cookies)",
            state.saved_at,
            state.cookies.len()
        );
        Ok(true)
    }

    pub async fn close(&self) -> Result<()> {
        self.driver.close().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dom::Selector;
    use crate::testing::{DriverCall, FakeDriver};
    use tokio_test::{assert_err, assert_ok};

    fn session(driver: FakeDriver) -> Session<FakeDriver> {
        Session::new(driver, Arc::new(Config::default()))
    }

    fn button() -> Locator {
        Locator::new(
            "View Report button",
            Selector::xpath("//button[normalize-space()='View Report']"),
        )
    }

    #[tokio::test(start_paused = true)]
    async fn wait_for_visible_succeeds_once_element_appears() {
        let driver = FakeDriver::new();
        driver.add_element(&button()).appears_after(Duration::from_secs(2));
        let session = session(driver);

        assert_ok!(
            session
                .wait_for(&button(), ElementState::Visible, Duration::from_secs(5))
                .await
        );
    }

    #[tokio::test(start_paused = true)]
    async fn wait_for_distinguishes_missing_from_hidden() {
        let driver = FakeDriver::new();
        let hidden = Locator::new("hidden", Selector::css("div.hidden"));
        driver.add_element(&hidden).hidden();
        let session = session(driver);

        let missing = session
            .wait_for(&button(), ElementState::Visible, Duration::from_secs(1))
            .await
            .unwrap_err();
        assert!(matches!(missing, E2eError::ElementNotFound { .. }));

        let invisible = session
            .wait_for(&hidden, ElementState::Visible, Duration::from_secs(1))
            .await
            .unwrap_err();
        assert!(matches!(invisible, E2eError::ElementNotVisible { .. }));
    }

    #[tokio::test(start_paused = true)]
    async fn timed_out_wait_respects_its_bound() {
        let session = session(FakeDriver::new());
        let start = Instant::now();
        assert_err!(
            session
                .wait_for(&button(), ElementState::Visible, Duration::from_secs(3))
                .await
        );
        let waited = start.elapsed();
        assert!(waited >= Duration::from_secs(3));
        assert!(waited < Duration::from_secs(4));
    }

    #[tokio::test(start_paused = true)]
    async fn click_waits_for_enabled_state() {
        let driver = FakeDriver::new();
        driver.add_element(&button()).disabled();
        let session = session(driver);

        let err = session
            .click(&button(), Duration::from_secs(2))
            .await
            .unwrap_err();
        assert!(matches!(err, E2eError::AssertionFailed { .. }));
        assert_eq!(session.driver().clicks(), Vec::<String>::new());

        session.driver().element(&button()).enabled();
        assert_ok!(session.click(&button(), Duration::from_secs(2)).await);
        assert_eq!(session.driver().clicks(), vec![button().key()]);
    }

    #[tokio::test(start_paused = true)]
    async fn expect_text_reports_expected_and_actual() {
        let driver = FakeDriver::new();
        let title = Locator::new("report title", Selector::css("h5.mx-name-text2"));
        driver.add_element(&title).text("  Trial Balance ");
        let session = session(driver);

        assert_ok!(
            session
                .expect_text(&title, "Trial Balance", Duration::from_secs(1))
                .await
        );
        let err = session
            .expect_text(&title, "NAV Pack Report", Duration::from_secs(1))
            .await
            .unwrap_err();
        match err {
            E2eError::AssertionFailed { expected, actual, .. } => {
                assert_eq!(expected, "\"NAV Pack Report\"");
                assert_eq!(actual, "\"Trial Balance\"");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn verification_is_repeatable() {
        let driver = FakeDriver::new();
        driver.add_element(&button());
        let session = session(driver);

        let first = session.expect_visible(&button(), Duration::from_secs(1)).await;
        let second = session.expect_visible(&button(), Duration::from_secs(1)).await;
        assert!(first.is_ok() && second.is_ok());

        let absent = Locator::new("absent", Selector::text("Nope"));
        let first = session.expect_visible(&absent, Duration::from_secs(1)).await;
        let second = session.expect_visible(&absent, Duration::from_secs(1)).await;
        assert_eq!(first.unwrap_err().to_string(), second.unwrap_err().to_string());
    }

    #[tokio::test(start_paused = true)]
    async fn network_idle_needs_a_quiet_window() {
        let driver = FakeDriver::new();
        driver.set_loading_for(Duration::from_secs(1));
        let session = session(driver);

        let start = Instant::now();
        assert_ok!(
            session
                .wait_for_load_state(LoadState::NetworkIdle, Duration::from_secs(5))
                .await
        );
        assert!(start.elapsed() >= Duration::from_secs(1) + NETWORK_IDLE_QUIET);
    }

    #[tokio::test(start_paused = true)]
    async fn load_state_timeout_is_reported() {
        let driver = FakeDriver::new();
        driver.set_loading_for(Duration::from_secs(60));
        let session = session(driver);

        let err = session
            .wait_for_load_state(LoadState::Load, Duration::from_secs(2))
            .await
            .unwrap_err();
        assert!(matches!(err, E2eError::LoadStateTimeout { .. }));
    }

    #[tokio::test(start_paused = true)]
    async fn select_option_matches_by_label() {
        let driver = FakeDriver::new();
        let fund = Locator::new("fund", Selector::css("select"));
        driver
            .add_element(&fund)
            .options(&["Alpha Fund", "Steerhead Alternative Energy Fund"]);
        let session = session(driver);

        let chosen = session
            .select_option(&fund, "Steerhead Alternative Energy Fund", Duration::from_secs(1))
            .await
            .unwrap();
        assert_eq!(chosen, "Steerhead Alternative Energy Fund");

        let err = session
            .select_option(&fund, "Missing Fund", Duration::from_secs(1))
            .await
            .unwrap_err();
        assert!(matches!(err, E2eError::ElementNotFound { .. }));
    }

    #[tokio::test(start_paused = true)]
    async fn goto_joins_base_url() {
        let session = session(FakeDriver::new());
        assert_ok!(session.goto("/").await);
        assert_eq!(
            session.driver().calls().first(),
            Some(&DriverCall::Goto("https://aurum-test.alchelyst.com/".to_string()))
        );
    }

    #[tokio::test]
    async fn restore_without_snapshot_is_a_no_op() {
        let dir = tempfile::tempdir().unwrap();
        let session = session(FakeDriver::new());
        let restored = session
            .restore_auth_state(&dir.path().join("auth-state.json"))
            .await
            .unwrap();
        assert!(!restored);
        assert!(session.driver().calls().is_empty());
    }
}
