use crate::browser::session::Session;
use crate::core::PageDriver;
use crate::dom::Locator;
use crate::errors::{E2eError, Result};
use std::time::Duration;
use tracing::{debug, error, info};

/// Screenshot written when no candidate resolves.
pub const BLOCKED_SCREENSHOT: &str = "debug-navigation-blocked";

/// Ordered, single-attempt search for a control whose selector is unstable
/// across application states.
///
/// Each candidate gets exactly one visibility wait bounded by
/// `per_candidate_timeout`. The first one that becomes visible wins and the
/// rest are never evaluated. There is no retry and no backoff.
#[derive(Debug, Clone)]
pub struct FallbackChain {
    candidates: Vec<Locator>,
    per_candidate_timeout: Duration,
}

impl FallbackChain {
    pub fn new(candidates: Vec<Locator>, per_candidate_timeout: Duration) -> Self {
        Self {
            candidates,
            per_candidate_timeout,
        }
    }

    pub fn candidates(&self) -> &[Locator] {
        &self.candidates
    }

    pub fn per_candidate_timeout(&self) -> Duration {
        self.per_candidate_timeout
    }

    pub async fn resolve<D: PageDriver>(&self, session: &Session<D>) -> Result<Locator> {
        for candidate in &self.candidates {
            if session
                .is_visible_within(candidate, self.per_candidate_timeout)
                .await
            {
                info!("Found {} with {}", candidate.name(), candidate.selector());
                return Ok(candidate.clone());
            }
            debug!("No visible match for {}", candidate);
        }

        let url = session.current_url().await.unwrap_or_default();
        let title = session.title().await.unwrap_or_default();
        error!(
            "No candidate resolved on {} ({:?}); user may not be logged in or the page changed",
            url, title
        );
        session.screenshot(BLOCKED_SCREENSHOT).await;

        Err(E2eError::NavigationBlocked {
            url,
            title,
            candidates: self.candidates.iter().map(|c| c.to_string()).collect(),
        })
    }

    /// Resolves, then clicks the winning candidate.
    pub async fn click_first<D: PageDriver>(&self, session: &Session<D>) -> Result<Locator> {
        let winner = self.resolve(session).await?;
        session.click(&winner, self.per_candidate_timeout).await?;
        Ok(winner)
    }
}

/// Clicks through a fixed menu path. Every step waits for its own target to
/// become visible before clicking it.
pub async fn follow_menu<D: PageDriver>(
    session: &Session<D>,
    steps: &[&Locator],
    step_timeout: Duration,
) -> Result<()> {
    for step in steps {
        session.click(step, step_timeout).await?;
        info!("Clicked {}", step.name());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::Config;
    use crate::dom::Selector;
    use crate::testing::FakeDriver;
    use std::sync::Arc;
    use tokio::time::Instant;

    fn candidates() -> Vec<Locator> {
        [
            "(//img[@role='button' and contains(@src,'ClickArrow.svg')])[2]",
            "//img[@role='button' and contains(@src,'ClickArrow.svg')]",
            "//img[contains(@src,'ClickArrow')]",
        ]
        .iter()
        .map(|xpath| Locator::new("arrow button", Selector::xpath(*xpath)).first())
        .collect()
    }

    fn session_with(driver: FakeDriver, dir: &std::path::Path) -> Session<FakeDriver> {
        let mut config = Config::default();
        config.artifacts.screenshot_dir = dir.to_path_buf();
        Session::new(driver, Arc::new(config))
    }

    #[tokio::test(start_paused = true)]
    async fn first_visible_candidate_wins() {
        let dir = tempfile::tempdir().unwrap();
        let driver = FakeDriver::new();
        let all = candidates();
        driver.add_element(&all[1]);
        driver.add_element(&all[2]);
        let session = session_with(driver, dir.path());

        let chain = FallbackChain::new(all.clone(), Duration::from_secs(5));
        let winner = chain.resolve(&session).await.unwrap();

        assert_eq!(winner, all[1]);
        let queried = session.driver().queried_keys();
        assert!(queried.contains(&all[0].key()));
        assert!(!queried.contains(&all[2].key()));
    }

    #[tokio::test(start_paused = true)]
    async fn each_candidate_gets_one_bounded_attempt() {
        let dir = tempfile::tempdir().unwrap();
        let driver = FakeDriver::new();
        let all = candidates();
        driver.add_element(&all[2]).appears_after(Duration::from_secs(3));
        let session = session_with(driver, dir.path());

        let start = Instant::now();
        let chain = FallbackChain::new(all.clone(), Duration::from_secs(5));
        let winner = chain.click_first(&session).await.unwrap();

        assert_eq!(winner, all[2]);
        // Two full misses, then a hit within the third window.
        assert!(start.elapsed() >= Duration::from_secs(10));
        assert!(start.elapsed() < Duration::from_secs(15));
        assert_eq!(session.driver().clicks(), vec![all[2].key()]);
    }

    #[tokio::test(start_paused = true)]
    async fn all_misses_block_with_diagnostics() {
        let dir = tempfile::tempdir().unwrap();
        let driver = FakeDriver::new();
        driver.set_url("https://portal.test/login.html");
        driver.set_title("Sign in");
        let session = session_with(driver, dir.path());

        let chain = FallbackChain::new(candidates(), Duration::from_secs(1));
        let err = chain.resolve(&session).await.unwrap_err();

        match err {
            E2eError::NavigationBlocked { url, title, candidates } => {
                assert_eq!(url, "https://portal.test/login.html");
                assert_eq!(title, "Sign in");
                assert_eq!(candidates.len(), 3);
            }
            other => panic!("unexpected error: {other}"),
        }
        assert!(dir
            .path()
            .join(format!("{}.png", BLOCKED_SCREENSHOT))
            .exists());
    }

    #[tokio::test(start_paused = true)]
    async fn menu_steps_run_in_order() {
        let dir = tempfile::tempdir().unwrap();
        let driver = FakeDriver::new();
        let tab = Locator::new("Live Reports tab", Selector::text("Live Reports"));
        let branch = Locator::new("Accounting branch", Selector::text("Accounting"));
        driver.add_element(&tab).reveals(&branch);
        driver.add_element(&branch).hidden();
        let session = session_with(driver, dir.path());

        follow_menu(&session, &[&tab, &branch], Duration::from_secs(2))
            .await
            .unwrap();
        assert_eq!(session.driver().clicks(), vec![tab.key(), branch.key()]);
    }
}
