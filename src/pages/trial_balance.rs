use super::{
    export_button, report_container, view_report_button, ReportMenu, FORM_CHECK_TIMEOUT,
    MENU_STEP_TIMEOUT,
};
use crate::browser::{Artifact, ArtifactFormat, FallbackChain, Session};
use crate::core::PageDriver;
use crate::dom::{Locator, Selector};
use crate::errors::Result;
use crate::types::{ElementState, LoadState};
use std::path::PathBuf;
use std::time::Duration;
use tracing::info;

pub const REPORT_TITLE: &str = "Trial Balance";

/// Per-candidate bound while probing for the arrow button.
pub const ARROW_CANDIDATE_TIMEOUT: Duration = Duration::from_secs(5);

const PAGE_SETTLE_TIMEOUT: Duration = Duration::from_secs(15);
const DATA_ROWS_TIMEOUT: Duration = Duration::from_secs(20);

/// The arrow button's markup differs between portal states; most specific first.
pub const ARROW_BUTTON_CANDIDATES: [&str; 6] = [
    "(//img[@role='button' and contains(@src,'ClickArrow.svg')])[2]",
    "//img[@role='button' and contains(@src,'ClickArrow.svg')]",
    "//img[contains(@src,'ClickArrow')]",
    "//img[contains(@src,'arrow')]",
    "//button[contains(@class,'arrow')]",
    "//div[contains(@class,'arrow')]",
];

const DATA_ROWS_CSS: &str = "table tbody tr, .mx-datagrid tbody tr, .mx-listview tbody tr";

pub struct TrialBalancePage<'a, D: PageDriver> {
    session: &'a Session<D>,
    pub menu: ReportMenu,
    pub arrow_chain: FallbackChain,
    pub trial_balance_link: Locator,
    /// Exact heading, for text verification.
    pub report_title: Locator,
    /// Any heading-like element mentioning the report, for load detection.
    pub report_heading: Locator,
    pub fund_select: Locator,
    pub view_report_button: Locator,
    pub export_button: Locator,
    pub report_container: Locator,
    pub data_rows: Locator,
    pub data_content: Locator,
}

impl<'a, D: PageDriver> TrialBalancePage<'a, D> {
    pub fn new(session: &'a Session<D>) -> Self {
        let candidates = ARROW_BUTTON_CANDIDATES
            .iter()
            .map(|xpath| Locator::new("arrow button", Selector::xpath(*xpath)).first())
            .collect();

        Self {
            session,
            menu: ReportMenu::default(),
            arrow_chain: FallbackChain::new(candidates, ARROW_CANDIDATE_TIMEOUT),
            trial_balance_link: Locator::new(
                "Trial Balance link",
                Selector::xpath("//span[normalize-space(text())='Trial Balance']"),
            ),
            report_title: Locator::new(
                "Trial Balance title",
                Selector::xpath(
                    "//h5[contains(@class,'mx-name-text2') and normalize-space(text())='Trial Balance']",
                ),
            ),
            report_heading: Locator::new(
                "Trial Balance heading",
                Selector::any(vec![
                    Selector::has_text("h5", REPORT_TITLE),
                    Selector::has_text(".mx-name-text2", REPORT_TITLE),
                    Selector::has_text("[class*=\"title\"]", REPORT_TITLE),
                ]),
            )
            .first(),
            fund_select: Locator::new(
                "Fund",
                Selector::xpath("//select[contains(@id,'referenceSelector1')]"),
            ),
            view_report_button: view_report_button(),
            export_button: export_button(),
            report_container: report_container(),
            data_rows: Locator::new("data rows", Selector::css(DATA_ROWS_CSS)),
            data_content: Locator::new(
                "report content",
                Selector::css(format!("{}, [class*=\"row\"]:not(:empty)", DATA_ROWS_CSS)),
            )
            .first(),
        }
    }

    /// Reports > Live Reports > Accounting. The arrow button is located with
    /// the fallback chain; a miss on every candidate aborts with
    /// `NavigationBlocked`.
    pub async fn navigate_to_report(&self) -> Result<()> {
        self.session
            .wait_for_load_state(LoadState::NetworkIdle, PAGE_SETTLE_TIMEOUT)
            .await?;

        self.arrow_chain.click_first(self.session).await?;

        self.session
            .click(&self.menu.live_reports_tab, MENU_STEP_TIMEOUT)
            .await?;
        self.session
            .click(&self.menu.accounting_section, MENU_STEP_TIMEOUT)
            .await?;
        self.session
            .wait_for_load_state(LoadState::NetworkIdle, MENU_STEP_TIMEOUT)
            .await?;

        info!("Navigation completed: Reports > Live Reports > Accounting");
        Ok(())
    }

    /// Opens the report from the Accounting branch and waits for its heading.
    pub async fn open_trial_balance(&self) -> Result<()> {
        self.session
            .click(&self.trial_balance_link, MENU_STEP_TIMEOUT)
            .await?;
        self.session
            .wait_for_load_state(LoadState::NetworkIdle, PAGE_SETTLE_TIMEOUT)
            .await?;
        self.session
            .wait_for(&self.report_heading, ElementState::Visible, PAGE_SETTLE_TIMEOUT)
            .await?;
        info!("Trial Balance report opened");
        Ok(())
    }

    pub async fn select_fund(&self, fund: &str) -> Result<()> {
        self.session
            .select_option(&self.fund_select, fund, MENU_STEP_TIMEOUT)
            .await?;
        self.session
            .wait_for_load_state(LoadState::NetworkIdle, MENU_STEP_TIMEOUT)
            .await?;
        info!("Fund selected: {}", fund);
        Ok(())
    }

    pub async fn click_view_report(&self) -> Result<()> {
        self.session
            .click(&self.view_report_button, self.session.default_timeout())
            .await?;
        info!("View Report button clicked");
        Ok(())
    }

    /// The Export button only appears once the report finished generating.
    pub async fn wait_for_export_button(&self) -> Result<()> {
        self.session
            .wait_for(
                &self.export_button,
                ElementState::Visible,
                self.session.config().export_timeout(),
            )
            .await?;
        info!("Export button appeared; report loaded");
        Ok(())
    }

    pub async fn export_report(&self) -> Result<Artifact> {
        self.wait_for_export_button().await?;
        let artifact = self
            .session
            .expect_download(&self.export_button, self.session.config().export_timeout())
            .await?;
        artifact.verify(&ArtifactFormat::EXCEL).await?;
        info!("Trial Balance exported to {}", artifact.path.display());
        Ok(artifact)
    }

    pub async fn data_row_count(&self) -> Result<usize> {
        self.session.count(&self.data_rows).await
    }

    /// Waits for the first row to render, then requires at least one data row.
    pub async fn verify_data_rows_loaded(&self) -> Result<usize> {
        self.session
            .wait_for(&self.data_content, ElementState::Visible, DATA_ROWS_TIMEOUT)
            .await?;
        let rows = self
            .session
            .expect_count_at_least(&self.data_rows, 1)
            .await?;
        info!("Trial Balance data loaded with {} rows", rows);
        Ok(rows)
    }

    pub async fn verify_report_title_visible(&self) -> Result<()> {
        self.session
            .expect_visible(&self.report_title, MENU_STEP_TIMEOUT)
            .await
    }

    pub async fn verify_report_title_text(&self) -> Result<()> {
        self.session
            .expect_text(&self.report_title, REPORT_TITLE, MENU_STEP_TIMEOUT)
            .await
    }

    pub async fn verify_view_report_button(&self) -> Result<()> {
        self.session
            .expect_visible(&self.view_report_button, FORM_CHECK_TIMEOUT)
            .await?;
        self.session
            .expect_enabled(&self.view_report_button, FORM_CHECK_TIMEOUT)
            .await
    }

    pub async fn verify_report_data_loaded(&self) -> Result<usize> {
        self.session
            .expect_count_at_least(&self.report_container, 1)
            .await
    }

    pub async fn current_url(&self) -> Result<String> {
        self.session.current_url().await
    }

    pub async fn verify_url(&self) -> Result<()> {
        super::verify_url(self.session).await
    }

    pub async fn take_screenshot(&self, name: &str) -> Option<PathBuf> {
        self.session.screenshot(name).await
    }

    pub async fn refresh_page(&self) -> Result<()> {
        super::refresh(self.session).await
    }

    pub async fn verify_page_not_broken(&self) -> Result<()> {
        super::verify_page_not_broken(self.session).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::Config;
    use crate::errors::E2eError;
    use crate::testing::FakeDriver;
    use std::sync::Arc;

    fn session_in(dir: &std::path::Path) -> Session<FakeDriver> {
        let mut config = Config::default();
        config.artifacts.screenshot_dir = dir.to_path_buf();
        Session::new(FakeDriver::new(), Arc::new(config))
    }

    #[tokio::test(start_paused = true)]
    async fn navigation_falls_back_to_a_later_arrow_candidate() {
        let dir = tempfile::tempdir().unwrap();
        let session = session_in(dir.path());
        let page = TrialBalancePage::new(&session);
        let driver = session.driver();
        let fourth = page.arrow_chain.candidates()[3].clone();
        driver.add_element(&fourth).reveals(&page.menu.live_reports_tab);
        driver
            .add_element(&page.menu.live_reports_tab)
            .hidden()
            .reveals(&page.menu.accounting_section);
        driver.add_element(&page.menu.accounting_section).hidden();

        page.navigate_to_report().await.unwrap();

        assert_eq!(
            driver.clicks(),
            vec![
                fourth.key(),
                page.menu.live_reports_tab.key(),
                page.menu.accounting_section.key(),
            ]
        );
        let queried = driver.queried_keys();
        for later in &page.arrow_chain.candidates()[4..] {
            assert!(!queried.contains(&later.key()));
        }
    }

    #[tokio::test(start_paused = true)]
    async fn navigation_is_blocked_when_no_arrow_exists() {
        let dir = tempfile::tempdir().unwrap();
        let session = session_in(dir.path());
        session.driver().set_url("https://aurum-test.alchelyst.com/login.html");
        let page = TrialBalancePage::new(&session);

        let err = page.navigate_to_report().await.unwrap_err();
        match err {
            E2eError::NavigationBlocked { url, candidates, .. } => {
                assert!(url.ends_with("login.html"));
                assert_eq!(candidates.len(), ARROW_BUTTON_CANDIDATES.len());
            }
            other => panic!("unexpected error: {other}"),
        }
        assert!(session.driver().clicks().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn open_report_then_count_rows() {
        let dir = tempfile::tempdir().unwrap();
        let session = session_in(dir.path());
        let page = TrialBalancePage::new(&session);
        let driver = session.driver();
        driver
            .add_element(&page.trial_balance_link)
            .reveals(&page.report_heading);
        driver.add_element(&page.report_heading).hidden();
        driver
            .add_element(&page.data_content)
            .appears_after(Duration::from_secs(4));
        driver
            .add_element(&page.data_rows)
            .matches(12)
            .appears_after(Duration::from_secs(4));

        page.open_trial_balance().await.unwrap();
        assert_eq!(page.verify_data_rows_loaded().await.unwrap(), 12);
        assert_eq!(page.data_row_count().await.unwrap(), 12);
    }

    #[tokio::test(start_paused = true)]
    async fn fund_is_chosen_by_label() {
        let dir = tempfile::tempdir().unwrap();
        let session = session_in(dir.path());
        let page = TrialBalancePage::new(&session);
        session
            .driver()
            .add_element(&page.fund_select)
            .options(&["-- Select --", "Steerhead Alternative Energy Fund"]);

        page.select_fund("Steerhead Alternative Energy Fund")
            .await
            .unwrap();
        assert_eq!(
            session.driver().value_of(&page.fund_select).as_deref(),
            Some("Steerhead Alternative Energy Fund")
        );
    }
}
