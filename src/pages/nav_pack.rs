use super::{
    export_button, report_container, select_combobox, view_report_button, ReportMenu,
    COMBOBOX_SETTLE, FIELD_TIMEOUT, FORM_CHECK_TIMEOUT, MENU_STEP_TIMEOUT,
};
use crate::browser::{follow_menu, Artifact, ArtifactFormat, Session};
use crate::core::{PageDriver, TestData};
use crate::dom::{Locator, Selector};
use crate::errors::{E2eError, Result};
use crate::types::{ElementState, LoadState};
use std::path::PathBuf;
use tracing::info;

pub const REPORT_TITLE: &str = "NAV Pack Report";

/// Form label next to a control, matched either on the label or its wrapper.
fn form_field(name: &str, label: &str, wrapper_text: &str) -> Locator {
    Locator::new(
        name,
        Selector::any(vec![
            Selector::has_text("label", label),
            Selector::has_text("div", wrapper_text),
        ]),
    )
    .first()
}

fn combobox(name: &str, id_fragment: &str) -> Locator {
    Locator::new(
        name,
        Selector::xpath(format!(
            "//input[contains(@id, '{}') and @role='combobox']",
            id_fragment
        )),
    )
}

pub struct NavPackReportPage<'a, D: PageDriver> {
    session: &'a Session<D>,
    pub menu: ReportMenu,
    pub nav_pack_report_link: Locator,
    pub report_title: Locator,

    pub client_field: Locator,
    pub date_mode_field: Locator,
    pub as_at_date_field: Locator,
    pub gl_profile_code_field: Locator,
    pub gl_profile_value: Locator,
    pub effective_start_date_field: Locator,
    pub effective_end_date_field: Locator,

    pub client_combobox: Locator,
    pub fund_combobox: Locator,
    pub date_mode_select: Locator,
    pub diary_start_combobox: Locator,
    pub diary_end_combobox: Locator,

    pub view_report_button: Locator,
    pub export_button: Locator,
    pub report_container: Locator,
    /// Section heading that only appears once the generated report renders.
    pub rendered_report_marker: Locator,
    pub balance_figure: Locator,
}

impl<'a, D: PageDriver> NavPackReportPage<'a, D> {
    pub fn new(session: &'a Session<D>) -> Self {
        Self {
            session,
            menu: ReportMenu::default(),
            nav_pack_report_link: Locator::new(
                "NAV Pack Report link",
                Selector::xpath("//span[text()='NAV Pack Report']"),
            ),
            report_title: Locator::new(
                "NAV Pack Report title",
                Selector::xpath(
                    "//h5[contains(@class,'mx-name-text2') and normalize-space(text())='NAV Pack Report']",
                ),
            ),

            client_field: form_field("Client field", "Client", "Client"),
            date_mode_field: form_field("Date Mode field", "Date Mode", "Date Mode"),
            as_at_date_field: form_field("As at Date field", "As at Date", "As at Date"),
            gl_profile_code_field: form_field(
                "GL Profile Code field",
                "GL Profile Code",
                "GL Profile Code",
            ),
            gl_profile_value: Locator::new(
                "GL profile value",
                Selector::text("AlchelystGLStrategy"),
            )
            .first(),
            effective_start_date_field: form_field(
                "Effective Start Date field",
                "Effective Start Date",
                "Effective Start",
            ),
            effective_end_date_field: form_field(
                "Effective End Date field",
                "Effective End Date",
                "Effective End",
            ),

            client_combobox: combobox("Client", "comboBox3"),
            fund_combobox: combobox("Fund", "comboBox4"),
            date_mode_select: Locator::new("Date Mode", Selector::label("Date Mode")).first(),
            diary_start_combobox: combobox("Start Date", "comboBox1"),
            diary_end_combobox: Locator::new("End Date", Selector::role("combobox", "Diary End")),

            view_report_button: view_report_button(),
            export_button: export_button(),
            report_container: report_container(),
            rendered_report_marker: Locator::new(
                "rendered report",
                Selector::text("Trial Balance"),
            )
            .first(),
            balance_figure: Locator::new(
                "balance figure",
                Selector::TextPattern(r"[0-9,]+\.[0-9]{2}".to_string()),
            )
            .first(),
        }
    }

    /// Arrow > Live Reports > Accounting > NAV Pack Report, each step gated on
    /// its target becoming visible.
    pub async fn navigate_to_report(&self) -> Result<()> {
        follow_menu(
            self.session,
            &[
                &self.menu.arrow_button,
                &self.menu.live_reports_tab,
                &self.menu.accounting_section,
                &self.nav_pack_report_link,
            ],
            MENU_STEP_TIMEOUT,
        )
        .await?;
        self.session
            .wait_for_load_state(LoadState::NetworkIdle, MENU_STEP_TIMEOUT)
            .await?;
        info!("Navigation completed: Reports > Live Reports > Accounting > NAV Pack Report");
        Ok(())
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

    pub async fn verify_all_fields_visible(&self) -> Result<()> {
        for field in [
            &self.client_field,
            &self.date_mode_field,
            &self.as_at_date_field,
            &self.gl_profile_code_field,
            &self.effective_start_date_field,
            &self.effective_end_date_field,
        ] {
            self.session.expect_visible(field, FORM_CHECK_TIMEOUT).await?;
        }
        info!("All NAV Pack form fields are visible");
        Ok(())
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

    pub async fn click_view_report(&self) -> Result<()> {
        self.session
            .click(&self.view_report_button, self.session.default_timeout())
            .await?;
        info!("Clicked View Report");
        Ok(())
    }

    pub async fn select_client(&self, client: &str) -> Result<()> {
        select_combobox(self.session, &self.client_combobox, client).await
    }

    pub async fn select_fund(&self, fund: &str) -> Result<()> {
        select_combobox(self.session, &self.fund_combobox, fund).await
    }

    /// Native select, matched on the option label.
    pub async fn select_date_mode(&self, mode: &str) -> Result<()> {
        self.session
            .click(&self.date_mode_select, FIELD_TIMEOUT)
            .await?;
        self.session
            .select_option(&self.date_mode_select, mode, FIELD_TIMEOUT)
            .await?;
        tokio::time::sleep(COMBOBOX_SETTLE).await;
        info!("Date mode selected: {}", mode);
        Ok(())
    }

    pub async fn enter_start_date(&self, date: &str) -> Result<()> {
        select_combobox(self.session, &self.diary_start_combobox, date).await
    }

    pub async fn enter_end_date(&self, date: &str) -> Result<()> {
        select_combobox(self.session, &self.diary_end_combobox, date).await
    }

    pub async fn fill_form(&self, data: &TestData) -> Result<()> {
        self.select_client(&data.client).await?;
        self.select_fund(&data.fund).await?;
        self.select_date_mode(&data.date_mode).await?;
        self.enter_start_date(&data.start_date).await?;
        self.enter_end_date(&data.end_date).await?;
        info!("NAV Pack form filled for {}", data.client);
        Ok(())
    }

    /// Clicks View Report and waits for the report engine to go quiet.
    pub async fn view_report(&self) -> Result<()> {
        let report_timeout = self.session.config().report_timeout();
        self.session
            .click(&self.view_report_button, report_timeout)
            .await?;
        self.session
            .wait_for_load_state(LoadState::NetworkIdle, report_timeout)
            .await?;
        info!("Report generated");
        Ok(())
    }

    pub async fn wait_for_report_rendered(&self) -> Result<()> {
        self.session
            .wait_for(
                &self.rendered_report_marker,
                ElementState::Visible,
                self.session.config().report_timeout(),
            )
            .await?;
        info!("Report table loaded");
        Ok(())
    }

    pub async fn verify_client_data(&self, client: &str) -> Result<()> {
        let client_text = Locator::new("client data", Selector::text(client)).first();
        self.session
            .expect_visible(&client_text, self.session.default_timeout())
            .await?;
        info!("Client data validation passed");
        Ok(())
    }

    /// Checks a `1,234.56`-style figure is shown, if any is present at all.
    /// Returns whether one was found.
    pub async fn verify_balance_data(&self) -> Result<bool> {
        if self.session.count(&self.balance_figure).await? == 0 {
            info!("No balance figure found; report layout may differ");
            return Ok(false);
        }
        self.session
            .expect_visible(&self.balance_figure, MENU_STEP_TIMEOUT)
            .await?;
        info!("Balance data validation passed");
        Ok(true)
    }

    /// Waits for Export, clicks it and returns the verified Excel download.
    pub async fn export_report(&self) -> Result<Artifact> {
        self.session
            .wait_for(
                &self.export_button,
                ElementState::Visible,
                self.session.config().export_timeout(),
            )
            .await?;
        let artifact = self
            .session
            .expect_download(&self.export_button, self.session.config().export_timeout())
            .await?;
        artifact.verify(&ArtifactFormat::EXCEL).await?;
        info!("Report exported to {}", artifact.path.display());
        Ok(artifact)
    }

    pub async fn view_and_export_report(&self) -> Result<Artifact> {
        self.view_report().await?;
        self.export_report().await
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

    /// The fourth form control carries the GL profile and must be read-only.
    pub async fn verify_gl_profile_disabled(&self) -> Result<()> {
        let gl_input = Locator::new("GL profile input", Selector::css("input, select")).nth(3);
        let disabled = !self.session.is_enabled(&gl_input).await.unwrap_or(true);
        let read_only = self
            .session
            .attribute(&gl_input, "readonly")
            .await
            .ok()
            .flatten()
            .is_some();
        if disabled || read_only {
            Ok(())
        } else {
            Err(E2eError::assertion(
                gl_input.to_string(),
                "disabled or read-only",
                "editable",
            ))
        }
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
    use crate::testing::{DriverCall, FakeDriver};
    use std::sync::Arc;

    fn session() -> Session<FakeDriver> {
        Session::new(FakeDriver::new(), Arc::new(Config::default()))
    }

    #[tokio::test(start_paused = true)]
    async fn navigation_clicks_each_menu_level_in_order() {
        let session = session();
        let page = NavPackReportPage::new(&session);
        let driver = session.driver();
        driver.add_element(&page.menu.arrow_button).reveals(&page.menu.live_reports_tab);
        driver
            .add_element(&page.menu.live_reports_tab)
            .hidden()
            .reveals(&page.menu.accounting_section);
        driver
            .add_element(&page.menu.accounting_section)
            .hidden()
            .reveals(&page.nav_pack_report_link);
        driver.add_element(&page.nav_pack_report_link).hidden();

        page.navigate_to_report().await.unwrap();

        assert_eq!(
            driver.clicks(),
            vec![
                page.menu.arrow_button.key(),
                page.menu.live_reports_tab.key(),
                page.menu.accounting_section.key(),
                page.nav_pack_report_link.key(),
            ]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn hidden_menu_step_stops_navigation() {
        let session = session();
        let page = NavPackReportPage::new(&session);
        session.driver().add_element(&page.menu.arrow_button);
        session.driver().add_element(&page.menu.live_reports_tab).hidden();

        let err = page.navigate_to_report().await.unwrap_err();
        assert!(matches!(err, E2eError::ElementNotVisible { .. }));
        assert_eq!(session.driver().clicks().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn title_text_mismatch_reports_expected_and_actual() {
        let session = session();
        let page = NavPackReportPage::new(&session);
        session.driver().add_element(&page.report_title).text("NAV Pack Report ");
        page.verify_report_title_visible().await.unwrap();
        page.verify_report_title_text().await.unwrap();

        session.driver().element(&page.report_title).text("Trial Balance");
        let err = page.verify_report_title_text().await.unwrap_err();
        let message = err.to_string();
        assert!(message.contains("NAV Pack Report"));
        assert!(message.contains("Trial Balance"));
    }

    #[tokio::test(start_paused = true)]
    async fn fill_form_drives_every_control() {
        let session = session();
        let page = NavPackReportPage::new(&session);
        let driver = session.driver();
        for combobox in [
            &page.client_combobox,
            &page.fund_combobox,
            &page.diary_start_combobox,
            &page.diary_end_combobox,
        ] {
            driver.add_element(combobox).tag("input");
        }
        driver
            .add_element(&page.date_mode_select)
            .options(&["AccountingDate", "TradeDate"]);

        page.fill_form(&TestData::default()).await.unwrap();

        assert_eq!(
            driver.fills(),
            vec![
                (page.client_combobox.key(), "STEERHEAD".to_string()),
                (
                    page.fund_combobox.key(),
                    "Steerhead Alternative Energy Fund".to_string()
                ),
                (page.diary_start_combobox.key(), "30APR2025".to_string()),
                (page.diary_end_combobox.key(), "30APR2025".to_string()),
            ]
        );
        assert!(driver.calls().contains(&DriverCall::Select(
            page.date_mode_select.key(),
            "AccountingDate".to_string()
        )));
    }

    #[tokio::test(start_paused = true)]
    async fn gl_profile_must_not_be_editable() {
        let session = session();
        let page = NavPackReportPage::new(&session);
        let gl_input = Locator::new("GL profile input", Selector::css("input, select"));
        session.driver().add_element(&gl_input).matches(5);
        assert!(page.verify_gl_profile_disabled().await.is_err());

        session.driver().element(&gl_input).attribute("readonly", "");
        page.verify_gl_profile_disabled().await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn balance_data_is_optional() {
        let session = session();
        let page = NavPackReportPage::new(&session);
        assert!(!page.verify_balance_data().await.unwrap());

        session.driver().add_element(&page.balance_figure);
        assert!(page.verify_balance_data().await.unwrap());
    }

    #[tokio::test]
    async fn export_returns_a_verified_excel_file() {
        let downloads = tempfile::tempdir().unwrap();
        let mut config = Config::default();
        config.artifacts.download_dir = downloads.path().to_path_buf();
        config.export_timeout_ms = 5_000;
        let session = Session::new(FakeDriver::new(), Arc::new(config));
        let page = NavPackReportPage::new(&session);
        session
            .driver()
            .add_element(&page.export_button)
            .downloads("NAV_Pack_STEERHEAD.xlsx", &[0x50, 0x4B, 0x03, 0x04]);

        let artifact = page.export_report().await.unwrap();
        assert_eq!(artifact.file_name, "NAV_Pack_STEERHEAD.xlsx");
        assert_eq!(artifact.size_bytes, 4);
        assert!(session
            .driver()
            .calls()
            .contains(&DriverCall::SetDownloadDir(downloads.path().to_path_buf())));
    }
}
