//! Page objects for the Live Reports portal.
//!
//! Each page object borrows a [`Session`] and owns nothing but its locators,
//! so it can never outlive the session it drives.

pub mod dashboard;
pub mod login;
pub mod nav_pack;
pub mod trial_balance;

pub use dashboard::DashboardPage;
pub use login::LoginPage;
pub use nav_pack::NavPackReportPage;
pub use trial_balance::TrialBalancePage;

use crate::browser::Session;
use crate::core::PageDriver;
use crate::dom::{Locator, Selector};
use crate::errors::Result;
use crate::types::{ElementState, LoadState};
use std::time::Duration;
use tracing::info;

/// Pause after committing a combobox choice. The widget applies the value
/// asynchronously and exposes no DOM signal for when it is done.
pub const COMBOBOX_SETTLE: Duration = Duration::from_secs(2);

/// Upper bound for a form control to render.
pub const FIELD_TIMEOUT: Duration = Duration::from_secs(30);

/// Upper bound for each step of a menu navigation.
pub const MENU_STEP_TIMEOUT: Duration = Duration::from_secs(10);

/// Upper bound for each visibility check on a freshly opened report form.
pub const FORM_CHECK_TIMEOUT: Duration = Duration::from_secs(5);

const ARROW_BUTTON_XPATH: &str = "(//img[@role='button' and contains(@src,'ClickArrow.svg')])[2]";

/// The Reports > Live Reports > Accounting path shared by every report.
#[derive(Debug, Clone)]
pub struct ReportMenu {
    pub arrow_button: Locator,
    pub live_reports_tab: Locator,
    pub accounting_section: Locator,
}

impl Default for ReportMenu {
    fn default() -> Self {
        Self {
            arrow_button: arrow_button(),
            live_reports_tab: Locator::new(
                "Live Reports tab",
                Selector::xpath("//a[@role='tab' and normalize-space(text())='Live Reports']"),
            ),
            accounting_section: Locator::new(
                "Accounting section",
                Selector::xpath(
                    "//span[contains(@class,'widget-tree-node-branch-header-clickable') and .//span[text()='Accounting']]",
                ),
            ),
        }
    }
}

pub fn arrow_button() -> Locator {
    Locator::new("arrow button", Selector::xpath(ARROW_BUTTON_XPATH))
}

pub fn view_report_button() -> Locator {
    Locator::new(
        "View Report button",
        Selector::xpath("//button[normalize-space()='View Report']"),
    )
}

pub fn export_button() -> Locator {
    Locator::new(
        "Export button",
        Selector::xpath("//button[normalize-space()='Export']"),
    )
}

pub fn report_container() -> Locator {
    Locator::new(
        "report container",
        Selector::css(".mx-dataview, [class*=\"report\"], table, form"),
    )
}

/// Any visible error marker a broken page would show.
pub fn error_marker() -> Locator {
    Locator::new(
        "error marker",
        Selector::any(vec![
            Selector::text("Error"),
            Selector::text("404"),
            Selector::text("500"),
        ]),
    )
}

pub fn page_body() -> Locator {
    Locator::new("page body", Selector::css("body"))
}

/// Opens a typeahead combobox, types `value` and commits it with Enter.
pub(crate) async fn select_combobox<D: PageDriver>(
    session: &Session<D>,
    combobox: &Locator,
    value: &str,
) -> Result<()> {
    session
        .wait_for(combobox, ElementState::Visible, FIELD_TIMEOUT)
        .await?;
    session.click(combobox, FIELD_TIMEOUT).await?;
    session.fill(combobox, value, FIELD_TIMEOUT).await?;
    session.press(combobox, "Enter", FIELD_TIMEOUT).await?;
    tokio::time::sleep(COMBOBOX_SETTLE).await;
    info!("{} selected: {}", combobox.name(), value);
    Ok(())
}

/// Reloads and waits for the network to go quiet and the body to render.
pub(crate) async fn refresh<D: PageDriver>(session: &Session<D>) -> Result<()> {
    let timeout = session.config().login_timeout();
    session.reload(LoadState::NetworkIdle, timeout).await?;
    session
        .wait_for(&page_body(), ElementState::Visible, timeout)
        .await?;
    info!("Page refreshed");
    Ok(())
}

pub(crate) async fn verify_page_not_broken<D: PageDriver>(session: &Session<D>) -> Result<()> {
    session
        .expect_visible(&page_body(), session.default_timeout())
        .await?;
    session.expect_absent(&error_marker()).await
}

pub(crate) async fn verify_url<D: PageDriver>(session: &Session<D>) -> Result<()> {
    let base = session.config().base_url.clone();
    session.expect_url_contains(base.trim_end_matches('/')).await
}
