use super::{Evidence, VIEW_BUTTON_TIMEOUT};
use crate::browser::Session;
use crate::core::{Credentials, PageDriver, TestData};
use crate::errors::{E2eError, Result};
use crate::pages::{DashboardPage, LoginPage, NavPackReportPage};
use crate::types::ElementState;
use tracing::info;

/// Scenario 17.
pub async fn refresh_stability<D: PageDriver>(session: &Session<D>) -> Result<Evidence> {
    let page = NavPackReportPage::new(session);
    page.navigate_to_report().await?;
    page.verify_report_title_visible().await?;
    let before = session.screenshot("before-refresh").await;

    page.refresh_page().await?;
    page.verify_page_not_broken().await?;
    let after = session.screenshot("after-refresh").await;

    info!("Page refresh keeps the report page intact");
    Ok(Evidence::default().artifact(before).artifact(after))
}

/// Scenario 18.
pub async fn excel_export_integrity<D: PageDriver>(
    session: &Session<D>,
    data: &TestData,
) -> Result<Evidence> {
    let page = NavPackReportPage::new(session);
    page.navigate_to_report().await?;
    page.fill_form(data).await?;

    session
        .wait_for(&page.view_report_button, ElementState::Visible, VIEW_BUTTON_TIMEOUT)
        .await?;
    page.click_view_report().await?;
    page.wait_for_report_rendered().await?;

    let artifact = page.export_report().await?;
    info!("Export summary:");
    info!("  File: {}", artifact.file_name);
    info!("  Size: {:.2} KB", artifact.size_kb());
    info!("  Format: {}", artifact.format);
    info!("  Path: {}", artifact.path.display());

    Ok(Evidence::default()
        .note(format!(
            "{} ({:.2} KB, {})",
            artifact.file_name,
            artifact.size_kb(),
            artifact.format
        ))
        .artifact(Some(artifact.path)))
}

/// Wrong credentials must leave the session outside the dashboard.
pub async fn invalid_login<D: PageDriver>(session: &Session<D>) -> Result<Evidence> {
    let login = LoginPage::new(session);
    let dashboard = DashboardPage::new(session);

    login.goto().await?;
    login.login(&Credentials::invalid()).await?;

    if dashboard
        .is_authenticated(session.config().login_timeout())
        .await
    {
        return Err(E2eError::assertion(
            "login with invalid credentials",
            "no Report Centre marker",
            "marker visible",
        ));
    }
    info!("Invalid credentials were rejected");
    Ok(Evidence::default().note("authenticated marker never appeared"))
}
