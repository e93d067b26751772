use super::Evidence;
use crate::browser::Session;
use crate::core::{PageDriver, TestData};
use crate::errors::Result;
use crate::pages::TrialBalancePage;
use tracing::info;

async fn open_report<'a, D: PageDriver>(
    session: &'a Session<D>,
) -> Result<TrialBalancePage<'a, D>> {
    let page = TrialBalancePage::new(session);
    page.navigate_to_report().await?;
    page.open_trial_balance().await?;
    Ok(page)
}

/// Scenario 12.
pub async fn navigation<D: PageDriver>(session: &Session<D>) -> Result<Evidence> {
    TrialBalancePage::new(session).navigate_to_report().await?;
    Ok(Evidence::default().note("reached Accounting reports"))
}

/// Scenario 13.
pub async fn section_visibility<D: PageDriver>(session: &Session<D>) -> Result<Evidence> {
    let page = TrialBalancePage::new(session);
    page.navigate_to_report().await?;
    let shot = page.take_screenshot("trial-balance-section").await;
    info!("Trial Balance section visibility confirmed");
    Ok(Evidence::default().artifact(shot))
}

/// Scenario 14.
pub async fn data_loading<D: PageDriver>(session: &Session<D>) -> Result<Evidence> {
    let page = open_report(session).await?;
    let rows = page.verify_data_rows_loaded().await?;
    Ok(Evidence::default().note(format!("{} data rows", rows)))
}

/// Scenario 15.
pub async fn fund_selection<D: PageDriver>(
    session: &Session<D>,
    data: &TestData,
) -> Result<Evidence> {
    let page = open_report(session).await?;
    page.select_fund(&data.fund).await?;
    Ok(Evidence::default().note(format!("fund {}", data.fund)))
}

/// Scenario 16.
pub async fn end_to_end<D: PageDriver>(session: &Session<D>, data: &TestData) -> Result<Evidence> {
    let page = open_report(session).await?;
    page.select_fund(&data.fund).await?;
    page.click_view_report().await?;
    let artifact = page.export_report().await?;
    let rows = session.expect_count_at_least(&page.data_rows, 1).await?;
    info!("Trial Balance workflow completed with {} data rows", rows);
    Ok(Evidence::default()
        .note(format!("{} data rows", rows))
        .note(format!("exported {}", artifact.file_name))
        .artifact(Some(artifact.path)))
}
