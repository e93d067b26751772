use crate::browser::Session;
use crate::core::PageDriver;
use crate::dom::{Locator, Selector};
use crate::errors::Result;
use crate::types::ElementState;
use std::time::Duration;
use tracing::info;

pub struct DashboardPage<'a, D: PageDriver> {
    session: &'a Session<D>,
    /// Only rendered for an authenticated user.
    pub report_centre_link: Locator,
    pub arrow_button: Locator,
}

impl<'a, D: PageDriver> DashboardPage<'a, D> {
    pub fn new(session: &'a Session<D>) -> Self {
        Self {
            session,
            report_centre_link: report_centre_marker(),
            arrow_button: super::arrow_button(),
        }
    }

    pub async fn click_report_centre(&self) -> Result<()> {
        self.session
            .click(&self.report_centre_link, self.session.default_timeout())
            .await?;
        info!("Clicked on Report Centre");
        Ok(())
    }

    pub async fn click_arrow(&self) -> Result<()> {
        self.session
            .click(&self.arrow_button, self.session.default_timeout())
            .await?;
        info!("Clicked on arrow button");
        Ok(())
    }

    pub async fn verify_report_centre_visible(&self) -> Result<()> {
        self.session
            .expect_visible(&self.report_centre_link, self.session.default_timeout())
            .await?;
        info!("Report Centre is visible");
        Ok(())
    }

    pub async fn verify_arrow_button_visible(&self) -> Result<()> {
        self.session
            .expect_visible(&self.arrow_button, self.session.default_timeout())
            .await?;
        info!("Arrow button is visible");
        Ok(())
    }

    pub async fn is_authenticated(&self, timeout: Duration) -> bool {
        self.session
            .is_visible_within(&self.report_centre_link, timeout)
            .await
    }

    pub async fn wait_until_authenticated(&self, timeout: Duration) -> Result<()> {
        self.session
            .wait_for(&self.report_centre_link, ElementState::Visible, timeout)
            .await
    }
}

pub fn report_centre_marker() -> Locator {
    Locator::new("Report Centre link", Selector::text("Report Centre"))
}
