use super::FIELD_TIMEOUT;
use crate::browser::Session;
use crate::core::{Credentials, PageDriver};
use crate::dom::{Locator, Selector};
use crate::errors::Result;
use crate::types::LoadState;
use tracing::info;

pub struct LoginPage<'a, D: PageDriver> {
    session: &'a Session<D>,
    pub username_field: Locator,
    pub password_field: Locator,
    pub login_button: Locator,
}

impl<'a, D: PageDriver> LoginPage<'a, D> {
    pub fn new(session: &'a Session<D>) -> Self {
        Self {
            session,
            username_field: Locator::new("username field", Selector::css("input[type=\"text\"]"))
                .first(),
            password_field: Locator::new(
                "password field",
                Selector::css("input[type=\"password\"]"),
            )
            .first(),
            login_button: Locator::new(
                "login button",
                Selector::any(vec![
                    Selector::css("button[type=\"submit\"]"),
                    Selector::css("input[type=\"submit\"]"),
                    Selector::has_text("button", "Login"),
                    Selector::has_text("button", "Sign In"),
                ]),
            )
            .first(),
        }
    }

    /// Opens the portal root and waits until the network is idle, so no field
    /// is touched while the login form is still being assembled.
    pub async fn goto(&self) -> Result<()> {
        self.session.goto("/").await?;
        self.session
            .wait_for_load_state(LoadState::NetworkIdle, self.session.config().login_timeout())
            .await?;
        info!("Navigated to login page");
        Ok(())
    }

    pub async fn fill_username(&self, username: &str) -> Result<()> {
        self.session
            .fill(&self.username_field, username, FIELD_TIMEOUT)
            .await?;
        info!("Filled username: {}", username);
        Ok(())
    }

    pub async fn fill_password(&self, password: &str) -> Result<()> {
        self.session
            .fill(&self.password_field, password, FIELD_TIMEOUT)
            .await?;
        info!("Filled password");
        Ok(())
    }

    pub async fn click_login(&self) -> Result<()> {
        self.session.click(&self.login_button, FIELD_TIMEOUT).await?;
        info!("Clicked login button");
        Ok(())
    }

    pub async fn login(&self, credentials: &Credentials) -> Result<()> {
        self.fill_username(&credentials.username).await?;
        self.fill_password(&credentials.password).await?;
        self.click_login().await?;
        self.session
            .wait_for_load_state(LoadState::NetworkIdle, self.session.default_timeout())
            .await?;
        info!("Login submitted for {}", credentials.username);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::Config;
    use crate::testing::{DriverCall, FakeDriver};
    use std::sync::Arc;
    use std::time::Duration;

    fn login_form(driver: &FakeDriver, page: &LoginPage<'_, FakeDriver>) {
        driver.add_element(&page.username_field).tag("input");
        driver.add_element(&page.password_field).tag("input");
        driver.add_element(&page.login_button).tag("button");
    }

    #[tokio::test(start_paused = true)]
    async fn goto_waits_for_idle_before_any_field_action() {
        let session = Session::new(FakeDriver::new(), Arc::new(Config::default()));
        let page = LoginPage::new(&session);
        login_form(session.driver(), &page);
        session.driver().set_loading_for(Duration::from_secs(3));

        page.goto().await.unwrap();
        page.login(&Credentials::valid()).await.unwrap();

        let calls = session.driver().calls();
        assert_eq!(
            calls,
            vec![
                DriverCall::Goto("https://aurum-test.alchelyst.com/".to_string()),
                DriverCall::Fill(page.username_field.key(), "TestUser".to_string()),
                DriverCall::Fill(page.password_field.key(), "Password@123".to_string()),
                DriverCall::Click(page.login_button.key()),
            ]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn missing_form_fails_instead_of_hanging() {
        let session = Session::new(FakeDriver::new(), Arc::new(Config::default()));
        let page = LoginPage::new(&session);

        let err = page.login(&Credentials::invalid()).await.unwrap_err();
        assert!(err.is_timeout());
    }
}
