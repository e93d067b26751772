use crate::browser::Session;
use crate::core::PageDriver;
use crate::errors::Result;
use crate::pages::{DashboardPage, LoginPage};
use serde::Serialize;
use tracing::info;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Bootstrap {
    /// The marker was already showing, from a restored snapshot or a live cookie.
    AlreadyAuthenticated,
    LoggedIn,
}

/// Brings a session to the authenticated dashboard.
///
/// Restores the saved snapshot when one exists, opens the portal and checks
/// for the "Report Centre" marker. Without it, logs in with the configured
/// credentials and waits for the marker, failing once the login timeout
/// runs out.
pub async fn bootstrap<D: PageDriver>(session: &Session<D>) -> Result<Bootstrap> {
    let config = session.config();
    if session
        .restore_auth_state(&config.artifacts.auth_state_path)
        .await?
    {
        info!("Restored saved authentication state");
    }

    let login = LoginPage::new(session);
    let dashboard = DashboardPage::new(session);

    login.goto().await?;
    if dashboard.is_authenticated(session.default_timeout()).await {
        info!("Already logged in");
        return Ok(Bootstrap::AlreadyAuthenticated);
    }

    info!("Logging in...");
    login.login(&config.credentials).await?;
    dashboard
        .wait_until_authenticated(config.login_timeout())
        .await?;
    info!("Login successful");
    Ok(Bootstrap::LoggedIn)
}

/// Logs in interactively and writes the snapshot later sessions restore.
pub async fn save_auth_state<D: PageDriver>(session: &Session<D>) -> Result<()> {
    let outcome = bootstrap(session).await?;
    let path = &session.config().artifacts.auth_state_path;
    let state = session.save_auth_state(path).await?;
    info!(
        "Auth state ({:?}, {} cookies) saved to {}",
        outcome,
        state.cookies.len(),
        path.display()
    );
    Ok(())
}
