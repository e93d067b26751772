use crate::browser::Session;
use crate::core::PageDriver;
use crate::dom::{Locator, Selector};
use crate::errors::Result;
use crate::types::FormValue;
use serde::Serialize;
use tracing::debug;

/// Fills named form controls. Fields with no matching control are skipped.
///
/// `<select>` receives the option label, checkboxes are checked or
/// unchecked, and everything else is typed into.
pub async fn fill_form<D: PageDriver>(
    session: &Session<D>,
    fields: &[(&str, FormValue)],
) -> Result<usize> {
    let timeout = session.default_timeout();
    let mut filled = 0;

    for (name, value) in fields {
        let control = field_locator(name);
        if session.count(&control).await? == 0 {
            debug!("No control named {:?}, skipping", name);
            continue;
        }

        let tag = session.tag_name(&control).await?.unwrap_or_default();
        let is_checkbox = tag == "input"
            && session.attribute(&control, "type").await?.as_deref() == Some("checkbox");

        match (tag.as_str(), value) {
            ("select", FormValue::Text(label)) => {
                session.select_option(&control, label, timeout).await?;
            }
            (_, FormValue::Checked(checked)) if is_checkbox => {
                session.set_checked(&control, *checked, timeout).await?;
            }
            (_, FormValue::Checked(checked)) => {
                session
                    .fill(&control, &checked.to_string(), timeout)
                    .await?;
            }
            (_, FormValue::Text(text)) => {
                session.fill(&control, text, timeout).await?;
            }
        }
        filled += 1;
    }
    Ok(filled)
}

pub fn field_locator(name: &str) -> Locator {
    Locator::new(
        format!("{} field", name),
        Selector::css(format!(
            "input[name=\"{0}\"], select[name=\"{0}\"], textarea[name=\"{0}\"]",
            name
        )),
    )
    .first()
}

#[derive(Debug, Clone, Serialize)]
pub struct GeneratedUser {
    pub email: String,
    pub username: String,
    pub password: String,
    pub first_name: String,
    pub last_name: String,
    pub phone: String,
}

/// Throwaway identity unique to the current millisecond.
pub fn generate_test_user() -> GeneratedUser {
    let stamp = chrono::Utc::now().timestamp_millis();
    GeneratedUser {
        email: format!("test{}@example.com", stamp),
        username: format!("testuser{}", stamp),
        password: "TestPassword123!".to_string(),
        first_name: "Test".to_string(),
        last_name: "User".to_string(),
        phone: "555-0123".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::Config;
    use crate::testing::{DriverCall, FakeDriver};
    use std::sync::Arc;

    #[tokio::test(start_paused = true)]
    async fn fills_each_control_by_kind() {
        let driver = FakeDriver::new();
        driver.add_element(&field_locator("username")).tag("input");
        driver
            .add_element(&field_locator("fund"))
            .options(&["Alpha Fund", "Steerhead Alternative Energy Fund"]);
        driver
            .add_element(&field_locator("remember"))
            .tag("input")
            .attribute("type", "checkbox");
        let session = Session::new(driver, Arc::new(Config::default()));

        let filled = fill_form(
            &session,
            &[
                ("username", FormValue::from("TestUser")),
                ("fund", FormValue::from("Steerhead Alternative Energy Fund")),
                ("remember", FormValue::from(true)),
                ("missing", FormValue::from("ignored")),
            ],
        )
        .await
        .unwrap();

        assert_eq!(filled, 3);
        let driver = session.driver();
        assert_eq!(
            driver.value_of(&field_locator("username")).as_deref(),
            Some("TestUser")
        );
        assert!(driver.is_checked(&field_locator("remember")));
        assert!(driver.calls().contains(&DriverCall::Select(
            field_locator("fund").key(),
            "Steerhead Alternative Energy Fund".to_string()
        )));
    }

    #[test]
    fn generated_users_share_one_stamp() {
        let user = generate_test_user();
        let stamp = user.username.trim_start_matches("testuser");
        assert!(!stamp.is_empty());
        assert_eq!(user.email, format!("test{}@example.com", stamp));
    }
}
