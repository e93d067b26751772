use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum E2eError {
    #[error("Element not found: {locator} (no match within {timeout:?})")]
    ElementNotFound { locator: String, timeout: Duration },

    #[error("Element not visible: {locator} (attached but not visible within {timeout:?})")]
    ElementNotVisible { locator: String, timeout: Duration },

    #[error(
        "Navigation blocked: none of {} candidates resolved (url: {url}, title: {title:?})",
        candidates.len()
    )]
    NavigationBlocked {
        url: String,
        title: String,
        candidates: Vec<String>,
    },

    #[error("Assertion failed on {subject}: expected {expected}, got {actual}")]
    AssertionFailed {
        subject: String,
        expected: String,
        actual: String,
    },

    #[error("Download did not complete within {timeout:?} in {dir}")]
    DownloadTimeout { dir: String, timeout: Duration },

    #[error("Load state {state} not reached within {timeout:?}")]
    LoadStateTimeout { state: String, timeout: Duration },

    #[error("Browser launch failed: {0}")]
    LaunchFailed(String),

    #[error("Navigation failed: {0}")]
    NavigationFailed(String),

    #[error("JavaScript execution failed: {0}")]
    JavaScriptFailed(String),

    #[error("Screenshot failed: {0}")]
    ScreenshotFailed(String),

    #[error("Invalid selector: {0}")]
    InvalidSelector(String),

    #[error("Configuration error: {0}")]
    ConfigurationError(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("URL error: {0}")]
    Url(#[from] url::ParseError),

    #[error("Chrome error: {0}")]
    Chrome(String),
}

pub type Result<T> = std::result::Result<T, E2eError>;

// headless_chrome reports everything through anyhow
impl From<anyhow::Error> for E2eError {
    fn from(err: anyhow::Error) -> Self {
        E2eError::Chrome(err.to_string())
    }
}

impl E2eError {
    pub fn assertion(
        subject: impl Into<String>,
        expected: impl std::fmt::Display,
        actual: impl std::fmt::Display,
    ) -> Self {
        E2eError::AssertionFailed {
            subject: subject.into(),
            expected: expected.to_string(),
            actual: actual.to_string(),
        }
    }

    /// True for failures caused by a wait running out of time.
    pub fn is_timeout(&self) -> bool {
        matches!(
            self,
            E2eError::ElementNotFound { .. }
                | E2eError::ElementNotVisible { .. }
                | E2eError::DownloadTimeout { .. }
                | E2eError::LoadStateTimeout { .. }
        )
    }
}
