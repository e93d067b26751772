use crate::browser::auth_state::AuthState;
use crate::dom::Locator;
use crate::errors::Result;
use crate::types::LoadSnapshot;
use async_trait::async_trait;
use std::path::Path;

/// The browser-automation runtime the suite drives.
///
/// Implementations answer single, immediate questions about the current
/// document and dispatch single actions. They never wait for an element to
/// show up; all waiting and timeout policy lives in
/// [`Session`](crate::browser::Session). Element operations resolve the
/// locator afresh on every call.
#[async_trait]
pub trait PageDriver: Send + Sync {
    /// Navigate to an absolute URL and wait for the navigation to commit.
    async fn goto(&self, url: &str) -> Result<()>;

    async fn reload(&self) -> Result<()>;

    async fn current_url(&self) -> Result<String>;

    async fn title(&self) -> Result<String>;

    async fn load_snapshot(&self) -> Result<LoadSnapshot>;

    /// Number of elements the locator currently matches.
    async fn count(&self, locator: &Locator) -> Result<usize>;

    async fn is_visible(&self, locator: &Locator) -> Result<bool>;

    async fn is_enabled(&self, locator: &Locator) -> Result<bool>;

    async fn text_content(&self, locator: &Locator) -> Result<Option<String>>;

    async fn attribute(&self, locator: &Locator, name: &str) -> Result<Option<String>>;

    async fn tag_name(&self, locator: &Locator) -> Result<Option<String>>;

    async fn click(&self, locator: &Locator) -> Result<()>;

    /// Replace the element's value by typing `text` into it.
    async fn fill(&self, locator: &Locator, text: &str) -> Result<()>;

    /// Focus the element and send a single named key, e.g. "Enter".
    async fn press(&self, locator: &Locator, key: &str) -> Result<()>;

    /// Choose the option with the given visible label; returns the label chosen.
    async fn select_option(&self, locator: &Locator, label: &str) -> Result<String>;

    async fn set_checked(&self, locator: &Locator, checked: bool) -> Result<()>;

    /// PNG bytes of the current viewport.
    async fn screenshot(&self) -> Result<Vec<u8>>;

    /// Direct browser downloads into `dir`.
    async fn set_download_dir(&self, dir: &Path) -> Result<()>;

    async fn export_auth_state(&self) -> Result<AuthState>;

    async fn import_auth_state(&self, state: &AuthState) -> Result<()>;

    async fn close(&self) -> Result<()>;
}
