//! Scripted in-memory [`PageDriver`] for exercising sessions, page objects
//! and scenarios without a browser.
//!
//! Elements are keyed by their selector text, so two locators built from the
//! same selector see the same fake element whatever name or pick they carry.

use crate::browser::auth_state::{AuthState, CookieData};
use crate::core::PageDriver;
use crate::dom::{Locator, Pick};
use crate::errors::{E2eError, Result};
use crate::types::LoadSnapshot;
use async_trait::async_trait;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::time::Instant;

/// PNG signature followed by a few filler bytes.
pub const FAKE_PNG: [u8; 12] = [0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A, 0, 0, 0, 0];

/// Side-effecting calls, in the order the driver received them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DriverCall {
    Goto(String),
    Reload,
    Click(String),
    Fill(String, String),
    Press(String, String),
    Select(String, String),
    SetChecked(String, bool),
    Screenshot,
    SetDownloadDir(PathBuf),
    ExportAuthState,
    ImportAuthState,
    Close,
}

#[derive(Debug, Clone)]
struct FakeElement {
    tag: String,
    matches: usize,
    visible: bool,
    enabled: bool,
    appears_at: Option<Instant>,
    text: Option<String>,
    attributes: HashMap<String, String>,
    options: Vec<String>,
    value: String,
    checked: bool,
    reveals: Vec<String>,
    hides: Vec<String>,
    navigates_to: Option<String>,
    download: Option<(String, Vec<u8>)>,
}

impl Default for FakeElement {
    fn default() -> Self {
        Self {
            tag: "div".to_string(),
            matches: 1,
            visible: true,
            enabled: true,
            appears_at: None,
            text: None,
            attributes: HashMap::new(),
            options: Vec::new(),
            value: String::new(),
            checked: false,
            reveals: Vec::new(),
            hides: Vec::new(),
            navigates_to: None,
            download: None,
        }
    }
}

impl FakeElement {
    fn attached(&self, now: Instant) -> bool {
        self.appears_at.map_or(true, |at| now >= at)
    }

    fn matched(&self, pick: Pick, now: Instant) -> usize {
        if !self.attached(now) {
            return 0;
        }
        match pick {
            Pick::All => self.matches,
            Pick::First | Pick::Last => self.matches.min(1),
            Pick::Nth(index) => usize::from(index < self.matches),
        }
    }
}

#[derive(Debug)]
struct FakeState {
    url: String,
    title: String,
    elements: HashMap<String, FakeElement>,
    calls: Vec<DriverCall>,
    queried: Vec<String>,
    loading_until: Option<Instant>,
    load_finished: bool,
    resources: u64,
    download_dir: Option<PathBuf>,
    cookies: Vec<CookieData>,
    fail_screenshots: bool,
}

/// Clones share one page, so a test can keep a handle after a session takes
/// ownership of the driver.
#[derive(Debug, Clone)]
pub struct FakeDriver {
    state: Arc<Mutex<FakeState>>,
}

impl Default for FakeDriver {
    fn default() -> Self {
        Self::new()
    }
}

impl FakeDriver {
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(FakeState {
                url: "about:blank".to_string(),
                title: String::new(),
                elements: HashMap::new(),
                calls: Vec::new(),
                queried: Vec::new(),
                loading_until: None,
                load_finished: true,
                resources: 0,
                download_dir: None,
                cookies: Vec::new(),
                fail_screenshots: false,
            })),
        }
    }

    fn state(&self) -> MutexGuard<'_, FakeState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Adds (or replaces) a visible, enabled element for `locator`.
    pub fn add_element(&self, locator: &Locator) -> FakeElementBuilder<'_> {
        self.state()
            .elements
            .insert(locator.key(), FakeElement::default());
        self.element(locator)
    }

    /// Reconfigures an element, creating it if needed.
    pub fn element(&self, locator: &Locator) -> FakeElementBuilder<'_> {
        let key = locator.key();
        self.state().elements.entry(key.clone()).or_default();
        FakeElementBuilder { driver: self, key }
    }

    pub fn set_url(&self, url: &str) {
        self.state().url = url.to_string();
    }

    pub fn set_title(&self, title: &str) {
        self.state().title = title.to_string();
    }

    /// Keeps the document in the "loading" state for `duration` from now.
    pub fn set_loading_for(&self, duration: Duration) {
        let mut state = self.state();
        state.loading_until = Some(Instant::now() + duration);
        state.load_finished = false;
    }

    pub fn fail_screenshots(&self) {
        self.state().fail_screenshots = true;
    }

    pub fn add_cookie(&self, name: &str, value: &str) {
        let mut state = self.state();
        let domain = url::Url::parse(&state.url)
            .ok()
            .and_then(|u| u.host_str().map(str::to_string))
            .unwrap_or_default();
        state.cookies.push(CookieData::new(name, value, domain));
    }

    pub fn cookies(&self) -> Vec<CookieData> {
        self.state().cookies.clone()
    }

    pub fn calls(&self) -> Vec<DriverCall> {
        self.state().calls.clone()
    }

    pub fn clicks(&self) -> Vec<String> {
        self.state()
            .calls
            .iter()
            .filter_map(|call| match call {
                DriverCall::Click(key) => Some(key.clone()),
                _ => None,
            })
            .collect()
    }

    pub fn fills(&self) -> Vec<(String, String)> {
        self.state()
            .calls
            .iter()
            .filter_map(|call| match call {
                DriverCall::Fill(key, value) => Some((key.clone(), value.clone())),
                _ => None,
            })
            .collect()
    }

    /// Selector keys queried by visibility or count checks, in order.
    pub fn queried_keys(&self) -> Vec<String> {
        self.state().queried.clone()
    }

    pub fn value_of(&self, locator: &Locator) -> Option<String> {
        self.state()
            .elements
            .get(&locator.key())
            .map(|e| e.value.clone())
    }

    pub fn is_checked(&self, locator: &Locator) -> bool {
        self.state()
            .elements
            .get(&locator.key())
            .map_or(false, |e| e.checked)
    }

    fn missing(locator: &Locator) -> E2eError {
        E2eError::JavaScriptFailed(format!("no element for {}", locator))
    }

    /// Runs `f` against the element if the locator currently matches it.
    fn with_matched<T>(
        &self,
        locator: &Locator,
        f: impl FnOnce(&mut FakeElement) -> T,
    ) -> Option<T> {
        let now = Instant::now();
        let mut state = self.state();
        let element = state.elements.get_mut(&locator.key())?;
        if element.matched(locator.pick(), now) == 0 {
            return None;
        }
        Some(f(element))
    }
}

/// Chained configuration for one fake element.
pub struct FakeElementBuilder<'a> {
    driver: &'a FakeDriver,
    key: String,
}

impl FakeElementBuilder<'_> {
    fn update(self, f: impl FnOnce(&mut FakeElement)) -> Self {
        if let Some(element) = self.driver.state().elements.get_mut(&self.key) {
            f(element);
        }
        self
    }

    pub fn hidden(self) -> Self {
        self.update(|e| e.visible = false)
    }

    pub fn visible(self) -> Self {
        self.update(|e| e.visible = true)
    }

    pub fn disabled(self) -> Self {
        self.update(|e| e.enabled = false)
    }

    pub fn enabled(self) -> Self {
        self.update(|e| e.enabled = true)
    }

    pub fn appears_after(self, delay: Duration) -> Self {
        let at = Instant::now() + delay;
        self.update(|e| e.appears_at = Some(at))
    }

    pub fn text(self, text: &str) -> Self {
        let text = text.to_string();
        self.update(|e| e.text = Some(text))
    }

    pub fn tag(self, tag: &str) -> Self {
        let tag = tag.to_string();
        self.update(|e| e.tag = tag)
    }

    pub fn attribute(self, name: &str, value: &str) -> Self {
        let (name, value) = (name.to_string(), value.to_string());
        self.update(|e| {
            e.attributes.insert(name, value);
        })
    }

    pub fn matches(self, count: usize) -> Self {
        self.update(|e| e.matches = count)
    }

    pub fn options(self, labels: &[&str]) -> Self {
        let labels: Vec<String> = labels.iter().map(|l| l.to_string()).collect();
        self.update(|e| {
            e.tag = "select".to_string();
            e.options = labels;
        })
    }

    /// Clicking this element makes `target` visible.
    pub fn reveals(self, target: &Locator) -> Self {
        let key = target.key();
        self.update(|e| e.reveals.push(key))
    }

    pub fn hides(self, target: &Locator) -> Self {
        let key = target.key();
        self.update(|e| e.hides.push(key))
    }

    /// Clicking this element changes the current URL.
    pub fn navigates_to(self, url: &str) -> Self {
        let url = url.to_string();
        self.update(|e| e.navigates_to = Some(url))
    }

    /// Clicking this element writes `file_name` into the download directory.
    pub fn downloads(self, file_name: &str, bytes: &[u8]) -> Self {
        let download = (file_name.to_string(), bytes.to_vec());
        self.update(|e| e.download = Some(download))
    }
}

#[async_trait]
impl PageDriver for FakeDriver {
    async fn goto(&self, url: &str) -> Result<()> {
        let mut state = self.state();
        state.calls.push(DriverCall::Goto(url.to_string()));
        state.url = url.to_string();
        Ok(())
    }

    async fn reload(&self) -> Result<()> {
        self.state().calls.push(DriverCall::Reload);
        Ok(())
    }

    async fn current_url(&self) -> Result<String> {
        Ok(self.state().url.clone())
    }

    async fn title(&self) -> Result<String> {
        Ok(self.state().title.clone())
    }

    async fn load_snapshot(&self) -> Result<LoadSnapshot> {
        let now = Instant::now();
        let mut state = self.state();
        if state.loading_until.map_or(false, |until| now < until) {
            state.resources += 1;
            return Ok(LoadSnapshot::new("loading", state.resources));
        }
        if !state.load_finished {
            state.load_finished = true;
            state.resources += 1;
        }
        Ok(LoadSnapshot::new("complete", state.resources))
    }

    async fn count(&self, locator: &Locator) -> Result<usize> {
        let now = Instant::now();
        let mut state = self.state();
        state.queried.push(locator.key());
        Ok(state
            .elements
            .get(&locator.key())
            .map_or(0, |e| e.matched(locator.pick(), now)))
    }

    async fn is_visible(&self, locator: &Locator) -> Result<bool> {
        let now = Instant::now();
        let mut state = self.state();
        state.queried.push(locator.key());
        Ok(state
            .elements
            .get(&locator.key())
            .map_or(false, |e| e.visible && e.matched(locator.pick(), now) > 0))
    }

    async fn is_enabled(&self, locator: &Locator) -> Result<bool> {
        Ok(self.with_matched(locator, |e| e.enabled).unwrap_or(false))
    }

    async fn text_content(&self, locator: &Locator) -> Result<Option<String>> {
        Ok(self
            .with_matched(locator, |e| e.text.clone().unwrap_or_default()))
    }

    async fn attribute(&self, locator: &Locator, name: &str) -> Result<Option<String>> {
        Ok(self
            .with_matched(locator, |e| e.attributes.get(name).cloned())
            .flatten())
    }

    async fn tag_name(&self, locator: &Locator) -> Result<Option<String>> {
        Ok(self.with_matched(locator, |e| e.tag.clone()))
    }

    async fn click(&self, locator: &Locator) -> Result<()> {
        let effects = self
            .with_matched(locator, |e| {
                (
                    e.reveals.clone(),
                    e.hides.clone(),
                    e.navigates_to.clone(),
                    e.download.clone(),
                )
            })
            .ok_or_else(|| Self::missing(locator))?;
        let (reveals, hides, navigates_to, download) = effects;

        let download_target = {
            let mut state = self.state();
            state.calls.push(DriverCall::Click(locator.key()));
            for key in reveals {
                let element = state.elements.entry(key).or_default();
                element.visible = true;
                element.appears_at = None;
            }
            for key in hides {
                if let Some(element) = state.elements.get_mut(&key) {
                    element.visible = false;
                }
            }
            if let Some(url) = navigates_to {
                state.url = url;
            }
            download.and_then(|(name, bytes)| {
                state
                    .download_dir
                    .as_ref()
                    .map(|dir| (dir.join(name), bytes))
            })
        };

        if let Some((path, bytes)) = download_target {
            tokio::fs::write(path, bytes).await?;
        }
        Ok(())
    }

    async fn fill(&self, locator: &Locator, text: &str) -> Result<()> {
        let value = text.to_string();
        self.with_matched(locator, |e| e.value = value)
            .ok_or_else(|| Self::missing(locator))?;
        self.state()
            .calls
            .push(DriverCall::Fill(locator.key(), text.to_string()));
        Ok(())
    }

    async fn press(&self, locator: &Locator, key: &str) -> Result<()> {
        self.with_matched(locator, |_| ())
            .ok_or_else(|| Self::missing(locator))?;
        self.state()
            .calls
            .push(DriverCall::Press(locator.key(), key.to_string()));
        Ok(())
    }

    async fn select_option(&self, locator: &Locator, label: &str) -> Result<String> {
        let chosen = self
            .with_matched(locator, |e| {
                let found = e
                    .options
                    .iter()
                    .find(|o| o.as_str() == label)
                    .or_else(|| e.options.iter().find(|o| o.contains(label)))
                    .cloned();
                if let Some(option) = &found {
                    e.value = option.clone();
                }
                found
            })
            .ok_or_else(|| Self::missing(locator))?
            .ok_or_else(|| {
                E2eError::JavaScriptFailed(format!("no option {:?} in {}", label, locator))
            })?;
        self.state()
            .calls
            .push(DriverCall::Select(locator.key(), chosen.clone()));
        Ok(chosen)
    }

    async fn set_checked(&self, locator: &Locator, checked: bool) -> Result<()> {
        self.with_matched(locator, |e| e.checked = checked)
            .ok_or_else(|| Self::missing(locator))?;
        self.state()
            .calls
            .push(DriverCall::SetChecked(locator.key(), checked));
        Ok(())
    }

    async fn screenshot(&self) -> Result<Vec<u8>> {
        let mut state = self.state();
        state.calls.push(DriverCall::Screenshot);
        if state.fail_screenshots {
            return Err(E2eError::ScreenshotFailed("capture disabled".to_string()));
        }
        Ok(FAKE_PNG.to_vec())
    }

    async fn set_download_dir(&self, dir: &Path) -> Result<()> {
        let mut state = self.state();
        state.calls.push(DriverCall::SetDownloadDir(dir.to_path_buf()));
        state.download_dir = Some(dir.to_path_buf());
        Ok(())
    }

    async fn export_auth_state(&self) -> Result<AuthState> {
        let mut state = self.state();
        state.calls.push(DriverCall::ExportAuthState);
        let origin = url::Url::parse(&state.url)
            .map(|u| u.origin().ascii_serialization())
            .unwrap_or_default();
        let mut snapshot = AuthState::new(origin);
        snapshot.cookies = state.cookies.clone();
        Ok(snapshot)
    }

    async fn import_auth_state(&self, snapshot: &AuthState) -> Result<()> {
        let mut state = self.state();
        state.calls.push(DriverCall::ImportAuthState);
        state.cookies = snapshot.cookies.clone();
        Ok(())
    }

    async fn close(&self) -> Result<()> {
        self.state().calls.push(DriverCall::Close);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dom::Selector;

    #[tokio::test(start_paused = true)]
    async fn delayed_elements_attach_on_schedule() {
        let driver = FakeDriver::new();
        let table = Locator::new("rows", Selector::css("table tbody tr"));
        driver
            .add_element(&table)
            .matches(3)
            .appears_after(Duration::from_secs(2));

        assert_eq!(driver.count(&table).await.unwrap(), 0);
        tokio::time::sleep(Duration::from_secs(2)).await;
        assert_eq!(driver.count(&table).await.unwrap(), 3);
        assert_eq!(driver.count(&table.first()).await.unwrap(), 1);
        assert_eq!(driver.count(&table.nth(5)).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn click_applies_reveal_and_navigation() {
        let driver = FakeDriver::new();
        let link = Locator::new("link", Selector::text("Trial Balance"));
        let title = Locator::new("title", Selector::css("h5"));
        driver
            .add_element(&link)
            .reveals(&title)
            .navigates_to("https://portal.test/p/trial-balance");
        driver.add_element(&title).hidden();

        assert!(!driver.is_visible(&title).await.unwrap());
        driver.click(&link).await.unwrap();
        assert!(driver.is_visible(&title).await.unwrap());
        assert_eq!(
            driver.current_url().await.unwrap(),
            "https://portal.test/p/trial-balance"
        );
    }

    #[tokio::test]
    async fn click_can_hide_another_element() {
        let driver = FakeDriver::new();
        let submit = Locator::new("submit", Selector::css("button"));
        let form = Locator::new("form", Selector::css("form"));
        driver.add_element(&submit).hides(&form);
        driver.add_element(&form);

        driver.click(&submit).await.unwrap();
        assert!(!driver.is_visible(&form).await.unwrap());
        assert_eq!(driver.count(&form).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn acting_on_a_missing_element_fails() {
        let driver = FakeDriver::new();
        let ghost = Locator::new("ghost", Selector::css("#ghost"));
        assert!(driver.click(&ghost).await.is_err());
        assert!(driver.fill(&ghost, "x").await.is_err());
        assert!(driver.calls().is_empty());
    }
}
