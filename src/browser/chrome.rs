use crate::browser::auth_state::{self, AuthState, CookieData, ExportedStorage};
use crate::core::{Config, PageDriver};
use crate::dom::{script, Locator};
use crate::errors::{E2eError, Result};
use crate::types::LoadSnapshot;
use async_trait::async_trait;
use headless_chrome::protocol::cdp::{Network, Page};
use headless_chrome::{Browser, LaunchOptions, Tab};
use serde_json::{json, Value};
use std::ffi::OsStr;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

/// [`PageDriver`] backed by a Chrome instance over the DevTools protocol.
pub struct ChromeDriver {
    // Dropping the browser kills the process, so it must outlive the tab.
    _browser: Browser,
    tab: Arc<Tab>,
}

impl ChromeDriver {
    pub fn launch(config: &Config) -> Result<Self> {
        let browser_config = &config.browser;
        let window_size_arg = format!(
            "--window-size={},{}",
            browser_config.viewport.width, browser_config.viewport.height
        );

        let user_agent_arg = browser_config
            .user_agent
            .as_ref()
            .map(|ua| format!("--user-agent={}", ua));

        let mut args = vec![
            OsStr::new("--no-sandbox"),
            OsStr::new("--disable-dev-shm-usage"),
            OsStr::new(&window_size_arg),
        ];

        if let Some(ref ua_arg) = user_agent_arg {
            args.push(OsStr::new(ua_arg));
        }

        for arg in &browser_config.args {
            args.push(OsStr::new(arg));
        }

        let launch_options = LaunchOptions::default_builder()
            .headless(browser_config.headless)
            .args(args)
            .idle_browser_timeout(Duration::from_millis(browser_config.idle_timeout_ms))
            .build()
            .map_err(|e| E2eError::LaunchFailed(e.to_string()))?;

        let browser =
            Browser::new(launch_options).map_err(|e| E2eError::LaunchFailed(e.to_string()))?;

        let tab = browser
            .new_tab()
            .map_err(|e| E2eError::LaunchFailed(e.to_string()))?;
        tab.set_default_timeout(config.login_timeout());

        info!(
            "Launched Chrome (headless: {}, viewport: {}x{})",
            browser_config.headless, browser_config.viewport.width, browser_config.viewport.height
        );
        Ok(Self {
            _browser: browser,
            tab,
        })
    }

    fn evaluate(&self, script: &str) -> Result<Value> {
        let result = self
            .tab
            .evaluate(script, false)
            .map_err(|e| E2eError::JavaScriptFailed(e.to_string()))?;
        Ok(result.value.unwrap_or(Value::Null))
    }

    fn evaluate_bool(&self, script: &str) -> Result<bool> {
        Ok(self.evaluate(script)?.as_bool().unwrap_or(false))
    }

    fn evaluate_string(&self, script: &str) -> Result<Option<String>> {
        Ok(self.evaluate(script)?.as_str().map(str::to_string))
    }

    /// Runs an action snippet that answers `false` when the element is gone.
    fn act(&self, locator: &Locator, script: &str) -> Result<()> {
        if self.evaluate_bool(script)? {
            Ok(())
        } else {
            Err(E2eError::JavaScriptFailed(format!("no element for {}", locator)))
        }
    }
}

/// Protocol form of a saved cookie, keeping the flags `document.cookie` drops.
fn cookie_param(cookie: &CookieData) -> Result<Network::CookieParam> {
    let mut param = json!({
        "name": cookie.name,
        "value": cookie.value,
        "domain": cookie.domain,
        "path": cookie.path,
        "secure": cookie.secure,
        "httpOnly": cookie.http_only,
    });
    if let Some(same_site) = &cookie.same_site {
        param["sameSite"] = json!(same_site);
    }
    if let Some(expires) = cookie.expires {
        param["expires"] = json!(expires);
    }
    Ok(serde_json::from_value(param)?)
}

#[async_trait]
impl PageDriver for ChromeDriver {
    async fn goto(&self, url: &str) -> Result<()> {
        self.tab
            .navigate_to(url)
            .map_err(|e| E2eError::NavigationFailed(e.to_string()))?;

        self.tab
            .wait_until_navigated()
            .map_err(|e| E2eError::NavigationFailed(e.to_string()))?;

        Ok(())
    }

    async fn reload(&self) -> Result<()> {
        self.tab
            .reload(false, None)
            .map_err(|e| E2eError::NavigationFailed(e.to_string()))?;
        Ok(())
    }

    async fn current_url(&self) -> Result<String> {
        Ok(self.tab.get_url())
    }

    async fn title(&self) -> Result<String> {
        Ok(self.evaluate_string(script::TITLE)?.unwrap_or_default())
    }

    async fn load_snapshot(&self) -> Result<LoadSnapshot> {
        let raw = self
            .evaluate_string(script::LOAD_SNAPSHOT)?
            .ok_or_else(|| E2eError::JavaScriptFailed("load snapshot returned nothing".into()))?;
        Ok(serde_json::from_str(&raw)?)
    }

    async fn count(&self, locator: &Locator) -> Result<usize> {
        let value = self.evaluate(&script::count(locator))?;
        Ok(value.as_u64().unwrap_or(0) as usize)
    }

    async fn is_visible(&self, locator: &Locator) -> Result<bool> {
        self.evaluate_bool(&script::is_visible(locator))
    }

    async fn is_enabled(&self, locator: &Locator) -> Result<bool> {
        self.evaluate_bool(&script::is_enabled(locator))
    }

    async fn text_content(&self, locator: &Locator) -> Result<Option<String>> {
        self.evaluate_string(&script::text_content(locator))
    }

    async fn attribute(&self, locator: &Locator, name: &str) -> Result<Option<String>> {
        self.evaluate_string(&script::attribute(locator, name))
    }

    async fn tag_name(&self, locator: &Locator) -> Result<Option<String>> {
        self.evaluate_string(&script::tag_name(locator))
    }

    async fn click(&self, locator: &Locator) -> Result<()> {
        self.act(locator, &script::click(locator))
    }

    async fn fill(&self, locator: &Locator, text: &str) -> Result<()> {
        self.act(locator, &script::focus_and_clear(locator))?;
        self.tab
            .type_str(text)
            .map_err(|e| E2eError::JavaScriptFailed(e.to_string()))?;
        Ok(())
    }

    async fn press(&self, locator: &Locator, key: &str) -> Result<()> {
        self.act(locator, &script::focus(locator))?;
        self.tab
            .press_key(key)
            .map_err(|e| E2eError::JavaScriptFailed(e.to_string()))?;
        Ok(())
    }

    async fn select_option(&self, locator: &Locator, label: &str) -> Result<String> {
        self.evaluate_string(&script::select_option(locator, label))?
            .ok_or_else(|| {
                E2eError::JavaScriptFailed(format!("no option {:?} in {}", label, locator))
            })
    }

    async fn set_checked(&self, locator: &Locator, checked: bool) -> Result<()> {
        self.act(locator, &script::set_checked(locator, checked))
    }

    async fn screenshot(&self) -> Result<Vec<u8>> {
        self.tab
            .capture_screenshot(Page::CaptureScreenshotFormatOption::Png, None, None, true)
            .map_err(|e| E2eError::ScreenshotFailed(e.to_string()))
    }

    async fn set_download_dir(&self, dir: &Path) -> Result<()> {
        tokio::fs::create_dir_all(dir).await?;
        let absolute = tokio::fs::canonicalize(dir).await?;
        self.tab
            .call_method(Page::SetDownloadBehavior {
                behavior: Page::SetDownloadBehaviorBehaviorOption::Allow,
                download_path: Some(absolute.to_string_lossy().into_owned()),
            })
            .map_err(|e| E2eError::Chrome(e.to_string()))?;
        debug!("Downloads go to {}", absolute.display());
        Ok(())
    }

    async fn export_auth_state(&self) -> Result<AuthState> {
        let raw = self
            .evaluate_string(auth_state::EXPORT_SCRIPT)?
            .ok_or_else(|| E2eError::JavaScriptFailed("storage export returned nothing".into()))?;
        let exported: ExportedStorage = serde_json::from_str(&raw)?;
        let mut state = AuthState::from(exported);

        // The protocol also sees HttpOnly cookies, which script cannot.
        match self.tab.get_cookies() {
            Ok(cookies) => {
                state.cookies = cookies
                    .into_iter()
                    .map(|c| CookieData {
                        same_site: c
                            .same_site
                            .and_then(|s| serde_json::to_value(s).ok())
                            .and_then(|v| v.as_str().map(str::to_string)),
                        expires: (!c.session).then_some(c.expires),
                        name: c.name,
                        value: c.value,
                        domain: c.domain,
                        path: c.path,
                        secure: c.secure,
                        http_only: c.http_only,
                    })
                    .collect();
            }
            Err(e) => debug!("Falling back to script-visible cookies: {}", e),
        }
        Ok(state)
    }

    async fn import_auth_state(&self, state: &AuthState) -> Result<()> {
        let cookies = state
            .cookies
            .iter()
            .map(cookie_param)
            .collect::<Result<Vec<_>>>()?;
        if !cookies.is_empty() {
            self.tab
                .set_cookies(cookies)
                .map_err(|e| E2eError::Chrome(e.to_string()))?;
        }
        self.evaluate(&auth_state::storage_import_script(state)?)?;
        Ok(())
    }

    async fn close(&self) -> Result<()> {
        self.tab
            .close(true)
            .map_err(|e| E2eError::Chrome(e.to_string()))?;
        Ok(())
    }
}
