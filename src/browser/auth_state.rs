use crate::errors::Result;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use tracing::info;

/// Serialized authenticated-session snapshot.
///
/// Written once after an interactive login and restored by later sessions so
/// they can skip the login form. The suite never interprets the values.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuthState {
    pub origin: String,
    pub cookies: Vec<CookieData>,
    pub local_storage: HashMap<String, String>,
    pub session_storage: HashMap<String, String>,
    pub saved_at: chrono::DateTime<chrono::Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CookieData {
    pub name: String,
    pub value: String,
    pub domain: String,
    pub path: String,
    pub secure: bool,
    /// Invisible to `document.cookie`, so it can only be restored over the
    /// DevTools protocol.
    #[serde(default)]
    pub http_only: bool,
    /// `Strict`, `Lax` or `None`, as the protocol spells it.
    #[serde(default)]
    pub same_site: Option<String>,
    /// Seconds since the epoch; `None` for session cookies.
    #[serde(default)]
    pub expires: Option<f64>,
}

impl CookieData {
    /// A secure, script-visible session cookie scoped to `/`.
    pub fn new(
        name: impl Into<String>,
        value: impl Into<String>,
        domain: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
            domain: domain.into(),
            path: "/".to_string(),
            secure: true,
            http_only: false,
            same_site: None,
            expires: None,
        }
    }
}

impl AuthState {
    pub fn new(origin: impl Into<String>) -> Self {
        Self {
            origin: origin.into(),
            cookies: Vec::new(),
            local_storage: HashMap::new(),
            session_storage: HashMap::new(),
            saved_at: chrono::Utc::now(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.cookies.is_empty() && self.local_storage.is_empty() && self.session_storage.is_empty()
    }

    pub async fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }
        let json = serde_json::to_string_pretty(self)?;
        tokio::fs::write(path, json).await?;
        info!(
            "Saved auth state for {} ({} cookies) to {}",
            self.origin,
            self.cookies.len(),
            path.display()
        );
        Ok(())
    }

    /// Returns `Ok(None)` when no snapshot has been written yet.
    pub async fn load(path: &Path) -> Result<Option<Self>> {
        match tokio::fs::read_to_string(path).await {
            Ok(raw) => Ok(Some(serde_json::from_str(&raw)?)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}

/// Collects cookies visible to script plus both storage areas, as JSON.
pub const EXPORT_SCRIPT: &str = r#"
    (function() {
        const cookies = [];
        document.cookie.split(';').forEach(cookie => {
            const index = cookie.indexOf('=');
            if (index <= 0) return;
            cookies.push({
                name: cookie.slice(0, index).trim(),
                value: cookie.slice(index + 1).trim(),
                domain: window.location.hostname,
                path: '/',
                secure: window.location.protocol === 'https:'
            });
        });
        const dump = (storage) => {
            const out = {};
            for (let i = 0; i < storage.length; i++) {
                const key = storage.key(i);
                if (key) out[key] = storage.getItem(key);
            }
            return out;
        };
        return JSON.stringify({
            origin: window.location.origin,
            cookies: cookies,
            local_storage: dump(localStorage),
            session_storage: dump(sessionStorage)
        });
    })()
"#;

/// Shape produced by [`EXPORT_SCRIPT`].
#[derive(Debug, Deserialize)]
pub struct ExportedStorage {
    pub origin: String,
    pub cookies: Vec<CookieData>,
    pub local_storage: HashMap<String, String>,
    pub session_storage: HashMap<String, String>,
}

impl From<ExportedStorage> for AuthState {
    fn from(exported: ExportedStorage) -> Self {
        Self {
            origin: exported.origin,
            cookies: exported.cookies,
            local_storage: exported.local_storage,
            session_storage: exported.session_storage,
            saved_at: chrono::Utc::now(),
        }
    }
}

/// Script that writes both storage areas of a snapshot back into the current
/// document. Cookies go through the driver, which can set HttpOnly ones.
pub fn storage_import_script(state: &AuthState) -> Result<String> {
    let storage = serde_json::json!({
        "local_storage": state.local_storage,
        "session_storage": state.session_storage,
    });
    Ok(format!(
        r#"
        (function() {{
            const state = {};
            Object.entries(state.local_storage).forEach(([k, v]) => localStorage.setItem(k, v));
            Object.entries(state.session_storage).forEach(([k, v]) => sessionStorage.setItem(k, v));
            return Object.keys(state.local_storage).length + Object.keys(state.session_storage).length;
        }})()
        "#,
        serde_json::to_string(&storage)?
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> AuthState {
        let mut state = AuthState::new("https://portal.test");
        state.cookies.push(CookieData {
            http_only: true,
            same_site: Some("Lax".to_string()),
            ..CookieData::new("XASSESSIONID", "abc123", "portal.test")
        });
        state
            .local_storage
            .insert("mx.lastPage".to_string(), "Report_Centre".to_string());
        state
    }

    #[tokio::test]
    async fn save_then_load_restores_the_snapshot() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("auth-state.json");
        let state = sample();

        state.save(&path).await.unwrap();
        let loaded = AuthState::load(&path).await.unwrap();

        assert_eq!(loaded, Some(state));
    }

    #[tokio::test]
    async fn missing_snapshot_is_not_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let loaded = AuthState::load(&dir.path().join("absent.json")).await.unwrap();
        assert!(loaded.is_none());
    }

    #[tokio::test]
    async fn corrupt_snapshot_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("auth-state.json");
        tokio::fs::write(&path, "{ not json").await.unwrap();
        assert!(AuthState::load(&path).await.is_err());
    }

    #[test]
    fn storage_import_leaves_cookies_to_the_driver() {
        let script = storage_import_script(&sample()).unwrap();
        assert!(script.contains("\"mx.lastPage\""));
        assert!(script.contains("localStorage.setItem"));
        assert!(!script.contains("document.cookie"));
        assert!(!script.contains("XASSESSIONID"));
        assert!(AuthState::new("https://portal.test").is_empty());
        assert!(!sample().is_empty());
    }

    #[tokio::test]
    async fn http_only_flag_survives_the_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("auth-state.json");
        sample().save(&path).await.unwrap();

        let loaded = AuthState::load(&path).await.unwrap().unwrap();
        assert!(loaded.cookies[0].http_only);
        assert_eq!(loaded.cookies[0].same_site.as_deref(), Some("Lax"));
    }

    #[test]
    fn older_snapshots_without_cookie_flags_still_load() {
        let raw = r#"{
            "origin": "https://portal.test",
            "cookies": [{"name": "a", "value": "b", "domain": "portal.test", "path": "/", "secure": false}],
            "local_storage": {},
            "session_storage": {},
            "saved_at": "2025-04-30T09:15:42Z"
        }"#;
        let state: AuthState = serde_json::from_str(raw).unwrap();
        assert!(!state.cookies[0].http_only);
        assert_eq!(state.cookies[0].expires, None);
    }
}
