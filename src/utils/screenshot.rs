use crate::core::PageDriver;
use crate::errors::Result;
use chrono::{DateTime, Utc};
use std::path::{Path, PathBuf};

pub struct ScreenshotManager;

impl ScreenshotManager {
    /// `<name>-<ISO-8601 timestamp with ':' and '.' replaced by '-'>.png`
    pub fn timestamped_name(name: &str, now: DateTime<Utc>) -> String {
        let stem = name.strip_suffix(".png").unwrap_or(name);
        format!("{}-{}.png", stem, now.format("%Y-%m-%dT%H-%M-%S-%3fZ"))
    }

    pub fn file_name(name: &str) -> String {
        if name.ends_with(".png") {
            name.to_string()
        } else {
            format!("{}.png", name)
        }
    }

    pub async fn save_to_file<D: PageDriver + ?Sized>(
        driver: &D,
        dir: &Path,
        file_name: &str,
    ) -> Result<PathBuf> {
        let screenshot_bytes = driver.screenshot().await?;
        tokio::fs::create_dir_all(dir).await?;
        let path = dir.join(Self::file_name(file_name));
        tokio::fs::write(&path, screenshot_bytes).await?;
        Ok(path)
    }

    pub async fn save_timestamped<D: PageDriver + ?Sized>(
        driver: &D,
        dir: &Path,
        name: &str,
    ) -> Result<PathBuf> {
        Self::save_to_file(driver, dir, &Self::timestamped_name(name, Utc::now())).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::FakeDriver;
    use chrono::TimeZone;

    #[test]
    fn timestamp_has_no_colons_or_dots() {
        let now = Utc.with_ymd_and_hms(2025, 4, 30, 9, 15, 42).unwrap()
            + chrono::Duration::milliseconds(123);
        assert_eq!(
            ScreenshotManager::timestamped_name("after-refresh", now),
            "after-refresh-2025-04-30T09-15-42-123Z.png"
        );
        assert_eq!(
            ScreenshotManager::timestamped_name("trial-balance.png", now),
            "trial-balance-2025-04-30T09-15-42-123Z.png"
        );
    }

    #[tokio::test]
    async fn saves_png_bytes_under_the_directory() {
        let dir = tempfile::tempdir().unwrap();
        let driver = FakeDriver::new();

        let path = ScreenshotManager::save_to_file(
            &driver,
            &dir.path().join("shots"),
            "nav-pack-report-basic",
        )
        .await
        .unwrap();

        assert_eq!(path.file_name().unwrap(), "nav-pack-report-basic.png");
        let bytes = tokio::fs::read(&path).await.unwrap();
        assert!(bytes.starts_with(&[0x89, b'P', b'N', b'G']));
    }
}
