use crate::browser::Session;
use crate::core::{Config, PageDriver, TestData};
use crate::errors::{E2eError, Result};
use crate::scenarios::{fixture, Evidence, ScenarioId};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::Semaphore;
use tracing::{error, info, warn};

/// Produces one fresh browser context per scenario.
#[async_trait]
pub trait SessionFactory: Send + Sync + 'static {
    type Driver: PageDriver + 'static;

    async fn create(&self, config: &Config) -> Result<Self::Driver>;
}

#[cfg(feature = "chrome")]
pub struct ChromeFactory;

#[cfg(feature = "chrome")]
#[async_trait]
impl SessionFactory for ChromeFactory {
    type Driver = crate::browser::ChromeDriver;

    async fn create(&self, config: &Config) -> Result<Self::Driver> {
        let config = config.clone();
        tokio::task::spawn_blocking(move || crate::browser::ChromeDriver::launch(&config))
            .await
            .map_err(|e| E2eError::LaunchFailed(e.to_string()))?
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Outcome {
    Passed,
    Failed,
}

#[derive(Debug, Clone, Serialize)]
pub struct ScenarioReport {
    pub number: u32,
    pub title: String,
    pub outcome: Outcome,
    pub duration_ms: u64,
    pub session_id: Option<String>,
    pub error: Option<String>,
    /// True when the failure came from a wait running out of time.
    pub timed_out: bool,
    pub evidence: Evidence,
}

impl ScenarioReport {
    pub fn passed(&self) -> bool {
        self.outcome == Outcome::Passed
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub run_id: String,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub reports: Vec<ScenarioReport>,
}

impl RunReport {
    pub fn passed(&self) -> usize {
        self.reports.iter().filter(|r| r.passed()).count()
    }

    pub fn failed(&self) -> usize {
        self.reports.len() - self.passed()
    }

    pub fn all_passed(&self) -> bool {
        self.failed() == 0
    }

    pub async fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(path, serde_json::to_string_pretty(self)?).await?;
        info!("Run report written to {}", path.display());
        Ok(())
    }
}

/// Runs scenarios in isolated sessions, at most `jobs` at a time.
///
/// A failing scenario never affects its siblings and is never retried.
pub struct Runner<F: SessionFactory> {
    factory: Arc<F>,
    config: Arc<Config>,
    data: Arc<TestData>,
    jobs: usize,
}

impl<F: SessionFactory> Runner<F> {
    pub fn new(factory: F, config: Arc<Config>, data: TestData) -> Self {
        Self {
            factory: Arc::new(factory),
            config,
            data: Arc::new(data),
            jobs: 1,
        }
    }

    pub fn with_jobs(mut self, jobs: usize) -> Self {
        self.jobs = jobs.max(1);
        self
    }

    pub async fn run(&self, scenarios: &[ScenarioId]) -> RunReport {
        let run_id = uuid::Uuid::new_v4().to_string();
        let started_at = Utc::now();
        info!(
            "Run {} starting {} scenarios with {} job(s)",
            run_id,
            scenarios.len(),
            self.jobs
        );

        let permits = Arc::new(Semaphore::new(self.jobs));
        let mut handles = Vec::new();

        for &scenario in scenarios {
            let factory = self.factory.clone();
            let config = self.config.clone();
            let data = self.data.clone();
            let permits = permits.clone();

            handles.push((
                scenario,
                tokio::spawn(async move {
                    let _permit = permits.acquire_owned().await.ok();
                    run_scenario(factory.as_ref(), config, &data, scenario).await
                }),
            ));
        }

        let mut reports = Vec::with_capacity(handles.len());
        for (scenario, handle) in handles {
            let report = match handle.await {
                Ok(report) => report,
                Err(e) => {
                    error!("{} aborted: {}", scenario, e);
                    ScenarioReport {
                        number: scenario.number(),
                        title: scenario.title().to_string(),
                        outcome: Outcome::Failed,
                        duration_ms: 0,
                        session_id: None,
                        error: Some(format!("task aborted: {}", e)),
                        timed_out: false,
                        evidence: Evidence::default(),
                    }
                }
            };
            reports.push(report);
        }
        reports.sort_by_key(|r| r.number);

        let report = RunReport {
            run_id,
            started_at,
            finished_at: Utc::now(),
            reports,
        };
        info!(
            "Run {} finished: {} passed, {} failed",
            report.run_id,
            report.passed(),
            report.failed()
        );
        report
    }
}

/// Bootstraps (when required) and runs one scenario in its own session.
pub async fn run_scenario<F: SessionFactory + ?Sized>(
    factory: &F,
    config: Arc<Config>,
    data: &TestData,
    scenario: ScenarioId,
) -> ScenarioReport {
    info!("Testing: {}", scenario);
    let started = Instant::now();
    let mut session_id = None;

    let result = match factory.create(&config).await {
        Ok(driver) => {
            let session = Session::new(driver, config);
            session_id = Some(session.id().to_string());

            let result = async {
                if scenario.requires_login() {
                    fixture::bootstrap(&session).await?;
                }
                scenario.run(&session, data).await
            }
            .await;

            if result.is_err() {
                session
                    .screenshot_timestamped(&format!("failure-scenario-{}", scenario.number()))
                    .await;
            }
            if let Err(e) = session.close().await {
                warn!("Closing session {} failed: {}", session.id(), e);
            }
            result
        }
        Err(e) => Err(e),
    };

    let duration_ms = started.elapsed().as_millis() as u64;
    let (outcome, error, timed_out, evidence) = match result {
        Ok(evidence) => {
            info!("SUCCESS: {} ({} ms)", scenario, duration_ms);
            (Outcome::Passed, None, false, evidence)
        }
        Err(e) => {
            error!("FAILED: {}: {}", scenario, e);
            let timed_out = e.is_timeout();
            (Outcome::Failed, Some(e.to_string()), timed_out, Evidence::default())
        }
    };

    ScenarioReport {
        number: scenario.number(),
        title: scenario.title().to_string(),
        outcome,
        duration_ms,
        session_id,
        error,
        timed_out,
        evidence,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pages::dashboard::report_centre_marker;
    use crate::pages::ReportMenu;
    use crate::testing::FakeDriver;

    /// Hands out a logged-in fake whose dashboard optionally has the arrow.
    struct Fakes {
        with_arrow: bool,
    }

    #[async_trait]
    impl SessionFactory for Fakes {
        type Driver = FakeDriver;

        async fn create(&self, _config: &Config) -> Result<FakeDriver> {
            let driver = FakeDriver::new();
            driver.add_element(&report_centre_marker());
            if self.with_arrow {
                driver.add_element(&ReportMenu::default().arrow_button);
            }
            Ok(driver)
        }
    }

    struct Broken;

    #[async_trait]
    impl SessionFactory for Broken {
        type Driver = FakeDriver;

        async fn create(&self, _config: &Config) -> Result<FakeDriver> {
            Err(E2eError::LaunchFailed("no chrome".to_string()))
        }
    }

    fn config_in(dir: &Path) -> Arc<Config> {
        let mut config = Config::default();
        config.artifacts.screenshot_dir = dir.join("screenshots");
        config.artifacts.auth_state_path = dir.join("auth-state.json");
        Arc::new(config)
    }

    #[tokio::test(start_paused = true)]
    async fn reports_each_scenario_in_catalog_order() {
        let dir = tempfile::tempdir().unwrap();
        let runner = Runner::new(
            Fakes { with_arrow: true },
            config_in(dir.path()),
            TestData::default(),
        )
        .with_jobs(2);

        let report = runner
            .run(&[ScenarioId::AccountingSectionExpansion, ScenarioId::ArrowButtonNavigation])
            .await;

        assert_eq!(report.reports.len(), 2);
        assert_eq!(report.reports[0].number, 1);
        assert!(report.reports[0].passed());
        // The Live Reports tab never appears, so scenario 3 times out clicking it.
        assert_eq!(report.reports[1].number, 3);
        assert!(!report.reports[1].passed());
        assert!(report.reports[1].timed_out);
        assert_eq!(report.passed(), 1);
        assert!(!report.all_passed());
        assert_ne!(report.reports[0].session_id, report.reports[1].session_id);
    }

    #[tokio::test(start_paused = true)]
    async fn failures_capture_a_screenshot() {
        let dir = tempfile::tempdir().unwrap();
        let config = config_in(dir.path());
        let report = run_scenario(
            &Fakes { with_arrow: false },
            config,
            &TestData::default(),
            ScenarioId::ArrowButtonNavigation,
        )
        .await;

        assert!(!report.passed());
        let shots: Vec<_> = std::fs::read_dir(dir.path().join("screenshots"))
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        assert!(shots.iter().any(|name| name.starts_with("failure-scenario-1-")));
    }

    #[tokio::test]
    async fn launch_failure_is_a_scenario_failure() {
        let dir = tempfile::tempdir().unwrap();
        let report = run_scenario(
            &Broken,
            config_in(dir.path()),
            &TestData::default(),
            ScenarioId::TrialBalanceNavigation,
        )
        .await;
        assert!(!report.passed());
        assert!(report.session_id.is_none());
        assert!(report.error.unwrap().contains("no chrome"));
    }

    #[tokio::test]
    async fn run_report_round_trips_to_disk() {
        let dir = tempfile::tempdir().unwrap();
        let report = RunReport {
            run_id: "run-1".to_string(),
            started_at: Utc::now(),
            finished_at: Utc::now(),
            reports: vec![],
        };
        let path = dir.path().join("out").join("e2e-report.json");
        report.save(&path).await.unwrap();
        let raw = std::fs::read_to_string(&path).unwrap();
        let json: serde_json::Value = serde_json::from_str(&raw).unwrap();
        assert_eq!(json["run_id"], "run-1");
        assert!(report.all_passed());
    }
}
