use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use live_reports_e2e::runner::SessionFactory;
use live_reports_e2e::scenarios::fixture;
use live_reports_e2e::{ChromeFactory, Config, Runner, ScenarioId, Session, TestData};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, info};

#[derive(Parser)]
#[command(
    name = "live-reports-e2e",
    about = "End-to-end checks for the Live Reports portal"
)]
struct Cli {
    /// JSON config file; environment variables and flags override it
    #[arg(long, global = true, env = "E2E_CONFIG")]
    config: Option<PathBuf>,

    /// Portal base URL
    #[arg(long, global = true)]
    base_url: Option<String>,

    /// Show the browser window
    #[arg(long, global = true)]
    headed: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run scenarios and write a JSON report
    Run {
        /// Scenario number to run (repeatable); all eighteen when omitted
        #[arg(long = "scenario", short = 's')]
        scenarios: Vec<u32>,

        /// Include the invalid-credentials check
        #[arg(long)]
        extended: bool,

        /// Scenarios running at once, each in its own browser
        #[arg(long, short = 'j', default_value_t = 1)]
        jobs: usize,

        /// Where to write the run report
        #[arg(long)]
        report: Option<PathBuf>,
    },
    /// List the scenario catalog
    List,
    /// Log in once and save the authentication snapshot
    SaveAuth,
}

fn load_config(cli: &Cli) -> anyhow::Result<Config> {
    let mut config = match &cli.config {
        Some(path) => Config::from_file(path)
            .with_context(|| format!("reading config {}", path.display()))?,
        None => Config::default(),
    };
    config.apply_env(|key| std::env::var(key).ok())?;
    if let Some(base_url) = &cli.base_url {
        config.base_url = base_url.clone();
    }
    if cli.headed {
        config.browser.headless = false;
    }
    config.validate()?;
    Ok(config)
}

fn select_scenarios(numbers: &[u32], extended: bool) -> anyhow::Result<Vec<ScenarioId>> {
    if numbers.is_empty() {
        let catalog = if extended {
            ScenarioId::extended()
        } else {
            ScenarioId::all()
        };
        return Ok(catalog.to_vec());
    }
    numbers
        .iter()
        .map(|&n| {
            ScenarioId::from_number(n).with_context(|| format!("no scenario numbered {}", n))
        })
        .collect()
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    match &cli.command {
        Commands::List => {
            for scenario in ScenarioId::extended() {
                println!("{:>2}  {}", scenario.number(), scenario.title());
                println!("    {}", scenario.objective());
            }
            Ok(())
        }
        Commands::SaveAuth => {
            let config = Arc::new(load_config(&cli)?);
            let driver = ChromeFactory.create(&config).await?;
            let session = Session::new(driver, config);
            let result = fixture::save_auth_state(&session).await;
            if let Err(e) = session.close().await {
                error!("Closing browser failed: {}", e);
            }
            result?;
            Ok(())
        }
        Commands::Run {
            scenarios,
            extended,
            jobs,
            report,
        } => {
            let config = load_config(&cli)?;
            let selected = select_scenarios(scenarios, *extended)?;
            let report_path = report
                .clone()
                .unwrap_or_else(|| config.artifacts.report_path.clone());

            let runner = Runner::new(ChromeFactory, Arc::new(config), TestData::default())
                .with_jobs(*jobs);
            let run = runner.run(&selected).await;
            run.save(&report_path).await?;

            for scenario in &run.reports {
                match &scenario.error {
                    None => info!("PASS  {:>2} {}", scenario.number, scenario.title),
                    Some(e) => error!("FAIL  {:>2} {}: {}", scenario.number, scenario.title, e),
                }
            }
            info!("{} passed, {} failed", run.passed(), run.failed());

            if !run.all_passed() {
                bail!("{} of {} scenarios failed", run.failed(), run.reports.len());
            }
            Ok(())
        }
    }
}
