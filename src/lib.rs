pub mod browser;
pub mod core;
pub mod dom;
pub mod errors;
pub mod pages;
pub mod runner;
pub mod scenarios;
pub mod testing;
pub mod types;
pub mod utils;

pub use browser::{Artifact, ArtifactFormat, AuthState, FallbackChain, Session};
#[cfg(feature = "chrome")]
pub use browser::ChromeDriver;
pub use core::{Config, Credentials, PageDriver, TestData};
pub use dom::{Locator, Pick, Selector};
pub use errors::{E2eError, Result};
#[cfg(feature = "chrome")]
pub use runner::ChromeFactory;
pub use runner::{Outcome, RunReport, Runner, ScenarioReport, SessionFactory};
pub use scenarios::{Evidence, ScenarioId};
pub use types::*;
