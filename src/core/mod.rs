pub mod config;
pub mod driver;

pub use config::{ArtifactConfig, BrowserConfig, Config, Credentials, TestData};
pub use driver::PageDriver;
