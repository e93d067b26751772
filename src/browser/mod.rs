pub mod auth_state;
#[cfg(feature = "chrome")]
pub mod chrome;
pub mod download;
pub mod navigation;
pub mod session;

pub use auth_state::AuthState;
#[cfg(feature = "chrome")]
pub use chrome::ChromeDriver;
pub use download::{Artifact, ArtifactFormat, DownloadWatcher};
pub use navigation::{follow_menu, FallbackChain};
pub use session::Session;
