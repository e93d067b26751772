pub mod forms;
pub mod screenshot;

pub use forms::{fill_form, generate_test_user};
pub use screenshot::ScreenshotManager;
