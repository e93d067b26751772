pub mod locator;
pub mod script;
pub mod selector;

pub use locator::{Locator, Pick};
pub use selector::Selector;
