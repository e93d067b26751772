use crate::dom::selector::Selector;
use crate::errors::Result;
use std::fmt;

/// Which of the matched elements a locator refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Pick {
    All,
    First,
    Nth(usize),
    Last,
}

/// Named, lazily resolved reference to elements of the live document.
///
/// A locator is a plain value: it holds no element handle, and every driver
/// call resolves it again against whatever the document contains at that
/// moment. The selector is fixed at construction; [`Locator::first`] and
/// friends return new locators instead of mutating this one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Locator {
    name: String,
    selector: Selector,
    pick: Pick,
}

impl Locator {
    pub fn new(name: impl Into<String>, selector: Selector) -> Self {
        Self {
            name: name.into(),
            selector,
            pick: Pick::All,
        }
    }

    pub fn parse(name: impl Into<String>, raw: &str) -> Result<Self> {
        Ok(Self::new(name, Selector::parse(raw)?))
    }

    pub fn first(&self) -> Self {
        self.with_pick(Pick::First)
    }

    pub fn nth(&self, index: usize) -> Self {
        self.with_pick(Pick::Nth(index))
    }

    pub fn last(&self) -> Self {
        self.with_pick(Pick::Last)
    }

    fn with_pick(&self, pick: Pick) -> Self {
        Self {
            name: self.name.clone(),
            selector: self.selector.clone(),
            pick,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn selector(&self) -> &Selector {
        &self.selector
    }

    pub fn pick(&self) -> Pick {
        self.pick
    }

    /// Identity of the matched element group, independent of the pick.
    pub fn key(&self) -> String {
        self.selector.to_string()
    }
}

impl fmt::Display for Locator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} [{}", self.name, self.selector)?;
        match self.pick {
            Pick::All => {}
            Pick::First => f.write_str(" >> first")?,
            Pick::Nth(index) => write!(f, " >> nth={}", index)?,
            Pick::Last => f.write_str(" >> last")?,
        }
        f.write_str("]")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn narrowing_returns_new_values_and_keeps_selector() {
        let fields = Locator::new("text inputs", Selector::css(r#"input[type="text"]"#));
        let first = fields.first();
        let third = fields.nth(2);

        assert_eq!(fields.pick(), Pick::All);
        assert_eq!(first.pick(), Pick::First);
        assert_eq!(third.pick(), Pick::Nth(2));
        assert_eq!(first.selector(), fields.selector());
        assert_eq!(first.key(), fields.key());
    }

    #[test]
    fn display_names_the_element_and_its_rule() {
        let button = Locator::new(
            "View Report button",
            Selector::xpath("//button[normalize-space()='View Report']"),
        );
        assert_eq!(
            button.first().to_string(),
            "View Report button [xpath=//button[normalize-space()='View Report'] >> first]"
        );
        assert_eq!(
            button.last().to_string(),
            "View Report button [xpath=//button[normalize-space()='View Report'] >> last]"
        );
    }

    #[test]
    fn parse_builds_from_string_dialect() {
        let locator = Locator::parse("Report Centre link", "text=Report Centre").unwrap();
        assert_eq!(locator.selector(), &Selector::text("Report Centre"));
        assert_eq!(locator.name(), "Report Centre link");
        assert!(Locator::parse("broken", "").is_err());
    }
}
