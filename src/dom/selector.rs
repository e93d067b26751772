//! Declarative element-matching rules.
//!
//! A [`Selector`] never touches the document. It describes *how* to find
//! elements and can render itself as a JavaScript expression that evaluates
//! to an array of matching elements in document order.

use crate::errors::{E2eError, Result};
use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Selector {
    /// CSS selector list, e.g. `select, .mx-referenceselector`.
    Css(String),
    /// XPath expression, e.g. `//button[normalize-space()='View Report']`.
    XPath(String),
    /// Innermost elements whose text contains the given string (case-insensitive).
    Text(String),
    /// Innermost elements whose text matches a regular expression.
    TextPattern(String),
    /// Elements matching `css` whose text contains `text`.
    CssHasText { css: String, text: String },
    /// Elements with an explicit or implicit ARIA role and accessible name.
    Role { role: String, name: String },
    /// Form controls labelled by the given text.
    Label(String),
    /// Union of several selectors, de-duplicated, in document order.
    Any(Vec<Selector>),
}

impl Selector {
    pub fn css(selector: impl Into<String>) -> Self {
        Self::Css(selector.into())
    }

    pub fn xpath(expression: impl Into<String>) -> Self {
        Self::XPath(expression.into())
    }

    pub fn text(text: impl Into<String>) -> Self {
        Self::Text(text.into())
    }

    pub fn has_text(css: impl Into<String>, text: impl Into<String>) -> Self {
        Self::CssHasText {
            css: css.into(),
            text: text.into(),
        }
    }

    pub fn role(role: impl Into<String>, name: impl Into<String>) -> Self {
        Self::Role {
            role: role.into(),
            name: name.into(),
        }
    }

    pub fn label(text: impl Into<String>) -> Self {
        Self::Label(text.into())
    }

    pub fn any(selectors: Vec<Selector>) -> Self {
        Self::Any(selectors)
    }

    /// Regular-expression text match. The pattern is checked here so a typo
    /// fails at construction instead of inside the browser.
    pub fn text_pattern(pattern: impl Into<String>) -> Result<Self> {
        let pattern = pattern.into();
        regex::Regex::new(&pattern)
            .map_err(|e| E2eError::InvalidSelector(format!("text=/{}/: {}", pattern, e)))?;
        Ok(Self::TextPattern(pattern))
    }

    /// Parses the string selector dialect used throughout the suite:
    ///
    /// - `xpath=...`, or anything starting with `//` or `(` is XPath
    /// - `text=...` is a text match, `text=/re/` a pattern match
    /// - `css=...` forces CSS
    /// - `tag:has-text("x")` filters CSS matches by text
    /// - a comma list containing `text=` or `:has-text(` parts is a union;
    ///   any other comma list is handed to CSS unchanged
    pub fn parse(raw: &str) -> Result<Self> {
        let raw = raw.trim();
        if raw.is_empty() {
            return Err(E2eError::InvalidSelector("empty selector".to_string()));
        }
        if let Some(rest) = raw.strip_prefix("xpath=") {
            return non_empty(rest, raw).map(Self::xpath);
        }
        if raw.starts_with("//") || raw.starts_with('(') {
            return Ok(Self::xpath(raw));
        }

        let parts = split_top_level(raw);
        let needs_union = parts.len() > 1
            && parts
                .iter()
                .any(|part| part.starts_with("text=") || part.contains(":has-text("));
        if needs_union {
            let selectors = parts
                .iter()
                .map(|part| Self::parse_single(part))
                .collect::<Result<Vec<_>>>()?;
            return Ok(Self::Any(selectors));
        }
        Self::parse_single(raw)
    }

    fn parse_single(raw: &str) -> Result<Self> {
        if let Some(rest) = raw.strip_prefix("css=") {
            return non_empty(rest, raw).map(Self::css);
        }
        if let Some(rest) = raw.strip_prefix("text=") {
            let rest = non_empty(rest, raw)?;
            if rest.len() >= 2 && rest.starts_with('/') && rest.ends_with('/') {
                return Self::text_pattern(&rest[1..rest.len() - 1]);
            }
            return Ok(Self::text(strip_quotes(rest)));
        }
        if let Some(index) = raw.find(":has-text(") {
            let css = raw[..index].trim();
            let inner = raw[index + ":has-text(".len()..]
                .strip_suffix(')')
                .ok_or_else(|| {
                    E2eError::InvalidSelector(format!("unclosed :has-text in '{}'", raw))
                })?;
            let css = if css.is_empty() { "*" } else { css };
            return Ok(Self::has_text(css, strip_quotes(inner.trim())));
        }
        Ok(Self::css(raw))
    }
}

fn non_empty<'a>(rest: &'a str, raw: &str) -> Result<&'a str> {
    let rest = rest.trim();
    if rest.is_empty() {
        Err(E2eError::InvalidSelector(format!("nothing after prefix in '{}'", raw)))
    } else {
        Ok(rest)
    }
}

fn strip_quotes(value: &str) -> &str {
    let bytes = value.as_bytes();
    if bytes.len() >= 2 {
        let (first, last) = (bytes[0], bytes[bytes.len() - 1]);
        if first == last && (first == b'"' || first == b'\'') {
            return &value[1..value.len() - 1];
        }
    }
    value
}

/// Splits on commas that are outside quotes, brackets and parentheses.
fn split_top_level(raw: &str) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut depth = 0i32;
    let mut quote: Option<char> = None;
    let mut start = 0;

    for (index, ch) in raw.char_indices() {
        match quote {
            Some(open) if ch == open => quote = None,
            Some(_) => {}
            None => match ch {
                '"' | '\'' => quote = Some(ch),
                '(' | '[' => depth += 1,
                ')' | ']' => depth -= 1,
                ',' if depth == 0 => {
                    parts.push(raw[start..index].trim());
                    start = index + 1;
                }
                _ => {}
            },
        }
    }
    parts.push(raw[start..].trim());
    parts.retain(|part| !part.is_empty());
    parts
}

impl fmt::Display for Selector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Selector::Css(s) => write!(f, "css={}", s),
            Selector::XPath(s) => write!(f, "xpath={}", s),
            Selector::Text(t) => write!(f, "text={}", t),
            Selector::TextPattern(p) => write!(f, "text=/{}/", p),
            Selector::CssHasText { css, text } => write!(f, "{}:has-text({:?})", css, text),
            Selector::Role { role, name } => write!(f, "role={}[name={:?}]", role, name),
            Selector::Label(text) => write!(f, "label={}", text),
            Selector::Any(parts) => {
                for (index, part) in parts.iter().enumerate() {
                    if index > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{}", part)?;
                }
                Ok(())
            }
        }
    }
}
