//! JavaScript snippets evaluated by the Chrome backend.
//!
//! Every snippet is a self-contained expression. Objects are returned as JSON
//! strings because the remote evaluation hands back previews, not values, for
//! anything that is not a primitive.

use crate::dom::locator::{Locator, Pick};
use crate::dom::selector::Selector;

const NORMALIZE: &str = "(s) => (s || '').replace(/\\s+/g, ' ').trim()";

fn js_string(value: &str) -> String {
    serde_json::Value::String(value.to_string()).to_string()
}

/// Expression evaluating to an array of matching elements in document order.
pub fn match_all(selector: &Selector) -> String {
    match selector {
        Selector::Css(css) => format!("Array.from(document.querySelectorAll({}))", js_string(css)),
        Selector::XPath(xpath) => format!(
            r#"(() => {{
                const snapshot = document.evaluate({}, document, null, XPathResult.ORDERED_NODE_SNAPSHOT_TYPE, null);
                const out = [];
                for (let i = 0; i < snapshot.snapshotLength; i++) out.push(snapshot.snapshotItem(i));
                return out;
            }})()"#,
            js_string(xpath)
        ),
        Selector::Text(text) => innermost_text_match(&format!(
            "(text) => text.toLowerCase().includes({})",
            js_string(&text.to_lowercase())
        )),
        Selector::TextPattern(pattern) => innermost_text_match(&format!(
            "(text) => new RegExp({}).test(text)",
            js_string(pattern)
        )),
        Selector::CssHasText { css, text } => format!(
            r#"(() => {{
                const norm = {};
                const needle = {};
                return Array.from(document.querySelectorAll({})).filter(el => norm(el.textContent).toLowerCase().includes(needle));
            }})()"#,
            NORMALIZE,
            js_string(&text.to_lowercase()),
            js_string(css)
        ),
        Selector::Role { role, name } => format!(
            r#"(() => {{
                const norm = {};
                const needle = {};
                const accessibleName = (el) => {{
                    if (el.getAttribute('aria-label')) return el.getAttribute('aria-label');
                    const labelledBy = el.getAttribute('aria-labelledby');
                    if (labelledBy) {{
                        return labelledBy.split(/\s+/).map(id => document.getElementById(id)).filter(Boolean).map(n => n.textContent).join(' ');
                    }}
                    if (el.labels && el.labels.length) return Array.from(el.labels).map(l => l.textContent).join(' ');
                    return el.textContent || el.getAttribute('placeholder') || el.getAttribute('title') || '';
                }};
                return Array.from(document.querySelectorAll({})).filter(el => norm(accessibleName(el)).toLowerCase().includes(needle));
            }})()"#,
            NORMALIZE,
            js_string(&name.to_lowercase()),
            js_string(&role_css(role))
        ),
        Selector::Label(text) => format!(
            r#"(() => {{
                const norm = {};
                const needle = {};
                const out = [];
                document.querySelectorAll('label').forEach(label => {{
                    if (!norm(label.textContent).toLowerCase().includes(needle)) return;
                    const control = label.control
                        || (label.htmlFor ? document.getElementById(label.htmlFor) : null)
                        || label.querySelector('input, select, textarea');
                    if (control) out.push(control);
                }});
                document.querySelectorAll('[aria-label]').forEach(el => {{
                    if (el.getAttribute('aria-label').toLowerCase().includes(needle)) out.push(el);
                }});
                return Array.from(new Set(out));
            }})()"#,
            NORMALIZE,
            js_string(&text.to_lowercase())
        ),
        Selector::Any(parts) => {
            let lists: Vec<String> = parts.iter().map(match_all).collect();
            format!(
                r#"(() => {{
                    const seen = new Set();
                    [{}].forEach(list => list.forEach(el => seen.add(el)));
                    return Array.from(seen).sort((a, b) => a === b ? 0 : (a.compareDocumentPosition(b) & Node.DOCUMENT_POSITION_FOLLOWING ? -1 : 1));
                }})()"#,
                lists.join(", ")
            )
        }
    }
}

fn innermost_text_match(predicate: &str) -> String {
    format!(
        r#"(() => {{
            const norm = {};
            const test = {};
            const root = document.body;
            if (!root) return [];
            const hits = Array.from(root.querySelectorAll('*'))
                .filter(el => !['SCRIPT', 'STYLE', 'NOSCRIPT'].includes(el.tagName))
                .filter(el => test(norm(el.textContent)));
            return hits.filter(el => !hits.some(other => other !== el && el.contains(other)));
        }})()"#,
        NORMALIZE, predicate
    )
}

fn role_css(role: &str) -> String {
    match role {
        "button" => "button, input[type=button], input[type=submit], [role=button]".to_string(),
        "combobox" => "select, input[role=combobox], [role=combobox]".to_string(),
        "link" => "a[href], [role=link]".to_string(),
        "textbox" => "input:not([type]), input[type=text], textarea, [role=textbox]".to_string(),
        "checkbox" => "input[type=checkbox], [role=checkbox]".to_string(),
        other => format!("[role={}]", other),
    }
}

/// Expression evaluating to the single element a locator points at, or null.
///
/// An unnarrowed locator acts on its first match.
pub fn resolve(locator: &Locator) -> String {
    let pick = match locator.pick() {
        Pick::All | Pick::First => "all[0]".to_string(),
        Pick::Nth(index) => format!("all[{}]", index),
        Pick::Last => "all[all.length - 1]".to_string(),
    };
    format!(
        "(() => {{ const all = {}; return {} || null; }})()",
        match_all(locator.selector()),
        pick
    )
}

fn with_element(locator: &Locator, missing: &str, body: &str) -> String {
    format!(
        "(() => {{ const el = {}; if (!el) return {}; {} }})()",
        resolve(locator),
        missing,
        body
    )
}

pub fn count(locator: &Locator) -> String {
    let all = match_all(locator.selector());
    match locator.pick() {
        Pick::All => format!("({}).length", all),
        Pick::First | Pick::Last => format!("Math.min(({}).length, 1)", all),
        Pick::Nth(index) => format!("(({}).length > {}) ? 1 : 0", all, index),
    }
}

const VISIBLE: &str = r#"(el) => {
    const rect = el.getBoundingClientRect();
    const style = window.getComputedStyle(el);
    return rect.width > 0 &&
           rect.height > 0 &&
           style.visibility !== 'hidden' &&
           style.display !== 'none' &&
           parseFloat(style.opacity) > 0;
}"#;

/// An unnarrowed locator is visible when any of its matches is.
pub fn is_visible(locator: &Locator) -> String {
    match locator.pick() {
        Pick::All => format!("({}).some({})", match_all(locator.selector()), VISIBLE),
        _ => format!(
            "(() => {{ const el = {}; return !!el && ({})(el); }})()",
            resolve(locator),
            VISIBLE
        ),
    }
}

pub fn is_enabled(locator: &Locator) -> String {
    with_element(
        locator,
        "false",
        "return !el.disabled && el.getAttribute('aria-disabled') !== 'true';",
    )
}

pub fn text_content(locator: &Locator) -> String {
    with_element(locator, "null", "return el.textContent;")
}

pub fn attribute(locator: &Locator, name: &str) -> String {
    with_element(
        locator,
        "null",
        &format!("return el.getAttribute({});", js_string(name)),
    )
}

pub fn tag_name(locator: &Locator) -> String {
    with_element(locator, "null", "return el.tagName.toLowerCase();")
}

pub fn click(locator: &Locator) -> String {
    with_element(
        locator,
        "false",
        "el.scrollIntoView({ block: 'center' }); el.click(); return true;",
    )
}

/// Focuses the element and empties it so typed keys replace the old value.
pub fn focus_and_clear(locator: &Locator) -> String {
    with_element(
        locator,
        "false",
        r#"el.scrollIntoView({ block: 'center' });
           el.focus();
           if ('value' in el) {
               el.value = '';
               el.dispatchEvent(new Event('input', { bubbles: true }));
           }
           return true;"#,
    )
}

pub fn focus(locator: &Locator) -> String {
    with_element(locator, "false", "el.focus(); return true;")
}

/// Selects the option whose visible label matches; returns the chosen label.
pub fn select_option(locator: &Locator, label: &str) -> String {
    with_element(
        locator,
        "null",
        &format!(
            r#"const norm = {};
               const wanted = {};
               if (!el.options) return null;
               const options = Array.from(el.options);
               const option = options.find(o => norm(o.textContent) === wanted)
                   || options.find(o => norm(o.textContent).includes(wanted));
               if (!option) return null;
               el.value = option.value;
               el.dispatchEvent(new Event('input', {{ bubbles: true }}));
               el.dispatchEvent(new Event('change', {{ bubbles: true }}));
               return norm(option.textContent);"#,
            NORMALIZE,
            js_string(label)
        ),
    )
}

pub fn set_checked(locator: &Locator, checked: bool) -> String {
    with_element(
        locator,
        "false",
        &format!(
            "if (el.checked !== {0}) el.click(); return el.checked === {0};",
            checked
        ),
    )
}

pub const LOAD_SNAPSHOT: &str = r#"JSON.stringify({
    ready_state: document.readyState,
    resource_count: performance.getEntriesByType('resource').length
})"#;

pub const TITLE: &str = "document.title";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn string_arguments_are_escaped_as_js_literals() {
        let locator = Locator::new("quoted", Selector::xpath(r#"//span[text()="It's"]"#));
        let script = resolve(&locator);
        assert!(script.contains(r#""//span[text()=\"It's\"]""#));
    }

    #[test]
    fn pick_controls_which_match_is_used() {
        let base = Locator::new("arrow", Selector::css("img"));
        assert!(resolve(&base.first()).contains("return all[0] || null"));
        assert!(resolve(&base.nth(1)).contains("return all[1] || null"));
        assert!(resolve(&base.last()).contains("all[all.length - 1]"));
        assert!(count(&base).ends_with(".length"));
        assert!(count(&base.nth(3)).contains("> 3) ? 1 : 0"));
    }

    #[test]
    fn visibility_checks_every_match_unless_narrowed() {
        let base = Locator::new("report container", Selector::css("iframe, .report"));
        let any = is_visible(&base);
        assert!(any.starts_with("(Array.from(document.querySelectorAll("));
        assert!(any.contains(").some((el) =>"));
        assert!(!any.contains("all[0]"));

        let first = is_visible(&base.first());
        assert!(first.contains("return all[0] || null"));
        assert!(!first.contains(".some("));
        assert!(is_visible(&base.nth(2)).contains("all[2]"));
    }

    #[test]
    fn unions_embed_every_part() {
        let selector = Selector::any(vec![Selector::text("Error"), Selector::css("table")]);
        let script = match_all(&selector);
        assert!(script.contains(r#""error""#));
        assert!(script.contains(r#"querySelectorAll("table")"#));
        assert!(script.contains("compareDocumentPosition"));
    }

    #[test]
    fn roles_expand_to_implicit_elements() {
        let script = match_all(&Selector::role("combobox", "Diary End"));
        assert!(script.contains("select, input[role=combobox], [role=combobox]"));
        assert!(script.contains(r#""diary end""#));
        let custom = match_all(&Selector::role("tab", "Live Reports"));
        assert!(custom.contains("[role=tab]"));
    }

    #[test]
    fn select_option_matches_on_label() {
        let locator = Locator::new("fund", Selector::css("select"));
        let script = select_option(&locator, "Steerhead Alternative Energy Fund");
        assert!(script.contains(r#""Steerhead Alternative Energy Fund""#));
        assert!(script.contains("new Event('change'"));
    }
}
