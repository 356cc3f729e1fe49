//! Product objects assigned inside inline page scripts
//!
//! Storefront themes commonly embed the product as a JavaScript assignment
//! (`var product = {...};`, `window.product = {...};`, ...). Each known form
//! is a `ScriptPattern`: a regex locating the assignment and a parser for the
//! object literal that follows it. Patterns are tried in list order and new
//! ones are appended at the end.

use regex::Regex;
use scraper::{Html, Selector};
use serde_json::Value;
use std::sync::OnceLock;

/// One way a product object may be embedded in a script
pub struct ScriptPattern {
    pub name: &'static str,

    /// Matches the assignment up to and including the opening `{`
    pub matcher: Regex,

    /// Parses the text starting at the opening `{`
    pub parser: fn(&str) -> Option<Value>,
}

/// Assignment forms in priority order
const PATTERN_SOURCES: &[(&str, &str)] = &[
    ("var product", r"var\s+product\s*=\s*\{"),
    ("window.product", r"window\.product\s*=\s*\{"),
    ("Product", r"Product\s*=\s*\{"),
    ("product:", r"\bproduct:\s*\{"),
    ("\"product\":", r#""product"\s*:\s*\{"#),
    ("productData", r"productData\s*=\s*\{"),
    ("item:", r"\bitem:\s*\{"),
];

/// The ordered pattern list, compiled once
pub fn script_patterns() -> &'static [ScriptPattern] {
    static PATTERNS: OnceLock<Vec<ScriptPattern>> = OnceLock::new();
    PATTERNS.get_or_init(|| {
        PATTERN_SOURCES
            .iter()
            .filter_map(|&(name, source)| match Regex::new(source) {
                Ok(matcher) => Some(ScriptPattern {
                    name,
                    matcher,
                    parser: parse_object_literal,
                }),
                Err(e) => {
                    tracing::error!("Invalid script pattern {}: {}", name, e);
                    None
                }
            })
            .collect()
    })
}

/// A product object found in a script
#[derive(Debug, Clone, PartialEq)]
pub struct ScriptMatch {
    /// Name of the pattern that matched
    pub pattern: &'static str,
    pub value: Value,
}

/// Finds the first embedded product object in an HTML document
///
/// Inline scripts are visited in document order; within a script the
/// patterns are tried in priority order. The first occurrence that parses
/// as a JSON object wins. External scripts and JSON-LD blocks are skipped.
pub fn find_script_product(document: &Html) -> Option<ScriptMatch> {
    let selector = Selector::parse("script").ok()?;

    for element in document.select(&selector) {
        if element.value().attr("src").is_some() {
            continue;
        }
        if element
            .value()
            .attr("type")
            .map(|t| t.eq_ignore_ascii_case("application/ld+json"))
            .unwrap_or(false)
        {
            continue;
        }

        let content = element.text().collect::<String>();
        let content = content.trim();
        if content.is_empty() {
            continue;
        }

        if let Some(found) = match_script(content) {
            return Some(found);
        }
    }

    None
}

/// Applies the pattern list to a single script body
pub fn match_script(content: &str) -> Option<ScriptMatch> {
    for pattern in script_patterns() {
        for m in pattern.matcher.find_iter(content) {
            // The match ends just after the opening brace
            let start = m.end() - 1;
            if let Some(value) = (pattern.parser)(&content[start..]) {
                tracing::debug!(pattern = pattern.name, "Script product object found");
                return Some(ScriptMatch {
                    pattern: pattern.name,
                    value,
                });
            }
        }
    }
    None
}

/// Parses the balanced `{...}` at the start of `text` as a JSON object
pub fn parse_object_literal(text: &str) -> Option<Value> {
    let literal = balanced_object(text)?;
    match serde_json::from_str::<Value>(literal) {
        Ok(value) if value.is_object() => Some(value),
        _ => None,
    }
}

/// Returns the prefix of `text` forming a brace-balanced object
///
/// Braces inside single- or double-quoted strings are ignored. `None` when
/// `text` does not start with `{` or the object never closes.
fn balanced_object(text: &str) -> Option<&str> {
    if !text.starts_with('{') {
        return None;
    }

    let mut depth = 0usize;
    let mut quote: Option<char> = None;
    let mut escaped = false;

    for (i, c) in text.char_indices() {
        if let Some(q) = quote {
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == q {
                quote = None;
            }
            continue;
        }

        match c {
            '"' | '\'' => quote = Some(c),
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(&text[..=i]);
                }
            }
            _ => {}
        }
    }

    None
}
