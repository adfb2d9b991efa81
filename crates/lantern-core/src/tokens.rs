//! Usage tokens and yield metadata scanned out of template source.
//!
//! Scanning is lexical: mustache heads (`{{format-date x}}`,
//! `{{#power-select}}`), sub-expression heads inside mustaches
//! (`(is-admin user)`) and angle-bracket invocations (`<UserCard />`,
//! `<Ui::Button>`) become dasherized symbol names. Paths (`card.title`) and
//! names bound by an enclosing `as |...|` are locals, not symbols.

use std::sync::LazyLock;

use indexmap::IndexSet;
use regex::Regex;
use serde::{Deserialize, Serialize};

/// Name reported for an unnamed `{{yield}}`.
pub const DEFAULT_YIELD: &str = "default";

const KEYWORDS: [&str; 20] = [
    "if", "unless", "each", "each-in", "let", "with", "else", "yield", "outlet", "component",
    "helper", "modifier", "has-block", "has-block-params", "on", "fn", "array", "hash",
    "mut", "debugger",
];

const VOID_ELEMENTS: [&str; 13] = [
    "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "source",
    "track", "wbr",
];

/// Comments, mustaches, and opening or closing tags, in source order. Tag
/// attributes may contain mustaches holding `>`.
static TEMPLATE_PART: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?s)\{\{!--.*?--\}\}|\{\{!.*?\}\}|<!--.*?-->|\{\{(?P<mustache>.*?)\}\}|<(?P<close>/)?(?P<tag>[A-Za-z@:][\w:.\-@]*)(?P<attrs>(?:\{\{.*?\}\}|[^>])*)>",
    )
    .expect("valid pattern")
});
static MUSTACHE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)\{\{(.*?)\}\}").expect("valid pattern"));
static HEAD: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\s*([A-Za-z][A-Za-z0-9_\-/:]*)(\.?)").expect("valid pattern")
});
static SUBEXPR_HEAD: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\(\s*([A-Za-z][A-Za-z0-9_\-/:]*)(\.?)").expect("valid pattern")
});
static BLOCK_PARAMS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\bas\s*\|([^|]*)\|").expect("valid pattern"));
static YIELD: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\{\{~?\s*yield\b([^}]*)\}\}").expect("valid pattern"));
static YIELD_TO: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"to\s*=\s*["']([\w\-]+)["']"#).expect("valid pattern"));
static NAMED_BLOCK: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"<:([A-Za-z][\w\-]*)").expect("valid pattern"));

/// Extracted data for one template.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TemplateTokens {
    /// Referenced component and helper names, first occurrence order.
    pub tokens: Vec<String>,
    /// Yield targets: `default` for a bare `{{yield}}`, otherwise the `to=` value.
    pub yields: Vec<String>,
    /// Named blocks passed to invoked components (`<:header>`).
    pub named_blocks: Vec<String>,
}

impl TemplateTokens {
    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty() && self.yields.is_empty() && self.named_blocks.is_empty()
    }
}

/// Scan `source` for usage tokens.
pub fn extract(source: &str) -> TemplateTokens {
    let mut scanner = Scanner::default();
    for caps in TEMPLATE_PART.captures_iter(source) {
        if let Some(body) = caps.name("mustache") {
            scanner.mustache(body.as_str());
        } else if let Some(tag) = caps.name("tag") {
            if caps.name("close").is_some() {
                scanner.close(&element_closer(tag.as_str()));
            } else {
                let attrs = caps.name("attrs").map_or("", |m| m.as_str());
                scanner.open_tag(tag.as_str(), attrs);
            }
        }
    }

    let mut yields = IndexSet::new();
    for caps in YIELD.captures_iter(source) {
        let args = caps.get(1).map_or("", |m| m.as_str());
        let target = YIELD_TO
            .captures(args)
            .and_then(|c| c.get(1))
            .map_or(DEFAULT_YIELD, |m| m.as_str());
        yields.insert(target.to_string());
    }

    let named_blocks: IndexSet<String> = NAMED_BLOCK
        .captures_iter(source)
        .filter_map(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
        .collect();

    TemplateTokens {
        tokens: scanner.tokens.into_iter().collect(),
        yields: yields.into_iter().collect(),
        named_blocks: named_blocks.into_iter().collect(),
    }
}

/// An open block or element and the names it binds.
struct Scope {
    closer: String,
    params: Vec<String>,
}

#[derive(Default)]
struct Scanner {
    scopes: Vec<Scope>,
    tokens: IndexSet<String>,
}

impl Scanner {
    fn is_bound(&self, name: &str) -> bool {
        self.scopes
            .iter()
            .any(|scope| scope.params.iter().any(|param| param == name))
    }

    fn record(&mut self, name: &str, path_follows: bool) {
        if path_follows || name == "this" || KEYWORDS.contains(&name) || self.is_bound(name) {
            return;
        }
        self.tokens.insert(name.replace("::", "/"));
    }

    fn mustache(&mut self, body: &str) {
        let body = body
            .trim_start_matches(['~', '{'])
            .trim_end_matches(['~', '}'])
            .trim_start();
        let (marker, rest) = match body.as_bytes().first() {
            Some(b'#') => (Some('#'), &body[1..]),
            Some(b'/') => (Some('/'), &body[1..]),
            _ => (None, body),
        };
        let head = HEAD.captures(rest).and_then(|caps| {
            let name = caps.get(1)?.as_str();
            Some((name, caps.get(2).is_some_and(|dot| !dot.is_empty())))
        });

        if marker == Some('/') {
            if let Some((name, _)) = head {
                self.close(name);
            }
            return;
        }
        if let Some((name, path_follows)) = head {
            self.record(name, path_follows);
        }
        for caps in SUBEXPR_HEAD.captures_iter(rest) {
            if let Some(name) = caps.get(1) {
                let path_follows = caps.get(2).is_some_and(|dot| !dot.is_empty());
                self.record(name.as_str(), path_follows);
            }
        }
        if marker == Some('#')
            && let Some((name, _)) = head
        {
            self.scopes.push(Scope {
                closer: name.to_string(),
                params: block_params(rest),
            });
        }
    }

    fn open_tag(&mut self, tag: &str, attrs: &str) {
        if is_component_tag(tag) && !self.is_bound(tag) {
            self.tokens.insert(dasherize_component(tag));
        }
        for caps in MUSTACHE.captures_iter(attrs) {
            if let Some(body) = caps.get(1) {
                self.mustache(body.as_str());
            }
        }
        if attrs.trim_end().ends_with('/') || VOID_ELEMENTS.contains(&tag) {
            return;
        }
        self.scopes.push(Scope {
            closer: element_closer(tag),
            params: block_params(&MUSTACHE.replace_all(attrs, "")),
        });
    }

    /// Pop back to the innermost scope opened by `closer`. Unmatched closers
    /// leave the stack alone.
    fn close(&mut self, closer: &str) {
        if let Some(pos) = self.scopes.iter().rposition(|scope| scope.closer == closer) {
            self.scopes.truncate(pos);
        }
    }
}

fn element_closer(tag: &str) -> String {
    format!("<{tag}")
}

fn is_component_tag(tag: &str) -> bool {
    if tag.starts_with([':', '@']) || tag.contains('.') {
        return false;
    }
    tag.starts_with(|c: char| c.is_ascii_uppercase()) || tag.contains("::")
}

fn block_params(text: &str) -> Vec<String> {
    BLOCK_PARAMS
        .captures(text)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().split_whitespace().map(str::to_string).collect())
        .unwrap_or_default()
}

/// `Ui::FancyButton` → `ui/fancy-button`.
pub fn dasherize_component(name: &str) -> String {
    name.split("::")
        .map(dasherize)
        .collect::<Vec<_>>()
        .join("/")
}

fn dasherize(segment: &str) -> String {
    let mut out = String::with_capacity(segment.len() + 4);
    let mut prev_lower_or_digit = false;
    for ch in segment.chars() {
        if ch.is_ascii_uppercase() {
            if prev_lower_or_digit {
                out.push('-');
            }
            out.push(ch.to_ascii_lowercase());
            prev_lower_or_digit = false;
        } else if ch == '_' {
            out.push('-');
            prev_lower_or_digit = false;
        } else {
            out.push(ch);
            prev_lower_or_digit = ch.is_ascii_lowercase() || ch.is_ascii_digit();
        }
    }
    out
}
