//! Pod layout: the file name decides the type and the enclosing directory
//! is the symbol (`app/pods/foo-bar/service.js`).

use crate::symbol::{MatchResult, SymbolType};

use super::{LayoutRule, PathMatcher, Rule};

const POD_TABLE: &[LayoutRule] = &[
    LayoutRule {
        symbol_type: SymbolType::Adapter,
        anchor: "/adapter.",
        rules: &[Rule::Has("/adapter.")],
    },
    LayoutRule {
        symbol_type: SymbolType::Serializer,
        anchor: "/serializer.",
        rules: &[Rule::Has("/serializer.")],
    },
    LayoutRule {
        symbol_type: SymbolType::Controller,
        anchor: "/controller.",
        rules: &[Rule::Has("/controller.")],
    },
    LayoutRule {
        symbol_type: SymbolType::Helper,
        anchor: "/helper.",
        rules: &[Rule::Has("/helper.")],
    },
    LayoutRule {
        symbol_type: SymbolType::Model,
        anchor: "/model.",
        rules: &[Rule::Has("/model.")],
    },
    LayoutRule {
        symbol_type: SymbolType::Transform,
        anchor: "/transform.",
        rules: &[Rule::Has("/transform.")],
    },
    LayoutRule {
        symbol_type: SymbolType::Service,
        anchor: "/service.",
        rules: &[Rule::Has("/service.")],
    },
    LayoutRule {
        symbol_type: SymbolType::Component,
        anchor: "/component.",
        rules: &[Rule::Has("/component.")],
    },
    LayoutRule {
        symbol_type: SymbolType::Component,
        anchor: "/template.",
        rules: &[Rule::Has("/components/"), Rule::Has("/template.")],
    },
    LayoutRule {
        symbol_type: SymbolType::Component,
        anchor: "/styles.",
        rules: &[Rule::Has("/components/"), Rule::Has("/styles.")],
    },
    LayoutRule {
        symbol_type: SymbolType::Modifier,
        anchor: "/modifier.",
        rules: &[Rule::Has("/modifier.")],
    },
    LayoutRule {
        symbol_type: SymbolType::Template,
        anchor: "/template.",
        rules: &[Rule::Has("/template.")],
    },
    LayoutRule {
        symbol_type: SymbolType::Route,
        anchor: "/route.",
        rules: &[Rule::Has("/route.")],
    },
];

/// Roots a pod name can be sliced from when the configured prefix is absent
/// from the path.
const FALLBACK_ROOTS: [&str; 2] = ["app", "addon"];

#[derive(Debug, Clone, Default)]
pub struct PodMatcher {
    prefix: Option<String>,
}

impl PodMatcher {
    /// `prefix` is the pod directory relative to the project root
    /// (`app/pods`).
    pub fn new(prefix: Option<&str>) -> Self {
        Self {
            prefix: prefix
                .map(|p| p.trim_matches('/').to_string())
                .filter(|p| !p.is_empty()),
        }
    }

    pub fn prefix(&self) -> Option<&str> {
        self.prefix.as_deref()
    }

    fn pod_name(&self, path: &str, rule: LayoutRule) -> Option<String> {
        let head = &path[..path.rfind(rule.anchor)?];
        let with_slash = format!("{head}/");

        let start = self
            .prefix
            .iter()
            .map(String::as_str)
            .chain(FALLBACK_ROOTS)
            .find_map(|root| {
                let marker = format!("/{root}/");
                with_slash.find(&marker).map(|idx| idx + marker.len())
            })?;
        if start > head.len() {
            return None;
        }

        let name = &head[start..];
        let name = name.strip_prefix("components/").unwrap_or(name);
        if name.is_empty() {
            None
        } else {
            Some(name.to_string())
        }
    }
}

impl PathMatcher for PodMatcher {
    fn classify(&self, relative_path: &str) -> Option<MatchResult> {
        let path = super::anchored(relative_path);
        if super::is_ignored(&path) {
            return None;
        }
        let (stem, extension) = super::split_extension(&path)?;
        let kind = super::file_kind(&path, stem, extension)?;
        let rule = super::first_match(POD_TABLE, &path)?;
        let name = self.pod_name(&path, rule)?;

        Some(MatchResult {
            symbol_type: rule.symbol_type,
            name,
            scope: super::scope_of(&path),
            kind,
        })
    }
}
