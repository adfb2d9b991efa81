//! Classic layout: the directory decides the type
//! (`app/components/foo-bar.js`, `app/templates/posts/index.hbs`).

use crate::symbol::{MatchResult, SymbolType};

use super::{LayoutRule, PathMatcher, Rule};

const CLASSIC_TABLE: &[LayoutRule] = &[
    LayoutRule {
        symbol_type: SymbolType::Adapter,
        anchor: "/adapters/",
        rules: &[Rule::Has("/adapters/")],
    },
    LayoutRule {
        symbol_type: SymbolType::Serializer,
        anchor: "/serializers/",
        rules: &[Rule::Has("/serializers/")],
    },
    LayoutRule {
        symbol_type: SymbolType::Controller,
        anchor: "/controllers/",
        rules: &[Rule::Has("/controllers/")],
    },
    LayoutRule {
        symbol_type: SymbolType::Helper,
        anchor: "/helpers/",
        rules: &[Rule::Has("/helpers/")],
    },
    LayoutRule {
        symbol_type: SymbolType::Model,
        anchor: "/models/",
        rules: &[Rule::Has("/models/")],
    },
    LayoutRule {
        symbol_type: SymbolType::Transform,
        anchor: "/transforms/",
        rules: &[Rule::Has("/transforms/")],
    },
    LayoutRule {
        symbol_type: SymbolType::Service,
        anchor: "/services/",
        rules: &[Rule::Has("/services/")],
    },
    LayoutRule {
        symbol_type: SymbolType::Component,
        anchor: "/components/",
        rules: &[Rule::Has("/components/")],
    },
    LayoutRule {
        symbol_type: SymbolType::Modifier,
        anchor: "/modifiers/",
        rules: &[Rule::Has("/modifiers/")],
    },
    LayoutRule {
        symbol_type: SymbolType::Template,
        anchor: "/templates/",
        rules: &[Rule::Has("/templates/"), Rule::Not("/templates/components/")],
    },
    LayoutRule {
        symbol_type: SymbolType::Route,
        anchor: "/routes/",
        rules: &[Rule::Has("/routes/"), Rule::Not("/components/")],
    },
    LayoutRule {
        symbol_type: SymbolType::Util,
        anchor: "/utils/",
        rules: &[Rule::Has("/utils/")],
    },
];

/// Trailing segments that name a file inside a symbol's directory rather
/// than the symbol itself.
const TRAILING_SEGMENTS: [&str; 10] = [
    "component",
    "template",
    "index",
    "module",
    "styles",
    "component-test",
    "template-test",
    "index-test",
    "module-test",
    "styles-test",
];

#[derive(Debug, Clone, Copy, Default)]
pub struct ClassicMatcher;

impl PathMatcher for ClassicMatcher {
    fn classify(&self, relative_path: &str) -> Option<MatchResult> {
        let path = super::anchored(relative_path);
        if super::is_ignored(&path) {
            return None;
        }
        let (stem, extension) = super::split_extension(&path)?;
        let kind = super::file_kind(&path, stem, extension)?;
        let rule = super::first_match(CLASSIC_TABLE, &path)?;
        let name = symbol_name(&path, stem, rule)?;

        Some(MatchResult {
            symbol_type: rule.symbol_type,
            name,
            scope: super::scope_of(&path),
            kind,
        })
    }
}

fn symbol_name(path: &str, stem: &str, rule: LayoutRule) -> Option<String> {
    let start = stem.find(rule.anchor)? + rule.anchor.len();
    let mut name = &stem[start..];
    name = name.strip_suffix(".module").unwrap_or(name);

    // Route-like names keep `index`: `posts/index` is its own route.
    let keeps_index = matches!(
        rule.symbol_type,
        SymbolType::Route | SymbolType::Controller | SymbolType::Template
    );
    loop {
        let Some((head, last)) = name.rsplit_once('/') else {
            break;
        };
        let strippable = TRAILING_SEGMENTS.contains(&last)
            && !(keeps_index && (last == "index" || last == "index-test"));
        if !strippable {
            break;
        }
        name = head;
    }

    if path.contains("/tests/") {
        name = name.strip_suffix("-test").unwrap_or(name);
    }

    if name.is_empty() {
        None
    } else {
        Some(name.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::symbol::{FileKind, Scope};
    use pretty_assertions::assert_eq;

    fn classify(path: &str) -> Option<MatchResult> {
        ClassicMatcher.classify(path)
    }

    #[test]
    fn test_component_script_in_folder() {
        assert_eq!(
            classify("app/components/foo/component.js"),
            Some(MatchResult {
                symbol_type: SymbolType::Component,
                name: "foo".to_string(),
                scope: Scope::Application,
                kind: FileKind::Script,
            })
        );
    }

    #[test]
    fn test_component_names_drop_trailing_segments() {
        let cases = [
            ("app/components/foo-bar.js", "foo-bar"),
            ("app/components/foo-bar.hbs", "foo-bar"),
            ("app/components/foo/bar/template.hbs", "foo/bar"),
            ("app/components/foo/index.ts", "foo"),
            ("app/components/foo/styles.css", "foo"),
            ("app/components/foo.module.css", "foo"),
            ("app/components/foo/bar/index.js", "foo/bar"),
            ("app/templates/components/foo-bar.hbs", "foo-bar"),
        ];
        for (path, expected) in cases {
            let result = classify(path).unwrap_or_else(|| panic!("{path} unclassified"));
            assert_eq!(result.symbol_type, SymbolType::Component, "{path}");
            assert_eq!(result.name, expected, "{path}");
            assert!(!result.name.contains('.'), "{path}");
        }
    }

    #[test]
    fn test_test_files() {
        let result = classify("tests/integration/components/foo-bar-test.js").unwrap();
        assert_eq!(result.symbol_type, SymbolType::Component);
        assert_eq!(result.name, "foo-bar");
        assert_eq!(result.kind, FileKind::Test);

        let result = classify("tests/unit/services/session-test.ts").unwrap();
        assert_eq!(result.symbol_type, SymbolType::Service);
        assert_eq!(result.name, "session");
    }

    #[test]
    fn test_test_suffix_kept_outside_tests_dir() {
        let result = classify("app/helpers/a-b-test.js").unwrap();
        assert_eq!(result.name, "a-b-test");
        assert_eq!(result.kind, FileKind::Test);
    }

    #[test]
    fn test_route_templates_keep_index() {
        let result = classify("app/templates/posts/index.hbs").unwrap();
        assert_eq!(result.symbol_type, SymbolType::Template);
        assert_eq!(result.name, "posts/index");

        let result = classify("app/routes/posts/index.js").unwrap();
        assert_eq!(result.symbol_type, SymbolType::Route);
        assert_eq!(result.name, "posts/index");

        let result = classify("app/controllers/application.js").unwrap();
        assert_eq!(result.symbol_type, SymbolType::Controller);
        assert_eq!(result.name, "application");
    }

    #[test]
    fn test_route_excludes_components() {
        // `/routes/` under a component directory is still a component.
        let result = classify("app/components/routes/list.js").unwrap();
        assert_eq!(result.symbol_type, SymbolType::Component);
        assert_eq!(result.name, "routes/list");
    }

    #[test]
    fn test_first_declared_type_wins() {
        // Both `/helpers/` and `/components/` match; helpers is declared first.
        let result = classify("app/helpers/components/x.js").unwrap();
        assert_eq!(result.symbol_type, SymbolType::Helper);
        assert_eq!(result.name, "components/x");
    }

    #[test]
    fn test_addon_scope() {
        for path in [
            "addon/components/x.js",
            "lib/my-engine/addon/helpers/y.js",
            "node_modules/ui/addon/modifiers/z.js",
            "tests/dummy/app/services/w.js",
        ] {
            assert_eq!(classify(path).unwrap().scope, Scope::Addon, "{path}");
        }
        assert_eq!(
            classify("app/services/w.js").unwrap().scope,
            Scope::Application
        );
    }

    #[test]
    fn test_unclassifiable() {
        assert!(classify("app/app.js").is_none());
        assert!(classify("README.md").is_none());
        assert!(classify("app/components/readme.md").is_none());
        assert!(classify("dist/components/foo.js").is_none());
        assert!(classify("app/components/__generated__.js").is_none());
        assert!(classify("app/components/").is_none());
        assert!(classify("").is_none());
    }

    #[test]
    fn test_other_types() {
        let cases = [
            ("app/models/user.js", SymbolType::Model, "user"),
            ("app/transforms/date.js", SymbolType::Transform, "date"),
            ("app/modifiers/on-resize.ts", SymbolType::Modifier, "on-resize"),
            ("app/adapters/application.js", SymbolType::Adapter, "application"),
            ("app/utils/format.js", SymbolType::Util, "format"),
        ];
        for (path, ty, name) in cases {
            let result = classify(path).unwrap();
            assert_eq!((result.symbol_type, result.name.as_str()), (ty, name));
        }
    }
}
