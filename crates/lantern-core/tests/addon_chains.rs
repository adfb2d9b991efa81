//! End-to-end addon resolution over an on-disk project.

use std::sync::Arc;

use lantern_core::addon::{AddonError, AddonHandler, Hook, ProviderRequest};
use lantern_core::{AddonCatalog, BoxFuture, Capability, DocumentRequest, LocalFs, Server};
use lantern_test_utils::config::TestConfigBuilder;
use lantern_test_utils::fixture::FixtureProject;
use lantern_test_utils::tracing_setup::init_test_tracing;
use lsp_types::CompletionItem;
use pretty_assertions::assert_eq;

/// Appends one completion labelled with its package name.
struct Appender(&'static str);

impl AddonHandler for Appender {
    fn implements(&self, hook: Hook) -> bool {
        hook == Hook::Complete
    }

    fn on_complete<'a>(
        &'a self,
        _request: &'a ProviderRequest,
        mut results: Vec<CompletionItem>,
    ) -> BoxFuture<'a, Result<Vec<CompletionItem>, AddonError>> {
        Box::pin(async move {
            results.push(CompletionItem {
                label: self.0.to_string(),
                ..CompletionItem::default()
            });
            Ok(results)
        })
    }
}

/// Drops everything it is given, then fails.
struct Failing;

impl AddonHandler for Failing {
    fn implements(&self, hook: Hook) -> bool {
        hook == Hook::Complete
    }

    fn on_complete<'a>(
        &'a self,
        _request: &'a ProviderRequest,
        mut results: Vec<CompletionItem>,
    ) -> BoxFuture<'a, Result<Vec<CompletionItem>, AddonError>> {
        Box::pin(async move {
            results.clear();
            Err(AddonError::Provider("lookup failed".to_string()))
        })
    }
}

fn catalog() -> AddonCatalog {
    let mut catalog = AddonCatalog::new();
    for name in ["addon-a", "addon-b", "addon-c"] {
        catalog.register(name, "index", move || {
            Ok(Arc::new(Appender(name)) as Arc<dyn AddonHandler>)
        });
    }
    catalog.register("addon-flaky", "index", || {
        Ok(Arc::new(Failing) as Arc<dyn AddonHandler>)
    });
    catalog
}

const COMPLETION: &str = r#"{"completionProvider": true}"#;

fn extension(before: &[&str]) -> String {
    let before: Vec<String> = before.iter().map(|b| format!("\"{b}\"")).collect();
    format!(
        r#"{{"entry": "index", "capabilities": {COMPLETION}, "before": [{}]}}"#,
        before.join(", ")
    )
}

fn project() -> FixtureProject {
    // Listed C, B, A; constraints demand A, B, C.
    FixtureProject::new("app")
        .with_manifest(
            r#"{"name": "app", "dependencies": {"addon-c": "*", "addon-b": "*", "addon-a": "*"}}"#,
        )
        .with_extension_addon("addon-c", &extension(&[]))
        .with_extension_addon("addon-b", &extension(&["addon-c"]))
        .with_extension_addon("addon-a", &extension(&["addon-b"]))
}

fn server() -> Server {
    let config = TestConfigBuilder::new().builtin_providers(false).build();
    Server::new(config, Arc::new(LocalFs), catalog())
}

#[tokio::test]
async fn test_before_constraints_order_the_chain() {
    init_test_tracing();
    let fixture = project();
    let server = server();
    let project = server.load_project(fixture.root(), None).await.unwrap();

    let names: Vec<String> = project
        .providers_for(Capability::Completion)
        .iter()
        .map(|link| link.package.clone())
        .collect();
    assert_eq!(names, vec!["addon-a", "addon-b", "addon-c"]);

    let request = DocumentRequest::new(
        fixture.path("app/templates/index.hbs"),
        lsp_types::Position::new(0, 0),
    );
    let labels: Vec<String> = server
        .complete(request)
        .await
        .into_iter()
        .map(|item| item.label)
        .collect();
    assert_eq!(labels, vec!["addon-a", "addon-b", "addon-c"]);
}

#[tokio::test]
async fn test_failing_provider_passes_prior_results_through() {
    init_test_tracing();
    let fixture = project()
        .with_manifest(
            r#"{"name": "app", "dependencies": {"addon-a": "*", "addon-b": "*", "addon-c": "*", "addon-flaky": "*"}}"#,
        )
        .with_extension_addon("addon-flaky", &extension(&["addon-c"]));
    let server = server();
    server.load_project(fixture.root(), None).await.unwrap();

    let request = DocumentRequest::new(
        fixture.path("app/templates/index.hbs"),
        lsp_types::Position::new(0, 0),
    );
    let labels: Vec<String> = server
        .complete(request)
        .await
        .into_iter()
        .map(|item| item.label)
        .collect();
    // addon-flaky runs after addon-b and before addon-c; its failure is
    // invisible to the results.
    assert_eq!(labels, vec!["addon-a", "addon-b", "addon-c"]);
}

#[tokio::test]
async fn test_unregistered_extension_reports_init_issue() {
    init_test_tracing();
    let fixture = project()
        .with_manifest(
            r#"{"name": "app", "dependencies": {"addon-a": "*", "addon-ghost": "*"}}"#,
        )
        .with_extension_addon("addon-ghost", &extension(&[]));
    let server = server();
    let project = server.load_project(fixture.root(), None).await.unwrap();

    let issues = project.init_issues();
    assert_eq!(issues.len(), 1);
    assert!(issues[0].contains("addon-ghost"));

    // The rest of the chain still works.
    let names: Vec<String> = project
        .providers_for(Capability::Completion)
        .iter()
        .map(|link| link.package.clone())
        .collect();
    assert_eq!(names, vec!["addon-a"]);
    let summary = project.providers().summary();
    assert_eq!(summary.init_functions, vec!["addon-ghost"]);
}
