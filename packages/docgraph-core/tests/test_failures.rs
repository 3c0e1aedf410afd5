//! Integration tests for failure isolation
//!
//! A broken file only affects itself: importers see an import error,
//! siblings are analyzed normally, and nothing fails the whole request.

mod common;

use common::*;
use docgraph_core::{codes, QueryOptions};
use pretty_assertions::assert_eq;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

#[tokio::test]
async fn test_partial_failure_is_isolated() {
    let (analyzer, _) = fixture_analyzer(&[
        ("main.doc", "import missing.doc\nimport ok.doc\nfeature Main"),
        ("ok.doc", "feature Ok"),
    ]);

    let analysis = analyzer
        .analyze(&["main.doc", "absent.doc"])
        .await
        .expect("per-file failures are not request failures");

    let main = analysis.get_document("main.doc").unwrap();
    let imports = main.get_imports(&QueryOptions::local());
    assert_eq!(imports.len(), 2);

    let broken = imports[0].error().expect("missing import is reported");
    assert_eq!(broken.code, codes::COULD_NOT_LOAD);
    assert_eq!(broken.source_range.file.as_str(), "main.doc");
    assert!(imports[1].error().is_none());
    assert_eq!(declared_names(&main, &QueryOptions::imported()), vec!["Ok", "Main"]);

    let absent = analysis.get_document("absent.doc").unwrap_err();
    assert_eq!(absent.code, codes::COULD_NOT_LOAD);

    assert_eq!(analysis.documents().len(), 1);
    assert_eq!(
        warning_codes(&analysis.get_warnings()),
        vec![codes::COULD_NOT_LOAD, codes::COULD_NOT_LOAD]
    );
}

#[tokio::test]
async fn test_scanner_panic_becomes_warning() {
    let (analyzer, _) = fixture_analyzer(&[
        ("boom.doc", "feature Before\npanic"),
        ("user.doc", "import boom.doc\nfeature User"),
    ]);

    let analysis = analyzer.analyze(&["boom.doc", "user.doc"]).await.unwrap();

    let boom = analysis.get_document("boom.doc").unwrap_err();
    assert_eq!(boom.code, codes::INTERNAL_SCANNING_ERROR);
    assert!(boom.message.contains("scanner exploded on line 2"));

    let user = analysis.get_document("user.doc").unwrap();
    let import = &user.get_imports(&QueryOptions::local())[0];
    assert_eq!(import.error().map(|w| w.code), Some(codes::INTERNAL_SCANNING_ERROR.to_string()));
    assert_eq!(declared_names(&user, &QueryOptions::imported()), vec!["User"]);
}

#[tokio::test]
async fn test_scanner_error_becomes_warning() {
    let (analyzer, _) = fixture_analyzer(&[("bad.doc", "feature Fine\nerror")]);

    let analysis = analyzer.analyze(&["bad.doc"]).await.unwrap();
    let warning = analysis.get_document("bad.doc").unwrap_err();

    assert_eq!(warning.code, codes::COULD_NOT_SCAN);
    assert!(warning.message.contains("scanner gave up on line 2"));
}

#[tokio::test]
async fn test_parser_warning_is_kept_as_is() {
    let (analyzer, _) = fixture_analyzer(&[("broken.doc", "feature Fine\n!!parse-error")]);

    let analysis = analyzer.analyze(&["broken.doc"]).await.unwrap();
    let warning = analysis.get_document("broken.doc").unwrap_err();

    assert_eq!(warning.code, codes::COULD_NOT_PARSE);
    assert_eq!(warning.message, "fixture parse error on line 2");
    assert_eq!(warning.source_range.start.line, 1);
}

#[tokio::test]
async fn test_unknown_file_type() {
    let (analyzer, loader) = fixture_analyzer(&[("notes.txt", "plain text")]);

    let analysis = analyzer.analyze(&["notes.txt"]).await.unwrap();
    let warning = analysis.get_document("notes.txt").unwrap_err();

    assert_eq!(warning.code, codes::COULD_NOT_PARSE);
    assert_eq!(loader.load_count("notes.txt"), 1);
}

#[tokio::test]
async fn test_unresolvable_request() {
    let (analyzer, loader) = fixture_analyzer(&[]);

    let analysis = analyzer.analyze(&["https://example.com/a.doc"]).await.unwrap();
    let warning = analysis.get_document("https://example.com/a.doc").unwrap_err();

    assert_eq!(warning.code, codes::COULD_NOT_LOAD);
    assert_eq!(warning_codes(&analysis.get_warnings()), vec![codes::COULD_NOT_LOAD]);
    assert_eq!(loader.total_loads(), 0);
}

#[tokio::test]
async fn test_precancelled_request_starts_nothing() {
    let (analyzer, loader) = fixture_analyzer(&[("a.doc", "feature A")]);
    let cancel = CancellationToken::new();
    cancel.cancel();

    let analysis = analyzer.analyze_with_cancel(&["a.doc"], cancel).await.unwrap();

    assert_eq!(
        analysis.get_document("a.doc").unwrap_err().code,
        codes::UNABLE_TO_ANALYZE
    );
    assert_eq!(loader.total_loads(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_cancelled_work_is_reused() {
    docgraph_core::telemetry::init_test_tracing();
    let (analyzer, loader) = AnalyzerBuilder::new()
        .with_file("slow.doc", "feature Slow")
        .with_latency(Duration::from_millis(200))
        .build();

    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(10)).await;
        trigger.cancel();
    });

    let cancelled = analyzer.analyze_with_cancel(&["slow.doc"], cancel).await.unwrap();
    assert_eq!(
        cancelled.get_document("slow.doc").unwrap_err().code,
        codes::UNABLE_TO_ANALYZE
    );

    let finished = analyzer.analyze(&["slow.doc"]).await.unwrap();
    let slow = finished.get_document("slow.doc").unwrap();
    assert_eq!(declared_names(&slow, &QueryOptions::local()), vec!["Slow"]);
    assert_eq!(loader.load_count("slow.doc"), 1);
}
