//! Template selection E2E tests.
//!
//! Covers the build -> persist -> load -> select path with the fixture
//! provider, including the single auto-repair on a missing or corrupt
//! index cache.

use std::path::Path;
use std::sync::Arc;

use pretty_assertions::assert_eq;

use e2e_tests::{shared_provider, TestHarness, BLUE, GREEN, MOCK_MODEL, RED};
use memeforge_index::{load, BuildConfig, IndexBuilder, IndexError, TemplateSelector};

/// Single template, query close to it: score is cos([1,0], [0.9,0.1]).
#[test]
fn test_single_template_similarity() {
    let harness = TestHarness::new();
    harness.add_template("drake.jpg", RED, 32, 32);

    let selector = TemplateSelector::initialize(&harness.selector_config(), shared_provider())
        .expect("selector should build the missing index");

    let best = selector.select("drake hotline bling").unwrap();
    assert!(best.template_id.ends_with("drake.jpg"));
    let expected = 0.9 / (0.9f32 * 0.9 + 0.1 * 0.1).sqrt();
    assert!(
        (best.score - expected).abs() < 1e-4,
        "score {} != {}",
        best.score,
        expected
    );
    assert!((best.score - 0.9939).abs() < 1e-3);
}

#[test]
fn test_select_is_deterministic() {
    let harness = TestHarness::new();
    harness.add_template("a_red.png", RED, 16, 16);
    harness.add_template("b_blue.png", BLUE, 16, 16);
    harness.add_template("c_green.png", GREEN, 16, 16);

    let selector =
        TemplateSelector::initialize(&harness.selector_config(), shared_provider()).unwrap();
    let first = selector.select("such wow very doge").unwrap();
    assert!(first.template_id.ends_with("b_blue.png"));
    for _ in 0..10 {
        assert_eq!(selector.select("such wow very doge").unwrap(), first);
    }

    // a fresh selector over the same persisted index agrees
    let reloaded =
        TemplateSelector::initialize(&harness.selector_config(), shared_provider()).unwrap();
    assert_eq!(reloaded.select("such wow very doge").unwrap(), first);
}

#[test]
fn test_tie_goes_to_first_template_in_order() {
    let harness = TestHarness::new();
    // same embedding for both; scan order is by file name
    harness.add_template("alpha.png", GREEN, 16, 16);
    harness.add_template("beta.png", GREEN, 16, 16);

    let selector =
        TemplateSelector::initialize(&harness.selector_config(), shared_provider()).unwrap();
    let best = selector.select("balanced opinion").unwrap();
    assert!(best.template_id.ends_with("alpha.png"));
    assert_eq!(best.position, 0);
}

#[test]
fn test_build_produces_unit_embeddings_and_round_trips() {
    let harness = TestHarness::new();
    harness.add_template("drake.jpg", RED, 16, 16);
    harness.add_template("doge.png", BLUE, 16, 16);
    harness.add_template("mixed.webp", GREEN, 16, 16);

    let provider = e2e_tests::mock_provider();
    let report = IndexBuilder::new(&provider, BuildConfig::default())
        .build_and_persist(&harness.templates_dir, &harness.index_path)
        .unwrap();

    for record in report.index.records() {
        assert!(record.embedding().is_unit(1e-6), "{} not unit", record.id());
    }

    let loaded = load(&harness.index_path).unwrap();
    assert_eq!(loaded, report.index);
    assert_eq!(loaded.embedding_model(), MOCK_MODEL);
    assert_eq!(loaded.len(), 3);
}

#[test]
fn test_empty_library_fails_initialization() {
    let harness = TestHarness::new();
    harness.add_raw_file("readme.txt", b"not a template");

    let err = TemplateSelector::initialize(&harness.selector_config(), shared_provider())
        .err()
        .expect("initialization must fail");
    match err {
        IndexError::SelectorInit(cause) => {
            assert!(matches!(*cause, IndexError::EmptyLibrary { skipped: 0, .. }))
        }
        other => panic!("expected SelectorInit, got {other:?}"),
    }
    assert!(!harness.index_path.exists());
}

#[test]
fn test_only_undecodable_templates_fails_initialization() {
    let harness = TestHarness::new();
    harness.add_raw_file("broken.png", b"\x89PNG but not really");

    let err = TemplateSelector::initialize(&harness.selector_config(), shared_provider())
        .err()
        .expect("initialization must fail");
    match err {
        IndexError::SelectorInit(cause) => {
            assert!(matches!(*cause, IndexError::EmptyLibrary { skipped: 1, .. }))
        }
        other => panic!("expected SelectorInit, got {other:?}"),
    }
}

#[test]
fn test_corrupt_index_is_rebuilt() {
    let harness = TestHarness::new();
    harness.add_template("drake.jpg", RED, 16, 16);
    harness.add_template("doge.png", BLUE, 16, 16);

    TemplateSelector::initialize(&harness.selector_config(), shared_provider()).unwrap();
    let bytes = std::fs::read(&harness.index_path).unwrap();
    std::fs::write(&harness.index_path, &bytes[..bytes.len() / 3]).unwrap();
    assert!(matches!(
        load(&harness.index_path),
        Err(IndexError::IndexCorrupt { .. })
    ));

    let selector =
        TemplateSelector::initialize(&harness.selector_config(), shared_provider()).unwrap();
    assert_eq!(selector.index().len(), 2);
    assert!(load(&harness.index_path).is_ok());
}

#[test]
fn test_corrupt_index_with_empty_library_reports_cause() {
    let harness = TestHarness::new();
    std::fs::create_dir_all(harness.index_path.parent().unwrap()).unwrap();
    std::fs::write(&harness.index_path, b"[1, 2, 3]").unwrap();

    let err = TemplateSelector::initialize(&harness.selector_config(), shared_provider())
        .err()
        .expect("repair cannot succeed without templates");
    assert!(matches!(err, IndexError::SelectorInit(_)));
    // the corrupt file was removed before the rebuild attempt
    assert!(!harness.index_path.exists());
}

#[test]
fn test_missing_template_dir_fails_initialization() {
    let harness = TestHarness::new();
    std::fs::remove_dir(&harness.templates_dir).unwrap();

    let err = TemplateSelector::initialize(&harness.selector_config(), shared_provider())
        .err()
        .expect("initialization must fail");
    match err {
        IndexError::SelectorInit(cause) => {
            assert!(matches!(*cause, IndexError::TemplateDirUnavailable { .. }))
        }
        other => panic!("expected SelectorInit, got {other:?}"),
    }
}

#[test]
fn test_index_from_other_model_rejects_queries() {
    let harness = TestHarness::new();
    harness.add_template("drake.jpg", RED, 16, 16);
    TemplateSelector::initialize(&harness.selector_config(), shared_provider()).unwrap();

    let other = Arc::new(
        memeforge_embeddings::MockEmbedder::new("other-model", 2)
            .with_text("drake hotline bling", vec![1.0, 0.0]),
    );
    let selector = TemplateSelector::initialize(&harness.selector_config(), other).unwrap();
    assert!(matches!(
        selector.select("drake hotline bling"),
        Err(IndexError::ModelMismatch { .. })
    ));
}

#[test]
fn test_selector_shared_across_threads() {
    let harness = TestHarness::new();
    harness.add_template("drake.jpg", RED, 16, 16);
    harness.add_template("doge.png", BLUE, 16, 16);

    let selector =
        TemplateSelector::initialize(&harness.selector_config(), shared_provider()).unwrap();
    let expected = selector.select("drake hotline bling").unwrap();

    std::thread::scope(|scope| {
        let handles: Vec<_> = (0..4)
            .map(|_| scope.spawn(|| selector.select("drake hotline bling").unwrap()))
            .collect();
        for handle in handles {
            assert_eq!(handle.join().unwrap(), expected);
        }
    });
}

#[test]
fn test_select_top_ranks_library() {
    let harness = TestHarness::new();
    harness.add_template("drake.jpg", RED, 16, 16);
    harness.add_template("doge.png", BLUE, 16, 16);
    harness.add_template("mixed.png", GREEN, 16, 16);

    let selector =
        TemplateSelector::initialize(&harness.selector_config(), shared_provider()).unwrap();
    let ranked = selector.select_top("drake hotline bling", 3).unwrap();
    let ids: Vec<&str> = ranked
        .iter()
        .map(|m| Path::new(&m.template_id).file_name().unwrap().to_str().unwrap())
        .collect();
    assert_eq!(ids, vec!["drake.jpg", "mixed.png", "doge.png"]);
}
