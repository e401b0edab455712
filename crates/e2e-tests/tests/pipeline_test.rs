//! Full pipeline E2E tests: caption -> selected template -> rendered meme.

use std::path::Path;

use pretty_assertions::assert_eq;

use e2e_tests::{shared_provider, TestHarness, BLUE, GREEN, RED};
use memeforge_index::TemplateSelector;

#[test]
fn test_caption_to_meme() {
    let harness = TestHarness::new();
    harness.add_template("drake.jpg", RED, 200, 160);
    harness.add_template("doge.png", BLUE, 180, 180);
    harness.add_template("notes.txt", GREEN, 10, 10);

    let selector =
        TemplateSelector::initialize(&harness.selector_config(), shared_provider()).unwrap();
    // the .txt file is not a template
    assert_eq!(selector.index().len(), 2);

    let chosen = selector.select("such wow very doge").unwrap();
    assert!(chosen.template_id.ends_with("doge.png"));
    assert!(chosen.score > 0.9);

    let output = harness
        .compositor()
        .render(Path::new(&chosen.template_id), "such wow", "very doge", None)
        .unwrap();
    assert_eq!(output, harness.output_dir.join("doge_captioned.png"));

    let meme = image::open(&output).unwrap();
    assert_eq!((meme.width(), meme.height()), (360, 180));
}

#[test]
fn test_pipeline_survives_undecodable_template() {
    let harness = TestHarness::new();
    harness.add_template("drake.jpg", RED, 64, 64);
    harness.add_raw_file("corrupt.jpeg", b"\xff\xd8\xff garbage");

    let selector =
        TemplateSelector::initialize(&harness.selector_config(), shared_provider()).unwrap();
    assert_eq!(selector.index().len(), 1);

    let chosen = selector.select("drake hotline bling").unwrap();
    let output = harness
        .compositor()
        .render(Path::new(&chosen.template_id), "top", "bottom", Some("drake_meme.png"))
        .unwrap();
    assert!(output.ends_with("drake_meme.png"));
}

#[test]
fn test_second_run_reuses_persisted_index() {
    let harness = TestHarness::new();
    harness.add_template("drake.jpg", RED, 32, 32);

    TemplateSelector::initialize(&harness.selector_config(), shared_provider()).unwrap();
    let modified = std::fs::metadata(&harness.index_path)
        .unwrap()
        .modified()
        .unwrap();

    // a template added later is not picked up until the index is rebuilt
    harness.add_template("doge.png", BLUE, 32, 32);
    let selector =
        TemplateSelector::initialize(&harness.selector_config(), shared_provider()).unwrap();
    assert_eq!(selector.index().len(), 1);
    assert_eq!(
        std::fs::metadata(&harness.index_path)
            .unwrap()
            .modified()
            .unwrap(),
        modified
    );
}
