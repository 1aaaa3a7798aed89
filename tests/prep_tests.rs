use std::fmt::Write as _;
use std::path::Path;

use binrun::corpus::{
    self, collect_by_author, load_raw_pairs, repair_documents,
    train_dev_test_splits, write_dataset_stats, AuthorDocs,
};
use binrun::dev_bins::write_dev_bins;
use binrun::test_utils::init_test_logging;
use pretty_assertions::assert_eq;
use rand::rngs::StdRng;
use rand::SeedableRng;
use tempfile::tempdir;

/// Write a raw corpus of `docs_per_author` documents for each of two
/// authors, one pair per line as in the PAN22 release.
fn write_raw_corpus(dir: &Path, docs_per_author: usize) -> (std::path::PathBuf, std::path::PathBuf) {
    let mut pairs = String::new();
    let mut truths = String::new();
    for i in 0..docs_per_author {
        writeln!(
            pairs,
            r#"{{"id": "p{i}", "pair": ["nk you for letter {i} says <pers1_f> of <city1>", "r friend, note {i} sent on <day2> &amp; archived"]}}"#,
        )
        .unwrap();
        writeln!(
            truths,
            r#"{{"id": "p{i}", "authors": ["alice", "bob"], "same": false}}"#,
        )
        .unwrap();
    }
    let pairs_path = dir.join("pairs.jsonl");
    let truths_path = dir.join("truth.jsonl");
    std::fs::write(&pairs_path, pairs).unwrap();
    std::fs::write(&truths_path, truths).unwrap();
    (pairs_path, truths_path)
}

#[test]
fn test_preprocess_pipeline_end_to_end() {
    init_test_logging();
    let dir = tempdir().unwrap();
    let (pairs_path, truths_path) = write_raw_corpus(dir.path(), 12);

    let (id_pairs, text_pairs) =
        load_raw_pairs(&pairs_path, &truths_path).unwrap();
    assert_eq!(id_pairs.len(), 12);

    let raw = collect_by_author(&id_pairs, &text_pairs);
    assert_eq!(raw.len(), 2);
    assert_eq!(raw["alice"].len(), 12);
    assert_eq!(raw["bob"].len(), 12);

    let mut rng = StdRng::seed_from_u64(22);
    let repaired = repair_documents(&raw, &mut rng);

    // Repair never changes corpus shape, only document contents.
    assert_eq!(repaired.len(), 2);
    assert_eq!(repaired["alice"].len(), 12);
    for doc in &repaired["alice"] {
        assert!(doc.starts_with("Thank you for letter "));
        assert!(!doc.contains('<'));
    }
    for doc in &repaired["bob"] {
        assert!(doc.starts_with("Dear friend, note "));
        assert!(doc.contains(" and archived"));
    }

    let splits = train_dev_test_splits(&repaired);
    assert_eq!(splits.test["alice"].len(), 5);
    assert_eq!(splits.dev["alice"].len(), 5);
    assert_eq!(splits.train["alice"].len(), 2);

    let bins_dir = dir.path().join("dev_bins");
    let written =
        write_dev_bins(&splits.dev, &splits.train, &bins_dir).unwrap();

    // Two authors fit well inside one seven-author bin.
    assert_eq!(written, vec![bins_dir.join("bin_1_dev.json")]);
    let bin: AuthorDocs = serde_json::from_str(
        &std::fs::read_to_string(&written[0]).unwrap(),
    )
    .unwrap();
    assert_eq!(bin["alice"], splits.dev["alice"]);
    assert_eq!(bin["bob"], splits.dev["bob"]);
}

#[test]
fn test_duplicate_pair_documents_collapse_per_author() {
    init_test_logging();
    let id_pairs = vec![
        ("alice".to_string(), "bob".to_string()),
        ("alice".to_string(), "bob".to_string()),
    ];
    let text_pairs = vec![
        ("same letter".to_string(), "other letter".to_string()),
        ("same letter".to_string(), "fresh letter".to_string()),
    ];

    let raw = collect_by_author(&id_pairs, &text_pairs);

    assert_eq!(raw["alice"], vec!["same letter".to_string()]);
    assert_eq!(
        raw["bob"],
        vec!["other letter".to_string(), "fresh letter".to_string()]
    );
}

#[test]
fn test_repair_is_reproducible_for_a_fixed_seed() {
    init_test_logging();
    let dir = tempdir().unwrap();
    let (pairs_path, truths_path) = write_raw_corpus(dir.path(), 3);
    let (id_pairs, text_pairs) =
        load_raw_pairs(&pairs_path, &truths_path).unwrap();
    let raw = collect_by_author(&id_pairs, &text_pairs);

    let mut first_rng = StdRng::seed_from_u64(42);
    let mut second_rng = StdRng::seed_from_u64(42);

    let first = repair_documents(&raw, &mut first_rng);
    let second = repair_documents(&raw, &mut second_rng);

    assert_eq!(first, second);
}

#[test]
fn test_dataset_stats_cover_the_raw_corpus() {
    init_test_logging();
    let dir = tempdir().unwrap();
    let (pairs_path, truths_path) = write_raw_corpus(dir.path(), 4);
    let (id_pairs, text_pairs) =
        load_raw_pairs(&pairs_path, &truths_path).unwrap();
    let raw = collect_by_author(&id_pairs, &text_pairs);

    let stats_path = dir.path().join("resources").join("stats.tsv");
    write_dataset_stats(&raw, &stats_path).unwrap();

    let written = std::fs::read_to_string(&stats_path).unwrap();
    assert_eq!(written, "author\tnum_counts\nalice\t4\nbob\t4\n");
}

#[test]
fn test_repaired_corpus_round_trips_through_json() {
    init_test_logging();
    let dir = tempdir().unwrap();
    let mut data = AuthorDocs::new();
    data.insert(
        "alice".to_string(),
        vec!["first letter".to_string(), "second letter".to_string()],
    );

    let path = dir.path().join("splits").join("train.json");
    corpus::write_author_docs(&data, &path).unwrap();

    let read_back: AuthorDocs = serde_json::from_str(
        &std::fs::read_to_string(&path).unwrap(),
    )
    .unwrap();
    assert_eq!(read_back, data);
}
