use std::fs;

use askdb_cli::{ChunkingConfig, DataProcessor};

#[test]
fn walks_nested_txt_files_in_path_order() {
    let dir = tempfile::tempdir().expect("tempdir");
    fs::create_dir_all(dir.path().join("animals")).unwrap();
    fs::write(dir.path().join("zucchini.txt"), "Harvest young.").unwrap();
    fs::write(dir.path().join("animals/goats.txt"), "Goats climb.\n\nGoats need minerals.").unwrap();
    fs::write(dir.path().join("notes.md"), "ignored").unwrap();

    let docs = DataProcessor::new().process_directory(dir.path(), None).unwrap().documents;
    let ids: Vec<_> = docs.iter().map(|d| d.doc_id.as_str()).collect();
    assert_eq!(ids, vec!["animals/goats", "zucchini"]);
    assert_eq!(docs[0].chunks.len(), 2);
    assert_eq!(docs[0].chunks[1].text, "Goats need minerals.");
}

#[test]
fn limit_keeps_the_first_files() {
    let dir = tempfile::tempdir().expect("tempdir");
    for name in ["a", "b", "c"] {
        fs::write(dir.path().join(format!("{name}.txt")), format!("Document {name}.")).unwrap();
    }
    let docs = DataProcessor::new().process_directory(dir.path(), Some(2)).unwrap().documents;
    assert_eq!(docs.len(), 2);
    assert_eq!(docs[1].doc_id, "b");
}

#[test]
fn empty_directory_yields_nothing() {
    let dir = tempfile::tempdir().expect("tempdir");
    let processed = DataProcessor::new().process_directory(dir.path(), None).unwrap();
    assert!(processed.documents.is_empty());
    assert!(processed.failures.is_empty());
}

#[test]
fn non_utf8_files_are_read_lossily() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("latin.txt");
    fs::write(&path, [b'C', b'a', b'f', 0xE9, b'.']).unwrap();
    let doc = DataProcessor::with_config(ChunkingConfig::default()).process_file(&path).unwrap();
    assert_eq!(doc.chunks.len(), 1);
    assert!(doc.chunks[0].text.starts_with("Caf"));
}

#[test]
fn same_file_name_in_different_folders_stays_separate() {
    let dir = tempfile::tempdir().expect("tempdir");
    for folder in ["goats", "bees"] {
        fs::create_dir_all(dir.path().join(folder)).unwrap();
        fs::write(dir.path().join(folder).join("notes.txt"), format!("Notes about {folder}.")).unwrap();
    }
    let docs = DataProcessor::new().process_directory(dir.path(), None).unwrap().documents;
    let ids: Vec<_> = docs.iter().map(|d| d.doc_id.as_str()).collect();
    assert_eq!(ids, vec!["bees/notes", "goats/notes"]);
}

#[cfg(unix)]
#[test]
fn unreadable_file_is_reported_without_stopping_the_walk() {
    let dir = tempfile::tempdir().expect("tempdir");
    fs::write(dir.path().join("apples.txt"), "Apples keep in a cool cellar.").unwrap();
    std::os::unix::fs::symlink(dir.path().join("gone.txt"), dir.path().join("broken.txt")).unwrap();
    fs::write(dir.path().join("pears.txt"), "Pears ripen off the tree.").unwrap();

    let processed = DataProcessor::new().process_directory(dir.path(), None).unwrap();
    let ids: Vec<_> = processed.documents.iter().map(|d| d.doc_id.as_str()).collect();
    assert_eq!(ids, vec!["apples", "pears"]);
    assert_eq!(processed.failures.len(), 1);
    assert_eq!(processed.failures[0].doc_id, "broken");
}
