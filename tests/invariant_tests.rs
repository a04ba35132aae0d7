//! Structural invariants of the index, checked through the public surface

use std::sync::Arc;

use nautex::{
    Directory, Document, Field, Index, IndexConfig, IndexReader, RamDirectory, Term, TermQuery,
};

fn open_index(ram: &RamDirectory, config: IndexConfig) -> Index {
    let dir: Arc<dyn Directory> = Arc::new(ram.clone());
    Index::open(dir, config).unwrap()
}

fn body(text: &str) -> Document {
    Document::new().with(Field::text("body", text))
}

/// `numDocs + deleted == maxDoc`, at every stage
#[test]
fn test_doc_count_accounting() {
    let ram = RamDirectory::new();
    let mut index = open_index(&ram, IndexConfig::default());

    for text in ["one fish", "two fish", "red fish", "blue fish"] {
        index.add_document(&body(text)).unwrap();
    }
    index.commit().unwrap();
    assert_eq!(index.max_doc(), 4);
    assert_eq!(index.num_docs(), 4);

    index.delete(1).unwrap();
    index.delete(3).unwrap();
    assert_eq!(index.max_doc(), 4);
    assert_eq!(index.num_docs(), 2);

    index.commit().unwrap();
    assert_eq!(index.num_docs(), 2);
    assert_eq!(index.max_doc(), 4);

    // physical drop at merge time
    index.optimize().unwrap();
    assert_eq!(index.max_doc(), 2);
    assert_eq!(index.num_docs(), 2);
    assert!(!index.has_deletions());
}

/// `docFreq(t) == |termDocs(t)|` with and without tombstones
#[test]
fn test_doc_freq_matches_term_docs() {
    let ram = RamDirectory::new();
    let mut index = open_index(&ram, IndexConfig::default());

    for text in ["shared alpha", "shared beta", "shared gamma"] {
        index.add_document(&body(text)).unwrap();
    }
    index.commit().unwrap();

    let shared = Term::new("body", "shared");
    assert_eq!(index.doc_freq(&shared).unwrap(), 3);
    assert_eq!(index.term_docs(&shared).unwrap().len(), 3);

    index.delete(1).unwrap();
    assert_eq!(index.doc_freq(&shared).unwrap(), 2);
    assert_eq!(
        index.term_docs(&shared).unwrap(),
        vec![0, 2],
        "tombstoned doc must drop out of termDocs"
    );

    let absent = Term::new("body", "nonexistent");
    assert_eq!(index.doc_freq(&absent).unwrap(), 0);
    assert!(index.term_docs(&absent).unwrap().is_empty());
}

/// `|termPositions(t)[d]| == termFreqs(t)[d]` for every posting
#[test]
fn test_positions_agree_with_freqs() {
    let ram = RamDirectory::new();
    let mut index = open_index(&ram, IndexConfig::default());

    index.add_document(&body("echo echo echo")).unwrap();
    index.add_document(&body("echo delta echo")).unwrap();
    index.add_document(&body("delta")).unwrap();
    index.commit().unwrap();

    let echo = Term::new("body", "echo");
    let freqs = index.term_freqs(&echo).unwrap();
    let positions = index.term_positions(&echo).unwrap();
    assert_eq!(freqs.len(), positions.len());
    for ((fd, freq), (pd, pos)) in freqs.iter().zip(&positions) {
        assert_eq!(fd, pd);
        assert_eq!(*freq as usize, pos.len());
    }
    assert_eq!(positions[0].1, vec![0, 1, 2]);
    assert_eq!(positions[1].1, vec![0, 2]);
}

/// Reopening reproduces terms, postings, norms and stored fields exactly
#[test]
fn test_reopen_roundtrip() {
    let ram = RamDirectory::new();
    let mut index = open_index(&ram, IndexConfig::default());

    index
        .add_document(
            &Document::new()
                .with(Field::text("title", "roundtrip check"))
                .with(Field::text("body", "a a b")),
        )
        .unwrap();
    index.add_document(&body("b c")).unwrap();
    index.commit().unwrap();

    let mut before = Vec::new();
    let mut terms = index.terms();
    while let Some((term, df)) = terms.next().unwrap() {
        before.push((term.clone(), df, index.term_positions(&term).unwrap()));
    }
    let norm = index.norm(0, "body").unwrap();
    drop(index);

    let index = open_index(&ram, IndexConfig::default());
    let mut after = Vec::new();
    let mut terms = index.terms();
    while let Some((term, df)) = terms.next().unwrap() {
        after.push((term.clone(), df, index.term_positions(&term).unwrap()));
    }
    assert_eq!(before, after);
    assert_eq!(index.norm(0, "body").unwrap(), norm);
    assert_eq!(
        index.get_document(0).unwrap().get("title"),
        Some("roundtrip check")
    );
}

/// Merging preserves the posting sets modulo id remapping
#[test]
fn test_merge_preserves_postings() {
    let ram = RamDirectory::new();
    let config = IndexConfig {
        merge_factor: 2,
        max_buffered_docs: 2,
        ..Default::default()
    };
    let mut index = open_index(&ram, config);

    let texts = [
        "lorem ipsum", "ipsum dolor", "dolor sit", "sit amet",
        "amet lorem", "lorem dolor", "ipsum sit", "dolor amet",
    ];
    for (i, text) in texts.iter().enumerate() {
        let doc = Document::new()
            .with(Field::text("body", *text))
            .with(Field::keyword("id", format!("{i}")));
        index.add_document(&doc).unwrap();
        index.commit().unwrap();
    }

    // ids move around as merges concatenate segments; find the victim
    let victim = index
        .find(&TermQuery::new("id", "2").into())
        .unwrap()
        .pop()
        .unwrap()
        .doc;
    index.delete(victim).unwrap();
    index.commit().unwrap();
    index.optimize().unwrap();

    // expected doc frequencies over the surviving seven documents
    for (word, expected) in [("lorem", 3), ("ipsum", 3), ("dolor", 3), ("sit", 2), ("amet", 3)] {
        let term = Term::new("body", word);
        assert_eq!(index.doc_freq(&term).unwrap(), expected, "term {word}");
        assert_eq!(index.term_docs(&term).unwrap().len(), expected as usize);
    }

    // the deleted doc's text is gone, all others retrievable
    let mut survivors = Vec::new();
    for doc in 0..index.max_doc() {
        survivors.push(index.get_document(doc).unwrap().get("body").unwrap().to_string());
    }
    assert_eq!(survivors.len(), 7);
    assert!(!survivors.contains(&"dolor sit".to_string()));
}

/// A reader sees pre-commit or post-commit state, never a mix
#[test]
fn test_commit_atomicity() {
    let ram = RamDirectory::new();
    let dir: Arc<dyn Directory> = Arc::new(ram.clone());
    let mut index = open_index(&ram, IndexConfig::default());

    index.add_document(&body("epoch one")).unwrap();
    index.commit().unwrap();

    let before = IndexReader::open(Arc::clone(&dir)).unwrap();

    index.add_document(&body("epoch two")).unwrap();
    index.delete(0).unwrap();
    index.commit().unwrap();

    let after = IndexReader::open(Arc::clone(&dir)).unwrap();

    // old epoch: one live doc, the original
    assert_eq!(before.num_docs(), 1);
    assert_eq!(
        before.find(&TermQuery::new("body", "one").into()).unwrap().len(),
        1
    );
    assert!(before
        .find(&TermQuery::new("body", "two").into())
        .unwrap()
        .is_empty());

    // new epoch: the addition and the deletion appear together
    assert_eq!(after.num_docs(), 1);
    assert!(after
        .find(&TermQuery::new("body", "one").into())
        .unwrap()
        .is_empty());
    assert_eq!(
        after.find(&TermQuery::new("body", "two").into()).unwrap().len(),
        1
    );
}

/// `optimize(); optimize()` and `commit(); commit()` are no-ops the second
/// time
#[test]
fn test_idempotence() {
    let ram = RamDirectory::new();
    let dir: Arc<dyn Directory> = Arc::new(ram.clone());
    let config = IndexConfig {
        merge_factor: 2,
        max_buffered_docs: 1,
        ..Default::default()
    };
    let mut index = open_index(&ram, config);

    for i in 0..3 {
        index.add_document(&body(&format!("doc {i}"))).unwrap();
    }
    index.commit().unwrap();
    index.optimize().unwrap();

    let gen_after_first = IndexReader::open(Arc::clone(&dir)).unwrap().generation();
    index.optimize().unwrap();
    index.commit().unwrap();
    index.commit().unwrap();
    let gen_after_noops = IndexReader::open(Arc::clone(&dir)).unwrap().generation();

    assert_eq!(gen_after_first, gen_after_noops);
    assert_eq!(index.num_docs(), 3);
}

/// `undeleteAll` restores only tombstones added since the last commit
#[test]
fn test_undelete_scope() {
    let ram = RamDirectory::new();
    let mut index = open_index(&ram, IndexConfig::default());

    for text in ["keep", "condemned early", "condemned late"] {
        index.add_document(&body(text)).unwrap();
    }
    index.commit().unwrap();

    // committed deletion: permanent
    index.delete(1).unwrap();
    index.commit().unwrap();

    // uncommitted deletion: restorable
    index.delete(2).unwrap();
    assert_eq!(index.num_docs(), 1);

    index.undelete_all().unwrap();
    assert_eq!(index.num_docs(), 2);
    assert!(index.get_document(2).is_ok());
    assert!(index.get_document(1).is_err());

    // undeleting with nothing pending changes nothing
    index.undelete_all().unwrap();
    assert_eq!(index.num_docs(), 2);
}

/// Terms enumerate in ascending `(field, text)` order with summed doc
/// frequencies
#[test]
fn test_terms_stream_sorted() {
    let ram = RamDirectory::new();
    let config = IndexConfig {
        max_buffered_docs: 1,
        ..Default::default()
    };
    let mut index = open_index(&ram, config);

    index
        .add_document(
            &Document::new()
                .with(Field::text("zeta", "omega"))
                .with(Field::text("alpha", "midway")),
        )
        .unwrap();
    index
        .add_document(&Document::new().with(Field::text("alpha", "midway aardvark")))
        .unwrap();
    index.commit().unwrap();

    let mut seen = Vec::new();
    let mut terms = index.terms();
    while let Some((term, df)) = terms.next().unwrap() {
        seen.push((term.field, term.text, df));
    }
    assert_eq!(
        seen,
        vec![
            ("alpha".to_string(), "aardvark".to_string(), 1),
            ("alpha".to_string(), "midway".to_string(), 2),
            ("zeta".to_string(), "omega".to_string(), 1),
        ]
    );

    let mut from = index.terms_from(&Term::new("alpha", "midway"));
    let (first, _) = from.next().unwrap().unwrap();
    assert_eq!(first.text, "midway");
}

/// Field names surface, with and without the indexed-only filter
#[test]
fn test_field_names() {
    let ram = RamDirectory::new();
    let mut index = open_index(&ram, IndexConfig::default());

    index
        .add_document(
            &Document::new()
                .with(Field::text("searchable", "words"))
                .with(Field::unindexed("opaque", "raw value")),
        )
        .unwrap();
    index.commit().unwrap();

    assert_eq!(index.field_names(false), vec!["opaque", "searchable"]);
    assert_eq!(index.field_names(true), vec!["searchable"]);
}
