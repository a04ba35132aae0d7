//! End-to-end scenarios over the public index surface

use std::sync::Arc;

use nautex::{
    BooleanQuery, Directory, Document, Field, FsDirectory, FuzzyQuery, Index, IndexConfig,
    IndexReader, NautexError, PhraseQuery, Query, RamDirectory, TermQuery,
};
use tempfile::TempDir;

fn ram_index(config: IndexConfig) -> (RamDirectory, Index) {
    let ram = RamDirectory::new();
    let dir: Arc<dyn Directory> = Arc::new(ram.clone());
    let index = Index::open(dir, config).unwrap();
    (ram, index)
}

fn titled(title: &str) -> Document {
    Document::new().with(Field::text("title", title))
}

fn segment_count(dir: &RamDirectory) -> usize {
    dir.list_all()
        .unwrap()
        .iter()
        .filter(|name| name.ends_with(".tis"))
        .count()
}

#[test]
fn test_add_search_delete() {
    let (_ram, mut index) = ram_index(IndexConfig::default());

    index.add_document(&titled("the quick brown fox")).unwrap();
    index.add_document(&titled("the lazy dog")).unwrap();
    index.commit().unwrap();

    let hits = index
        .find(&TermQuery::new("title", "quick").into())
        .unwrap();
    assert_eq!(hits.len(), 1);
    assert!(hits[0].score > 0.0);

    let doc = index.get_document(hits[0].doc).unwrap();
    assert_eq!(doc.get("title"), Some("the quick brown fox"));

    index.delete(hits[0].doc).unwrap();
    let hits = index
        .find(&TermQuery::new("title", "quick").into())
        .unwrap();
    assert!(hits.is_empty());

    assert_eq!(index.num_docs(), 1);
    assert_eq!(index.max_doc(), 2);
    assert!(index.has_deletions());
}

#[test]
fn test_phrase_with_slop() {
    let (_ram, mut index) = ram_index(IndexConfig::default());
    index
        .add_document(&Document::new().with(Field::text("body", "a b c d")))
        .unwrap();
    index.commit().unwrap();

    let sloppy: Query = PhraseQuery::new("body").add("a").add("c").with_slop(1).into();
    assert_eq!(index.find(&sloppy).unwrap().len(), 1);

    let exact: Query = PhraseQuery::new("body").add("a").add("c").into();
    assert!(index.find(&exact).unwrap().is_empty());

    let in_order: Query = PhraseQuery::new("body").add("b").add("c").into();
    assert_eq!(index.find(&in_order).unwrap().len(), 1);
}

#[test]
fn test_boolean_required_prohibited() {
    let (_ram, mut index) = ram_index(IndexConfig::default());
    index
        .add_document(&Document::new().with(Field::text("t", "alpha beta")))
        .unwrap();
    index
        .add_document(&Document::new().with(Field::text("t", "alpha gamma")))
        .unwrap();
    index.commit().unwrap();

    let query: Query = BooleanQuery::new()
        .must(TermQuery::new("t", "alpha"))
        .must_not(TermQuery::new("t", "beta"))
        .into();
    let hits = index.find(&query).unwrap();
    assert_eq!(hits.len(), 1);
    assert_eq!(
        index.get_document(hits[0].doc).unwrap().get("t"),
        Some("alpha gamma")
    );
}

#[test]
fn test_boolean_optional_scoring_prefers_more_matches() {
    let (_ram, mut index) = ram_index(IndexConfig::default());
    index
        .add_document(&Document::new().with(Field::text("t", "red green")))
        .unwrap();
    index
        .add_document(&Document::new().with(Field::text("t", "red blue")))
        .unwrap();
    index.commit().unwrap();

    let query: Query = BooleanQuery::new()
        .should(TermQuery::new("t", "red"))
        .should(TermQuery::new("t", "green"))
        .into();
    let hits = index.find(&query).unwrap();
    assert_eq!(hits.len(), 2);
    // the doc matching both optional clauses ranks first
    assert_eq!(
        index.get_document(hits[0].doc).unwrap().get("t"),
        Some("red green")
    );
    assert!(hits[0].score > hits[1].score);
}

#[test]
fn test_merges_collapse_to_single_segment() {
    let config = IndexConfig {
        merge_factor: 2,
        max_buffered_docs: 1,
        ..Default::default()
    };
    let (ram, mut index) = ram_index(config);

    for i in 0..4 {
        index.add_document(&titled(&format!("doc number {i}"))).unwrap();
        index.commit().unwrap();
    }

    assert_eq!(segment_count(&ram), 1);
    assert_eq!(index.num_docs(), 4);

    // every document still searchable after the merges
    for i in 0..4 {
        let hits = index
            .find(&TermQuery::new("title", format!("{i}")).into())
            .unwrap();
        assert_eq!(hits.len(), 1, "doc {i} lost in merge");
    }
}

#[test]
fn test_generation_recovery_without_sentinel() {
    let tmp = TempDir::new().unwrap();
    let dir: Arc<dyn Directory> = Arc::new(FsDirectory::open(tmp.path()).unwrap());

    let mut index = Index::open(Arc::clone(&dir), IndexConfig::default()).unwrap();
    index.add_document(&titled("persistent document")).unwrap();
    index.commit().unwrap();
    drop(index);

    dir.delete_file("segments.gen").unwrap();

    let reader = IndexReader::open(Arc::clone(&dir)).unwrap();
    assert_eq!(reader.num_docs(), 1);
    let hits = reader
        .find(&TermQuery::new("title", "persistent").into())
        .unwrap();
    assert_eq!(hits.len(), 1);
}

#[test]
fn test_fuzzy_rewrite_finds_near_term() {
    let (_ram, mut index) = ram_index(IndexConfig::default());
    index.add_document(&titled("color")).unwrap();
    index.add_document(&titled("colander")).unwrap();
    index.commit().unwrap();

    let query: Query = FuzzyQuery::new("title", "colour").min_similarity(0.6).into();
    let hits = index.find(&query).unwrap();
    assert_eq!(hits.len(), 1);
    assert_eq!(
        index.get_document(hits[0].doc).unwrap().get("title"),
        Some("color")
    );
}

#[test]
fn test_wildcard_and_range() {
    let (_ram, mut index) = ram_index(IndexConfig::default());
    for word in ["apple", "apricot", "banana", "cherry"] {
        index.add_document(&titled(word)).unwrap();
    }
    index.commit().unwrap();

    let query: Query = nautex::WildcardQuery::new("title", "ap*").into();
    assert_eq!(index.find(&query).unwrap().len(), 2);

    let query: Query = nautex::RangeQuery::inclusive("title", "apricot", "banana").into();
    assert_eq!(index.find(&query).unwrap().len(), 2);

    let query: Query =
        nautex::RangeQuery::new("title", Some("apricot".into()), None, false, true).into();
    assert_eq!(index.find(&query).unwrap().len(), 2); // banana, cherry
}

#[test]
fn test_snapshot_isolation_across_commits() {
    let ram = RamDirectory::new();
    let dir: Arc<dyn Directory> = Arc::new(ram.clone());
    let mut index = Index::open(Arc::clone(&dir), IndexConfig::default()).unwrap();

    index.add_document(&titled("first")).unwrap();
    index.add_document(&titled("second")).unwrap();
    index.commit().unwrap();

    let reader = IndexReader::open(Arc::clone(&dir)).unwrap();
    assert_eq!(reader.num_docs(), 2);

    // later additions and deletions are invisible to the open reader
    index.add_document(&titled("third")).unwrap();
    index.delete(0).unwrap();
    index.commit().unwrap();
    index.optimize().unwrap();

    assert_eq!(reader.num_docs(), 2);
    let hits = reader.find(&TermQuery::new("title", "first").into()).unwrap();
    assert_eq!(hits.len(), 1, "pinned segment files must stay readable");

    let fresh = IndexReader::open(Arc::clone(&dir)).unwrap();
    assert_eq!(fresh.num_docs(), 2); // three docs minus one deletion
    assert!(fresh
        .find(&TermQuery::new("title", "first").into())
        .unwrap()
        .is_empty());
}

#[test]
fn test_uncommitted_state_invisible_to_new_readers() {
    let ram = RamDirectory::new();
    let dir: Arc<dyn Directory> = Arc::new(ram.clone());
    let mut index = Index::open(Arc::clone(&dir), IndexConfig::default()).unwrap();

    index.add_document(&titled("committed")).unwrap();
    index.commit().unwrap();
    index.add_document(&titled("buffered")).unwrap();

    let reader = IndexReader::open(Arc::clone(&dir)).unwrap();
    assert_eq!(reader.num_docs(), 1);
    assert!(reader
        .find(&TermQuery::new("title", "buffered").into())
        .unwrap()
        .is_empty());

    // the writer's own view sees the flushed-but-uncommitted state after
    // an explicit commit only; buffered docs become ids at flush time
    index.commit().unwrap();
    let reader = IndexReader::open(Arc::clone(&dir)).unwrap();
    assert_eq!(reader.num_docs(), 2);
}

#[test]
fn test_second_writer_fails_fast() {
    let tmp = TempDir::new().unwrap();
    let dir: Arc<dyn Directory> = Arc::new(FsDirectory::open(tmp.path()).unwrap());

    let _index = Index::open(Arc::clone(&dir), IndexConfig::default()).unwrap();
    let config = IndexConfig {
        write_lock_timeout: std::time::Duration::from_millis(50),
        ..Default::default()
    };
    match Index::open(Arc::clone(&dir), config) {
        Err(NautexError::LockObtainFailed(_)) => {}
        other => panic!("expected LockObtainFailed, got {:?}", other.map(|_| ())),
    }
}

#[test]
fn test_lock_released_on_drop() {
    let tmp = TempDir::new().unwrap();
    let dir: Arc<dyn Directory> = Arc::new(FsDirectory::open(tmp.path()).unwrap());

    let index = Index::open(Arc::clone(&dir), IndexConfig::default()).unwrap();
    drop(index);
    Index::open(Arc::clone(&dir), IndexConfig::default()).unwrap();
}

#[test]
fn test_stored_fields_survive_merge() {
    let config = IndexConfig {
        merge_factor: 2,
        max_buffered_docs: 1,
        ..Default::default()
    };
    let (_ram, mut index) = ram_index(config);

    for i in 0..4 {
        let doc = Document::new()
            .with(Field::text("title", format!("title {i}")))
            .with(Field::keyword("id", format!("id-{i}")))
            .with(Field::binary("payload", vec![i as u8; 3]));
        index.add_document(&doc).unwrap();
        index.commit().unwrap();
    }

    for i in 0..4u32 {
        let hits = index
            .find(&TermQuery::new("id", format!("id-{i}")).into())
            .unwrap();
        assert_eq!(hits.len(), 1);
        let doc = index.get_document(hits[0].doc).unwrap();
        assert_eq!(doc.get("title"), Some(format!("title {i}").as_str()));
        let payload = doc
            .fields()
            .iter()
            .find(|f| f.name == "payload")
            .unwrap()
            .value
            .as_bytes()
            .unwrap()
            .to_vec();
        assert_eq!(payload, vec![i as u8; 3]);
    }
}

#[test]
fn test_format_version_surface() {
    let (_ram, mut index) = ram_index(IndexConfig::default());
    assert_eq!(index.get_format_version(), -9);
    assert!(index.set_format_version(-9).is_ok());
    assert!(matches!(
        index.set_format_version(-1),
        Err(NautexError::InvalidArgument(_))
    ));
}

#[test]
fn test_knob_validation() {
    let (_ram, mut index) = ram_index(IndexConfig::default());
    assert!(index.set_merge_factor(1).is_err());
    assert!(index.set_merge_factor(5).is_ok());
    assert_eq!(index.get_merge_factor(), 5);
    assert!(index.set_max_buffered_docs(0).is_err());
    assert!(index.set_max_buffered_docs(3).is_ok());
    assert!(index.set_max_merge_docs(100).is_ok());
    assert_eq!(index.get_max_merge_docs(), 100);
}
