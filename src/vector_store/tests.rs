use super::*;
use crate::AskdocError;
use tempfile::TempDir;

const DIM: usize = 4;

fn store(temp_dir: &TempDir) -> VectorStore {
    VectorStore::new("doc-1", temp_dir.path(), DIM)
}

fn unit(axis: usize) -> Vec<f32> {
    let mut v = vec![0.0; DIM];
    v[axis] = 1.0;
    v
}

fn sample_store(temp_dir: &TempDir) -> VectorStore {
    let mut store = store(temp_dir);
    store
        .create_index(
            vec!["alpha".to_string(), "beta".to_string(), "gamma".to_string()],
            vec![unit(0), unit(1), unit(2)],
        )
        .expect("can create index");
    store
}

#[test]
fn create_index_rejects_empty_inputs() {
    let temp_dir = TempDir::new().expect("can create temp dir");
    let mut store = store(&temp_dir);

    let result = store.create_index(Vec::new(), Vec::new());
    assert!(matches!(result, Err(AskdocError::InvalidInput(_))));
}

#[test]
fn create_index_rejects_length_mismatch() {
    let temp_dir = TempDir::new().expect("can create temp dir");
    let mut store = store(&temp_dir);

    let result = store.create_index(
        vec!["a".to_string(), "b".to_string()],
        vec![unit(0)],
    );
    assert!(matches!(result, Err(AskdocError::InvalidInput(_))));
}

#[test]
fn create_index_rejects_dimension_mismatch() {
    let temp_dir = TempDir::new().expect("can create temp dir");
    let mut store = store(&temp_dir);

    let result = store.create_index(vec!["a".to_string()], vec![vec![1.0, 2.0]]);
    assert!(matches!(result, Err(AskdocError::InvalidInput(_))));
}

#[test]
fn search_before_create_fails() {
    let temp_dir = TempDir::new().expect("can create temp dir");
    let store = store(&temp_dir);

    let result = store.search(&unit(0), 3);
    assert!(matches!(result, Err(AskdocError::NotInitialized)));
}

#[test]
fn save_before_create_fails() {
    let temp_dir = TempDir::new().expect("can create temp dir");
    let store = store(&temp_dir);

    assert!(matches!(store.save(), Err(AskdocError::NotInitialized)));
}

#[test]
fn exact_match_comes_first_with_distance_zero() {
    let temp_dir = TempDir::new().expect("can create temp dir");
    let store = sample_store(&temp_dir);

    let results = store.search(&unit(1), 3).expect("can search");

    assert_eq!(results.len(), 3);
    assert_eq!(results[0].text, "beta");
    assert_eq!(results[0].distance, 0.0);
    // The other axes are equidistant from the query.
    assert_eq!(results[1].distance, 2.0);
    assert_eq!(results[2].distance, 2.0);
}

#[test]
fn results_are_sorted_ascending_by_distance() {
    let temp_dir = TempDir::new().expect("can create temp dir");
    let mut store = store(&temp_dir);
    store
        .create_index(
            vec!["far".to_string(), "near".to_string(), "mid".to_string()],
            vec![
                vec![10.0, 0.0, 0.0, 0.0],
                vec![1.0, 0.0, 0.0, 0.0],
                vec![5.0, 0.0, 0.0, 0.0],
            ],
        )
        .expect("can create index");

    let results = store
        .search(&[0.0, 0.0, 0.0, 0.0], 3)
        .expect("can search");

    let texts: Vec<&str> = results.iter().map(|r| r.text.as_str()).collect();
    assert_eq!(texts, vec!["near", "mid", "far"]);
    assert!(results[0].distance <= results[1].distance);
    assert!(results[1].distance <= results[2].distance);
}

#[test]
fn ties_keep_insertion_order() {
    let temp_dir = TempDir::new().expect("can create temp dir");
    let mut store = store(&temp_dir);
    store
        .create_index(
            vec!["first".to_string(), "second".to_string()],
            vec![unit(0), unit(0)],
        )
        .expect("can create index");

    let results = store.search(&unit(0), 2).expect("can search");

    assert_eq!(results[0].text, "first");
    assert_eq!(results[1].text, "second");
}

#[test]
fn k_larger_than_index_returns_everything() {
    let temp_dir = TempDir::new().expect("can create temp dir");
    let store = sample_store(&temp_dir);

    let results = store.search(&unit(0), 10).expect("can search");
    assert_eq!(results.len(), 3);
}

#[test]
fn search_rejects_query_dimension_mismatch() {
    let temp_dir = TempDir::new().expect("can create temp dir");
    let store = sample_store(&temp_dir);

    let result = store.search(&[1.0, 0.0], 3);
    assert!(matches!(result, Err(AskdocError::InvalidInput(_))));
}

#[test]
fn save_load_round_trip_preserves_search_results() {
    let temp_dir = TempDir::new().expect("can create temp dir");
    let store = sample_store(&temp_dir);

    let query = vec![0.9, 0.1, 0.0, 0.0];
    let before = store.search(&query, 3).expect("can search before save");
    store.save().expect("can save");

    let mut reloaded = VectorStore::new("doc-1", temp_dir.path(), DIM);
    reloaded.load().expect("can load");
    let after = reloaded.search(&query, 3).expect("can search after load");

    assert_eq!(before, after);
    assert_eq!(reloaded.vector_count(), 3);
}

#[test]
fn load_missing_document_fails_not_found() {
    let temp_dir = TempDir::new().expect("can create temp dir");
    let mut store = VectorStore::new("missing", temp_dir.path(), DIM);

    assert!(matches!(store.load(), Err(AskdocError::NotFound(_))));
}

#[test]
fn load_with_one_artifact_missing_fails_not_found() {
    let temp_dir = TempDir::new().expect("can create temp dir");
    let store = sample_store(&temp_dir);
    store.save().expect("can save");

    std::fs::remove_file(temp_dir.path().join("doc-1.chunks")).expect("can remove chunks");

    let mut reloaded = VectorStore::new("doc-1", temp_dir.path(), DIM);
    assert!(matches!(reloaded.load(), Err(AskdocError::NotFound(_))));
}

#[test]
fn load_rejects_artifact_count_mismatch() {
    let temp_dir = TempDir::new().expect("can create temp dir");
    let store = sample_store(&temp_dir);
    store.save().expect("can save");

    // Drop one chunk from the chunks artifact behind the store's back.
    let chunks_path = temp_dir.path().join("doc-1.chunks");
    let content = std::fs::read_to_string(&chunks_path).expect("can read chunks");
    let mut chunks: Vec<String> = serde_json::from_str(&content).expect("can parse chunks");
    chunks.pop();
    std::fs::write(&chunks_path, serde_json::to_string(&chunks).expect("can serialize"))
        .expect("can write chunks");

    let mut reloaded = VectorStore::new("doc-1", temp_dir.path(), DIM);
    assert!(matches!(reloaded.load(), Err(AskdocError::InvalidInput(_))));
}

#[test]
fn exists_reflects_save_state() {
    let temp_dir = TempDir::new().expect("can create temp dir");

    assert!(!VectorStore::exists("doc-1", temp_dir.path()));

    let store = sample_store(&temp_dir);
    store.save().expect("can save");

    assert!(VectorStore::exists("doc-1", temp_dir.path()));
    assert!(!VectorStore::exists("doc-2", temp_dir.path()));
}

#[test]
fn delete_removes_both_artifacts() {
    let temp_dir = TempDir::new().expect("can create temp dir");
    let store = sample_store(&temp_dir);
    store.save().expect("can save");

    VectorStore::delete("doc-1", temp_dir.path()).expect("can delete");

    assert!(!VectorStore::exists("doc-1", temp_dir.path()));
    assert!(!temp_dir.path().join("doc-1.chunks").exists());
}

#[test]
fn delete_unknown_document_fails_not_found() {
    let temp_dir = TempDir::new().expect("can create temp dir");

    assert!(matches!(
        VectorStore::delete("nope", temp_dir.path()),
        Err(AskdocError::NotFound(_))
    ));
}

#[test]
fn save_leaves_no_temporary_files() {
    let temp_dir = TempDir::new().expect("can create temp dir");
    let store = sample_store(&temp_dir);
    store.save().expect("can save");

    let leftovers: Vec<_> = std::fs::read_dir(temp_dir.path())
        .expect("can list dir")
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.path().extension().is_some_and(|ext| ext == "tmp"))
        .collect();
    assert!(leftovers.is_empty());
}

#[test]
fn document_locks_hand_out_shared_mutexes() {
    let locks = DocumentLocks::new();

    let a1 = locks.for_document("a");
    let a2 = locks.for_document("a");
    let b = locks.for_document("b");

    assert!(Arc::ptr_eq(&a1, &a2));
    assert!(!Arc::ptr_eq(&a1, &b));

    let _guard = a1.lock().expect("can lock");
    assert!(a2.try_lock().is_err());
    assert!(b.try_lock().is_ok());
}
