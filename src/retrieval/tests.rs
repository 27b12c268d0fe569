use super::*;
use tempfile::TempDir;

const DIM: usize = 3;

fn seeded_retriever(temp_dir: &TempDir) -> Retriever {
    let mut store = VectorStore::new("doc-1", temp_dir.path(), DIM);
    store
        .create_index(
            vec![
                "chunk about cats".to_string(),
                "chunk about dogs".to_string(),
                "chunk about fish".to_string(),
            ],
            vec![
                vec![1.0, 0.0, 0.0],
                vec![0.0, 1.0, 0.0],
                vec![0.0, 0.0, 1.0],
            ],
        )
        .expect("can create index");
    store.save().expect("can save");

    Retriever::new(temp_dir.path(), DIM, DocumentLocks::new())
}

#[test]
fn context_joins_chunks_closest_first() {
    let temp_dir = TempDir::new().expect("can create temp dir");
    let retriever = seeded_retriever(&temp_dir);

    let context = retriever
        .build_context("doc-1", &[0.0, 0.9, 0.1], 2)
        .expect("can build context");

    let parts: Vec<&str> = context.split("\n\n").collect();
    assert_eq!(parts.len(), 2);
    assert_eq!(parts[0], "chunk about dogs");
}

#[test]
fn context_respects_k() {
    let temp_dir = TempDir::new().expect("can create temp dir");
    let retriever = seeded_retriever(&temp_dir);

    let context = retriever
        .build_context("doc-1", &[1.0, 0.0, 0.0], 1)
        .expect("can build context");

    assert_eq!(context, "chunk about cats");
}

#[test]
fn unknown_document_fails_not_found() {
    let temp_dir = TempDir::new().expect("can create temp dir");
    let retriever = Retriever::new(temp_dir.path(), DIM, DocumentLocks::new());

    let result = retriever.build_context("ghost", &[1.0, 0.0, 0.0], 3);
    assert!(matches!(result, Err(AskdocError::NotFound(_))));
}

#[test]
fn document_exists_tracks_artifacts() {
    let temp_dir = TempDir::new().expect("can create temp dir");
    let retriever = seeded_retriever(&temp_dir);

    assert!(retriever.document_exists("doc-1"));
    assert!(!retriever.document_exists("doc-2"));
}

#[test]
fn search_returns_ranked_results_with_distances() {
    let temp_dir = TempDir::new().expect("can create temp dir");
    let retriever = seeded_retriever(&temp_dir);

    let results = retriever
        .search("doc-1", &[1.0, 0.0, 0.0], 3)
        .expect("can search");

    assert_eq!(results[0].text, "chunk about cats");
    assert_eq!(results[0].distance, 0.0);
    assert!(results[1].distance > 0.0);
}
