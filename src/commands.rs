use anyhow::Context;
use chrono::Utc;
use indicatif::ProgressBar;
use std::io::BufRead;
use std::path::PathBuf;
use std::sync::PoisonError;
use tracing::{info, warn};
use uuid::Uuid;

use crate::chunking::chunk_text;
use crate::config::Config;
use crate::extract;
use crate::gemini::GeminiClient;
use crate::rate_limit::{RateDecision, RateLimiter};
use crate::retrieval::Retriever;
use crate::vector_store::{DocumentLocks, VectorStore};
use crate::{AskdocError, Result};

/// Ingest a PDF: extract, chunk, embed, and index it under a fresh
/// document ID. Returns the ID on success.
#[inline]
pub async fn ingest(config: Config, file: PathBuf) -> Result<String> {
    if !file
        .extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("pdf"))
    {
        return Err(AskdocError::InvalidInput(format!(
            "Only PDF files are supported: {}",
            file.display()
        )));
    }

    let client = GeminiClient::new(&config)?;
    let data_dir = config.ensure_data_dir()?;
    let document_id = Uuid::new_v4().to_string();

    info!("Ingesting {} as document {}", file.display(), document_id);

    let id = document_id.clone();
    let chunk_count = tokio::task::spawn_blocking(move || -> Result<usize> {
        let text = extract::extract_text(&file)?;
        let chunks = chunk_text(&text, config.chunking.chunk_size, config.chunking.overlap);
        if chunks.is_empty() {
            return Err(AskdocError::InvalidInput(
                "Document produced no chunks".to_string(),
            ));
        }

        let progress = ProgressBar::new(chunks.len() as u64);
        let mut embeddings = Vec::with_capacity(chunks.len());
        for batch in chunks.chunks(config.gemini.batch_size) {
            embeddings.extend(client.embed_documents(batch)?);
            progress.inc(batch.len() as u64);
        }
        progress.finish_and_clear();

        let mut store = VectorStore::new(&id, &data_dir, config.gemini.embedding_dimension);
        store.create_index(chunks, embeddings)?;

        let locks = DocumentLocks::new();
        let lock = locks.for_document(&id);
        let _guard = lock.lock().unwrap_or_else(PoisonError::into_inner);
        store.save()?;

        Ok(store.vector_count())
    })
    .await
    .context("Ingestion task panicked")??;

    println!("Indexed document {document_id} ({chunk_count} chunks)");
    Ok(document_id)
}

/// One-shot question flow shared by `ask` and `chat`: admission check,
/// query embedding, context retrieval, answer generation.
#[inline]
pub fn answer_question(
    limiter: &RateLimiter,
    gemini: &GeminiClient,
    retriever: &Retriever,
    top_k: usize,
    document_id: &str,
    question: &str,
    client_id: &str,
) -> Result<(String, RateDecision)> {
    let decision = limiter.check_and_admit(client_id, Utc::now());
    if !decision.admitted {
        return Err(AskdocError::RateLimited {
            remaining: 0,
            reset_at: decision.reset_at,
        });
    }

    if !retriever.document_exists(document_id) {
        return Err(AskdocError::NotFound(document_id.to_string()));
    }

    let query_embedding = gemini.embed_query(question)?;
    let context = retriever.build_context(document_id, &query_embedding, top_k)?;
    let answer = gemini.generate_answer(question, &context)?;

    Ok((answer, decision))
}

/// Answer a single question against an ingested document.
#[inline]
pub async fn ask(
    config: Config,
    document_id: String,
    question: String,
    client_id: String,
) -> Result<()> {
    let gemini = GeminiClient::new(&config)?;
    let limiter = RateLimiter::from_config(&config.rate_limit);
    let retriever = Retriever::new(
        config.data_dir(),
        config.gemini.embedding_dimension,
        DocumentLocks::new(),
    );
    let top_k = config.retrieval.top_k;

    let (answer, decision) = tokio::task::spawn_blocking(move || {
        answer_question(
            &limiter, &gemini, &retriever, top_k, &document_id, &question, &client_id,
        )
    })
    .await
    .context("Question task panicked")??;

    println!("{answer}");
    println!();
    println!(
        "({} questions remaining, quota resets at {})",
        decision.remaining, decision.reset_at
    );
    Ok(())
}

/// Interactive question loop against one document. The rate limiter
/// governs every question in the session; `:quota` shows the remaining
/// allowance without consuming a request.
#[inline]
pub async fn chat(config: Config, document_id: String, client_id: String) -> Result<()> {
    let gemini = GeminiClient::new(&config)?;
    let limiter = RateLimiter::from_config(&config.rate_limit);
    let retriever = Retriever::new(
        config.data_dir(),
        config.gemini.embedding_dimension,
        DocumentLocks::new(),
    );
    let top_k = config.retrieval.top_k;

    if !retriever.document_exists(&document_id) {
        return Err(AskdocError::NotFound(document_id));
    }

    println!("Chatting with document {document_id}.");
    println!("Type a question, ':quota' for your remaining allowance, or 'exit' to leave.");

    tokio::task::spawn_blocking(move || -> Result<()> {
        let stdin = std::io::stdin();
        for line in stdin.lock().lines() {
            let line = line?;
            let question = line.trim();

            if question.is_empty() {
                continue;
            }
            if question == "exit" || question == "quit" {
                break;
            }
            if question == ":quota" {
                let status = limiter.peek(&client_id, Utc::now());
                println!(
                    "{} questions remaining, quota resets at {}",
                    status.remaining, status.reset_at
                );
                continue;
            }

            match answer_question(
                &limiter, &gemini, &retriever, top_k, &document_id, question, &client_id,
            ) {
                Ok((answer, decision)) => {
                    println!();
                    println!("{answer}");
                    println!();
                    println!(
                        "({} questions remaining, quota resets at {})",
                        decision.remaining, decision.reset_at
                    );
                }
                Err(AskdocError::RateLimited { reset_at, .. }) => {
                    println!("Rate limit reached. Try again after {reset_at}.");
                }
                Err(e) => {
                    warn!("Question failed: {e}");
                    println!("Could not answer that question: {e}");
                }
            }
        }
        Ok(())
    })
    .await
    .context("Chat session panicked")??;

    Ok(())
}

/// List every ingested document found in the data directory.
#[inline]
pub async fn list(config: Config) -> Result<()> {
    let data_dir = config.data_dir();
    if !data_dir.exists() {
        println!("No documents have been ingested yet.");
        return Ok(());
    }

    let dimension = config.gemini.embedding_dimension;
    let documents = tokio::task::spawn_blocking(move || -> Result<Vec<(String, Option<usize>)>> {
        let mut documents = Vec::new();
        for entry in std::fs::read_dir(&data_dir)? {
            let path = entry?.path();
            if !path.extension().is_some_and(|ext| ext == "index") {
                continue;
            }
            if let Some(stem) = path.file_stem().and_then(|stem| stem.to_str()) {
                let mut store = VectorStore::new(stem, &data_dir, dimension);
                let count = match store.load() {
                    Ok(()) => Some(store.vector_count()),
                    Err(e) => {
                        warn!("Could not load document {stem}: {e}");
                        None
                    }
                };
                documents.push((stem.to_string(), count));
            }
        }
        documents.sort();
        Ok(documents)
    })
    .await
    .context("Listing task panicked")??;

    if documents.is_empty() {
        println!("No documents have been ingested yet.");
        return Ok(());
    }

    println!("Documents ({} total):", documents.len());
    for (id, count) in documents {
        match count {
            Some(count) => println!("  {id} ({count} chunks)"),
            None => println!("  {id} (unreadable)"),
        }
    }

    Ok(())
}

/// Delete a document's artifacts.
#[inline]
pub async fn delete(config: Config, document_id: String) -> Result<()> {
    let data_dir = config.data_dir();

    let id = document_id.clone();
    tokio::task::spawn_blocking(move || -> Result<()> {
        let locks = DocumentLocks::new();
        let lock = locks.for_document(&id);
        let _guard = lock.lock().unwrap_or_else(PoisonError::into_inner);
        VectorStore::delete(&id, &data_dir)
    })
    .await
    .context("Deletion task panicked")??;

    println!("Deleted document {document_id}");
    Ok(())
}

/// Print the effective configuration.
#[inline]
pub fn show_config(config: &Config) -> Result<()> {
    let rendered = toml::to_string_pretty(config)
        .map_err(|e| AskdocError::Config(format!("Failed to render config: {e}")))?;

    println!("Configuration ({}):", config.config_file_path().display());
    println!();
    print!("{rendered}");
    println!();
    println!("Data directory: {}", config.data_dir().display());
    println!(
        "Gemini API key: {}",
        if config.gemini.api_key.trim().is_empty() {
            "NOT SET (export GEMINI_API_KEY)"
        } else {
            "configured"
        }
    );

    Ok(())
}
