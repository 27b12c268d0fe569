
use std::path::Path;
use std::process::Command;
use tracing::{debug, warn};

use crate::{AskdocError, Result};

/// Page separator emitted by pdftotext.
const FORM_FEED: char = '\u{000C}';

/// Extract the full text of a PDF using the `pdftotext` binary.
///
/// Each page that yields text is prefixed with a `[Page N]` marker so the
/// chunker's output keeps enough context to cite pages. Pages without
/// extractable text are skipped; only a document with no text at all is an
/// error.
#[inline]
pub fn extract_text(pdf_path: &Path) -> Result<String> {
    let raw = run_pdftotext(pdf_path)?;
    paginate(&raw)
}

/// Number of pages pdftotext reported for the document.
#[inline]
pub fn page_count(pdf_path: &Path) -> Result<usize> {
    let raw = run_pdftotext(pdf_path)?;
    // pdftotext terminates every page with a form feed.
    Ok(raw.matches(FORM_FEED).count())
}

fn run_pdftotext(pdf_path: &Path) -> Result<String> {
    debug!("Extracting text from {}", pdf_path.display());

    let output = Command::new("pdftotext")
        .arg("-enc")
        .arg("UTF-8")
        .arg(pdf_path)
        .arg("-")
        .output()?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(AskdocError::InvalidInput(format!(
            "Failed to extract text from {}: {}",
            pdf_path.display(),
            stderr.trim()
        )));
    }

    Ok(String::from_utf8_lossy(&output.stdout).into_owned())
}

/// Split raw extractor output into pages and re-join the non-empty ones
/// with `[Page N]` markers. Page numbers follow the document's physical
/// order, so skipped pages leave gaps in the numbering.
fn paginate(raw: &str) -> Result<String> {
    let mut pages = Vec::new();

    for (page_index, page_text) in raw.split(FORM_FEED).enumerate() {
        let trimmed = page_text.trim();
        if trimmed.is_empty() {
            continue;
        }

        pages.push(format!("[Page {}]\n{}", page_index + 1, trimmed));
    }

    if pages.len() < raw.split(FORM_FEED).count().saturating_sub(1) {
        warn!(
            "Skipped {} pages with no extractable text",
            raw.split(FORM_FEED).count() - 1 - pages.len()
        );
    }

    if pages.is_empty() {
        return Err(AskdocError::InvalidInput(
            "No extractable text in document".to_string(),
        ));
    }

    Ok(pages.join("\n\n"))
}
