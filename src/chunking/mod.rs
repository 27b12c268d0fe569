
use tracing::debug;

/// Split extracted document text into overlapping chunks sized for embedding.
///
/// Positions are measured in characters, not bytes. Each window is at most
/// `chunk_size` characters; when the window does not reach the end of the
/// text, the chunk is truncated just after the last sentence or paragraph
/// boundary (`.` or `\n`) inside it, provided that boundary falls past the
/// window midpoint. Chunks are trimmed and empty ones dropped, so page
/// markers and blank regions never produce empty entries.
///
/// Callers are expected to keep `overlap < chunk_size`
/// (`Config::validate` enforces this); as a safeguard the cursor always
/// advances by at least one character, so a misconfigured call degrades
/// into dense chunks instead of looping forever.
#[inline]
pub fn chunk_text(text: &str, chunk_size: usize, overlap: usize) -> Vec<String> {
    if text.is_empty() || chunk_size == 0 {
        return Vec::new();
    }

    let chars: Vec<char> = text.chars().collect();
    let total = chars.len();
    let mut chunks = Vec::new();
    let mut start = 0;

    while start < total {
        // Logical end of the window; may exceed the text on the final chunk.
        let mut end = start + chunk_size;

        if end < total {
            // Last sentence or paragraph boundary inside the window,
            // whichever comes later.
            if let Some(break_point) = chars[start..end]
                .iter()
                .rposition(|&c| c == '.' || c == '\n')
            {
                // A boundary before the midpoint would leave a degenerate
                // tiny chunk; keep the full window in that case.
                if break_point > chunk_size / 2 {
                    end = start + break_point + 1;
                }
            }
        }

        let slice_end = end.min(total);
        let chunk: String = chars[start..slice_end].iter().collect();
        let trimmed = chunk.trim();
        if !trimmed.is_empty() {
            chunks.push(trimmed.to_string());
        }

        start = end.saturating_sub(overlap).max(start + 1);
    }

    debug!(
        "Chunked {} characters into {} chunks (size {}, overlap {})",
        total,
        chunks.len(),
        chunk_size,
        overlap
    );

    chunks
}
