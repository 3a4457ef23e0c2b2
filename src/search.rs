//! Semantic search over the chunk vector index.
//!
//! The query is embedded with the same provider used at index time,
//! scored against stored vectors by cosine similarity (clamped to
//! `[0, 1]`), thresholded, deduplicated to the best-scoring chunk per
//! message, and ordered by score descending with ties broken by the
//! more recent message timestamp.
//!
//! An empty result list is a valid terminal state, not a failure.

use sqlx::{Row, SqlitePool};
use std::collections::HashMap;
use std::time::Instant;
use tracing::debug;

use crate::config::{Config, MAX_TOP_K};
use crate::embedding;
use crate::error::SearchError;
use crate::models::{SearchOutcome, SearchResult};

/// Run a semantic query and return ranked, per-message results.
pub async fn run_query(
    pool: &SqlitePool,
    config: &Config,
    query: &str,
    top_k: usize,
    score_threshold: f64,
) -> Result<SearchOutcome, SearchError> {
    let started = Instant::now();
    let top_k = top_k.clamp(1, MAX_TOP_K);

    if query.trim().is_empty() {
        return Ok(SearchOutcome {
            results: Vec::new(),
            latency_ms: started.elapsed().as_millis() as u64,
        });
    }

    let query_vec = embedding::embed_query(&config.embedding, query)
        .await
        .map_err(|e| SearchError::Embedding(e.to_string()))?;

    // Brute-force cosine over all stored vectors, in Rust.
    let rows = sqlx::query(
        r#"
        SELECT cv.chunk_id, cv.message_id, cv.embedding,
               COALESCE(substr(c.text, 1, 240), '') AS snippet
        FROM chunk_vectors cv
        JOIN chunks c ON c.id = cv.chunk_id
        "#,
    )
    .fetch_all(pool)
    .await?;

    struct BestChunk {
        score: f64,
        snippet: String,
    }

    // Dedup by message: keep the best-scoring chunk per message.
    let mut best_by_message: HashMap<String, BestChunk> = HashMap::new();

    for row in &rows {
        let blob: Vec<u8> = row.get("embedding");
        let vec = embedding::blob_to_vec(&blob);
        let score = (embedding::cosine_similarity(&query_vec, &vec) as f64).clamp(0.0, 1.0);

        if score < score_threshold {
            continue;
        }

        let message_id: String = row.get("message_id");
        let snippet: String = row.get("snippet");

        let entry = best_by_message.entry(message_id).or_insert_with(|| BestChunk {
            score,
            snippet: snippet.clone(),
        });
        if score > entry.score {
            entry.score = score;
            entry.snippet = snippet;
        }
    }

    // Enrich with message metadata.
    let mut results: Vec<SearchResult> = Vec::new();
    for (message_id, best) in &best_by_message {
        let row = sqlx::query("SELECT subject, timestamp FROM messages WHERE id = ?")
            .bind(message_id)
            .fetch_optional(pool)
            .await?;

        if let Some(row) = row {
            results.push(SearchResult {
                message_id: message_id.clone(),
                score: best.score,
                subject: row.get("subject"),
                timestamp: row.get("timestamp"),
                snippet: best.snippet.clone(),
            });
        }
    }

    // Sort: score desc, timestamp desc, id asc (deterministic).
    results.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then(b.timestamp.cmp(&a.timestamp))
            .then(a.message_id.cmp(&b.message_id))
    });
    results.truncate(top_k);

    let latency_ms = started.elapsed().as_millis() as u64;
    debug!(results = results.len(), latency_ms, "query complete");

    Ok(SearchOutcome {
        results,
        latency_ms,
    })
}
