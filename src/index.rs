//! Indexing pipeline: messages → chunks → embeddings → vector store.
//!
//! Chunk ids are deterministic, so re-indexing unchanged content is a
//! no-op: a chunk whose stored content hash matches is not re-embedded
//! and not rewritten. Each `(chunk, embedding)` pair is committed in
//! its own transaction so concurrent readers never observe a chunk
//! without its vector. There is no rollback across chunks: if the
//! embedding provider fails mid-batch, already-written pairs remain
//! valid (at-least-once semantics).

use sqlx::SqlitePool;
use tracing::{debug, info};

use crate::chunk::chunk_message;
use crate::config::Config;
use crate::embedding;
use crate::error::IndexingError;
use crate::models::{IndexStats, Message};

/// Index a batch of messages into the vector store.
pub async fn index_messages(
    pool: &SqlitePool,
    config: &Config,
    messages: &[Message],
) -> Result<IndexStats, IndexingError> {
    let provider = embedding::create_provider(&config.embedding)
        .map_err(|e| IndexingError::Provider(e.to_string()))?;

    let mut stats = IndexStats {
        messages_indexed: 0,
        chunks_created: 0,
    };

    for message in messages {
        upsert_message(pool, message).await?;

        let chunks = chunk_message(
            &message.id,
            &message.body,
            config.chunking.chunk_chars,
            config.chunking.overlap_chars,
        );

        // Determine which chunks actually need (re-)embedding.
        let mut stale = Vec::new();
        for chunk in &chunks {
            let stored_hash: Option<String> =
                sqlx::query_scalar("SELECT content_hash FROM chunk_vectors WHERE chunk_id = ?")
                    .bind(&chunk.id)
                    .fetch_optional(pool)
                    .await?;
            if stored_hash.as_deref() != Some(chunk.hash.as_str()) {
                stale.push(chunk);
            }
        }

        if !stale.is_empty() {
            let texts: Vec<String> = stale.iter().map(|c| c.text.clone()).collect();
            let vectors = embedding::embed_texts(&config.embedding, &texts)
                .await
                .map_err(|e| IndexingError::Provider(e.to_string()))?;

            for (chunk, vector) in stale.iter().zip(vectors.iter()) {
                write_chunk(pool, chunk, vector, provider.model_name()).await?;
            }
            debug!(
                message_id = %message.id,
                chunks = stale.len(),
                "embedded stale chunks"
            );
        }

        stats.messages_indexed += 1;
        stats.chunks_created += chunks.len() as u64;
    }

    info!(
        messages = stats.messages_indexed,
        chunks = stats.chunks_created,
        "indexing complete"
    );
    Ok(stats)
}

async fn upsert_message(pool: &SqlitePool, message: &Message) -> Result<(), IndexingError> {
    let recipients = message.recipients.join(", ");
    sqlx::query(
        r#"
        INSERT INTO messages (id, sender, recipients, subject, body, timestamp)
        VALUES (?, ?, ?, ?, ?, ?)
        ON CONFLICT(id) DO UPDATE SET
            sender = excluded.sender,
            recipients = excluded.recipients,
            subject = excluded.subject,
            body = excluded.body,
            timestamp = excluded.timestamp
        "#,
    )
    .bind(&message.id)
    .bind(&message.sender)
    .bind(recipients)
    .bind(&message.subject)
    .bind(&message.body)
    .bind(message.timestamp)
    .execute(pool)
    .await?;
    Ok(())
}

/// Write one chunk and its vector atomically.
async fn write_chunk(
    pool: &SqlitePool,
    chunk: &crate::models::Chunk,
    vector: &[f32],
    model: &str,
) -> Result<(), IndexingError> {
    let mut tx = pool.begin().await?;

    sqlx::query(
        r#"
        INSERT INTO chunks (id, message_id, chunk_index, start_offset, text, hash)
        VALUES (?, ?, ?, ?, ?, ?)
        ON CONFLICT(id) DO UPDATE SET
            start_offset = excluded.start_offset,
            text = excluded.text,
            hash = excluded.hash
        "#,
    )
    .bind(&chunk.id)
    .bind(&chunk.message_id)
    .bind(chunk.chunk_index)
    .bind(chunk.offset)
    .bind(&chunk.text)
    .bind(&chunk.hash)
    .execute(&mut *tx)
    .await?;

    sqlx::query(
        r#"
        INSERT INTO chunk_vectors (chunk_id, message_id, embedding, model, dims, content_hash)
        VALUES (?, ?, ?, ?, ?, ?)
        ON CONFLICT(chunk_id) DO UPDATE SET
            embedding = excluded.embedding,
            model = excluded.model,
            dims = excluded.dims,
            content_hash = excluded.content_hash
        "#,
    )
    .bind(&chunk.id)
    .bind(&chunk.message_id)
    .bind(embedding::vec_to_blob(vector))
    .bind(model)
    .bind(vector.len() as i64)
    .bind(&chunk.hash)
    .execute(&mut *tx)
    .await?;

    tx.commit().await?;
    Ok(())
}

/// Fetch the most recently indexed messages, newest first.
///
/// Used by the workflow's corpus classification and threat-scan step.
pub async fn recent_messages(pool: &SqlitePool, limit: usize) -> Result<Vec<Message>, sqlx::Error> {
    let rows: Vec<(String, String, String, String, String, i64)> = sqlx::query_as(
        r#"
        SELECT id, sender, recipients, subject, body, timestamp
        FROM messages
        ORDER BY timestamp DESC, id ASC
        LIMIT ?
        "#,
    )
    .bind(limit as i64)
    .fetch_all(pool)
    .await?;

    Ok(rows
        .into_iter()
        .map(|(id, sender, recipients, subject, body, timestamp)| Message {
            id,
            sender,
            recipients: recipients
                .split(',')
                .map(|r| r.trim().to_string())
                .filter(|r| !r.is_empty())
                .collect(),
            subject,
            body,
            timestamp,
        })
        .collect())
}
