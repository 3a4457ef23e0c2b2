//! Retrieval-augmented answering over the message index.
//!
//! The question is expanded, run through semantic search, and the
//! retrieved snippets become the generation context. Every citation on
//! the returned answer refers to a message that was actually retrieved
//! for this question; the generator can narrow the citation set but
//! never widen it.
//!
//! Generation itself never fails the pipeline. If the language model is
//! disabled or errors, a deterministic context-only answer is returned
//! instead. The only hard failure is the retrieval step.

use sqlx::SqlitePool;
use tracing::{debug, warn};

use crate::classify;
use crate::config::Config;
use crate::error::SearchError;
use crate::llm;
use crate::models::{Citation, RagAnswer, SearchResult};
use crate::search;

/// Most results fed into the generation context.
const MAX_CONTEXT_RESULTS: usize = 8;

const SYSTEM_PROMPT: &str = "You are an assistant answering questions about a user's email. \
Answer only from the provided context blocks. Each block is tagged with a message id in \
square brackets; mention the ids of the messages you used. If the context does not contain \
the answer, say so.";

/// Answer a question against the indexed corpus.
pub async fn answer(
    pool: &SqlitePool,
    config: &Config,
    question: &str,
    top_k: usize,
) -> Result<RagAnswer, SearchError> {
    let expanded = classify::expand_query(question);
    if expanded != question {
        debug!(original = question, expanded = %expanded, "query expanded");
    }

    let outcome = search::run_query(
        pool,
        config,
        &expanded,
        top_k,
        config.search.score_threshold,
    )
    .await?;

    Ok(generate(config, question, &outcome.results).await)
}

/// Produce an answer from already-retrieved results. Never errors; a
/// generation failure degrades to the context-only fallback.
pub async fn generate(config: &Config, question: &str, results: &[SearchResult]) -> RagAnswer {
    if results.is_empty() {
        return RagAnswer {
            answer: "I couldn't find any information about that in the indexed messages."
                .to_string(),
            citations: Vec::new(),
            fallback: true,
        };
    }

    let context_results = &results[..results.len().min(MAX_CONTEXT_RESULTS)];
    let context = build_context(context_results);
    let citations = citations_for(context_results);

    if config.llm.is_enabled() {
        let user = format!("Context:\n{}\n\nQuestion: {}", context, question);
        match llm::complete(&config.llm, SYSTEM_PROMPT, &user).await {
            Ok(text) => {
                // Keep only citations the model actually referenced,
                // unless it referenced none.
                let mentioned: Vec<Citation> = citations
                    .iter()
                    .filter(|c| text.contains(&c.message_id))
                    .cloned()
                    .collect();
                return RagAnswer {
                    answer: text,
                    citations: if mentioned.is_empty() {
                        citations
                    } else {
                        mentioned
                    },
                    fallback: false,
                };
            }
            Err(e) => {
                warn!(error = %e, "generation failed, using context fallback");
            }
        }
    }

    RagAnswer {
        answer: fallback_answer(question, context_results),
        citations,
        fallback: true,
    }
}

fn build_context(results: &[SearchResult]) -> String {
    results
        .iter()
        .map(|r| format!("[{}] {}\n{}", r.message_id, r.subject, r.snippet))
        .collect::<Vec<_>>()
        .join("\n\n")
}

fn citations_for(results: &[SearchResult]) -> Vec<Citation> {
    results
        .iter()
        .map(|r| Citation {
            message_id: r.message_id.clone(),
            excerpt: r.snippet.clone(),
            confidence: r.score,
        })
        .collect()
}

/// Deterministic answer built directly from the retrieved context.
fn fallback_answer(question: &str, results: &[SearchResult]) -> String {
    let mut out = format!(
        "Found {} relevant message(s) for \"{}\":\n",
        results.len(),
        question
    );
    for r in results {
        out.push_str(&format!("- [{}] {}: {}\n", r.message_id, r.subject, r.snippet));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn result(id: &str, score: f64) -> SearchResult {
        SearchResult {
            message_id: id.to_string(),
            score,
            subject: format!("subject {}", id),
            timestamp: 0,
            snippet: format!("snippet {}", id),
        }
    }

    #[test]
    fn test_context_tags_message_ids() {
        let context = build_context(&[result("m1", 0.9), result("m2", 0.5)]);
        assert!(context.contains("[m1]"));
        assert!(context.contains("[m2]"));
    }

    #[test]
    fn test_citations_carry_scores_as_confidence() {
        let citations = citations_for(&[result("m1", 0.9)]);
        assert_eq!(citations.len(), 1);
        assert_eq!(citations[0].message_id, "m1");
        assert_eq!(citations[0].confidence, 0.9);
    }

    #[tokio::test]
    async fn test_generate_without_results_is_citation_free_fallback() {
        let config = Config::for_db_path(std::path::PathBuf::from("/tmp/ms.db"));
        let answer = generate(&config, "anything", &[]).await;
        assert!(answer.fallback);
        assert!(answer.citations.is_empty());
        assert!(!answer.answer.is_empty());
    }

    #[tokio::test]
    async fn test_generate_with_llm_disabled_cites_retrieved_messages() {
        let config = Config::for_db_path(std::path::PathBuf::from("/tmp/ms.db"));
        let results = vec![result("m1", 0.9), result("m2", 0.5)];
        let answer = generate(&config, "budget?", &results).await;
        assert!(answer.fallback);
        assert_eq!(answer.citations.len(), 2);
        assert!(answer
            .citations
            .iter()
            .all(|c| results.iter().any(|r| r.message_id == c.message_id)));
    }

    #[test]
    fn test_fallback_answer_lists_every_result() {
        let text = fallback_answer("budget?", &[result("m1", 0.9), result("m2", 0.5)]);
        assert!(text.contains("[m1]"));
        assert!(text.contains("[m2]"));
        assert!(text.contains("budget?"));
    }
}
