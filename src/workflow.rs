//! Staged workflow orchestration for a single user query.
//!
//! Stages:
//!
//! 1. `intent` detects what the query asks for.
//! 2. `search` and `analysis` run concurrently: search retrieves from
//!    the vector index while analysis classifies and threat-scans the
//!    most recently indexed messages. Neither consumes the other's
//!    output.
//! 3. `answer` generates a cited answer from the search results.
//! 4. `persist` records the execution.
//!
//! Search is the only stage whose failure fails the execution. Any
//! other stage error downgrades the outcome to `partial`; a persistence
//! error is logged and never masks the computed result.

use anyhow::Result;
use serde_json::json;
use sqlx::SqlitePool;
use std::time::Instant;
use tracing::{info, warn};
use uuid::Uuid;

use crate::classify;
use crate::config::Config;
use crate::error::PersistenceError;
use crate::index;
use crate::models::{
    ExecutionStatus, SearchResult, StepStatus, ThreatLevel, WorkflowExecution, WorkflowStep,
};
use crate::rag;
use crate::search;
use crate::threat::ThreatScorer;

/// Run the full staged pipeline for one query.
pub async fn execute(
    pool: &SqlitePool,
    config: &Config,
    query: &str,
    top_k: usize,
) -> WorkflowExecution {
    let execution_id = Uuid::new_v4().to_string();
    let mut steps: Vec<WorkflowStep> = Vec::new();

    // Stage 1: intent.
    let timer = StepTimer::start();
    let intent = classify::detect_intent(query);
    steps.push(timer.completed(
        "intent",
        json!({ "intent": intent.as_str() }),
    ));

    // Stage 2: search and corpus analysis, concurrently.
    let expanded = classify::expand_query(query);
    let search_timer = StepTimer::start();
    let analysis_timer = StepTimer::start();
    let (search_result, analysis_result) = tokio::join!(
        search::run_query(pool, config, &expanded, top_k, config.search.score_threshold),
        analyze_corpus(pool, config),
    );

    let mut search_failed = false;
    let mut results: Vec<SearchResult> = Vec::new();
    match search_result {
        Ok(outcome) => {
            steps.push(search_timer.completed(
                "search",
                json!({
                    "expanded_query": expanded,
                    "result_count": outcome.results.len(),
                    "latency_ms": outcome.latency_ms,
                    "results": outcome.results,
                }),
            ));
            results = outcome.results;
        }
        Err(e) => {
            search_failed = true;
            steps.push(search_timer.errored("search", e.to_string()));
        }
    }

    match analysis_result {
        Ok(payload) => steps.push(analysis_timer.completed("analysis", payload)),
        Err(e) => steps.push(analysis_timer.errored("analysis", e.to_string())),
    }

    // Stage 3: answer from whatever search produced. Skipped entirely
    // when search failed since there is nothing grounded to answer from.
    let mut final_result = None;
    if !search_failed {
        let timer = StepTimer::start();
        let answer = rag::generate(config, query, &results).await;
        let payload = json!({
            "intent": intent.as_str(),
            "answer": answer.answer,
            "citations": answer.citations,
            "fallback": answer.fallback,
        });
        steps.push(timer.completed("answer", payload.clone()));
        final_result = Some(payload);
    }

    let any_error = steps.iter().any(|s| s.status == StepStatus::Error);
    let overall_status = if search_failed {
        ExecutionStatus::Failed
    } else if any_error {
        ExecutionStatus::Partial
    } else {
        ExecutionStatus::Completed
    };

    let mut execution = WorkflowExecution {
        id: execution_id,
        query: query.to_string(),
        steps,
        overall_status,
        final_result,
    };

    // Stage 4: persist. A failure here is recorded on the execution and
    // logged, but the computed result is still returned to the caller.
    let timer = StepTimer::start();
    match persist(pool, &execution).await {
        Ok(()) => {
            execution
                .steps
                .push(timer.completed("persist", json!({ "stored": true })));
        }
        Err(e) => {
            warn!(execution_id = %execution.id, error = %e, "failed to persist execution");
            execution.steps.push(timer.errored("persist", e.to_string()));
            if execution.overall_status == ExecutionStatus::Completed {
                execution.overall_status = ExecutionStatus::Partial;
            }
        }
    }

    info!(
        execution_id = %execution.id,
        status = ?execution.overall_status,
        steps = execution.steps.len(),
        "workflow finished"
    );
    execution
}

/// Classify and threat-scan the most recently indexed messages.
async fn analyze_corpus(pool: &SqlitePool, config: &Config) -> Result<serde_json::Value> {
    let messages = index::recent_messages(pool, config.threat.scan_window).await?;
    let classes = classify::classify_messages(&messages);
    let scorer = ThreatScorer::new(&config.threat)?;
    let report = scorer.assess_batch(&messages);

    let flagged: Vec<serde_json::Value> = report
        .assessments
        .iter()
        .filter(|a| a.threat_level != ThreatLevel::Safe)
        .map(|a| {
            json!({
                "message_id": a.message_id,
                "level": a.threat_level.as_str(),
                "score": a.threat_score,
                "recommendation": a.recommendation,
            })
        })
        .collect();

    Ok(json!({
        "messages_scanned": messages.len(),
        "classifications": classes,
        "threats": {
            "safe": report.safe_count,
            "caution": report.caution_count,
            "warning": report.warning_count,
            "critical": report.critical_count,
            "flagged": flagged,
        },
    }))
}

async fn persist(pool: &SqlitePool, execution: &WorkflowExecution) -> Result<(), PersistenceError> {
    let payload = serde_json::to_string(execution)?;
    let status = match execution.overall_status {
        ExecutionStatus::Running => "running",
        ExecutionStatus::Completed => "completed",
        ExecutionStatus::Partial => "partial",
        ExecutionStatus::Failed => "failed",
    };
    sqlx::query(
        r#"
        INSERT INTO workflow_executions (id, query, status, payload, created_at)
        VALUES (?, ?, ?, ?, ?)
        ON CONFLICT(id) DO UPDATE SET
            status = excluded.status,
            payload = excluded.payload
        "#,
    )
    .bind(&execution.id)
    .bind(&execution.query)
    .bind(status)
    .bind(payload)
    .bind(chrono::Utc::now().timestamp())
    .execute(pool)
    .await?;
    Ok(())
}

/// Stored summary row for a past execution.
#[derive(Debug, Clone, serde::Serialize)]
pub struct ExecutionSummary {
    pub id: String,
    pub query: String,
    pub status: String,
    pub created_at: i64,
}

/// Fetch one stored execution payload by id.
pub async fn get_execution(
    pool: &SqlitePool,
    id: &str,
) -> Result<Option<serde_json::Value>, PersistenceError> {
    let payload: Option<String> =
        sqlx::query_scalar("SELECT payload FROM workflow_executions WHERE id = ?")
            .bind(id)
            .fetch_optional(pool)
            .await?;
    match payload {
        Some(p) => Ok(Some(serde_json::from_str(&p)?)),
        None => Ok(None),
    }
}

/// List recent executions, newest first.
pub async fn recent_executions(
    pool: &SqlitePool,
    limit: usize,
) -> Result<Vec<ExecutionSummary>, PersistenceError> {
    let rows: Vec<(String, String, String, i64)> = sqlx::query_as(
        r#"
        SELECT id, query, status, created_at
        FROM workflow_executions
        ORDER BY created_at DESC, id ASC
        LIMIT ?
        "#,
    )
    .bind(limit as i64)
    .fetch_all(pool)
    .await?;

    Ok(rows
        .into_iter()
        .map(|(id, query, status, created_at)| ExecutionSummary {
            id,
            query,
            status,
            created_at,
        })
        .collect())
}

/// Captures a step's start time and measures its duration.
struct StepTimer {
    started_at: i64,
    instant: Instant,
}

impl StepTimer {
    fn start() -> Self {
        Self {
            started_at: chrono::Utc::now().timestamp_millis(),
            instant: Instant::now(),
        }
    }

    fn completed(self, agent_name: &str, result: serde_json::Value) -> WorkflowStep {
        WorkflowStep {
            id: Uuid::new_v4().to_string(),
            agent_name: agent_name.to_string(),
            status: StepStatus::Completed,
            started_at: self.started_at,
            duration_ms: self.instant.elapsed().as_millis() as u64,
            result: Some(result),
            error: None,
        }
    }

    fn errored(self, agent_name: &str, error: String) -> WorkflowStep {
        WorkflowStep {
            id: Uuid::new_v4().to_string(),
            agent_name: agent_name.to_string(),
            status: StepStatus::Error,
            started_at: self.started_at,
            duration_ms: self.instant.elapsed().as_millis() as u64,
            result: None,
            error: Some(error),
        }
    }
}
