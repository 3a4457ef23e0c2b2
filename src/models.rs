//! Core data models used throughout mailsense.
//!
//! These types represent the messages, chunks, search results, threat
//! assessments, and workflow records that flow through the indexing,
//! retrieval, and orchestration pipeline.

use serde::{Deserialize, Serialize};

/// Raw email record as it appears in a JSON dataset, before normalization.
#[derive(Debug, Clone, Deserialize)]
pub struct RawEmail {
    pub id: String,
    #[serde(rename = "from")]
    pub from_addr: String,
    pub to: String,
    pub subject: String,
    pub date: String,
    pub body: String,
}

/// Normalized message. Immutable once produced; the source of truth for
/// all derived data (chunks, embeddings, assessments).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub id: String,
    pub sender: String,
    pub recipients: Vec<String>,
    pub subject: String,
    pub body: String,
    /// Unix timestamp (seconds).
    pub timestamp: i64,
}

/// A bounded span of a message's body used as the unit of embedding
/// and retrieval.
#[derive(Debug, Clone)]
pub struct Chunk {
    /// Deterministic id: `"{message_id}_chunk_{index}"`.
    pub id: String,
    pub message_id: String,
    pub chunk_index: i64,
    /// Byte offset of the chunk within the message body.
    pub offset: i64,
    pub text: String,
    /// SHA-256 of the chunk text, used for embedding staleness detection.
    pub hash: String,
}

/// Counters returned by the indexing pipeline.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct IndexStats {
    pub messages_indexed: u64,
    pub chunks_created: u64,
}

/// A ranked search result. Ephemeral; produced per query and never
/// persisted outside a workflow execution record.
#[derive(Debug, Clone, Serialize)]
pub struct SearchResult {
    pub message_id: String,
    /// Similarity in `[0, 1]` (cosine convention).
    pub score: f64,
    pub subject: String,
    pub timestamp: i64,
    pub snippet: String,
}

/// Search results plus the wall-clock latency of the query.
#[derive(Debug, Clone, Serialize)]
pub struct SearchOutcome {
    pub results: Vec<SearchResult>,
    pub latency_ms: u64,
}

/// Four-band heuristic classification of message risk.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ThreatLevel {
    Safe,
    Caution,
    Warning,
    Critical,
}

impl ThreatLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            ThreatLevel::Safe => "SAFE",
            ThreatLevel::Caution => "CAUTION",
            ThreatLevel::Warning => "WARNING",
            ThreatLevel::Critical => "CRITICAL",
        }
    }
}

/// A single named signal raised by a threat detector.
#[derive(Debug, Clone, Serialize)]
pub struct ThreatIndicator {
    /// Indicator name, e.g. `urgency_language`, `suspicious_domain`.
    pub name: String,
    pub description: String,
    pub evidence: String,
}

/// Complete threat assessment for one message. Deterministic for a
/// given message content.
#[derive(Debug, Clone, Serialize)]
pub struct ThreatAssessment {
    pub message_id: String,
    pub threat_level: ThreatLevel,
    /// Combined score in `[0, 1]`.
    pub threat_score: f64,
    pub indicators: Vec<ThreatIndicator>,
    pub recommendation: String,
}

/// Batch assessment with per-level counts.
#[derive(Debug, Clone, Serialize)]
pub struct ThreatReport {
    pub assessments: Vec<ThreatAssessment>,
    pub safe_count: usize,
    pub caution_count: usize,
    pub warning_count: usize,
    pub critical_count: usize,
}

/// A source reference attached to a generated answer. Always traceable
/// to a search result that fed the generation context.
#[derive(Debug, Clone, Serialize)]
pub struct Citation {
    pub message_id: String,
    pub excerpt: String,
    pub confidence: f64,
}

/// Answer plus citations returned by the answer generator.
#[derive(Debug, Clone, Serialize)]
pub struct RagAnswer {
    pub answer: String,
    pub citations: Vec<Citation>,
    /// True when the deterministic context-only fallback produced the
    /// answer instead of a language model.
    pub fallback: bool,
}

/// Lifecycle of a single workflow step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StepStatus {
    Pending,
    Running,
    Completed,
    Error,
}

/// Terminal state of a whole execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExecutionStatus {
    Running,
    Completed,
    Partial,
    Failed,
}

/// One recorded step of a workflow execution.
#[derive(Debug, Clone, Serialize)]
pub struct WorkflowStep {
    pub id: String,
    pub agent_name: String,
    pub status: StepStatus,
    /// Unix timestamp in milliseconds.
    pub started_at: i64,
    pub duration_ms: u64,
    /// Step output payload when completed.
    pub result: Option<serde_json::Value>,
    /// Error message when the step failed.
    pub error: Option<String>,
}

/// One complete, traceable run of the staged pipeline for a single
/// user query. Owned by the orchestrator while running; read-only once
/// terminal.
#[derive(Debug, Clone, Serialize)]
pub struct WorkflowExecution {
    pub id: String,
    pub query: String,
    pub steps: Vec<WorkflowStep>,
    pub overall_status: ExecutionStatus,
    pub final_result: Option<serde_json::Value>,
}
