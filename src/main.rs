//! # Mailsense CLI (`mx`)
//!
//! The `mx` binary is the primary interface for Mailsense. It provides
//! commands for database initialization, email indexing, semantic
//! search, question answering, threat scanning, and workflow runs.
//!
//! ## Usage
//!
//! ```bash
//! mx --config ./config/mx.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `mx init` | Create the SQLite database and run schema migrations |
//! | `mx index <file.json>` | Normalize, chunk, embed, and store emails |
//! | `mx search "<query>"` | Ranked semantic search over the index |
//! | `mx ask "<question>"` | Citation-grounded answer over the corpus |
//! | `mx threats` | Threat-scan the most recently indexed messages |
//! | `mx workflow "<query>"` | Run the full staged pipeline for a query |
//! | `mx executions` | List or inspect stored workflow executions |

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

use mailsense::{classify, config, db, index, migrate, normalize, rag, search, threat, workflow};

/// Mailsense CLI — a local-first semantic index and analysis engine for
/// email corpora.
///
/// All commands accept a `--config` flag pointing to a TOML configuration
/// file. See `config/mx.example.toml` for a full example.
#[derive(Parser)]
#[command(
    name = "mx",
    about = "Mailsense — a local-first semantic index and analysis engine for email corpora",
    version,
    long_about = "Mailsense ingests email datasets, chunks and embeds message bodies into a \
    SQLite vector store, answers questions with citation-grounded retrieval, flags \
    phishing-shaped messages with a heuristic threat scorer, and ties it all together in a \
    staged, traceable workflow."
)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./config/mx.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

/// Top-level CLI commands.
#[derive(Subcommand)]
enum Commands {
    /// Initialize the database schema.
    ///
    /// Creates the SQLite database file and all required tables
    /// (messages, chunks, chunk_vectors, workflow_executions).
    /// This command is idempotent — running it multiple times is safe.
    Init,

    /// Index an email dataset.
    ///
    /// Reads a JSON array of email records, normalizes them, chunks the
    /// bodies, embeds each chunk, and stores everything in SQLite.
    /// Re-indexing unchanged content is a no-op.
    Index {
        /// Path to a JSON file containing an array of email records.
        file: PathBuf,
    },

    /// Search indexed messages semantically.
    ///
    /// Embeds the query, scores it against stored chunk vectors, and
    /// prints ranked per-message results with scores and snippets.
    Search {
        /// The search query string.
        query: String,

        /// Maximum number of results to return.
        #[arg(long)]
        top_k: Option<usize>,

        /// Minimum similarity for a result (0.0 to 1.0).
        #[arg(long)]
        threshold: Option<f64>,
    },

    /// Ask a question over the indexed corpus.
    ///
    /// Retrieves relevant messages and generates an answer with
    /// citations back to the source messages. Without a configured
    /// language model the answer is built directly from the retrieved
    /// context.
    Ask {
        /// The question to answer.
        question: String,

        /// Maximum number of messages to retrieve.
        #[arg(long)]
        top_k: Option<usize>,
    },

    /// Threat-scan recently indexed messages.
    ///
    /// Runs the heuristic detectors over the most recent messages and
    /// prints per-message levels, indicators, and recommendations.
    Threats {
        /// How many recent messages to scan.
        #[arg(long)]
        limit: Option<usize>,
    },

    /// Run the full staged workflow for a query.
    ///
    /// Detects intent, searches and analyzes the corpus concurrently,
    /// generates a cited answer, and records the execution trace.
    Workflow {
        /// The query to run.
        query: String,

        /// Maximum number of messages to retrieve.
        #[arg(long)]
        top_k: Option<usize>,
    },

    /// List or inspect stored workflow executions.
    Executions {
        /// Show the full stored trace for one execution id.
        id: Option<String>,

        /// Maximum number of executions to list.
        #[arg(long, default_value_t = 20)]
        limit: usize,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let cfg = config::load_config(&cli.config)?;
    let pool = db::connect(&cfg).await?;

    match cli.command {
        Commands::Init => {
            migrate::run_migrations(&pool).await?;
            println!("Database initialized successfully.");
        }
        Commands::Index { file } => {
            migrate::run_migrations(&pool).await?;
            let messages = normalize::load_messages(&file)?;
            let stats = index::index_messages(&pool, &cfg, &messages).await?;
            println!(
                "Indexed {} message(s), {} chunk(s).",
                stats.messages_indexed, stats.chunks_created
            );
        }
        Commands::Search {
            query,
            top_k,
            threshold,
        } => {
            let top_k = top_k.unwrap_or(cfg.search.top_k);
            let threshold = threshold.unwrap_or(cfg.search.score_threshold);
            let outcome = search::run_query(&pool, &cfg, &query, top_k, threshold).await?;

            if outcome.results.is_empty() {
                println!("No results. ({} ms)", outcome.latency_ms);
            } else {
                println!(
                    "{} result(s) in {} ms:\n",
                    outcome.results.len(),
                    outcome.latency_ms
                );
                for (i, r) in outcome.results.iter().enumerate() {
                    println!("{}. [{:.3}] {} ({})", i + 1, r.score, r.subject, r.message_id);
                    println!("   {}\n", r.snippet.replace('\n', " "));
                }
            }
        }
        Commands::Ask { question, top_k } => {
            let top_k = top_k.unwrap_or(cfg.search.top_k);
            let answer = rag::answer(&pool, &cfg, &question, top_k).await?;

            println!("{}\n", answer.answer);
            if !answer.citations.is_empty() {
                println!("Sources:");
                for c in &answer.citations {
                    println!("  [{}] (confidence {:.3})", c.message_id, c.confidence);
                }
            }
            if answer.fallback {
                println!("\n(answer built from retrieved context; no language model used)");
            }
        }
        Commands::Threats { limit } => {
            let limit = limit.unwrap_or(cfg.threat.scan_window);
            let messages = index::recent_messages(&pool, limit).await?;
            let scorer = threat::ThreatScorer::new(&cfg.threat)?;
            let report = scorer.assess_batch(&messages);

            println!(
                "Scanned {} message(s): {} safe, {} caution, {} warning, {} critical\n",
                report.assessments.len(),
                report.safe_count,
                report.caution_count,
                report.warning_count,
                report.critical_count
            );
            for a in report
                .assessments
                .iter()
                .filter(|a| !a.indicators.is_empty())
            {
                println!(
                    "{} [{:.2}] {}",
                    a.threat_level.as_str(),
                    a.threat_score,
                    a.message_id
                );
                for ind in &a.indicators {
                    println!("  - {}: {} ({})", ind.name, ind.description, ind.evidence);
                }
                println!("  {}\n", a.recommendation);
            }
        }
        Commands::Workflow { query, top_k } => {
            let top_k = top_k.unwrap_or(cfg.search.top_k);
            let execution = workflow::execute(&pool, &cfg, &query, top_k).await;

            println!(
                "Execution {} ({:?}) — intent: {}",
                execution.id,
                execution.overall_status,
                classify::detect_intent(&query).as_str()
            );
            for step in &execution.steps {
                match &step.error {
                    Some(e) => println!("  {} [{:?}] {} ms — {}", step.agent_name, step.status, step.duration_ms, e),
                    None => println!("  {} [{:?}] {} ms", step.agent_name, step.status, step.duration_ms),
                }
            }
            if let Some(result) = &execution.final_result {
                if let Some(answer) = result.get("answer").and_then(|a| a.as_str()) {
                    println!("\n{}", answer);
                }
            }
        }
        Commands::Executions { id, limit } => match id {
            Some(id) => match workflow::get_execution(&pool, &id).await? {
                Some(payload) => println!("{}", serde_json::to_string_pretty(&payload)?),
                None => println!("No execution found with id {}", id),
            },
            None => {
                let executions = workflow::recent_executions(&pool, limit).await?;
                if executions.is_empty() {
                    println!("No stored executions.");
                } else {
                    for e in executions {
                        println!("{}  {:<9}  {}", e.id, e.status, e.query);
                    }
                }
            }
        },
    }

    Ok(())
}
