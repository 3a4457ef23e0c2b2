//! Query intent detection, query expansion, and lightweight message
//! classification.
//!
//! Everything here is keyword-driven and deterministic. Intent shapes
//! how the workflow presents its final result; expansion widens recall
//! for queries in a few well-known topic groups before they hit the
//! vector index.

use serde::Serialize;

use crate::models::Message;

/// What the user's query is asking for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum QueryIntent {
    Search,
    Summarization,
    SenderAnalysis,
    Temporal,
}

impl QueryIntent {
    pub fn as_str(&self) -> &'static str {
        match self {
            QueryIntent::Search => "search",
            QueryIntent::Summarization => "summarization",
            QueryIntent::SenderAnalysis => "sender_analysis",
            QueryIntent::Temporal => "temporal",
        }
    }
}

const SUMMARIZATION_TERMS: &[&str] = &["summarize", "summary", "overview", "digest", "recap"];

const SENDER_TERMS: &[&str] = &["who sent", "emails from", "messages from", "sender", "from whom"];

const TEMPORAL_TERMS: &[&str] = &[
    "when",
    "yesterday",
    "today",
    "last week",
    "this week",
    "recent",
    "latest",
];

/// Classify a query into one of the four intents. Falls back to plain
/// search when nothing more specific matches.
pub fn detect_intent(query: &str) -> QueryIntent {
    let q = query.to_lowercase();

    if SUMMARIZATION_TERMS.iter().any(|t| q.contains(t)) {
        QueryIntent::Summarization
    } else if SENDER_TERMS.iter().any(|t| q.contains(t)) {
        QueryIntent::SenderAnalysis
    } else if TEMPORAL_TERMS.iter().any(|t| q.contains(t)) {
        QueryIntent::Temporal
    } else {
        QueryIntent::Search
    }
}

/// Topic groups whose presence in a query widens it with sibling terms.
const EXPANSION_GROUPS: &[(&[&str], &[&str])] = &[
    (
        &["urgent", "critical", "asap", "emergency"],
        &["urgent", "asap", "important", "priority", "deadline"],
    ),
    (
        &["security", "phishing", "suspicious", "scam", "fraud"],
        &["security", "suspicious", "phishing", "alert", "verify"],
    ),
    (
        &["bug", "error", "crash", "broken", "failure"],
        &["bug", "error", "issue", "broken", "fix"],
    ),
];

/// Expand a query with sibling terms for known topic groups.
///
/// Terms already present in the query are not appended again, so
/// expansion is idempotent.
pub fn expand_query(query: &str) -> String {
    let lower = query.to_lowercase();
    let mut expanded = query.to_string();

    for (triggers, additions) in EXPANSION_GROUPS {
        if triggers.iter().any(|t| lower.contains(t)) {
            for term in *additions {
                if !expanded.to_lowercase().contains(term) {
                    expanded.push(' ');
                    expanded.push_str(term);
                }
            }
        }
    }

    expanded
}

/// Keyword-derived classification of one message.
#[derive(Debug, Clone, Serialize)]
pub struct MessageClass {
    pub message_id: String,
    pub category: String,
    pub priority: String,
    pub sentiment: String,
}

const CATEGORY_TABLE: &[(&str, &[&str])] = &[
    (
        "meeting",
        &["meeting", "calendar", "schedule", "invite", "sync", "standup"],
    ),
    (
        "finance",
        &["invoice", "payment", "budget", "expense", "receipt", "salary"],
    ),
    (
        "security",
        &["password", "verify", "suspicious", "phishing", "breach", "login"],
    ),
    (
        "project",
        &["deadline", "milestone", "release", "deploy", "sprint", "review"],
    ),
    (
        "newsletter",
        &["unsubscribe", "newsletter", "weekly digest", "promotion"],
    ),
];

const HIGH_PRIORITY_TERMS: &[&str] = &["urgent", "asap", "immediately", "critical", "deadline"];
const LOW_PRIORITY_TERMS: &[&str] = &["fyi", "no rush", "whenever", "unsubscribe"];

const POSITIVE_TERMS: &[&str] = &["thanks", "great", "congratulations", "appreciate", "well done"];
const NEGATIVE_TERMS: &[&str] = &["problem", "issue", "failed", "complaint", "disappointed"];

/// Classify one message by keyword tables. Category falls back to
/// `"general"`, priority to `"normal"`, sentiment to `"neutral"`.
pub fn classify_message(message: &Message) -> MessageClass {
    let text = format!("{} {}", message.subject, message.body).to_lowercase();

    let category = CATEGORY_TABLE
        .iter()
        .max_by_key(|(_, terms)| terms.iter().filter(|t| text.contains(*t)).count())
        .filter(|(_, terms)| terms.iter().any(|t| text.contains(t)))
        .map(|(name, _)| name.to_string())
        .unwrap_or_else(|| "general".to_string());

    let priority = if HIGH_PRIORITY_TERMS.iter().any(|t| text.contains(t)) {
        "high"
    } else if LOW_PRIORITY_TERMS.iter().any(|t| text.contains(t)) {
        "low"
    } else {
        "normal"
    };

    let positive = POSITIVE_TERMS.iter().filter(|t| text.contains(*t)).count();
    let negative = NEGATIVE_TERMS.iter().filter(|t| text.contains(*t)).count();
    let sentiment = if positive > negative {
        "positive"
    } else if negative > positive {
        "negative"
    } else {
        "neutral"
    };

    MessageClass {
        message_id: message.id.clone(),
        category,
        priority: priority.to_string(),
        sentiment: sentiment.to_string(),
    }
}

/// Classify a batch of messages.
pub fn classify_messages(messages: &[Message]) -> Vec<MessageClass> {
    messages.iter().map(classify_message).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn message(subject: &str, body: &str) -> Message {
        Message {
            id: "m1".to_string(),
            sender: "a@example.com".to_string(),
            recipients: vec!["b@example.com".to_string()],
            subject: subject.to_string(),
            body: body.to_string(),
            timestamp: 0,
        }
    }

    #[test]
    fn test_intent_defaults_to_search() {
        assert_eq!(detect_intent("budget spreadsheet"), QueryIntent::Search);
    }

    #[test]
    fn test_intent_summarization() {
        assert_eq!(
            detect_intent("Summarize my inbox"),
            QueryIntent::Summarization
        );
    }

    #[test]
    fn test_intent_sender_analysis() {
        assert_eq!(
            detect_intent("who sent the invoice?"),
            QueryIntent::SenderAnalysis
        );
    }

    #[test]
    fn test_intent_temporal() {
        assert_eq!(
            detect_intent("what came in last week"),
            QueryIntent::Temporal
        );
    }

    #[test]
    fn test_expand_urgent_query() {
        let expanded = expand_query("urgent items");
        assert!(expanded.starts_with("urgent items"));
        assert!(expanded.contains("asap"));
        assert!(expanded.contains("priority"));
    }

    #[test]
    fn test_expand_is_idempotent() {
        let once = expand_query("urgent items");
        let twice = expand_query(&once);
        assert_eq!(once, twice);
    }

    #[test]
    fn test_expand_leaves_plain_queries_alone() {
        assert_eq!(expand_query("quarterly numbers"), "quarterly numbers");
    }

    #[test]
    fn test_classify_meeting_high_priority() {
        let c = classify_message(&message(
            "Standup moved",
            "urgent: the meeting moved to 9am, update your calendar",
        ));
        assert_eq!(c.category, "meeting");
        assert_eq!(c.priority, "high");
    }

    #[test]
    fn test_classify_general_neutral_default() {
        let c = classify_message(&message("hello", "just checking in"));
        assert_eq!(c.category, "general");
        assert_eq!(c.priority, "normal");
        assert_eq!(c.sentiment, "neutral");
    }

    #[test]
    fn test_classify_negative_sentiment() {
        let c = classify_message(&message(
            "Deployment",
            "the release failed again, this is a real problem",
        ));
        assert_eq!(c.sentiment, "negative");
    }
}
