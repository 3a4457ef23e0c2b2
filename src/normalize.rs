//! Message normalization and the file-based message source.
//!
//! Raw email records arrive as JSON with free-form date strings and a
//! single comma-separated recipient field. Normalization produces the
//! uniform [`Message`] shape the rest of the pipeline consumes; the
//! raw record is never touched again after this point.

use anyhow::{Context, Result};
use chrono::DateTime;
use std::path::Path;

use crate::models::{Message, RawEmail};

/// Load raw emails from a JSON file and normalize them.
pub fn load_messages(path: &Path) -> Result<Vec<Message>> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read emails file: {}", path.display()))?;
    let raw: Vec<RawEmail> =
        serde_json::from_str(&content).with_context(|| "Failed to parse emails JSON")?;
    Ok(raw.into_iter().map(normalize_email).collect())
}

/// Convert one raw email into a normalized [`Message`].
pub fn normalize_email(email: RawEmail) -> Message {
    Message {
        id: email.id,
        sender: email.from_addr.trim().to_string(),
        recipients: split_recipients(&email.to),
        subject: email.subject.trim().to_string(),
        body: email.body,
        timestamp: parse_timestamp(&email.date),
    }
}

fn split_recipients(to: &str) -> Vec<String> {
    to.split([',', ';'])
        .map(|r| r.trim().to_string())
        .filter(|r| !r.is_empty())
        .collect()
}

/// Parse a date string into a Unix timestamp.
///
/// Tries RFC 3339, RFC 2822, then bare `YYYY-MM-DD`. Unparseable dates
/// map to 0 rather than failing the whole load.
fn parse_timestamp(date: &str) -> i64 {
    let date = date.trim();

    if let Ok(dt) = DateTime::parse_from_rfc3339(date) {
        return dt.timestamp();
    }
    if let Ok(dt) = DateTime::parse_from_rfc2822(date) {
        return dt.timestamp();
    }
    if let Ok(d) = chrono::NaiveDate::parse_from_str(date, "%Y-%m-%d") {
        if let Some(dt) = d.and_hms_opt(0, 0, 0) {
            return dt.and_utc().timestamp();
        }
    }
    0
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raw(date: &str, to: &str) -> RawEmail {
        RawEmail {
            id: "e1".to_string(),
            from_addr: " alice@example.com ".to_string(),
            to: to.to_string(),
            subject: " Budget review ".to_string(),
            date: date.to_string(),
            body: "Numbers attached.".to_string(),
        }
    }

    #[test]
    fn test_normalize_trims_and_splits() {
        let msg = normalize_email(raw("2026-01-15", "bob@example.com, carol@example.com"));
        assert_eq!(msg.sender, "alice@example.com");
        assert_eq!(msg.subject, "Budget review");
        assert_eq!(msg.recipients.len(), 2);
        assert_eq!(msg.recipients[1], "carol@example.com");
    }

    #[test]
    fn test_parse_rfc3339() {
        let msg = normalize_email(raw("2026-01-15T09:30:00Z", "bob@example.com"));
        assert!(msg.timestamp > 0);
    }

    #[test]
    fn test_parse_rfc2822() {
        let msg = normalize_email(raw("Thu, 15 Jan 2026 09:30:00 +0000", "bob@example.com"));
        assert!(msg.timestamp > 0);
    }

    #[test]
    fn test_unparseable_date_is_zero() {
        let msg = normalize_email(raw("next tuesday", "bob@example.com"));
        assert_eq!(msg.timestamp, 0);
    }

    #[test]
    fn test_load_messages_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("emails.json");
        std::fs::write(
            &path,
            r#"[{"id":"e1","from":"a@x.com","to":"b@x.com","subject":"Hi","date":"2026-01-01","body":"Hello"}]"#,
        )
        .unwrap();
        let messages = load_messages(&path).unwrap();
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].id, "e1");
    }
}
