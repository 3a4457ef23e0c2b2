//! Heuristic threat scoring for messages.
//!
//! Four independent, stateless detectors each produce a partial score
//! in `[0, 1]` plus named indicators:
//!
//! 1. keyword/phrase — urgency pressure and credential-harvesting
//!    phrasing in the subject or body
//! 2. sender domain — suspicious TLDs, known phishing domain shapes,
//!    brand names that do not match the sending domain
//! 3. lexical similarity — edit distance against a trusted-domain list
//!    (typosquatting)
//! 4. link patterns — URL shorteners, raw-IP hosts, credential-bait
//!    paths, and anchor text whose host differs from its href
//!
//! Partial scores combine as `max + bonus × (nonzero_detectors − 1)`,
//! clamped to 1.0: a single strong signal dominates, corroborating weak
//! signals raise confidence. The combined score maps to a four-band
//! level. Scoring is deterministic, side-effect free, and never calls
//! external services; absence of signal is a valid SAFE result.

use anyhow::{Context, Result};
use regex::Regex;

use crate::config::ThreatConfig;
use crate::models::{Message, ThreatAssessment, ThreatIndicator, ThreatLevel, ThreatReport};

const TRUSTED_DOMAINS: &[&str] = &[
    "gmail.com",
    "outlook.com",
    "yahoo.com",
    "icloud.com",
    "protonmail.com",
    "google.com",
    "microsoft.com",
    "apple.com",
    "amazon.com",
    "github.com",
    "linkedin.com",
    "paypal.com",
    "slack.com",
    "zoom.com",
    "stripe.com",
];

const CREDENTIAL_PHRASES: &[&str] = &[
    "verify your account",
    "confirm your identity",
    "update your password",
    "confirm your password",
    "validate your account",
    "unusual activity",
    "suspended account",
    "account has been locked",
];

const URGENCY_PHRASES: &[&str] = &[
    "urgent action required",
    "act now",
    "immediately",
    "click here immediately",
    "limited time",
    "within 24 hours",
    "right away",
    "final notice",
];

const SUSPICIOUS_TLDS: &[&str] = &[
    ".tk", ".ml", ".ga", ".cf", ".info", ".biz", ".pw", ".xyz", ".top", ".click",
];

const BRAND_NAMES: &[&str] = &[
    "amazon",
    "apple",
    "microsoft",
    "google",
    "paypal",
    "linkedin",
    "stripe",
];

const CREDENTIAL_BAIT_WORDS: &[&str] = &["secure", "login", "signin", "verify", "account"];

const SHORTENER_HOSTS: &[&str] = &["bit.ly", "tinyurl.com", "goo.gl", "t.co", "x.co", "ow.ly"];

/// Output of one detector: a partial score and its indicators.
struct DetectorOutput {
    score: f64,
    indicators: Vec<ThreatIndicator>,
}

impl DetectorOutput {
    fn clean() -> Self {
        Self {
            score: 0.0,
            indicators: Vec::new(),
        }
    }
}

/// Stateless threat scorer. Construct once, assess many messages.
pub struct ThreatScorer {
    trusted_domains: Vec<String>,
    corroboration_bonus: f64,
    url_re: Regex,
    ip_host_re: Regex,
    anchor_re: Regex,
    phishing_domain_res: Vec<Regex>,
}

impl ThreatScorer {
    pub fn new(config: &ThreatConfig) -> Result<Self> {
        let mut trusted_domains: Vec<String> =
            TRUSTED_DOMAINS.iter().map(|d| d.to_string()).collect();
        for extra in &config.trusted_domains {
            let extra = extra.trim().to_lowercase();
            if !extra.is_empty() && !trusted_domains.contains(&extra) {
                trusted_domains.push(extra);
            }
        }

        let phishing_patterns = [
            r"paypa[l1i]\d*\.",
            r"amazon-(security|support|billing)",
            r"apple-?id",
            r"(account|gmail|outlook)-?verif",
            r"microsoft-?(account|support)",
            r"tax-?refund",
        ];
        let phishing_domain_res = phishing_patterns
            .iter()
            .map(|p| Regex::new(&format!("(?i){}", p)))
            .collect::<std::result::Result<Vec<_>, _>>()
            .context("compiling phishing domain patterns")?;

        Ok(Self {
            trusted_domains,
            corroboration_bonus: config.corroboration_bonus,
            phishing_domain_res,
            url_re: Regex::new(r#"https?://[^\s)>"']+"#).context("compiling url pattern")?,
            ip_host_re: Regex::new(r"^\d{1,3}\.\d{1,3}\.\d{1,3}\.\d{1,3}$")
                .context("compiling ip host pattern")?,
            anchor_re: Regex::new(r#"(?is)<a[^>]+href="([^"]+)"[^>]*>([^<]*)</a>"#)
                .context("compiling anchor pattern")?,
        })
    }

    /// Assess one message. Always returns a result; a message with no
    /// signal is SAFE with score 0.0.
    pub fn assess(&self, message: &Message) -> ThreatAssessment {
        let outputs = [
            self.detect_keywords(message),
            self.detect_sender_domain(message),
            self.detect_typosquatting(message),
            self.detect_links(message),
        ];

        let max_score = outputs.iter().map(|o| o.score).fold(0.0f64, f64::max);
        let nonzero = outputs.iter().filter(|o| o.score > 0.0).count();

        let threat_score = if nonzero == 0 {
            0.0
        } else {
            (max_score + self.corroboration_bonus * (nonzero as f64 - 1.0)).clamp(0.0, 1.0)
        };

        let threat_level = level_for(threat_score);
        let indicators: Vec<ThreatIndicator> =
            outputs.into_iter().flat_map(|o| o.indicators).collect();

        ThreatAssessment {
            message_id: message.id.clone(),
            threat_level,
            threat_score,
            recommendation: recommendation_for(threat_level).to_string(),
            indicators,
        }
    }

    /// Assess a batch and summarize counts per level.
    pub fn assess_batch(&self, messages: &[Message]) -> ThreatReport {
        let assessments: Vec<ThreatAssessment> =
            messages.iter().map(|m| self.assess(m)).collect();

        let count = |level: ThreatLevel| {
            assessments
                .iter()
                .filter(|a| a.threat_level == level)
                .count()
        };

        ThreatReport {
            safe_count: count(ThreatLevel::Safe),
            caution_count: count(ThreatLevel::Caution),
            warning_count: count(ThreatLevel::Warning),
            critical_count: count(ThreatLevel::Critical),
            assessments,
        }
    }

    // ============ Detector 1: keywords/phrases ============

    fn detect_keywords(&self, message: &Message) -> DetectorOutput {
        let text = format!("{} {}", message.subject, message.body).to_lowercase();

        let credential_hits: Vec<&str> = CREDENTIAL_PHRASES
            .iter()
            .filter(|p| text.contains(*p))
            .copied()
            .collect();
        let urgency_hits: Vec<&str> = URGENCY_PHRASES
            .iter()
            .filter(|p| text.contains(*p))
            .copied()
            .collect();

        let total = credential_hits.len() + urgency_hits.len();
        if total == 0 {
            return DetectorOutput::clean();
        }

        let mut indicators = Vec::new();
        if !credential_hits.is_empty() {
            indicators.push(ThreatIndicator {
                name: "credential_phrasing".to_string(),
                description: format!(
                    "{} credential-harvesting phrase(s) found",
                    credential_hits.len()
                ),
                evidence: credential_hits.join(", "),
            });
        }
        if !urgency_hits.is_empty() {
            indicators.push(ThreatIndicator {
                name: "urgency_language".to_string(),
                description: format!("{} urgency phrase(s) found", urgency_hits.len()),
                evidence: urgency_hits.join(", "),
            });
        }

        DetectorOutput {
            score: (0.4 + 0.15 * (total as f64 - 1.0)).min(1.0),
            indicators,
        }
    }

    // ============ Detector 2: sender domain ============

    fn detect_sender_domain(&self, message: &Message) -> DetectorOutput {
        let sender = message.sender.to_lowercase();
        let domain = match sender_domain(&sender) {
            Some(d) => d,
            None => return DetectorOutput::clean(),
        };

        if self.trusted_domains.iter().any(|t| t == &domain) {
            return DetectorOutput::clean();
        }

        // Known phishing domain shapes dominate.
        for re in &self.phishing_domain_res {
            if re.is_match(&domain) {
                return DetectorOutput {
                    score: 0.9,
                    indicators: vec![ThreatIndicator {
                        name: "phishing_domain".to_string(),
                        description: "sender domain matches a known phishing pattern".to_string(),
                        evidence: domain,
                    }],
                };
            }
        }

        let mut score = 0.0f64;
        let mut indicators = Vec::new();

        if let Some(tld) = SUSPICIOUS_TLDS.iter().find(|t| domain.ends_with(*t)) {
            score = score.max(0.5);
            indicators.push(ThreatIndicator {
                name: "suspicious_domain".to_string(),
                description: format!("sender domain uses suspicious TLD {}", tld),
                evidence: domain.clone(),
            });
        }

        // Hyphenated domains built from credential bait words, e.g.
        // secure-login.net.
        if domain.contains('-')
            && CREDENTIAL_BAIT_WORDS.iter().any(|w| domain.contains(w))
        {
            score = score.max(0.5);
            indicators.push(ThreatIndicator {
                name: "suspicious_domain".to_string(),
                description: "sender domain combines hyphenation with credential bait words"
                    .to_string(),
                evidence: domain.clone(),
            });
        }

        // A trusted brand in the display name or subject while the mail
        // comes from an unrelated domain suggests spoofing.
        let display = format!("{} {}", sender, message.subject.to_lowercase());
        for brand in BRAND_NAMES {
            if display.contains(brand) && !domain.contains(brand) {
                score = score.max(0.8);
                indicators.push(ThreatIndicator {
                    name: "brand_spoofing".to_string(),
                    description: format!(
                        "mentions {} but sender domain is {}",
                        brand, domain
                    ),
                    evidence: domain.clone(),
                });
                break;
            }
        }

        DetectorOutput { score, indicators }
    }

    // ============ Detector 3: lexical similarity ============

    fn detect_typosquatting(&self, message: &Message) -> DetectorOutput {
        let sender = message.sender.to_lowercase();
        let domain = match sender_domain(&sender) {
            Some(d) => d,
            None => return DetectorOutput::clean(),
        };

        if self.trusted_domains.iter().any(|t| t == &domain) {
            return DetectorOutput::clean();
        }

        for trusted in &self.trusted_domains {
            let distance = levenshtein(&domain, trusted);
            if distance > 0 && distance <= 2 && domain.len() >= 5 {
                return DetectorOutput {
                    score: 0.7,
                    indicators: vec![ThreatIndicator {
                        name: "typosquat_domain".to_string(),
                        description: format!(
                            "sender domain is edit distance {} from {}",
                            distance, trusted
                        ),
                        evidence: domain,
                    }],
                };
            }
        }

        DetectorOutput::clean()
    }

    // ============ Detector 4: link patterns ============

    fn detect_links(&self, message: &Message) -> DetectorOutput {
        let mut score = 0.0f64;
        let mut flagged = 0usize;
        let mut indicators = Vec::new();

        for m in self.url_re.find_iter(&message.body) {
            let url = m.as_str();
            let host = url_host(url);
            let mut url_score = 0.0f64;

            if SHORTENER_HOSTS.iter().any(|s| host == *s) {
                url_score = url_score.max(0.6);
                indicators.push(ThreatIndicator {
                    name: "url_shortener".to_string(),
                    description: "link uses a URL shortener".to_string(),
                    evidence: truncate(url, 80),
                });
            }

            if self.ip_host_re.is_match(&host) {
                url_score = url_score.max(0.7);
                indicators.push(ThreatIndicator {
                    name: "raw_ip_link".to_string(),
                    description: "link points at a raw IP address".to_string(),
                    evidence: truncate(url, 80),
                });
            }

            let lower = url.to_lowercase();
            if lower.contains("password") && lower.contains("reset")
                || lower.contains("verify") && lower.contains("account")
            {
                url_score = url_score.max(0.5);
                indicators.push(ThreatIndicator {
                    name: "credential_bait_link".to_string(),
                    description: "link path suggests a credential reset lure".to_string(),
                    evidence: truncate(url, 80),
                });
            }

            if url_score > 0.0 {
                flagged += 1;
                score = score.max(url_score);
            }
        }

        // HTML anchors whose visible text names a different host than
        // the actual href.
        for cap in self.anchor_re.captures_iter(&message.body) {
            let href_host = url_host(&cap[1]);
            let text = cap[2].trim().to_lowercase();
            if text.contains('.') && !text.contains(' ') {
                let text_host = url_host(&text);
                if !text_host.is_empty() && !href_host.is_empty() && text_host != href_host {
                    flagged += 1;
                    score = score.max(0.8);
                    indicators.push(ThreatIndicator {
                        name: "mismatched_link_text".to_string(),
                        description: format!(
                            "link text shows {} but points to {}",
                            text_host, href_host
                        ),
                        evidence: truncate(&cap[1], 80),
                    });
                }
            }
        }

        if flagged > 1 {
            score = (score + 0.1 * (flagged as f64 - 1.0)).min(1.0);
        }

        DetectorOutput { score, indicators }
    }
}

/// Map a combined score onto the four-band level.
pub fn level_for(score: f64) -> ThreatLevel {
    if score >= 0.8 {
        ThreatLevel::Critical
    } else if score >= 0.5 {
        ThreatLevel::Warning
    } else if score >= 0.2 {
        ThreatLevel::Caution
    } else {
        ThreatLevel::Safe
    }
}

fn recommendation_for(level: ThreatLevel) -> &'static str {
    match level {
        ThreatLevel::Critical => {
            "CRITICAL: delete immediately; this message shows multiple threat indicators"
        }
        ThreatLevel::Warning => {
            "WARNING: exercise caution; do not click links or download attachments"
        }
        ThreatLevel::Caution => "CAUTION: be suspicious; verify the sender before responding",
        ThreatLevel::Safe => "SAFE: no significant threats detected",
    }
}

fn sender_domain(sender: &str) -> Option<String> {
    let addr = sender.rsplit('<').next().unwrap_or(sender);
    let addr = addr.trim_end_matches('>');
    let domain = addr.rsplit('@').next()?;
    if domain == addr {
        // No '@' present.
        return None;
    }
    let domain = domain.trim().trim_end_matches('.');
    if domain.is_empty() {
        None
    } else {
        Some(domain.to_string())
    }
}

fn url_host(url: &str) -> String {
    let rest = url
        .strip_prefix("https://")
        .or_else(|| url.strip_prefix("http://"))
        .unwrap_or(url);
    rest.split(['/', '?', '#'])
        .next()
        .unwrap_or("")
        .split(':')
        .next()
        .unwrap_or("")
        .to_lowercase()
}

fn truncate(s: &str, max: usize) -> String {
    if s.len() <= max {
        s.to_string()
    } else {
        let end = s
            .char_indices()
            .take_while(|(i, _)| *i < max)
            .last()
            .map(|(i, c)| i + c.len_utf8())
            .unwrap_or(max);
        format!("{}...", &s[..end])
    }
}

/// Plain Levenshtein edit distance.
fn levenshtein(a: &str, b: &str) -> usize {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    if a.is_empty() {
        return b.len();
    }
    if b.is_empty() {
        return a.len();
    }

    let mut prev: Vec<usize> = (0..=b.len()).collect();
    let mut curr = vec![0usize; b.len() + 1];

    for (i, ca) in a.iter().enumerate() {
        curr[0] = i + 1;
        for (j, cb) in b.iter().enumerate() {
            let cost = if ca == cb { 0 } else { 1 };
            curr[j + 1] = (prev[j] + cost).min(prev[j + 1] + 1).min(curr[j] + 1);
        }
        std::mem::swap(&mut prev, &mut curr);
    }
    prev[b.len()]
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scorer() -> ThreatScorer {
        ThreatScorer::new(&ThreatConfig::default()).unwrap()
    }

    fn message(sender: &str, subject: &str, body: &str) -> Message {
        Message {
            id: "m1".to_string(),
            sender: sender.to_string(),
            recipients: vec!["me@example.com".to_string()],
            subject: subject.to_string(),
            body: body.to_string(),
            timestamp: 1_700_000_000,
        }
    }

    #[test]
    fn test_levenshtein() {
        assert_eq!(levenshtein("gmail.com", "gmail.com"), 0);
        assert_eq!(levenshtein("gmial.com", "gmail.com"), 2);
        assert_eq!(levenshtein("paypai.com", "paypal.com"), 1);
        assert_eq!(levenshtein("", "abc"), 3);
    }

    #[test]
    fn test_benign_message_is_safe() {
        let m = message(
            "alice@example.com",
            "Team sync",
            "Meeting tomorrow at 2pm to discuss the budget",
        );
        let a = scorer().assess(&m);
        assert_eq!(a.threat_level, ThreatLevel::Safe);
        assert_eq!(a.threat_score, 0.0);
        assert!(a.indicators.is_empty());
    }

    #[test]
    fn test_zero_score_always_maps_to_safe() {
        assert_eq!(level_for(0.0), ThreatLevel::Safe);
        assert_eq!(level_for(0.19), ThreatLevel::Safe);
        assert_eq!(level_for(0.2), ThreatLevel::Caution);
        assert_eq!(level_for(0.5), ThreatLevel::Warning);
        assert_eq!(level_for(0.8), ThreatLevel::Critical);
        assert_eq!(level_for(1.0), ThreatLevel::Critical);
    }

    #[test]
    fn test_phishing_example_scenario() {
        let m = message(
            "alerts@secure-login.net",
            "Action required",
            "Please verify your account at https://secure-login.net/verify?account=1 immediately",
        );
        let a = scorer().assess(&m);
        assert!(
            a.threat_level == ThreatLevel::Warning || a.threat_level == ThreatLevel::Critical,
            "expected WARNING or CRITICAL, got {:?} (score {})",
            a.threat_level,
            a.threat_score
        );
        let names: Vec<&str> = a.indicators.iter().map(|i| i.name.as_str()).collect();
        assert!(
            names.contains(&"urgency_language") || names.contains(&"suspicious_domain"),
            "indicators: {:?}",
            names
        );
    }

    #[test]
    fn test_corroboration_raises_score() {
        // Single detector: keyword only.
        let single = message(
            "friend@example.com",
            "hello",
            "please verify your account details",
        );
        // Same keyword signal plus a suspicious sender domain.
        let multi = message(
            "friend@secure-login.net",
            "hello",
            "please verify your account details",
        );
        let s = scorer();
        let a_single = s.assess(&single);
        let a_multi = s.assess(&multi);
        assert!(a_single.threat_score > 0.0);
        assert!(
            a_multi.threat_score > a_single.threat_score,
            "two detectors must score strictly higher than the strongest alone"
        );
    }

    #[test]
    fn test_known_phishing_domain_shape() {
        let m = message("billing@amazon-security.com", "Order issue", "see details");
        let a = scorer().assess(&m);
        assert!(a.indicators.iter().any(|i| i.name == "phishing_domain"));
        assert!(a.threat_score >= 0.9);
        assert_eq!(a.threat_level, ThreatLevel::Critical);
    }

    #[test]
    fn test_typosquat_detector() {
        let m = message("support@paypai.com", "Invoice", "see attached");
        let a = scorer().assess(&m);
        assert!(a
            .indicators
            .iter()
            .any(|i| i.name == "typosquat_domain"));
        assert!(a.threat_score >= 0.7);
    }

    #[test]
    fn test_trusted_domain_not_flagged_as_typosquat() {
        let m = message("noreply@gmail.com", "Welcome", "thanks for signing up");
        let a = scorer().assess(&m);
        assert_eq!(a.threat_level, ThreatLevel::Safe);
    }

    #[test]
    fn test_suspicious_tld() {
        let m = message("winner@lottery.xyz", "You won", "claim here");
        let a = scorer().assess(&m);
        assert!(a.indicators.iter().any(|i| i.name == "suspicious_domain"));
    }

    #[test]
    fn test_brand_spoofing() {
        let m = message(
            "apple support <support@rnail-helpdesk.info>",
            "Your Apple ID",
            "confirm your identity",
        );
        let a = scorer().assess(&m);
        assert!(a.indicators.iter().any(|i| i.name == "brand_spoofing"));
        assert!(a.threat_score >= 0.8);
    }

    #[test]
    fn test_url_shortener_and_raw_ip() {
        let m = message(
            "x@example.com",
            "links",
            "go to http://bit.ly/abc and http://192.168.0.1/path",
        );
        let a = scorer().assess(&m);
        let names: Vec<&str> = a.indicators.iter().map(|i| i.name.as_str()).collect();
        assert!(names.contains(&"url_shortener"));
        assert!(names.contains(&"raw_ip_link"));
    }

    #[test]
    fn test_mismatched_anchor() {
        let m = message(
            "x@example.com",
            "invoice",
            r#"<a href="http://evil.example.net/pay">paypal.com</a>"#,
        );
        let a = scorer().assess(&m);
        assert!(a
            .indicators
            .iter()
            .any(|i| i.name == "mismatched_link_text"));
    }

    #[test]
    fn test_deterministic_assessment() {
        let m = message(
            "alerts@secure-login.net",
            "Action required",
            "verify your account immediately",
        );
        let s = scorer();
        let a = s.assess(&m);
        let b = s.assess(&m);
        assert_eq!(a.threat_score, b.threat_score);
        assert_eq!(a.threat_level, b.threat_level);
        assert_eq!(a.indicators.len(), b.indicators.len());
    }

    #[test]
    fn test_batch_summary_counts() {
        let s = scorer();
        let report = s.assess_batch(&[
            message("alice@example.com", "lunch", "see you at noon"),
            message(
                "alerts@secure-login.net",
                "Action required",
                "verify your account immediately",
            ),
        ]);
        assert_eq!(report.assessments.len(), 2);
        assert_eq!(report.safe_count, 1);
        assert_eq!(
            report.safe_count
                + report.caution_count
                + report.warning_count
                + report.critical_count,
            2
        );
    }
}
