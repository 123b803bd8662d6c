//! Authoring Support: content post-processing invariants applied to
//! section drafts before they are surfaced to a reviewing stage or the
//! client — keyword audit, anti-pattern lint, delimiter sanitisation, and
//! an evidence-integrity probe.

use std::collections::HashSet;

/// One finding from running the authoring checks over a section draft.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthoringFinding {
    pub check: &'static str,
    pub message: String,
}

/// Runs every check and returns all findings; an empty vec means the draft
/// passed cleanly.
pub fn audit_draft(content: &str, required_keywords: &[String]) -> Vec<AuthoringFinding> {
    let mut findings = Vec::new();
    findings.extend(keyword_audit(content, required_keywords));
    findings.extend(anti_pattern_lint(content));
    findings.extend(evidence_integrity_probe(content));
    findings
}

/// Flags required keywords (e.g. target-role terms from the positioning
/// profile) that are entirely absent from the draft.
pub fn keyword_audit(content: &str, required_keywords: &[String]) -> Vec<AuthoringFinding> {
    let lower = content.to_lowercase();
    required_keywords
        .iter()
        .filter(|kw| !lower.contains(&kw.to_lowercase()))
        .map(|kw| AuthoringFinding {
            check: "keyword_audit",
            message: format!("required keyword missing from draft: {kw}"),
        })
        .collect()
}

/// Phrases that read as filler or unverifiable self-assessment in a resume
/// section rather than a concrete, evidenced claim.
const ANTI_PATTERNS: &[&str] = &[
    "results-driven",
    "hard worker",
    "team player",
    "detail-oriented",
    "synergy",
    "think outside the box",
];

/// Flags known filler/anti-pattern phrases.
pub fn anti_pattern_lint(content: &str) -> Vec<AuthoringFinding> {
    let lower = content.to_lowercase();
    ANTI_PATTERNS
        .iter()
        .filter(|phrase| lower.contains(*phrase))
        .map(|phrase| AuthoringFinding {
            check: "anti_pattern_lint",
            message: format!("filler phrase found: \"{phrase}\""),
        })
        .collect()
}

/// Strips control characters and the delimiter tokens used internally by
/// the agent loop's tool-result reassembly (`[tool_call ...]`), so a section
/// draft can never leak internal framing into client-facing output.
pub fn sanitize_delimiters(content: &str) -> String {
    let without_tool_markers = strip_tool_call_markers(content);
    without_tool_markers
        .chars()
        .filter(|c| !c.is_control() || *c == '\n' || *c == '\t')
        .collect()
}

fn strip_tool_call_markers(content: &str) -> String {
    let mut out = String::with_capacity(content.len());
    for line in content.lines() {
        let trimmed = line.trim_start();
        if trimmed.starts_with("[tool_call ") && trimmed.ends_with(']') {
            continue;
        }
        out.push_str(line);
        out.push('\n');
    }
    out
}

/// Flags claims that assert a metric (a number followed by `%` or a unit
/// like "users"/"requests"/"revenue") with no surrounding qualifier tying it
/// to a source — a cheap heuristic against fabricated numbers that slipped
/// past the research/gap-analysis stages.
pub fn evidence_integrity_probe(content: &str) -> Vec<AuthoringFinding> {
    let mut seen: HashSet<String> = HashSet::new();
    let mut findings = Vec::new();
    for sentence in content.split(['.', '\n']) {
        if !contains_bare_metric(sentence) {
            continue;
        }
        if has_evidence_qualifier(sentence) {
            continue;
        }
        let trimmed = sentence.trim().to_string();
        if trimmed.is_empty() || !seen.insert(trimmed.clone()) {
            continue;
        }
        findings.push(AuthoringFinding {
            check: "evidence_integrity_probe",
            message: format!("unqualified metric claim: \"{trimmed}\""),
        });
    }
    findings
}

fn contains_bare_metric(sentence: &str) -> bool {
    sentence
        .split_whitespace()
        .any(|tok| {
            let stripped = tok.trim_matches(|c: char| !c.is_ascii_digit() && c != '%');
            !stripped.is_empty() && stripped.chars().any(|c| c.is_ascii_digit())
        })
}

const EVIDENCE_QUALIFIERS: &[&str] = &["per", "according to", "source:", "measured", "reported"];

fn has_evidence_qualifier(sentence: &str) -> bool {
    let lower = sentence.to_lowercase();
    EVIDENCE_QUALIFIERS.iter().any(|q| lower.contains(q))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keyword_audit_flags_missing_keyword() {
        let findings = keyword_audit("Built dashboards in Python.", &["Rust".to_string()]);
        assert_eq!(findings.len(), 1);
        assert_eq!(findings[0].check, "keyword_audit");
    }

    #[test]
    fn keyword_audit_passes_when_present_case_insensitively() {
        let findings = keyword_audit("Shipped features in RUST.", &["rust".to_string()]);
        assert!(findings.is_empty());
    }

    #[test]
    fn anti_pattern_lint_flags_filler_phrases() {
        let findings = anti_pattern_lint("A results-driven team player who ships.");
        assert_eq!(findings.len(), 2);
    }

    #[test]
    fn sanitize_delimiters_strips_tool_call_markers() {
        let raw = "Intro paragraph.\n[tool_call 1 result]\nleftover\nConclusion.";
        let clean = sanitize_delimiters(raw);
        assert!(!clean.contains("tool_call"));
        assert!(clean.contains("Intro paragraph."));
        assert!(clean.contains("Conclusion."));
    }

    #[test]
    fn evidence_probe_flags_unqualified_metric() {
        let findings = evidence_integrity_probe("Increased revenue by 40%.");
        assert_eq!(findings.len(), 1);
        assert_eq!(findings[0].check, "evidence_integrity_probe");
    }

    #[test]
    fn evidence_probe_allows_qualified_metric() {
        let findings =
            evidence_integrity_probe("Increased revenue by 40%, per Q3 finance report.");
        assert!(findings.is_empty());
    }

    #[test]
    fn evidence_probe_ignores_sentences_with_no_metric() {
        let findings = evidence_integrity_probe("Led the platform migration effort.");
        assert!(findings.is_empty());
    }

    #[test]
    fn audit_draft_aggregates_all_checks() {
        let findings = audit_draft(
            "A results-driven engineer. Increased throughput by 30%.",
            &["Kubernetes".to_string()],
        );
        let checks: HashSet<&str> = findings.iter().map(|f| f.check).collect();
        assert!(checks.contains("keyword_audit"));
        assert!(checks.contains("anti_pattern_lint"));
        assert!(checks.contains("evidence_integrity_probe"));
    }
}
