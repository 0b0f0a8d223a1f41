//! Per-group email allow-list matching.
//!
//! Patterns are either an exact address or `*@domain`. This is a domain
//! intent check, not a security boundary, so plain comparisons are fine.

/// Match a normalized (lower-case) email against the group's patterns.
pub(crate) fn email_allowed(patterns: &[String], email_normalized: &str) -> bool {
    patterns.iter().any(|pattern| {
        let pattern = pattern.trim().to_lowercase();
        if let Some(domain) = pattern.strip_prefix("*@") {
            email_normalized
                .split_once('@')
                .is_some_and(|(_, email_domain)| email_domain == domain)
        } else {
            email_normalized == pattern
        }
    })
}
