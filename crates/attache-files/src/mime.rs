//! Wildcard mime-pattern matching.

/// Match `pattern` against `value`, treating `*` as a wildcard for any run
/// of characters. Literal segments are case-sensitive. A pattern without
/// `*` must match exactly.
pub fn wildcard_match(pattern: &str, value: &str) -> bool {
    if !pattern.contains('*') {
        return pattern == value;
    }

    let parts: Vec<&str> = pattern.split('*').collect();

    // Leading and trailing literals anchor at the ends.
    let first = parts[0];
    let last = parts[parts.len() - 1];
    if !value.starts_with(first) || !value.ends_with(last) {
        return false;
    }
    if value.len() < first.len() + last.len() {
        return false;
    }

    let mut rest = &value[first.len()..value.len() - last.len()];
    for part in &parts[1..parts.len() - 1] {
        match rest.find(part) {
            Some(idx) => rest = &rest[idx + part.len()..],
            None => return false,
        }
    }
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exact_match_without_wildcard() {
        assert!(wildcard_match("image/png", "image/png"));
        assert!(!wildcard_match("image/png", "image/jpeg"));
    }

    #[test]
    fn trailing_wildcard_matches_subtype() {
        assert!(wildcard_match("image/*", "image/png"));
        assert!(wildcard_match("application/*", "application/json"));
        assert!(!wildcard_match("application/*", "text/plain"));
    }

    #[test]
    fn bare_wildcard_matches_everything() {
        assert!(wildcard_match("*", "application/octet-stream"));
        assert!(wildcard_match("*/*", "text/html"));
    }

    #[test]
    fn interior_wildcard() {
        assert!(wildcard_match("application/*+json", "application/hal+json"));
        assert!(!wildcard_match("application/*+json", "application/xml"));
    }

    #[test]
    fn matching_is_case_sensitive() {
        assert!(!wildcard_match("image/*", "Image/png"));
    }

    #[test]
    fn wildcard_may_match_empty_run() {
        assert!(wildcard_match("image/png*", "image/png"));
    }
}
