//! Author parser (C3): turns a raw `Name <email>` string — possibly a
//! pair-programming construct like `"Alice, Bob and Carol <shared@x>"` — into
//! one or more author identities, plus helpers for extracting co-author
//! trailers already split out by [`crate::sync::parser`].

use regex::Regex;
use std::sync::LazyLock;

/// `name`, `email` pair straight off an `Author:`/`Committer:`/trailer line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedAuthor {
    pub name: String,
    pub email: Option<String>,
}

static EMAIL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[^@\s]+@[^@\s]+$").unwrap());

/// `"A1, A2, ... and An <email>"` — the pair-programming author-line shape.
static PAIR_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?P<names>.+?)\s+and\s+(?P<last>[^<>]+?)\s*<(?P<email>[^<>]*)>\s*$").unwrap()
});

fn is_valid_email(candidate: &str) -> bool {
    EMAIL_RE.is_match(candidate)
}

/// Split a single `Name <email>` string into name/email, clearing the email
/// if it fails syntactic validation (the name is kept regardless).
pub fn split_name_email(raw: &str) -> ParsedAuthor {
    let raw = raw.trim();
    let Some(lt) = raw.find('<') else {
        return ParsedAuthor { name: raw.to_string(), email: None };
    };
    let name = raw[..lt].trim().to_string();
    let rest = &raw[lt + 1..];
    let email = rest
        .find('>')
        .map(|gt| rest[..gt].trim().to_string())
        .filter(|e| is_valid_email(e));

    ParsedAuthor { name, email }
}

/// Parse an `Author:` line, expanding pair-programming syntax into multiple
/// authors. Each name in `"A1, A2, ... and An <email>"` becomes its own
/// [`ParsedAuthor`]; any name without its own `<email>` inherits the trailing
/// shared email.
pub fn parse_authors(raw: &str) -> Vec<ParsedAuthor> {
    let raw = raw.trim();

    if let Some(caps) = PAIR_RE.captures(raw) {
        let names_part = caps.name("names").unwrap().as_str();
        let last_name = caps.name("last").unwrap().as_str().trim();
        let shared_email = caps.name("email").unwrap().as_str().trim();
        let shared_email = is_valid_email(shared_email).then(|| shared_email.to_string());

        let mut authors: Vec<ParsedAuthor> = names_part
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(|name| split_or_fallback(name, shared_email.clone()))
            .collect();

        authors.push(split_or_fallback(last_name, shared_email));
        return authors;
    }

    vec![split_name_email(raw)]
}

fn split_or_fallback(segment: &str, fallback_email: Option<String>) -> ParsedAuthor {
    let parsed = split_name_email(segment);
    if parsed.email.is_some() {
        parsed
    } else {
        ParsedAuthor { name: parsed.name, email: fallback_email }
    }
}

/// Per-author contribution weight: `1/N` for pair-programmed commits, `1.0`
/// otherwise (SPEC_FULL.md §4.2).
pub fn author_weight(author_count: usize) -> f64 {
    if author_count == 0 { 1.0 } else { 1.0 / author_count as f64 }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn simple_author_line() {
        let parsed = split_name_email("Alice <a@x.com>");
        assert_eq!(parsed.name, "Alice");
        assert_eq!(parsed.email.as_deref(), Some("a@x.com"));
    }

    #[test]
    fn invalid_email_is_cleared_but_name_kept() {
        let parsed = split_name_email("Alice <not-an-email>");
        assert_eq!(parsed.name, "Alice");
        assert_eq!(parsed.email, None);
    }

    #[test]
    fn bare_domain_without_dot_is_a_valid_email() {
        // §8 scenario 1/2 use undotted addresses like `a@x`; a dotted-TLD
        // requirement would wrongly clear them.
        let parsed = split_name_email("Alice <a@x>");
        assert_eq!(parsed.email.as_deref(), Some("a@x"));
    }

    #[test]
    fn pair_programming_two_authors_share_trailing_email() {
        let authors = parse_authors("Alice and Bob <b@x.com>");
        assert_eq!(authors.len(), 2);
        assert_eq!(authors[0].name, "Alice");
        assert_eq!(authors[0].email.as_deref(), Some("b@x.com"));
        assert_eq!(authors[1].name, "Bob");
        assert_eq!(authors[1].email.as_deref(), Some("b@x.com"));
    }

    #[test]
    fn pair_programming_three_authors() {
        let authors = parse_authors("Alice, Bob and Carol <c@x.com>");
        assert_eq!(authors.len(), 3);
        assert_eq!(authors[2].name, "Carol");
        assert!(authors.iter().all(|a| a.email.as_deref() == Some("c@x.com")));
    }

    #[test]
    fn weight_splits_evenly() {
        assert_eq!(author_weight(1), 1.0);
        assert_eq!(author_weight(2), 0.5);
        assert_eq!(author_weight(4), 0.25);
    }
}
