pub mod epic;
pub mod outcome;
pub mod status;
pub mod story;

use regex::Regex;
use std::sync::OnceLock;

// ---------------------------------------------------------------------------
// Shared text helpers
// ---------------------------------------------------------------------------

/// Split an optional `---` fenced metadata preamble off the front of a
/// document. Returns the raw YAML block (without fences) and the body.
/// An unterminated fence is treated as plain body text.
pub(crate) fn split_frontmatter(text: &str) -> (Option<&str>, &str) {
    let mut lines = text.split_inclusive('\n');
    let Some(first) = lines.next() else {
        return (None, text);
    };
    if first.trim_end() != "---" {
        return (None, text);
    }
    let mut offset = first.len();
    for line in lines {
        if line.trim_end() == "---" {
            let yaml = &text[first.len()..offset];
            let body = &text[offset + line.len()..];
            return (Some(yaml), body);
        }
        offset += line.len();
    }
    (None, text)
}

static NARRATIVE_RE: OnceLock<Regex> = OnceLock::new();

/// The "As a …, I want …, so that …" narrative pattern shared by the epic
/// and story parsers. Linear-time (no backtracking) by construction.
pub(crate) fn narrative_re() -> &'static Regex {
    NARRATIVE_RE.get_or_init(|| {
        Regex::new(r"(?is)\bas an? .+?,\s*i want .+?,\s*so that [^\n]+").unwrap()
    })
}

/// Lowercase slug of a title: alphanumerics kept, runs of anything else
/// collapsed to single hyphens.
pub(crate) fn slugify(title: &str) -> String {
    let mut slug = String::with_capacity(title.len());
    let mut pending_hyphen = false;
    for ch in title.chars() {
        if ch.is_ascii_alphanumeric() {
            if pending_hyphen && !slug.is_empty() {
                slug.push('-');
            }
            pending_hyphen = false;
            slug.push(ch.to_ascii_lowercase());
        } else {
            pending_hyphen = true;
        }
    }
    slug
}
