use crate::parse::outcome::{ParseFailure, ParseResult};
use crate::parse::{narrative_re, slugify, split_frontmatter};
use crate::types::Lifecycle;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

// ---------------------------------------------------------------------------
// Records
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Epic {
    pub number: u32,
    /// Derived deterministically as `epic-<number>`.
    pub key: String,
    pub title: String,
    pub description: String,
    pub meta: Option<EpicMeta>,
    pub stories: Vec<EpicStoryEntry>,
    pub source_path: Option<PathBuf>,
    /// Overlaid from the status document after parsing; defaults to backlog.
    pub status: Lifecycle,
}

/// Document-level metadata preamble of an epics document.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct EpicMeta {
    pub steps_completed: Vec<String>,
    pub input_documents: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EpicStoryEntry {
    pub key: String,
    pub title: String,
    pub description: Option<String>,
    pub status: Option<Lifecycle>,
}

// ---------------------------------------------------------------------------
// Patterns
// ---------------------------------------------------------------------------

static EPIC_HEADING_RE: OnceLock<Regex> = OnceLock::new();
static STORY_ENTRY_RE: OnceLock<Regex> = OnceLock::new();
static ANY_HEADING_RE: OnceLock<Regex> = OnceLock::new();

fn epic_heading_re() -> &'static Regex {
    EPIC_HEADING_RE.get_or_init(|| Regex::new(r"(?m)^## Epic ([0-9]+): (.+)$").unwrap())
}

fn story_entry_re() -> &'static Regex {
    STORY_ENTRY_RE
        .get_or_init(|| Regex::new(r"(?m)^### Story ([0-9]+)\.([0-9]+)([a-z])?: (.+)$").unwrap())
}

fn any_heading_re() -> &'static Regex {
    ANY_HEADING_RE.get_or_init(|| Regex::new(r"(?m)^#{1,6} ").unwrap())
}

// ---------------------------------------------------------------------------
// Parsers
// ---------------------------------------------------------------------------

/// Parse a document containing exactly one epic section. Never panics.
///
/// Partial contract: when the body has no valid epic heading (or a bad
/// number), the failure carries the document metadata if a preamble was
/// already extracted; nothing else.
pub fn parse_epic(text: &str, path: Option<&Path>) -> ParseResult<Epic, EpicMeta> {
    let (front, body) = split_frontmatter(text);
    let meta = parse_meta(front);
    parse_epic_section(body, meta, path)
}

/// Parse a consolidated epics document into every epic it contains.
///
/// The body is split at each top-level epic heading and each slice parses
/// independently; slices that fail are dropped with a debug log. A document
/// with no epic heading at all falls back to single-epic mode. Succeeds
/// iff at least one epic parsed.
pub fn parse_epics(text: &str, path: Option<&Path>) -> ParseResult<Vec<Epic>> {
    let (front, body) = split_frontmatter(text);
    let meta = parse_meta(front);

    let starts: Vec<usize> = epic_heading_re()
        .find_iter(body)
        .map(|m| m.start())
        .collect();
    if starts.is_empty() {
        return match parse_epic_section(body, meta, path) {
            Ok(epic) => Ok(vec![epic]),
            Err(f) => Err(f.discard_partial()),
        };
    }

    let mut epics = Vec::with_capacity(starts.len());
    for (i, &start) in starts.iter().enumerate() {
        let end = starts.get(i + 1).copied().unwrap_or(body.len());
        match parse_epic_section(&body[start..end], meta.clone(), path) {
            Ok(epic) => epics.push(epic),
            Err(f) => {
                tracing::debug!(error = %f.message, "skipping unparseable epic section");
            }
        }
    }
    if epics.is_empty() {
        Err(ParseFailure::new("no valid epic sections found"))
    } else {
        Ok(epics)
    }
}

fn parse_meta(front: Option<&str>) -> Option<EpicMeta> {
    // A malformed preamble is tolerated as "no metadata".
    front.and_then(|yaml| serde_yaml::from_str(yaml).ok())
}

fn parse_epic_section(
    body: &str,
    meta: Option<EpicMeta>,
    path: Option<&Path>,
) -> ParseResult<Epic, EpicMeta> {
    let fail = |msg: String, meta: Option<EpicMeta>| match meta {
        Some(m) => ParseFailure::with_partial(msg, m),
        None => ParseFailure::new(msg),
    };

    let Some(caps) = epic_heading_re().captures(body) else {
        return Err(fail(
            "missing epic heading (## Epic <N>: <Title>)".to_string(),
            meta,
        ));
    };
    let heading = caps.get(0).unwrap();
    let Ok(number) = caps[1].parse::<u32>() else {
        return Err(fail(format!("invalid epic number: {}", &caps[1]), meta));
    };
    if number < 1 {
        return Err(fail("epic number must be >= 1".to_string(), meta));
    }
    let title = caps[2].trim().to_string();

    // Description runs from the heading line to the next heading of any
    // level, or to end of document.
    let desc_start = heading.end();
    let desc_end = any_heading_re()
        .find_at(body, desc_start)
        .map(|m| m.start())
        .unwrap_or(body.len());
    let description = body[desc_start..desc_end].trim().to_string();

    Ok(Epic {
        number,
        key: format!("epic-{number}"),
        title,
        description,
        meta,
        stories: parse_story_entries(body),
        source_path: path.map(Path::to_path_buf),
        status: Lifecycle::Backlog,
    })
}

/// Two-pass entry extraction: collect every valid nested story heading
/// first, then slice each entry's span between consecutive headings.
/// Malformed nested headings simply never match and are skipped.
fn parse_story_entries(body: &str) -> Vec<EpicStoryEntry> {
    let matches: Vec<regex::Captures<'_>> = story_entry_re().captures_iter(body).collect();
    let mut entries = Vec::with_capacity(matches.len());
    for (i, caps) in matches.iter().enumerate() {
        let (Ok(epic), Ok(story)) = (caps[1].parse::<u32>(), caps[2].parse::<u32>()) else {
            continue;
        };
        let suffix = caps.get(3).and_then(|m| m.as_str().chars().next());
        let title = caps[4].trim().to_string();

        let span_start = caps.get(0).unwrap().end();
        let span_end = matches
            .get(i + 1)
            .map(|c| c.get(0).unwrap().start())
            .unwrap_or(body.len());
        let description = narrative_re()
            .find(&body[span_start..span_end])
            .map(|m| m.as_str().trim().to_string());

        entries.push(EpicStoryEntry {
            key: story_entry_key(epic, story, suffix, &title),
            title,
            description,
            status: None,
        });
    }
    entries
}

pub(crate) fn story_entry_key(epic: u32, story: u32, suffix: Option<char>, title: &str) -> String {
    let suffix = suffix.map(String::from).unwrap_or_default();
    format!("{epic}-{story}{suffix}-{}", slugify(title))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
