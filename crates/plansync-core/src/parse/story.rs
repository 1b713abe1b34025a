use crate::parse::outcome::{ParseFailure, ParseResult};
use crate::parse::{narrative_re, slugify, split_frontmatter};
use crate::paths::story_key_from_path;
use crate::types::Lifecycle;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

// ---------------------------------------------------------------------------
// Records
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Story {
    pub epic: u32,
    pub story: u32,
    /// Single-letter split suffix (`1.2a`), if any.
    pub suffix: Option<char>,
    pub key: String,
    pub title: String,
    pub narrative: String,
    pub acceptance_criteria: Vec<AcceptanceCriterion>,
    pub tasks: Vec<StoryTask>,
    pub source_path: Option<PathBuf>,
    pub status: Lifecycle,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AcceptanceCriterion {
    pub number: u32,
    pub title: String,
    pub body: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoryTask {
    pub number: u32,
    pub description: String,
    pub completed: bool,
    /// Acceptance-criterion numbers referenced by a trailing `(AC: …)`.
    pub ac_refs: Vec<u32>,
    pub subtasks: Vec<StorySubtask>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StorySubtask {
    pub id: String,
    pub description: String,
    pub completed: bool,
}

impl Story {
    // Completion counters are always recomputed from the task list, never
    // stored, so they cannot drift from it.

    pub fn task_total(&self) -> usize {
        self.tasks.len()
    }

    pub fn task_completed(&self) -> usize {
        self.tasks.iter().filter(|t| t.completed).count()
    }

    pub fn subtask_total(&self) -> usize {
        self.tasks.iter().map(|t| t.subtasks.len()).sum()
    }

    pub fn subtask_completed(&self) -> usize {
        self.tasks
            .iter()
            .flat_map(|t| t.subtasks.iter())
            .filter(|s| s.completed)
            .count()
    }

    /// "2/5 tasks, 3/9 subtasks"
    pub fn progress_summary(&self) -> String {
        format!(
            "{}/{} tasks, {}/{} subtasks",
            self.task_completed(),
            self.task_total(),
            self.subtask_completed(),
            self.subtask_total()
        )
    }
}

// ---------------------------------------------------------------------------
// Patterns
// ---------------------------------------------------------------------------

static STORY_HEADING_RE: OnceLock<Regex> = OnceLock::new();
static STATUS_LINE_RE: OnceLock<Regex> = OnceLock::new();
static HEADING_RE: OnceLock<Regex> = OnceLock::new();
static AC_ITEM_RE: OnceLock<Regex> = OnceLock::new();
static TASK_RE: OnceLock<Regex> = OnceLock::new();
static SUBTASK_RE: OnceLock<Regex> = OnceLock::new();
static AC_SUFFIX_RE: OnceLock<Regex> = OnceLock::new();

fn story_heading_re() -> &'static Regex {
    STORY_HEADING_RE
        .get_or_init(|| Regex::new(r"(?m)^# Story ([0-9]+)\.([0-9]+)([a-z])?: (.+)$").unwrap())
}

fn status_line_re() -> &'static Regex {
    STATUS_LINE_RE.get_or_init(|| Regex::new(r"(?m)^Status:[ \t]*(.+)$").unwrap())
}

fn heading_re() -> &'static Regex {
    HEADING_RE.get_or_init(|| Regex::new(r"(?m)^(#{1,6}) (.+)$").unwrap())
}

fn ac_item_re() -> &'static Regex {
    AC_ITEM_RE
        .get_or_init(|| Regex::new(r"(?m)^([0-9]+)\.[ \t]+\*\*([^*\n]+)\*\*:?[ \t]*(.*)$").unwrap())
}

fn task_re() -> &'static Regex {
    TASK_RE.get_or_init(|| Regex::new(r"^- \[([ xX])\] Task ([0-9]+):[ \t]*(.+)$").unwrap())
}

fn subtask_re() -> &'static Regex {
    SUBTASK_RE
        .get_or_init(|| Regex::new(r"^[ \t]+- \[([ xX])\] ([0-9]+)\.([0-9]+):[ \t]*(.+)$").unwrap())
}

fn ac_suffix_re() -> &'static Regex {
    AC_SUFFIX_RE.get_or_init(|| Regex::new(r"\(AC:[ \t]*([^)]*)\)[ \t]*$").unwrap())
}

// ---------------------------------------------------------------------------
// Parser
// ---------------------------------------------------------------------------

/// Parse a single story document. Never panics.
///
/// A missing story heading is a hard failure with no partial: there is no
/// safe partial record for a story.
pub fn parse_story(text: &str, path: Option<&Path>) -> ParseResult<Story> {
    if text.trim().is_empty() {
        return Err(ParseFailure::new("story document is empty"));
    }
    let (_, body) = split_frontmatter(text);

    let Some(caps) = story_heading_re().captures(body) else {
        return Err(ParseFailure::new(
            "missing header: expected '# Story <N>.<M>: <Title>'",
        ));
    };
    let Ok(epic) = caps[1].parse::<u32>() else {
        return Err(ParseFailure::new(format!(
            "invalid epic number in story heading: {}",
            &caps[1]
        )));
    };
    let Ok(story) = caps[2].parse::<u32>() else {
        return Err(ParseFailure::new(format!(
            "invalid story number in story heading: {}",
            &caps[2]
        )));
    };
    let suffix = caps.get(3).and_then(|m| m.as_str().chars().next());
    let title = caps[4].trim().to_string();

    // Prefer the key embedded in a canonical filename; synthesize otherwise.
    let key = path.and_then(story_key_from_path).unwrap_or_else(|| {
        let suffix = suffix.map(String::from).unwrap_or_default();
        format!("{epic}-{story}{suffix}-{}", slugify(&title))
    });

    // Status line; unrecognized or non-story values fall back to backlog.
    let status = status_line_re()
        .captures(body)
        .and_then(|c| Lifecycle::parse(c[1].trim()))
        .filter(|s| *s != Lifecycle::Optional)
        .unwrap_or(Lifecycle::Backlog);

    let sections = Sections::collect(body);
    let narrative = sections
        .get("Story")
        .and_then(|sec| narrative_re().find(sec))
        .or_else(|| narrative_re().find(body))
        .map(|m| m.as_str().trim().to_string())
        .unwrap_or_default();

    let acceptance_criteria = sections
        .get("Acceptance Criteria")
        .map(parse_criteria)
        .unwrap_or_default();

    let tasks = sections
        .get("Tasks / Subtasks")
        .map(parse_tasks)
        .unwrap_or_default();

    Ok(Story {
        epic,
        story,
        suffix,
        key,
        title,
        narrative,
        acceptance_criteria,
        tasks,
        source_path: path.map(Path::to_path_buf),
        status,
    })
}

// ---------------------------------------------------------------------------
// Section slicing
// ---------------------------------------------------------------------------

/// One scan collects every heading position; sections slice between
/// consecutive headings instead of guessing boundary offsets.
struct Sections<'a> {
    body: &'a str,
    headings: Vec<(usize, usize, usize, &'a str)>, // (level, start, content_start, title)
}

impl<'a> Sections<'a> {
    fn collect(body: &'a str) -> Self {
        let headings = heading_re()
            .captures_iter(body)
            .map(|c| {
                let whole = c.get(0).unwrap();
                let level = c.get(1).unwrap().len();
                (
                    level,
                    whole.start(),
                    whole.end(),
                    c.get(2).unwrap().as_str().trim(),
                )
            })
            .collect();
        Self { body, headings }
    }

    /// Content of the `## <title>` section, bounded by the next heading of
    /// level 2 or above.
    fn get(&self, title: &str) -> Option<&'a str> {
        let idx = self
            .headings
            .iter()
            .position(|(level, _, _, t)| *level == 2 && t.eq_ignore_ascii_case(title))?;
        let start = self.headings[idx].2;
        let end = self.headings[idx + 1..]
            .iter()
            .find(|(level, _, _, _)| *level <= 2)
            .map(|(_, s, _, _)| *s)
            .unwrap_or(self.body.len());
        Some(&self.body[start..end])
    }
}

// ---------------------------------------------------------------------------
// Acceptance criteria
// ---------------------------------------------------------------------------

fn parse_criteria(section: &str) -> Vec<AcceptanceCriterion> {
    let items: Vec<regex::Captures<'_>> = ac_item_re().captures_iter(section).collect();
    let mut criteria = Vec::with_capacity(items.len());
    for (i, caps) in items.iter().enumerate() {
        let Ok(number) = caps[1].parse::<u32>() else {
            continue;
        };
        let tail_start = caps.get(0).unwrap().end();
        let tail_end = items
            .get(i + 1)
            .map(|c| c.get(0).unwrap().start())
            .unwrap_or(section.len());

        let mut body = caps[3].trim().to_string();
        let rest = section[tail_start..tail_end].trim();
        if !rest.is_empty() {
            if !body.is_empty() {
                body.push('\n');
            }
            body.push_str(rest);
        }

        criteria.push(AcceptanceCriterion {
            number,
            title: caps[2].trim().to_string(),
            body,
        });
    }
    criteria
}

// ---------------------------------------------------------------------------
// Tasks / subtasks
// ---------------------------------------------------------------------------

/// Line scan over the tasks section. Only exact checkbox-task lines become
/// tasks and only indented `n.m:` checkbox lines become subtasks of the
/// preceding task; every other line is ignored so stray prose or malformed
/// markers cannot abort the remaining tasks.
fn parse_tasks(section: &str) -> Vec<StoryTask> {
    let mut tasks: Vec<StoryTask> = Vec::new();
    for line in section.lines() {
        if let Some(caps) = task_re().captures(line) {
            let Ok(number) = caps[2].parse::<u32>() else {
                continue;
            };
            let completed = matches!(&caps[1], "x" | "X");
            let mut description = caps[3].trim().to_string();
            let mut ac_refs = Vec::new();
            if let Some(suffix) = ac_suffix_re().captures(&description) {
                ac_refs = parse_ac_refs(&suffix[1]);
                let cut = suffix.get(0).unwrap().start();
                description.truncate(cut);
                description.truncate(description.trim_end().len());
            }
            tasks.push(StoryTask {
                number,
                description,
                completed,
                ac_refs,
                subtasks: Vec::new(),
            });
        } else if let Some(caps) = subtask_re().captures(line) {
            if let Some(task) = tasks.last_mut() {
                task.subtasks.push(StorySubtask {
                    id: format!("{}.{}", &caps[2], &caps[3]),
                    description: caps[4].trim().to_string(),
                    completed: matches!(&caps[1], "x" | "X"),
                });
            }
        }
    }
    tasks
}

/// Accepts both `#3` and bare `3` tokens, comma-separated.
fn parse_ac_refs(list: &str) -> Vec<u32> {
    list.split(',')
        .filter_map(|tok| tok.trim().trim_start_matches('#').parse::<u32>().ok())
        .collect()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
