use crate::parse::outcome::{ParseFailure, ParseResult};
use crate::paths::TRACKING_SYSTEM;
use crate::types::{ItemKey, Lifecycle};
use serde::{Deserialize, Serialize};
use serde_yaml::Value;

// ---------------------------------------------------------------------------
// Records
// ---------------------------------------------------------------------------

/// Fully validated sprint status document.
///
/// Constructed fresh on every parse and immutable once returned; a new
/// successful parse supersedes it wholesale.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusDocument {
    pub generated: String,
    pub project: String,
    pub project_key: String,
    pub tracking_system: String,
    pub story_location: String,
    /// Entries in document order; order matters for current-story derivation.
    pub development_status: Vec<StatusEntry>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusEntry {
    pub key: String,
    pub item: ItemKey,
    pub state: Lifecycle,
}

/// Partial payload carried by a failed status parse.
///
/// Contract: header fields are populated in declaration order up to (not
/// including) the first field that failed validation. `development_status`
/// is populated only when the header fully validated and at least the
/// entry-validation step ran; it then contains exactly the entries that
/// individually validated.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct PartialStatus {
    pub generated: Option<String>,
    pub project: Option<String>,
    pub project_key: Option<String>,
    pub tracking_system: Option<String>,
    pub story_location: Option<String>,
    pub development_status: Option<Vec<StatusEntry>>,
}

// ---------------------------------------------------------------------------
// Parser
// ---------------------------------------------------------------------------

/// Parse the sprint status document. Never panics.
pub fn parse_status(text: &str) -> ParseResult<StatusDocument, PartialStatus> {
    if text.trim().is_empty() {
        return Err(ParseFailure::new("status document is empty"));
    }

    let doc: Value = match serde_yaml::from_str(text) {
        Ok(v) => v,
        Err(e) => return Err(ParseFailure::new(format!("invalid yaml: {e}"))),
    };
    let Some(map) = doc.as_mapping() else {
        return Err(ParseFailure::new(
            "status document is not a key/value mapping",
        ));
    };

    // Header fields validate independently, in order; the first failure
    // aborts but carries forward everything already validated.
    let mut partial = PartialStatus::default();

    let generated = match map.get(Value::from("generated")) {
        None => return Err(ParseFailure::with_partial("missing field: generated", partial)),
        Some(v) => match normalize_generated(v) {
            Ok(s) => s,
            Err(msg) => return Err(ParseFailure::with_partial(msg, partial)),
        },
    };
    partial.generated = Some(generated.clone());

    let project = match required_string(map, "project") {
        Ok(s) => s,
        Err(msg) => return Err(ParseFailure::with_partial(msg, partial)),
    };
    partial.project = Some(project.clone());

    let project_key = match required_string(map, "project_key") {
        Ok(s) => s,
        Err(msg) => return Err(ParseFailure::with_partial(msg, partial)),
    };
    partial.project_key = Some(project_key.clone());

    let tracking_system = match required_string(map, "tracking_system") {
        Ok(s) if s == TRACKING_SYSTEM => s,
        Ok(s) => {
            return Err(ParseFailure::with_partial(
                format!("tracking_system must be \"{TRACKING_SYSTEM}\", got \"{s}\""),
                partial,
            ))
        }
        Err(msg) => return Err(ParseFailure::with_partial(msg, partial)),
    };
    partial.tracking_system = Some(tracking_system.clone());

    let story_location = match required_string(map, "story_location") {
        Ok(s) => s,
        Err(msg) => return Err(ParseFailure::with_partial(msg, partial)),
    };
    partial.story_location = Some(story_location.clone());

    // Entry validation: collect every per-entry failure instead of aborting
    // on the first one. Any failure fails the document, but the partial
    // keeps the entries that did validate.
    let Some(Value::Mapping(raw_entries)) = map.get(Value::from("development_status")) else {
        return Err(ParseFailure::with_partial(
            "missing or non-mapping field: development_status",
            partial,
        ));
    };

    let mut entries = Vec::with_capacity(raw_entries.len());
    let mut entry_errors: Vec<String> = Vec::new();
    for (k, v) in raw_entries {
        let Some(key) = k.as_str() else {
            entry_errors.push("development_status key is not a string".to_string());
            continue;
        };
        let Some(item) = ItemKey::classify(key) else {
            entry_errors.push(format!("{key}: unrecognized key shape"));
            continue;
        };
        let Some(raw_state) = v.as_str() else {
            entry_errors.push(format!("{key}: state is not a string"));
            continue;
        };
        let Some(state) = Lifecycle::parse(raw_state) else {
            entry_errors.push(format!("{key}: unknown state '{raw_state}'"));
            continue;
        };
        if !item.allows(state) {
            entry_errors.push(format!("{key}: state '{raw_state}' not valid for this key"));
            continue;
        }
        entries.push(StatusEntry {
            key: key.to_string(),
            item,
            state,
        });
    }

    if !entry_errors.is_empty() {
        partial.development_status = Some(entries);
        return Err(ParseFailure::with_partial(
            format!(
                "invalid development_status entries: {}",
                entry_errors.join("; ")
            ),
            partial,
        ));
    }

    Ok(StatusDocument {
        generated,
        project,
        project_key,
        tracking_system,
        story_location,
        development_status: entries,
    })
}

fn required_string(map: &serde_yaml::Mapping, field: &str) -> Result<String, String> {
    match map.get(Value::from(field)) {
        None => Err(format!("missing field: {field}")),
        Some(Value::String(s)) => Ok(s.clone()),
        Some(_) => Err(format!("field is not a string: {field}")),
    }
}

/// `generated` is normally a string; a date-typed scalar is tolerated and
/// normalized to its string rendering when chrono can read it.
fn normalize_generated(value: &Value) -> Result<String, String> {
    match value {
        Value::String(s) => Ok(s.clone()),
        other => {
            let rendered = serde_yaml::to_string(other)
                .map_err(|_| "field is not a string: generated".to_string())?
                .trim()
                .to_string();
            let is_date = chrono::NaiveDate::parse_from_str(&rendered, "%Y-%m-%d").is_ok()
                || chrono::DateTime::parse_from_rfc3339(&rendered).is_ok();
            if is_date {
                Ok(rendered)
            } else {
                Err("field is not a string or date: generated".to_string())
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
