use crate::paths;
use crate::snapshot::DashboardState;
use crate::types::{ActionId, ItemKey, Lifecycle};
use serde::Serialize;
use std::collections::{BTreeMap, HashSet};
use std::path::Path;
use std::str::FromStr;

// ---------------------------------------------------------------------------
// Action
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Action {
    pub id: ActionId,
    pub label: String,
    pub primary: bool,
}

impl Action {
    fn primary(id: ActionId) -> Self {
        Self {
            id,
            label: id.label().to_string(),
            primary: true,
        }
    }

    fn secondary(id: ActionId) -> Self {
        Self {
            id,
            label: id.label().to_string(),
            primary: false,
        }
    }
}

// ---------------------------------------------------------------------------
// InstalledWorkflows
// ---------------------------------------------------------------------------

/// The set of workflow capabilities installed in a project, used to filter
/// recommendations down to actions the project can actually run.
///
/// `everything()` disables the filter; a missing workflows directory is
/// treated the same way so a bare checkout still gets recommendations.
#[derive(Debug, Clone, Default)]
pub struct InstalledWorkflows {
    ids: Option<HashSet<ActionId>>,
}

impl InstalledWorkflows {
    pub fn everything() -> Self {
        Self { ids: None }
    }

    pub fn from_ids<I: IntoIterator<Item = ActionId>>(ids: I) -> Self {
        Self {
            ids: Some(ids.into_iter().collect()),
        }
    }

    pub fn contains(&self, id: ActionId) -> bool {
        match &self.ids {
            None => true,
            Some(set) => set.contains(&id),
        }
    }

    /// Scan `<root>/workflows/` for `<action-id>.md` files.
    pub fn discover(root: &Path) -> Self {
        let dir = paths::workflows_dir(root);
        let Ok(entries) = std::fs::read_dir(&dir) else {
            return Self::everything();
        };
        let ids = entries
            .flatten()
            .filter_map(|e| {
                let path = e.path();
                let stem = path.file_stem()?.to_str()?;
                (path.extension()?.to_str()? == "md")
                    .then(|| ActionId::from_str(stem).ok())
                    .flatten()
            })
            .collect();
        Self { ids: Some(ids) }
    }
}

// ---------------------------------------------------------------------------
// Recommendation
// ---------------------------------------------------------------------------

/// Suggest the next workflow steps for the given snapshot. Pure function:
/// no I/O, never fails. The first matching rule fully determines the list,
/// exactly one action is primary, and the installed-workflow filter only
/// removes actions without ever promoting another to primary.
pub fn recommend(state: &DashboardState, installed: &InstalledWorkflows) -> Vec<Action> {
    let mut actions = decide(state);
    actions.retain(|a| installed.contains(a.id));
    actions
}

fn decide(state: &DashboardState) -> Vec<Action> {
    // 1. No status document yet: the project is still in its planning
    //    phases; recommend the earliest missing one.
    let Some(status) = &state.status else {
        return phase_actions(state);
    };

    // 2-4. A current story drives the recommendation directly.
    if let Some(current_state) = current_story_state(state) {
        return match current_state {
            Lifecycle::InProgress => vec![
                Action::primary(ActionId::ContinueStory),
                Action::secondary(ActionId::AdjustPlan),
            ],
            Lifecycle::Review => vec![
                Action::primary(ActionId::ReviewStory),
                Action::secondary(ActionId::CreateNextStory),
            ],
            Lifecycle::ReadyForDev => vec![Action::primary(ActionId::StartStory)],
            // current_story only ever points at an actionable state.
            _ => vec![Action::primary(ActionId::CreateNextStory)],
        };
    }

    // 5. No current story: look at the shape of the whole backlog.
    let story_states: Vec<Lifecycle> = status
        .development_status
        .iter()
        .filter(|e| e.item.is_story())
        .map(|e| e.state)
        .collect();

    if story_states.is_empty() {
        return vec![Action::primary(ActionId::CreateNextStory)];
    }
    if story_states.iter().all(|s| *s == Lifecycle::Done) {
        return vec![Action::primary(ActionId::Retrospective)];
    }
    if has_epic_awaiting_retrospective(state) {
        return vec![
            Action::primary(ActionId::Retrospective),
            Action::secondary(ActionId::CreateNextStory),
        ];
    }
    if story_states.iter().any(|s| *s == Lifecycle::Backlog) {
        return vec![
            Action::primary(ActionId::CreateNextStory),
            Action::secondary(ActionId::AdjustPlan),
        ];
    }
    vec![Action::primary(ActionId::CreateNextStory)]
}

/// Earliest missing planning phase becomes primary, with up to two further
/// missing phases as alternatives.
fn phase_actions(state: &DashboardState) -> Vec<Action> {
    let ordered = [
        (state.phase.has_brief, ActionId::CreateBrief),
        (state.phase.has_prd, ActionId::CreatePrd),
        (state.phase.has_architecture, ActionId::CreateArchitecture),
        (state.phase.has_epics, ActionId::CreateEpics),
    ];
    let missing: Vec<ActionId> = ordered
        .iter()
        .filter(|(present, _)| !present)
        .map(|(_, id)| *id)
        .collect();

    match missing.split_first() {
        // All planning artifacts exist but no status document: stories are
        // the next thing to produce.
        None => vec![Action::primary(ActionId::CreateNextStory)],
        Some((first, rest)) => {
            let mut actions = vec![Action::primary(*first)];
            actions.extend(rest.iter().take(2).map(|id| Action::secondary(*id)));
            actions
        }
    }
}

fn current_story_state(state: &DashboardState) -> Option<Lifecycle> {
    let key = state.current_story.as_deref()?;
    let status = state.status.as_ref()?;
    status
        .development_status
        .iter()
        .find(|e| e.key == key)
        .map(|e| e.state)
}

/// True when some epic has at least one story, all of them done, and no
/// completed retrospective entry.
fn has_epic_awaiting_retrospective(state: &DashboardState) -> bool {
    let Some(status) = &state.status else {
        return false;
    };
    let mut per_epic: BTreeMap<u32, bool> = BTreeMap::new();
    let mut retro_done: HashSet<u32> = HashSet::new();
    for entry in &status.development_status {
        match &entry.item {
            ItemKey::Story { epic, .. } => {
                per_epic
                    .entry(*epic)
                    .and_modify(|all_done| *all_done &= entry.state == Lifecycle::Done)
                    .or_insert(entry.state == Lifecycle::Done);
            }
            ItemKey::Retrospective { number } if entry.state == Lifecycle::Done => {
                retro_done.insert(*number);
            }
            _ => {}
        }
    }
    per_epic
        .iter()
        .any(|(epic, all_done)| *all_done && !retro_done.contains(epic))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
