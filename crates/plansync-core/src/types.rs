use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::OnceLock;

// ---------------------------------------------------------------------------
// Lifecycle
// ---------------------------------------------------------------------------

/// Lifecycle state attached to an epic, story, or retrospective entry.
///
/// This is the union of the three per-kind vocabularies; which subset is
/// valid for a given entry is decided by [`ItemKey::allows`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Lifecycle {
    Backlog,
    ReadyForDev,
    InProgress,
    Review,
    Done,
    Optional,
}

impl Lifecycle {
    pub fn all() -> &'static [Lifecycle] {
        &[
            Lifecycle::Backlog,
            Lifecycle::ReadyForDev,
            Lifecycle::InProgress,
            Lifecycle::Review,
            Lifecycle::Done,
            Lifecycle::Optional,
        ]
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Lifecycle::Backlog => "backlog",
            Lifecycle::ReadyForDev => "ready-for-dev",
            Lifecycle::InProgress => "in-progress",
            Lifecycle::Review => "review",
            Lifecycle::Done => "done",
            Lifecycle::Optional => "optional",
        }
    }

    /// Non-failing lookup used by the parsers, which default rather than error.
    pub fn parse(s: &str) -> Option<Lifecycle> {
        Lifecycle::all().iter().copied().find(|l| l.as_str() == s)
    }

    /// States that make a story the "current" one.
    pub fn is_actionable(self) -> bool {
        matches!(
            self,
            Lifecycle::InProgress | Lifecycle::ReadyForDev | Lifecycle::Review
        )
    }
}

impl fmt::Display for Lifecycle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Lifecycle {
    type Err = crate::error::PlansyncError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Lifecycle::parse(s).ok_or_else(|| {
            crate::error::PlansyncError::InvalidLifecycle(s.to_string())
        })
    }
}

// ---------------------------------------------------------------------------
// ItemKey
// ---------------------------------------------------------------------------

/// Classified shape of a `development_status` map key.
///
/// A key matches exactly one shape or none; classification happens once per
/// key and everything downstream switches on the variant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ItemKey {
    Epic { number: u32 },
    Story {
        epic: u32,
        story: u32,
        suffix: Option<char>,
        slug: String,
    },
    Retrospective { number: u32 },
}

static EPIC_KEY_RE: OnceLock<Regex> = OnceLock::new();
static STORY_KEY_RE: OnceLock<Regex> = OnceLock::new();
static RETRO_KEY_RE: OnceLock<Regex> = OnceLock::new();

fn epic_key_re() -> &'static Regex {
    EPIC_KEY_RE.get_or_init(|| Regex::new(r"^epic-([0-9]+)$").unwrap())
}

fn story_key_re() -> &'static Regex {
    STORY_KEY_RE.get_or_init(|| {
        Regex::new(r"^([0-9]+)-([0-9]+)([a-z])?-([a-z0-9][a-z0-9-]*)$").unwrap()
    })
}

fn retro_key_re() -> &'static Regex {
    RETRO_KEY_RE.get_or_init(|| Regex::new(r"^epic-([0-9]+)-retrospective$").unwrap())
}

impl ItemKey {
    /// Classify a raw key into one of the three shapes.
    ///
    /// Returns `None` for anything that matches no shape. The retrospective
    /// pattern is tried before the epic pattern so `epic-1-retrospective`
    /// never half-matches as an epic key.
    pub fn classify(key: &str) -> Option<ItemKey> {
        if let Some(c) = retro_key_re().captures(key) {
            let number = c[1].parse().ok()?;
            return Some(ItemKey::Retrospective { number });
        }
        if let Some(c) = epic_key_re().captures(key) {
            let number = c[1].parse().ok()?;
            return Some(ItemKey::Epic { number });
        }
        if let Some(c) = story_key_re().captures(key) {
            return Some(ItemKey::Story {
                epic: c[1].parse().ok()?,
                story: c[2].parse().ok()?,
                suffix: c.get(3).and_then(|m| m.as_str().chars().next()),
                slug: c[4].to_string(),
            });
        }
        None
    }

    /// Whether `state` belongs to this key shape's vocabulary.
    pub fn allows(&self, state: Lifecycle) -> bool {
        match self {
            ItemKey::Epic { .. } => matches!(
                state,
                Lifecycle::Backlog | Lifecycle::InProgress | Lifecycle::Done
            ),
            ItemKey::Story { .. } => matches!(
                state,
                Lifecycle::Backlog
                    | Lifecycle::ReadyForDev
                    | Lifecycle::InProgress
                    | Lifecycle::Review
                    | Lifecycle::Done
            ),
            ItemKey::Retrospective { .. } => {
                matches!(state, Lifecycle::Optional | Lifecycle::Done)
            }
        }
    }

    pub fn is_story(&self) -> bool {
        matches!(self, ItemKey::Story { .. })
    }
}

// ---------------------------------------------------------------------------
// ActionId
// ---------------------------------------------------------------------------

/// Identifier for a recommended next action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ActionId {
    CreateBrief,
    CreatePrd,
    CreateArchitecture,
    CreateEpics,
    StartStory,
    ContinueStory,
    AdjustPlan,
    ReviewStory,
    CreateNextStory,
    Retrospective,
}

impl ActionId {
    pub fn all() -> &'static [ActionId] {
        &[
            ActionId::CreateBrief,
            ActionId::CreatePrd,
            ActionId::CreateArchitecture,
            ActionId::CreateEpics,
            ActionId::StartStory,
            ActionId::ContinueStory,
            ActionId::AdjustPlan,
            ActionId::ReviewStory,
            ActionId::CreateNextStory,
            ActionId::Retrospective,
        ]
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ActionId::CreateBrief => "create-brief",
            ActionId::CreatePrd => "create-prd",
            ActionId::CreateArchitecture => "create-architecture",
            ActionId::CreateEpics => "create-epics",
            ActionId::StartStory => "start-story",
            ActionId::ContinueStory => "continue-story",
            ActionId::AdjustPlan => "adjust-plan",
            ActionId::ReviewStory => "review-story",
            ActionId::CreateNextStory => "create-next-story",
            ActionId::Retrospective => "retrospective",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            ActionId::CreateBrief => "Create product brief",
            ActionId::CreatePrd => "Create PRD",
            ActionId::CreateArchitecture => "Create architecture",
            ActionId::CreateEpics => "Create epics",
            ActionId::StartStory => "Start development",
            ActionId::ContinueStory => "Continue development",
            ActionId::AdjustPlan => "Adjust plan",
            ActionId::ReviewStory => "Review story",
            ActionId::CreateNextStory => "Create next story",
            ActionId::Retrospective => "Run retrospective",
        }
    }
}

impl fmt::Display for ActionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ActionId {
    type Err = crate::error::PlansyncError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ActionId::all()
            .iter()
            .copied()
            .find(|a| a.as_str() == s)
            .ok_or_else(|| crate::error::PlansyncError::InvalidAction(s.to_string()))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lifecycle_roundtrip() {
        use std::str::FromStr;
        for state in Lifecycle::all() {
            assert_eq!(Lifecycle::from_str(state.as_str()).unwrap(), *state);
        }
        assert!(Lifecycle::from_str("bogus").is_err());
    }

    #[test]
    fn classify_epic_key() {
        assert_eq!(
            ItemKey::classify("epic-3"),
            Some(ItemKey::Epic { number: 3 })
        );
    }

    #[test]
    fn classify_retrospective_before_epic() {
        assert_eq!(
            ItemKey::classify("epic-2-retrospective"),
            Some(ItemKey::Retrospective { number: 2 })
        );
    }

    #[test]
    fn classify_story_key() {
        assert_eq!(
            ItemKey::classify("1-2-user-login"),
            Some(ItemKey::Story {
                epic: 1,
                story: 2,
                suffix: None,
                slug: "user-login".to_string(),
            })
        );
        assert_eq!(
            ItemKey::classify("4-11b-split-checkout"),
            Some(ItemKey::Story {
                epic: 4,
                story: 11,
                suffix: Some('b'),
                slug: "split-checkout".to_string(),
            })
        );
    }

    #[test]
    fn classify_rejects_everything_else() {
        for key in ["", "epic-", "epic-x", "1-2-", "story-1", "Epic-1", "1--x"] {
            assert_eq!(ItemKey::classify(key), None, "expected unrecognized: {key}");
        }
    }

    #[test]
    fn vocabularies_per_shape() {
        let epic = ItemKey::classify("epic-1").unwrap();
        assert!(epic.allows(Lifecycle::InProgress));
        assert!(!epic.allows(Lifecycle::ReadyForDev));
        assert!(!epic.allows(Lifecycle::Optional));

        let story = ItemKey::classify("1-1-login").unwrap();
        assert!(story.allows(Lifecycle::ReadyForDev));
        assert!(story.allows(Lifecycle::Review));
        assert!(!story.allows(Lifecycle::Optional));

        let retro = ItemKey::classify("epic-1-retrospective").unwrap();
        assert!(retro.allows(Lifecycle::Optional));
        assert!(retro.allows(Lifecycle::Done));
        assert!(!retro.allows(Lifecycle::Backlog));
    }

    #[test]
    fn action_id_roundtrip() {
        use std::str::FromStr;
        for action in ActionId::all() {
            assert_eq!(ActionId::from_str(action.as_str()).unwrap(), *action);
        }
        assert!(ActionId::from_str("make-coffee").is_err());
    }
}
