//! Buzzword packs a card can be drawn from.
//!
//! A `Category` is the word-pool collaborator: an id, a display name, the
//! pool of target words and an optional alias map from canonical word to
//! equivalent spoken forms. `CategoryCatalog` holds the built-in packs plus
//! any packs defined in the configuration file.

use std::collections::{BTreeMap, HashSet};

use serde::{Deserialize, Serialize};

use crate::error::{BingoError, Result};
use crate::types::WORDS_PER_CARD;

/// A named word pool with optional aliases.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Category {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub icon: String,
    #[serde(default)]
    pub description: String,
    pub words: Vec<String>,
    /// Canonical word -> equivalent surface forms.
    #[serde(default)]
    pub aliases: BTreeMap<String, Vec<String>>,
}

impl Category {
    /// Words of the pool with case-insensitive duplicates and blanks removed,
    /// first spelling wins.
    pub fn distinct_words(&self) -> Vec<String> {
        let mut seen = HashSet::new();
        self.words
            .iter()
            .map(|w| w.trim())
            .filter(|w| !w.is_empty())
            .filter(|w| seen.insert(w.to_lowercase()))
            .map(str::to_string)
            .collect()
    }

    /// Checks the pool can fill a card.
    pub fn validate(&self) -> Result<()> {
        let found = self.distinct_words().len();
        if found < WORDS_PER_CARD {
            return Err(BingoError::InsufficientWords {
                category: self.id.clone(),
                found,
                required: WORDS_PER_CARD,
            });
        }
        Ok(())
    }
}

/// Lookup of all playable categories by id.
#[derive(Clone, Debug)]
pub struct CategoryCatalog {
    categories: Vec<Category>,
}

impl Default for CategoryCatalog {
    fn default() -> Self {
        Self::builtin()
    }
}

impl CategoryCatalog {
    /// Catalog containing only the built-in packs.
    pub fn builtin() -> Self {
        Self {
            categories: vec![agile(), corporate(), tech()],
        }
    }

    /// Adds or replaces packs. A custom pack with an existing id overrides it.
    pub fn with_custom(mut self, custom: impl IntoIterator<Item = Category>) -> Self {
        for category in custom {
            match self.categories.iter_mut().find(|c| c.id == category.id) {
                Some(existing) => {
                    tracing::info!(category = %category.id, "Custom category overrides built-in pack");
                    *existing = category;
                }
                None => self.categories.push(category),
            }
        }
        self
    }

    pub fn get(&self, id: &str) -> Result<&Category> {
        self.categories
            .iter()
            .find(|c| c.id.eq_ignore_ascii_case(id))
            .ok_or_else(|| BingoError::UnknownCategory(id.to_string()))
    }

    pub fn list(&self) -> &[Category] {
        &self.categories
    }
}

fn pack(
    id: &str,
    name: &str,
    icon: &str,
    description: &str,
    words: &[&str],
    aliases: &[(&str, &[&str])],
) -> Category {
    Category {
        id: id.to_string(),
        name: name.to_string(),
        icon: icon.to_string(),
        description: description.to_string(),
        words: words.iter().map(|w| w.to_string()).collect(),
        aliases: aliases
            .iter()
            .map(|(canonical, forms)| {
                (
                    canonical.to_string(),
                    forms.iter().map(|f| f.to_string()).collect(),
                )
            })
            .collect(),
    }
}

fn agile() -> Category {
    pack(
        "agile",
        "Agile & Scrum",
        "🏃",
        "Sprint planning, standups, and retros",
        &[
            "sprint", "backlog", "standup", "retro", "velocity", "story points", "epic",
            "user story", "blocker", "scrum master", "product owner", "burndown", "kanban",
            "WIP", "definition of done", "acceptance criteria", "grooming", "refinement",
            "spike", "iteration", "demo", "stakeholder", "MVP", "timebox", "capacity",
            "swimlane", "ticket", "Jira", "estimate", "planning poker", "increment",
            "roadmap", "dependency", "cadence", "ceremony", "scope creep", "agile",
            "waterfall", "carry over", "tech debt",
        ],
        &[
            ("standup", &["stand-up", "daily scrum"]),
            ("retro", &["retrospective"]),
            ("MVP", &["minimum viable product"]),
            ("WIP", &["work in progress"]),
            ("grooming", &["backlog grooming"]),
            ("tech debt", &["technical debt"]),
            ("Jira", &["jira ticket"]),
        ],
    )
}

fn corporate() -> Category {
    pack(
        "corporate",
        "Corporate Speak",
        "💼",
        "Synergy, alignment, and circling back",
        &[
            "synergy", "leverage", "circle back", "deep dive", "low-hanging fruit",
            "move the needle", "bandwidth", "alignment", "touch base", "take offline",
            "paradigm shift", "best practice", "win-win", "game changer", "ROI", "KPI",
            "stakeholder", "deliverable", "action item", "value add", "core competency",
            "pivot", "scalable", "holistic", "ecosystem", "thought leader", "boil the ocean",
            "ping", "loop in", "on my radar", "moving forward", "net-net", "headwinds",
            "tailwinds", "north star", "double click", "optics", "run it up the flagpole",
            "granular", "buy-in", "quick win", "EOD",
        ],
        &[
            ("ROI", &["return on investment"]),
            ("KPI", &["key performance indicator", "key performance indicators"]),
            ("take offline", &["take this offline", "take it offline"]),
            ("EOD", &["end of day"]),
            ("circle back", &["circling back"]),
            ("touch base", &["touching base"]),
            ("loop in", &["looping in", "loop you in"]),
        ],
    )
}

fn tech() -> Category {
    pack(
        "tech",
        "Tech & Engineering",
        "💻",
        "Deploys, APIs, and production incidents",
        &[
            "API", "deploy", "microservices", "Kubernetes", "Docker", "CI/CD", "pull request",
            "code review", "refactor", "latency", "scalability", "database", "cache",
            "endpoint", "regression", "hotfix", "rollback", "production", "staging",
            "load balancer", "cloud", "serverless", "observability", "on-call", "incident",
            "postmortem", "SLA", "uptime", "bug", "feature flag", "merge conflict",
            "unit test", "technical debt", "architecture", "legacy", "migration", "sync",
            "throughput", "bottleneck", "edge case",
        ],
        &[
            ("Kubernetes", &["k8s", "kube"]),
            ("CI/CD", &["continuous integration", "continuous deployment", "pipeline"]),
            ("pull request", &["PR", "merge request"]),
            ("postmortem", &["post-mortem", "post mortem"]),
            ("SLA", &["service level agreement"]),
            ("feature flag", &["feature toggle"]),
            ("database", &["DB"]),
        ],
    )
}
