use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Root aggregate: every product known to one PMFS root.
///
/// This is also the shape of the index file. Project detail is skipped when
/// serialized, so the index stays small.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Database {
    #[serde(default)]
    pub products: Vec<Product>,
}

impl Database {
    pub fn new() -> Self {
        Self::default()
    }
}

/// A product and the projects that belong to it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Product {
    #[serde(default)]
    pub id: u32,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub projects: Vec<Project>,
}

/// Project identity plus its (separately persisted) detail.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Project {
    #[serde(default)]
    pub id: u32,
    #[serde(default)]
    pub product_id: u32,
    #[serde(default)]
    pub name: String,
    /// Lives only in the project's own file; never written to the index.
    #[serde(skip)]
    pub data: ProjectData,
}

impl Project {
    /// A project handle carrying only identity, ready for `Store::load_project`.
    pub fn handle(product_id: u32, id: u32) -> Self {
        Self {
            id,
            product_id,
            ..Default::default()
        }
    }

    pub fn requirement(&self, id: u32) -> Option<&Requirement> {
        self.data.requirements.iter().find(|r| r.id == id)
    }

    pub fn requirement_mut(&mut self, id: u32) -> Option<&mut Requirement> {
        self.data.requirements.iter_mut().find(|r| r.id == id)
    }

    /// Next dense ID for the requirement list (`count + 1`).
    pub fn next_requirement_id(&self) -> u32 {
        self.data.requirements.len() as u32 + 1
    }
}

/// On-disk shape of `project.yaml`: identity plus full detail.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub(crate) struct ProjectRecord {
    #[serde(default)]
    pub id: u32,
    #[serde(default)]
    pub product_id: u32,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub data: ProjectData,
}

impl From<&Project> for ProjectRecord {
    fn from(p: &Project) -> Self {
        Self {
            id: p.id,
            product_id: p.product_id,
            name: p.name.clone(),
            data: p.data.clone(),
        }
    }
}

/// The heavy part of a project.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProjectData {
    #[serde(default)]
    pub scope: String,
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub priority: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_date: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_date: Option<DateTime<Utc>>,
    /// Working set: confirmed and proposed requirements alike.
    #[serde(default)]
    pub requirements: Vec<Requirement>,
    /// Summaries extracted from attachments.
    #[serde(default)]
    pub intelligence: Vec<Intelligence>,
    #[serde(default)]
    pub attachments: Vec<Attachment>,
}

/// A single requirement with its lifecycle flags.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Requirement {
    #[serde(default)]
    pub id: u32,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub description: String,
    /// 1 (highest) to 8 (lowest); 0 when unset.
    #[serde(default)]
    pub priority: u8,
    /// Hierarchical level within the requirement list.
    #[serde(default)]
    pub level: u32,
    #[serde(default)]
    pub owner: String,
    /// Free-form workflow status, e.g. "Draft", "Confirmed".
    #[serde(default)]
    pub status: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
    /// 0 for top level, otherwise the ID of the originating requirement.
    #[serde(default)]
    pub parent_id: u32,
    /// 1-based attachment this requirement was extracted from, 0 for none.
    #[serde(default)]
    pub attachment_index: u32,
    #[serde(default)]
    pub category: String,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub history: Vec<ChangeLog>,
    #[serde(default)]
    pub gate_results: Vec<GateResult>,
    #[serde(default)]
    pub design_aspects: Vec<DesignAspect>,
    #[serde(default)]
    pub condition: Condition,
}

impl Requirement {
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            ..Default::default()
        }
    }

    /// A requirement surfaced by extraction or suggestion, awaiting review.
    pub fn proposed(name: impl Into<String>, description: impl Into<String>) -> Self {
        let mut req = Self::new(name, description);
        req.condition.proposed = true;
        req.condition.ai_generated = true;
        req
    }

    pub fn is_top_level(&self) -> bool {
        self.parent_id == 0
    }

    /// Appends a history entry and bumps `updated_at`.
    pub fn record_change(&mut self, user: impl Into<String>, comment: impl Into<String>) {
        let now = Utc::now();
        self.history.push(ChangeLog {
            timestamp: now,
            user: user.into(),
            comment: comment.into(),
        });
        self.updated_at = Some(now);
    }
}

/// Independent lifecycle flags. Combinations are meaningful:
/// `proposed && !active` is "suggested, awaiting review"; `deleted` wins over
/// everything else without clearing it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Condition {
    #[serde(default)]
    pub proposed: bool,
    #[serde(default)]
    pub ai_generated: bool,
    #[serde(default)]
    pub ai_analyzed: bool,
    #[serde(default)]
    pub active: bool,
    #[serde(default)]
    pub deleted: bool,
    /// Gate ID -> passed.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub gate_results: BTreeMap<String, bool>,
}

/// Outcome of one quality gate evaluated against a requirement.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GateResult {
    #[serde(default)]
    pub gate_id: String,
    #[serde(default)]
    pub question: String,
    #[serde(default)]
    pub passed: bool,
    /// Model answer to the gate's follow-up, only asked on failure.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub follow_up: String,
}

/// A design topic derived from a requirement or an intelligence summary.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DesignAspect {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub templates: Vec<Requirement>,
    /// Set once templates have been turned into project requirements.
    #[serde(default)]
    pub processed: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeLog {
    /// Unix epoch when absent from the file.
    #[serde(default)]
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub user: String,
    #[serde(default)]
    pub comment: String,
}

/// Minimal metadata about an ingested file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attachment {
    #[serde(default)]
    pub id: u32,
    #[serde(default)]
    pub filename: String,
    /// Relative to the project directory, e.g. `attachments/3/brief.pdf`.
    #[serde(default)]
    pub rel_path: String,
    #[serde(default)]
    pub mimetype: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub added_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub analyzed: bool,
}

/// Data extracted from an attachment.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Intelligence {
    #[serde(default)]
    pub id: u32,
    #[serde(default)]
    pub filepath: String,
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extracted_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub design_aspects: Vec<DesignAspect>,
}
