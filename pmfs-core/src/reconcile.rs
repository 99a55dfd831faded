//! Merging an externally sourced batch into a project.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;
use tracing::info;

use crate::dedup::Deduplicator;
use crate::error::{PmfsError, Result};
use crate::models::{Intelligence, Project, Requirement};
use crate::store::Store;

/// Conflict policy for [`Store::import`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ImportMode {
    /// Discard the current list and install the batch.
    Replace,
    /// Overwrite matching IDs in place, append the rest.
    #[default]
    SyncById,
}

impl fmt::Display for ImportMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ImportMode::Replace => write!(f, "replace"),
            ImportMode::SyncById => write!(f, "sync-by-id"),
        }
    }
}

impl FromStr for ImportMode {
    type Err = PmfsError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "replace" => Ok(ImportMode::Replace),
            "sync" | "sync-by-id" | "sync_by_id" => Ok(ImportMode::SyncById),
            other => Err(PmfsError::Config(format!("unknown import mode: {other}"))),
        }
    }
}

/// Project fields a batch may carry; unset fields are left alone.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProjectMetadata {
    pub scope: Option<String>,
    pub status: Option<String>,
    pub priority: Option<String>,
    pub start_date: Option<DateTime<Utc>>,
    pub end_date: Option<DateTime<Utc>>,
}

/// Rows parsed from an external source.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ImportBatch {
    pub metadata: Option<ProjectMetadata>,
    pub requirements: Vec<Requirement>,
    /// Rows awaiting review; folded in as proposed when nothing matches.
    pub potential_requirements: Vec<Requirement>,
    pub intelligence: Vec<Intelligence>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ImportReport {
    /// Existing requirements overwritten by ID.
    pub updated: usize,
    /// Requirements installed or appended.
    pub added: usize,
    /// Potential rows promoted into the list.
    pub promoted: usize,
    /// Intelligence entries installed, overwritten or appended.
    pub intelligence: usize,
}

/// Keyed by a `u32` ID, zero meaning "unassigned".
trait Numbered {
    fn id(&self) -> u32;
    fn set_id(&mut self, id: u32);
}

impl Numbered for Requirement {
    fn id(&self) -> u32 {
        self.id
    }
    fn set_id(&mut self, id: u32) {
        self.id = id;
    }
}

impl Numbered for Intelligence {
    fn id(&self) -> u32 {
        self.id
    }
    fn set_id(&mut self, id: u32) {
        self.id = id;
    }
}

/// Zero IDs get the lowest free numbers, counting up from 1.
fn renumber<T: Numbered>(rows: &mut [T]) {
    let taken: HashSet<u32> = rows.iter().map(Numbered::id).filter(|&id| id != 0).collect();
    let mut next = 1;
    for row in rows.iter_mut().filter(|r| r.id() == 0) {
        while taken.contains(&next) {
            next += 1;
        }
        row.set_id(next);
        next += 1;
    }
}

/// Returns (updated, added).
fn sync_by_id<T: Numbered>(existing: &mut Vec<T>, rows: Vec<T>) -> (usize, usize) {
    let (mut updated, mut added) = (0, 0);
    for mut row in rows {
        let slot = match row.id() {
            0 => None,
            id => existing.iter_mut().find(|e| e.id() == id),
        };
        match slot {
            Some(slot) => {
                *slot = row;
                updated += 1;
            }
            None => {
                row.set_id(existing.len() as u32 + 1);
                existing.push(row);
                added += 1;
            }
        }
    }
    (updated, added)
}

impl Store {
    /// Applies `batch` to `project` under `mode` and persists once.
    ///
    /// Potential rows go through `dedup` against the resulting list; oracle
    /// errors abort before anything is written and leave `project` unchanged.
    pub fn import(
        &self,
        project: &mut Project,
        batch: ImportBatch,
        mode: ImportMode,
        dedup: &Deduplicator<'_>,
    ) -> Result<ImportReport> {
        let mut data = project.data.clone();
        let mut report = ImportReport::default();

        if let Some(meta) = batch.metadata {
            apply_metadata(&mut data, meta);
        }

        match mode {
            ImportMode::Replace => {
                let mut requirements = batch.requirements;
                renumber(&mut requirements);
                report.added = requirements.len();
                data.requirements = requirements;

                let mut intelligence = batch.intelligence;
                renumber(&mut intelligence);
                report.intelligence = intelligence.len();
                data.intelligence = intelligence;
            }
            ImportMode::SyncById => {
                let (updated, added) = sync_by_id(&mut data.requirements, batch.requirements);
                report.updated = updated;
                report.added = added;

                let (i_updated, i_added) = sync_by_id(&mut data.intelligence, batch.intelligence);
                report.intelligence = i_updated + i_added;
            }
        }

        let potentials: Vec<Requirement> = batch
            .potential_requirements
            .into_iter()
            .map(|mut r| {
                r.condition.proposed = true;
                r.condition.active = false;
                r
            })
            .collect();
        report.promoted = dedup.absorb(&mut data.requirements, potentials)?.len();

        project.data = data;
        self.save_project(project)?;
        info!(
            project_id = project.id,
            %mode,
            updated = report.updated,
            added = report.added,
            promoted = report.promoted,
            intelligence = report.intelligence,
            "import applied"
        );
        Ok(report)
    }
}

fn apply_metadata(data: &mut crate::models::ProjectData, meta: ProjectMetadata) {
    if let Some(scope) = meta.scope {
        data.scope = scope;
    }
    if let Some(status) = meta.status {
        data.status = status;
    }
    if let Some(priority) = meta.priority {
        data.priority = priority;
    }
    if meta.start_date.is_some() {
        data.start_date = meta.start_date;
    }
    if meta.end_date.is_some() {
        data.end_date = meta.end_date;
    }
}
