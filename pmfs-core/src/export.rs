//! Batch files: project export and import-batch loading.
//!
//! JSON and YAML exports use the [`ImportBatch`] shape, so an exported file can
//! be fed straight back into [`Store::import`](crate::store::Store::import).

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use tracing::info;

use crate::codec;
use crate::error::{PmfsError, Result};
use crate::models::{Project, Requirement};
use crate::reconcile::{ImportBatch, ProjectMetadata};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportFormat {
    Json,
    Yaml,
    /// Human-readable specification; export only.
    Markdown,
}

impl ExportFormat {
    /// Picks the format from the file extension.
    pub fn from_path(path: &Path) -> Result<Self> {
        let ext = path
            .extension()
            .map(|e| e.to_string_lossy().to_lowercase())
            .unwrap_or_default();
        match ext.as_str() {
            "json" => Ok(ExportFormat::Json),
            "yaml" | "yml" => Ok(ExportFormat::Yaml),
            "md" | "markdown" => Ok(ExportFormat::Markdown),
            _ => Err(PmfsError::Config(format!(
                "unsupported batch file extension: {}",
                path.display()
            ))),
        }
    }
}

/// The batch that reproduces `project`'s data on import.
pub fn batch_from_project(project: &Project) -> ImportBatch {
    let data = &project.data;
    ImportBatch {
        metadata: Some(ProjectMetadata {
            scope: Some(data.scope.clone()),
            status: Some(data.status.clone()),
            priority: Some(data.priority.clone()),
            start_date: data.start_date,
            end_date: data.end_date,
        }),
        requirements: data.requirements.clone(),
        potential_requirements: Vec::new(),
        intelligence: data.intelligence.clone(),
    }
}

/// Writes `project` to `output_path` in the format its extension names.
pub fn export_project(project: &Project, output_path: &Path) -> Result<()> {
    match ExportFormat::from_path(output_path)? {
        ExportFormat::Json => codec::write_json(output_path, &batch_from_project(project))?,
        ExportFormat::Yaml => codec::write_yaml(output_path, &batch_from_project(project))?,
        ExportFormat::Markdown => {
            let doc = render_markdown(project);
            codec::atomic_write(output_path, doc.as_bytes())?;
        }
    }
    info!(
        path = %output_path.display(),
        requirements = project.data.requirements.len(),
        "exported project"
    );
    Ok(())
}

/// Reads an [`ImportBatch`] from a `.json`, `.yaml` or `.yml` file.
pub fn load_batch(path: &Path) -> Result<ImportBatch> {
    match ExportFormat::from_path(path)? {
        ExportFormat::Json => codec::read_json(path),
        ExportFormat::Yaml => {
            let content = fs::read_to_string(path).map_err(|e| PmfsError::io("read", path, e))?;
            serde_yaml::from_str(&content).map_err(|source| PmfsError::Yaml {
                path: path.to_path_buf(),
                source,
            })
        }
        ExportFormat::Markdown => Err(PmfsError::Config(format!(
            "cannot import from markdown: {}",
            path.display()
        ))),
    }
}

/// Requirements grouped by category; deleted ones are left out.
pub fn render_markdown(project: &Project) -> String {
    let mut output = String::new();
    output.push_str(&format!("# {}\n\n", project.name));
    if !project.data.scope.is_empty() {
        output.push_str(&format!("{}\n\n", project.data.scope));
    }

    let mut by_category: BTreeMap<&str, Vec<&Requirement>> = BTreeMap::new();
    for req in project.data.requirements.iter().filter(|r| !r.condition.deleted) {
        let category = if req.category.is_empty() {
            "Uncategorized"
        } else {
            req.category.as_str()
        };
        by_category.entry(category).or_default().push(req);
    }

    for (category, reqs) in by_category {
        output.push_str(&format!("## {}\n\n", category));
        for req in reqs {
            let marker = if req.condition.proposed { " (proposed)" } else { "" };
            output.push_str(&format!("### {} - {}{}\n\n", req.id, req.name, marker));
            if !req.description.is_empty() {
                output.push_str(&format!("{}\n\n", req.description));
            }
            if req.parent_id != 0 {
                if let Some(parent) = project.requirement(req.parent_id) {
                    output.push_str(&format!("**Parent:** {} - {}\n\n", parent.id, parent.name));
                }
            }
        }
    }
    output
}
