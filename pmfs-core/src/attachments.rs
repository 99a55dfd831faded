//! Attachment ingest and intelligence extraction.
//!
//! Files dropped into a project's `input/` folder are moved to
//! `attachments/<n>/<file>`, recorded on the project, and text files are run
//! through an [`ExtractionOracle`] to surface proposed requirements.

use chrono::Utc;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use crate::ai::interact::{self, Answer};
use crate::ai::{prompts, responses, ExtractionOracle, LanguageModel};
use crate::dedup::Deduplicator;
use crate::error::{PmfsError, Result};
use crate::lifecycle::Analyst;
use crate::models::{Attachment, Intelligence, Project};
use crate::paths::ATTACHMENTS_DIR;
use crate::store::Store;

impl Store {
    /// Ingests every regular, non-hidden file in `dir`, in name order.
    ///
    /// A missing directory ingests nothing. Stops at the first failure and
    /// returns it; attachments ingested before that stay recorded.
    pub fn ingest_input_dir(
        &self,
        project: &mut Project,
        dir: &Path,
        extractor: Option<&dyn ExtractionOracle>,
        dedup: &Deduplicator<'_>,
    ) -> Result<Vec<Attachment>> {
        let entries = match fs::read_dir(dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(PmfsError::io("read dir", dir, e)),
        };

        let mut names = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| PmfsError::io("read dir", dir, e))?;
            let is_file = entry
                .file_type()
                .map_err(|e| PmfsError::io("stat", entry.path(), e))?
                .is_file();
            let name = entry.file_name().to_string_lossy().into_owned();
            if is_file && !name.starts_with('.') {
                names.push(name);
            }
        }
        names.sort();

        let mut ingested = Vec::with_capacity(names.len());
        for name in names {
            ingested.push(self.add_attachment_from_input(project, dir, &name, extractor, dedup)?);
        }
        Ok(ingested)
    }

    /// Moves `dir/filename` into the next `attachments/<n>/` slot, records it,
    /// extracts requirements from text content and persists the project.
    ///
    /// The record is persisted even when extraction fails, so the project
    /// always lists a file that was moved; the extraction error is returned.
    pub fn add_attachment_from_input(
        &self,
        project: &mut Project,
        dir: &Path,
        filename: &str,
        extractor: Option<&dyn ExtractionOracle>,
        dedup: &Deduplicator<'_>,
    ) -> Result<Attachment> {
        let source = dir.join(filename);
        if !source.is_file() {
            return Err(PmfsError::io(
                "ingest",
                &source,
                std::io::Error::new(ErrorKind::NotFound, "input file not found"),
            ));
        }

        let base_dir = self.layout().attachments_dir(project.product_id, project.id);
        let id = next_slot(&base_dir)?;
        let slot = base_dir.join(id.to_string());
        fs::create_dir_all(&slot).map_err(|e| PmfsError::io("mkdir", &slot, e))?;

        let base = Path::new(filename)
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| filename.to_string());
        let dest = slot.join(&base);
        move_file(&source, &dest)?;

        let mut attachment = Attachment {
            id,
            filename: base.clone(),
            rel_path: format!("{}/{}/{}", ATTACHMENTS_DIR, id, base),
            mimetype: detect_mime_type(&dest).to_string(),
            added_at: Some(Utc::now()),
            analyzed: false,
        };
        info!(
            attachment_id = id,
            file = %base,
            mimetype = %attachment.mimetype,
            "ingested attachment"
        );

        let extracted = match extractor {
            Some(oracle) if attachment.mimetype.starts_with("text/") => {
                self.extract_from(project, &attachment, &dest, oracle, dedup)
            }
            _ => Ok(false),
        };
        attachment.analyzed = matches!(extracted, Ok(true));
        project.data.attachments.push(attachment.clone());
        self.save_project(project)?;
        extracted?;
        Ok(attachment)
    }

    fn extract_from(
        &self,
        project: &mut Project,
        attachment: &Attachment,
        path: &Path,
        oracle: &dyn ExtractionOracle,
        dedup: &Deduplicator<'_>,
    ) -> Result<bool> {
        let content = read_text(path)?;
        let candidates = oracle
            .extract(&content)?
            .into_iter()
            .map(|mut r| {
                r.attachment_index = attachment.id;
                r.condition.proposed = true;
                r.condition.active = false;
                r
            })
            .collect();
        let added = dedup.absorb(&mut project.data.requirements, candidates)?;
        debug!(attachment_id = attachment.id, added = added.len(), "extracted requirements");
        Ok(true)
    }

    /// Summarizes attachment `attachment_id` into a new intelligence entry
    /// with design aspects derived from the summary, and persists.
    pub fn extract_intelligence<M: LanguageModel + ?Sized>(
        &self,
        project: &mut Project,
        attachment_id: u32,
        model: &M,
    ) -> Result<Intelligence> {
        let attachment = project
            .data
            .attachments
            .iter()
            .find(|a| a.id == attachment_id)
            .ok_or(PmfsError::AttachmentNotFound(attachment_id))?;
        let path = self
            .layout()
            .project_dir(project.product_id, project.id)
            .join(&attachment.rel_path);
        let content = read_text(&path)?;

        let summary = model.ask(&prompts::build_summary_prompt(&content))?;
        let aspects_answer = model.ask(&prompts::build_intelligence_aspects_prompt(&summary))?;
        let design_aspects = responses::parse_design_aspects(&aspects_answer)?;

        let intel = Intelligence {
            id: project.data.intelligence.len() as u32 + 1,
            filepath: attachment.rel_path.clone(),
            content,
            description: summary.trim().to_string(),
            extracted_at: Some(Utc::now()),
            design_aspects,
        };
        project.data.intelligence.push(intel.clone());
        self.save_project(project)?;
        info!(attachment_id, intelligence_id = intel.id, "extracted intelligence");
        Ok(intel)
    }
}

impl Store {
    /// Asks `role`/`question_id` about attachment `attachment_id`.
    ///
    /// Text attachments are read as they are. For anything else `extractor`
    /// reads the file and its requirements, one `name: description` line each,
    /// become the text under question; without an extractor that is a
    /// [`PmfsError::BinaryAttachment`]. The project is not modified.
    pub fn analyse_attachment(
        &self,
        project: &Project,
        attachment_id: u32,
        analyst: &Analyst<'_>,
        extractor: Option<&dyn ExtractionOracle>,
        role: &str,
        question_id: &str,
    ) -> Result<Answer> {
        let attachment = project
            .data
            .attachments
            .iter()
            .find(|a| a.id == attachment_id)
            .ok_or(PmfsError::AttachmentNotFound(attachment_id))?;
        let path = self
            .layout()
            .project_dir(project.product_id, project.id)
            .join(&attachment.rel_path);

        let content = if detect_mime_type(&path).starts_with("text/") {
            read_text(&path)?
        } else {
            let oracle = extractor.ok_or_else(|| PmfsError::BinaryAttachment(path.clone()))?;
            oracle
                .extract_file(&path)?
                .iter()
                .map(|r| format!("{}: {}\n", r.name, r.description))
                .collect()
        };

        let answer =
            interact::ask_role(analyst.model, analyst.prompts, role, question_id, &content)?;
        debug!(attachment_id, passed = answer.passed, "analysed attachment");
        Ok(answer)
    }
}

/// One past the highest numeric subdirectory, 1 when there are none.
fn next_slot(base_dir: &Path) -> Result<u32> {
    let entries = match fs::read_dir(base_dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(1),
        Err(e) => return Err(PmfsError::io("read dir", base_dir, e)),
    };
    let mut highest = 0;
    for entry in entries.flatten() {
        if !entry.path().is_dir() {
            continue;
        }
        if let Ok(n) = entry.file_name().to_string_lossy().parse::<u32>() {
            highest = highest.max(n);
        }
    }
    Ok(highest + 1)
}

/// Rename, falling back to copy + remove across devices.
fn move_file(src: &Path, dst: &Path) -> Result<()> {
    if fs::rename(src, dst).is_ok() {
        return Ok(());
    }
    fs::copy(src, dst).map_err(|e| PmfsError::io("copy", dst, e))?;
    fs::remove_file(src).map_err(|e| PmfsError::io("remove", src, e))
}

fn read_text(path: &Path) -> Result<String> {
    let bytes = fs::read(path).map_err(|e| PmfsError::io("read", path, e))?;
    String::from_utf8(bytes).map_err(|_| PmfsError::BinaryAttachment(PathBuf::from(path)))
}

/// Mimetype from the file extension; `application/octet-stream` when unknown.
pub fn detect_mime_type(path: &Path) -> &'static str {
    let ext = path
        .extension()
        .map(|e| e.to_string_lossy().to_lowercase())
        .unwrap_or_default();
    match ext.as_str() {
        "txt" | "text" | "log" => "text/plain",
        "md" | "markdown" => "text/markdown",
        "csv" => "text/csv",
        "html" | "htm" => "text/html",
        "json" => "application/json",
        "yaml" | "yml" => "application/yaml",
        "xml" => "application/xml",
        "pdf" => "application/pdf",
        "xlsx" => "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet",
        "docx" => "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "gif" => "image/gif",
        _ => {
            warn!(path = %path.display(), "unknown extension, treating as binary");
            "application/octet-stream"
        }
    }
}
