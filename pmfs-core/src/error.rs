//! Error types for PMFS store operations.

use std::path::PathBuf;
use thiserror::Error;

use crate::ai::AiError;

/// Errors returned by the store, lifecycle, dedup and import layers.
#[derive(Error, Debug)]
pub enum PmfsError {
    /// No product with the given ID exists in the database.
    #[error("product not found: {0}")]
    ProductNotFound(u32),

    /// No project detail exists for the given product/project pair.
    #[error("project not found: product {product_id}, project {project_id}")]
    ProjectNotFound { product_id: u32, project_id: u32 },

    /// No attachment with the given ID exists in the project.
    #[error("attachment not found: {0}")]
    AttachmentNotFound(u32),

    /// The attachment is not UTF-8 text and cannot be sent to a model.
    #[error("attachment is not text: {}", .0.display())]
    BinaryAttachment(PathBuf),

    /// A name argument was empty or whitespace only.
    #[error("{0} name cannot be empty")]
    EmptyName(&'static str),

    /// A project was loaded or saved before its identity was stamped.
    #[error("project identity not set (product {product_id}, project {project_id})")]
    MissingIdentity { product_id: u32, project_id: u32 },

    /// Filesystem operation failed.
    #[error("{op} {}: {source}", path.display())]
    Io {
        op: &'static str,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// YAML (de)serialization failed for the file at `path`.
    #[error("yaml error at {}: {source}", path.display())]
    Yaml {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    /// JSON (de)serialization failed for the file at `path`.
    #[error("json error at {}: {source}", path.display())]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    /// Timed out waiting for the advisory lock on a project file.
    #[error("timeout waiting for lock on {} - another process may be writing", .0.display())]
    Locked(PathBuf),

    /// External model / oracle failure, passed through unchanged.
    #[error(transparent)]
    Ai(#[from] AiError),

    /// Configuration could not be read or parsed.
    #[error("configuration error: {0}")]
    Config(String),
}

impl PmfsError {
    pub(crate) fn io(op: &'static str, path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        PmfsError::Io {
            op,
            path: path.into(),
            source,
        }
    }

    /// True for the not-found sentinels callers are expected to branch on.
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            PmfsError::ProductNotFound(_)
                | PmfsError::ProjectNotFound { .. }
                | PmfsError::AttachmentNotFound(_)
        )
    }
}

/// Convenience Result type for pmfs-core operations.
pub type Result<T> = std::result::Result<T, PmfsError>;
