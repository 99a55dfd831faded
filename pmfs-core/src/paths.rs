//! Deterministic on-disk layout of a PMFS database.
//!
//! ```text
//! <root>/products/index.yaml
//! <root>/products/<productId>/projects/<projectId>/project.yaml
//! <root>/products/<productId>/projects/<projectId>/attachments/<n>/<file>
//! <root>/products/<productId>/projects/<projectId>/input/
//! ```

use std::path::{Path, PathBuf};

pub const PRODUCTS_DIR: &str = "products";
pub const PROJECTS_DIR: &str = "projects";
pub const INDEX_FILENAME: &str = "index.yaml";
pub const PROJECT_FILENAME: &str = "project.yaml";
pub const ATTACHMENTS_DIR: &str = "attachments";
pub const INPUT_DIR: &str = "input";

/// Maps entity identities to filesystem locations under one root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Layout {
    root: PathBuf,
}

impl Layout {
    pub fn new<P: AsRef<Path>>(root: P) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn products_dir(&self) -> PathBuf {
        self.root.join(PRODUCTS_DIR)
    }

    pub fn index_path(&self) -> PathBuf {
        self.products_dir().join(INDEX_FILENAME)
    }

    pub fn product_dir(&self, product_id: u32) -> PathBuf {
        self.products_dir().join(product_id.to_string())
    }

    pub fn projects_dir(&self, product_id: u32) -> PathBuf {
        self.product_dir(product_id).join(PROJECTS_DIR)
    }

    pub fn project_dir(&self, product_id: u32, project_id: u32) -> PathBuf {
        self.projects_dir(product_id).join(project_id.to_string())
    }

    pub fn project_file(&self, product_id: u32, project_id: u32) -> PathBuf {
        self.project_dir(product_id, project_id).join(PROJECT_FILENAME)
    }

    pub fn attachments_dir(&self, product_id: u32, project_id: u32) -> PathBuf {
        self.project_dir(product_id, project_id).join(ATTACHMENTS_DIR)
    }

    pub fn input_dir(&self, product_id: u32, project_id: u32) -> PathBuf {
        self.project_dir(product_id, project_id).join(INPUT_DIR)
    }
}
