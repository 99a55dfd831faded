//! The hierarchical store: Database -> Product -> Project.
//!
//! Two-tier persistence. The index file holds product/project identity only;
//! each project's detail lives in its own `project.yaml`. Writing a new project
//! is two sequential fallible steps (detail file, then index via [`Store::save`]);
//! a crash between them leaves a detail file the index does not list yet.

use std::fs;
use std::path::Path;
use std::sync::Arc;

use tracing::{debug, info};

use crate::codec::{self, WriteLock};
use crate::error::{PmfsError, Result};
use crate::models::{Database, Product, Project, ProjectData, ProjectRecord};
use crate::notify::ChangeNotifier;
use crate::paths::Layout;

/// Handle on one PMFS root directory. Cheap to clone; holds no open files.
#[derive(Debug, Clone)]
pub struct Store {
    layout: Layout,
    notifier: Option<Arc<ChangeNotifier>>,
}

impl Store {
    /// Creates a handle for `root`. Nothing is touched on disk until
    /// [`Store::ensure_layout`] or the first load/save.
    pub fn new<P: AsRef<Path>>(root: P) -> Self {
        Self {
            layout: Layout::new(root),
            notifier: None,
        }
    }

    /// Publishes a change event after every successful `save_project`.
    pub fn with_notifier(mut self, notifier: Arc<ChangeNotifier>) -> Self {
        self.notifier = Some(notifier);
        self
    }

    pub fn layout(&self) -> &Layout {
        &self.layout
    }

    /// Creates `<root>/products/` and an empty index if they are missing.
    pub fn ensure_layout(&self) -> Result<()> {
        let products = self.layout.products_dir();
        fs::create_dir_all(&products).map_err(|e| PmfsError::io("mkdir", &products, e))?;

        let index = self.layout.index_path();
        if !index.exists() {
            codec::write_yaml(&index, &Database::new())?;
            info!(path = %index.display(), "created empty index");
        }
        Ok(())
    }

    /// Reads the index. A missing index is synthesized empty and written back.
    ///
    /// Projects in the returned database carry identity only; their `data`
    /// stays default until [`Store::load_project`] or [`Store::load_all_projects`].
    pub fn load_database(&self) -> Result<Database> {
        let mut db: Database = codec::read_yaml_or_create(&self.layout.index_path())?;
        for product in &mut db.products {
            stamp_product_id(product);
        }
        Ok(db)
    }

    /// Writes the index. Project detail is never part of it.
    pub fn save(&self, db: &Database) -> Result<()> {
        let path = self.layout.index_path();
        codec::write_yaml(&path, db)?;
        debug!(path = %path.display(), products = db.products.len(), "saved index");
        Ok(())
    }

    /// Adds a product, creates `products/<id>/projects/` and persists the index.
    ///
    /// ID = `count(existing products) + 1`.
    pub fn new_product(&self, db: &mut Database, name: &str) -> Result<u32> {
        let name = name.trim();
        if name.is_empty() {
            return Err(PmfsError::EmptyName("product"));
        }

        let id = db.products.len() as u32 + 1;
        let projects_dir = self.layout.projects_dir(id);
        fs::create_dir_all(&projects_dir)
            .map_err(|e| PmfsError::io("mkdir", &projects_dir, e))?;

        db.products.push(Product {
            id,
            name: name.to_string(),
            projects: Vec::new(),
        });
        self.save(db)?;
        info!(product_id = id, name, "created product");
        Ok(id)
    }

    /// Renames a product and persists the index.
    pub fn modify_product(&self, db: &mut Database, id: u32, name: &str) -> Result<()> {
        let name = name.trim();
        if name.is_empty() {
            return Err(PmfsError::EmptyName("product"));
        }
        let product = product_mut(db, id)?;
        product.name = name.to_string();
        self.save(db)
    }

    /// Adds a project under `product` and writes its detail file.
    ///
    /// ID = `count(projects under product) + 1`. The index is *not* written
    /// here: the caller persists the owning [`Database`] with [`Store::save`].
    pub fn new_project(
        &self,
        product: &mut Product,
        name: &str,
        data: ProjectData,
    ) -> Result<u32> {
        let name = name.trim();
        if name.is_empty() {
            return Err(PmfsError::EmptyName("project"));
        }

        let id = product.projects.len() as u32 + 1;
        let dir = self.layout.project_dir(product.id, id);
        fs::create_dir_all(&dir).map_err(|e| PmfsError::io("mkdir", &dir, e))?;

        let project = Project {
            id,
            product_id: product.id,
            name: name.to_string(),
            data,
        };
        self.save_project(&project)?;
        product.projects.push(project);
        info!(product_id = product.id, project_id = id, name, "created project");
        Ok(id)
    }

    /// Reads the full detail file for `project`'s `(product_id, id)`.
    pub fn load_project(&self, project: &mut Project) -> Result<()> {
        check_identity(project)?;
        let path = self.layout.project_file(project.product_id, project.id);
        let record: ProjectRecord = codec::read_yaml(&path)?.ok_or(PmfsError::ProjectNotFound {
            product_id: project.product_id,
            project_id: project.id,
        })?;

        project.id = record.id;
        project.product_id = record.product_id;
        project.name = record.name;
        project.data = record.data;
        Ok(())
    }

    /// Writes the full detail file under an advisory lock.
    pub fn save_project(&self, project: &Project) -> Result<()> {
        check_identity(project)?;
        let path = self.layout.project_file(project.product_id, project.id);
        {
            let _lock = WriteLock::acquire(&path)?;
            codec::write_yaml(&path, &ProjectRecord::from(project))?;
        }
        if let Some(notifier) = &self.notifier {
            notifier.notify((project.product_id, project.id));
        }
        debug!(
            product_id = project.product_id,
            project_id = project.id,
            requirements = project.data.requirements.len(),
            "saved project"
        );
        Ok(())
    }

    /// Loads every project listed under `product`.
    pub fn load_projects(&self, product: &mut Product) -> Result<()> {
        stamp_product_id(product);
        for project in &mut product.projects {
            self.load_project(project)?;
        }
        Ok(())
    }

    /// Loads every project of every product; stops at the first failure.
    pub fn load_all_projects(&self, db: &mut Database) -> Result<()> {
        for product in &mut db.products {
            self.load_projects(product)?;
        }
        Ok(())
    }

    /// Removes a project's directory and index entry, then persists the index.
    ///
    /// Later projects keep their IDs; the next `new_project` may therefore
    /// reuse a surviving ID.
    pub fn delete_project(
        &self,
        db: &mut Database,
        product_id: u32,
        project_id: u32,
    ) -> Result<()> {
        let product = product_mut(db, product_id)?;
        let pos = product
            .projects
            .iter()
            .position(|p| p.id == project_id)
            .ok_or(PmfsError::ProjectNotFound {
                product_id,
                project_id,
            })?;

        let dir = self.layout.project_dir(product_id, project_id);
        if dir.exists() {
            fs::remove_dir_all(&dir).map_err(|e| PmfsError::io("remove", &dir, e))?;
        }
        product.projects.remove(pos);
        self.save(db)?;
        info!(product_id, project_id, "deleted project");
        Ok(())
    }
}

/// Looks up a product by ID.
pub fn product(db: &Database, id: u32) -> Result<&Product> {
    db.products
        .iter()
        .find(|p| p.id == id)
        .ok_or(PmfsError::ProductNotFound(id))
}

/// Looks up a product by ID for mutation.
pub fn product_mut(db: &mut Database, id: u32) -> Result<&mut Product> {
    db.products
        .iter_mut()
        .find(|p| p.id == id)
        .ok_or(PmfsError::ProductNotFound(id))
}

/// Looks up a project by product and project ID for mutation.
pub fn project_mut(db: &mut Database, product_id: u32, project_id: u32) -> Result<&mut Project> {
    product_mut(db, product_id)?
        .projects
        .iter_mut()
        .find(|p| p.id == project_id)
        .ok_or(PmfsError::ProjectNotFound {
            product_id,
            project_id,
        })
}

fn stamp_product_id(product: &mut Product) {
    for project in &mut product.projects {
        project.product_id = product.id;
    }
}

fn check_identity(project: &Project) -> Result<()> {
    if project.id == 0 || project.product_id == 0 {
        return Err(PmfsError::MissingIdentity {
            product_id: project.product_id,
            project_id: project.id,
        });
    }
    Ok(())
}
