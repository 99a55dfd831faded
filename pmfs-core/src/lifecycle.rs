//! Requirement lifecycle transitions on a loaded project.
//!
//! Every transition touches only the flags it owns and persists through the
//! [`Store`]. Transitions on an ID the project does not hold are silent no-ops
//! and write nothing.

use chrono::Utc;
use tracing::{debug, info, warn};

use crate::ai::{gates, interact, LanguageModel, PromptCatalog};
use crate::error::{PmfsError, Result};
use crate::models::{GateResult, Project, Requirement};
use crate::store::Store;

/// A model plus the role questions it is asked.
#[derive(Clone, Copy)]
pub struct Analyst<'a> {
    pub model: &'a dyn LanguageModel,
    pub prompts: &'a PromptCatalog,
}

impl<'a> Analyst<'a> {
    pub fn new(model: &'a dyn LanguageModel, prompts: &'a PromptCatalog) -> Self {
        Self { model, prompts }
    }

    /// Role question then gates; nothing on `req` changes unless all succeed.
    fn analyze(
        &self,
        req: &mut Requirement,
        role: &str,
        question_id: &str,
        gate_ids: &[String],
    ) -> Result<()> {
        let answer =
            interact::ask_role(self.model, self.prompts, role, question_id, &req.description)?;
        let prompt = self.prompts.find(role, question_id)?;
        let gate_results = gates::evaluate(self.model, gate_ids, &req.description)?;

        req.gate_results.push(GateResult {
            gate_id: format!("{role}/{question_id}"),
            question: prompt.question.clone(),
            passed: answer.passed,
            follow_up: answer.follow_up,
        });
        for result in gate_results {
            req.condition
                .gate_results
                .insert(result.gate_id.clone(), result.passed);
            req.gate_results.push(result);
        }
        req.condition.ai_analyzed = true;
        req.updated_at = Some(Utc::now());
        Ok(())
    }
}

impl Store {
    /// Appends `req` and persists. A zero ID becomes `count + 1`.
    pub fn add_requirement(&self, project: &mut Project, mut req: Requirement) -> Result<u32> {
        if req.id == 0 {
            req.id = project.next_requirement_id();
        }
        let now = Utc::now();
        req.created_at.get_or_insert(now);
        req.updated_at = Some(now);

        let id = req.id;
        project.data.requirements.push(req);
        self.save_project(project)?;
        info!(project_id = project.id, requirement_id = id, "added requirement");
        Ok(id)
    }

    /// `proposed = false, active = true`.
    pub fn activate(&self, project: &mut Project, id: u32) -> Result<()> {
        let Some(req) = project.requirement_mut(id) else {
            debug!(requirement_id = id, "activate: no such requirement");
            return Ok(());
        };
        set_active(req);
        self.save_project(project)
    }

    /// Activates every requirement matching `predicate`; one write when any matched.
    pub fn activate_where<F>(&self, project: &mut Project, predicate: F) -> Result<usize>
    where
        F: Fn(&Requirement) -> bool,
    {
        let mut count = 0;
        for req in project.data.requirements.iter_mut().filter(|r| predicate(r)) {
            set_active(req);
            count += 1;
        }
        if count > 0 {
            self.save_project(project)?;
        }
        Ok(count)
    }

    /// Soft delete: sets `deleted` only.
    pub fn delete_requirement(&self, project: &mut Project, id: u32) -> Result<()> {
        self.set_deleted(project, id, true)
    }

    /// Clears `deleted` only.
    pub fn restore_requirement(&self, project: &mut Project, id: u32) -> Result<()> {
        self.set_deleted(project, id, false)
    }

    fn set_deleted(&self, project: &mut Project, id: u32, deleted: bool) -> Result<()> {
        let Some(req) = project.requirement_mut(id) else {
            debug!(requirement_id = id, deleted, "no such requirement");
            return Ok(());
        };
        req.condition.deleted = deleted;
        req.updated_at = Some(Utc::now());
        self.save_project(project)
    }

    /// Runs the role question and `gate_ids` against every requirement that is
    /// not proposed, deleted or already analyzed.
    ///
    /// A failing requirement is logged and left unanalyzed; the pass goes on.
    /// The project is written once at the end whatever happened, then the
    /// first failure (if any) is returned. Returns the number analyzed.
    pub fn analyze_all(
        &self,
        project: &mut Project,
        analyst: &Analyst<'_>,
        role: &str,
        question_id: &str,
        gate_ids: &[String],
    ) -> Result<usize> {
        let mut first_err: Option<PmfsError> = None;
        let mut analyzed = 0;

        for req in &mut project.data.requirements {
            let c = &req.condition;
            if c.proposed || c.deleted || c.ai_analyzed {
                continue;
            }
            match analyst.analyze(req, role, question_id, gate_ids) {
                Ok(()) => analyzed += 1,
                Err(e) => {
                    warn!(requirement_id = req.id, error = %e, "analysis failed");
                    first_err.get_or_insert(e);
                }
            }
        }

        self.save_project(project)?;
        info!(project_id = project.id, analyzed, "analysis pass finished");
        match first_err {
            Some(e) => Err(e),
            None => Ok(analyzed),
        }
    }
}

fn set_active(req: &mut Requirement) {
    req.condition.proposed = false;
    req.condition.active = true;
    req.updated_at = Some(Utc::now());
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ai::prompts::Prompt;
    use crate::ai::{AiError, FnModel};
    use crate::models::ProjectData;
    use crate::notify::{ChangeNotifier, ProjectChanged};
    use std::cell::RefCell;
    use std::sync::mpsc::Receiver;
    use std::sync::Arc;
    use tempfile::TempDir;

    fn setup(reqs: Vec<Requirement>) -> (TempDir, Store, Project) {
        let dir = TempDir::new().unwrap();
        let store = Store::new(dir.path());
        let mut db = store.load_database().unwrap();
        store.new_product(&mut db, "prod").unwrap();
        let product = crate::store::product_mut(&mut db, 1).unwrap();
        let mut data = ProjectData::default();
        for (i, mut r) in reqs.into_iter().enumerate() {
            r.id = i as u32 + 1;
            data.requirements.push(r);
        }
        store.new_project(product, "prj", data).unwrap();
        let project = product.projects[0].clone();
        (dir, store, project)
    }

    fn reload(store: &Store, project: &Project) -> Project {
        let mut fresh = Project::handle(project.product_id, project.id);
        store.load_project(&mut fresh).unwrap();
        fresh
    }

    fn catalog() -> PromptCatalog {
        let mut catalog = PromptCatalog::empty();
        catalog.register("test", vec![Prompt::new("q1", "Is it clear?", "What is unclear?")]);
        catalog
    }

    #[test]
    fn test_add_requirement_assigns_next_id_and_persists() {
        let (_dir, store, mut project) = setup(vec![Requirement::new("A", "a")]);
        let id = store
            .add_requirement(&mut project, Requirement::new("B", "b"))
            .unwrap();
        assert_eq!(id, 2);
        let fresh = reload(&store, &project);
        assert_eq!(fresh.requirement(2).unwrap().name, "B");
        assert!(fresh.requirement(2).unwrap().created_at.is_some());
    }

    #[test]
    fn test_activate_clears_proposed() {
        let (_dir, store, mut project) = setup(vec![Requirement::proposed("A", "a")]);
        store.activate(&mut project, 1).unwrap();
        let c = &reload(&store, &project).data.requirements[0].condition;
        assert!(c.active);
        assert!(!c.proposed);
        assert!(c.ai_generated);
    }

    #[test]
    fn test_activate_missing_id_writes_nothing() {
        let (_dir, store, mut project) = setup(vec![Requirement::new("A", "a")]);
        let before = project.clone();
        project.data.scope = "unsaved".into();
        store.activate(&mut project, 99).unwrap();
        // The in-memory edit was not flushed.
        assert_eq!(reload(&store, &project), before);
    }

    #[test]
    fn test_activate_where_matches_predicate() {
        let (_dir, store, mut project) = setup(vec![
            Requirement::proposed("A", "a"),
            Requirement::new("B", "b"),
            Requirement::proposed("C", "c"),
        ]);
        let n = store
            .activate_where(&mut project, |r| r.condition.proposed)
            .unwrap();
        assert_eq!(n, 2);
        let fresh = reload(&store, &project);
        assert!(fresh.data.requirements.iter().all(|r| !r.condition.proposed));
        assert!(!fresh.requirement(2).unwrap().condition.active);
    }

    #[test]
    fn test_delete_restore_touch_only_deleted() {
        let mut req = Requirement::proposed("A", "a");
        req.condition.active = true;
        let (_dir, store, mut project) = setup(vec![req]);
        let original = project.data.requirements[0].condition.clone();

        store.delete_requirement(&mut project, 1).unwrap();
        let deleted = reload(&store, &project).data.requirements[0].condition.clone();
        assert!(deleted.deleted);
        assert_eq!(
            (deleted.proposed, deleted.active, deleted.ai_generated),
            (original.proposed, original.active, original.ai_generated)
        );

        store.restore_requirement(&mut project, 1).unwrap();
        assert_eq!(reload(&store, &project).data.requirements[0].condition, original);

        store.delete_requirement(&mut project, 42).unwrap();
    }

    #[test]
    fn test_analyze_all_skip_rule() {
        let mut analyzed = Requirement::new("C", "already analyzed");
        analyzed.condition.ai_analyzed = true;
        let mut deleted = Requirement::new("D", "deleted");
        deleted.condition.deleted = true;
        let (_dir, store, mut project) = setup(vec![
            Requirement::new("A", "eligible"),
            Requirement::proposed("B", "proposed"),
            analyzed,
            deleted,
        ]);

        let seen = RefCell::new(Vec::new());
        let model = FnModel(|p: &str| {
            seen.borrow_mut().push(p.to_string());
            Ok("Yes".to_string())
        });
        let prompts = catalog();
        let analyst = Analyst::new(&model, &prompts);
        let gate_ids = vec!["testability-1".to_string()];

        let n = store
            .analyze_all(&mut project, &analyst, "test", "q1", &gate_ids)
            .unwrap();
        assert_eq!(n, 1);
        assert!(seen.borrow().iter().all(|p| p.contains("eligible")));
        assert_eq!(seen.borrow().len(), 2);

        let fresh = reload(&store, &project);
        let a = fresh.requirement(1).unwrap();
        assert!(a.condition.ai_analyzed);
        assert_eq!(a.condition.gate_results.get("testability-1"), Some(&true));
        assert_eq!(a.gate_results.len(), 2);
        assert!(!fresh.requirement(2).unwrap().condition.ai_analyzed);
        assert!(!fresh.requirement(4).unwrap().condition.ai_analyzed);
    }

    /// Attaches a notifier so every `save_project` shows up as one event.
    fn watch(store: Store, project: &Project) -> (Store, Receiver<ProjectChanged>) {
        let notifier = Arc::new(ChangeNotifier::new(16));
        let (_sub, rx) = notifier.subscribe((project.product_id, project.id));
        (store.with_notifier(notifier), rx)
    }

    #[test]
    fn test_analyze_all_returns_first_error_and_persists_once() {
        let (_dir, store, mut project) = setup(vec![
            Requirement::new("A", "first BROKEN"),
            Requirement::new("B", "second fine"),
            Requirement::new("C", "third BROKEN too"),
        ]);
        let (store, saves) = watch(store, &project);
        let model = FnModel(|p: &str| {
            if p.contains("first BROKEN") {
                Err(AiError::Stub("first failure".into()))
            } else if p.contains("third BROKEN") {
                Err(AiError::Stub("third failure".into()))
            } else {
                Ok("yes".to_string())
            }
        });
        let prompts = catalog();
        let analyst = Analyst::new(&model, &prompts);

        let err = store
            .analyze_all(&mut project, &analyst, "test", "q1", &[])
            .unwrap_err();
        match err {
            PmfsError::Ai(AiError::Stub(msg)) => assert_eq!(msg, "first failure"),
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(saves.try_iter().count(), 1);

        let fresh = reload(&store, &project);
        let flags: Vec<bool> = fresh
            .data
            .requirements
            .iter()
            .map(|r| r.condition.ai_analyzed)
            .collect();
        assert_eq!(flags, vec![false, true, false]);
    }

    #[test]
    fn test_activate_where_persists_once_and_skips_empty_match() {
        let (_dir, store, mut project) = setup(vec![
            Requirement::proposed("A", "a"),
            Requirement::proposed("B", "b"),
        ]);
        let (store, saves) = watch(store, &project);

        let n = store
            .activate_where(&mut project, |r| r.condition.proposed)
            .unwrap();
        assert_eq!(n, 2);
        assert_eq!(saves.try_iter().count(), 1);

        let n = store
            .activate_where(&mut project, |r| r.condition.proposed)
            .unwrap();
        assert_eq!(n, 0);
        assert_eq!(saves.try_iter().count(), 0);
    }

    #[test]
    fn test_analyze_all_unknown_gate_leaves_requirement_unanalyzed() {
        let (_dir, store, mut project) = setup(vec![Requirement::new("A", "a")]);
        let model = FnModel(|_: &str| Ok("yes".to_string()));
        let prompts = catalog();
        let analyst = Analyst::new(&model, &prompts);
        let err = store
            .analyze_all(&mut project, &analyst, "test", "q1", &["bogus-1".to_string()])
            .unwrap_err();
        assert!(matches!(err, PmfsError::Ai(AiError::UnknownGate(_))));
        let req = &reload(&store, &project).data.requirements[0];
        assert!(!req.condition.ai_analyzed);
        assert!(req.gate_results.is_empty());
    }
}
