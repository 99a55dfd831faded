//! Model-driven suggestions: related requirements, design aspects and the
//! requirement templates derived from them.

use tracing::{debug, info};

use crate::ai::{gates, prompts, responses, AiError, LanguageModel, PromptCatalog};
use crate::dedup::Deduplicator;
use crate::error::Result;
use crate::models::{DesignAspect, GateResult, Project, Requirement};
use crate::store::Store;

/// Asks for design topics raised by `req` and appends them to it.
pub fn generate_design_aspects<M: LanguageModel + ?Sized>(
    req: &mut Requirement,
    model: &M,
) -> std::result::Result<Vec<DesignAspect>, AiError> {
    let answer = model.ask(&prompts::build_design_aspects_prompt(&req.description))?;
    let aspects = responses::parse_design_aspects(&answer)?;
    req.design_aspects.extend(aspects.iter().cloned());
    Ok(aspects)
}

impl DesignAspect {
    /// Asks `role`/`question_id` for requirement templates covering this
    /// aspect and appends them to `templates`.
    pub fn generate_templates<M: LanguageModel + ?Sized>(
        &mut self,
        model: &M,
        catalog: &PromptCatalog,
        role: &str,
        question_id: &str,
    ) -> std::result::Result<Vec<Requirement>, AiError> {
        let prompt = catalog.find(role, question_id)?;
        let answer = model.ask(&prompts::build_templates_prompt(prompt, &self.description))?;
        let templates = responses::parse_requirements(&answer)?;
        self.templates.extend(templates.iter().cloned());
        Ok(templates)
    }

    /// Runs quality gates against the aspect's description.
    pub fn evaluate_design_gates<M: LanguageModel + ?Sized>(
        &self,
        model: &M,
        gate_ids: &[String],
    ) -> std::result::Result<Vec<GateResult>, AiError> {
        gates::evaluate(model, gate_ids, &self.description)
    }
}

impl Store {
    /// Asks for requirements related to requirement `id` and folds the new
    /// ones into the project as proposed, AI-generated children.
    ///
    /// Returns the suggestions that were actually added. An absent ID yields
    /// an empty list and no write; a `dedup` oracle error leaves the project
    /// unchanged.
    pub fn suggest_others<M: LanguageModel + ?Sized>(
        &self,
        project: &mut Project,
        id: u32,
        model: &M,
        dedup: &Deduplicator<'_>,
    ) -> Result<Vec<Requirement>> {
        let Some(source) = project.requirement(id) else {
            debug!(requirement_id = id, "suggest: no such requirement");
            return Ok(Vec::new());
        };
        let answer = model.ask(&prompts::build_suggest_prompt(&source.description))?;
        let suggestions: Vec<Requirement> = responses::parse_requirements(&answer)?
            .into_iter()
            .map(|mut r| {
                r.condition.proposed = true;
                r.condition.ai_generated = true;
                r.parent_id = id;
                r
            })
            .collect();

        let appended = dedup.absorb(&mut project.data.requirements, suggestions)?;
        let added: Vec<Requirement> = appended
            .iter()
            .map(|&i| project.data.requirements[i].clone())
            .collect();
        self.save_project(project)?;
        info!(requirement_id = id, added = added.len(), "stored suggestions");
        Ok(added)
    }

    /// Generates design aspects for every live requirement; persists once.
    /// Any model failure aborts with the project untouched.
    pub fn generate_design_aspects_all<M: LanguageModel + ?Sized>(
        &self,
        project: &mut Project,
        model: &M,
    ) -> Result<usize> {
        let mut requirements = project.data.requirements.clone();
        let mut total = 0;
        for req in requirements.iter_mut().filter(|r| !r.condition.deleted) {
            total += generate_design_aspects(req, model)?.len();
        }
        project.data.requirements = requirements;
        self.save_project(project)?;
        info!(project_id = project.id, aspects = total, "generated design aspects");
        Ok(total)
    }

    /// Turns every unprocessed design aspect (on requirements and on
    /// intelligence) into proposed requirements.
    ///
    /// Templates are folded in through `dedup`, the aspects are marked
    /// processed, and the project is written once. Returns the number of
    /// requirements added.
    pub fn generate_requirements_from_aspects<M: LanguageModel + ?Sized>(
        &self,
        project: &mut Project,
        model: &M,
        catalog: &PromptCatalog,
        role: &str,
        question_id: &str,
        dedup: &Deduplicator<'_>,
    ) -> Result<usize> {
        let mut data = project.data.clone();
        let mut candidates = Vec::new();

        for req in data.requirements.iter_mut().filter(|r| !r.condition.deleted) {
            let parent = req.id;
            for aspect in req.design_aspects.iter_mut().filter(|a| !a.processed) {
                let templates = aspect.generate_templates(model, catalog, role, question_id)?;
                candidates.extend(templates.into_iter().map(|t| proposed_child(t, parent)));
                aspect.processed = true;
            }
        }
        for intel in &mut data.intelligence {
            for aspect in intel.design_aspects.iter_mut().filter(|a| !a.processed) {
                let templates = aspect.generate_templates(model, catalog, role, question_id)?;
                candidates.extend(templates.into_iter().map(|t| proposed_child(t, 0)));
                aspect.processed = true;
            }
        }

        let added = dedup.absorb(&mut data.requirements, candidates)?.len();
        project.data = data;
        self.save_project(project)?;
        info!(project_id = project.id, added, "requirements from design aspects");
        Ok(added)
    }
}

fn proposed_child(mut req: Requirement, parent_id: u32) -> Requirement {
    req.id = 0;
    req.parent_id = parent_id;
    req.condition.proposed = true;
    req.condition.ai_generated = true;
    req.condition.active = false;
    req
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ai::oracle::stub::ScriptedModel;
    use crate::ai::prompts::Prompt;
    use crate::ai::{FnModel, ModelOracle};
    use crate::models::{Intelligence, ProjectData};
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

    #[test]
    fn test_suggest_others_adds_new_proposals_only() {
        let (_dir, store, mut project) = setup(vec![
            Requirement::new("Login", "users log in"),
            Requirement::new("Logout", "users log out"),
        ]);
        let model = ScriptedModel::new(&[r#"```json
[{"name": "Reset", "description": "users reset passwords"},
 {"name": "Again", "description": "Users log out"}]
```"#]);

        let added = store
            .suggest_others(&mut project, 1, &model, &Deduplicator::heuristic())
            .unwrap();
        assert_eq!(added.len(), 1);
        assert_eq!(added[0].id, 3);
        assert_eq!(added[0].parent_id, 1);
        assert!(model.prompts()[0].contains("users log in"));

        let fresh = reload(&store, &project);
        let reset = fresh.requirement(3).unwrap();
        assert!(reset.condition.proposed && reset.condition.ai_generated);
    }

    #[test]
    fn test_suggest_others_missing_id_is_noop() {
        let (_dir, store, mut project) = setup(vec![]);
        let model = ScriptedModel::new(&[]);
        let added = store
            .suggest_others(&mut project, 5, &model, &Deduplicator::heuristic())
            .unwrap();
        assert!(added.is_empty());
        assert!(model.prompts().is_empty());
    }

    #[test]
    fn test_suggest_others_invalid_json_propagates() {
        let (_dir, store, mut project) = setup(vec![Requirement::new("A", "a")]);
        let model = ScriptedModel::new(&["I have no ideas"]);
        assert!(store
            .suggest_others(&mut project, 1, &model, &Deduplicator::heuristic())
            .is_err());
        assert_eq!(project.data.requirements.len(), 1);
    }

    #[test]
    fn test_suggest_others_consults_similarity_oracle() {
        let (_dir, store, mut project) = setup(vec![Requirement::new("Login", "users log in")]);
        let model = ScriptedModel::new(&[
            r#"[{"name": "Sign in", "description": "people authenticate"}]"#,
        ]);
        let sim = ModelOracle::new(FnModel(|p: &str| {
            assert!(p.contains("people authenticate"));
            Ok("Yes".to_string())
        }));

        let added = store
            .suggest_others(&mut project, 1, &model, &Deduplicator::with_oracle(&sim))
            .unwrap();
        assert!(added.is_empty());
        assert_eq!(reload(&store, &project).data.requirements.len(), 1);
    }

    #[test]
    fn test_suggest_others_oracle_error_leaves_project() {
        let (_dir, store, mut project) = setup(vec![Requirement::new("Login", "users log in")]);
        let model = ScriptedModel::new(&[r#"[{"name": "Reset", "description": "reset"}]"#]);
        let sim = ModelOracle::new(FnModel(|_: &str| Err(AiError::Stub("offline".into()))));

        let err = store
            .suggest_others(&mut project, 1, &model, &Deduplicator::with_oracle(&sim))
            .unwrap_err();
        assert!(matches!(err, crate::error::PmfsError::Ai(AiError::Stub(_))));
        assert_eq!(project.data.requirements.len(), 1);
    }

    #[test]
    fn test_generate_design_aspects_appends() {
        let mut req = Requirement::new("Search", "search across all documents");
        let model =
            ScriptedModel::new(&[r#"[{"name": "Indexing", "description": "full text index"}]"#]);
        let aspects = generate_design_aspects(&mut req, &model).unwrap();
        assert_eq!(aspects.len(), 1);
        assert_eq!(req.design_aspects[0].name, "Indexing");
    }

    #[test]
    fn test_generate_design_aspects_all_skips_deleted() {
        let mut gone = Requirement::new("Gone", "removed");
        gone.condition.deleted = true;
        let (_dir, store, mut project) = setup(vec![Requirement::new("A", "a"), gone]);
        let model = ScriptedModel::new(&[r#"[{"name": "X", "description": "x"}]"#]);
        assert_eq!(store.generate_design_aspects_all(&mut project, &model).unwrap(), 1);
        assert_eq!(model.prompts().len(), 1);
        let fresh = reload(&store, &project);
        assert_eq!(fresh.requirement(1).unwrap().design_aspects.len(), 1);
        assert!(fresh.requirement(2).unwrap().design_aspects.is_empty());
    }

    #[test]
    fn test_templates_and_design_gates() {
        let mut catalog = PromptCatalog::empty();
        catalog.register("test", vec![Prompt::new("t1", "What must be true?", "")]);
        let mut aspect = DesignAspect {
            name: "Caching".into(),
            description: "cache query results".into(),
            ..Default::default()
        };
        let model = ScriptedModel::new(&[
            r#"[{"name": "TTL", "description": "entries expire after 60s"}]"#,
            "yes",
        ]);
        let templates = aspect
            .generate_templates(&model, &catalog, "test", "t1")
            .unwrap();
        assert_eq!(templates[0].name, "TTL");
        assert_eq!(aspect.templates.len(), 1);

        let results = aspect
            .evaluate_design_gates(&model, &["testability-1".to_string()])
            .unwrap();
        assert!(results[0].passed);
    }

    #[test]
    fn test_requirements_from_aspects_marks_processed() {
        let mut req = Requirement::new("Search", "search documents");
        req.design_aspects.push(DesignAspect {
            name: "Indexing".into(),
            description: "index".into(),
            ..Default::default()
        });
        req.design_aspects.push(DesignAspect {
            name: "Done".into(),
            description: "already handled".into(),
            processed: true,
            ..Default::default()
        });
        let (_dir, store, mut project) = setup(vec![req]);
        project.data.intelligence.push(Intelligence {
            id: 1,
            design_aspects: vec![DesignAspect {
                name: "Audit".into(),
                description: "audit trail".into(),
                ..Default::default()
            }],
            ..Default::default()
        });

        let mut catalog = PromptCatalog::empty();
        catalog.register("test", vec![Prompt::new("t1", "What is needed?", "")]);
        let model = FnModel(|p: &str| {
            if p.contains("\"index\"") {
                Ok(r#"[{"name": "Incremental", "description": "index updates incrementally"}]"#.to_string())
            } else {
                Ok(r#"[{"name": "Log", "description": "every change is logged"}, {"name": "Search", "description": "Search documents"}]"#.to_string())
            }
        });

        let added = store
            .generate_requirements_from_aspects(
                &mut project,
                &model,
                &catalog,
                "test",
                "t1",
                &Deduplicator::heuristic(),
            )
            .unwrap();
        // The "Search" template duplicates the existing requirement.
        assert_eq!(added, 2);

        let fresh = reload(&store, &project);
        assert_eq!(fresh.data.requirements.len(), 3);
        assert!(fresh.data.requirements[0].design_aspects.iter().all(|a| a.processed));
        assert!(fresh.data.intelligence[0].design_aspects[0].processed);
        let incremental = fresh.requirement(2).unwrap();
        assert_eq!(incremental.parent_id, 1);
        assert!(incremental.condition.proposed);
        assert_eq!(fresh.requirement(3).unwrap().parent_id, 0);
    }
}
