//! Oracle traits used by the store layers, and their model-backed adapter.

use std::path::Path;

use crate::ai::client::AiError;
use crate::ai::{prompts, responses};
use crate::models::Requirement;

/// Single question/answer round trip with a language model.
pub trait LanguageModel {
    fn ask(&self, prompt: &str) -> Result<String, AiError>;
}

impl<T: LanguageModel + ?Sized> LanguageModel for &T {
    fn ask(&self, prompt: &str) -> Result<String, AiError> {
        (**self).ask(prompt)
    }
}

impl<T: LanguageModel + ?Sized> LanguageModel for Box<T> {
    fn ask(&self, prompt: &str) -> Result<String, AiError> {
        (**self).ask(prompt)
    }
}

/// Judges whether two requirement texts are duplicates.
pub trait SimilarityOracle {
    fn same(&self, a: &str, b: &str) -> Result<bool, AiError>;
}

/// Turns free text, or a document on disk, into candidate requirements.
pub trait ExtractionOracle {
    fn extract(&self, source: &str) -> Result<Vec<Requirement>, AiError>;

    /// Used for attachments that are not text.
    fn extract_file(&self, path: &Path) -> Result<Vec<Requirement>, AiError>;
}

/// A closure standing in for a model.
pub struct FnModel<F>(pub F);

impl<F> LanguageModel for FnModel<F>
where
    F: Fn(&str) -> Result<String, AiError>,
{
    fn ask(&self, prompt: &str) -> Result<String, AiError> {
        (self.0)(prompt)
    }
}

/// Both oracles over any [`LanguageModel`].
pub struct ModelOracle<M> {
    model: M,
}

impl<M: LanguageModel> ModelOracle<M> {
    pub fn new(model: M) -> Self {
        Self { model }
    }

    pub fn model(&self) -> &M {
        &self.model
    }
}

impl<M: LanguageModel> SimilarityOracle for ModelOracle<M> {
    fn same(&self, a: &str, b: &str) -> Result<bool, AiError> {
        let answer = self.model.ask(&prompts::build_similarity_prompt(a, b))?;
        responses::parse_yes_no(&answer).ok_or(AiError::NoYesNo)
    }
}

impl<M: LanguageModel> ExtractionOracle for ModelOracle<M> {
    /// Extracted requirements come back proposed and AI-generated.
    fn extract(&self, source: &str) -> Result<Vec<Requirement>, AiError> {
        let answer = self.model.ask(&prompts::build_extraction_prompt(source))?;
        proposed(responses::parse_requirements(&answer)?)
    }

    fn extract_file(&self, path: &Path) -> Result<Vec<Requirement>, AiError> {
        let answer = self.model.ask(&prompts::build_file_extraction_prompt(path))?;
        proposed(responses::parse_requirements(&answer)?)
    }
}

fn proposed(mut reqs: Vec<Requirement>) -> Result<Vec<Requirement>, AiError> {
    for req in &mut reqs {
        req.condition.proposed = true;
        req.condition.ai_generated = true;
    }
    Ok(reqs)
}

#[cfg(test)]
pub(crate) mod stub {
    use super::*;
    use std::cell::RefCell;
    use std::collections::VecDeque;

    /// Replays canned answers in order and records every prompt it was sent.
    pub(crate) struct ScriptedModel {
        answers: RefCell<VecDeque<String>>,
        prompts: RefCell<Vec<String>>,
    }

    impl ScriptedModel {
        pub(crate) fn new(answers: &[&str]) -> Self {
            Self {
                answers: RefCell::new(answers.iter().map(|a| a.to_string()).collect()),
                prompts: RefCell::new(Vec::new()),
            }
        }

        pub(crate) fn prompts(&self) -> Vec<String> {
            self.prompts.borrow().clone()
        }
    }

    impl LanguageModel for ScriptedModel {
        fn ask(&self, prompt: &str) -> Result<String, AiError> {
            self.prompts.borrow_mut().push(prompt.to_string());
            self.answers
                .borrow_mut()
                .pop_front()
                .ok_or_else(|| AiError::Stub("script exhausted".into()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_similarity_parses_answer() {
        let yes = ModelOracle::new(FnModel(|_: &str| Ok("Yes, they match".to_string())));
        assert!(yes.same("a", "b").unwrap());

        let no = ModelOracle::new(FnModel(|_: &str| Ok("No.".to_string())));
        assert!(!no.same("a", "b").unwrap());

        let vague = ModelOracle::new(FnModel(|_: &str| Ok("perhaps".to_string())));
        assert!(matches!(vague.same("a", "b"), Err(AiError::NoYesNo)));
    }

    #[test]
    fn test_similarity_propagates_model_error() {
        let failing = ModelOracle::new(FnModel(|_: &str| Err(AiError::Stub("down".into()))));
        assert!(matches!(failing.same("a", "b"), Err(AiError::Stub(_))));
    }

    #[test]
    fn test_extract_marks_proposed() {
        let oracle = ModelOracle::new(FnModel(|prompt: &str| {
            assert!(prompt.contains("meeting notes"));
            Ok(r#"[{"name": "Export", "description": "Export to CSV"}]"#.to_string())
        }));
        let reqs = oracle.extract("meeting notes").unwrap();
        assert_eq!(reqs.len(), 1);
        assert!(reqs[0].condition.proposed);
        assert!(reqs[0].condition.ai_generated);
        assert!(!reqs[0].condition.active);
    }

    #[test]
    fn test_extract_file_names_the_path() {
        let oracle = ModelOracle::new(FnModel(|prompt: &str| {
            assert!(prompt.contains("deck.pdf"));
            Ok(r#"[{"name": "Offline", "description": "works offline"}]"#.to_string())
        }));
        let reqs = oracle.extract_file(Path::new("/tmp/deck.pdf")).unwrap();
        assert_eq!(reqs[0].name, "Offline");
        assert!(reqs[0].condition.proposed);
    }

    #[test]
    fn test_model_by_reference() {
        let model = FnModel(|p: &str| Ok(p.to_uppercase()));
        let by_ref: &dyn LanguageModel = &model;
        assert_eq!(by_ref.ask("hi").unwrap(), "HI");
    }
}
