//! Prompt Templates for AI Operations
//!
//! Role-specific question catalog plus the builders for the fixed prompts
//! (similarity, extraction, suggestions, design aspects, summaries).

use std::collections::BTreeMap;
use std::path::Path;

use crate::ai::client::AiError;

/// Sent when an answer contained neither "yes" nor "no".
pub const YES_NO_REMINDER: &str = "Answer Yes or No only";

/// A role question with an optional follow-up asked when the answer is "No".
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Prompt {
    pub id: String,
    pub question: String,
    /// Standalone question, sent verbatim.
    pub follow_up: String,
}

impl Prompt {
    pub fn new(id: &str, question: &str, follow_up: &str) -> Self {
        Self {
            id: id.to_string(),
            question: question.to_string(),
            follow_up: follow_up.to_string(),
        }
    }

    /// Formats the question against `text` as a yes/no prompt.
    pub fn render(&self, text: &str) -> String {
        format!(
            "Given the requirement {:?}, {} Answer yes or no.",
            text, self.question
        )
    }
}

/// Questions per role. Role names are matched case-insensitively.
#[derive(Debug, Clone)]
pub struct PromptCatalog {
    roles: BTreeMap<String, Vec<Prompt>>,
}

impl Default for PromptCatalog {
    fn default() -> Self {
        let mut catalog = Self::empty();
        catalog.register("product_manager", product_manager());
        catalog.register("qa_lead", qa_lead());
        catalog.register("solution_architect", solution_architect());
        catalog.register("cto", cto());
        catalog
    }
}

impl PromptCatalog {
    /// Catalog with the built-in roles.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn empty() -> Self {
        Self {
            roles: BTreeMap::new(),
        }
    }

    /// Adds or replaces the questions for `role`.
    pub fn register(&mut self, role: &str, prompts: Vec<Prompt>) {
        self.roles.insert(role.to_lowercase(), prompts);
    }

    pub fn roles(&self) -> impl Iterator<Item = &str> {
        self.roles.keys().map(String::as_str)
    }

    pub fn get(&self, role: &str) -> Result<&[Prompt], AiError> {
        self.roles
            .get(&role.to_lowercase())
            .map(Vec::as_slice)
            .ok_or_else(|| AiError::UnknownRole(role.to_string()))
    }

    pub fn find(&self, role: &str, id: &str) -> Result<&Prompt, AiError> {
        self.get(role)?
            .iter()
            .find(|p| p.id == id)
            .ok_or_else(|| AiError::UnknownPrompt {
                role: role.to_string(),
                id: id.to_string(),
            })
    }
}

fn product_manager() -> Vec<Prompt> {
    vec![
        Prompt::new(
            "1",
            "What problem does this product solve for the customer?",
            "How did you validate this problem?",
        ),
        Prompt::new(
            "2",
            "What are the key features for the first release?",
            "How did you prioritize them?",
        ),
        Prompt::new(
            "3",
            "How will feedback be integrated into the roadmap?",
            "Which channels will you use to gather feedback?",
        ),
    ]
}

fn qa_lead() -> Vec<Prompt> {
    vec![
        Prompt::new(
            "1",
            "What testing strategies will you employ for this project?",
            "How will these strategies cover edge cases?",
        ),
        Prompt::new(
            "2",
            "How will automation be integrated into the QA process?",
            "Which tools will you use for automation?",
        ),
        Prompt::new(
            "3",
            "What is the plan for regression testing?",
            "How will you maintain test cases over time?",
        ),
    ]
}

fn solution_architect() -> Vec<Prompt> {
    vec![
        Prompt::new(
            "1",
            "What architecture patterns are most suitable for this solution?",
            "Why do these patterns fit the requirements?",
        ),
        Prompt::new(
            "2",
            "How will you ensure scalability in the design?",
            "Which components are critical for scaling?",
        ),
        Prompt::new(
            "3",
            "How are security concerns integrated into the architecture?",
            "What standards will be applied to ensure security compliance?",
        ),
    ]
}

fn cto() -> Vec<Prompt> {
    vec![
        Prompt::new(
            "1",
            "What is the main technical challenge you foresee with this project?",
            "How do you plan to address this challenge?",
        ),
        Prompt::new(
            "2",
            "How will this project align with the overall company strategy?",
            "What metrics will you track to ensure alignment?",
        ),
        Prompt::new(
            "3",
            "What resources are required for successful execution?",
            "Where do you anticipate the most resource risk?",
        ),
    ]
}

/// Yes/no question whether two texts state the same requirement.
pub fn build_similarity_prompt(a: &str, b: &str) -> String {
    format!(
        "Do the following two requirements describe the same thing?\n\
         Requirement A: {:?}\nRequirement B: {:?}\nAnswer yes or no.",
        a, b
    )
}

pub fn build_extraction_prompt(source: &str) -> String {
    format!(
        "Extract the requirements stated in the following text. Respond with a \
         JSON array of objects with `name` and `description`.\n\n{}",
        source
    )
}

/// Extraction from a file the model reads itself, for non-text attachments.
pub fn build_file_extraction_prompt(path: &Path) -> String {
    format!(
        "Read the document at {} and extract the requirements it states. \
         Respond with a JSON array of objects with `name` and `description`.",
        path.display()
    )
}

pub fn build_suggest_prompt(description: &str) -> String {
    format!(
        "Given the requirement {:?}, list other potential requirements \
         (JSON array with `name` and `description`).",
        description
    )
}

pub fn build_design_aspects_prompt(description: &str) -> String {
    format!(
        "Given the requirement {:?}, list design improvement topics \
         (JSON array with `name` and `description`).",
        description
    )
}

pub fn build_intelligence_aspects_prompt(summary: &str) -> String {
    format!(
        "Given the intelligence summary {:?}, list design improvement topics \
         (JSON array with `name` and `description`).",
        summary
    )
}

pub fn build_summary_prompt(content: &str) -> String {
    format!("Summarize the following content:\n{}", content)
}

/// Asks for requirement templates answering `prompt` for a design aspect.
pub fn build_templates_prompt(prompt: &Prompt, aspect_description: &str) -> String {
    format!(
        "For the design aspect {:?}, consider: {} Propose requirements that \
         address it (JSON array with `name` and `description`).",
        aspect_description, prompt.question
    )
}
