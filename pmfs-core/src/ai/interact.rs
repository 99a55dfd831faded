//! Yes/no question loop with follow-up on "No".

use tracing::debug;

use crate::ai::client::AiError;
use crate::ai::oracle::LanguageModel;
use crate::ai::prompts::{Prompt, PromptCatalog, YES_NO_REMINDER};
use crate::ai::responses::parse_yes_no;

/// Extra attempts after an answer without a yes/no.
const MAX_REASKS: usize = 2;

/// Outcome of one question.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Answer {
    pub passed: bool,
    /// Model reply to the follow-up; empty on "Yes" or when there is none.
    pub follow_up: String,
}

/// Asks `prompt` about `text`.
///
/// "Yes" passes. "No" fails and, when the prompt has a follow-up, sends it and
/// returns the reply. Answers with neither are re-asked with a reminder up to
/// twice before giving up with [`AiError::NoYesNo`].
pub fn run_question<M: LanguageModel + ?Sized>(
    model: &M,
    prompt: &Prompt,
    text: &str,
) -> Result<Answer, AiError> {
    let mut response = model.ask(&prompt.render(text))?;
    let mut verdict = parse_yes_no(&response);
    let mut attempts = 0;
    while verdict.is_none() && attempts < MAX_REASKS {
        debug!(prompt_id = %prompt.id, "no yes/no in answer, re-asking");
        response = model.ask(YES_NO_REMINDER)?;
        verdict = parse_yes_no(&response);
        attempts += 1;
    }

    match verdict {
        Some(true) => Ok(Answer {
            passed: true,
            follow_up: String::new(),
        }),
        Some(false) if prompt.follow_up.is_empty() => Ok(Answer {
            passed: false,
            follow_up: String::new(),
        }),
        Some(false) => Ok(Answer {
            passed: false,
            follow_up: model.ask(&prompt.follow_up)?,
        }),
        None => Err(AiError::NoYesNo),
    }
}

/// Looks up `role`/`question_id` in `catalog` and runs it.
pub fn ask_role<M: LanguageModel + ?Sized>(
    model: &M,
    catalog: &PromptCatalog,
    role: &str,
    question_id: &str,
    text: &str,
) -> Result<Answer, AiError> {
    let prompt = catalog.find(role, question_id)?;
    run_question(model, prompt, text)
}
