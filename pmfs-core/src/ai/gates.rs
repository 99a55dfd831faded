//! Quality gates: fixed yes/no checks run against a requirement's text.

use crate::ai::client::AiError;
use crate::ai::interact::run_question;
use crate::ai::oracle::LanguageModel;
use crate::ai::prompts::Prompt;
use crate::models::GateResult;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Gate {
    pub id: &'static str,
    pub question: &'static str,
    pub follow_up: &'static str,
}

impl Gate {
    fn prompt(&self) -> Prompt {
        Prompt::new(self.id, self.question, self.follow_up)
    }
}

const GATES: &[Gate] = &[
    Gate {
        id: "clarity-form-1",
        question: "Is the requirement written as a complete, grammatically correct sentence?",
        follow_up: "Rewrite the requirement so it stands alone as a single, complete sentence.",
    },
    Gate {
        id: "clarity-form-2",
        question: "Does the requirement avoid subjective or ambiguous terms (e.g., 'fast', 'user-friendly')?",
        follow_up: "Replace ambiguous terms with specific, measurable language.",
    },
    Gate {
        id: "completeness-1",
        question: "Does the requirement include all necessary conditions and context?",
        follow_up: "Add any missing conditions or context needed to understand the requirement.",
    },
    Gate {
        id: "completeness-2",
        question: "Are all actors and data elements referenced in the requirement defined elsewhere?",
        follow_up: "Define each actor or data element referenced in the requirement.",
    },
    Gate {
        id: "compound-1",
        question: "Does the requirement describe a single action or condition?",
        follow_up: "Break the requirement into separate atomic statements.",
    },
    Gate {
        id: "compound-2",
        question: "Is the requirement free from conjunctions like 'and' or 'or' that imply multiple requirements?",
        follow_up: "Rewrite to eliminate conjunctions or split into multiple requirements.",
    },
    Gate {
        id: "consistency-1",
        question: "Does the requirement avoid contradicting other requirements?",
        follow_up: "Resolve any conflicts so this requirement aligns with related requirements.",
    },
    Gate {
        id: "consistency-2",
        question: "Is terminology used consistently with other requirements and project documents?",
        follow_up: "Standardize terminology to match other requirements and project documents.",
    },
    Gate {
        id: "duplicate-1",
        question: "Does the requirement avoid duplicating existing requirements?",
        follow_up: "Consolidate duplicate requirements or remove redundant statements.",
    },
    Gate {
        id: "duplicate-2",
        question: "Is this requirement uniquely distinguishable from others?",
        follow_up: "Merge overlapping requirements into a single, distinct statement.",
    },
    Gate {
        id: "glossary-gaps-1",
        question: "Are all terms in the requirement defined in the project glossary?",
        follow_up: "Define any undefined terms in the project glossary.",
    },
    Gate {
        id: "glossary-gaps-2",
        question: "Does the requirement avoid undefined acronyms or abbreviations?",
        follow_up: "Expand or define acronyms and abbreviations used in the requirement.",
    },
    Gate {
        id: "over-specification-1",
        question: "Does the requirement avoid prescribing implementation details?",
        follow_up: "Remove implementation details to focus on behavior or outcomes.",
    },
    Gate {
        id: "over-specification-2",
        question: "Is the requirement stated in terms of what is needed rather than how to achieve it?",
        follow_up: "Rewrite the requirement to express the need without design decisions.",
    },
    Gate {
        id: "testability-1",
        question: "Can the requirement be verified through inspection, demonstration, or test?",
        follow_up: "Rewrite the requirement so that it can be objectively verified.",
    },
    Gate {
        id: "testability-2",
        question: "Does the requirement specify measurable criteria for success?",
        follow_up: "Add quantifiable success criteria to the requirement.",
    },
];

pub fn all() -> &'static [Gate] {
    GATES
}

pub fn get_gate(id: &str) -> Result<&'static Gate, AiError> {
    GATES
        .iter()
        .find(|g| g.id == id)
        .ok_or_else(|| AiError::UnknownGate(id.to_string()))
}

/// Runs `gate_ids` in order against `text`. Unknown IDs and model errors
/// abort the whole evaluation.
pub fn evaluate<M: LanguageModel + ?Sized>(
    model: &M,
    gate_ids: &[String],
    text: &str,
) -> Result<Vec<GateResult>, AiError> {
    let mut results = Vec::with_capacity(gate_ids.len());
    for id in gate_ids {
        let gate = get_gate(id)?;
        let answer = run_question(model, &gate.prompt(), text)?;
        results.push(GateResult {
            gate_id: gate.id.to_string(),
            question: gate.question.to_string(),
            passed: answer.passed,
            follow_up: answer.follow_up,
        });
    }
    Ok(results)
}
