//! Response Parsing Module
//!
//! Pulls JSON and yes/no answers out of free-form model output.

use regex::Regex;
use serde::de::DeserializeOwned;
use std::sync::OnceLock;
use serde::Deserialize;

use crate::ai::client::AiError;
use crate::models::{DesignAspect, Requirement};

/// `{name, description}` pair as returned by list-style prompts.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Draft {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub description: String,
}

/// Extract JSON from a response that may contain markdown code blocks
pub fn extract_json(response: &str) -> &str {
    // Look for JSON in markdown code block
    if let Some(start) = response.find("```json") {
        let json_start = start + 7;
        if let Some(end) = response[json_start..].find("```") {
            return response[json_start..json_start + end].trim();
        }
    }

    // Generic code block, skipping a language identifier
    if let Some(start) = response.find("```") {
        let code_start = start + 3;
        let json_start = match response[code_start..].find('\n') {
            Some(newline) => code_start + newline + 1,
            None => code_start,
        };
        if let Some(end) = response[json_start..].find("```") {
            return response[json_start..json_start + end].trim();
        }
    }

    // Bare object or array, whichever opens first
    let object = response.find('{').map(|s| (s, '}'));
    let array = response.find('[').map(|s| (s, ']'));
    let first = match (object, array) {
        (Some(o), Some(a)) => Some(if a.0 < o.0 { a } else { o }),
        (o, a) => o.or(a),
    };
    if let Some((start, close)) = first {
        if let Some(end) = response.rfind(close) {
            if end > start {
                return &response[start..=end];
            }
        }
    }

    response.trim()
}

/// Deserializes the JSON payload of a model response.
pub fn parse_json<T: DeserializeOwned>(response: &str, what: &str) -> Result<T, AiError> {
    let json_str = extract_json(response);
    serde_json::from_str(json_str).map_err(|e| {
        let snippet: String = json_str.chars().take(200).collect();
        AiError::InvalidResponse(format!(
            "Failed to parse {} response: {}. JSON: {}",
            what, e, snippet
        ))
    })
}

/// First standalone "yes" or "no" in the answer, case-insensitive.
pub fn parse_yes_no(response: &str) -> Option<bool> {
    let caps = yes_no_regex().captures(response)?;
    Some(caps[1].eq_ignore_ascii_case("yes"))
}

fn yes_no_regex() -> &'static Regex {
    static YES_NO: OnceLock<Regex> = OnceLock::new();
    YES_NO.get_or_init(|| Regex::new(r"(?i)\b(yes|no)\b").expect("yes/no pattern compiles"))
}

/// Requirements from a JSON array of `{name, description}`.
pub fn parse_requirements(response: &str) -> Result<Vec<Requirement>, AiError> {
    let drafts: Vec<Draft> = parse_json(response, "requirements")?;
    Ok(drafts
        .into_iter()
        .map(|d| Requirement::new(d.name, d.description))
        .collect())
}

/// Design aspects from a JSON array of `{name, description}`.
pub fn parse_design_aspects(response: &str) -> Result<Vec<DesignAspect>, AiError> {
    let drafts: Vec<Draft> = parse_json(response, "design aspects")?;
    Ok(drafts
        .into_iter()
        .map(|d| DesignAspect {
            name: d.name,
            description: d.description,
            ..Default::default()
        })
        .collect())
}
