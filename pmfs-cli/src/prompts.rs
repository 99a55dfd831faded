use anyhow::Result;
use inquire::{Confirm, Text};

use pmfs_core::Requirement;

/// Prompts the user for a new requirement
pub fn prompt_new_requirement(project: &pmfs_core::Project) -> Result<Requirement> {
    let name = Text::new("Name:").prompt()?;

    // Editor for multiline input
    let description = inquire::Editor::new("Description:").prompt()?;

    let mut req = Requirement::new(name.trim(), description.trim());

    req.owner = Text::new("Owner:").with_default("").prompt()?;

    let mut categories: Vec<String> = project
        .data
        .requirements
        .iter()
        .map(|r| r.category.clone())
        .filter(|c| !c.is_empty())
        .collect();
    categories.sort();
    categories.dedup();
    let help = format!("existing: {}", categories.join(", "));
    let mut category = Text::new("Category:");
    if !categories.is_empty() {
        category = category.with_help_message(&help);
    }
    req.category = category.prompt()?;

    if Confirm::new("Add tags?").with_default(false).prompt()? {
        let tags_input = Text::new("Tags (comma separated):").prompt()?;
        req.tags = split_tags(&tags_input);
    }

    req.condition.proposed = Confirm::new("Add as a proposal?")
        .with_default(false)
        .prompt()?;
    req.condition.active = !req.condition.proposed;

    Ok(req)
}

/// Asks before a destructive step; `yes` skips the prompt.
pub fn confirm(question: &str, yes: bool) -> Result<bool> {
    if yes {
        return Ok(true);
    }
    Ok(Confirm::new(question).with_default(false).prompt()?)
}

pub fn split_tags(input: &str) -> Vec<String> {
    input
        .split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_tags_trims_and_skips_empty() {
        assert_eq!(split_tags(" auth, ,ui ,"), vec!["auth", "ui"]);
    }

    #[test]
    fn test_confirm_yes_skips_prompt() {
        assert!(confirm("Delete?", true).unwrap());
    }
}
