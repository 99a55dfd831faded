//! AI Client Module
//!
//! Shells out to a configured command-line model. The prompt is passed as the
//! last argument and the answer is read from stdout.

use std::path::PathBuf;
use std::process::Command;
use thiserror::Error;
use tracing::debug;

use crate::ai::oracle::LanguageModel;
use crate::config::AiConfig;

/// Errors that can occur during AI operations
#[derive(Error, Debug)]
pub enum AiError {
    #[error("AI integration not available")]
    NotAvailable,

    #[error("model command failed: {0}")]
    ExecFailed(String),

    #[error("Invalid response from AI: {0}")]
    InvalidResponse(String),

    #[error("unknown role: {0}")]
    UnknownRole(String),

    #[error("prompt {role}/{id} not found")]
    UnknownPrompt { role: String, id: String },

    #[error("gate {0:?} not found")]
    UnknownGate(String),

    #[error("unable to determine yes/no answer")]
    NoYesNo,

    /// Raised by in-process stand-ins for a model.
    #[error("stub model: {0}")]
    Stub(String),
}

/// AI operation mode
#[derive(Debug, Clone, Default)]
pub enum AiMode {
    /// Run `program args... <prompt>` and read the answer from stdout.
    Command { program: PathBuf, args: Vec<String> },
    /// AI features disabled
    #[default]
    Disabled,
}

/// Language model backed by an external command.
#[derive(Debug, Clone, Default)]
pub struct AiClient {
    mode: AiMode,
}

impl AiClient {
    pub fn with_mode(mode: AiMode) -> Self {
        Self { mode }
    }

    /// Builds a client from the `ai` config section; no program means disabled.
    pub fn from_config(config: &AiConfig) -> Self {
        let mode = match &config.program {
            Some(program) if !program.as_os_str().is_empty() => AiMode::Command {
                program: program.clone(),
                args: config.args.clone(),
            },
            _ => AiMode::Disabled,
        };
        Self { mode }
    }

    pub fn is_available(&self) -> bool {
        matches!(self.mode, AiMode::Command { .. })
    }

    pub fn mode(&self) -> &AiMode {
        &self.mode
    }

    pub fn mode_description(&self) -> String {
        match &self.mode {
            AiMode::Command { program, .. } => format!("command ({})", program.display()),
            AiMode::Disabled => "Disabled".to_string(),
        }
    }

    fn send_command_request(
        &self,
        program: &PathBuf,
        args: &[String],
        prompt: &str,
    ) -> Result<String, AiError> {
        debug!(program = %program.display(), prompt_len = prompt.len(), "asking model");
        let output = Command::new(program)
            .args(args)
            .arg(prompt)
            .output()
            .map_err(|e| AiError::ExecFailed(e.to_string()))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(AiError::ExecFailed(format!(
                "Exit code: {:?}, stderr: {}",
                output.status.code(),
                stderr
            )));
        }

        let response = String::from_utf8_lossy(&output.stdout).to_string();
        if response.trim().is_empty() {
            return Err(AiError::InvalidResponse(
                "Empty response from model command".to_string(),
            ));
        }
        Ok(response)
    }
}

impl LanguageModel for AiClient {
    fn ask(&self, prompt: &str) -> Result<String, AiError> {
        match &self.mode {
            AiMode::Command { program, args } => self.send_command_request(program, args, prompt),
            AiMode::Disabled => Err(AiError::NotAvailable),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_disabled_mode() {
        let client = AiClient::with_mode(AiMode::Disabled);
        assert!(!client.is_available());
        assert_eq!(client.mode_description(), "Disabled");
        assert!(matches!(client.ask("hi"), Err(AiError::NotAvailable)));
    }

    #[test]
    fn test_from_config_without_program_is_disabled() {
        let client = AiClient::from_config(&AiConfig::default());
        assert!(!client.is_available());
    }

    #[cfg(unix)]
    #[test]
    fn test_command_mode_passes_prompt_as_last_arg() {
        let client = AiClient::with_mode(AiMode::Command {
            program: PathBuf::from("echo"),
            args: vec!["answer:".to_string()],
        });
        let out = client.ask("Yes").unwrap();
        assert_eq!(out.trim(), "answer: Yes");
    }

    #[cfg(unix)]
    #[test]
    fn test_command_failure_is_exec_failed() {
        let client = AiClient::with_mode(AiMode::Command {
            program: PathBuf::from("false"),
            args: Vec::new(),
        });
        assert!(matches!(client.ask("x"), Err(AiError::ExecFailed(_))));
    }

    #[test]
    fn test_missing_program_is_exec_failed() {
        let client = AiClient::with_mode(AiMode::Command {
            program: PathBuf::from("/nonexistent/pmfs-model"),
            args: Vec::new(),
        });
        assert!(matches!(client.ask("x"), Err(AiError::ExecFailed(_))));
    }
}
