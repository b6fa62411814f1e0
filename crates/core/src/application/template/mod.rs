// Command Template Validation
// Untrusted templates must be validated here before any substitution


use serde::Serialize;
use serde_json::Value;
use thiserror::Error;
use tracing::error;

use crate::application::text::truncate_chars;

/// Executable name a template must start with unless configured otherwise
pub const DEFAULT_TRUSTED_COMMAND: &str = "auto-editor";

pub const INPUT_PLACEHOLDER: &str = "{input}";
pub const OUTPUT_PLACEHOLDER: &str = "{output}";

/// Upper bound on the template snippet attached to diagnostics
const LOG_SNIPPET_CHARS: usize = 200;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TemplateError {
    #[error("command template must be a string")]
    NotAString,

    #[error("template must include {{input}} and {{output}}")]
    MissingPlaceholders,

    #[error("template must start with \"{0}\"")]
    UntrustedCommand(String),

    #[error("trusted command must not be empty")]
    EmptyTrustedCommand,
}

/// A command template that passed validation.
///
/// The only way to obtain one is through [`CommandTemplate::parse`] or
/// [`CommandTemplate::from_value`], so the runner never sees unchecked input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandTemplate(String);

impl CommandTemplate {
    /// Validate a raw template against the trusted command name
    ///
    /// # Errors
    /// - TemplateError::EmptyTrustedCommand if `trusted_command` is blank
    /// - TemplateError::MissingPlaceholders if `{input}` or `{output}` is absent
    /// - TemplateError::UntrustedCommand if the first word is not `trusted_command`
    pub fn parse(raw: &str, trusted_command: &str) -> Result<Self, TemplateError> {
        if trusted_command.trim().is_empty() {
            error!("validate_command_template: trusted command is empty");
            return Err(TemplateError::EmptyTrustedCommand);
        }

        if !raw.contains(INPUT_PLACEHOLDER) || !raw.contains(OUTPUT_PLACEHOLDER) {
            error!(
                cmd_snippet = %truncate_chars(raw, LOG_SNIPPET_CHARS),
                "validate_command_template: missing placeholders"
            );
            return Err(TemplateError::MissingPlaceholders);
        }

        if !starts_with_word(raw, trusted_command) {
            error!(
                cmd_snippet = %truncate_chars(raw, LOG_SNIPPET_CHARS),
                trusted_command = %trusted_command,
                "validate_command_template: does not start with trusted command"
            );
            return Err(TemplateError::UntrustedCommand(trusted_command.to_string()));
        }

        Ok(Self(raw.to_string()))
    }

    /// Validate a template taken from an untyped request payload
    pub fn from_value(value: &Value, trusted_command: &str) -> Result<Self, TemplateError> {
        match value.as_str() {
            Some(raw) => Self::parse(raw, trusted_command),
            None => {
                error!(
                    value_type = json_type_name(value),
                    "validate_command_template: not a string"
                );
                Err(TemplateError::NotAString)
            }
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Substitute every `{input}`, then every `{output}`
    pub fn render(&self, input: &str, output: &str) -> String {
        self.0
            .replace(INPUT_PLACEHOLDER, input)
            .replace(OUTPUT_PLACEHOLDER, output)
    }
}

impl std::fmt::Display for CommandTemplate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Plain verdict for callers that only need `{ok, message}`
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TemplateValidation {
    pub ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// Validate an untyped template value and report the outcome as a verdict
pub fn validate_command_template(value: &Value, trusted_command: &str) -> TemplateValidation {
    match CommandTemplate::from_value(value, trusted_command) {
        Ok(_) => TemplateValidation {
            ok: true,
            message: None,
        },
        Err(e) => TemplateValidation {
            ok: false,
            message: Some(e.to_string()),
        },
    }
}

/// True if `raw`, ignoring leading whitespace, starts with `word` followed by
/// end of input or a non-word character (ASCII alphanumerics and `_` are word
/// characters)
fn starts_with_word(raw: &str, word: &str) -> bool {
    match raw.trim_start().strip_prefix(word) {
        Some(rest) => rest
            .chars()
            .next()
            .map_or(true, |c| !(c.is_ascii_alphanumeric() || c == '_')),
        None => false,
    }
}

fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
