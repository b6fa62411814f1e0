// Application Layer - Use Cases and Business Logic

#[cfg(test)]
mod log_capture;
pub mod runner;
pub mod template;
mod text;
pub mod tokenizer;
pub mod workspace;

// Re-exports
pub use runner::{JobRunner, RunnerConfig};
pub use template::{validate_command_template, CommandTemplate, TemplateError, TemplateValidation};
pub use tokenizer::tokenize;
pub use workspace::JobWorkspace;
