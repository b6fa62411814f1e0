// Port Layer - Interfaces for external dependencies

pub mod id_provider;
pub mod process_launcher;
pub mod time_provider; // For deterministic testing

// Re-exports
pub use id_provider::IdProvider;
pub use process_launcher::{
    ExecutionError, LaunchRequest, LaunchedProcess, OutputStream, ProcessHandle, ProcessLauncher,
};
pub use time_provider::TimeProvider;
