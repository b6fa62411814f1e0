// Runner constants (no magic values)
use std::time::Duration;

/// Hard bound on one auto-editor run (30 minutes)
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30 * 60);

/// Retained bytes per captured stream (1 MiB); the head is kept
pub const DEFAULT_MAX_CAPTURED_BYTES: usize = 1024 * 1024;

/// Read buffer size per stream
pub const READ_BUFFER_SIZE: usize = 8 * 1024;

/// Stdout chunks shorter than this (chars) are logged verbatim
pub const STDOUT_LOG_CHUNK_LIMIT: usize = 1000;

/// Stderr chunks are logged truncated to this many chars
pub const STDERR_LOG_CHUNK_CHARS: usize = 500;

/// Stderr head embedded in a failed job's error message
pub const ERROR_STDERR_CHARS: usize = 1000;

/// Command snippet attached to construction failures
pub const COMMAND_SNIPPET_CHARS: usize = 200;

/// Longest accepted output extension
pub const MAX_OUTPUT_EXT_LEN: usize = 16;
