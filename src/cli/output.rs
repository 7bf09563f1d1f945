//! CLI output: error mapping from domain errors to stable CLI surface.

use crate::error::{ApiError, ErrorKind};

/// Map domain/service errors to a string for CLI output.
pub fn map_error(e: &ApiError) -> String {
    match e.kind() {
        ErrorKind::Configuration | ErrorKind::Validation => format!("error: {}", e),
        _ => format!("error: {}\n{}", e, e.user_message()),
    }
}

/// Process exit code per error kind.
pub fn exit_code(e: &ApiError) -> i32 {
    match e.kind() {
        ErrorKind::Configuration | ErrorKind::Validation => 2,
        ErrorKind::Authorization => 3,
        ErrorKind::Transport => 4,
        ErrorKind::Capability | ErrorKind::RemoteJob => 1,
    }
}
