//! Shared primitives used across vgdom crates.

use core::fmt;

mod config;

pub use config::DEFAULT_EVENT_BUFFER_BYTES;
pub use config::DEFAULT_INSTRUCTION_BUFFER_BYTES;
pub use config::DEFAULT_MOUNT_SELECTOR;
pub use config::RendererConfig;

/// Result alias used across the workspace.
pub type RenderResult<T> = Result<T, RenderError>;

/// Failure taxonomy derived from an error's code prefix.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// Malformed input tree or structural violations; aborts the pass.
    Precondition,
    /// Instruction buffer or cursor protocol violations.
    Protocol,
    /// Host runtime missing or a host call failed.
    Host,
    /// Malformed event buffer contents.
    Event,
    Config,
    Other,
}

/// Top-level error type for render passes and event dispatch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderError {
    pub code: &'static str,
    pub message: String,
}

impl RenderError {
    pub fn new(code: &'static str, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    pub fn category(&self) -> ErrorCategory {
        let prefix = self.code.split('.').next().unwrap_or_default();
        match prefix {
            "render" | "tree" => ErrorCategory::Precondition,
            "instr" => ErrorCategory::Protocol,
            "host" => ErrorCategory::Host,
            "event" => ErrorCategory::Event,
            "config" => ErrorCategory::Config,
            _ => ErrorCategory::Other,
        }
    }
}

impl fmt::Display for RenderError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.code, self.message)
    }
}

impl std::error::Error for RenderError {}

#[cfg(test)]
mod tests {
    use super::ErrorCategory;
    use super::RenderError;

    #[test]
    fn category_follows_code_prefix() {
        assert_eq!(
            RenderError::new("render.doc_missing", "x").category(),
            ErrorCategory::Precondition
        );
        assert_eq!(
            RenderError::new("tree.already_attached", "x").category(),
            ErrorCategory::Precondition
        );
        assert_eq!(
            RenderError::new("instr.buffer_overflow", "x").category(),
            ErrorCategory::Protocol
        );
        assert_eq!(
            RenderError::new("host.unavailable", "x").category(),
            ErrorCategory::Host
        );
        assert_eq!(
            RenderError::new("something", "x").category(),
            ErrorCategory::Other
        );
    }

    #[test]
    fn display_includes_code_and_message() {
        let error = RenderError::new("event.truncated", "missing `event_type`");
        assert_eq!(error.to_string(), "event.truncated: missing `event_type`");
    }
}
