//! Renderer configuration surface.

use crate::RenderError;
use crate::RenderResult;

pub const DEFAULT_MOUNT_SELECTOR: &str = "#app";
pub const DEFAULT_INSTRUCTION_BUFFER_BYTES: usize = 4096;
pub const DEFAULT_EVENT_BUFFER_BYTES: usize = 4096;

const MIN_INSTRUCTION_BUFFER_BYTES: usize = 64;
const MAX_BUFFER_BYTES: usize = 16 * 1024 * 1024;

/// Mount point and fixed buffer capacities for a renderer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RendererConfig {
    /// Host selector the root component is mounted at. Empty means the root
    /// component renders the whole page starting at `<html>`.
    pub mount_selector: String,
    pub instruction_buffer_bytes: usize,
    pub event_buffer_bytes: usize,
}

impl Default for RendererConfig {
    fn default() -> Self {
        Self {
            mount_selector: DEFAULT_MOUNT_SELECTOR.to_owned(),
            instruction_buffer_bytes: DEFAULT_INSTRUCTION_BUFFER_BYTES,
            event_buffer_bytes: DEFAULT_EVENT_BUFFER_BYTES,
        }
    }
}

impl RendererConfig {
    pub fn with_mount_selector(mount_selector: impl Into<String>) -> RenderResult<Self> {
        let config = Self {
            mount_selector: mount_selector.into(),
            ..Self::default()
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> RenderResult<()> {
        if self.instruction_buffer_bytes < MIN_INSTRUCTION_BUFFER_BYTES {
            return Err(RenderError::new(
                "config.instruction_buffer_too_small",
                format!(
                    "instruction_buffer_bytes must be at least {MIN_INSTRUCTION_BUFFER_BYTES} (got {})",
                    self.instruction_buffer_bytes
                ),
            ));
        }

        if self.event_buffer_bytes == 0 {
            return Err(RenderError::new(
                "config.event_buffer_invalid",
                "event_buffer_bytes must be greater than zero",
            ));
        }

        if self.instruction_buffer_bytes > MAX_BUFFER_BYTES
            || self.event_buffer_bytes > MAX_BUFFER_BYTES
        {
            return Err(RenderError::new(
                "config.buffer_too_large",
                "buffer capacity exceeds hard limit (16 MiB)",
            ));
        }

        if self.mount_selector.trim() != self.mount_selector {
            return Err(RenderError::new(
                "config.mount_selector_invalid",
                format!(
                    "mount selector `{}` has leading or trailing whitespace",
                    self.mount_selector
                ),
            ));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::RendererConfig;

    #[test]
    fn default_config_is_valid() {
        assert_eq!(RendererConfig::default().validate(), Ok(()));
    }

    #[test]
    fn rejects_tiny_instruction_buffer() {
        let config = RendererConfig {
            instruction_buffer_bytes: 8,
            ..RendererConfig::default()
        };
        let result = config.validate();
        assert!(result.is_err());
        if let Err(error) = result {
            assert_eq!(error.code, "config.instruction_buffer_too_small");
        }
    }

    #[test]
    fn rejects_oversized_event_buffer() {
        let config = RendererConfig {
            event_buffer_bytes: 32 * 1024 * 1024,
            ..RendererConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn empty_mount_selector_is_allowed() {
        let config = RendererConfig::with_mount_selector("");
        assert!(config.is_ok());
    }

    #[test]
    fn padded_mount_selector_is_rejected() {
        let config = RendererConfig::with_mount_selector(" #app");
        assert!(config.is_err());
    }
}
