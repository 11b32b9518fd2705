//! Lifter Configuration
//!
//! Options that change how functions are lifted and rendered. Loaded from JSON
//! by the CLI; library users construct it directly or take the defaults.

use serde::{Deserialize, Serialize};

/// Policy for the `// id (span)` comment on rendered assignments and calls.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProvenanceMode {
    /// No provenance comment.
    Omit,
    /// Comment always present; a missing span renders as `no span found`.
    #[default]
    Optional,
    /// Comment always present; a missing span is a rendering error.
    Required,
}

/// Lifter configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LiftConfig {
    /// Provenance comment policy used by `to_c_like`.
    pub provenance: ProvenanceMode,
    /// Drop recognized register spills inside trampoline regions from the high-level output
    pub skip_trampoline_spills: bool,
    /// Check that every high-level instruction has a low-level mapping
    pub verify_coverage: bool,
    /// Emit a low-level `__asm(...)` stub for unsupported opcodes
    pub unsupported_stubs: bool,
}

impl Default for LiftConfig {
    fn default() -> Self {
        Self {
            provenance: ProvenanceMode::Optional,
            skip_trampoline_spills: true,
            verify_coverage: true,
            unsupported_stubs: true,
        }
    }
}

impl LiftConfig {
    pub fn from_json(text: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(text)
    }
}

/// Validate a lifter configuration.
pub fn validate_config(config: &LiftConfig) -> Result<(), String> {
    if config.provenance == ProvenanceMode::Required && !config.verify_coverage {
        return Err(
            "provenance 'required' needs verify_coverage: unmapped instructions have no span"
                .to_string(),
        );
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_json_uses_defaults() {
        let config = LiftConfig::from_json(r#"{"provenance": "omit"}"#).unwrap();
        assert_eq!(config.provenance, ProvenanceMode::Omit);
        assert!(config.skip_trampoline_spills);
        assert!(validate_config(&config).is_ok());
    }

    #[test]
    fn test_required_without_coverage_is_rejected() {
        let config = LiftConfig {
            provenance: ProvenanceMode::Required,
            verify_coverage: false,
            ..LiftConfig::default()
        };
        assert!(validate_config(&config).is_err());
    }
}
