//! Collection and analysis switches

use crate::error::{ParseError, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// Marker of the compiler flag requesting kernel-info remarks
pub const KERNEL_INFO_FLAG: &str = "Rpass=kernel-info";

/// Which front-ends run and whether the analyzer runs afterwards.
///
/// Missing keys take their defaults (everything enabled); unknown keys are
/// ignored so configuration files may carry settings for other components.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CollectionConfig {
    /// Parse `-Rpass*` text remarks from stderr
    pub collect_text_remarks: bool,
    /// Decode optimization record streams
    pub collect_optimization_records: bool,
    /// Scan kernel-info output from stderr
    pub collect_kernel_info: bool,
    /// Run the performance analyzer on the finished build
    pub analyze_performance: bool,
}

impl Default for CollectionConfig {
    fn default() -> Self {
        Self {
            collect_text_remarks: true,
            collect_optimization_records: true,
            collect_kernel_info: true,
            analyze_performance: true,
        }
    }
}

impl CollectionConfig {
    /// Parse a JSON configuration
    ///
    /// # Errors
    ///
    /// Returns `ParseError::Json` if the text is not valid JSON for this shape.
    pub fn from_json(text: &str) -> Result<Self> {
        Ok(serde_json::from_str(text)?)
    }

    /// Load a JSON configuration file
    ///
    /// # Errors
    ///
    /// Returns `ParseError::Config` if the file cannot be read, or
    /// `ParseError::Json` if its content is invalid.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = fs::read_to_string(path)
            .map_err(|e| ParseError::Config(format!("{}: {e}", path.display())))?;
        Self::from_json(&text)
    }

    /// Kernel-info scanning runs only when enabled here and requested on the
    /// compiler command line (`-Rpass=kernel-info`, also through wrappers
    /// such as `-Xclang -Rpass=kernel-info` or `--offload-arg=-Rpass=kernel-info`).
    #[must_use]
    pub fn kernel_info_enabled<S: AsRef<str>>(&self, args: &[S]) -> bool {
        self.collect_kernel_info && args.iter().any(|a| a.as_ref().contains(KERNEL_INFO_FLAG))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_enable_everything() {
        let config = CollectionConfig::default();
        assert!(config.collect_text_remarks);
        assert!(config.collect_optimization_records);
        assert!(config.collect_kernel_info);
        assert!(config.analyze_performance);
    }

    #[test]
    fn test_partial_json() {
        let config =
            CollectionConfig::from_json(r#"{"analyze_performance": false, "log_level": "debug"}"#)
                .unwrap();
        assert!(!config.analyze_performance);
        assert!(config.collect_text_remarks);
    }

    #[test]
    fn test_invalid_json() {
        let err = CollectionConfig::from_json("{not json").unwrap_err();
        assert!(matches!(err, ParseError::Json(_)));
    }

    #[test]
    fn test_load_missing_file() {
        let err = CollectionConfig::load("/nonexistent/buildscope.json").unwrap_err();
        assert!(matches!(err, ParseError::Config(_)));
        assert!(err.to_string().contains("buildscope.json"));
    }

    #[test]
    fn test_load_from_file() {
        let path = std::env::temp_dir().join(format!("buildscope-config-{}.json", std::process::id()));
        fs::write(&path, r#"{"collect_kernel_info": false}"#).unwrap();
        let config = CollectionConfig::load(&path).unwrap();
        fs::remove_file(&path).unwrap();

        assert!(!config.collect_kernel_info);
        assert!(config.collect_optimization_records);
    }

    #[test]
    fn test_kernel_info_requires_flag() {
        let config = CollectionConfig::default();
        assert!(config.kernel_info_enabled(&["-O2", "-Rpass=kernel-info"]));
        assert!(!config.kernel_info_enabled(&["-O2", "-Rpass=inline"]));
        assert!(config.kernel_info_enabled(&["-foffload-lto", "-Wl,-Rpass=kernel-info"]));

        let disabled = CollectionConfig {
            collect_kernel_info: false,
            ..Default::default()
        };
        assert!(!disabled.kernel_info_enabled(&["-Rpass=kernel-info"]));
    }
}
