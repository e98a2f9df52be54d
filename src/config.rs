//! Toolchain and pipeline configuration.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config '{}': {source}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Invalid config '{}': {source}", .path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// Locations and options of the external JVM tools.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ToolchainConfig {
    pub kotlinc: PathBuf,
    pub javac: PathBuf,
    pub jdeps: PathBuf,

    /// Bytecode target passed to kotlinc as `-jvm-target`.
    pub jvm_target: String,

    /// `kotlin-annotation-processing` compiler plugin jar. Required only for
    /// tasks that declare annotation processors.
    pub kapt_plugin: Option<PathBuf>,

    pub kotlinc_options: Vec<String>,
    pub javac_options: Vec<String>,
}

impl Default for ToolchainConfig {
    fn default() -> Self {
        Self {
            kotlinc: PathBuf::from("kotlinc"),
            javac: PathBuf::from("javac"),
            jdeps: PathBuf::from("jdeps"),
            jvm_target: "11".to_string(),
            kapt_plugin: None,
            kotlinc_options: Vec::new(),
            javac_options: Vec::new(),
        }
    }
}

impl ToolchainConfig {
    pub fn from_json_file(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_str(&raw).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }
}

/// Behaviour switches for a pipeline run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PipelineConfig {
    /// Report per-stage timings to the output sink after a successful run.
    pub timings: bool,
    /// Log the full task as JSON before running.
    pub trace: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_partial_config_uses_defaults() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("toolchain.json");
        std::fs::write(
            &path,
            r#"{ "kotlinc": "/opt/kotlin/bin/kotlinc", "kotlinc_options": ["-Werror"] }"#,
        )
        .unwrap();

        let config = ToolchainConfig::from_json_file(&path).unwrap();

        assert_eq!(config.kotlinc, PathBuf::from("/opt/kotlin/bin/kotlinc"));
        assert_eq!(config.kotlinc_options, vec!["-Werror"]);
        assert_eq!(config.javac, PathBuf::from("javac"));
        assert_eq!(config.jvm_target, "11");
    }

    #[test]
    fn test_unknown_field_is_rejected() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("toolchain.json");
        std::fs::write(&path, r#"{ "kotlin": "typo" }"#).unwrap();

        assert!(matches!(
            ToolchainConfig::from_json_file(&path),
            Err(ConfigError::Parse { .. })
        ));
    }

    #[test]
    fn test_missing_file() {
        let err = ToolchainConfig::from_json_file(Path::new("/nonexistent/tc.json")).unwrap_err();
        assert!(matches!(err, ConfigError::Read { .. }));
    }

    #[test]
    fn test_pipeline_config_defaults_off() {
        let config: PipelineConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(config, PipelineConfig::default());
        assert!(!config.timings);
    }
}
