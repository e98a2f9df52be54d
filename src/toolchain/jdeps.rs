//! Dependency report generation backed by the JDK `jdeps` tool.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use super::process::{self, join_classpath, CommandSpec};
use crate::config::ToolchainConfig;
use crate::model::CompilationTask;
use crate::traits::{DependencyReporter, StageError, Tool};

/// How a classpath entry relates to the compiled unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DependencyKind {
    /// Declared directly and referenced by the unit's classes.
    Explicit,
    /// Referenced, but only reachable transitively.
    Implicit,
    /// On the classpath, never referenced.
    Unused,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dependency {
    pub path: PathBuf,
    pub kind: DependencyKind,
}

/// The JSON document written to `outputs.jdeps`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DependencyReport {
    pub rule_label: String,
    pub dependencies: Vec<Dependency>,
}

/// Archive names referenced in `jdeps -summary` output.
///
/// Summary lines look like `lib.jar -> guava.jar`; JDK modules such as
/// `java.base` and `not found` targets are kept too and simply never match a
/// classpath entry.
pub fn referenced_archives<'a, I>(summary: I) -> HashSet<String>
where
    I: IntoIterator<Item = &'a str>,
{
    summary
        .into_iter()
        .filter_map(|line| line.split_once(" -> "))
        .map(|(_, target)| target.trim().to_string())
        .filter(|target| !target.is_empty())
        .collect()
}

/// Classifies every classpath entry against the archives jdeps reported.
pub fn classify(
    classpath: &[PathBuf],
    direct: &[PathBuf],
    referenced: &HashSet<String>,
) -> Vec<Dependency> {
    let is_referenced = |entry: &Path| {
        referenced.contains(&entry.to_string_lossy().into_owned())
            || entry
                .file_name()
                .is_some_and(|name| referenced.contains(&name.to_string_lossy().into_owned()))
    };

    classpath
        .iter()
        .map(|entry| {
            let kind = if !is_referenced(entry.as_path()) {
                DependencyKind::Unused
            } else if direct.contains(entry) {
                DependencyKind::Explicit
            } else {
                DependencyKind::Implicit
            };
            Dependency {
                path: entry.clone(),
                kind,
            }
        })
        .collect()
}

/// Runs `jdeps -summary` over the class jar and writes a [`DependencyReport`].
#[derive(Debug, Clone)]
pub struct JdepsReporter {
    config: ToolchainConfig,
}

impl JdepsReporter {
    pub fn new(config: ToolchainConfig) -> Self {
        Self { config }
    }

    pub fn summary_command(&self, task: &CompilationTask) -> Result<CommandSpec, StageError> {
        Ok(CommandSpec::new(&self.config.jdeps)
            .args(["--multi-release", "base", "-summary"])
            .arg("-cp")
            .arg(join_classpath(&task.inputs.classpath)?)
            .arg(&task.outputs.jar))
    }

    fn write_report(task: &CompilationTask, report: &DependencyReport) -> Result<(), StageError> {
        let json = serde_json::to_vec_pretty(report).map_err(|e| StageError::Other(Box::new(e)))?;
        std::fs::write(&task.outputs.jdeps, json).map_err(|e| {
            StageError::io(format!("writing {}", task.outputs.jdeps.display()), e)
        })
    }
}

impl DependencyReporter for JdepsReporter {
    fn generate_jdeps(&self, task: &CompilationTask) -> Result<(), StageError> {
        let referenced = if task.inputs.classpath.is_empty() {
            debug!("Empty classpath, skipping jdeps");
            HashSet::new()
        } else {
            let lines = process::run(&self.summary_command(task)?)?.into_diagnostics(Tool::Jdeps)?;
            referenced_archives(lines.iter().map(String::as_str))
        };

        let report = DependencyReport {
            rule_label: task.info.label.clone(),
            dependencies: classify(
                &task.inputs.classpath,
                &task.inputs.direct_dependencies,
                &referenced,
            ),
        };
        info!(
            dependencies = report.dependencies.len(),
            unused = report
                .dependencies
                .iter()
                .filter(|d| d.kind == DependencyKind::Unused)
                .count(),
            "Dependency report generated"
        );
        Self::write_report(task, &report)
    }
}
