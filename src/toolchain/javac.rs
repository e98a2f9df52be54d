use tracing::{debug, info};

use super::process::{self, join_classpath, CommandSpec};
use crate::config::ToolchainConfig;
use crate::model::CompilationTask;
use crate::traits::{JavaCompiler, StageError, Tool};

/// Drives `javac` over the unit's Java sources, with the Kotlin output
/// directory on the classpath so Java can reference Kotlin declarations.
#[derive(Debug, Clone)]
pub struct JavacInvoker {
    config: ToolchainConfig,
}

impl JavacInvoker {
    pub fn new(config: ToolchainConfig) -> Self {
        Self { config }
    }

    pub fn compile_command(&self, task: &CompilationTask) -> Result<CommandSpec, StageError> {
        let mut classpath = vec![task.directories.classes.clone()];
        classpath.extend(task.inputs.classpath.iter().cloned());

        Ok(CommandSpec::new(&self.config.javac)
            .arg("-d")
            .arg(&task.directories.classes)
            .arg("-cp")
            .arg(join_classpath(&classpath)?)
            // Annotation processing already ran through kapt.
            .arg("-proc:none")
            .args(["-encoding", "UTF-8"])
            .args(&self.config.javac_options)
            .args(&task.inputs.java_sources))
    }
}

impl JavaCompiler for JavacInvoker {
    fn compile(&self, task: &CompilationTask) -> Result<Vec<String>, StageError> {
        if task.inputs.java_sources.is_empty() {
            debug!("No Java sources, skipping javac");
            return Ok(Vec::new());
        }
        info!(sources = task.inputs.java_sources.len(), "Running javac");
        process::run(&self.compile_command(task)?)?.into_diagnostics(Tool::Javac)
    }
}
