use std::ffi::{OsStr, OsString};
use tracing::{debug, info};

use super::process::{self, join_classpath, CommandSpec};
use crate::config::ToolchainConfig;
use crate::model::CompilationTask;
use crate::traits::{KotlinCompiler, StageError, Tool};

const KAPT_PLUGIN_ID: &str = "org.jetbrains.kotlin.kapt3";

/// Drives the `kotlinc` command line compiler.
#[derive(Debug, Clone)]
pub struct KotlincInvoker {
    config: ToolchainConfig,
}

impl KotlincInvoker {
    pub fn new(config: ToolchainConfig) -> Self {
        Self { config }
    }

    /// Arguments shared by compilation and annotation processing.
    fn common_args(&self, task: &CompilationTask) -> Result<Vec<OsString>, StageError> {
        let mut args: Vec<OsString> = vec![
            "-module-name".into(),
            task.info.module_name.clone().into(),
            "-jvm-target".into(),
            self.config.jvm_target.clone().into(),
            "-no-stdlib".into(),
            "-no-reflect".into(),
        ];
        if !task.inputs.classpath.is_empty() {
            args.push("-cp".into());
            args.push(join_classpath(&task.inputs.classpath)?);
        }
        args.extend(self.config.kotlinc_options.iter().map(OsString::from));
        Ok(args)
    }

    /// Sources go last: Kotlin to compile, Java for symbol resolution.
    fn source_args(task: &CompilationTask) -> impl Iterator<Item = OsString> + '_ {
        task.inputs
            .kotlin_sources
            .iter()
            .chain(task.inputs.java_sources.iter())
            .map(|p| p.as_os_str().to_os_string())
    }

    pub fn compile_command(&self, task: &CompilationTask) -> Result<CommandSpec, StageError> {
        Ok(CommandSpec::new(&self.config.kotlinc)
            .arg("-d")
            .arg(&task.directories.classes)
            .args(self.common_args(task)?)
            .args(Self::source_args(task)))
    }

    pub fn kapt_command(&self, task: &CompilationTask) -> Result<CommandSpec, StageError> {
        let plugin = self
            .config
            .kapt_plugin
            .as_ref()
            .ok_or_else(|| StageError::ToolNotFound("kotlin-annotation-processing plugin".into()))?;

        let option = |key: &str, value: &OsStr| {
            let mut opt = OsString::from(format!("plugin:{KAPT_PLUGIN_ID}:{key}="));
            opt.push(value);
            opt
        };

        let stubs = task.directories.temp.join("stubs");
        let processors = task.info.plugins.annotation_processors.join(",");
        let mut plugin_args: Vec<OsString> = vec![
            option("sources", task.directories.generated_sources.as_os_str()),
            option("classes", task.directories.generated_classes.as_os_str()),
            option("stubs", stubs.as_os_str()),
            option("aptMode", OsStr::new("stubsAndApt")),
            option("correctErrorTypes", OsStr::new("true")),
        ];
        plugin_args.extend(
            task.inputs
                .processorpath
                .iter()
                .map(|entry| option("apclasspath", entry.as_os_str())),
        );
        plugin_args.push(option("processors", OsStr::new(&processors)));

        let mut plugin_flag = OsString::from("-Xplugin=");
        plugin_flag.push(plugin);

        let mut cmd = CommandSpec::new(&self.config.kotlinc)
            .arg("-d")
            .arg(&task.directories.generated_classes)
            .arg(plugin_flag)
            .args(self.common_args(task)?);
        for plugin_arg in plugin_args {
            cmd = cmd.arg("-P").arg(plugin_arg);
        }
        Ok(cmd.args(Self::source_args(task)))
    }
}

impl KotlinCompiler for KotlincInvoker {
    fn compile(&self, task: &CompilationTask) -> Result<Vec<String>, StageError> {
        if task.inputs.kotlin_sources.is_empty() {
            debug!("No Kotlin sources, skipping kotlinc");
            return Ok(Vec::new());
        }
        info!(sources = task.inputs.kotlin_sources.len(), "Running kotlinc");
        process::run(&self.compile_command(task)?)?.into_diagnostics(Tool::Kotlinc)
    }

    fn run_annotation_processors(
        &self,
        task: &CompilationTask,
    ) -> Result<Vec<String>, StageError> {
        info!(
            processors = %task.info.plugins.annotation_processors.join(", "),
            "Running annotation processors"
        );
        process::run(&self.kapt_command(task)?)?.into_diagnostics(Tool::Kapt)
    }
}
