//! Compilation pipeline orchestrator.
//!
//! This module provides the [`JvmCompilationPipeline`] coordinator that drives
//! one compilation unit through its stages in a fixed order:
//! source expansion → kapt → kotlinc + javac → class jar → source jar → jdeps.
//!
//! - Every stage is timed through a [`StageClock`], failures included
//! - The first failing stage ends the run with a single [`PipelineError`]
//! - Compiler diagnostics always reach the [`OutputSink`], even on failure
//! - Structured logging via `tracing`

use serde::Serialize;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, error, info, instrument};

use super::clock::{StageClock, StageTiming};
use super::dual::compile_classes;
use super::packaging::produce_source_jar;
use super::sources::{ensure_directories, expand_with_source_jars, run_annotation_processors};
use crate::config::PipelineConfig;
use crate::model::CompilationTask;
use crate::sink::StderrSink;
use crate::traits::{
    DependencyReporter, ErrorKind, JarAssembler, JavaCompiler, KotlinCompiler, OutputSink,
    StageError,
};

// ============================================================================
// Pipeline Types
// ============================================================================

/// Progress of a single pipeline run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum PipelineState {
    Init,
    Preprocessed,
    AnnotationProcessed,
    Compiled,
    Jarred,
    SourceJarred,
    JDepsGenerated,
    Done,
    Failed,
}

impl fmt::Display for PipelineState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// Outcome of a successful run.
#[derive(Debug, Clone)]
pub struct PipelineResult {
    /// One entry per stage invocation, in execution order
    pub timings: Vec<StageTiming>,

    /// The task as the last stage saw it, including every discovered source
    pub task: CompilationTask,
}

// ============================================================================
// Pipeline Errors
// ============================================================================

/// Errors surfaced to callers of the pipeline.
#[derive(thiserror::Error, Debug)]
pub enum PipelineError {
    /// A stage failed; the underlying cause is kept intact
    #[error("Compilation of {label} failed in stage '{stage}' (after {state}): {source}")]
    StageFailed {
        label: String,
        stage: String,
        /// Last state reached before the failure
        state: PipelineState,
        #[source]
        source: StageError,
    },

    /// Another in-flight compilation owns the same temp directory
    #[error("Temp directory '{}' is already in use by another compilation", .0.display())]
    ConcurrentTempDir(std::path::PathBuf),

    /// The worker running the pipeline could not be joined
    #[error("Compilation worker failed: {0}")]
    Join(String),
}

impl PipelineError {
    /// The failing stage's error, if a stage failed.
    pub fn stage_error(&self) -> Option<&StageError> {
        match self {
            PipelineError::StageFailed { source, .. } => Some(source),
            _ => None,
        }
    }

    pub fn kind(&self) -> ErrorKind {
        self.stage_error()
            .map(StageError::kind)
            .unwrap_or(ErrorKind::Other)
    }
}

// ============================================================================
// Run bookkeeping
// ============================================================================

/// State, clock and sink of one in-flight run.
struct PipelineRun<'a> {
    label: &'a str,
    state: PipelineState,
    clock: StageClock,
    sink: &'a dyn OutputSink,
}

impl<'a> PipelineRun<'a> {
    fn new(label: &'a str, sink: &'a dyn OutputSink) -> Self {
        Self {
            label,
            state: PipelineState::Init,
            clock: StageClock::new(),
            sink,
        }
    }

    /// Runs one transition. On success the run moves to `next`; on failure it
    /// becomes `Failed`, any diagnostics still attached to the error go to the
    /// sink, and the error is wrapped with the stage name and last state.
    fn advance<T, F>(
        &mut self,
        stage: &str,
        next: PipelineState,
        work: F,
    ) -> Result<T, PipelineError>
    where
        F: FnOnce(&mut StageClock) -> Result<T, StageError>,
    {
        match work(&mut self.clock) {
            Ok(value) => {
                debug!(from = %self.state, to = %next, "State transition");
                self.state = next;
                Ok(value)
            }
            Err(mut source) => {
                let diagnostics = source.take_diagnostics();
                if !diagnostics.is_empty() {
                    self.sink.deliver(&diagnostics);
                }
                let state = self.state;
                self.state = PipelineState::Failed;
                error!(stage, %state, error = %source, "Stage failed");
                Err(PipelineError::StageFailed {
                    label: self.label.to_string(),
                    stage: stage.to_string(),
                    state,
                    source,
                })
            }
        }
    }
}

// ============================================================================
// Pipeline Executor
// ============================================================================

/// Orchestrates a mixed Kotlin/Java compilation unit.
///
/// The pipeline holds no per-run state; one instance may serve many units,
/// provided no two concurrent runs share a temp directory.
///
/// # Example
///
/// ```ignore
/// use jvm_compile_pipeline::{JvmCompilationPipeline, KotlincInvoker, JavacInvoker,
///     ZipJarAssembler, JdepsReporter, ToolchainConfig};
///
/// let config = ToolchainConfig::from_json_file("toolchain.json".as_ref())?;
/// let pipeline = JvmCompilationPipeline::new(
///     KotlincInvoker::new(config.clone()),
///     JavacInvoker::new(config.clone()),
///     ZipJarAssembler,
///     JdepsReporter::new(config),
/// );
/// let result = pipeline.execute(task)?;
/// for timing in &result.timings {
///     println!("{}: {} ms", timing.name, timing.duration_ms());
/// }
/// ```
pub struct JvmCompilationPipeline<K, J, A, D>
where
    K: KotlinCompiler,
    J: JavaCompiler,
    A: JarAssembler,
    D: DependencyReporter,
{
    kotlin: K,
    java: J,
    jar: A,
    jdeps: D,

    /// Where compiler diagnostics go (default: stderr)
    sink: Arc<dyn OutputSink>,

    config: PipelineConfig,
}

impl<K, J, A, D> JvmCompilationPipeline<K, J, A, D>
where
    K: KotlinCompiler,
    J: JavaCompiler,
    A: JarAssembler,
    D: DependencyReporter,
{
    pub fn new(kotlin: K, java: J, jar: A, jdeps: D) -> Self {
        Self {
            kotlin,
            java,
            jar,
            jdeps,
            sink: Arc::new(StderrSink),
            config: PipelineConfig::default(),
        }
    }

    pub fn with_sink(mut self, sink: Arc<dyn OutputSink>) -> Self {
        self.sink = sink;
        self
    }

    pub fn with_config(mut self, config: PipelineConfig) -> Self {
        self.config = config;
        self
    }

    pub fn kotlin(&self) -> &K {
        &self.kotlin
    }

    /// Runs every stage for `task`.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::StageFailed`] for the first stage that fails.
    /// Compilation failures are reported only after both kotlinc and javac
    /// have run; a kotlinc failure takes precedence over a javac failure.
    #[instrument(skip(self, task), fields(label = %task.info.label))]
    pub fn execute(&self, task: CompilationTask) -> Result<PipelineResult, PipelineError> {
        if self.config.trace {
            match serde_json::to_string(&task) {
                Ok(json) => debug!(task = %json, "Compilation task"),
                Err(e) => debug!(error = %e, "Compilation task not serializable"),
            }
        }

        let label = task.info.label.clone();
        let sink: &dyn OutputSink = self.sink.as_ref();
        let mut run = PipelineRun::new(&label, sink);

        // ====================================================================
        // Preprocessing: workspace directories + bundled source archives
        //
        // Directory creation is untimed; only archive expansion gets a clock
        // entry. A failure here is still reported as stage "expand sources".
        // ====================================================================

        let task = run.advance("expand sources", PipelineState::Preprocessed, |clock| {
            ensure_directories(&[
                &task.directories.classes,
                &task.directories.temp,
                &task.directories.generated_sources,
                &task.directories.generated_classes,
            ])?;
            if task.inputs.source_jars.is_empty() {
                Ok(task)
            } else {
                clock.execute("expand sources", || expand_with_source_jars(task))
            }
        })?;

        // ====================================================================
        // Annotation processing
        // ====================================================================

        let kapt_stage = format!(
            "kapt ({})",
            task.info.plugins.annotation_processors.join(", ")
        );
        let task = run.advance(&kapt_stage, PipelineState::AnnotationProcessed, |clock| {
            if task.has_annotation_processors() {
                clock.execute(kapt_stage.clone(), || {
                    run_annotation_processors(task, &self.kotlin, sink)
                })
            } else {
                debug!("No annotation processors declared, skipping kapt");
                Ok(task)
            }
        })?;

        // ====================================================================
        // Compilation: kotlinc, then javac regardless of kotlinc's outcome
        // ====================================================================

        run.advance("compile classes", PipelineState::Compiled, |clock| {
            compile_classes(&task, &self.kotlin, &self.java, sink, clock)
        })?;

        // ====================================================================
        // Packaging and dependency report
        // ====================================================================

        run.advance("create jar", PipelineState::Jarred, |clock| {
            clock.execute("create jar", || self.jar.create_output_jar(&task))
        })?;

        run.advance("produce src jar", PipelineState::SourceJarred, |clock| {
            clock.execute("produce src jar", || produce_source_jar(&task))
        })?;

        run.advance("generate jdeps", PipelineState::JDepsGenerated, |clock| {
            clock.execute("generate jdeps", || self.jdeps.generate_jdeps(&task))
        })?;

        run.state = PipelineState::Done;
        let state = run.state;
        let timings = run.clock.into_timings();
        let total_ms: u64 = timings.iter().map(StageTiming::duration_ms).sum();
        info!(%state, stages = timings.len(), total_ms, "Compilation completed");

        if self.config.timings {
            let lines: Vec<String> = timings
                .iter()
                .map(|t| format!("{}: {} ms", t.name, t.duration_ms()))
                .collect();
            self.sink.deliver(&lines);
        }

        Ok(PipelineResult { timings, task })
    }
}

// ============================================================================
// Tests
// ============================================================================
