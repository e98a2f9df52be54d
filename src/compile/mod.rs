//! Compile module - the staged Kotlin/Java compilation pipeline.
//!
//! This module provides the core of the orchestrator:
//! - **Clock**: per-stage timing via [`StageClock`]
//! - **Sources**: bundled archive expansion and annotation processing
//! - **Dual compilation**: kotlinc then javac with deferred Kotlin failure
//! - **Packaging**: source jar production
//! - **Pipeline**: the state machine via [`pipeline::JvmCompilationPipeline`]

pub mod clock;
pub mod dual;
pub mod packaging;
pub mod pipeline;
pub mod sources;

// Re-export commonly used types
pub use clock::{StageClock, StageTiming};
pub use dual::{compile_classes, resolve, CompilerOutcome};
pub use packaging::produce_source_jar;
pub use sources::{
    collect_generated_sources, ensure_directories, expand_with_source_jars,
    run_annotation_processors,
};

pub use pipeline::{
    JvmCompilationPipeline, PipelineError, PipelineResult, PipelineState,
};
