pub mod compile;
pub mod config;
pub mod executor;
pub mod logging;
pub mod model;
pub mod sink;
pub mod toolchain;
pub mod traits;

// Re-export common types for convenience
pub use compile::{
    CompilerOutcome, JvmCompilationPipeline, PipelineError, PipelineResult, PipelineState,
    StageClock, StageTiming,
};
pub use config::*;
pub use executor::*;
pub use model::*;
pub use sink::*;
pub use toolchain::{JavacInvoker, JdepsReporter, KotlincInvoker, ZipJarAssembler};
pub use traits::*;
