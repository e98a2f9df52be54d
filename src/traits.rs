//! Collaborator seams consumed by the compilation pipeline, plus the error
//! taxonomy every stage reports through.

use crate::model::CompilationTask;
use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

// ============================================================================
// Errors
// ============================================================================

/// The compiler or tool that produced a [`CompilationError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tool {
    Kotlinc,
    Kapt,
    Javac,
    Jdeps,
}

impl fmt::Display for Tool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Tool::Kotlinc => "kotlinc",
            Tool::Kapt => "kapt",
            Tool::Javac => "javac",
            Tool::Jdeps => "jdeps",
        };
        f.write_str(name)
    }
}

/// A compiler ran and reported failure.
///
/// `lines` holds the diagnostics while the error travels from the compiler
/// to its stage. Stages move them to the output sink with
/// [`CompilationError::take_lines`] before the error propagates further.
#[derive(Error, Debug)]
#[error("{tool} failed{}", exit_suffix(.exit_code))]
pub struct CompilationError {
    pub tool: Tool,
    pub exit_code: Option<i32>,
    pub lines: Vec<String>,
}

impl CompilationError {
    pub fn new(tool: Tool, exit_code: Option<i32>, lines: Vec<String>) -> Self {
        Self {
            tool,
            exit_code,
            lines,
        }
    }

    pub fn take_lines(&mut self) -> Vec<String> {
        std::mem::take(&mut self.lines)
    }
}

fn exit_suffix(code: &Option<i32>) -> String {
    match code {
        Some(code) => format!(" with exit code {code}"),
        None => String::new(),
    }
}

/// Broad classification of a [`StageError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Compilation,
    Io,
    InternalConsistency,
    Other,
}

/// Errors raised by a single pipeline stage or collaborator.
#[derive(Error, Debug)]
pub enum StageError {
    #[error(transparent)]
    Compilation(#[from] CompilationError),

    #[error("{context}: {source}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Unreadable archive '{}': {source}", .path.display())]
    Archive {
        path: PathBuf,
        #[source]
        source: zip::result::ZipError,
    },

    /// An orchestration invariant was violated; never caused by user input.
    #[error("Internal consistency violation: {0}")]
    InternalConsistency(String),

    /// Two different sources map to the same source jar entry.
    #[error(
        "Source jar entry '{entry}' is claimed by both {} and {}",
        .first.display(),
        .second.display()
    )]
    ConflictingSourceEntry {
        entry: String,
        first: PathBuf,
        second: PathBuf,
    },

    #[error("Tool '{0}' could not be started")]
    ToolNotFound(String),

    #[error(transparent)]
    Other(Box<dyn std::error::Error + Send + Sync>),
}

impl StageError {
    pub fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        StageError::Io {
            context: context.into(),
            source,
        }
    }

    /// Removes and returns any diagnostic lines still attached to the error.
    pub fn take_diagnostics(&mut self) -> Vec<String> {
        match self {
            StageError::Compilation(err) => err.take_lines(),
            _ => Vec::new(),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            StageError::Compilation(_) => ErrorKind::Compilation,
            StageError::Io { .. } | StageError::Archive { .. } | StageError::ToolNotFound(_) => {
                ErrorKind::Io
            }
            StageError::InternalConsistency(_) => ErrorKind::InternalConsistency,
            StageError::ConflictingSourceEntry { .. } | StageError::Other(_) => ErrorKind::Other,
        }
    }
}

// ============================================================================
// Collaborators
// ============================================================================

/// Kotlin compiler front end.
///
/// Both operations return the compiler's diagnostic lines on success. On
/// failure they return [`StageError::Compilation`] carrying the lines.
pub trait KotlinCompiler: Send + Sync {
    fn compile(&self, task: &CompilationTask) -> Result<Vec<String>, StageError>;

    /// Runs annotation processors only, writing into the task's
    /// generated-sources and generated-classes directories.
    fn run_annotation_processors(&self, task: &CompilationTask)
        -> Result<Vec<String>, StageError>;
}

pub trait JavaCompiler: Send + Sync {
    fn compile(&self, task: &CompilationTask) -> Result<Vec<String>, StageError>;
}

/// Assembles the class jar from the compiled output directories.
pub trait JarAssembler: Send + Sync {
    fn create_output_jar(&self, task: &CompilationTask) -> Result<(), StageError>;
}

/// Produces the machine-readable dependency report for a compiled unit.
pub trait DependencyReporter: Send + Sync {
    fn generate_jdeps(&self, task: &CompilationTask) -> Result<(), StageError>;
}

/// Destination for compiler diagnostics. Must accept output at any time,
/// including after the producing stage has failed.
pub trait OutputSink: Send + Sync {
    fn deliver(&self, lines: &[String]);
}
