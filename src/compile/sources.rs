//! Source discovery stages: bundled source archive expansion and annotation
//! processing. Both return a new task rather than editing the one they got.

use std::path::{Path, PathBuf};
use tracing::{debug, info};
use walkdir::WalkDir;

use crate::model::{is_jvm_source, CompilationTask};
use crate::toolchain::jar::SourceJarExtractor;
use crate::traits::{KotlinCompiler, OutputSink, StageError};

/// Creates each directory (and its parents). Idempotent; fails when a path
/// exists but is not a directory.
pub fn ensure_directories<P: AsRef<Path>>(paths: &[P]) -> Result<(), StageError> {
    for path in paths {
        let path = path.as_ref();
        std::fs::create_dir_all(path)
            .map_err(|e| StageError::io(format!("creating directory {}", path.display()), e))?;
    }
    Ok(())
}

/// Extracts the JVM sources of every bundled source archive into
/// `<temp>/_srcjars` and adds them to the task. Tasks without archives are
/// returned as-is without touching the filesystem.
pub fn expand_with_source_jars(task: CompilationTask) -> Result<CompilationTask, StageError> {
    if task.inputs.source_jars.is_empty() {
        return Ok(task);
    }

    let dest = task.source_jars_dir();
    ensure_directories(&[&dest])?;

    let mut extractor = SourceJarExtractor::new(dest, is_jvm_source);
    extractor
        .jar_files
        .extend(task.inputs.source_jars.iter().cloned());
    extractor.execute()?;

    let extracted = extractor.into_sources();
    info!(
        archives = task.inputs.source_jars.len(),
        sources = extracted.len(),
        "Expanded bundled source archives"
    );
    Ok(task.expand_with_sources(extracted))
}

/// Runs the declared annotation processors and adds whatever they generated.
///
/// Processor diagnostics reach `sink` before any failure is returned.
pub fn run_annotation_processors<K>(
    task: CompilationTask,
    compiler: &K,
    sink: &dyn OutputSink,
) -> Result<CompilationTask, StageError>
where
    K: KotlinCompiler + ?Sized,
{
    if !task.has_annotation_processors() {
        return Ok(task);
    }

    match compiler.run_annotation_processors(&task) {
        Ok(lines) => sink.deliver(&lines),
        Err(mut err) => {
            sink.deliver(&err.take_diagnostics());
            return Err(err);
        }
    }

    let generated = collect_generated_sources(&task.directories.generated_sources)?;
    debug!(generated = generated.len(), "Annotation processors generated sources");
    Ok(task.expand_with_sources(generated))
}

/// Every regular file below `dir`, depth-first with siblings sorted by name.
/// A missing directory yields nothing.
pub fn collect_generated_sources(dir: &Path) -> Result<Vec<PathBuf>, StageError> {
    if !dir.exists() {
        return Ok(Vec::new());
    }

    let mut files = Vec::new();
    for entry in WalkDir::new(dir).sort_by_file_name() {
        let entry =
            entry.map_err(|e| StageError::io(format!("walking {}", dir.display()), e.into()))?;
        if entry.file_type().is_file() {
            files.push(entry.into_path());
        }
    }
    Ok(files)
}
