//! Source jar production for a compiled unit.

use tracing::debug;

use crate::model::CompilationTask;
use crate::toolchain::jar::SourceJarCreator;
use crate::traits::StageError;

/// Writes `outputs.srcjar` with every Java and Kotlin source of `task`.
///
/// `task` must be the expanded task: if it lists bundled source archives they
/// have to be unpacked under `<temp>/_srcjars` already. The archives
/// themselves never go into the jar, only the sources taken from them.
pub fn produce_source_jar(task: &CompilationTask) -> Result<(), StageError> {
    let mut creator = SourceJarCreator::create(&task.outputs.srcjar)?;

    if !task.inputs.source_jars.is_empty() && !task.source_jars_dir().exists() {
        return Err(StageError::InternalConsistency(format!(
            "{} bundled source archive(s) were never expanded into {}",
            task.inputs.source_jars.len(),
            task.source_jars_dir().display()
        )));
    }

    creator.add_sources(task.all_sources().cloned());
    creator.execute()?;
    debug!(srcjar = %task.outputs.srcjar.display(), "Produced source jar");
    Ok(())
}
