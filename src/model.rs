use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// A fully described mixed Kotlin/Java compilation unit.
///
/// Tasks are values: stages that discover new sources return a new task via
/// [`CompilationTask::expand_with_sources`] and leave the receiver untouched.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CompilationTask {
    pub info: TaskInfo,
    pub directories: Directories,
    pub inputs: Inputs,
    pub outputs: Outputs,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TaskInfo {
    pub label: String,     // e.g., "//app/src:lib"
    pub module_name: String,
    #[serde(default)]
    pub plugins: Plugins,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Plugins {
    /// Fully qualified annotation processor class names.
    #[serde(default)]
    pub annotation_processors: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Directories {
    pub classes: PathBuf,
    pub temp: PathBuf,
    pub generated_sources: PathBuf,
    pub generated_classes: PathBuf,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Inputs {
    #[serde(default)]
    pub java_sources: Vec<PathBuf>,
    #[serde(default)]
    pub kotlin_sources: Vec<PathBuf>,
    /// Bundled source archives (`.srcjar`) whose contents join the unit.
    #[serde(default)]
    pub source_jars: Vec<PathBuf>,
    #[serde(default)]
    pub classpath: Vec<PathBuf>,
    /// Subset of `classpath` the unit declares directly.
    #[serde(default)]
    pub direct_dependencies: Vec<PathBuf>,
    #[serde(default)]
    pub processorpath: Vec<PathBuf>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Outputs {
    pub jar: PathBuf,
    pub srcjar: PathBuf,
    pub jdeps: PathBuf,
}

/// Which compiler a source file belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SourceKind {
    Kotlin,
    Java,
}

impl SourceKind {
    /// Classifies a path by extension. Anything that is neither `.kt` nor
    /// `.java` is not compilable and yields `None`.
    pub fn of(path: &Path) -> Option<Self> {
        match path.extension().and_then(|ext| ext.to_str()) {
            Some("kt") => Some(SourceKind::Kotlin),
            Some("java") => Some(SourceKind::Java),
            _ => None,
        }
    }
}

/// Predicate used when pulling sources out of archives or generated dirs.
pub fn is_jvm_source(path: &Path) -> bool {
    SourceKind::of(path).is_some()
}

impl CompilationTask {
    /// Returns a new task whose Java and Kotlin source lists are extended by
    /// `sources`, routed by file kind. Non-compilable paths are dropped; the
    /// relative order of the accepted paths is preserved.
    pub fn expand_with_sources<I>(&self, sources: I) -> CompilationTask
    where
        I: IntoIterator<Item = PathBuf>,
    {
        let mut expanded = self.clone();
        for source in sources {
            match SourceKind::of(&source) {
                Some(SourceKind::Kotlin) => expanded.inputs.kotlin_sources.push(source),
                Some(SourceKind::Java) => expanded.inputs.java_sources.push(source),
                None => {}
            }
        }
        expanded
    }

    /// Java then Kotlin sources, in declaration order.
    pub fn all_sources(&self) -> impl Iterator<Item = &PathBuf> {
        self.inputs
            .java_sources
            .iter()
            .chain(self.inputs.kotlin_sources.iter())
    }

    pub fn has_annotation_processors(&self) -> bool {
        !self.info.plugins.annotation_processors.is_empty()
    }

    /// Directory under `temp` that bundled source archives are unpacked into.
    pub fn source_jars_dir(&self) -> PathBuf {
        self.directories.temp.join(SOURCE_JARS_DIR)
    }
}

pub const SOURCE_JARS_DIR: &str = "_srcjars";
