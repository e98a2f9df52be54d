//! Jar (zip) reading and writing: bundled source archive extraction, source
//! jar creation and class jar assembly.
//!
//! Every entry written here carries the DOS epoch (1980-01-01) as its
//! timestamp, so identical inputs always produce byte-identical jars.

use std::collections::{HashMap, HashSet};
use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};
use walkdir::WalkDir;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, DateTime, ZipArchive, ZipWriter};

use crate::model::CompilationTask;
use crate::traits::{JarAssembler, StageError};

const MANIFEST_PATH: &str = "META-INF/MANIFEST.MF";

fn entry_options() -> SimpleFileOptions {
    SimpleFileOptions::default()
        .compression_method(CompressionMethod::Deflated)
        .last_modified_time(DateTime::default())
        .unix_permissions(0o644)
}

fn archive_error(path: &Path, source: zip::result::ZipError) -> StageError {
    StageError::Archive {
        path: path.to_path_buf(),
        source,
    }
}

/// Converts a relative filesystem path into a `/`-separated jar entry name.
fn entry_name(relative: &Path) -> String {
    relative
        .components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}

// ============================================================================
// Source archive extraction
// ============================================================================

/// Unpacks matching entries of bundled source archives into `dest_dir`.
///
/// Add archives to [`SourceJarExtractor::jar_files`], call
/// [`SourceJarExtractor::execute`], then read the extracted paths from
/// [`SourceJarExtractor::sources`] in archive order, entry order.
pub struct SourceJarExtractor<P> {
    dest_dir: PathBuf,
    file_matcher: P,
    pub jar_files: Vec<PathBuf>,
    sources: Vec<PathBuf>,
}

impl<P> SourceJarExtractor<P>
where
    P: Fn(&Path) -> bool,
{
    pub fn new(dest_dir: impl Into<PathBuf>, file_matcher: P) -> Self {
        Self {
            dest_dir: dest_dir.into(),
            file_matcher,
            jar_files: Vec::new(),
            sources: Vec::new(),
        }
    }

    pub fn execute(&mut self) -> Result<(), StageError> {
        let mut seen: HashSet<PathBuf> = self.sources.iter().cloned().collect();

        for jar in &self.jar_files {
            let file = File::open(jar)
                .map_err(|e| StageError::io(format!("opening {}", jar.display()), e))?;
            let mut archive = ZipArchive::new(file).map_err(|e| archive_error(jar, e))?;

            for index in 0..archive.len() {
                let mut entry = archive.by_index(index).map_err(|e| archive_error(jar, e))?;
                if entry.is_dir() {
                    continue;
                }
                // Entries with `..` or absolute names would escape dest_dir.
                let Some(relative) = entry.enclosed_name().map(|p| p.to_path_buf()) else {
                    warn!(entry = entry.name(), jar = %jar.display(), "Skipping unsafe entry");
                    continue;
                };
                if !(self.file_matcher)(&relative) {
                    continue;
                }

                let target = self.dest_dir.join(&relative);
                if let Some(parent) = target.parent() {
                    std::fs::create_dir_all(parent)
                        .map_err(|e| StageError::io(format!("creating {}", parent.display()), e))?;
                }
                let mut out = File::create(&target)
                    .map_err(|e| StageError::io(format!("creating {}", target.display()), e))?;
                std::io::copy(&mut entry, &mut out)
                    .map_err(|e| StageError::io(format!("extracting {}", target.display()), e))?;

                if seen.insert(target.clone()) {
                    self.sources.push(target);
                } else {
                    warn!(entry = %relative.display(), jar = %jar.display(), "Duplicate source entry overwritten");
                }
            }
            debug!(jar = %jar.display(), "Extracted source archive");
        }
        Ok(())
    }

    pub fn sources(&self) -> &[PathBuf] {
        &self.sources
    }

    pub fn into_sources(self) -> Vec<PathBuf> {
        self.sources
    }
}

// ============================================================================
// Source jar creation
// ============================================================================

/// Writes a source jar laying each file out under its declared package.
pub struct SourceJarCreator {
    path: PathBuf,
    file: File,
    sources: Vec<PathBuf>,
}

impl SourceJarCreator {
    /// Creates the destination file. Fails if it already exists.
    pub fn create(path: impl Into<PathBuf>) -> Result<Self, StageError> {
        let path = path.into();
        let file = OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&path)
            .map_err(|e| StageError::io(format!("creating {}", path.display()), e))?;
        Ok(Self {
            path,
            file,
            sources: Vec::new(),
        })
    }

    pub fn add_sources<I>(&mut self, sources: I)
    where
        I: IntoIterator<Item = PathBuf>,
    {
        self.sources.extend(sources);
    }

    /// Writes every added source and finalizes the jar.
    ///
    /// A source whose entry path is already taken is skipped when its bytes
    /// match the entry written first, and rejected otherwise.
    pub fn execute(self) -> Result<(), StageError> {
        let mut zip = ZipWriter::new(BufWriter::new(self.file));
        let mut entries: HashMap<String, &PathBuf> = HashMap::new();

        for source in &self.sources {
            let content = std::fs::read(source)
                .map_err(|e| StageError::io(format!("reading {}", source.display()), e))?;
            let Some(file_name) = source.file_name() else {
                continue;
            };
            let file_name = file_name.to_string_lossy();
            let name = match package_of(&String::from_utf8_lossy(&content)) {
                Some(package) => format!("{}/{}", package.replace('.', "/"), file_name),
                None => file_name.into_owned(),
            };

            if let Some(first) = entries.get(&name) {
                let written = std::fs::read(first)
                    .map_err(|e| StageError::io(format!("reading {}", first.display()), e))?;
                if written != content {
                    return Err(StageError::ConflictingSourceEntry {
                        entry: name,
                        first: first.to_path_buf(),
                        second: source.clone(),
                    });
                }
                debug!(entry = %name, source = %source.display(), "Identical source jar entry skipped");
                continue;
            }

            zip.start_file(name.as_str(), entry_options())
                .map_err(|e| archive_error(&self.path, e))?;
            zip.write_all(&content)
                .map_err(|e| StageError::io(format!("writing {}", self.path.display()), e))?;
            entries.insert(name, source);
        }

        zip.finish()
            .map_err(|e| archive_error(&self.path, e))?
            .flush()
            .map_err(|e| StageError::io(format!("writing {}", self.path.display()), e))?;
        debug!(jar = %self.path.display(), entries = entries.len(), "Source jar written");
        Ok(())
    }
}

/// Extracts the `package` declaration from Kotlin or Java source text.
///
/// Only the file header is searched: blank lines, comments and annotations
/// (`@file:...`) may precede the declaration, and the first other line ends
/// the search.
pub fn package_of(source: &str) -> Option<String> {
    let mut in_block_comment = false;
    for line in source.lines() {
        let mut line = line.trim();
        loop {
            if in_block_comment {
                match line.find("*/") {
                    Some(end) => {
                        in_block_comment = false;
                        line = line[end + 2..].trim_start();
                    }
                    None => {
                        line = "";
                        break;
                    }
                }
            } else if let Some(rest) = line.strip_prefix("/*") {
                in_block_comment = true;
                line = rest;
            } else {
                break;
            }
        }
        if line.is_empty() || line.starts_with("//") || line.starts_with('@') {
            continue;
        }

        let rest = line.strip_prefix("package")?;
        if !rest.starts_with(char::is_whitespace) {
            return None;
        }
        let end = rest.find([';', '/']).unwrap_or(rest.len());
        let package = rest[..end].trim().replace('`', "");
        return (!package.is_empty()).then_some(package);
    }
    None
}

// ============================================================================
// Class jar assembly
// ============================================================================

/// Packs `classes` and `generated_classes` into the task's output jar.
#[derive(Debug, Default, Clone, Copy)]
pub struct ZipJarAssembler;

impl ZipJarAssembler {
    fn manifest(task: &CompilationTask) -> String {
        format!(
            "Manifest-Version: 1.0\r\nCreated-By: {} {}\r\nTarget-Label: {}\r\n\r\n",
            env!("CARGO_PKG_NAME"),
            env!("CARGO_PKG_VERSION"),
            task.info.label
        )
    }
}

impl JarAssembler for ZipJarAssembler {
    fn create_output_jar(&self, task: &CompilationTask) -> Result<(), StageError> {
        let jar_path = &task.outputs.jar;
        let file = File::create(jar_path)
            .map_err(|e| StageError::io(format!("creating {}", jar_path.display()), e))?;
        let mut zip = ZipWriter::new(BufWriter::new(file));
        let write_err = |e: std::io::Error| StageError::io(format!("writing {}", jar_path.display()), e);

        zip.add_directory("META-INF/", entry_options())
            .map_err(|e| archive_error(jar_path, e))?;
        zip.start_file(MANIFEST_PATH, entry_options())
            .map_err(|e| archive_error(jar_path, e))?;
        zip.write_all(Self::manifest(task).as_bytes())
            .map_err(write_err)?;

        let mut written: HashSet<String> = HashSet::new();
        written.insert("META-INF/".to_string());
        written.insert(MANIFEST_PATH.to_string());

        for root in [&task.directories.classes, &task.directories.generated_classes] {
            if !root.is_dir() {
                continue;
            }
            for entry in WalkDir::new(root).min_depth(1).sort_by_file_name() {
                let entry = entry.map_err(|e| {
                    StageError::io(format!("walking {}", root.display()), e.into())
                })?;
                let relative = entry.path().strip_prefix(root).map_err(|e| {
                    StageError::InternalConsistency(format!(
                        "{} escaped {}: {e}",
                        entry.path().display(),
                        root.display()
                    ))
                })?;
                let mut name = entry_name(relative);
                if entry.file_type().is_dir() {
                    name.push('/');
                }
                if !written.insert(name.clone()) {
                    continue;
                }

                if entry.file_type().is_dir() {
                    zip.add_directory(name, entry_options())
                        .map_err(|e| archive_error(jar_path, e))?;
                } else if entry.file_type().is_file() {
                    let content = std::fs::read(entry.path()).map_err(|e| {
                        StageError::io(format!("reading {}", entry.path().display()), e)
                    })?;
                    zip.start_file(name, entry_options())
                        .map_err(|e| archive_error(jar_path, e))?;
                    zip.write_all(&content).map_err(write_err)?;
                }
            }
        }

        zip.finish()
            .map_err(|e| archive_error(jar_path, e))?
            .flush()
            .map_err(write_err)?;
        debug!(jar = %jar_path.display(), entries = written.len(), "Class jar written");
        Ok(())
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;

    /// Writes a zip at `path` holding `entries` as (name, content) pairs.
    pub fn write_zip(path: &Path, entries: &[(&str, &str)]) {
        let mut zip = ZipWriter::new(File::create(path).unwrap());
        for (name, content) in entries {
            zip.start_file(*name, SimpleFileOptions::default()).unwrap();
            zip.write_all(content.as_bytes()).unwrap();
        }
        zip.finish().unwrap();
    }

    /// Entry names of the zip at `path`, in archive order.
    pub fn entry_names(path: &Path) -> Vec<String> {
        let mut archive = ZipArchive::new(File::open(path).unwrap()).unwrap();
        (0..archive.len())
            .map(|i| archive.by_index(i).unwrap().name().to_string())
            .collect()
    }
}
