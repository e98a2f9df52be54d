//! Concrete collaborators backed by the JDK/Kotlin command line tools and
//! zip I/O.
//!
//! - `kotlinc` - Kotlin compilation and kapt annotation processing
//! - `javac` - Java compilation
//! - `jdeps` - dependency report generation
//! - `jar` - source archive extraction, source jar and class jar writing

pub mod jar;
pub mod javac;
pub mod jdeps;
pub mod kotlinc;
pub mod process;

pub use jar::{SourceJarCreator, SourceJarExtractor, ZipJarAssembler};
pub use javac::JavacInvoker;
pub use jdeps::{Dependency, DependencyKind, DependencyReport, JdepsReporter};
pub use kotlinc::KotlincInvoker;
pub use process::{CommandSpec, ProcessOutput};
