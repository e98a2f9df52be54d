//! Kotlin + Java compilation with deferred Kotlin failure.
//!
//! kotlinc runs first and its failure is held back; javac always runs next so
//! a single invocation reports diagnostics from both compilers. Once javac is
//! done, both diagnostic streams go to the sink and [`resolve`] picks the
//! error to surface: Kotlin's wins over Java's.

use tracing::warn;

use super::clock::StageClock;
use crate::model::CompilationTask;
use crate::traits::{JavaCompiler, KotlinCompiler, OutputSink, StageError};

/// What one compiler run left behind: its diagnostics, and its failure if any.
#[derive(Debug, Default)]
pub struct CompilerOutcome {
    pub diagnostics: Vec<String>,
    pub failure: Option<StageError>,
}

impl CompilerOutcome {
    /// Splits a compiler result into diagnostics and a payload-free failure.
    pub fn capture(result: Result<Vec<String>, StageError>) -> Self {
        match result {
            Ok(diagnostics) => Self {
                diagnostics,
                failure: None,
            },
            Err(mut err) => Self {
                diagnostics: err.take_diagnostics(),
                failure: Some(err),
            },
        }
    }
}

/// Picks the failure to report for a dual compilation: Kotlin's if present,
/// otherwise Java's.
pub fn resolve(kotlin: CompilerOutcome, java: CompilerOutcome) -> Result<(), StageError> {
    match (kotlin.failure, java.failure) {
        (Some(kotlin_err), java_err) => {
            if let Some(java_err) = java_err {
                warn!(error = %java_err, "javac also failed; reporting the kotlinc failure");
            }
            Err(kotlin_err)
        }
        (None, Some(java_err)) => Err(java_err),
        (None, None) => Ok(()),
    }
}

/// Runs kotlinc then javac under `clock` as stages `kotlinc` and `javac`.
pub fn compile_classes<K, J>(
    task: &CompilationTask,
    kotlin: &K,
    java: &J,
    sink: &dyn OutputSink,
    clock: &mut StageClock,
) -> Result<(), StageError>
where
    K: KotlinCompiler + ?Sized,
    J: JavaCompiler + ?Sized,
{
    let kotlin_outcome = clock.execute("kotlinc", || CompilerOutcome::capture(kotlin.compile(task)));
    if let Some(err) = &kotlin_outcome.failure {
        warn!(error = %err, "kotlinc failed; running javac before reporting");
    }

    let java_outcome = clock.execute("javac", || CompilerOutcome::capture(java.compile(task)));

    sink.deliver(&java_outcome.diagnostics);
    sink.deliver(&kotlin_outcome.diagnostics);

    resolve(kotlin_outcome, java_outcome)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::fixtures::task_in;
    use crate::sink::BufferedSink;
    use crate::traits::{CompilationError, ErrorKind, Tool};
    use std::path::Path;
    use std::sync::atomic::{AtomicBool, Ordering};

    struct Kotlinc(Result<Vec<String>, ()>);

    impl KotlinCompiler for Kotlinc {
        fn compile(&self, _task: &CompilationTask) -> Result<Vec<String>, StageError> {
            match &self.0 {
                Ok(lines) => Ok(lines.clone()),
                Err(()) => Err(CompilationError::new(
                    Tool::Kotlinc,
                    Some(1),
                    vec!["e: A.kt:3:1 unresolved reference".to_string()],
                )
                .into()),
            }
        }

        fn run_annotation_processors(
            &self,
            _task: &CompilationTask,
        ) -> Result<Vec<String>, StageError> {
            Ok(vec![])
        }
    }

    struct Javac {
        fail: bool,
        ran: AtomicBool,
    }

    impl Javac {
        fn new(fail: bool) -> Self {
            Self {
                fail,
                ran: AtomicBool::new(false),
            }
        }
    }

    impl JavaCompiler for Javac {
        fn compile(&self, _task: &CompilationTask) -> Result<Vec<String>, StageError> {
            self.ran.store(true, Ordering::SeqCst);
            if self.fail {
                Err(CompilationError::new(
                    Tool::Javac,
                    Some(1),
                    vec!["B.java:1: error: ';' expected".to_string()],
                )
                .into())
            } else {
                Ok(vec!["Note: B.java uses unchecked operations.".to_string()])
            }
        }
    }

    fn failed_tool(err: &StageError) -> Option<Tool> {
        match err {
            StageError::Compilation(c) => Some(c.tool),
            _ => None,
        }
    }

    fn run(kotlin: &Kotlinc, java: &Javac) -> (Result<(), StageError>, Vec<String>, StageClock) {
        let task = task_in(Path::new("/work"));
        let sink = BufferedSink::new();
        let mut clock = StageClock::new();
        let result = compile_classes(&task, kotlin, java, &sink, &mut clock);
        (result, sink.lines(), clock)
    }

    #[test]
    fn test_both_succeed() {
        let java = Javac::new(false);
        let (result, lines, clock) = run(&Kotlinc(Ok(vec!["w: unused".into()])), &java);

        assert!(result.is_ok());
        assert_eq!(
            lines,
            vec!["Note: B.java uses unchecked operations.", "w: unused"]
        );
        let names: Vec<_> = clock.timings().iter().map(|t| t.name.clone()).collect();
        assert_eq!(names, vec!["kotlinc", "javac"]);
    }

    #[test]
    fn test_kotlin_failure_still_runs_javac() {
        let java = Javac::new(false);
        let (result, lines, clock) = run(&Kotlinc(Err(())), &java);

        assert!(java.ran.load(Ordering::SeqCst));
        let err = result.unwrap_err();
        assert_eq!(failed_tool(&err), Some(Tool::Kotlinc));
        assert!(lines.contains(&"e: A.kt:3:1 unresolved reference".to_string()));
        assert_eq!(clock.timings().len(), 2);
    }

    #[test]
    fn test_java_failure_surfaces_with_kotlin_output_delivered() {
        let java = Javac::new(true);
        let (result, lines, _) = run(&Kotlinc(Ok(vec!["w: deprecated".into()])), &java);

        let err = result.unwrap_err();
        assert_eq!(failed_tool(&err), Some(Tool::Javac));
        assert_eq!(err.kind(), ErrorKind::Compilation);
        assert_eq!(
            lines,
            vec!["B.java:1: error: ';' expected", "w: deprecated"]
        );
    }

    #[test]
    fn test_kotlin_failure_wins_over_java_failure() {
        let java = Javac::new(true);
        let (result, lines, _) = run(&Kotlinc(Err(())), &java);

        assert_eq!(failed_tool(&result.unwrap_err()), Some(Tool::Kotlinc));
        assert_eq!(lines.len(), 2);
    }

    #[test]
    fn test_capture_strips_payload_from_failure() {
        let outcome = CompilerOutcome::capture(Err(CompilationError::new(
            Tool::Kotlinc,
            Some(2),
            vec!["e: x".into()],
        )
        .into()));

        assert_eq!(outcome.diagnostics, vec!["e: x"]);
        match outcome.failure {
            Some(StageError::Compilation(err)) => assert!(err.lines.is_empty()),
            other => panic!("unexpected failure: {other:?}"),
        }
    }

    #[test]
    fn test_resolve_priority() {
        let ok = || CompilerOutcome::default();
        let failed = |tool| CompilerOutcome {
            diagnostics: vec![],
            failure: Some(CompilationError::new(tool, Some(1), vec![]).into()),
        };

        assert!(resolve(ok(), ok()).is_ok());
        assert_eq!(
            failed_tool(&resolve(ok(), failed(Tool::Javac)).unwrap_err()),
            Some(Tool::Javac)
        );
        assert_eq!(
            failed_tool(&resolve(failed(Tool::Kotlinc), ok()).unwrap_err()),
            Some(Tool::Kotlinc)
        );
        assert_eq!(
            failed_tool(&resolve(failed(Tool::Kotlinc), failed(Tool::Javac)).unwrap_err()),
            Some(Tool::Kotlinc)
        );
    }
}
