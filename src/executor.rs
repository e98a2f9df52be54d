use crate::compile::{JvmCompilationPipeline, PipelineError, PipelineResult};
use crate::model::CompilationTask;
use crate::traits::{DependencyReporter, JarAssembler, JavaCompiler, KotlinCompiler};
use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use tokio::sync::Semaphore;
use tracing::{info, instrument};

/// Runs compilation units for a long-lived worker, a bounded number at a time.
///
/// Each unit runs on the blocking pool. Two in-flight units may not share a
/// temp directory; the second is rejected with
/// [`PipelineError::ConcurrentTempDir`].
pub struct CompilationExecutor {
    semaphore: Arc<Semaphore>,
    active_temp_dirs: Arc<Mutex<HashSet<PathBuf>>>,
}

/// Holds a temp directory for the duration of one run.
struct TempDirClaim {
    dir: PathBuf,
    active: Arc<Mutex<HashSet<PathBuf>>>,
}

impl TempDirClaim {
    fn acquire(active: &Arc<Mutex<HashSet<PathBuf>>>, dir: PathBuf) -> Result<Self, PipelineError> {
        let mut dirs = active.lock().unwrap_or_else(|p| p.into_inner());
        if !dirs.insert(dir.clone()) {
            return Err(PipelineError::ConcurrentTempDir(dir));
        }
        Ok(Self {
            dir,
            active: Arc::clone(active),
        })
    }
}

impl Drop for TempDirClaim {
    fn drop(&mut self) {
        let mut dirs = self.active.lock().unwrap_or_else(|p| p.into_inner());
        dirs.remove(&self.dir);
    }
}

impl CompilationExecutor {
    pub fn new(concurrency_limit: usize) -> Self {
        Self {
            semaphore: Arc::new(Semaphore::new(concurrency_limit)),
            active_temp_dirs: Arc::default(),
        }
    }

    #[instrument(skip(self, pipeline, task), fields(label = %task.info.label))]
    pub async fn execute<K, J, A, D>(
        &self,
        pipeline: Arc<JvmCompilationPipeline<K, J, A, D>>,
        task: CompilationTask,
    ) -> Result<PipelineResult, PipelineError>
    where
        K: KotlinCompiler + 'static,
        J: JavaCompiler + 'static,
        A: JarAssembler + 'static,
        D: DependencyReporter + 'static,
    {
        let _claim = TempDirClaim::acquire(&self.active_temp_dirs, task.directories.temp.clone())?;

        let _permit = self
            .semaphore
            .acquire()
            .await
            .map_err(|e| PipelineError::Join(format!("Semaphore error: {}", e)))?;

        info!("Starting compilation");

        let result = tokio::task::spawn_blocking(move || pipeline.execute(task))
            .await
            .map_err(|e| PipelineError::Join(format!("Task join error: {}", e)))?;

        info!(success = result.is_ok(), "Finished compilation");
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::fixtures::task_in;
    use crate::sink::BufferedSink;
    use crate::traits::{OutputSink, StageError};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;
    use tempfile::TempDir;

    /// Kotlin compiler that records peak concurrency while it sleeps.
    #[derive(Default)]
    struct SlowKotlinc {
        running: AtomicUsize,
        peak: AtomicUsize,
    }

    impl KotlinCompiler for SlowKotlinc {
        fn compile(&self, _task: &CompilationTask) -> Result<Vec<String>, StageError> {
            let now = self.running.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(now, Ordering::SeqCst);
            std::thread::sleep(Duration::from_millis(100));
            self.running.fetch_sub(1, Ordering::SeqCst);
            Ok(vec![])
        }

        fn run_annotation_processors(
            &self,
            _task: &CompilationTask,
        ) -> Result<Vec<String>, StageError> {
            Ok(vec![])
        }
    }

    struct NoopJavac;

    impl JavaCompiler for NoopJavac {
        fn compile(&self, _task: &CompilationTask) -> Result<Vec<String>, StageError> {
            Ok(vec![])
        }
    }

    struct NoopJar;

    impl JarAssembler for NoopJar {
        fn create_output_jar(&self, _task: &CompilationTask) -> Result<(), StageError> {
            Ok(())
        }
    }

    struct NoopJdeps;

    impl DependencyReporter for NoopJdeps {
        fn generate_jdeps(&self, _task: &CompilationTask) -> Result<(), StageError> {
            Ok(())
        }
    }

    type SlowPipeline = JvmCompilationPipeline<SlowKotlinc, NoopJavac, NoopJar, NoopJdeps>;

    fn pipeline() -> Arc<SlowPipeline> {
        let sink: Arc<dyn OutputSink> = Arc::new(BufferedSink::new());
        Arc::new(
            JvmCompilationPipeline::new(SlowKotlinc::default(), NoopJavac, NoopJar, NoopJdeps)
                .with_sink(sink),
        )
    }

    #[tokio::test]
    async fn test_executor_runs_pipeline() {
        let temp = TempDir::new().unwrap();
        let executor = CompilationExecutor::new(2);

        let result = executor.execute(pipeline(), task_in(temp.path())).await.unwrap();

        assert_eq!(result.timings.len(), 5);
    }

    #[tokio::test]
    async fn test_executor_respects_concurrency_limit() {
        let roots: Vec<TempDir> = (0..4).map(|_| TempDir::new().unwrap()).collect();
        let executor = Arc::new(CompilationExecutor::new(1));
        let pipeline = pipeline();

        let handles: Vec<_> = roots
            .iter()
            .map(|root| {
                let executor = Arc::clone(&executor);
                let pipeline = Arc::clone(&pipeline);
                let task = task_in(root.path());
                tokio::spawn(async move { executor.execute(pipeline, task).await })
            })
            .collect();
        for handle in handles {
            handle.await.unwrap().unwrap();
        }

        assert_eq!(pipeline.kotlin().peak.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_executor_rejects_shared_temp_dir() {
        let temp = TempDir::new().unwrap();
        let executor = Arc::new(CompilationExecutor::new(2));
        let pipeline = pipeline();

        let first = {
            let executor = Arc::clone(&executor);
            let pipeline = Arc::clone(&pipeline);
            let task = task_in(temp.path());
            tokio::spawn(async move { executor.execute(pipeline, task).await })
        };
        // Let the first run claim the directory and enter kotlinc.
        tokio::time::sleep(Duration::from_millis(10)).await;

        let second = executor.execute(Arc::clone(&pipeline), task_in(temp.path())).await;

        assert!(matches!(second, Err(PipelineError::ConcurrentTempDir(_))));
        first.await.unwrap().unwrap();

        // Released once the first run is done.
        std::fs::remove_file(temp.path().join("lib-sources.jar")).unwrap();
        assert!(executor.execute(pipeline, task_in(temp.path())).await.is_ok());
    }
}
