use crate::traits::OutputSink;
use std::io::Write;
use std::sync::Mutex;

/// Writes diagnostics straight to stderr, one line per entry.
#[derive(Debug, Default, Clone, Copy)]
pub struct StderrSink;

impl OutputSink for StderrSink {
    fn deliver(&self, lines: &[String]) {
        let stderr = std::io::stderr();
        let mut out = stderr.lock();
        for line in lines {
            // Nothing sensible to do if stderr is gone.
            let _ = writeln!(out, "{line}");
        }
    }
}

/// Collects delivered diagnostics in memory, e.g. for a worker response.
#[derive(Debug, Default)]
pub struct BufferedSink {
    lines: Mutex<Vec<String>>,
}

impl BufferedSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of everything delivered so far, in delivery order.
    pub fn lines(&self) -> Vec<String> {
        self.lines
            .lock()
            .map(|lines| lines.clone())
            .unwrap_or_else(|poisoned| poisoned.into_inner().clone())
    }
}

impl OutputSink for BufferedSink {
    fn deliver(&self, lines: &[String]) {
        let mut guard = self.lines.lock().unwrap_or_else(|p| p.into_inner());
        guard.extend(lines.iter().cloned());
    }
}
