//! Progress events of directory ingestion.
//!
//! A batch read emits one phase wrapping one task with a step per file. Files that
//! are skipped additionally produce a [`Progress::FileSkipped`] event so a front end
//! can surface them while the batch is still running.

use std::path::PathBuf;

#[derive(Debug, Clone, PartialEq)]
pub enum Progress {
    PhaseStart { name: &'static str },
    PhaseFinish,

    TaskStart { total_steps: u64 },
    TaskIncrement,
    TaskFinish,

    /// A file of the batch could not be ingested; `detail` is the error message.
    FileSkipped { path: PathBuf, detail: String },
}

pub type ProgressCallback<'a> = Box<dyn Fn(Progress) + Send + Sync + 'a>;

/// Forwards [`Progress`] events to an optional callback. A reporter without a
/// callback discards every event.
#[derive(Default)]
pub struct ProgressReporter<'a> {
    callback: Option<ProgressCallback<'a>>,
}

impl<'a> ProgressReporter<'a> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_callback(callback: ProgressCallback<'a>) -> Self {
        Self {
            callback: Some(callback),
        }
    }

    /// Whether events are discarded. Lets callers skip building costly events.
    pub fn is_silent(&self) -> bool {
        self.callback.is_none()
    }

    #[inline]
    pub fn report(&self, event: Progress) {
        if let Some(cb) = &self.callback {
            cb(event);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[test]
    fn reporter_forwards_events_to_callback() {
        let events = Mutex::new(Vec::new());
        let reporter = ProgressReporter::with_callback(Box::new(|e| {
            events.lock().unwrap().push(e);
        }));
        assert!(!reporter.is_silent());
        reporter.report(Progress::TaskStart { total_steps: 2 });
        reporter.report(Progress::FileSkipped {
            path: PathBuf::from("a.log"),
            detail: "truncated".to_string(),
        });
        drop(reporter);
        assert_eq!(
            events.into_inner().unwrap(),
            vec![
                Progress::TaskStart { total_steps: 2 },
                Progress::FileSkipped {
                    path: PathBuf::from("a.log"),
                    detail: "truncated".to_string(),
                },
            ]
        );
    }

    #[test]
    fn silent_reporter_ignores_events() {
        let reporter = ProgressReporter::new();
        assert!(reporter.is_silent());
        reporter.report(Progress::TaskIncrement);
    }
}
