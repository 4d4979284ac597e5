//! Process-wide fault boundary.
//!
//! Every long-running task is spawned through the [`Supervisor`], and every
//! component that can hit a non-local fault holds a [`FaultSink`]. The
//! supervisor sees task errors, task panics and reported faults in one place
//! and makes a single decision: keep running or shut down.

use std::any::Any;
use std::future::Future;
use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::task::{JoinError, JoinSet};

use crate::error::{McpError, Result};

/// What to do after a fault.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    /// Log it and keep serving.
    Continue,
    /// Terminate the process with a non-zero status.
    Shutdown,
}

/// Framing faults are transport noise; everything else is fatal.
pub fn classify(fault: &McpError) -> Disposition {
    if fault.is_framing() {
        Disposition::Continue
    } else {
        Disposition::Shutdown
    }
}

/// External diagnostics collaborator told about fatal faults.
pub trait FaultReporter: Send + Sync {
    /// Record a fatal fault before the process exits.
    fn report(&self, event: &str, message: &str);
}

/// Handle for reporting faults that do not end a task.
#[derive(Debug, Clone)]
pub struct FaultSink {
    tx: mpsc::UnboundedSender<McpError>,
}

impl FaultSink {
    /// Hand a fault to the supervisor.
    pub fn report(&self, fault: McpError) {
        if let Err(e) = self.tx.send(fault) {
            tracing::error!("Fault raised after supervisor shut down: {}", e.0);
        }
    }

    /// A sink not attached to any supervisor, with the receiving end.
    #[cfg(test)]
    pub(crate) fn detached() -> (Self, mpsc::UnboundedReceiver<McpError>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

/// Top of the task hierarchy.
pub struct Supervisor {
    tasks: JoinSet<Result<()>>,
    rx: mpsc::UnboundedReceiver<McpError>,
    sink: FaultSink,
    reporter: Option<Arc<dyn FaultReporter>>,
}

impl Supervisor {
    /// A supervisor with no tasks and no reporter.
    pub fn new() -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self {
            tasks: JoinSet::new(),
            rx,
            sink: FaultSink { tx },
            reporter: None,
        }
    }

    /// Forward fatal faults to `reporter` as well as the log.
    pub fn with_reporter(mut self, reporter: Arc<dyn FaultReporter>) -> Self {
        self.reporter = Some(reporter);
        self
    }

    /// A sink feeding this supervisor.
    pub fn sink(&self) -> FaultSink {
        self.sink.clone()
    }

    /// Run `task` under supervision.
    pub fn spawn<F>(&mut self, task: F)
    where
        F: Future<Output = Result<()>> + Send + 'static,
    {
        self.tasks.spawn(task);
    }

    /// Wait until every task finishes or a fatal fault arrives.
    ///
    /// Returns the fatal fault, if any. Remaining tasks are aborted when the
    /// supervisor is dropped.
    pub async fn run(mut self) -> Result<()> {
        loop {
            tokio::select! {
                Some(fault) = self.rx.recv() => {
                    self.handle(fault, "run_server_unhandled_rejection")?;
                }
                joined = self.tasks.join_next() => match joined {
                    None => break,
                    Some(Ok(Ok(()))) => {}
                    Some(Ok(Err(fault))) => self.handle(fault, "run_server_task_failed")?,
                    Some(Err(join_err)) => {
                        self.handle(join_fault(join_err), "run_server_uncaught_exception")?
                    }
                },
            }
        }

        while let Ok(fault) = self.rx.try_recv() {
            self.handle(fault, "run_server_unhandled_rejection")?;
        }
        Ok(())
    }

    fn handle(&self, fault: McpError, event: &str) -> Result<()> {
        match classify(&fault) {
            Disposition::Continue => {
                tracing::error!("JSON parsing error: {}", fault);
                Ok(())
            }
            Disposition::Shutdown => {
                tracing::error!("Uncaught fault: {}", fault);
                if let Some(reporter) = &self.reporter {
                    reporter.report(event, &fault.to_string());
                }
                Err(fault)
            }
        }
    }
}

impl Default for Supervisor {
    fn default() -> Self {
        Self::new()
    }
}

fn join_fault(err: JoinError) -> McpError {
    if err.is_panic() {
        McpError::Fatal(format!("task panicked: {}", panic_message(&*err.into_panic())))
    } else {
        McpError::Fatal(format!("task cancelled: {}", err))
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}

/// Route panics on any thread through `tracing` before unwinding.
pub fn install_panic_hook() {
    std::panic::set_hook(Box::new(|info| {
        let location = info
            .location()
            .map(|l| format!("{}:{}", l.file(), l.line()))
            .unwrap_or_else(|| "unknown location".to_string());
        tracing::error!(
            "Uncaught exception at {}: {}",
            location,
            panic_message(info.payload())
        );
    }));
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[derive(Default)]
    struct RecordingReporter {
        events: Mutex<Vec<(String, String)>>,
    }

    impl FaultReporter for RecordingReporter {
        fn report(&self, event: &str, message: &str) {
            self.events
                .lock()
                .unwrap()
                .push((event.to_string(), message.to_string()));
        }
    }

    #[test]
    fn test_classify() {
        assert_eq!(
            classify(&McpError::FramingFault("bad".to_string())),
            Disposition::Continue
        );
        assert_eq!(
            classify(&McpError::Io("closed".to_string())),
            Disposition::Shutdown
        );
    }

    #[tokio::test]
    async fn test_clean_tasks_finish_ok() {
        let mut supervisor = Supervisor::new();
        supervisor.spawn(async { Ok(()) });
        supervisor.spawn(async { Ok(()) });
        assert!(supervisor.run().await.is_ok());
    }

    #[tokio::test]
    async fn test_framing_faults_are_swallowed() {
        let mut supervisor = Supervisor::new();
        let sink = supervisor.sink();
        supervisor.spawn(async move {
            sink.report(McpError::FramingFault("Unexpected token".to_string()));
            Ok(())
        });
        assert!(supervisor.run().await.is_ok());
    }

    #[tokio::test]
    async fn test_task_error_is_fatal_and_reported() {
        let reporter = Arc::new(RecordingReporter::default());
        let mut supervisor = Supervisor::new().with_reporter(reporter.clone());
        supervisor.spawn(async { Err(McpError::Io("stdout closed".to_string())) });

        let err = supervisor.run().await.unwrap_err();
        assert_eq!(err, McpError::Io("stdout closed".to_string()));
        let events = reporter.events.lock().unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].0, "run_server_task_failed");
    }

    #[tokio::test]
    async fn test_reported_fatal_fault_stops_supervision() {
        let mut supervisor = Supervisor::new();
        let sink = supervisor.sink();
        supervisor.spawn(async move {
            sink.report(McpError::Fatal("boom".to_string()));
            std::future::pending::<()>().await;
            Ok(())
        });
        let err = supervisor.run().await.unwrap_err();
        assert_eq!(err, McpError::Fatal("boom".to_string()));
    }

    #[tokio::test]
    async fn test_panicking_task_is_fatal() {
        let mut supervisor = Supervisor::new();
        supervisor.spawn(async {
            if true {
                panic!("kaboom");
            }
            Ok(())
        });
        let err = supervisor.run().await.unwrap_err();
        assert!(matches!(err, McpError::Fatal(ref m) if m.contains("kaboom")));
    }
}
