//! Background task management
//!
//! Registers and supervises the engine's long-running tasks (job worker,
//! CDC consumer, periodic delay sweep). Tasks are wrapped to capture
//! panics, and shutdown cancels everything through one token with a
//! bounded wait.

use futures::FutureExt;
use std::fmt;
use std::panic::AssertUnwindSafe;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// Start/stop budget for the whole task set.
pub const SHUTDOWN_BUDGET: Duration = Duration::from_secs(15);

/// Task type
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskKind {
    /// Long-lived queue/stream worker
    Worker,
    /// External stream consumer
    Consumer,
    /// Interval-driven task
    Periodic,
}

impl fmt::Display for TaskKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TaskKind::Worker => write!(f, "Worker"),
            TaskKind::Consumer => write!(f, "Consumer"),
            TaskKind::Periodic => write!(f, "Periodic"),
        }
    }
}

struct RegisteredTask {
    name: &'static str,
    kind: TaskKind,
    handle: JoinHandle<()>,
}

/// Background task manager with a shared cancellation token.
pub struct BackgroundTasks {
    tasks: Vec<RegisteredTask>,
    shutdown: CancellationToken,
}

impl BackgroundTasks {
    pub fn new() -> Self {
        Self {
            tasks: Vec::new(),
            shutdown: CancellationToken::new(),
        }
    }

    /// Token for tasks that watch for shutdown themselves.
    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    /// Register and start a background task. Panics inside the task are
    /// caught and logged instead of tearing the process down.
    pub fn spawn<F>(&mut self, name: &'static str, kind: TaskKind, future: F)
    where
        F: std::future::Future<Output = ()> + Send + 'static,
    {
        let wrapped = async move {
            let result: Result<(), Box<dyn std::any::Any + Send>> =
                AssertUnwindSafe(future).catch_unwind().await;
            if let Err(panic_info) = result {
                let panic_msg: String = if let Some(s) = panic_info.downcast_ref::<&str>() {
                    (*s).to_string()
                } else if let Some(s) = panic_info.downcast_ref::<String>() {
                    s.clone()
                } else {
                    "Unknown panic".to_string()
                };
                tracing::error!(task = %name, kind = %kind, panic = %panic_msg,
                    "Background task panicked");
            }
        };
        let handle = tokio::spawn(wrapped);
        tracing::debug!(task = %name, kind = %kind, "Registered background task");
        self.tasks.push(RegisteredTask { name, kind, handle });
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    /// Graceful shutdown: cancel everything, then wait out the budget.
    pub async fn shutdown(self) {
        tracing::info!("Shutting down {} background tasks...", self.tasks.len());
        self.shutdown.cancel();

        let wait_all = async {
            for task in self.tasks {
                match task.handle.await {
                    Ok(()) => tracing::debug!(task = %task.name, "Task completed"),
                    Err(e) if e.is_cancelled() => {
                        tracing::debug!(task = %task.name, "Task cancelled")
                    }
                    Err(e) => tracing::error!(task = %task.name, error = ?e, "Task panicked"),
                }
            }
        };
        if tokio::time::timeout(SHUTDOWN_BUDGET, wait_all).await.is_err() {
            tracing::warn!("Shutdown budget exceeded; abandoning remaining tasks");
        } else {
            tracing::info!("All background tasks stopped");
        }
    }
}

impl Default for BackgroundTasks {
    fn default() -> Self {
        Self::new()
    }
}
