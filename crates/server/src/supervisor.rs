use std::future::Future;

use anyhow::Result;
use tokio::signal;
use tokio::task::{JoinError, JoinSet};
use tokio_util::sync::CancellationToken;

type TaskOutcome = std::result::Result<(&'static str, Result<()>), JoinError>;

/// Owns the long-running tasks of the server process.
///
/// Every task receives a child of one shutdown token. SIGINT, SIGTERM or the
/// first task failure cancels it; [`Supervisor::run`] then waits for the rest
/// to drain and returns the first error seen.
pub struct Supervisor {
    shutdown: CancellationToken,
    tasks: JoinSet<(&'static str, Result<()>)>,
    first_err: Option<anyhow::Error>,
}

impl Default for Supervisor {
    fn default() -> Self {
        Self::new()
    }
}

impl Supervisor {
    pub fn new() -> Self {
        Self {
            shutdown: CancellationToken::new(),
            tasks: JoinSet::new(),
            first_err: None,
        }
    }

    pub fn spawn<F, Fut>(&mut self, name: &'static str, factory: F)
    where
        F: FnOnce(CancellationToken) -> Fut + Send + 'static,
        Fut: Future<Output = Result<()>> + Send + 'static,
    {
        let token = self.shutdown.child_token();
        self.tasks.spawn(async move { (name, factory(token).await) });
    }

    pub async fn run(mut self) -> Result<()> {
        while !self.tasks.is_empty() {
            tokio::select! {
                Some(outcome) = self.tasks.join_next() => self.record(outcome),
                signal = shutdown_signal(), if !self.shutdown.is_cancelled() => {
                    tracing::info!(%signal, "shutdown requested");
                    self.shutdown.cancel();
                }
            }
        }

        match self.first_err {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    fn record(&mut self, outcome: TaskOutcome) {
        let err = match outcome {
            Ok((task, Ok(()))) => {
                tracing::info!(task, "task finished");
                return;
            }
            Ok((task, Err(err))) => {
                tracing::error!(task, error = %err, "task failed");
                err
            }
            Err(join_err) => {
                tracing::error!(error = ?join_err, "task panicked");
                join_err.into()
            }
        };

        self.first_err.get_or_insert(err);
        if !self.shutdown.is_cancelled() {
            tracing::warn!("stopping remaining tasks");
            self.shutdown.cancel();
        }
    }
}

async fn shutdown_signal() -> &'static str {
    #[cfg(unix)]
    {
        let mut terminate = match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(stream) => stream,
            Err(err) => {
                tracing::warn!(error = %err, "SIGTERM handler unavailable");
                let _ = signal::ctrl_c().await;
                return "SIGINT";
            }
        };
        tokio::select! {
            _ = signal::ctrl_c() => "SIGINT",
            _ = terminate.recv() => "SIGTERM",
        }
    }

    #[cfg(not(unix))]
    {
        let _ = signal::ctrl_c().await;
        "SIGINT"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn failure_cancels_siblings() {
        let mut supervisor = Supervisor::new();
        supervisor.spawn("waits", |shutdown| async move {
            shutdown.cancelled().await;
            Ok(())
        });
        supervisor.spawn("fails", |_| async { anyhow::bail!("boom") });

        let err = supervisor.run().await.unwrap_err();
        assert_eq!(err.to_string(), "boom");
    }

    #[tokio::test]
    async fn first_error_wins() {
        let mut supervisor = Supervisor::new();
        supervisor.spawn("first", |_| async { anyhow::bail!("first") });
        supervisor.spawn("second", |shutdown| async move {
            shutdown.cancelled().await;
            anyhow::bail!("second")
        });

        let err = supervisor.run().await.unwrap_err();
        assert_eq!(err.to_string(), "first");
    }

    #[tokio::test]
    async fn clean_exit_is_ok() {
        let mut supervisor = Supervisor::new();
        supervisor.spawn("done", |_| async { Ok(()) });
        assert!(supervisor.run().await.is_ok());
    }
}
