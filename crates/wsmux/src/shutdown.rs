//! Graceful shutdown coordination.
//!
//! A [`Coordinator`] owns a cancellation token that long-running work selects
//! on, records why shutdown started, and runs registered cleanup actions in
//! reverse registration order under a grace-period deadline.

use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex, OnceLock, PoisonError};
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Default time allowed for cleanup actions.
pub const DEFAULT_GRACE_PERIOD: Duration = Duration::from_secs(5);

type CleanupFuture = Pin<Box<dyn Future<Output = Result<(), String>> + Send>>;
type CleanupAction = Box<dyn FnOnce() -> CleanupFuture + Send>;
type ShutdownHook = Box<dyn Fn(&str) + Send + Sync>;

/// Outcome of [`Coordinator::run_cleanups`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CleanupReport {
    /// Actions that finished successfully, in the order they ran.
    pub completed: Vec<String>,
    /// Actions that returned an error or were cut off by the deadline.
    pub failed: Vec<(String, String)>,
    /// Actions never started because the deadline had passed.
    pub skipped: Vec<String>,
}

impl CleanupReport {
    /// Returns true if every action completed.
    pub fn is_clean(&self) -> bool {
        self.failed.is_empty() && self.skipped.is_empty()
    }
}

/// Coordinates shutdown for a process built around a multiplexer.
pub struct Coordinator {
    token: CancellationToken,
    grace_period: Duration,
    reason: OnceLock<String>,
    on_shutdown: Option<ShutdownHook>,
    cleanups: Mutex<Vec<(String, CleanupAction)>>,
}

impl Coordinator {
    pub fn new(grace_period: Duration) -> Self {
        Self {
            token: CancellationToken::new(),
            grace_period,
            reason: OnceLock::new(),
            on_shutdown: None,
            cleanups: Mutex::new(Vec::new()),
        }
    }

    /// Install a hook invoked once, with the reason, when shutdown starts.
    pub fn with_on_shutdown<F>(mut self, hook: F) -> Self
    where
        F: Fn(&str) + Send + Sync + 'static,
    {
        self.on_shutdown = Some(Box::new(hook));
        self
    }

    /// Token raised when shutdown starts.
    pub fn token(&self) -> CancellationToken {
        self.token.clone()
    }

    pub fn is_shutting_down(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Why shutdown started, if it has.
    pub fn reason(&self) -> Option<&str> {
        self.reason.get().map(String::as_str)
    }

    pub fn grace_period(&self) -> Duration {
        self.grace_period
    }

    /// Register a cleanup action. Actions run in reverse registration order.
    pub fn register<F, Fut, E>(&self, name: impl Into<String>, cleanup: F)
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = Result<(), E>> + Send + 'static,
        E: fmt::Display + 'static,
    {
        self.cleanups
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push((name.into(), boxed_cleanup(cleanup)));
    }

    /// Start shutdown. Only the first call records `reason`, raises the
    /// token and runs the hook; returns whether this call did so.
    pub fn shutdown(&self, reason: impl Into<String>) -> bool {
        if self.reason.set(reason.into()).is_err() {
            return false;
        }
        let reason = self.reason().unwrap_or_default();
        info!(reason, "shutdown initiated");
        self.token.cancel();
        if let Some(hook) = &self.on_shutdown {
            hook(reason);
        }
        true
    }

    /// Run every registered cleanup once, newest first, within the grace period.
    pub async fn run_cleanups(&self) -> CleanupReport {
        let actions = std::mem::take(
            &mut *self
                .cleanups
                .lock()
                .unwrap_or_else(PoisonError::into_inner),
        );
        let deadline = Instant::now() + self.grace_period;
        let mut report = CleanupReport::default();

        for (name, action) in actions.into_iter().rev() {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                warn!(action = %name, "cleanup skipped, grace period exhausted");
                report.skipped.push(name);
                continue;
            }

            match tokio::time::timeout(remaining, action()).await {
                Ok(Ok(())) => {
                    debug!(action = %name, "cleanup completed");
                    report.completed.push(name);
                }
                Ok(Err(err)) => {
                    warn!(action = %name, error = %err, "cleanup failed");
                    report.failed.push((name, err));
                }
                Err(_) => {
                    warn!(action = %name, "cleanup exceeded grace period");
                    report.failed.push((name, "grace period exceeded".to_string()));
                }
            }
        }

        report
    }

    /// Trigger shutdown on Ctrl-C (and SIGTERM on Unix).
    ///
    /// A second signal after shutdown has started exits the process with
    /// status 130.
    pub fn listen_for_signals(self: &Arc<Self>) -> JoinHandle<()> {
        let coordinator = Arc::clone(self);
        tokio::spawn(async move {
            let Some(signal) = next_signal().await else {
                return;
            };
            coordinator.shutdown(format!("received {signal}"));

            if next_signal().await.is_some() {
                warn!("second signal received, exiting immediately");
                std::process::exit(130);
            }
        })
    }
}

impl Default for Coordinator {
    fn default() -> Self {
        Self::new(DEFAULT_GRACE_PERIOD)
    }
}

impl fmt::Debug for Coordinator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let pending = self
            .cleanups
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len();
        f.debug_struct("Coordinator")
            .field("grace_period", &self.grace_period)
            .field("reason", &self.reason())
            .field("pending_cleanups", &pending)
            .finish()
    }
}

fn boxed_cleanup<F, Fut, E>(cleanup: F) -> CleanupAction
where
    F: FnOnce() -> Fut + Send + 'static,
    Fut: Future<Output = Result<(), E>> + Send + 'static,
    E: fmt::Display + 'static,
{
    Box::new(move || -> CleanupFuture {
        let fut = cleanup();
        Box::pin(async move { fut.await.map_err(|err| err.to_string()) })
    })
}

#[cfg(unix)]
async fn next_signal() -> Option<&'static str> {
    use tokio::signal::unix::{signal, SignalKind};

    let mut terminate = match signal(SignalKind::terminate()) {
        Ok(terminate) => terminate,
        Err(err) => {
            warn!(error = %err, "failed to install SIGTERM handler");
            return tokio::signal::ctrl_c().await.ok().map(|()| "SIGINT");
        }
    };
    tokio::select! {
        result = tokio::signal::ctrl_c() => result.ok().map(|()| "SIGINT"),
        _ = terminate.recv() => Some("SIGTERM"),
    }
}

#[cfg(not(unix))]
async fn next_signal() -> Option<&'static str> {
    tokio::signal::ctrl_c().await.ok().map(|()| "Ctrl-C")
}
