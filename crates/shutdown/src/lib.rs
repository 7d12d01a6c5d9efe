//! Ordered teardown coordination.
//!
//! A [`Shutdown`] holds a LIFO stack of registered [`closer`]s. [`Shutdown::wait`]
//! blocks until either an OS termination signal (SIGINT/SIGTERM) arrives or
//! [`Shutdown::stop`] is called explicitly, then pops closers one at a time,
//! newest first, giving each `close_timeout` to finish on its own and a
//! further `cancel_timeout` grace period after it's asked (via a
//! [`CancellationToken`]) to cut things short. A closer that blows through
//! both budgets is abandoned and reported through the configured `react`
//! handler rather than blocking the rest of the stack.
//!
//! Four closer shapes are supported via free-standing adapters in
//! [`closer`], rather than the four separate function-type overloads this
//! was ported from — Rust has no type-switch to dispatch on at registration
//! time, so the adapters normalize eagerly into one boxed shape instead.

use std::future::Future;
use std::pin::Pin;
use std::process;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use tokio::sync::{Mutex, Notify};
use tokio_util::sync::CancellationToken;

/// Default budget given to a closer to finish on its own.
pub const DEFAULT_CLOSE_TIMEOUT: Duration = Duration::from_secs(1);
/// Grace period given to a closer after it has been asked to cancel.
pub const DEFAULT_CANCEL_TIMEOUT: Duration = Duration::from_millis(200);

pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;
type CloseFuture = Pin<Box<dyn Future<Output = Result<(), BoxError>> + Send>>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("closer did not finish within its close or cancel budget")]
    Timeout,
}

/// A single registered teardown action, normalized to one shape regardless
/// of which [`closer`] adapter built it.
pub struct Closer {
    name: &'static str,
    close_timeout: Duration,
    cancel_timeout: Duration,
    run: Box<dyn FnOnce(CancellationToken) -> CloseFuture + Send>,
}

impl Closer {
    /// Overrides the default close timeout for this closer.
    pub fn with_close_timeout(mut self, d: Duration) -> Self {
        self.close_timeout = d;
        self
    }

    /// Overrides the default cancel timeout for this closer.
    pub fn with_cancel_timeout(mut self, d: Duration) -> Self {
        self.cancel_timeout = d;
        self
    }

    /// Attaches a name used in `react` diagnostics. Defaults to `"closer"`.
    pub fn named(mut self, name: &'static str) -> Self {
        self.name = name;
        self
    }
}

/// Constructors adapting the four closer shapes this was ported from
/// (`func()`, `func() error`, `func(ctx)`, `func(ctx) error`) into one
/// normalized [`Closer`].
pub mod closer {
    use super::*;

    /// From a plain async action that cannot fail and ignores cancellation.
    pub fn from_infallible<F, Fut>(f: F) -> Closer
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        from_cancellable_fallible(move |_token| async move {
            f().await;
            Ok(())
        })
    }

    /// From an async action that can fail but ignores cancellation.
    pub fn from_fallible<F, Fut, E>(f: F) -> Closer
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = Result<(), E>> + Send + 'static,
        E: Into<BoxError>,
    {
        from_cancellable_fallible(move |_token| f())
    }

    /// From an async action that reacts to cancellation but cannot fail.
    pub fn from_cancellable<F, Fut>(f: F) -> Closer
    where
        F: FnOnce(CancellationToken) -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        from_cancellable_fallible(move |token| async move {
            f(token).await;
            Ok(())
        })
    }

    /// From an async action that both reacts to cancellation and can fail.
    /// The other three adapters all funnel through this one.
    pub fn from_cancellable_fallible<F, Fut, E>(f: F) -> Closer
    where
        F: FnOnce(CancellationToken) -> Fut + Send + 'static,
        Fut: Future<Output = Result<(), E>> + Send + 'static,
        E: Into<BoxError>,
    {
        Closer {
            name: "closer",
            close_timeout: DEFAULT_CLOSE_TIMEOUT,
            cancel_timeout: DEFAULT_CANCEL_TIMEOUT,
            run: Box::new(move |token| Box::pin(async move { f(token).await.map_err(Into::into) })),
        }
    }
}

/// Reaction to a closer's failure, timeout, or an explicit [`Shutdown::stop`]
/// cause. Defaults to logging via `tracing::error!`.
pub type React = Box<dyn Fn(&str, BoxError) + Send + Sync>;

fn default_react() -> React {
    Box::new(|name, err| tracing::error!(closer = name, error = %err, "closer failed"))
}

/// Coordinates ordered teardown of registered [`Closer`]s.
///
/// Lifecycle: `running` (before [`Shutdown::wait`] is called, or while it is
/// blocked waiting for a trigger) → `stopping` (triggered by a signal or
/// [`Shutdown::stop`], closers draining LIFO) → `drained` (all closers have
/// run, `wait` returns). [`Shutdown::done`] is `true` throughout `stopping`.
pub struct Shutdown {
    closers: Mutex<Vec<Closer>>,
    react: React,
    stopping: AtomicBool,
    notify: Notify,
}

impl Default for Shutdown {
    fn default() -> Self {
        Self::new()
    }
}

impl Shutdown {
    pub fn new() -> Self {
        Self {
            closers: Mutex::new(Vec::new()),
            react: default_react(),
            stopping: AtomicBool::new(false),
            notify: Notify::new(),
        }
    }

    /// Builds a coordinator with a custom `react` handler, invoked with the
    /// closer's name and its failure/timeout for every abnormal teardown
    /// step, plus the cause passed to an explicit [`Shutdown::stop`].
    pub fn with_react(react: React) -> Self {
        Self {
            closers: Mutex::new(Vec::new()),
            react,
            stopping: AtomicBool::new(false),
            notify: Notify::new(),
        }
    }

    /// Pushes a closer onto the LIFO teardown stack. Closers registered
    /// later run first.
    pub async fn add(&self, closer: Closer) {
        self.closers.lock().await.push(closer);
    }

    /// Transitions into `stopping` immediately (without waiting for
    /// [`Shutdown::wait`]'s signal/notify select) and reports `cause` through
    /// `react`, if given. Idempotent.
    pub fn stop(&self, cause: Option<BoxError>) {
        if let Some(err) = cause {
            (self.react)("shutdown", err);
        }
        self.stopping.store(true, Ordering::SeqCst);
        self.notify.notify_one();
    }

    /// `true` from the moment teardown starts (via signal, [`Shutdown::stop`],
    /// or [`Shutdown::wait`] itself) until every closer has drained.
    pub fn done(&self) -> bool {
        self.stopping.load(Ordering::SeqCst)
    }

    /// Exits the process immediately if shutdown is already underway.
    /// Intended for a startup path that wants to bail instead of continuing
    /// to serve after [`Shutdown::check`] has already stopped things.
    pub fn ensure(&self) {
        if self.done() {
            process::exit(1);
        }
    }

    /// Convenience for a fallible startup step: on `Err`, reports and stops
    /// via `cause`, then exits the process immediately.
    pub fn check(&self, result: Result<(), BoxError>) {
        if let Err(err) = result {
            self.stop(Some(err));
            self.ensure();
        }
    }

    /// Blocks until a termination signal arrives or [`Shutdown::stop`] is
    /// called, then drains registered closers LIFO, each bounded by its
    /// close/cancel timeout budget. Returns once every closer has run.
    pub async fn wait(&self) {
        tokio::select! {
            _ = wait_for_os_signal() => {
                self.stopping.store(true, Ordering::SeqCst);
            }
            _ = self.notify.notified() => {}
        }

        loop {
            let closer = {
                let mut closers = self.closers.lock().await;
                closers.pop()
            };
            let Some(closer) = closer else { break };
            self.run_closer(closer).await;
        }

        self.stopping.store(false, Ordering::SeqCst);
    }

    async fn run_closer(&self, closer: Closer) {
        let Closer {
            name,
            close_timeout,
            cancel_timeout,
            run,
        } = closer;

        let token = CancellationToken::new();
        let run_token = token.clone();
        let mut task = tokio::spawn(async move { run(run_token).await });

        match tokio::time::timeout(close_timeout, &mut task).await {
            Ok(Ok(Ok(()))) => {}
            Ok(Ok(Err(err))) => (self.react)(name, err),
            Ok(Err(join_err)) => (self.react)(name, Box::new(join_err)),
            Err(_elapsed) => {
                token.cancel();
                match tokio::time::timeout(cancel_timeout, &mut task).await {
                    Ok(Ok(Ok(()))) => {}
                    Ok(Ok(Err(err))) => (self.react)(name, err),
                    Ok(Err(join_err)) => (self.react)(name, Box::new(join_err)),
                    Err(_elapsed) => (self.react)(name, Box::new(Error::Timeout)),
                }
            }
        }
    }
}

async fn wait_for_os_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};
        let mut terminate =
            signal(SignalKind::terminate()).expect("failed to install SIGTERM handler");
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {}
            _ = terminate.recv() => {}
        }
    }
    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }
}
