//! Tokio runtime wrapper shared by shoptrace binaries.
//!
//! The runtime owns a root [`CancellationToken`]. Interaction sessions hang
//! their click tokens off it, so Ctrl-C or [`TraceRuntime::shutdown`] stops
//! every scheduled synthetic event in flight.
use anyhow::Result;
use std::future::Future;
use std::time::Duration;
use tokio::runtime::{Builder, Runtime};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

pub struct TraceRuntime {
    runtime: Runtime,
    root: CancellationToken,
}

impl TraceRuntime {
    /// Multi-threaded runtime with timers and IO enabled.
    ///
    /// ```
    /// use shoptrace_runtime::TraceRuntime;
    /// use std::time::Duration;
    ///
    /// let runtime = TraceRuntime::build("doctest-runtime", Some(1))
    ///     .expect("runtime builds");
    /// let value = runtime.run_until_ctrl_c(async { 2 + 2 });
    /// assert_eq!(value, 4);
    /// runtime.shutdown(Duration::from_millis(10));
    /// ```
    pub fn build(thread_name: &str, worker_threads: Option<usize>) -> Result<Self> {
        let mut builder = Builder::new_multi_thread();
        builder.enable_all().thread_name(thread_name);
        if let Some(workers) = worker_threads {
            builder.worker_threads(workers.max(1));
        }

        let runtime = builder.build()?;
        debug!(thread_name, ?worker_threads, "runtime built");
        Ok(Self {
            runtime,
            root: CancellationToken::new(),
        })
    }

    /// The root token. Derive child tokens from it; never cancel it directly
    /// unless the whole process is winding down.
    pub fn cancellation(&self) -> CancellationToken {
        self.root.clone()
    }

    /// Drive `fut` to completion, cancelling the root token if Ctrl-C
    /// arrives first.
    ///
    /// The future keeps running after cancellation so it can observe the
    /// token and release its resources (e.g. close the browser session).
    pub fn run_until_ctrl_c<F: Future>(&self, fut: F) -> F::Output {
        let root = self.root.clone();
        self.runtime.block_on(async move {
            tokio::pin!(fut);
            tokio::select! {
                out = &mut fut => out,
                _ = tokio::signal::ctrl_c() => {
                    info!("ctrl-c received; cancelling in-flight interactions");
                    root.cancel();
                    fut.await
                }
            }
        })
    }

    /// Cancel the root token and give spawned tasks `graceful` to finish.
    ///
    /// ```
    /// use shoptrace_runtime::TraceRuntime;
    /// use std::time::Duration;
    ///
    /// let runtime = TraceRuntime::build("shutdown-example", Some(1)).unwrap();
    /// let session = runtime.cancellation().child_token();
    /// runtime.shutdown(Duration::from_millis(5));
    /// assert!(session.is_cancelled());
    /// ```
    pub fn shutdown(self, graceful: Duration) {
        self.root.cancel();
        self.runtime.shutdown_timeout(graceful);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn spawned_tasks_observe_root_cancellation() {
        let runtime = TraceRuntime::build("cancel-test", Some(1)).unwrap();
        let session = runtime.cancellation().child_token();

        let waiter = {
            let session = session.clone();
            runtime.runtime.spawn(async move { session.cancelled().await })
        };
        runtime.cancellation().cancel();
        runtime.run_until_ctrl_c(async { waiter.await.unwrap() });

        assert!(session.is_cancelled());
        runtime.shutdown(Duration::from_millis(5));
    }

    #[test]
    fn sibling_sessions_cancel_independently() {
        let runtime = TraceRuntime::build("sibling-test", Some(1)).unwrap();
        let a = runtime.cancellation().child_token();
        let b = runtime.cancellation().child_token();

        a.cancel();
        assert!(!b.is_cancelled());
        assert!(!runtime.cancellation().is_cancelled());
        runtime.shutdown(Duration::from_millis(5));
    }

    #[test]
    fn zero_workers_is_clamped() {
        let runtime = TraceRuntime::build("clamp-test", Some(0)).unwrap();
        assert_eq!(runtime.run_until_ctrl_c(async { "ok" }), "ok");
        runtime.shutdown(Duration::from_millis(5));
    }
}
