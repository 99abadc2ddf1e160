//! Provides abstraction for async runtimes.
//!
//! Every upstream stream session runs a sender task and a receiver task.
//! The runtime spawns both and supplies the timer used to bound each send.

use std::future::Future;
use std::time::Duration;

use crate::error::{Error, Result};

#[cfg(feature = "rt-tokio")]
pub mod tokio;

/// Task spawning and timers for stream sessions.
pub trait Runtime: Send + Sync + Clone + 'static {
    /// Spawn a session task. It runs detached until it finishes on its own.
    fn spawn<F>(&self, future: F)
    where
        F: Future<Output = ()> + Send + 'static;

    /// Sleep for the given duration.
    fn sleep(&self, duration: Duration) -> impl Future<Output = ()> + Send;

    /// Drive `future` for at most `limit`.
    ///
    /// Fails with [`Error::SendTimeout`] if the limit elapses first; the
    /// future is dropped in that case.
    fn timeout<F>(
        &self,
        limit: Duration,
        future: F,
    ) -> impl Future<Output = Result<F::Output>> + Send
    where
        F: Future + Send,
        F::Output: Send,
    {
        let sleep = self.sleep(limit);
        async move {
            ::tokio::select! {
                biased;
                output = future => Ok(output),
                _ = sleep => Err(Error::SendTimeout(limit)),
            }
        }
    }
}
