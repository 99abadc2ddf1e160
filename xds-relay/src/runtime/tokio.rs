//! `tokio` based runtime implementation.

use crate::runtime::Runtime;
use std::future::Future;
use std::time::Duration;

/// Runtime backed by the ambient tokio executor.
///
/// Must be used from within a tokio runtime context.
#[derive(Clone, Copy, Debug, Default)]
pub struct TokioRuntime;

impl Runtime for TokioRuntime {
    fn spawn<F>(&self, future: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        drop(tokio::spawn(future));
    }

    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}
