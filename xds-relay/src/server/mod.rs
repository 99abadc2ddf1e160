//! Downstream discovery server adapters.
//!
//! [`DiscoveryServer`] is what a v2 or v3 state-of-the-world gRPC service
//! calls when a downstream subscribes. It wraps the request in its API
//! generation's envelope, opens a watch for it and registers the watch
//! with a [`Cache`], which later publishes upstream state through
//! [`fanout`](crate::watch::fanout).

use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use tracing::debug;

use crate::envelope::{ResponseV2, ResponseV3, VersionedResponse};
use crate::error::{Error, Result};
use crate::message::DiscoveryRequest;
use crate::watch::{VersionedWatch, Watch, WatchReceiver};

/// Registry of downstream watches, keyed by correlation key.
pub trait Cache: Send + Sync + 'static {
    /// Correlation key for `request`. Requests with equal keys are served
    /// from the same upstream stream.
    fn key(&self, request: &DiscoveryRequest) -> Result<String>;

    /// Register `watch` under `key`.
    fn add_watch(&self, key: &str, watch: Arc<dyn Watch>) -> Result<()>;

    /// Unregister `watch` from `key`. Unknown watches are ignored.
    fn remove_watch(&self, key: &str, watch: &Arc<dyn Watch>);
}

/// Server adapter for v2 discovery services.
pub type ServerV2 = DiscoveryServer<ResponseV2>;

/// Server adapter for v3 discovery services.
pub type ServerV3 = DiscoveryServer<ResponseV3>;

/// Entry points of one API generation's discovery service.
pub struct DiscoveryServer<R> {
    cache: Arc<dyn Cache>,
    _response: PhantomData<fn() -> R>,
}

impl<R> fmt::Debug for DiscoveryServer<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DiscoveryServer").finish_non_exhaustive()
    }
}

impl<R> Clone for DiscoveryServer<R> {
    fn clone(&self) -> Self {
        Self {
            cache: Arc::clone(&self.cache),
            _response: PhantomData,
        }
    }
}

impl<R: VersionedResponse> DiscoveryServer<R> {
    /// Create an adapter over `cache`.
    pub fn new(cache: Arc<dyn Cache>) -> Self {
        Self {
            cache,
            _response: PhantomData,
        }
    }

    /// Subscribe a downstream stream.
    ///
    /// Returns the channel the stream reads responses from and the handle
    /// that ends the subscription.
    ///
    /// # Errors
    ///
    /// Fails if the cache cannot key or register the request. Nothing is
    /// registered in that case.
    pub fn create_watch(
        &self,
        request: DiscoveryRequest,
    ) -> Result<(WatchReceiver<R>, WatchCancel)> {
        let key = self.cache.key(&request)?;
        let type_url = request.type_url.clone();

        let request = Arc::new(R::Request::from(request));
        let watch = Arc::new(VersionedWatch::<R>::new(request));
        let receiver = watch.channel();
        let watch: Arc<dyn Watch> = watch;

        self.cache.add_watch(&key, Arc::clone(&watch))?;
        debug!(%key, %type_url, api_version = %R::API_VERSION, "created watch");

        Ok((
            receiver,
            WatchCancel {
                inner: Arc::new(CancelInner {
                    cache: Arc::clone(&self.cache),
                    key,
                    watch,
                    cancelled: AtomicBool::new(false),
                }),
            },
        ))
    }

    /// Unary discovery is not served by the relay.
    ///
    /// # Errors
    ///
    /// Always fails with [`Error::FetchNotSupported`].
    pub fn fetch(&self, _request: &DiscoveryRequest) -> Result<R> {
        Err(Error::FetchNotSupported)
    }
}

/// Ends a subscription made with [`DiscoveryServer::create_watch`].
///
/// Cancelling removes the watch from the cache and closes it, so the
/// downstream reader sees the end of its channel. Clones cancel the same
/// subscription, and only the first call has an effect.
#[derive(Clone)]
pub struct WatchCancel {
    inner: Arc<CancelInner>,
}

struct CancelInner {
    cache: Arc<dyn Cache>,
    key: String,
    watch: Arc<dyn Watch>,
    cancelled: AtomicBool,
}

impl WatchCancel {
    /// Remove and close the watch.
    pub fn cancel(&self) {
        let inner = &self.inner;
        if inner.cancelled.swap(true, Ordering::AcqRel) {
            return;
        }
        inner.cache.remove_watch(&inner.key, &inner.watch);
        inner.watch.close();
        debug!(key = %inner.key, "cancelled watch");
    }

    /// Whether [`cancel`](Self::cancel) has been called.
    pub fn is_cancelled(&self) -> bool {
        self.inner.cancelled.load(Ordering::Acquire)
    }
}

impl fmt::Debug for WatchCancel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WatchCancel")
            .field("key", &self.inner.key)
            .field("cancelled", &self.is_cancelled())
            .finish()
    }
}
