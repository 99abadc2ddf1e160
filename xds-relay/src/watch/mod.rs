//! Downstream watches.
//!
//! A [`Watch`] is the delivery channel of one downstream subscription. It
//! buffers at most one response: the producer never blocks on a slow
//! consumer, and a response that is still waiting when a newer one
//! arrives can be discarded with [`Watch::drop_redundant`].

use std::fmt;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use async_channel::TrySendError;
use futures_core::Stream;
use pin_project_lite::pin_project;

use crate::envelope::{Request, Response, ResponseV2, ResponseV3, VersionedResponse};
use crate::error::{Error, Result};

mod fanout;

pub use fanout::{Delivery, FanoutSummary, deliver, fanout};

/// A watch over v2 responses.
pub type WatchV2 = VersionedWatch<ResponseV2>;

/// A watch over v3 responses.
pub type WatchV3 = VersionedWatch<ResponseV3>;

/// Delivery channel of one downstream subscription.
///
/// The object-safe face of [`WatchV2`] and [`WatchV3`], used by producers
/// that fan one payload out to watches of both API generations.
pub trait Watch: fmt::Debug + Send + Sync {
    /// Offer a response without blocking.
    ///
    /// Returns `Ok(true)` if the response was buffered and `Ok(false)` if
    /// the buffer already holds an undelivered response, in which case
    /// nothing changes. Fails with [`Error::PayloadMismatch`] if the
    /// response is of the other API generation, leaving the buffer as it
    /// was.
    ///
    /// Must not be called after [`close`](Watch::close); doing so fails
    /// with [`Error::WatchClosed`].
    fn send(&self, response: &dyn Response) -> Result<bool>;

    /// Discard the buffered response, if any. Returns whether one was
    /// discarded.
    fn drop_redundant(&self) -> bool;

    /// Close the watch. A consumer waiting on the channel observes the end
    /// of the stream once any buffered response has been taken.
    ///
    /// Closing twice is a no-op.
    fn close(&self);

    /// Whether [`close`](Watch::close) has been called.
    fn is_closed(&self) -> bool;

    /// The request this watch was created for.
    fn request(&self) -> Arc<dyn Request>;
}

/// Single-slot watch over one response variant.
pub struct VersionedWatch<R: VersionedResponse> {
    request: Arc<R::Request>,
    tx: async_channel::Sender<R>,
    rx: async_channel::Receiver<R>,
}

impl<R: VersionedResponse> VersionedWatch<R> {
    /// Create an open watch correlated with `request`.
    pub fn new(request: Arc<R::Request>) -> Self {
        let (tx, rx) = async_channel::bounded(1);
        Self { request, tx, rx }
    }

    /// The consumption endpoint.
    ///
    /// A watch has one consumer; every call returns a handle on the same
    /// buffer.
    pub fn channel(&self) -> WatchReceiver<R> {
        WatchReceiver {
            inner: self.rx.clone(),
        }
    }

    /// The request this watch was created for, in its concrete variant.
    pub fn versioned_request(&self) -> &Arc<R::Request> {
        &self.request
    }
}

impl<R: VersionedResponse> fmt::Debug for VersionedWatch<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VersionedWatch")
            .field("api_version", &R::API_VERSION)
            .field("request", &self.request)
            .field("buffered", &self.tx.len())
            .field("closed", &self.tx.is_closed())
            .finish()
    }
}

impl<R: VersionedResponse> Watch for VersionedWatch<R> {
    fn send(&self, response: &dyn Response) -> Result<bool> {
        let payload = response.payload();
        let Some(response) = R::from_payload(payload) else {
            return Err(Error::PayloadMismatch {
                expected: R::API_VERSION.as_str(),
                actual: payload.api_version().as_str(),
            });
        };

        match self.tx.try_send(response.clone()) {
            Ok(()) => Ok(true),
            Err(TrySendError::Full(_)) => Ok(false),
            Err(TrySendError::Closed(_)) => Err(Error::WatchClosed),
        }
    }

    fn drop_redundant(&self) -> bool {
        self.rx.try_recv().is_ok()
    }

    fn close(&self) {
        self.tx.close();
    }

    fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }

    fn request(&self) -> Arc<dyn Request> {
        self.request.clone()
    }
}

pin_project! {
    /// Consumer side of a watch.
    ///
    /// Yields buffered responses and ends once the watch is closed and
    /// drained.
    #[derive(Debug)]
    pub struct WatchReceiver<R> {
        #[pin]
        inner: async_channel::Receiver<R>,
    }
}

impl<R> WatchReceiver<R> {
    /// Wait for the next response. `None` means the watch was closed.
    pub async fn recv(&self) -> Option<R> {
        self.inner.recv().await.ok()
    }

    /// Take the buffered response, if any, without waiting.
    pub fn try_recv(&self) -> Option<R> {
        self.inner.try_recv().ok()
    }
}

impl<R> Stream for WatchReceiver<R> {
    type Item = R;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.project().inner.poll_next(cx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::envelope::{RequestV2, RequestV3};
    use crate::message::DiscoveryRequest;
    use crate::resource::{v2, v3};
    use std::time::Duration;
    use tokio::sync::mpsc;

    fn assert_watch<T: Watch>() {}

    fn watch_v2() -> WatchV2 {
        WatchV2::new(Arc::new(RequestV2::new(DiscoveryRequest::new(
            v2::LISTENER,
        ))))
    }

    fn response_v2(watch: &WatchV2, version: &str) -> Box<dyn Response> {
        Arc::clone(watch.versioned_request()).create_response(version.to_string(), vec![], vec![])
    }

    fn response_v3(version: &str) -> Box<dyn Response> {
        Arc::new(RequestV3::new(DiscoveryRequest::new(v3::LISTENER))).create_response(
            version.to_string(),
            vec![],
            vec![],
        )
    }

    #[test]
    fn test_variants_implement_watch() {
        assert_watch::<WatchV2>();
        assert_watch::<WatchV3>();

        let watches: Vec<Arc<dyn Watch>> = vec![
            Arc::new(watch_v2()),
            Arc::new(WatchV3::new(Arc::new(RequestV3::new(
                DiscoveryRequest::new(v3::CLUSTER),
            )))),
        ];
        assert_eq!(
            watches[1].request().discovery_request().type_url,
            v3::CLUSTER
        );
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_close_ends_blocked_read() {
        let watch = Arc::new(watch_v2());
        let rx = watch.channel();

        let reader = tokio::spawn(async move { rx.recv().await.map(|r| r.version().to_string()) });
        tokio::time::sleep(Duration::from_millis(10)).await;

        watch.close();
        assert_eq!(reader.await.unwrap(), None);
        assert!(watch.is_closed());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_close_and_read() {
        let watch = Arc::new(watch_v2());
        let rx = watch.channel();

        let reader = tokio::spawn(async move {
            let mut received = 0;
            while rx.recv().await.is_some() {
                received += 1;
            }
            received
        });

        let closers: Vec<_> = (0..4)
            .map(|_| {
                let watch = Arc::clone(&watch);
                tokio::spawn(async move { watch.close() })
            })
            .collect();
        for closer in closers {
            closer.await.unwrap();
        }

        assert_eq!(reader.await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_send_successful() {
        let watch = watch_v2();
        let rx = watch.channel();

        let ok = watch.send(response_v2(&watch, "1").as_ref()).unwrap();
        assert!(ok);

        let got = rx.recv().await.unwrap();
        assert_eq!(got.version(), "1");
    }

    #[test]
    fn test_send_false_when_full() {
        let watch = watch_v2();

        assert!(watch.send(response_v2(&watch, "1").as_ref()).unwrap());
        // Nobody is reading, so the second offer finds the slot taken.
        assert!(!watch.send(response_v2(&watch, "2").as_ref()).unwrap());

        assert_eq!(watch.channel().try_recv().unwrap().version(), "1");
        assert!(watch.channel().try_recv().is_none());
    }

    #[test]
    fn test_send_payload_mismatch_leaves_buffer() {
        let watch = watch_v2();
        assert!(watch.send(response_v2(&watch, "1").as_ref()).unwrap());

        let err = watch.send(response_v3("2").as_ref()).unwrap_err();
        assert!(matches!(
            err,
            Error::PayloadMismatch {
                expected: "v2",
                actual: "v3"
            }
        ));

        let rx = watch.channel();
        assert_eq!(rx.try_recv().unwrap().version(), "1");
        assert!(rx.try_recv().is_none());
    }

    #[test]
    fn test_send_after_close_is_rejected() {
        let watch = watch_v2();
        watch.close();
        watch.close();

        let err = watch.send(response_v2(&watch, "1").as_ref()).unwrap_err();
        assert!(matches!(err, Error::WatchClosed));
    }

    #[tokio::test]
    async fn test_buffered_response_survives_close() {
        let watch = watch_v2();
        let rx = watch.channel();
        assert!(watch.send(response_v2(&watch, "1").as_ref()).unwrap());

        watch.close();

        assert_eq!(rx.recv().await.unwrap().version(), "1");
        assert!(rx.recv().await.is_none());
    }

    #[test]
    fn test_drop_redundant_on_empty_watch() {
        let watch = watch_v2();
        assert!(!watch.drop_redundant());

        assert!(watch.send(response_v2(&watch, "1").as_ref()).unwrap());
        assert!(watch.drop_redundant());
        assert!(!watch.drop_redundant());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_drop_redundant_latest_wins() {
        let watch = Arc::new(watch_v2());
        let rx = watch.channel();
        let (received_tx, mut received_rx) = mpsc::channel::<String>(1);
        let (proceed_tx, mut proceed_rx) = mpsc::channel::<()>(1);

        let consumer = tokio::spawn(async move {
            let mut seen = Vec::new();
            while let Some(response) = rx.recv().await {
                seen.push(response.version().to_string());
                let _ = received_tx.send(response.version().to_string()).await;
                if proceed_rx.recv().await.is_none() {
                    break;
                }
            }
            seen
        });

        assert!(watch.send(response_v2(&watch, "1").as_ref()).unwrap());
        assert_eq!(received_rx.recv().await.unwrap(), "1");

        // The consumer is parked, so nothing is buffered yet.
        assert!(!watch.drop_redundant());

        assert!(watch.send(response_v2(&watch, "5").as_ref()).unwrap());
        assert!(watch.drop_redundant());
        assert!(watch.send(response_v2(&watch, "2").as_ref()).unwrap());

        proceed_tx.send(()).await.unwrap();
        assert_eq!(received_rx.recv().await.unwrap(), "2");

        drop(proceed_tx);
        watch.close();
        assert_eq!(consumer.await.unwrap(), vec!["1", "2"]);
    }

    #[tokio::test]
    async fn test_receiver_is_a_stream() {
        use futures::StreamExt;

        let watch = watch_v2();
        let rx = watch.channel();
        assert!(watch.send(response_v2(&watch, "7").as_ref()).unwrap());
        watch.close();

        let versions: Vec<String> = rx.map(|r| r.version().to_string()).collect().await;
        assert_eq!(versions, vec!["7"]);
    }
}
