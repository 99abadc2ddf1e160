//! Provides abstraction for transport layers.

use crate::error::Result;
use crate::resource::StreamKind;
use bytes::Bytes;
use std::future::Future;
use std::pin::Pin;

#[cfg(feature = "transport-tonic")]
pub mod tonic;

#[cfg(any(test, feature = "test-util"))]
pub mod mock;

pub(crate) type BoxFuture<T> = Pin<Box<dyn Future<Output = T> + Send + 'static>>;

/// Factory for duplex discovery streams to the origin server.
///
/// This abstraction allows for different transport implementations:
/// - Tonic-based gRPC transport
/// - In-memory mock transport for testing
pub trait Transport: Send + Sync + 'static {
    /// The sending half of a stream.
    type Sender: StreamSender;
    /// The receiving half of a stream.
    type Receiver: StreamReceiver;

    /// Opens a new stream on the streaming method serving `kind`.
    ///
    /// The halves are driven from separate tasks, so they must not depend
    /// on each other for progress.
    fn new_stream(
        &self,
        kind: StreamKind,
    ) -> impl Future<Output = Result<(Self::Sender, Self::Receiver)>> + Send;
}

/// Sending half of a duplex stream, carrying serialized `DiscoveryRequest`s.
pub trait StreamSender: Send + 'static {
    /// Send serialized DiscoveryRequest bytes to the server.
    ///
    /// May wait on transport flow control; callers bound it with a timeout.
    fn send(&mut self, request: Bytes) -> impl Future<Output = Result<()>> + Send;
}

/// Receiving half of a duplex stream, yielding serialized `DiscoveryResponse`s.
pub trait StreamReceiver: Send + 'static {
    /// Receive serialized DiscoveryResponse bytes from the server.
    ///
    /// Returns:
    /// - `Ok(Some(bytes))` - Received a response.
    /// - `Ok(None)` - Stream closed normally.
    /// - `Err(_)` - Stream error (connection dropped, etc.)
    fn recv(&mut self) -> impl Future<Output = Result<Option<Bytes>>> + Send;
}
