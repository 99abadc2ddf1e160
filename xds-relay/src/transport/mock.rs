//! In-memory transport for tests.
//!
//! [`MockTransport`] plays the origin server: every request the client
//! sends is decoded and handed to a callback, and responses are fed in
//! through an unbounded channel.

use std::future::Future;
use std::sync::{Arc, Mutex, PoisonError};

use bytes::Bytes;
use tokio::sync::mpsc;

use crate::codec::XdsCodec;
use crate::error::{Error, Result};
use crate::message::{DiscoveryRequest, DiscoveryResponse};
use crate::resource::StreamKind;
use crate::transport::{BoxFuture, StreamReceiver, StreamSender, Transport};

type SendCallback = Arc<dyn Fn(DiscoveryRequest) -> BoxFuture<Result<()>> + Send + Sync>;

/// A scripted origin server.
///
/// The response feed is attached to the first stream opened; later
/// streams never yield a response. Clones share the feed and the record
/// of opened streams.
pub struct MockTransport<C> {
    codec: C,
    create_error: Option<String>,
    on_send: SendCallback,
    responses: Arc<Mutex<Option<mpsc::UnboundedReceiver<DiscoveryResponse>>>>,
    opened: Arc<Mutex<Vec<StreamKind>>>,
}

impl<C: Clone> Clone for MockTransport<C> {
    fn clone(&self) -> Self {
        Self {
            codec: self.codec.clone(),
            create_error: self.create_error.clone(),
            on_send: Arc::clone(&self.on_send),
            responses: Arc::clone(&self.responses),
            opened: Arc::clone(&self.opened),
        }
    }
}

impl<C> std::fmt::Debug for MockTransport<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MockTransport")
            .field("create_error", &self.create_error)
            .field("opened", &self.opened_streams())
            .finish_non_exhaustive()
    }
}

impl<C> MockTransport<C> {
    /// Streams opened so far, in order.
    pub fn opened_streams(&self) -> Vec<StreamKind> {
        self.opened
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl<C: XdsCodec + Clone> MockTransport<C> {
    /// Create a mock that accepts every request and never responds.
    pub fn new(codec: C) -> Self {
        Self {
            codec,
            create_error: None,
            on_send: Arc::new(|_| Box::pin(async { Ok(()) })),
            responses: Arc::new(Mutex::new(None)),
            opened: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Fail every stream creation with the given message.
    pub fn with_create_error(mut self, message: impl Into<String>) -> Self {
        self.create_error = Some(message.into());
        self
    }

    /// Feed responses from `responses` to the first stream opened.
    ///
    /// Dropping the sending side ends that stream.
    pub fn with_responses(self, responses: mpsc::UnboundedReceiver<DiscoveryResponse>) -> Self {
        *self.responses.lock().unwrap_or_else(PoisonError::into_inner) = Some(responses);
        self
    }

    /// Invoke `callback` with every request sent; its outcome is the
    /// outcome of the send.
    pub fn on_send<F, Fut>(mut self, callback: F) -> Self
    where
        F: Fn(DiscoveryRequest) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<()>> + Send + 'static,
    {
        self.on_send = Arc::new(move |request| Box::pin(callback(request)));
        self
    }

}

impl<C: XdsCodec + Clone> Transport for MockTransport<C> {
    type Sender = MockSender<C>;
    type Receiver = MockReceiver<C>;

    async fn new_stream(&self, kind: StreamKind) -> Result<(Self::Sender, Self::Receiver)> {
        if let Some(message) = &self.create_error {
            return Err(Error::Connection(message.clone()));
        }
        self.opened
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(kind);
        let responses = self
            .responses
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();

        Ok((
            MockSender {
                codec: self.codec.clone(),
                on_send: Arc::clone(&self.on_send),
            },
            MockReceiver {
                codec: self.codec.clone(),
                responses,
            },
        ))
    }
}

/// Sending half of a [`MockTransport`] stream.
pub struct MockSender<C> {
    codec: C,
    on_send: SendCallback,
}

impl<C> std::fmt::Debug for MockSender<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MockSender").finish_non_exhaustive()
    }
}

impl<C: XdsCodec> StreamSender for MockSender<C> {
    async fn send(&mut self, request: Bytes) -> Result<()> {
        let request = self.codec.decode_request(request)?;
        (self.on_send)(request).await
    }
}

/// Receiving half of a [`MockTransport`] stream.
pub struct MockReceiver<C> {
    codec: C,
    responses: Option<mpsc::UnboundedReceiver<DiscoveryResponse>>,
}

impl<C> std::fmt::Debug for MockReceiver<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MockReceiver")
            .field("fed", &self.responses.is_some())
            .finish_non_exhaustive()
    }
}

impl<C: XdsCodec> StreamReceiver for MockReceiver<C> {
    async fn recv(&mut self) -> Result<Option<Bytes>> {
        let Some(responses) = self.responses.as_mut() else {
            return std::future::pending().await;
        };
        match responses.recv().await {
            Some(response) => self.codec.encode_response(&response).map(Some),
            None => Ok(None),
        }
    }
}

#[cfg(all(test, feature = "codegen-prost"))]
mod tests {
    use super::*;
    use crate::codec::prost::ProstCodec;
    use crate::resource::{ApiVersion, ResourceType};

    #[derive(Debug, Clone, Copy)]
    struct Opaque;

    #[test]
    fn test_debug_needs_no_codec_bounds() {
        let transport = MockTransport {
            codec: Opaque,
            create_error: Some("refused".to_string()),
            on_send: Arc::new(|_| Box::pin(async { Ok(()) })),
            responses: Arc::new(Mutex::new(None)),
            opened: Arc::new(Mutex::new(Vec::new())),
        };
        let rendered = format!("{transport:?}");
        assert!(rendered.contains("refused"));
        assert!(transport.opened_streams().is_empty());
    }

    #[tokio::test]
    async fn test_records_opened_streams() {
        let transport = MockTransport::new(ProstCodec);
        let kind = StreamKind {
            version: ApiVersion::V2,
            resource: ResourceType::Endpoint,
        };
        let _halves = transport.new_stream(kind).await.unwrap();

        assert_eq!(transport.clone().opened_streams(), vec![kind]);
        assert!(format!("{transport:?}").contains("Endpoint"));
    }
}
