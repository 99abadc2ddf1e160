//! `tonic` based transport implementation.
//!
//! This transport uses tonic's low-level `Grpc` client with a `BytesCodec`
//! to send and receive raw bytes, allowing the relay to handle
//! serialization independently and to reach every per-type streaming
//! method of both API generations over one channel.

use crate::error::{Error, Result};
use crate::resource::StreamKind;
use crate::transport::{BoxFuture, StreamReceiver, StreamSender, Transport};
use bytes::{Buf, BufMut, Bytes};
use http::uri::PathAndQuery;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tonic::client::Grpc;
use tonic::codec::{Codec, DecodeBuf, Decoder, EncodeBuf, Encoder};
use tonic::transport::Channel;
use tonic::{Status, Streaming};

// One queued request at most: a body stream that stops being polled
// blocks the next send, so the caller's send timeout can fire.
const STREAM_CHANNEL_BUFFER_SIZE: usize = 1;

/// A codec that passes bytes through without serialization.
#[derive(Debug, Clone, Copy)]
struct BytesCodec;

impl Codec for BytesCodec {
    type Encode = Bytes;
    type Decode = Bytes;
    type Encoder = BytesEncoder;
    type Decoder = BytesDecoder;

    fn encoder(&mut self) -> Self::Encoder {
        BytesEncoder
    }

    fn decoder(&mut self) -> Self::Decoder {
        BytesDecoder
    }
}

#[derive(Debug)]
struct BytesEncoder;

impl Encoder for BytesEncoder {
    type Item = Bytes;
    type Error = Status;

    fn encode(
        &mut self,
        item: Self::Item,
        dst: &mut EncodeBuf<'_>,
    ) -> std::result::Result<(), Self::Error> {
        dst.put_slice(&item);
        Ok(())
    }
}

#[derive(Debug)]
struct BytesDecoder;

impl Decoder for BytesDecoder {
    type Item = Bytes;
    type Error = Status;

    fn decode(
        &mut self,
        src: &mut DecodeBuf<'_>,
    ) -> std::result::Result<Option<Self::Item>, Self::Error> {
        Ok(Some(src.copy_to_bytes(src.remaining())))
    }
}

/// Factory for discovery streams using tonic.
#[derive(Clone, Debug)]
pub struct TonicTransport {
    channel: Channel,
}

impl TonicTransport {
    /// Create a transport from an existing tonic [`Channel`].
    ///
    /// Use this when you need custom channel configuration (e.g., TLS, keep-alive).
    ///
    /// # Example
    ///
    /// ```ignore
    /// use tonic::transport::Channel;
    ///
    /// let channel = Channel::from_static("http://origin.example.com:18000")
    ///     .connect_timeout(Duration::from_secs(5))
    ///     .connect()
    ///     .await?;
    ///
    /// let transport = TonicTransport::from_channel(channel);
    /// ```
    pub fn from_channel(channel: Channel) -> Self {
        Self { channel }
    }

    /// Connect to an origin server with default settings.
    ///
    /// For custom configuration, use [`from_channel`](Self::from_channel).
    pub async fn connect(uri: impl Into<String>) -> Result<Self> {
        let uri: String = uri.into();
        let channel = Channel::from_shared(uri)
            .map_err(|e| Error::Connection(e.to_string()))?
            .connect()
            .await
            .map_err(|e| Error::Connection(e.to_string()))?;
        Ok(Self { channel })
    }
}

impl Transport for TonicTransport {
    type Sender = TonicSender;
    type Receiver = TonicReceiver;

    async fn new_stream(&self, kind: StreamKind) -> Result<(Self::Sender, Self::Receiver)> {
        let mut grpc = Grpc::new(self.channel.clone());

        grpc.ready()
            .await
            .map_err(|e| Error::Connection(e.to_string()))?;

        let (tx, rx) = mpsc::channel::<Bytes>(STREAM_CHANNEL_BUFFER_SIZE);
        let path = PathAndQuery::from_static(kind.path());

        // Some servers hold back response headers until the first request
        // arrives, so the call is only awaited by the receiving half; the
        // sending half can enqueue the first request in the meantime.
        let call: BoxFuture<std::result::Result<Streaming<Bytes>, Status>> =
            Box::pin(async move {
                let request = tonic::Request::new(ReceiverStream::new(rx));
                grpc.streaming(request, path, BytesCodec)
                    .await
                    .map(tonic::Response::into_inner)
            });

        Ok((
            TonicSender { sender: tx },
            TonicReceiver {
                state: ReceiverState::Pending(call),
            },
        ))
    }
}

/// Sending half of a tonic discovery stream.
#[derive(Debug)]
pub struct TonicSender {
    sender: mpsc::Sender<Bytes>,
}

impl StreamSender for TonicSender {
    async fn send(&mut self, request: Bytes) -> Result<()> {
        self.sender
            .send(request)
            .await
            .map_err(|_| Error::StreamClosed)
    }
}

enum ReceiverState {
    Pending(BoxFuture<std::result::Result<Streaming<Bytes>, Status>>),
    Ready(Streaming<Bytes>),
    /// The call itself failed; there is no response stream to read.
    Failed,
}

/// Receiving half of a tonic discovery stream.
pub struct TonicReceiver {
    state: ReceiverState,
}

impl std::fmt::Debug for TonicReceiver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = match self.state {
            ReceiverState::Pending(_) => "pending",
            ReceiverState::Ready(_) => "ready",
            ReceiverState::Failed => "failed",
        };
        f.debug_struct("TonicReceiver").field("state", &state).finish()
    }
}

impl StreamReceiver for TonicReceiver {
    async fn recv(&mut self) -> Result<Option<Bytes>> {
        loop {
            match &mut self.state {
                ReceiverState::Ready(streaming) => return Ok(streaming.message().await?),
                ReceiverState::Pending(call) => match call.await {
                    Ok(streaming) => self.state = ReceiverState::Ready(streaming),
                    Err(status) => {
                        self.state = ReceiverState::Failed;
                        return Err(status.into());
                    }
                },
                ReceiverState::Failed => return Err(Error::StreamClosed),
            }
        }
    }
}
