//! Upstream client: state-of-the-world discovery streams to the origin
//! server.
//!
//! [`UpstreamClient::open_stream`] opens one stream per call and drives it
//! with two background tasks. The caller sees the stream as a
//! [`ResponseStream`] of origin responses and stops it through the
//! returned [`StreamHandle`]. Every response forwarded to the caller is
//! acknowledged upstream by echoing its `version_info` and `nonce` on the
//! next request.
//!
//! There is no retry: once a stream ends, for whatever reason, the caller
//! opens a new one.

use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use futures_core::Stream;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::codec::XdsCodec;
use crate::error::{Error, Result};
use crate::message::{DiscoveryRequest, DiscoveryResponse};
use crate::resource::StreamKind;
use crate::runtime::Runtime;
use crate::transport::Transport;

pub mod config;
mod session;

use config::CallOptions;
#[cfg(all(feature = "transport-tonic", feature = "codegen-prost"))]
use config::UpstreamConfig;
use session::{Ack, ReceiveLoop, SendLoop};

/// Client for the origin management server.
///
/// Each call to [`open_stream`](Self::open_stream) opens an independent
/// stream; nothing is shared between streams except the transport.
#[derive(Debug)]
pub struct UpstreamClient<T, C, R> {
    transport: T,
    codec: Arc<C>,
    runtime: R,
    options: CallOptions,
}

#[cfg(all(feature = "transport-tonic", feature = "codegen-prost"))]
impl
    UpstreamClient<
        crate::transport::tonic::TonicTransport,
        crate::codec::prost::ProstCodec,
        crate::runtime::tokio::TokioRuntime,
    >
{
    /// Connect to the origin server over gRPC.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Connection`] if the URI is invalid or the channel
    /// cannot be established.
    pub async fn connect(config: UpstreamConfig) -> Result<Self> {
        let transport = crate::transport::tonic::TonicTransport::connect(config.server_uri).await?;
        Ok(Self::new(
            transport,
            crate::codec::prost::ProstCodec,
            crate::runtime::tokio::TokioRuntime,
            config.call_options,
        ))
    }
}

impl<T, C, R> UpstreamClient<T, C, R>
where
    T: Transport,
    C: XdsCodec,
    R: Runtime,
{
    /// Create a client from its parts.
    pub fn new(transport: T, codec: C, runtime: R, options: CallOptions) -> Self {
        Self {
            transport,
            codec: Arc::new(codec),
            runtime,
            options,
        }
    }

    /// Options applied to every stream.
    pub fn call_options(&self) -> &CallOptions {
        &self.options
    }

    /// Open a stream for `request.type_url` and subscribe with `request`.
    ///
    /// The initial request is sent as given, with empty `version_info` and
    /// `response_nonce`. Each response the caller receives is acknowledged
    /// with a copy of `request` carrying that response's version and nonce.
    ///
    /// The returned stream ends when the origin closes the stream, a send
    /// fails or exceeds the configured timeout, a receive fails, or the
    /// handle is cancelled. Dropping the stream also tears the session down
    /// once the next response arrives.
    ///
    /// # Errors
    ///
    /// - [`Error::UnsupportedResource`] if the type URL names no known
    ///   resource type. No stream is opened.
    /// - [`Error::StreamCreation`] if the transport fails to open the
    ///   stream.
    pub async fn open_stream(
        &self,
        mut request: DiscoveryRequest,
    ) -> Result<(ResponseStream, StreamHandle)> {
        let Some(kind) = StreamKind::from_type_url(&request.type_url) else {
            return Err(Error::UnsupportedResource {
                type_url: request.type_url,
            });
        };

        let (sender, receiver) = match self.transport.new_stream(kind).await {
            Ok(halves) => halves,
            Err(source) => {
                warn!(
                    type_url = %request.type_url,
                    error = %source,
                    "failed to open upstream stream"
                );
                return Err(Error::StreamCreation {
                    type_url: request.type_url,
                    source: Box::new(source),
                });
            }
        };
        debug!(
            type_url = %request.type_url,
            api_version = %kind.version,
            "opened upstream stream"
        );

        request.version_info.clear();
        request.response_nonce.clear();

        let token = CancellationToken::new();
        let (response_tx, response_rx) = mpsc::channel(1);
        let (ack_tx, ack_rx) = mpsc::channel::<Ack>(1);

        self.runtime.spawn(
            ReceiveLoop {
                type_url: request.type_url.clone(),
                receiver,
                codec: Arc::clone(&self.codec),
                responses: response_tx,
                acks: ack_tx,
                token: token.clone(),
            }
            .run(),
        );
        self.runtime.spawn(
            SendLoop {
                request,
                sender,
                codec: Arc::clone(&self.codec),
                runtime: self.runtime.clone(),
                timeout: self.options.timeout,
                acks: ack_rx,
                token: token.clone(),
            }
            .run(),
        );

        Ok((
            ResponseStream { inner: response_rx },
            StreamHandle { token },
        ))
    }
}

/// Responses from one upstream stream, in arrival order.
///
/// Ends once the stream is torn down.
#[derive(Debug)]
pub struct ResponseStream {
    inner: mpsc::Receiver<DiscoveryResponse>,
}

impl ResponseStream {
    /// Wait for the next response. `None` means the stream has ended.
    pub async fn recv(&mut self) -> Option<DiscoveryResponse> {
        self.inner.recv().await
    }
}

impl Stream for ResponseStream {
    type Item = DiscoveryResponse;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.inner.poll_recv(cx)
    }
}

/// Cancels an upstream stream.
#[derive(Debug, Clone)]
pub struct StreamHandle {
    token: CancellationToken,
}

impl StreamHandle {
    /// Stop both stream tasks. The response stream ends shortly after.
    ///
    /// Safe to call any number of times, from any task.
    pub fn cancel(&self) {
        self.token.cancel();
    }

    /// Whether the stream has been torn down or cancelled.
    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Wait until the stream is torn down.
    pub async fn cancelled(&self) {
        self.token.cancelled().await;
    }
}
