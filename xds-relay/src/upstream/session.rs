//! The two tasks behind one upstream stream.
//!
//! The sender task writes the initial request and then one ACK per
//! response; the receiver task reads responses, hands them to the caller
//! and tells the sender what to acknowledge. Both share a cancellation
//! token, and whichever task stops first cancels it so the other follows.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace, warn};

use crate::codec::XdsCodec;
use crate::error::Result;
use crate::message::{DiscoveryRequest, DiscoveryResponse};
use crate::runtime::Runtime;
use crate::transport::{StreamReceiver, StreamSender};

/// Version and nonce to echo on the next request.
#[derive(Debug, Default)]
pub(super) struct Ack {
    version_info: String,
    nonce: String,
}

impl From<&DiscoveryResponse> for Ack {
    fn from(response: &DiscoveryResponse) -> Self {
        Self {
            version_info: response.version_info.clone(),
            nonce: response.nonce.clone(),
        }
    }
}

pub(super) struct SendLoop<S, C, R> {
    pub(super) request: DiscoveryRequest,
    pub(super) sender: S,
    pub(super) codec: Arc<C>,
    pub(super) runtime: R,
    pub(super) timeout: Duration,
    pub(super) acks: mpsc::Receiver<Ack>,
    pub(super) token: CancellationToken,
}

impl<S, C, R> SendLoop<S, C, R>
where
    S: StreamSender,
    C: XdsCodec,
    R: Runtime,
{
    pub(super) async fn run(mut self) {
        // The initial request goes out with empty version and nonce.
        let mut ack = Ack::default();

        loop {
            self.request.version_info = ack.version_info;
            self.request.response_nonce = ack.nonce;

            if let Err(error) = self.send_current().await {
                warn!(
                    type_url = %self.request.type_url,
                    version_info = %self.request.version_info,
                    nonce = %self.request.response_nonce,
                    %error,
                    "failed to send request upstream"
                );
                self.token.cancel();
                return;
            }

            ack = tokio::select! {
                biased;
                _ = self.token.cancelled() => return,
                next = self.acks.recv() => match next {
                    Some(ack) => ack,
                    None => return,
                },
            };
        }
    }

    async fn send_current(&mut self) -> Result<()> {
        let bytes = self.codec.encode_request(&self.request)?;
        trace!(
            type_url = %self.request.type_url,
            version_info = %self.request.version_info,
            nonce = %self.request.response_nonce,
            "sending request upstream"
        );

        tokio::select! {
            biased;
            _ = self.token.cancelled() => Ok(()),
            sent = self.runtime.timeout(self.timeout, self.sender.send(bytes)) => {
                sent.and_then(|sent| sent)
            }
        }
    }
}

pub(super) struct ReceiveLoop<S, C> {
    pub(super) type_url: String,
    pub(super) receiver: S,
    pub(super) codec: Arc<C>,
    pub(super) responses: mpsc::Sender<DiscoveryResponse>,
    pub(super) acks: mpsc::Sender<Ack>,
    pub(super) token: CancellationToken,
}

impl<S, C> ReceiveLoop<S, C>
where
    S: StreamReceiver,
    C: XdsCodec,
{
    pub(super) async fn run(mut self) {
        let reason = self.receive().await;
        self.token.cancel();
        debug!(type_url = %self.type_url, reason, "upstream stream closed");
    }

    async fn receive(&mut self) -> &'static str {
        loop {
            let next = tokio::select! {
                biased;
                _ = self.token.cancelled() => return "cancelled",
                next = self.receiver.recv() => next,
            };

            let bytes = match next {
                Ok(Some(bytes)) => bytes,
                Ok(None) => return "closed by origin",
                Err(error) => {
                    warn!(type_url = %self.type_url, %error, "upstream receive failed");
                    return "receive failed";
                }
            };

            let response = match self.codec.decode_response(bytes) {
                Ok(response) => response,
                Err(error) => {
                    warn!(type_url = %self.type_url, %error, "undecodable upstream response");
                    return "decode failed";
                }
            };
            trace!(
                type_url = %self.type_url,
                version_info = %response.version_info,
                nonce = %response.nonce,
                resources = response.resources.len(),
                "received response"
            );

            let ack = Ack::from(&response);

            tokio::select! {
                biased;
                _ = self.token.cancelled() => return "cancelled",
                sent = self.responses.send(response) => {
                    if sent.is_err() {
                        return "response stream dropped";
                    }
                }
            }

            tokio::select! {
                biased;
                _ = self.token.cancelled() => return "cancelled",
                sent = self.acks.send(ack) => {
                    if sent.is_err() {
                        return "sender stopped";
                    }
                }
            }
        }
    }
}
