//! Streaming core of an [xDS](https://www.envoyproxy.io/docs/envoy/latest/api-docs/xds_protocol) relay.
//!
//! A relay sits between many Envoy proxies and one origin management
//! server. This crate provides the two ends of that pipe:
//! - The upstream side: [`UpstreamClient`] opens state-of-the-world
//!   discovery streams to the origin, for v2 and v3 listener, cluster,
//!   route and endpoint types, and ACKs each response it forwards.
//! - The downstream side: [`DiscoveryServer`] turns each downstream
//!   subscription into a single-slot [`Watch`], and [`fanout`] delivers
//!   upstream state to every watch, replacing responses that were never
//!   read.
//!
//! Requests and responses of both API generations travel through the
//! version-agnostic [`envelope`].
//!
//! It does NOT contain:
//! - Aggregation of downstream requests into upstream streams
//! - Reconnection or retry of failed upstream streams
//! - Incremental (delta) discovery
//!
//! # Example
//!
//! ```ignore
//! use xds_relay::{DiscoveryRequest, Node, UpstreamClient, UpstreamConfig};
//!
//! let client = UpstreamClient::connect(UpstreamConfig::new("http://origin:18000")).await?;
//!
//! let request = DiscoveryRequest::new(xds_relay::resource::v3::CLUSTER)
//!     .with_node(Node::new("envoy", "1.30").with_id("relay"));
//! let (mut responses, handle) = client.open_stream(request).await?;
//!
//! while let Some(response) = responses.recv().await {
//!     // Hand the response to the cache; it has already been ACKed.
//!     println!("version {}", response.version_info);
//! }
//! // The stream ended. Open a new one to resubscribe.
//! handle.cancel();
//! ```
//!
//! # Feature Flags
//!
//! - `transport-tonic`: Enables the use of the `tonic` transport. This enables the `rt-tokio` feature. Enabled by default.
//! - `tonic-tls-ring` / `tonic-tls-aws-lc`: Enables TLS on channels passed to [`TonicTransport::from_channel`](transport::tonic::TonicTransport::from_channel).
//! - `rt-tokio`: Enables the use of the `tokio` runtime. Enabled by default.
//! - `codegen-prost`: Enables the `prost` codec built on `envoy-types`. Enabled by default.
//! - `test-util`: Exposes the in-memory `MockTransport` under `transport::mock`.

pub mod codec;
pub mod envelope;
pub mod error;
pub mod message;
pub mod resource;
pub mod runtime;
pub mod server;
pub mod transport;
pub mod upstream;
pub mod watch;

pub use codec::XdsCodec;
pub use envelope::{Payload, Request, RequestV2, RequestV3, Response, ResponseV2, ResponseV3};
pub use error::{Error, Result};
pub use message::{DiscoveryRequest, DiscoveryResponse, ErrorDetail, Locality, Node, ResourceAny};
pub use resource::{ApiVersion, ResourceType, StreamKind};
pub use runtime::Runtime;
pub use server::{Cache, DiscoveryServer, ServerV2, ServerV3, WatchCancel};
pub use transport::{StreamReceiver, StreamSender, Transport};
pub use upstream::config::{CallOptions, UpstreamConfig};
pub use upstream::{ResponseStream, StreamHandle, UpstreamClient};
pub use watch::{Watch, WatchReceiver, WatchV2, WatchV3, fanout};

// Tokio runtime
#[cfg(feature = "rt-tokio")]
pub use runtime::tokio::TokioRuntime;

// Tonic transport
#[cfg(feature = "transport-tonic")]
pub use transport::tonic::TonicTransport;

// Prost codec
#[cfg(feature = "codegen-prost")]
pub use codec::prost::ProstCodec;
