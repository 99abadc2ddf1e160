//! Codec for encoding/decoding xDS messages.
//!
//! The codec layer converts between crate-owned message types
//! ([`DiscoveryRequest`], [`DiscoveryResponse`]) and serialized bytes.
//! The v2 and v3 discovery messages share field numbers, so one codec
//! serves both API generations.

use crate::error::Result;
use crate::message::{DiscoveryRequest, DiscoveryResponse};
use bytes::Bytes;

#[cfg(feature = "codegen-prost")]
pub mod prost;

/// Trait for encoding/decoding xDS discovery messages.
///
/// The upstream client encodes requests and decodes responses. The
/// downstream side of the relay needs the opposite direction.
pub trait XdsCodec: Send + Sync + 'static {
    /// Encode a [`DiscoveryRequest`] to bytes.
    fn encode_request(&self, request: &DiscoveryRequest) -> Result<Bytes>;

    /// Decode bytes into a [`DiscoveryRequest`].
    fn decode_request(&self, bytes: Bytes) -> Result<DiscoveryRequest>;

    /// Encode a [`DiscoveryResponse`] to bytes.
    fn encode_response(&self, response: &DiscoveryResponse) -> Result<Bytes>;

    /// Decode bytes into a [`DiscoveryResponse`].
    fn decode_response(&self, bytes: Bytes) -> Result<DiscoveryResponse>;
}
