//! Error types for the xDS relay.

use std::time::Duration;

use thiserror::Error;

/// Error type for the xDS relay.
#[derive(Debug, Error)]
pub enum Error {
    /// The request's type URL is not one of the known resource types.
    #[error("unsupported resource type: {type_url:?}")]
    UnsupportedResource {
        /// The rejected type URL.
        type_url: String,
    },

    /// The transport failed to establish the duplex stream.
    #[error("failed to open stream for {type_url}: {source}")]
    StreamCreation {
        /// Type URL of the stream that could not be opened.
        type_url: String,
        /// Underlying transport error.
        #[source]
        source: Box<Error>,
    },

    /// A send did not complete within the configured timeout.
    #[error("send did not complete within {0:?}")]
    SendTimeout(Duration),

    /// A watch was handed a response built for the other API version.
    #[error("payload of type {actual} could not be delivered to a {expected} watch")]
    PayloadMismatch {
        /// API version of the watch.
        expected: &'static str,
        /// API version of the offered payload.
        actual: &'static str,
    },

    /// A send was attempted on a watch that has been closed.
    #[error("watch is closed")]
    WatchClosed,

    /// The unary fetch entry point was invoked.
    #[error("Fetch is not supported")]
    FetchNotSupported,

    /// Connection to the origin server could not be established.
    #[error("connection error: {0}")]
    Connection(String),

    /// The stream was closed.
    #[error("stream closed")]
    StreamClosed,

    /// A configuration value was rejected.
    #[error("validation error: {0}")]
    Validation(String),

    /// gRPC status returned by the origin server.
    #[cfg(feature = "transport-tonic")]
    #[error("stream error: {0}")]
    Stream(#[from] tonic::Status),

    /// Protobuf decoding failed.
    #[cfg(feature = "codegen-prost")]
    #[error("decode error: {0}")]
    Decode(#[from] prost::DecodeError),
}

/// Result type alias for xDS relay operations.
pub type Result<T> = std::result::Result<T, Error>;
