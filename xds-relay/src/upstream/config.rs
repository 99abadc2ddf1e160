//! Configuration for the upstream client.

use std::time::Duration;

use crate::error::{Error, Result};

/// Send timeout applied when none is configured.
pub const DEFAULT_SEND_TIMEOUT: Duration = Duration::from_secs(5);

/// Per-call options of the upstream client.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CallOptions {
    /// Upper bound on a single send to the origin server.
    ///
    /// A send that does not complete in time tears the stream down.
    ///
    /// Default: 5 seconds.
    pub timeout: Duration,
}

impl CallOptions {
    /// Create options with the given send timeout.
    ///
    /// # Errors
    ///
    /// Returns an error if `timeout` is zero.
    ///
    /// # Example
    ///
    /// ```
    /// use xds_relay::CallOptions;
    /// use std::time::Duration;
    ///
    /// let options = CallOptions::new(Duration::from_millis(500))?;
    /// assert_eq!(options.timeout, Duration::from_millis(500));
    /// # Ok::<(), xds_relay::Error>(())
    /// ```
    pub fn new(timeout: Duration) -> Result<Self> {
        Self::default().with_timeout(timeout)
    }

    /// Set the send timeout.
    ///
    /// # Errors
    ///
    /// Returns an error if `timeout` is zero.
    pub fn with_timeout(mut self, timeout: Duration) -> Result<Self> {
        if timeout.is_zero() {
            return Err(Error::Validation(
                "send timeout must be greater than zero".into(),
            ));
        }
        self.timeout = timeout;
        Ok(self)
    }
}

impl Default for CallOptions {
    fn default() -> Self {
        Self {
            timeout: DEFAULT_SEND_TIMEOUT,
        }
    }
}

/// Configuration for connecting to the origin server.
#[derive(Debug, Clone)]
pub struct UpstreamConfig {
    /// URI of the origin management server, e.g. `http://origin:18000`.
    pub server_uri: String,

    /// Options applied to every stream.
    pub call_options: CallOptions,
}

impl UpstreamConfig {
    /// Create a configuration for `server_uri` with default call options.
    ///
    /// # Example
    ///
    /// ```
    /// use xds_relay::{CallOptions, UpstreamConfig};
    /// use std::time::Duration;
    ///
    /// let config = UpstreamConfig::new("http://origin:18000")
    ///     .with_call_options(CallOptions::new(Duration::from_secs(1)).unwrap());
    /// assert_eq!(config.call_options.timeout, Duration::from_secs(1));
    /// ```
    pub fn new(server_uri: impl Into<String>) -> Self {
        Self {
            server_uri: server_uri.into(),
            call_options: CallOptions::default(),
        }
    }

    /// Set the call options.
    pub fn with_call_options(mut self, call_options: CallOptions) -> Self {
        self.call_options = call_options;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_timeout() {
        assert_eq!(CallOptions::default().timeout, DEFAULT_SEND_TIMEOUT);
        assert_eq!(
            UpstreamConfig::new("http://localhost:18000").call_options,
            CallOptions::default()
        );
    }

    #[test]
    fn test_zero_timeout_rejected() {
        assert!(matches!(
            CallOptions::new(Duration::ZERO),
            Err(Error::Validation(_))
        ));
        assert!(CallOptions::default().with_timeout(Duration::ZERO).is_err());
    }

    #[test]
    fn test_with_timeout() {
        let options = CallOptions::default()
            .with_timeout(Duration::from_nanos(1))
            .unwrap();
        assert_eq!(options.timeout, Duration::from_nanos(1));
    }
}
