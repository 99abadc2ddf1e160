//! Example demonstrating the upstream client.
//!
//! This example shows:
//! - How to connect an `UpstreamClient` to an origin server over tonic
//! - How to open a discovery stream and read the responses it ACKs
//!
//! # Configuration (environment variables)
//!
//! - `XDS_SERVER`: URI of the origin management server (default: `http://localhost:18000`)
//! - `XDS_TYPE_URL`: Resource type to subscribe to (default: v3 Listener)
//! - `XDS_RESOURCES`: Comma-separated resource names (default: wildcard)
//! - `XDS_SEND_TIMEOUT_MS`: Send timeout in milliseconds (default: 5000)
//!
//! # Usage
//!
//! ```sh
//! RUST_LOG=xds_relay=trace cargo run -p xds-relay --example upstream
//!
//! XDS_TYPE_URL=type.googleapis.com/envoy.api.v2.Cluster \
//!   cargo run -p xds-relay --example upstream
//! ```

use std::time::Duration;

use tracing_subscriber::EnvFilter;
use xds_relay::resource::v3;
use xds_relay::{CallOptions, DiscoveryRequest, Node, UpstreamClient, UpstreamConfig};

struct Args {
    server: String,
    type_url: String,
    resources: Vec<String>,
    call_options: CallOptions,
}

fn parse_args() -> Result<Args, Box<dyn std::error::Error>> {
    let server =
        std::env::var("XDS_SERVER").unwrap_or_else(|_| "http://localhost:18000".to_string());
    let type_url = std::env::var("XDS_TYPE_URL").unwrap_or_else(|_| v3::LISTENER.to_string());

    let resources = std::env::var("XDS_RESOURCES")
        .map(|names| {
            names
                .split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect()
        })
        .unwrap_or_default();

    let call_options = match std::env::var("XDS_SEND_TIMEOUT_MS") {
        Ok(ms) => CallOptions::new(Duration::from_millis(ms.parse()?))?,
        Err(_) => CallOptions::default(),
    };

    Ok(Args {
        server,
        type_url,
        resources,
        call_options,
    })
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let args = parse_args()?;
    println!("Connecting to origin server: {}", args.server);

    let config = UpstreamConfig::new(&args.server).with_call_options(args.call_options);
    let client = UpstreamClient::connect(config).await?;

    let request = DiscoveryRequest::new(&args.type_url)
        .with_node(Node::new("xds-relay", env!("CARGO_PKG_VERSION")).with_id("example-relay"))
        .with_resource_names(args.resources);

    let (mut responses, handle) = client.open_stream(request).await?;
    println!("Subscribed to {}\n", args.type_url);

    loop {
        tokio::select! {
            response = responses.recv() => {
                let Some(response) = response else {
                    println!("Stream closed by the origin or after an error");
                    break;
                };
                println!("Response received:");
                println!("  version:   {}", response.version_info);
                println!("  nonce:     {}", response.nonce);
                println!("  resources: {}", response.resources.len());
                println!();
            }
            _ = tokio::signal::ctrl_c() => {
                handle.cancel();
                break;
            }
        }
    }

    println!("Exiting");
    Ok(())
}
