//! Version-agnostic request/response envelope.
//!
//! A downstream subscription is wrapped in a [`Request`] once, at the
//! point the concrete v2 or v3 gRPC method is invoked. From then on the
//! relay only asks it to [`create_response`](Request::create_response),
//! and the resulting [`Response`] exposes its concrete variant through
//! the closed [`Payload`] enum.

use std::fmt;
use std::sync::Arc;

use bytes::Bytes;

use crate::message::{DiscoveryRequest, DiscoveryResponse, ResourceAny};
use crate::resource::ApiVersion;

mod versioned;

pub use versioned::{RequestV2, RequestV3, ResponseV2, ResponseV3};

/// A downstream discovery request of either API generation.
pub trait Request: fmt::Debug + Send + Sync + 'static {
    /// API generation of this request.
    fn api_version(&self) -> ApiVersion;

    /// The wrapped discovery request.
    fn discovery_request(&self) -> &DiscoveryRequest;

    /// Build a response of the same API generation, correlated with this
    /// request.
    ///
    /// `marshaled_resources` are the serialized forms of `resources`, kept
    /// so the downstream writer need not serialize them again. It may be
    /// empty.
    fn create_response(
        self: Arc<Self>,
        version: String,
        resources: Vec<ResourceAny>,
        marshaled_resources: Vec<Bytes>,
    ) -> Box<dyn Response>;
}

/// A response destined for a downstream watch.
pub trait Response: fmt::Debug + Send + Sync {
    /// The concrete variant behind this response.
    fn payload(&self) -> Payload<'_>;
}

/// Concrete response variants.
#[derive(Debug, Clone, Copy)]
pub enum Payload<'a> {
    /// A v2 response.
    V2(&'a ResponseV2),
    /// A v3 response.
    V3(&'a ResponseV3),
}

impl Payload<'_> {
    /// API generation of the payload.
    pub fn api_version(&self) -> ApiVersion {
        match self {
            Payload::V2(_) => ApiVersion::V2,
            Payload::V3(_) => ApiVersion::V3,
        }
    }
}

/// A response variant that a watch can carry.
///
/// Implemented only by [`ResponseV2`] and [`ResponseV3`].
pub trait VersionedResponse: Response + Clone + sealed::Sealed + 'static {
    /// The request variant this response correlates with.
    type Request: Request + From<DiscoveryRequest>;

    /// API generation of this variant.
    const API_VERSION: ApiVersion;

    /// Extract this variant from a payload, if it is one.
    fn from_payload(payload: Payload<'_>) -> Option<&Self>;
}

mod sealed {
    pub trait Sealed {}
    impl Sealed for super::ResponseV2 {}
    impl Sealed for super::ResponseV3 {}
}

/// Render a wire response. Pre-marshaled bytes win over the resource
/// values when one is present for every resource.
fn render(
    type_url: &str,
    version: &str,
    resources: &[ResourceAny],
    marshaled_resources: &[Bytes],
    nonce: &str,
) -> DiscoveryResponse {
    let resources = if !marshaled_resources.is_empty()
        && marshaled_resources.len() == resources.len()
    {
        resources
            .iter()
            .zip(marshaled_resources)
            .map(|(resource, bytes)| ResourceAny {
                type_url: resource.type_url.clone(),
                value: bytes.clone(),
            })
            .collect()
    } else {
        resources.to_vec()
    };

    DiscoveryResponse {
        version_info: version.to_string(),
        resources,
        type_url: type_url.to_string(),
        nonce: nonce.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resource::{v2 as v2_types, v3 as v3_types};

    fn assert_request<T: Request>() {}
    fn assert_versioned<T: VersionedResponse>() {}

    #[test]
    fn test_variants_implement_capabilities() {
        assert_request::<RequestV2>();
        assert_request::<RequestV3>();
        assert_versioned::<ResponseV2>();
        assert_versioned::<ResponseV3>();
        assert_eq!(ResponseV2::API_VERSION, ApiVersion::V2);
        assert_eq!(ResponseV3::API_VERSION, ApiVersion::V3);
    }

    fn resource(value: &'static str) -> ResourceAny {
        ResourceAny {
            type_url: v3_types::CLUSTER.to_string(),
            value: Bytes::from_static(value.as_bytes()),
        }
    }

    #[test]
    fn test_create_response_keeps_variant() {
        let v2: Arc<dyn Request> = Arc::new(RequestV2::new(DiscoveryRequest::new(
            v2_types::LISTENER,
        )));
        let v3: Arc<dyn Request> = Arc::new(RequestV3::new(DiscoveryRequest::new(
            v3_types::LISTENER,
        )));

        let response = v2.create_response("1".to_string(), vec![], vec![]);
        assert!(matches!(response.payload(), Payload::V2(r) if r.version() == "1"));
        assert_eq!(response.payload().api_version(), ApiVersion::V2);

        let response = v3.create_response("2".to_string(), vec![], vec![]);
        assert!(matches!(response.payload(), Payload::V3(r) if r.version() == "2"));
        assert_eq!(response.payload().api_version(), ApiVersion::V3);
    }

    #[test]
    fn test_from_payload_rejects_other_variant() {
        let request = Arc::new(RequestV3::new(DiscoveryRequest::new(v3_types::ROUTE)));
        let response = request.create_response("3".to_string(), vec![], vec![]);

        assert!(ResponseV3::from_payload(response.payload()).is_some());
        assert!(ResponseV2::from_payload(response.payload()).is_none());
    }

    #[test]
    fn test_render_prefers_marshaled_bytes() {
        let resources = vec![resource("a"), resource("b")];
        let marshaled = vec![Bytes::from_static(b"A"), Bytes::from_static(b"B")];

        let rendered = render(v3_types::CLUSTER, "9", &resources, &marshaled, "n");
        let values: Vec<_> = rendered.resources.iter().map(|r| r.value.clone()).collect();
        assert_eq!(values, marshaled);
        assert_eq!(rendered.version_info, "9");
        assert_eq!(rendered.nonce, "n");
        assert_eq!(rendered.type_url, v3_types::CLUSTER);
    }

    #[test]
    fn test_render_falls_back_to_resource_values() {
        let resources = vec![resource("a"), resource("b")];

        let rendered = render(v3_types::CLUSTER, "9", &resources, &[], "");
        assert_eq!(rendered.resources, resources);

        // Partial marshaled sets are ignored.
        let rendered = render(
            v3_types::CLUSTER,
            "9",
            &resources,
            &[Bytes::from_static(b"A")],
            "",
        );
        assert_eq!(rendered.resources, resources);
    }
}
