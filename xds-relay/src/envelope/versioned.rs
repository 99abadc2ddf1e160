use std::sync::Arc;

use bytes::Bytes;

use super::{Payload, Request, Response, VersionedResponse, render};
use crate::message::{DiscoveryRequest, DiscoveryResponse, ResourceAny};
use crate::resource::ApiVersion;

/// Defines the request/response pair of one API generation.
///
/// `$variant` names both the [`ApiVersion`] and the [`Payload`] arm that
/// the pair maps to; `$other` is the arm it must reject.
macro_rules! versioned_envelope {
    (
        $variant:ident, $other:ident,
        $(#[$request_meta:meta])* request $request:ident,
        $(#[$response_meta:meta])* response $response:ident $(,)?
    ) => {
        $(#[$request_meta])*
        #[derive(Debug, Clone)]
        pub struct $request {
            request: DiscoveryRequest,
        }

        impl $request {
            /// Wrap a request received on a method of this generation.
            pub fn new(request: DiscoveryRequest) -> Self {
                Self { request }
            }
        }

        impl From<DiscoveryRequest> for $request {
            fn from(request: DiscoveryRequest) -> Self {
                Self::new(request)
            }
        }

        impl Request for $request {
            fn api_version(&self) -> ApiVersion {
                ApiVersion::$variant
            }

            fn discovery_request(&self) -> &DiscoveryRequest {
                &self.request
            }

            fn create_response(
                self: Arc<Self>,
                version: String,
                resources: Vec<ResourceAny>,
                marshaled_resources: Vec<Bytes>,
            ) -> Box<dyn Response> {
                Box::new($response {
                    request: self,
                    version,
                    resources,
                    marshaled_resources,
                })
            }
        }

        $(#[$response_meta])*
        #[derive(Debug, Clone)]
        pub struct $response {
            request: Arc<$request>,
            version: String,
            resources: Vec<ResourceAny>,
            marshaled_resources: Vec<Bytes>,
        }

        impl $response {
            /// The request this response answers.
            pub fn request(&self) -> &Arc<$request> {
                &self.request
            }

            /// Payload version.
            pub fn version(&self) -> &str {
                &self.version
            }

            /// Resources in delivery order.
            pub fn resources(&self) -> &[ResourceAny] {
                &self.resources
            }

            /// Serialized forms of [`resources`](Self::resources), possibly empty.
            pub fn marshaled_resources(&self) -> &[Bytes] {
                &self.marshaled_resources
            }

            /// Render the wire response under `nonce`.
            pub fn to_discovery_response(&self, nonce: &str) -> DiscoveryResponse {
                render(
                    &self.request.request.type_url,
                    &self.version,
                    &self.resources,
                    &self.marshaled_resources,
                    nonce,
                )
            }
        }

        impl Response for $response {
            fn payload(&self) -> Payload<'_> {
                Payload::$variant(self)
            }
        }

        impl VersionedResponse for $response {
            type Request = $request;

            const API_VERSION: ApiVersion = ApiVersion::$variant;

            fn from_payload(payload: Payload<'_>) -> Option<&Self> {
                match payload {
                    Payload::$variant(response) => Some(response),
                    Payload::$other(_) => None,
                }
            }
        }
    };
}

versioned_envelope! {
    V2, V3,
    /// A v2 (`envoy.api.v2`) discovery request.
    request RequestV2,
    /// A v2 response built from relay state.
    response ResponseV2,
}

versioned_envelope! {
    V3, V2,
    /// A v3 (`envoy.service.*.v3`) discovery request.
    request RequestV3,
    /// A v3 response built from relay state.
    response ResponseV3,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resource::{v2, v3};

    fn resource(type_url: &str) -> ResourceAny {
        ResourceAny {
            type_url: type_url.to_string(),
            value: Bytes::from_static(b"cla"),
        }
    }

    #[test]
    fn test_to_discovery_response_uses_request_type_url() {
        let request = Arc::new(RequestV2::new(
            DiscoveryRequest::new(v2::ENDPOINT).with_resource_names(["backend"]),
        ));
        let response = ResponseV2 {
            request: Arc::clone(&request),
            version: "4".to_string(),
            resources: vec![resource(v2::ENDPOINT)],
            marshaled_resources: vec![],
        };

        let wire = response.to_discovery_response("nonce-4");
        assert_eq!(wire.type_url, v2::ENDPOINT);
        assert_eq!(wire.version_info, "4");
        assert_eq!(wire.nonce, "nonce-4");
        assert_eq!(wire.resources, vec![resource(v2::ENDPOINT)]);
        assert!(Arc::ptr_eq(response.request(), &request));
    }

    #[test]
    fn test_generations_behave_alike() {
        let v2_request = Arc::new(RequestV2::from(DiscoveryRequest::new(v2::ROUTE)));
        let v3_request = Arc::new(RequestV3::from(DiscoveryRequest::new(v3::ROUTE)));
        assert_eq!(v2_request.api_version(), ApiVersion::V2);
        assert_eq!(v3_request.api_version(), ApiVersion::V3);

        let v2_response = v2_request.create_response(
            "1".to_string(),
            vec![resource(v2::ROUTE)],
            vec![Bytes::from_static(b"wire")],
        );
        let v3_response = v3_request.create_response(
            "1".to_string(),
            vec![resource(v3::ROUTE)],
            vec![Bytes::from_static(b"wire")],
        );

        let v2_wire = ResponseV2::from_payload(v2_response.payload())
            .unwrap()
            .to_discovery_response("n");
        let v3_wire = ResponseV3::from_payload(v3_response.payload())
            .unwrap()
            .to_discovery_response("n");

        assert_eq!(v2_wire.type_url, v2::ROUTE);
        assert_eq!(v3_wire.type_url, v3::ROUTE);
        for wire in [&v2_wire, &v3_wire] {
            assert_eq!(wire.version_info, "1");
            assert_eq!(wire.nonce, "n");
            assert_eq!(wire.resources[0].value, Bytes::from_static(b"wire"));
        }

        assert!(ResponseV3::from_payload(v2_response.payload()).is_none());
        assert!(ResponseV2::from_payload(v3_response.payload()).is_none());
    }
}
