//! Known xDS resource types.
//!
//! Only the type URLs listed here may open an upstream stream. Each one
//! maps to a per-type streaming RPC on the origin server.

use std::fmt;

/// Type URL constants for the v2 API.
pub mod v2 {
    /// Listener resources.
    pub const LISTENER: &str = "type.googleapis.com/envoy.api.v2.Listener";
    /// Cluster resources.
    pub const CLUSTER: &str = "type.googleapis.com/envoy.api.v2.Cluster";
    /// Route configuration resources.
    pub const ROUTE: &str = "type.googleapis.com/envoy.api.v2.RouteConfiguration";
    /// Endpoint assignment resources.
    pub const ENDPOINT: &str = "type.googleapis.com/envoy.api.v2.ClusterLoadAssignment";
}

/// Type URL constants for the v3 API.
pub mod v3 {
    /// Listener resources.
    pub const LISTENER: &str = "type.googleapis.com/envoy.config.listener.v3.Listener";
    /// Cluster resources.
    pub const CLUSTER: &str = "type.googleapis.com/envoy.config.cluster.v3.Cluster";
    /// Route configuration resources.
    pub const ROUTE: &str = "type.googleapis.com/envoy.config.route.v3.RouteConfiguration";
    /// Endpoint assignment resources.
    pub const ENDPOINT: &str =
        "type.googleapis.com/envoy.config.endpoint.v3.ClusterLoadAssignment";
}

/// Generation of the xDS API schema.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ApiVersion {
    /// `envoy.api.v2`
    V2,
    /// `envoy.service.*.v3`
    V3,
}

impl ApiVersion {
    /// Short name used in logs and errors.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::V2 => "v2",
            Self::V3 => "v3",
        }
    }
}

impl fmt::Display for ApiVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Kind of resource carried on a discovery stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResourceType {
    /// LDS
    Listener,
    /// CDS
    Cluster,
    /// RDS
    Route,
    /// EDS
    Endpoint,
}

impl ResourceType {
    /// All known resource types.
    pub const ALL: [ResourceType; 4] = [
        ResourceType::Listener,
        ResourceType::Cluster,
        ResourceType::Route,
        ResourceType::Endpoint,
    ];

    /// Resolve a type URL into its API version and resource type.
    ///
    /// Returns `None` for any type URL outside the known set.
    pub fn from_type_url(type_url: &str) -> Option<(ApiVersion, ResourceType)> {
        [ApiVersion::V2, ApiVersion::V3]
            .into_iter()
            .flat_map(|version| Self::ALL.into_iter().map(move |kind| (version, kind)))
            .find(|(version, kind)| kind.type_url(*version) == type_url)
    }

    /// The type URL for this resource type in the given API version.
    pub fn type_url(self, version: ApiVersion) -> &'static str {
        match (version, self) {
            (ApiVersion::V2, Self::Listener) => v2::LISTENER,
            (ApiVersion::V2, Self::Cluster) => v2::CLUSTER,
            (ApiVersion::V2, Self::Route) => v2::ROUTE,
            (ApiVersion::V2, Self::Endpoint) => v2::ENDPOINT,
            (ApiVersion::V3, Self::Listener) => v3::LISTENER,
            (ApiVersion::V3, Self::Cluster) => v3::CLUSTER,
            (ApiVersion::V3, Self::Route) => v3::ROUTE,
            (ApiVersion::V3, Self::Endpoint) => v3::ENDPOINT,
        }
    }

    /// The gRPC path of the state-of-the-world streaming method serving
    /// this resource type.
    pub fn stream_path(self, version: ApiVersion) -> &'static str {
        match (version, self) {
            (ApiVersion::V2, Self::Listener) => {
                "/envoy.api.v2.ListenerDiscoveryService/StreamListeners"
            }
            (ApiVersion::V2, Self::Cluster) => "/envoy.api.v2.ClusterDiscoveryService/StreamClusters",
            (ApiVersion::V2, Self::Route) => "/envoy.api.v2.RouteDiscoveryService/StreamRoutes",
            (ApiVersion::V2, Self::Endpoint) => {
                "/envoy.api.v2.EndpointDiscoveryService/StreamEndpoints"
            }
            (ApiVersion::V3, Self::Listener) => {
                "/envoy.service.listener.v3.ListenerDiscoveryService/StreamListeners"
            }
            (ApiVersion::V3, Self::Cluster) => {
                "/envoy.service.cluster.v3.ClusterDiscoveryService/StreamClusters"
            }
            (ApiVersion::V3, Self::Route) => {
                "/envoy.service.route.v3.RouteDiscoveryService/StreamRoutes"
            }
            (ApiVersion::V3, Self::Endpoint) => {
                "/envoy.service.endpoint.v3.EndpointDiscoveryService/StreamEndpoints"
            }
        }
    }
}

/// Target of an upstream stream: a resource type in one API generation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct StreamKind {
    /// API generation.
    pub version: ApiVersion,
    /// Resource type.
    pub resource: ResourceType,
}

impl StreamKind {
    /// Resolve the stream kind for a type URL.
    pub fn from_type_url(type_url: &str) -> Option<Self> {
        ResourceType::from_type_url(type_url).map(|(version, resource)| Self { version, resource })
    }

    /// The type URL served on this stream.
    pub fn type_url(self) -> &'static str {
        self.resource.type_url(self.version)
    }

    /// The gRPC path of the streaming method.
    pub fn path(self) -> &'static str {
        self.resource.stream_path(self.version)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_type_url_known() {
        assert_eq!(
            ResourceType::from_type_url(v2::LISTENER),
            Some((ApiVersion::V2, ResourceType::Listener))
        );
        assert_eq!(
            ResourceType::from_type_url(v3::ENDPOINT),
            Some((ApiVersion::V3, ResourceType::Endpoint))
        );
    }

    #[test]
    fn test_from_type_url_unknown() {
        assert_eq!(ResourceType::from_type_url(""), None);
        assert_eq!(
            ResourceType::from_type_url("type.googleapis.com/envoy.config.core.v3.Secret"),
            None
        );
        // Type URLs are matched exactly.
        assert_eq!(ResourceType::from_type_url(&v3::CLUSTER.to_uppercase()), None);
    }

    #[test]
    fn test_every_type_url_resolves_to_itself() {
        for version in [ApiVersion::V2, ApiVersion::V3] {
            for kind in ResourceType::ALL {
                let type_url = kind.type_url(version);
                let stream = StreamKind::from_type_url(type_url).unwrap();
                assert_eq!(stream.type_url(), type_url);
                assert_eq!(stream.version, version);
                assert!(stream.path().starts_with("/envoy."));
            }
        }
    }

    #[test]
    fn test_stream_paths_are_distinct() {
        let mut paths: Vec<_> = [ApiVersion::V2, ApiVersion::V3]
            .into_iter()
            .flat_map(|v| ResourceType::ALL.into_iter().map(move |k| k.stream_path(v)))
            .collect();
        paths.sort_unstable();
        paths.dedup();
        assert_eq!(paths.len(), 8);
    }
}
