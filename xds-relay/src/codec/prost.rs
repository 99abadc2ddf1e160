//! Prost-based codec using envoy-types.

use crate::codec::XdsCodec;
use crate::error::Result;
use crate::message::{DiscoveryRequest, DiscoveryResponse, ErrorDetail, Locality, Node, ResourceAny};
use bytes::Bytes;
use envoy_types::pb::envoy::config::core::v3 as core;
use envoy_types::pb::envoy::service::discovery::v3 as discovery;
use envoy_types::pb::google::protobuf::Any;
use envoy_types::pb::google::rpc::Status;
use prost::Message;

/// A codec that uses prost/envoy-types for serialization.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProstCodec;

fn node_to_proto(node: &Node) -> core::Node {
    core::Node {
        id: node.id.clone(),
        cluster: node.cluster.clone(),
        user_agent_name: node.user_agent_name.clone(),
        user_agent_version_type: (!node.user_agent_version.is_empty()).then(|| {
            core::node::UserAgentVersionType::UserAgentVersion(node.user_agent_version.clone())
        }),
        locality: node.locality.as_ref().map(|l| core::Locality {
            region: l.region.clone(),
            zone: l.zone.clone(),
            sub_zone: l.sub_zone.clone(),
        }),
        ..Default::default()
    }
}

fn node_from_proto(node: core::Node) -> Node {
    let user_agent_version = match node.user_agent_version_type {
        Some(core::node::UserAgentVersionType::UserAgentVersion(version)) => version,
        _ => String::new(),
    };
    Node {
        id: node.id,
        cluster: node.cluster,
        locality: node.locality.map(|l| Locality {
            region: l.region,
            zone: l.zone,
            sub_zone: l.sub_zone,
        }),
        user_agent_name: node.user_agent_name,
        user_agent_version,
    }
}

impl XdsCodec for ProstCodec {
    fn encode_request(&self, request: &DiscoveryRequest) -> Result<Bytes> {
        let proto_request = discovery::DiscoveryRequest {
            version_info: request.version_info.clone(),
            node: request.node.as_ref().map(node_to_proto),
            resource_names: request.resource_names.clone(),
            type_url: request.type_url.clone(),
            response_nonce: request.response_nonce.clone(),
            error_detail: request.error_detail.as_ref().map(|e| Status {
                code: e.code,
                message: e.message.clone(),
                details: vec![],
            }),
            ..Default::default()
        };

        Ok(proto_request.encode_to_vec().into())
    }

    fn decode_request(&self, bytes: Bytes) -> Result<DiscoveryRequest> {
        let proto_request = discovery::DiscoveryRequest::decode(bytes)?;

        Ok(DiscoveryRequest {
            version_info: proto_request.version_info,
            node: proto_request.node.map(node_from_proto),
            resource_names: proto_request.resource_names,
            type_url: proto_request.type_url,
            response_nonce: proto_request.response_nonce,
            error_detail: proto_request.error_detail.map(|status| ErrorDetail {
                code: status.code,
                message: status.message,
            }),
        })
    }

    fn encode_response(&self, response: &DiscoveryResponse) -> Result<Bytes> {
        let proto_response = discovery::DiscoveryResponse {
            version_info: response.version_info.clone(),
            resources: response
                .resources
                .iter()
                .map(|resource| Any {
                    type_url: resource.type_url.clone(),
                    value: resource.value.to_vec(),
                })
                .collect(),
            type_url: response.type_url.clone(),
            nonce: response.nonce.clone(),
            ..Default::default()
        };

        Ok(proto_response.encode_to_vec().into())
    }

    fn decode_response(&self, bytes: Bytes) -> Result<DiscoveryResponse> {
        let proto_response = discovery::DiscoveryResponse::decode(bytes)?;

        Ok(DiscoveryResponse {
            version_info: proto_response.version_info,
            resources: proto_response
                .resources
                .into_iter()
                .map(|any| ResourceAny {
                    type_url: any.type_url,
                    value: any.value.into(),
                })
                .collect(),
            type_url: proto_response.type_url,
            nonce: proto_response.nonce,
        })
    }
}
