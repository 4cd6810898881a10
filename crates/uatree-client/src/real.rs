// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Real transport backed by the `opcua` crate.
//!
//! Binds [`UaConnector`] and [`UaSession`] to an actual OPC UA stack. The
//! wire protocol, secure channel, and session services all come from the
//! `opcua` crate; this module only maps between its types and the crate's
//! transport seam.
//!
//! The `opcua` client API is synchronous; service calls run under
//! [`tokio::task::spawn_blocking`] so the coordinator's discovery timeout
//! and the keep-alive machinery stay responsive.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use opcua::client::prelude::{
    BrowseDescription, BrowseDescriptionResultMask, BrowseDirection, Client, ClientBuilder,
    ConnectionStatusCallback, EndpointDescription, IdentityToken, MessageSecurityMode, ReadValueId,
    ReferenceTypeId, Session, SessionClosedCallback, TimestampsToReturn,
};
use opcua::sync::RwLock as OpcUaRwLock;
use opcua::types::{ByteString, StatusCode, UAString, Variant};

use crate::error::{BrowseError, ConnectError, ReadError};
use crate::transport::{
    AttributeValue, BrowseChunk, ContinuationPoint, EndpointInfo, KeepAliveSink, KeepAliveStatus,
    UaConnector, UaReference, UaSession, UaValue,
};
use crate::trust::{CertificateSummary, TrustDefect, TrustPolicy};
use crate::types::{
    AttributeId, ClientConfig, NodeClass, NodeId, NodeIdentifier, SecurityMode, SecurityPolicy,
};

// =============================================================================
// RealConnector
// =============================================================================

/// Session factory over the `opcua` crate.
pub struct RealConnector {
    /// Full endpoint descriptions from the last discovery, keyed by the
    /// reduced form handed to the coordinator.
    discovered: RwLock<HashMap<String, EndpointDescription>>,

    /// Session id source.
    next_session_id: AtomicU64,
}

impl RealConnector {
    /// Creates a connector.
    pub fn new() -> Self {
        Self {
            discovered: RwLock::new(HashMap::new()),
            next_session_id: AtomicU64::new(1),
        }
    }

    fn endpoint_key(url: &str, policy: SecurityPolicy, mode: SecurityMode) -> String {
        format!("{}|{}|{}", url, policy, mode)
    }

    fn build_client(config: &ClientConfig, trust_server_certs: bool) -> Result<Client, ConnectError> {
        let mut builder = ClientBuilder::new()
            .application_name(&config.application_name)
            .application_uri(&config.application_uri)
            .session_timeout(config.session_timeout.as_millis() as u32)
            // The coordinator owns reconnects; the stack must not retry on
            // its own underneath it.
            .session_retry_limit(0)
            .trust_server_certs(trust_server_certs);

        if let (Some(cert), Some(key)) = (&config.certificate_path, &config.private_key_path) {
            builder = builder.certificate_path(cert).private_key_path(key);
        }

        builder.client().ok_or_else(|| {
            ConnectError::invalid_endpoint(&config.endpoint, "failed to build OPC UA client")
        })
    }

    fn map_security_policy(uri: &str) -> SecurityPolicy {
        match uri.rsplit_once('#').map(|(_, name)| name) {
            Some("Basic128Rsa15") => SecurityPolicy::Basic128Rsa15,
            Some("Basic256") => SecurityPolicy::Basic256,
            Some("Basic256Sha256") => SecurityPolicy::Basic256Sha256,
            Some("Aes128_Sha256_RsaOaep") => SecurityPolicy::Aes128Sha256RsaOaep,
            Some("Aes256_Sha256_RsaPss") => SecurityPolicy::Aes256Sha256RsaPss,
            _ => SecurityPolicy::None,
        }
    }

    fn map_security_mode(mode: MessageSecurityMode) -> SecurityMode {
        match mode {
            MessageSecurityMode::Sign => SecurityMode::Sign,
            MessageSecurityMode::SignAndEncrypt => SecurityMode::SignAndEncrypt,
            _ => SecurityMode::None,
        }
    }

    /// Consults the trust policy for an endpoint that carries a server
    /// certificate outside the local trust store.
    fn server_certificate_accepted(
        endpoint: &EndpointDescription,
        trust: &TrustPolicy,
    ) -> bool {
        if endpoint.server_certificate.is_null() {
            return true;
        }

        let fingerprint = endpoint
            .server_certificate
            .value
            .as_ref()
            .map(|der| BASE64.encode(&der[..der.len().min(20)]))
            .unwrap_or_default();
        let summary =
            CertificateSummary::new(endpoint.server.application_uri.as_ref(), fingerprint);
        trust(&summary, TrustDefect::UntrustedIssuer).is_accepted()
    }
}

impl Default for RealConnector {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl UaConnector for RealConnector {
    async fn discover(&self, endpoint_url: &str) -> Result<Vec<EndpointInfo>, ConnectError> {
        let url = endpoint_url.to_string();
        let config = ClientConfig::default();

        let descriptions = tokio::task::spawn_blocking(move || {
            let client = Self::build_client(&config, false)?;
            client
                .get_server_endpoints_from_url(&url)
                .map_err(|status| {
                    ConnectError::unreachable(&url, format!("discovery failed: {}", status))
                })
        })
        .await
        .map_err(|e| ConnectError::unreachable(endpoint_url, format!("discovery task: {}", e)))??;

        let mut infos = Vec::with_capacity(descriptions.len());
        let mut discovered = self.discovered.write().await;
        discovered.clear();

        for description in descriptions {
            let info = EndpointInfo {
                url: description.endpoint_url.as_ref().to_string(),
                security_policy: Self::map_security_policy(
                    description.security_policy_uri.as_ref(),
                ),
                security_mode: Self::map_security_mode(description.security_mode),
                security_level: description.security_level,
            };
            discovered.insert(
                Self::endpoint_key(&info.url, info.security_policy, info.security_mode),
                description,
            );
            infos.push(info);
        }

        debug!(endpoint = %endpoint_url, count = infos.len(), "discovered endpoints");
        Ok(infos)
    }

    async fn create_session(
        &self,
        endpoint: &EndpointInfo,
        config: &ClientConfig,
        keep_alive: KeepAliveSink,
        trust: TrustPolicy,
    ) -> Result<Arc<dyn UaSession>, ConnectError> {
        let description = {
            let discovered = self.discovered.read().await;
            discovered
                .get(&Self::endpoint_key(
                    &endpoint.url,
                    endpoint.security_policy,
                    endpoint.security_mode,
                ))
                .cloned()
                .ok_or_else(|| {
                    ConnectError::no_acceptable_endpoint(&endpoint.url)
                })?
        };

        let accept_certificate = Self::server_certificate_accepted(&description, &trust);
        if !accept_certificate && !endpoint.is_unsecured() {
            return Err(ConnectError::session_rejected(
                "server certificate rejected by trust policy",
            ));
        }

        let session_id = self.next_session_id.fetch_add(1, Ordering::Relaxed);
        let owned_config = config.clone();
        let endpoint_url = endpoint.url.clone();

        let session = tokio::task::spawn_blocking(move || {
            let mut client = Self::build_client(&owned_config, accept_certificate)?;
            client
                .connect_to_endpoint(description, IdentityToken::Anonymous)
                .map_err(|status| {
                    ConnectError::session_rejected(format!(
                        "session creation failed: {}",
                        status
                    ))
                })
        })
        .await
        .map_err(|e| ConnectError::session_rejected(format!("connect task: {}", e)))??;

        // Wire the stack's connection status into the keep-alive sink; the
        // coordinator discards events once this session is replaced.
        {
            let sink = Arc::clone(&keep_alive);
            let mut locked = session.write();
            locked.set_connection_status_callback(ConnectionStatusCallback::new(
                move |connected| {
                    let status = if connected {
                        KeepAliveStatus::Good
                    } else {
                        KeepAliveStatus::Bad(StatusCode::BadCommunicationError.bits())
                    };
                    sink(session_id, status);
                },
            ));

            let sink = Arc::clone(&keep_alive);
            locked.set_session_closed_callback(SessionClosedCallback::new(move |status| {
                if status.is_bad() {
                    sink(session_id, KeepAliveStatus::Bad(status.bits()));
                }
            }));
        }

        info!(session_id, endpoint = %endpoint_url, "created session");
        Ok(Arc::new(RealSession {
            id: session_id,
            endpoint: endpoint_url,
            session,
        }))
    }
}

// =============================================================================
// RealSession
// =============================================================================

/// One live session on the `opcua` stack.
pub struct RealSession {
    id: u64,
    endpoint: String,
    session: Arc<OpcUaRwLock<Session>>,
}

impl RealSession {
    fn to_opcua_node_id(node_id: &NodeId) -> opcua::types::NodeId {
        match &node_id.identifier {
            NodeIdentifier::Numeric(v) => opcua::types::NodeId::new(node_id.namespace_index, *v),
            NodeIdentifier::String(v) => {
                opcua::types::NodeId::new(node_id.namespace_index, v.clone())
            }
            NodeIdentifier::Guid(v) => {
                opcua::types::NodeId::new(node_id.namespace_index, opcua::types::Guid::from(*v))
            }
            NodeIdentifier::Opaque(v) => opcua::types::NodeId::new(
                node_id.namespace_index,
                ByteString::from(v.as_slice()),
            ),
        }
    }

    fn from_opcua_node_id(node_id: &opcua::types::NodeId) -> NodeId {
        let namespace_index = node_id.namespace;
        match &node_id.identifier {
            opcua::types::Identifier::Numeric(v) => NodeId::numeric(namespace_index, *v),
            opcua::types::Identifier::String(v) => NodeId::string(namespace_index, v.as_ref()),
            opcua::types::Identifier::Guid(v) => {
                NodeId::guid(namespace_index, uuid::Uuid::from_bytes(*v.as_bytes()))
            }
            opcua::types::Identifier::ByteString(v) => {
                NodeId::opaque(namespace_index, v.value.clone().unwrap_or_default())
            }
        }
    }

    fn from_variant(variant: &Variant) -> UaValue {
        match variant {
            Variant::Int32(v) => UaValue::Int32(*v),
            Variant::String(v) => UaValue::Text(v.as_ref().to_string()),
            Variant::LocalizedText(v) => UaValue::Text(v.text.as_ref().to_string()),
            Variant::QualifiedName(v) => {
                let name = v.name.as_ref();
                if v.namespace_index == 0 {
                    UaValue::Text(name.to_string())
                } else {
                    UaValue::Text(format!("{}:{}", v.namespace_index, name))
                }
            }
            Variant::NodeId(v) => UaValue::Id(Self::from_opcua_node_id(v)),
            _ => UaValue::Null,
        }
    }

    fn map_chunk(
        node_id: &NodeId,
        result: opcua::types::BrowseResult,
    ) -> Result<BrowseChunk, BrowseError> {
        if result.status_code.is_bad() {
            return Err(BrowseError::browse_failed(
                node_id.to_opc_string(),
                format!("browse status {}", result.status_code),
            ));
        }

        let references = result
            .references
            .unwrap_or_default()
            .iter()
            .map(|r| UaReference {
                reference_type_id: Self::from_opcua_node_id(&r.reference_type_id),
                target_id: Self::from_opcua_node_id(&r.node_id.node_id),
                node_class: NodeClass::from_value(r.node_class as u32)
                    .unwrap_or(NodeClass::Unspecified),
                browse_name: r.browse_name.name.as_ref().to_string(),
            })
            .collect();

        let continuation = if result.continuation_point.is_null() {
            None
        } else {
            Some(ContinuationPoint(
                result.continuation_point.value.clone().unwrap_or_default(),
            ))
        };

        Ok(BrowseChunk {
            references,
            continuation,
        })
    }
}

#[async_trait]
impl UaSession for RealSession {
    fn id(&self) -> u64 {
        self.id
    }

    async fn browse_first(
        &self,
        node_id: &NodeId,
        node_class_mask: u32,
    ) -> Result<BrowseChunk, BrowseError> {
        let session = Arc::clone(&self.session);
        let node = node_id.clone();

        tokio::task::spawn_blocking(move || {
            let description = BrowseDescription {
                node_id: Self::to_opcua_node_id(&node),
                browse_direction: BrowseDirection::Forward,
                reference_type_id: ReferenceTypeId::HierarchicalReferences.into(),
                include_subtypes: true,
                node_class_mask,
                result_mask: BrowseDescriptionResultMask::all().bits(),
            };

            let locked = session.read();
            let results = locked.browse(&[description]).map_err(|status| {
                BrowseError::browse_failed(node.to_opc_string(), format!("browse failed: {}", status))
            })?;

            let mut results = results.ok_or_else(|| {
                BrowseError::browse_failed(node.to_opc_string(), "no browse results returned")
            })?;
            if results.is_empty() {
                return Ok(BrowseChunk::default());
            }
            Self::map_chunk(&node, results.remove(0))
        })
        .await
        .map_err(|e| BrowseError::browse_failed(node_id.to_opc_string(), format!("browse task: {}", e)))?
    }

    async fn browse_next(
        &self,
        continuation: ContinuationPoint,
    ) -> Result<BrowseChunk, BrowseError> {
        let session = Arc::clone(&self.session);
        let node = NodeId::null();

        tokio::task::spawn_blocking(move || {
            let point = ByteString::from(continuation.0.as_slice());

            let locked = session.read();
            let results = locked.browse_next(false, &[point]).map_err(|status| {
                BrowseError::browse_failed(
                    node.to_opc_string(),
                    format!("browse continuation failed: {}", status),
                )
            })?;

            let mut results = results.ok_or_else(|| {
                BrowseError::browse_failed(node.to_opc_string(), "no browse results returned")
            })?;
            if results.is_empty() {
                return Ok(BrowseChunk::default());
            }
            Self::map_chunk(&node, results.remove(0))
        })
        .await
        .map_err(|e| {
            BrowseError::browse_failed("continuation", format!("browse task: {}", e))
        })?
    }

    async fn read_attributes(
        &self,
        node_id: &NodeId,
        attributes: &[AttributeId],
    ) -> Result<Vec<AttributeValue>, ReadError> {
        let session = Arc::clone(&self.session);
        let node = node_id.clone();
        let attributes = attributes.to_vec();

        tokio::task::spawn_blocking(move || {
            let items: Vec<ReadValueId> = attributes
                .iter()
                .map(|attribute| ReadValueId {
                    node_id: Self::to_opcua_node_id(&node),
                    attribute_id: attribute.value(),
                    index_range: UAString::null(),
                    data_encoding: opcua::types::QualifiedName::null(),
                })
                .collect();

            let locked = session.read();
            let values = locked
                .read(&items, TimestampsToReturn::Neither, 0.0)
                .map_err(|status| {
                    ReadError::read_failed(node.to_opc_string(), format!("read failed: {}", status))
                })?;

            Ok(attributes
                .iter()
                .zip(values.iter())
                .map(|(attribute, data_value)| {
                    let status_code = data_value.status.map(|s| s.bits()).unwrap_or(0);
                    match &data_value.value {
                        Some(variant) if status_code & 0x8000_0000 == 0 => AttributeValue {
                            attribute: *attribute,
                            status_code,
                            value: Self::from_variant(variant),
                        },
                        _ => AttributeValue::bad(*attribute, status_code),
                    }
                })
                .collect())
        })
        .await
        .map_err(|e| ReadError::read_failed(node_id.to_opc_string(), format!("read task: {}", e)))?
    }

    async fn close(&self) {
        let session = Arc::clone(&self.session);
        let endpoint = self.endpoint.clone();

        let result = tokio::task::spawn_blocking(move || {
            let locked = session.read();
            locked.disconnect();
        })
        .await;

        if let Err(error) = result {
            warn!(endpoint = %endpoint, %error, "session close task failed");
        }
    }
}
