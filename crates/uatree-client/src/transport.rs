// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Transport abstraction layer.
//!
//! Abstract traits for the session-oriented OPC UA wire protocol, enabling
//! testability and flexible backends. The crate does not reimplement the
//! protocol; [`UaConnector`] and [`UaSession`] only describe which
//! operations are invoked, in what sequence:
//!
//! - endpoint discovery and session creation ([`UaConnector`])
//! - browse with continuation points, batched attribute reads, keep-alive
//!   delivery, session close ([`UaSession`])
//!
//! The real backend (`real` module, feature `real-transport`) binds these
//! traits to the `opcua` crate; tests script them in memory.

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::{BrowseError, ConnectError, ReadError};
use crate::trust::TrustPolicy;
use crate::types::{AttributeId, ClientConfig, NodeClass, NodeId, SecurityMode, SecurityPolicy};

// =============================================================================
// KeepAliveStatus
// =============================================================================

/// Status of the most recent session heartbeat.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KeepAliveStatus {
    /// The heartbeat succeeded.
    Good,

    /// The heartbeat failed with the given service status code.
    Bad(u32),
}

impl KeepAliveStatus {
    /// Returns `true` if the heartbeat reported a communication failure.
    #[inline]
    pub fn is_bad(self) -> bool {
        matches!(self, Self::Bad(_))
    }
}

impl fmt::Display for KeepAliveStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Good => write!(f, "Good"),
            Self::Bad(code) => write!(f, "Bad(0x{:08X})", code),
        }
    }
}

/// Callback through which a transport delivers keep-alive events.
///
/// Invoked with the id of the session the heartbeat belongs to, so the
/// receiver can discard events from sessions that have been replaced.
pub type KeepAliveSink = Arc<dyn Fn(u64, KeepAliveStatus) + Send + Sync>;

// =============================================================================
// EndpointInfo
// =============================================================================

/// One endpoint advertised by a server during discovery.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EndpointInfo {
    /// The endpoint URL.
    pub url: String,

    /// Security policy of the endpoint.
    pub security_policy: SecurityPolicy,

    /// Message security mode of the endpoint.
    pub security_mode: SecurityMode,

    /// Server-assigned relative security strength; higher is stronger.
    pub security_level: u8,
}

impl EndpointInfo {
    /// Returns `true` if the endpoint requires no security.
    pub fn is_unsecured(&self) -> bool {
        self.security_policy == SecurityPolicy::None && self.security_mode == SecurityMode::None
    }
}

impl fmt::Display for EndpointInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} [{}/{}]",
            self.url, self.security_policy, self.security_mode
        )
    }
}

/// Selects the endpoint to connect to from a discovery result.
///
/// With a provisioned application certificate the strongest advertised
/// endpoint wins; without one the client can only use an unsecured
/// endpoint. Returns `None` when nothing usable was advertised.
pub fn select_endpoint(endpoints: &[EndpointInfo], want_security: bool) -> Option<&EndpointInfo> {
    if want_security {
        endpoints.iter().max_by_key(|e| e.security_level)
    } else {
        endpoints.iter().find(|e| e.is_unsecured())
    }
}

// =============================================================================
// UaReference
// =============================================================================

/// One outgoing reference returned by a browse call.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct UaReference {
    /// The reference type (e.g. HasComponent, Organizes).
    pub reference_type_id: NodeId,

    /// The target node of the reference.
    pub target_id: NodeId,

    /// Node class of the target.
    pub node_class: NodeClass,

    /// Browse name of the target, as reported alongside the reference.
    pub browse_name: String,
}

impl UaReference {
    /// Creates a reference description.
    pub fn new(
        reference_type_id: NodeId,
        target_id: NodeId,
        node_class: NodeClass,
        browse_name: impl Into<String>,
    ) -> Self {
        Self {
            reference_type_id,
            target_id,
            node_class,
            browse_name: browse_name.into(),
        }
    }
}

impl fmt::Display for UaReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "-[{}]-> {} ({})",
            self.reference_type_id, self.target_id, self.node_class
        )
    }
}

// =============================================================================
// ContinuationPoint / BrowseChunk
// =============================================================================

/// Opaque server-issued token indicating more browse results remain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContinuationPoint(pub Vec<u8>);

/// One page of browse results.
///
/// `continuation` is `Some` when the server has more references for the
/// browsed node; callers pass it to [`UaSession::browse_next`] until it
/// comes back `None`.
#[derive(Debug, Clone, Default)]
pub struct BrowseChunk {
    /// References in server-reported order.
    pub references: Vec<UaReference>,

    /// Token for the next page, if any.
    pub continuation: Option<ContinuationPoint>,
}

impl BrowseChunk {
    /// Creates a final chunk with no continuation.
    pub fn complete(references: Vec<UaReference>) -> Self {
        Self {
            references,
            continuation: None,
        }
    }

    /// Creates a partial chunk with a continuation point.
    pub fn partial(references: Vec<UaReference>, continuation: ContinuationPoint) -> Self {
        Self {
            references,
            continuation: Some(continuation),
        }
    }
}

// =============================================================================
// UaValue / AttributeValue
// =============================================================================

/// A decoded attribute value.
///
/// Only the shapes the five tree attributes can take; everything else a
/// server might return decodes to [`UaValue::Null`].
#[derive(Debug, Clone, PartialEq)]
pub enum UaValue {
    /// No value (bad status or absent attribute).
    Null,

    /// A 32-bit integer (NodeClass attribute).
    Int32(i32),

    /// A textual value (browse and display names).
    Text(String),

    /// A node identifier (NodeId and DataType attributes).
    Id(NodeId),
}

impl UaValue {
    /// Returns `true` if there is no value.
    #[inline]
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }
}

impl fmt::Display for UaValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => write!(f, "null"),
            Self::Int32(v) => write!(f, "{}", v),
            Self::Text(v) => write!(f, "{}", v),
            Self::Id(v) => write!(f, "{}", v),
        }
    }
}

/// Result of reading one attribute within a batched read.
#[derive(Debug, Clone, PartialEq)]
pub struct AttributeValue {
    /// The attribute this value answers.
    pub attribute: AttributeId,

    /// Service status code for this item (0 = Good).
    pub status_code: u32,

    /// The decoded value, [`UaValue::Null`] when the status is bad.
    pub value: UaValue,
}

impl AttributeValue {
    /// Creates a good attribute value.
    pub fn good(attribute: AttributeId, value: UaValue) -> Self {
        Self {
            attribute,
            status_code: 0,
            value,
        }
    }

    /// Creates a bad attribute value with the given status code.
    pub fn bad(attribute: AttributeId, status_code: u32) -> Self {
        Self {
            attribute,
            status_code,
            value: UaValue::Null,
        }
    }

    /// Returns `true` if the item status is good.
    #[inline]
    pub fn is_good(&self) -> bool {
        self.status_code & 0x8000_0000 == 0
    }
}

// =============================================================================
// UaSession Trait
// =============================================================================

/// One live server session.
///
/// Created by a [`UaConnector`], shared by reference, replaced wholesale by
/// the coordinator on reconnect. Implementations must be `Send + Sync`;
/// the keep-alive machinery and the traversal call into the same session
/// from different tasks.
#[async_trait]
pub trait UaSession: Send + Sync {
    /// Returns the connector-assigned session id, unique per created
    /// session. Used to discard keep-alive events from replaced sessions.
    fn id(&self) -> u64;

    /// Browses the forward hierarchical references of `node_id`, filtered
    /// by `node_class_mask` (0 = all classes). Returns the first page; the
    /// caller drains any continuation via [`UaSession::browse_next`].
    async fn browse_first(
        &self,
        node_id: &NodeId,
        node_class_mask: u32,
    ) -> Result<BrowseChunk, BrowseError>;

    /// Fetches the next browse page for a prior [`UaSession::browse_first`].
    async fn browse_next(
        &self,
        continuation: ContinuationPoint,
    ) -> Result<BrowseChunk, BrowseError>;

    /// Reads the given attributes of one node in a single service call.
    ///
    /// The result is aligned to `attributes` order and has the same length.
    async fn read_attributes(
        &self,
        node_id: &NodeId,
        attributes: &[AttributeId],
    ) -> Result<Vec<AttributeValue>, ReadError>;

    /// Closes the session. Close failures are logged, not surfaced.
    async fn close(&self);
}

// =============================================================================
// UaConnector Trait
// =============================================================================

/// Factory for server sessions.
///
/// Separating discovery from session creation lets the coordinator pick
/// the endpoint, and lets reconnect attempts rebuild a session through the
/// same path the initial connect used.
#[async_trait]
pub trait UaConnector: Send + Sync {
    /// Queries the server's advertised endpoints.
    async fn discover(&self, endpoint_url: &str) -> Result<Vec<EndpointInfo>, ConnectError>;

    /// Creates and activates a session on the given endpoint with anonymous
    /// identity.
    ///
    /// `keep_alive` receives heartbeat events for the created session until
    /// it is closed; `trust` is consulted whenever server certificate
    /// validation fails.
    async fn create_session(
        &self,
        endpoint: &EndpointInfo,
        config: &ClientConfig,
        keep_alive: KeepAliveSink,
        trust: TrustPolicy,
    ) -> Result<Arc<dyn UaSession>, ConnectError>;
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn endpoint(policy: SecurityPolicy, mode: SecurityMode, level: u8) -> EndpointInfo {
        EndpointInfo {
            url: "opc.tcp://plc:4840".to_string(),
            security_policy: policy,
            security_mode: mode,
            security_level: level,
        }
    }

    #[test]
    fn test_keep_alive_status() {
        assert!(!KeepAliveStatus::Good.is_bad());
        assert!(KeepAliveStatus::Bad(0x8005_0000).is_bad());
        assert_eq!(
            KeepAliveStatus::Bad(0x8005_0000).to_string(),
            "Bad(0x80050000)"
        );
    }

    #[test]
    fn test_select_endpoint_prefers_strongest_with_certificate() {
        let endpoints = vec![
            endpoint(SecurityPolicy::None, SecurityMode::None, 0),
            endpoint(SecurityPolicy::Basic256Sha256, SecurityMode::SignAndEncrypt, 3),
            endpoint(SecurityPolicy::Basic256, SecurityMode::Sign, 2),
        ];

        let selected = select_endpoint(&endpoints, true).unwrap();
        assert_eq!(selected.security_policy, SecurityPolicy::Basic256Sha256);
    }

    #[test]
    fn test_select_endpoint_falls_back_to_unsecured() {
        let endpoints = vec![
            endpoint(SecurityPolicy::Basic256Sha256, SecurityMode::SignAndEncrypt, 3),
            endpoint(SecurityPolicy::None, SecurityMode::None, 0),
        ];

        let selected = select_endpoint(&endpoints, false).unwrap();
        assert!(selected.is_unsecured());
    }

    #[test]
    fn test_select_endpoint_none_usable() {
        let endpoints = vec![endpoint(
            SecurityPolicy::Basic256Sha256,
            SecurityMode::SignAndEncrypt,
            3,
        )];
        assert!(select_endpoint(&endpoints, false).is_none());
        assert!(select_endpoint(&[], true).is_none());
    }

    #[test]
    fn test_attribute_value_status() {
        let good = AttributeValue::good(AttributeId::DisplayName, UaValue::Text("Pump".into()));
        assert!(good.is_good());

        let bad = AttributeValue::bad(AttributeId::DataType, 0x8035_0000);
        assert!(!bad.is_good());
        assert!(bad.value.is_null());
    }

    #[test]
    fn test_browse_chunk_constructors() {
        let chunk = BrowseChunk::complete(Vec::new());
        assert!(chunk.continuation.is_none());

        let chunk = BrowseChunk::partial(Vec::new(), ContinuationPoint(vec![1, 2]));
        assert!(chunk.continuation.is_some());
    }
}
