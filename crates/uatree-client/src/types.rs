// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Core OPC UA protocol types.
//!
//! This module provides the type vocabulary the rest of the crate is built
//! on:
//!
//! - **NodeId**: all four OPC UA node identifier kinds with parsing and
//!   formatting
//! - **NodeClass**: node class enumeration with the wire mask values
//! - **AttributeId**: the attribute set this client reads
//! - **SecurityMode/SecurityPolicy**: endpoint security configuration
//! - **ClientConfig**: connection configuration with builder
//!
//! # Examples
//!
//! ```
//! use uatree_client::types::{ClientConfig, NodeId};
//!
//! let node: NodeId = "ns=2;s=Machine.Axis1".parse().unwrap();
//! assert_eq!(node.to_opc_string(), "ns=2;s=Machine.Axis1");
//!
//! let config = ClientConfig::builder()
//!     .endpoint("opc.tcp://localhost:4840")
//!     .build()
//!     .unwrap();
//! assert!(config.auto_accept);
//! ```

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::error::ConnectError;

// =============================================================================
// NodeId
// =============================================================================

/// OPC UA node identifier.
///
/// Uniquely identifies a node within a server's address space: a namespace
/// index plus a numeric, string, GUID, or opaque identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NodeId {
    /// Namespace index (0 = OPC UA standard namespace).
    pub namespace_index: u16,

    /// The node identifier.
    pub identifier: NodeIdentifier,
}

/// The identifier portion of a [`NodeId`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeIdentifier {
    /// Numeric identifier (`i=...`).
    Numeric(u32),

    /// String identifier (`s=...`).
    String(String),

    /// GUID identifier (`g=...`).
    Guid(Uuid),

    /// Opaque byte-string identifier (`b=...`, base64 on the wire format).
    Opaque(Vec<u8>),
}

impl NodeId {
    /// Creates a numeric node ID.
    #[inline]
    pub fn numeric(namespace_index: u16, value: u32) -> Self {
        Self {
            namespace_index,
            identifier: NodeIdentifier::Numeric(value),
        }
    }

    /// Creates a string node ID.
    #[inline]
    pub fn string(namespace_index: u16, value: impl Into<String>) -> Self {
        Self {
            namespace_index,
            identifier: NodeIdentifier::String(value.into()),
        }
    }

    /// Creates a GUID node ID.
    #[inline]
    pub fn guid(namespace_index: u16, value: Uuid) -> Self {
        Self {
            namespace_index,
            identifier: NodeIdentifier::Guid(value),
        }
    }

    /// Creates an opaque (byte string) node ID.
    #[inline]
    pub fn opaque(namespace_index: u16, value: Vec<u8>) -> Self {
        Self {
            namespace_index,
            identifier: NodeIdentifier::Opaque(value),
        }
    }

    /// Root folder node (ns=0, i=84).
    pub const ROOT_FOLDER: NodeId = NodeId {
        namespace_index: 0,
        identifier: NodeIdentifier::Numeric(84),
    };

    /// Objects folder node (ns=0, i=85). The traversal starts here.
    pub const OBJECTS_FOLDER: NodeId = NodeId {
        namespace_index: 0,
        identifier: NodeIdentifier::Numeric(85),
    };

    /// HierarchicalReferences reference type (ns=0, i=33).
    pub const HIERARCHICAL_REFERENCES: NodeId = NodeId {
        namespace_index: 0,
        identifier: NodeIdentifier::Numeric(33),
    };

    /// The null node ID (ns=0, i=0).
    #[inline]
    pub const fn null() -> Self {
        Self {
            namespace_index: 0,
            identifier: NodeIdentifier::Numeric(0),
        }
    }

    /// Returns `true` if this is the null node ID.
    #[inline]
    pub fn is_null(&self) -> bool {
        self.namespace_index == 0 && matches!(self.identifier, NodeIdentifier::Numeric(0))
    }

    /// Returns `true` if this is in the standard namespace (ns=0).
    #[inline]
    pub const fn is_standard(&self) -> bool {
        self.namespace_index == 0
    }

    /// Returns the numeric value if this is a numeric identifier.
    #[inline]
    pub fn as_numeric(&self) -> Option<u32> {
        match &self.identifier {
            NodeIdentifier::Numeric(v) => Some(*v),
            _ => None,
        }
    }

    /// Formats as the OPC UA string form: `ns=<n>;{i|s|g|b}=<identifier>`.
    ///
    /// The `ns=` prefix is omitted for the standard namespace.
    pub fn to_opc_string(&self) -> String {
        let id_str = match &self.identifier {
            NodeIdentifier::Numeric(v) => format!("i={}", v),
            NodeIdentifier::String(v) => format!("s={}", v),
            NodeIdentifier::Guid(v) => format!("g={}", v),
            NodeIdentifier::Opaque(v) => format!("b={}", BASE64.encode(v)),
        };

        if self.namespace_index == 0 {
            id_str
        } else {
            format!("ns={};{}", self.namespace_index, id_str)
        }
    }
}

impl Default for NodeId {
    fn default() -> Self {
        Self::null()
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_opc_string())
    }
}

/// Error parsing a [`NodeId`] from its string form.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid node id '{input}': {reason}")]
pub struct NodeIdParseError {
    /// The rejected input.
    pub input: String,

    /// Why it was rejected.
    pub reason: &'static str,
}

impl FromStr for NodeId {
    type Err = NodeIdParseError;

    /// Parses a node ID from the OPC UA string form.
    ///
    /// Accepts `ns=2;i=1001`, `ns=2;s=MyNode`, `ns=2;g=<uuid>`,
    /// `ns=2;b=<base64>`, and the `ns=0` short forms (`i=85`, `s=Name`).
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = |reason: &'static str| NodeIdParseError {
            input: s.to_string(),
            reason,
        };

        let (namespace_index, rest) = match s.strip_prefix("ns=") {
            Some(tail) => {
                let (ns, rest) = tail
                    .split_once(';')
                    .ok_or_else(|| invalid("missing ';' after namespace"))?;
                let ns = ns
                    .parse::<u16>()
                    .map_err(|_| invalid("namespace index is not a u16"))?;
                (ns, rest)
            }
            None => (0, s),
        };

        let (kind, value) = rest
            .split_once('=')
            .ok_or_else(|| invalid("missing identifier kind"))?;

        let identifier = match kind {
            "i" => NodeIdentifier::Numeric(
                value
                    .parse::<u32>()
                    .map_err(|_| invalid("numeric identifier is not a u32"))?,
            ),
            "s" => NodeIdentifier::String(value.to_string()),
            "g" => NodeIdentifier::Guid(
                Uuid::parse_str(value).map_err(|_| invalid("malformed GUID identifier"))?,
            ),
            "b" => NodeIdentifier::Opaque(
                BASE64
                    .decode(value)
                    .map_err(|_| invalid("malformed base64 identifier"))?,
            ),
            _ => return Err(invalid("unknown identifier kind")),
        };

        Ok(Self {
            namespace_index,
            identifier,
        })
    }
}

// =============================================================================
// NodeClass
// =============================================================================

/// OPC UA node class.
///
/// The discriminant values are the wire values, usable directly in browse
/// node-class masks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[repr(u32)]
pub enum NodeClass {
    /// No node class specified.
    #[default]
    Unspecified = 0,

    /// An object node.
    Object = 1,

    /// A variable node.
    Variable = 2,

    /// A method node.
    Method = 4,

    /// An object type node.
    ObjectType = 8,

    /// A variable type node.
    VariableType = 16,

    /// A reference type node.
    ReferenceType = 32,

    /// A data type node.
    DataType = 64,

    /// A view node.
    View = 128,
}

impl NodeClass {
    /// Returns the wire mask value.
    #[inline]
    pub const fn value(self) -> u32 {
        self as u32
    }

    /// Converts a wire value back to a node class.
    pub fn from_value(value: u32) -> Option<Self> {
        match value {
            0 => Some(Self::Unspecified),
            1 => Some(Self::Object),
            2 => Some(Self::Variable),
            4 => Some(Self::Method),
            8 => Some(Self::ObjectType),
            16 => Some(Self::VariableType),
            32 => Some(Self::ReferenceType),
            64 => Some(Self::DataType),
            128 => Some(Self::View),
            _ => None,
        }
    }

    /// Returns the enum name as the server reports it.
    pub const fn name(self) -> &'static str {
        match self {
            Self::Unspecified => "Unspecified",
            Self::Object => "Object",
            Self::Variable => "Variable",
            Self::Method => "Method",
            Self::ObjectType => "ObjectType",
            Self::VariableType => "VariableType",
            Self::ReferenceType => "ReferenceType",
            Self::DataType => "DataType",
            Self::View => "View",
        }
    }

    /// Builds a browse node-class mask from a set of classes.
    pub fn mask(classes: &[NodeClass]) -> u32 {
        classes.iter().fold(0, |acc, c| acc | c.value())
    }
}

impl fmt::Display for NodeClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

// =============================================================================
// AttributeId
// =============================================================================

/// The node attributes this client reads.
///
/// The discriminant values are the OPC UA attribute IDs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u32)]
pub enum AttributeId {
    /// The node's own identifier.
    NodeId = 1,

    /// The node class.
    NodeClass = 2,

    /// The namespace-qualified browse name.
    BrowseName = 3,

    /// The localized display name.
    DisplayName = 4,

    /// The data type node (Variable nodes only).
    DataType = 14,
}

/// The fixed attribute set read for every discovered node, in read order.
pub const TREE_ATTRIBUTES: [AttributeId; 5] = [
    AttributeId::NodeId,
    AttributeId::NodeClass,
    AttributeId::BrowseName,
    AttributeId::DisplayName,
    AttributeId::DataType,
];

impl AttributeId {
    /// Returns the wire attribute ID.
    #[inline]
    pub const fn value(self) -> u32 {
        self as u32
    }

    /// Returns the attribute name.
    pub const fn name(self) -> &'static str {
        match self {
            Self::NodeId => "NodeId",
            Self::NodeClass => "NodeClass",
            Self::BrowseName => "BrowseName",
            Self::DisplayName => "DisplayName",
            Self::DataType => "DataType",
        }
    }
}

impl fmt::Display for AttributeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

// =============================================================================
// Security
// =============================================================================

/// Message security mode for an endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SecurityMode {
    /// No signing or encryption.
    #[default]
    None,

    /// Messages are signed.
    Sign,

    /// Messages are signed and encrypted.
    SignAndEncrypt,
}

impl fmt::Display for SecurityMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::None => write!(f, "None"),
            Self::Sign => write!(f, "Sign"),
            Self::SignAndEncrypt => write!(f, "SignAndEncrypt"),
        }
    }
}

/// Security policy for an endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SecurityPolicy {
    /// No security.
    #[default]
    None,

    /// Basic128Rsa15 (deprecated in current OPC UA profiles, still common in the field).
    Basic128Rsa15,

    /// Basic256 (deprecated in current OPC UA profiles, still common in the field).
    Basic256,

    /// Basic256Sha256.
    Basic256Sha256,

    /// Aes128-Sha256-RsaOaep.
    Aes128Sha256RsaOaep,

    /// Aes256-Sha256-RsaPss.
    Aes256Sha256RsaPss,
}

impl SecurityPolicy {
    /// Returns the policy URI as servers advertise it.
    pub const fn to_uri(self) -> &'static str {
        match self {
            Self::None => "http://opcfoundation.org/UA/SecurityPolicy#None",
            Self::Basic128Rsa15 => "http://opcfoundation.org/UA/SecurityPolicy#Basic128Rsa15",
            Self::Basic256 => "http://opcfoundation.org/UA/SecurityPolicy#Basic256",
            Self::Basic256Sha256 => "http://opcfoundation.org/UA/SecurityPolicy#Basic256Sha256",
            Self::Aes128Sha256RsaOaep => {
                "http://opcfoundation.org/UA/SecurityPolicy#Aes128_Sha256_RsaOaep"
            }
            Self::Aes256Sha256RsaPss => {
                "http://opcfoundation.org/UA/SecurityPolicy#Aes256_Sha256_RsaPss"
            }
        }
    }

    /// Returns the short policy name (the URI fragment).
    pub fn name(self) -> &'static str {
        match self.to_uri().rsplit_once('#') {
            Some((_, name)) => name,
            None => "None",
        }
    }
}

impl fmt::Display for SecurityPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

// =============================================================================
// Data type names
// =============================================================================

/// Maps a well-known ns=0 data-type node to its type name.
///
/// Returns `None` for vendor-defined data types; callers fall back to the
/// node-id string form.
pub fn data_type_name(data_type: &NodeId) -> Option<&'static str> {
    if !data_type.is_standard() {
        return None;
    }
    match data_type.as_numeric()? {
        1 => Some("Boolean"),
        2 => Some("SByte"),
        3 => Some("Byte"),
        4 => Some("Int16"),
        5 => Some("UInt16"),
        6 => Some("Int32"),
        7 => Some("UInt32"),
        8 => Some("Int64"),
        9 => Some("UInt64"),
        10 => Some("Float"),
        11 => Some("Double"),
        12 => Some("String"),
        13 => Some("DateTime"),
        14 => Some("Guid"),
        15 => Some("ByteString"),
        16 => Some("XmlElement"),
        17 => Some("NodeId"),
        20 => Some("QualifiedName"),
        21 => Some("LocalizedText"),
        _ => None,
    }
}

// =============================================================================
// ClientConfig
// =============================================================================

/// Client connection configuration.
///
/// Defaults match the discovery tool's fixed protocol parameters: 60 s
/// session request timeout, 15 s endpoint discovery timeout, 10 s reconnect
/// delay, auto-accept of untrusted-issuer certificates, traversal depth
/// limit of 10.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientConfig {
    /// Server endpoint URL (`opc.tcp://host:port`).
    pub endpoint: String,

    /// Application name sent at session creation.
    pub application_name: String,

    /// Application URI sent at session creation.
    pub application_uri: String,

    /// Fixed session request timeout.
    #[serde(with = "duration_millis")]
    pub session_timeout: Duration,

    /// Endpoint discovery timeout.
    #[serde(with = "duration_millis")]
    pub discovery_timeout: Duration,

    /// Delay before a reconnect attempt. Zero disables reconnects.
    #[serde(with = "duration_millis")]
    pub reconnect_period: Duration,

    /// Auto-accept certificates whose only defect is an untrusted issuer.
    pub auto_accept: bool,

    /// Path to the client application certificate, if one is provisioned.
    /// Without one the client falls back to an unsecured endpoint.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub certificate_path: Option<String>,

    /// Path to the private key paired with `certificate_path`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub private_key_path: Option<String>,

    /// Maximum traversal recursion depth from the root.
    pub max_depth: u32,
}

impl ClientConfig {
    /// Returns a configuration builder.
    pub fn builder() -> ClientConfigBuilder {
        ClientConfigBuilder::default()
    }

    /// Returns `true` if a client application certificate is provisioned,
    /// enabling secured endpoint selection.
    pub fn has_certificate(&self) -> bool {
        self.certificate_path.is_some()
    }

    /// Returns `true` if keep-alive failures trigger reconnect attempts.
    pub fn reconnect_enabled(&self) -> bool {
        !self.reconnect_period.is_zero()
    }
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            endpoint: String::new(),
            application_name: "uatree node discovery client".to_string(),
            application_uri: "urn:sylvex:uatree".to_string(),
            session_timeout: Duration::from_secs(60),
            discovery_timeout: Duration::from_secs(15),
            reconnect_period: Duration::from_secs(10),
            auto_accept: true,
            certificate_path: None,
            private_key_path: None,
            max_depth: 10,
        }
    }
}

/// Builder for [`ClientConfig`].
#[derive(Debug, Default)]
pub struct ClientConfigBuilder {
    config: ClientConfig,
}

impl ClientConfigBuilder {
    /// Sets the server endpoint URL.
    pub fn endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.config.endpoint = endpoint.into();
        self
    }

    /// Sets the application name.
    pub fn application_name(mut self, name: impl Into<String>) -> Self {
        self.config.application_name = name.into();
        self
    }

    /// Sets the session request timeout.
    pub fn session_timeout(mut self, timeout: Duration) -> Self {
        self.config.session_timeout = timeout;
        self
    }

    /// Sets the endpoint discovery timeout.
    pub fn discovery_timeout(mut self, timeout: Duration) -> Self {
        self.config.discovery_timeout = timeout;
        self
    }

    /// Sets the reconnect delay. Zero disables reconnects.
    pub fn reconnect_period(mut self, period: Duration) -> Self {
        self.config.reconnect_period = period;
        self
    }

    /// Sets whether untrusted-issuer certificates are auto-accepted.
    pub fn auto_accept(mut self, auto_accept: bool) -> Self {
        self.config.auto_accept = auto_accept;
        self
    }

    /// Sets the client certificate and private key paths.
    pub fn certificate(
        mut self,
        certificate_path: impl Into<String>,
        private_key_path: impl Into<String>,
    ) -> Self {
        self.config.certificate_path = Some(certificate_path.into());
        self.config.private_key_path = Some(private_key_path.into());
        self
    }

    /// Sets the maximum traversal depth.
    pub fn max_depth(mut self, max_depth: u32) -> Self {
        self.config.max_depth = max_depth;
        self
    }

    /// Validates and builds the configuration.
    ///
    /// # Errors
    ///
    /// Returns [`ConnectError::InvalidEndpoint`] if the endpoint is empty or
    /// does not use the `opc.tcp` scheme.
    pub fn build(self) -> Result<ClientConfig, ConnectError> {
        let config = self.config;

        if config.endpoint.is_empty() {
            return Err(ConnectError::invalid_endpoint(
                &config.endpoint,
                "endpoint URL is empty",
            ));
        }
        if !config.endpoint.starts_with("opc.tcp://") {
            return Err(ConnectError::invalid_endpoint(
                &config.endpoint,
                "endpoint URL must use the opc.tcp scheme",
            ));
        }

        Ok(config)
    }
}

mod duration_millis {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(d.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        Ok(Duration::from_millis(u64::deserialize(d)?))
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_node_id_formatting() {
        assert_eq!(NodeId::numeric(0, 85).to_opc_string(), "i=85");
        assert_eq!(NodeId::numeric(2, 1001).to_opc_string(), "ns=2;i=1001");
        assert_eq!(
            NodeId::string(3, "Machine.Axis1").to_opc_string(),
            "ns=3;s=Machine.Axis1"
        );
    }

    #[test]
    fn test_node_id_parse_round_trip() {
        for s in ["i=85", "ns=2;i=1001", "ns=2;s=Pump.Speed", "s=TopLevel"] {
            let parsed: NodeId = s.parse().unwrap();
            assert_eq!(parsed.to_opc_string(), s);
        }

        let guid: NodeId = "ns=1;g=550e8400-e29b-41d4-a716-446655440000"
            .parse()
            .unwrap();
        assert!(matches!(guid.identifier, NodeIdentifier::Guid(_)));

        let opaque: NodeId = "ns=1;b=SGVsbG8=".parse().unwrap();
        assert_eq!(opaque, NodeId::opaque(1, b"Hello".to_vec()));
    }

    #[test]
    fn test_node_id_parse_rejects_garbage() {
        assert!("".parse::<NodeId>().is_err());
        assert!("ns=2;x=1".parse::<NodeId>().is_err());
        assert!("ns=bad;i=1".parse::<NodeId>().is_err());
        assert!("ns=2;i=notanumber".parse::<NodeId>().is_err());
    }

    #[test]
    fn test_node_class_mask() {
        let mask = NodeClass::mask(&[NodeClass::Object, NodeClass::Variable, NodeClass::Method]);
        assert_eq!(mask, 1 | 2 | 4);
        assert_eq!(NodeClass::from_value(2), Some(NodeClass::Variable));
        assert_eq!(NodeClass::from_value(3), None);
    }

    #[test]
    fn test_tree_attributes_fixed_order() {
        assert_eq!(
            TREE_ATTRIBUTES.map(|a| a.value()),
            [1, 2, 3, 4, 14],
        );
    }

    #[test]
    fn test_data_type_names() {
        assert_eq!(data_type_name(&NodeId::numeric(0, 1)), Some("Boolean"));
        assert_eq!(data_type_name(&NodeId::numeric(0, 11)), Some("Double"));
        assert_eq!(data_type_name(&NodeId::numeric(0, 9999)), None);
        assert_eq!(data_type_name(&NodeId::numeric(2, 6)), None);
    }

    #[test]
    fn test_security_policy_names() {
        assert_eq!(SecurityPolicy::Basic256Sha256.name(), "Basic256Sha256");
        assert_eq!(SecurityPolicy::None.name(), "None");
    }

    #[test]
    fn test_config_defaults() {
        let config = ClientConfig::builder()
            .endpoint("opc.tcp://localhost:4840")
            .build()
            .unwrap();

        assert_eq!(config.session_timeout, Duration::from_secs(60));
        assert_eq!(config.discovery_timeout, Duration::from_secs(15));
        assert_eq!(config.reconnect_period, Duration::from_secs(10));
        assert_eq!(config.max_depth, 10);
        assert!(config.auto_accept);
        assert!(!config.has_certificate());
        assert!(config.reconnect_enabled());
    }

    #[test]
    fn test_config_rejects_bad_endpoint() {
        assert!(ClientConfig::builder().build().is_err());
        assert!(ClientConfig::builder()
            .endpoint("http://localhost:4840")
            .build()
            .is_err());
    }

    #[test]
    fn test_config_reconnect_disabled_by_zero() {
        let config = ClientConfig::builder()
            .endpoint("opc.tcp://localhost:4840")
            .reconnect_period(Duration::ZERO)
            .build()
            .unwrap();
        assert!(!config.reconnect_enabled());
    }
}
