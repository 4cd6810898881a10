// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Certificate trust decisions.
//!
//! Trust is a pure decision point injected into the session coordinator at
//! construction: `(certificate, defect) -> accept | reject`. The policy
//! must not touch session state; a rejection is logged and surfaced as a
//! decision, never raised as an error from the policy itself.

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

// =============================================================================
// CertificateSummary
// =============================================================================

/// The certificate fields a trust decision may consult.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CertificateSummary {
    /// Certificate subject DN.
    pub subject: String,

    /// SHA-1 thumbprint, hex encoded.
    pub thumbprint: String,
}

impl CertificateSummary {
    /// Creates a certificate summary.
    pub fn new(subject: impl Into<String>, thumbprint: impl Into<String>) -> Self {
        Self {
            subject: subject.into(),
            thumbprint: thumbprint.into(),
        }
    }
}

// =============================================================================
// TrustDefect
// =============================================================================

/// The validation defect that triggered the trust decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrustDefect {
    /// The certificate chain ends at an issuer outside the trust store.
    UntrustedIssuer,

    /// The certificate is outside its validity period.
    Expired,

    /// The certificate's host or application URI does not match the server.
    UriMismatch,

    /// The signature did not verify.
    InvalidSignature,

    /// Any other validation failure, carrying the raw status code.
    Other(u32),
}

impl fmt::Display for TrustDefect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UntrustedIssuer => write!(f, "untrusted issuer"),
            Self::Expired => write!(f, "expired"),
            Self::UriMismatch => write!(f, "URI mismatch"),
            Self::InvalidSignature => write!(f, "invalid signature"),
            Self::Other(code) => write!(f, "validation failure (status 0x{:08X})", code),
        }
    }
}

// =============================================================================
// TrustDecision / TrustPolicy
// =============================================================================

/// Outcome of a trust decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrustDecision {
    /// The certificate is accepted for this connection.
    Accept,

    /// The certificate is rejected; the connection proceeds without it.
    Reject,
}

impl TrustDecision {
    /// Returns `true` for [`TrustDecision::Accept`].
    #[inline]
    pub fn is_accepted(self) -> bool {
        matches!(self, Self::Accept)
    }
}

/// A pluggable, pure trust decision function.
///
/// Invoked by the transport whenever server certificate validation fails;
/// the return value decides whether the connection continues with that
/// certificate.
pub type TrustPolicy =
    Arc<dyn Fn(&CertificateSummary, TrustDefect) -> TrustDecision + Send + Sync>;

/// Builds the default trust policy.
///
/// Accepts a certificate only when its sole defect is an untrusted issuer
/// and `auto_accept` is set; rejects in every other case. Both outcomes are
/// logged with the certificate subject.
pub fn auto_accept_policy(auto_accept: bool) -> TrustPolicy {
    Arc::new(move |certificate, defect| {
        if defect == TrustDefect::UntrustedIssuer && auto_accept {
            info!(
                subject = %certificate.subject,
                "untrusted certificate accepted"
            );
            TrustDecision::Accept
        } else {
            warn!(
                subject = %certificate.subject,
                defect = %defect,
                "untrusted certificate rejected"
            );
            TrustDecision::Reject
        }
    })
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn cert() -> CertificateSummary {
        CertificateSummary::new("CN=TestServer", "ab12cd34")
    }

    #[test]
    fn test_auto_accept_untrusted_issuer() {
        let policy = auto_accept_policy(true);
        assert_eq!(
            policy(&cert(), TrustDefect::UntrustedIssuer),
            TrustDecision::Accept
        );
    }

    #[test]
    fn test_auto_accept_disabled_rejects() {
        let policy = auto_accept_policy(false);
        assert_eq!(
            policy(&cert(), TrustDefect::UntrustedIssuer),
            TrustDecision::Reject
        );
    }

    #[test]
    fn test_other_defects_always_rejected() {
        let policy = auto_accept_policy(true);
        for defect in [
            TrustDefect::Expired,
            TrustDefect::UriMismatch,
            TrustDefect::InvalidSignature,
            TrustDefect::Other(0x801A_0000),
        ] {
            assert_eq!(policy(&cert(), defect), TrustDecision::Reject);
        }
    }

    #[test]
    fn test_defect_display() {
        assert_eq!(TrustDefect::UntrustedIssuer.to_string(), "untrusted issuer");
        assert_eq!(
            TrustDefect::Other(0x8001_0000).to_string(),
            "validation failure (status 0x80010000)"
        );
    }
}
