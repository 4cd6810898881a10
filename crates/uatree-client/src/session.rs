// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Session lifecycle coordination.
//!
//! [`SessionCoordinator`] owns the connection lifecycle: endpoint
//! discovery, security negotiation, session creation, keep-alive
//! monitoring, and the reconnect state machine. It is the only component
//! that reads or mutates the current-session slot; everything else obtains
//! the live handle through [`SessionCoordinator::current_session`] at the
//! point of each remote call.
//!
//! # Concurrency
//!
//! Keep-alive events and reconnect completions arrive asynchronously from
//! the transport, concurrently with traversal calls. Both callbacks and
//! the session slot serialize through one mutex guarding
//! `{current session, reconnect-in-flight}`. Critical sections never
//! await; session close happens after the slot has been taken out under
//! the lock.
//!
//! # Reconnect state machine
//!
//! `Idle -> Reconnecting -> Idle`. Entered only from the keep-alive
//! callback on a bad heartbeat; at most one pending handler exists at a
//! time, and a second bad heartbeat while one is in flight is a no-op.
//! The completion callback verifies the handler identity, installs the
//! replacement session if one was produced, and discards the handler
//! either way. Keep-alive events carrying the id of a replaced session
//! are discarded.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, Weak};

use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tracing::{debug, info, trace, warn};

use crate::error::ConnectError;
use crate::transport::{
    select_endpoint, KeepAliveSink, KeepAliveStatus, UaConnector, UaSession,
};
use crate::trust::{auto_accept_policy, TrustPolicy};
use crate::types::ClientConfig;

// =============================================================================
// DisconnectOutcome
// =============================================================================

/// Result of a [`SessionCoordinator::disconnect`] call.
///
/// Disconnecting is idempotent; with no live session it reports that there
/// was nothing to do instead of failing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DisconnectOutcome {
    /// A live session was closed.
    Disconnected,

    /// No session existed.
    NothingToDisconnect,
}

impl fmt::Display for DisconnectOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Disconnected => write!(f, "session disconnected"),
            Self::NothingToDisconnect => write!(f, "nothing to disconnect"),
        }
    }
}

// =============================================================================
// SessionCoordinator
// =============================================================================

/// Owns the session slot and the reconnect state machine.
pub struct SessionCoordinator {
    /// Client configuration.
    config: ClientConfig,

    /// Session factory.
    connector: Arc<dyn UaConnector>,

    /// Certificate trust decision, injected at construction.
    trust: TrustPolicy,

    /// The single lock guarding session slot and reconnect flag.
    shared: Mutex<Shared>,

    /// Identity source for pending reconnect handlers.
    next_attempt_id: AtomicU64,

    /// Runtime handle for spawning reconnect handlers from sync callbacks.
    runtime: Handle,

    /// Lifecycle counters.
    stats: SessionStats,
}

struct Shared {
    /// The live session, replaced wholesale on reconnect.
    session: Option<Arc<dyn UaSession>>,

    /// The pending reconnect handler, `Some` while Reconnecting.
    reconnect: Option<PendingReconnect>,
}

struct PendingReconnect {
    /// Handler identity, checked by the completion callback.
    attempt_id: u64,

    /// The spawned handler task, aborted on disconnect.
    task: JoinHandle<()>,
}

impl SessionCoordinator {
    /// Creates a coordinator with the default trust policy derived from
    /// `config.auto_accept`.
    ///
    /// Must be called within a tokio runtime; reconnect handlers are
    /// spawned onto the runtime this call observes.
    pub fn new(config: ClientConfig, connector: Arc<dyn UaConnector>) -> Arc<Self> {
        let trust = auto_accept_policy(config.auto_accept);
        Self::with_trust_policy(config, connector, trust)
    }

    /// Creates a coordinator with an explicit trust policy.
    pub fn with_trust_policy(
        config: ClientConfig,
        connector: Arc<dyn UaConnector>,
        trust: TrustPolicy,
    ) -> Arc<Self> {
        Arc::new(Self {
            config,
            connector,
            trust,
            shared: Mutex::new(Shared {
                session: None,
                reconnect: None,
            }),
            next_attempt_id: AtomicU64::new(1),
            runtime: Handle::current(),
            stats: SessionStats::new(),
        })
    }

    /// Returns the configuration.
    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Returns the lifecycle counters.
    pub fn stats(&self) -> &SessionStats {
        &self.stats
    }

    /// Returns the current live session handle, if any.
    ///
    /// Callers fetch this at the point of each remote call, so calls made
    /// after a completed reconnect transparently use the replacement
    /// session.
    pub fn current_session(&self) -> Option<Arc<dyn UaSession>> {
        self.shared_lock().session.clone()
    }

    /// Returns `true` if a session is installed.
    pub fn is_connected(&self) -> bool {
        self.shared_lock().session.is_some()
    }

    /// Returns `true` while a reconnect handler is pending.
    pub fn reconnect_in_flight(&self) -> bool {
        self.shared_lock().reconnect.is_some()
    }

    // =========================================================================
    // Connect / Disconnect
    // =========================================================================

    /// Establishes the session: endpoint discovery within the discovery
    /// timeout, security selection, session creation with anonymous
    /// identity and the fixed request timeout, keep-alive registration.
    ///
    /// A no-op if a session is already installed.
    pub async fn connect(self: &Arc<Self>) -> Result<(), ConnectError> {
        if self.is_connected() {
            debug!("connect called while already connected");
            return Ok(());
        }

        let session = self.establish_session().await?;

        {
            let mut shared = self.shared_lock();
            shared.session = Some(session);
        }
        self.stats.record_connect();

        Ok(())
    }

    /// Closes the session and disposes any pending reconnect handler.
    ///
    /// Idempotent: a second call reports
    /// [`DisconnectOutcome::NothingToDisconnect`] and raises no error.
    /// Keep-alive events arriving afterwards fail the session identity
    /// check and are discarded.
    pub async fn disconnect(&self) -> DisconnectOutcome {
        let (session, pending) = {
            let mut shared = self.shared_lock();
            (shared.session.take(), shared.reconnect.take())
        };

        if let Some(pending) = pending {
            debug!(attempt_id = pending.attempt_id, "disposing pending reconnect handler");
            pending.task.abort();
        }

        match session {
            Some(session) => {
                info!(session_id = session.id(), "disconnecting");
                session.close().await;
                info!("session disconnected");
                DisconnectOutcome::Disconnected
            }
            None => {
                info!("nothing to disconnect");
                DisconnectOutcome::NothingToDisconnect
            }
        }
    }

    // =========================================================================
    // Keep-alive / Reconnect
    // =========================================================================

    /// Handles a heartbeat event from the transport.
    ///
    /// Events from replaced sessions are discarded. A bad status starts a
    /// reconnect unless one is already in flight (idempotent re-entry) or
    /// reconnects are disabled by configuration.
    pub fn keep_alive(self: &Arc<Self>, session_id: u64, status: KeepAliveStatus) {
        let mut shared = self.shared_lock();

        let stale = match shared.session.as_ref() {
            Some(session) => session.id() != session_id,
            None => true,
        };
        if stale {
            trace!(session_id, %status, "discarding keep-alive for replaced session");
            self.stats.record_stale_keep_alive();
            return;
        }

        if !status.is_bad() {
            trace!(session_id, "keep-alive good");
            return;
        }

        self.stats.record_keep_alive_failure();

        if !self.config.reconnect_enabled() {
            warn!(%status, "keep-alive failed but reconnect is disabled");
            return;
        }

        if shared.reconnect.is_some() {
            debug!(%status, "keep-alive failed, reconnect already in progress");
            return;
        }

        let attempt_id = self.next_attempt_id.fetch_add(1, Ordering::Relaxed);
        info!(
            %status,
            delay_ms = self.config.reconnect_period.as_millis() as u64,
            "keep-alive failed, scheduling reconnect"
        );

        let task = self
            .runtime
            .spawn(Self::run_reconnect(Arc::downgrade(self), attempt_id));
        shared.reconnect = Some(PendingReconnect { attempt_id, task });
        self.stats.record_reconnect_attempt();
    }

    /// The pending reconnect handler: waits the reconnect period, then
    /// rebuilds a session through the same discovery path as the initial
    /// connect and reports completion.
    async fn run_reconnect(this: Weak<SessionCoordinator>, attempt_id: u64) {
        let Some(coordinator) = this.upgrade() else {
            return;
        };

        tokio::time::sleep(coordinator.config.reconnect_period).await;

        match coordinator.establish_session().await {
            Ok(session) => coordinator.complete_reconnect(attempt_id, Some(session)),
            Err(error) => {
                warn!(%error, "reconnect attempt failed");
                coordinator.complete_reconnect(attempt_id, None);
            }
        }
    }

    /// Completion callback of the reconnect state machine.
    ///
    /// Ignores completions from superseded handlers. If the attempt
    /// produced a session it atomically replaces the current one; the
    /// pending handler is discarded either way, returning to `Idle`.
    fn complete_reconnect(&self, attempt_id: u64, new_session: Option<Arc<dyn UaSession>>) {
        let mut shared = self.shared_lock();

        let current = matches!(
            shared.reconnect.as_ref(),
            Some(pending) if pending.attempt_id == attempt_id
        );
        if !current {
            trace!(attempt_id, "discarding completion from a superseded reconnect handler");
            if let Some(session) = new_session {
                // Session produced after the handler was disposed; close it
                // in the background rather than leak it on the server.
                self.runtime.spawn(async move { session.close().await });
            }
            return;
        }

        if let Some(session) = new_session {
            info!(session_id = session.id(), "reconnected");
            shared.session = Some(session);
            self.stats.record_reconnect();
        }
        shared.reconnect = None;
    }

    /// Builds the keep-alive callback handed to the transport at session
    /// creation. Holds a weak reference so a dropped coordinator silences
    /// late events.
    fn keep_alive_sink(self: &Arc<Self>) -> KeepAliveSink {
        let weak = Arc::downgrade(self);
        Arc::new(move |session_id, status| {
            if let Some(coordinator) = weak.upgrade() {
                coordinator.keep_alive(session_id, status);
            }
        })
    }

    // =========================================================================
    // Internals
    // =========================================================================

    /// The shared connect path used by both the initial connect and the
    /// reconnect handler.
    async fn establish_session(self: &Arc<Self>) -> Result<Arc<dyn UaSession>, ConnectError> {
        let endpoint_url = &self.config.endpoint;

        info!(endpoint = %endpoint_url, "discovering endpoints");
        let endpoints = tokio::time::timeout(
            self.config.discovery_timeout,
            self.connector.discover(endpoint_url),
        )
        .await
        .map_err(|_| {
            ConnectError::discovery_timeout(
                endpoint_url,
                self.config.discovery_timeout.as_millis() as u64,
            )
        })??;

        let want_security = self.config.has_certificate();
        if !want_security {
            warn!("no application certificate provisioned, using unsecured endpoint");
        }

        let endpoint = select_endpoint(&endpoints, want_security)
            .ok_or_else(|| ConnectError::no_acceptable_endpoint(endpoint_url))?
            .clone();
        info!(
            policy = %endpoint.security_policy,
            mode = %endpoint.security_mode,
            "selected endpoint"
        );

        info!("creating session");
        let session = self
            .connector
            .create_session(
                &endpoint,
                &self.config,
                self.keep_alive_sink(),
                self.trust.clone(),
            )
            .await?;
        info!(session_id = session.id(), "session created");

        Ok(session)
    }

    fn shared_lock(&self) -> MutexGuard<'_, Shared> {
        // Recover from a poisoned lock; the guarded state stays consistent
        // because no critical section can panic midway through an update.
        self.shared.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl fmt::Debug for SessionCoordinator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionCoordinator")
            .field("endpoint", &self.config.endpoint)
            .field("connected", &self.is_connected())
            .field("reconnect_in_flight", &self.reconnect_in_flight())
            .finish()
    }
}

// =============================================================================
// SessionStats
// =============================================================================

/// Counters for session lifecycle events.
#[derive(Debug, Default)]
pub struct SessionStats {
    connects: AtomicU64,
    keep_alive_failures: AtomicU64,
    stale_keep_alives: AtomicU64,
    reconnect_attempts: AtomicU64,
    reconnects: AtomicU64,
}

impl SessionStats {
    /// Creates zeroed statistics.
    pub fn new() -> Self {
        Self::default()
    }

    fn record_connect(&self) {
        self.connects.fetch_add(1, Ordering::Relaxed);
    }

    fn record_keep_alive_failure(&self) {
        self.keep_alive_failures.fetch_add(1, Ordering::Relaxed);
    }

    fn record_stale_keep_alive(&self) {
        self.stale_keep_alives.fetch_add(1, Ordering::Relaxed);
    }

    fn record_reconnect_attempt(&self) {
        self.reconnect_attempts.fetch_add(1, Ordering::Relaxed);
    }

    fn record_reconnect(&self) {
        self.reconnects.fetch_add(1, Ordering::Relaxed);
    }

    /// Number of sessions established through `connect`.
    pub fn connects(&self) -> u64 {
        self.connects.load(Ordering::Relaxed)
    }

    /// Number of bad heartbeats observed on the live session.
    pub fn keep_alive_failures(&self) -> u64 {
        self.keep_alive_failures.load(Ordering::Relaxed)
    }

    /// Number of keep-alive events discarded as stale.
    pub fn stale_keep_alives(&self) -> u64 {
        self.stale_keep_alives.load(Ordering::Relaxed)
    }

    /// Number of reconnect handlers started.
    pub fn reconnect_attempts(&self) -> u64 {
        self.reconnect_attempts.load(Ordering::Relaxed)
    }

    /// Number of successful session replacements.
    pub fn reconnects(&self) -> u64 {
        self.reconnects.load(Ordering::Relaxed)
    }
}
