//! Session binding on the shared core connection.
//!
//! # Responsibilities
//! - Hold the "current domain / current user" identity registered on the
//!   shared connection
//! - Issue the register / unregister handshakes around a unit of work
//! - Serialize bind…submit…await…unbind across concurrent callers
//! - Detect and repair a binding left behind by a crashed unit of work
//!
//! # Design Decisions
//! - The core keys requests on the connection-global registered identity,
//!   so one binding may be active at a time. The async mutex guard *is*
//!   the single-owner token: holding it for the whole unit of work is the
//!   deliberate throughput bottleneck of this gateway, not an oversight.
//! - A guard dropped with its binding still active (handler cancelled or
//!   panicked mid-wait) is caught at the next acquisition: logged as a
//!   protocol-state error, counted, and repaired with a compensating
//!   unregister. Never silently ignored, never fatal.

use std::sync::Arc;

use tokio::sync::{Mutex, MutexGuard};

use crate::core::client::CoreClient;
use crate::core::wire::{DomainId, UserId};
use crate::error::{GatewayError, GatewayResult};
use crate::observability::metrics;

/// The identity currently registered on the shared connection.
#[derive(Debug, Clone)]
pub struct SessionBinding {
    pub domain_id: DomainId,
    pub user_id: UserId,
}

/// Mutable session state behind the gate.
pub struct SessionContext {
    client: Arc<CoreClient>,
    active: Option<SessionBinding>,
}

impl SessionContext {
    /// Register `domain_id`/`user_id` as the connection's active identity.
    ///
    /// Must be called before any domain-scoped request is submitted.
    pub async fn bind(&mut self, domain_id: DomainId, user_id: UserId) -> GatewayResult<()> {
        if let Some(binding) = &self.active {
            return Err(GatewayError::ProtocolViolation(format!(
                "bind while domain {} is already bound",
                binding.domain_id
            )));
        }
        self.client.register(domain_id, user_id.clone()).await?;
        self.active = Some(SessionBinding { domain_id, user_id });
        tracing::debug!(domain_id = %domain_id, "Session bound");
        Ok(())
    }

    /// Deregister the active identity.
    pub async fn unbind(&mut self) -> GatewayResult<()> {
        let binding = self.active.take().ok_or_else(|| {
            metrics::record_protocol_violation();
            GatewayError::ProtocolViolation("unbind without matching bind".to_string())
        })?;
        self.client.unregister().await?;
        tracing::debug!(domain_id = %binding.domain_id, "Session unbound");
        Ok(())
    }

    /// The binding currently registered, if any.
    pub fn active(&self) -> Option<&SessionBinding> {
        self.active.as_ref()
    }
}

/// Exclusive gate in front of the session state.
///
/// `acquire` is the only way to reach a [`SessionContext`], so the mutex
/// guard doubles as the single-owner token required to touch the shared
/// connection's identity.
pub struct SessionGate {
    inner: Mutex<SessionContext>,
}

impl SessionGate {
    pub fn new(client: Arc<CoreClient>) -> Self {
        Self {
            inner: Mutex::new(SessionContext {
                client,
                active: None,
            }),
        }
    }

    /// Take exclusive ownership of the session for one unit of work.
    ///
    /// If the previous owner left a binding active, that is a protocol
    /// state error: it is reported, counted, and repaired here with a
    /// compensating unregister before the new owner proceeds.
    pub async fn acquire(&self) -> MutexGuard<'_, SessionContext> {
        let mut guard = self.inner.lock().await;
        if let Some(stale) = guard.active.take() {
            metrics::record_protocol_violation();
            tracing::error!(
                domain_id = %stale.domain_id,
                "Stale session binding left on connection, sending compensating unregister"
            );
            if let Err(e) = guard.client.unregister().await {
                tracing::warn!(error = %e, "Compensating unregister failed");
            }
        }
        guard
    }
}
