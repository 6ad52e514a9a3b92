//! Bootstrap orchestration: the five-lock sequence and seal.
//!
//! [`BootstrapEnforcer::bootstrap`] validates identity, mode, and lane
//! against the [`IdentityDirectory`], resolves the tool strip through the
//! [`ToolMatrix`], completes the echo handshake, and seals the session.
//!
//! Failure semantics:
//!
//! - A missing locked snapshot refuses the call before any lock logic runs
//!   ([`BootstrapError::SnapshotRequired`]); no lock events are emitted.
//! - A sealed session in the context terminates and refuses
//!   ([`BootstrapError::RebootstrapForbidden`]) — a sealed session is never
//!   refreshed in place.
//! - Lock validation failures cascade: once any lock has failed, every
//!   later lock is reported failed ("blocked by prior failure") and its
//!   underlying validator is never invoked. The aggregate comes back as
//!   `Ok(report)` with `success == false` so callers can inspect the
//!   failed-lock list without exception-driven control flow.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use super::error::BootstrapError;
use super::state::{BootstrapState, LockId};
use crate::config::GateConfig;
use crate::context::SessionContext;
use crate::event::{EventSink, GateEvent};
use crate::policy::{IdentityDirectory, ToolMatrix};

/// Reason recorded for locks skipped by the cascade.
const BLOCKED_BY_PRIOR_FAILURE: &str = "blocked by prior failure";

/// Role recorded when the directory knows the GID but not its role.
const UNKNOWN_ROLE: &str = "unknown";

// =============================================================================
// Bootstrap Report
// =============================================================================

/// Aggregate outcome of one bootstrap attempt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BootstrapReport {
    /// Whether the session sealed.
    pub success: bool,
    /// The final state of the attempt.
    pub state: BootstrapState,
    /// Locks that failed, in canonical order.
    pub failed_locks: Vec<LockId>,
    /// Human-readable summary.
    pub message: String,
}

impl BootstrapReport {
    /// The session token, when sealed.
    #[must_use]
    pub fn token(&self) -> Option<&str> {
        if self.success { self.state.token() } else { None }
    }
}

// =============================================================================
// Bootstrap Enforcer
// =============================================================================

/// Orchestrates the bootstrap stage and guards the "current session" slot.
pub struct BootstrapEnforcer {
    config: GateConfig,
    directory: Arc<dyn IdentityDirectory>,
    matrix: Arc<dyn ToolMatrix>,
    sink: Arc<dyn EventSink>,
}

impl BootstrapEnforcer {
    /// Creates an enforcer with its policy collaborators and event sink.
    #[must_use]
    pub fn new(
        config: GateConfig,
        directory: Arc<dyn IdentityDirectory>,
        matrix: Arc<dyn ToolMatrix>,
        sink: Arc<dyn EventSink>,
    ) -> Self {
        Self {
            config,
            directory,
            matrix,
            sink,
        }
    }

    /// Runs the full bootstrap sequence for a `(gid, mode, lane)` triple.
    ///
    /// # Errors
    ///
    /// - [`BootstrapError::SnapshotRequired`] when no locked snapshot is
    ///   present (and the precondition is enforced).
    /// - [`BootstrapError::RebootstrapForbidden`] when a sealed session
    ///   already exists; that session is terminated in place.
    ///
    /// Lock validation failures are reported, not raised.
    pub fn bootstrap(
        &self,
        ctx: &mut SessionContext,
        gid: &str,
        mode: &str,
        lane: &str,
    ) -> Result<BootstrapReport, BootstrapError> {
        // Stage-one precondition, checked before any lock logic.
        if self.config.enforce_snapshot_precondition && ctx.require_locked_snapshot().is_err() {
            self.sink.emit(&GateEvent::SnapshotMissing);
            tracing::warn!(%gid, "bootstrap refused: no locked snapshot");
            return Err(BootstrapError::SnapshotRequired);
        }

        // A sealed session cannot be refreshed in place.
        if ctx.session().is_some_and(BootstrapState::is_sealed) {
            self.sink.emit(&GateEvent::RebootstrapBlocked);
            tracing::warn!(%gid, "re-bootstrap refused: terminating sealed session");
            if let Some(session) = ctx.take_session() {
                ctx.set_session(session.terminate());
            }
            return Err(BootstrapError::RebootstrapForbidden);
        }

        self.sink.emit(&GateEvent::BootstrapStarted {
            gid: gid.to_string(),
        });
        tracing::debug!(%gid, %mode, %lane, "bootstrap sequence started");

        let mut failed: Vec<LockId> = Vec::new();
        let mut state = BootstrapState::new();

        // BOOT-01: Identity Lock
        if self.directory.validate_gid(gid) {
            let role = self
                .directory
                .role(gid)
                .unwrap_or_else(|| UNKNOWN_ROLE.to_string());
            match state.clone().acquire_identity(gid, &role) {
                Ok(next) => {
                    state = next;
                    self.lock_acquired(LockId::Boot01, gid);
                }
                Err(err) => self.lock_failed(&mut failed, LockId::Boot01, &err.to_string()),
            }
        } else {
            self.lock_failed(&mut failed, LockId::Boot01, &format!("invalid GID: {gid}"));
        }

        // BOOT-02: Mode Lock
        if !failed.is_empty() {
            self.lock_failed(&mut failed, LockId::Boot02, BLOCKED_BY_PRIOR_FAILURE);
        } else if self.directory.validate_mode(gid, mode) {
            match state.clone().acquire_mode(mode) {
                Ok(next) => {
                    state = next;
                    self.lock_acquired(LockId::Boot02, mode);
                }
                Err(err) => self.lock_failed(&mut failed, LockId::Boot02, &err.to_string()),
            }
        } else {
            self.lock_failed(
                &mut failed,
                LockId::Boot02,
                &format!("mode {mode} not permitted for {gid}"),
            );
        }

        // BOOT-03: Lane Lock
        if !failed.is_empty() {
            self.lock_failed(&mut failed, LockId::Boot03, BLOCKED_BY_PRIOR_FAILURE);
        } else if self.directory.validate_lane(gid, lane) {
            match state.clone().acquire_lane(lane) {
                Ok(next) => {
                    state = next;
                    self.lock_acquired(LockId::Boot03, lane);
                }
                Err(err) => self.lock_failed(&mut failed, LockId::Boot03, &err.to_string()),
            }
        } else {
            self.lock_failed(
                &mut failed,
                LockId::Boot03,
                &format!("lane {lane} not permitted for {gid}"),
            );
        }

        // BOOT-04: Tool Strip
        if !failed.is_empty() {
            self.lock_failed(&mut failed, LockId::Boot04, BLOCKED_BY_PRIOR_FAILURE);
        } else {
            let grant = self.matrix.evaluate(mode, lane);
            let detail = format!("{} tools permitted", grant.permitted.len());
            match state.clone().acquire_tools(grant.permitted, grant.stripped) {
                Ok(next) => {
                    state = next;
                    self.lock_acquired(LockId::Boot04, &detail);
                }
                Err(err) => self.lock_failed(&mut failed, LockId::Boot04, &err.to_string()),
            }
        }

        // BOOT-05: Echo Handshake — requires no prior failures.
        if !failed.is_empty() {
            self.lock_failed(&mut failed, LockId::Boot05, BLOCKED_BY_PRIOR_FAILURE);
        } else {
            let echo = format!("{gid} | {mode} | {lane}");
            match state.clone().complete_handshake(&echo) {
                Ok(next) => {
                    state = next;
                    self.lock_acquired(LockId::Boot05, &echo);
                }
                Err(err) => self.lock_failed(&mut failed, LockId::Boot05, &err.to_string()),
            }
        }

        // Seal or fail.
        if !failed.is_empty() {
            let reason = format!(
                "failed locks: {}",
                failed
                    .iter()
                    .map(|l| l.as_str())
                    .collect::<Vec<_>>()
                    .join(", ")
            );
            let state = state.fail(&reason);
            self.sink.emit(&GateEvent::BootstrapFailed {
                failed: failed.clone(),
                passed: LockId::ALL.len() - failed.len(),
            });
            tracing::warn!(%gid, failed = failed.len(), "bootstrap failed");
            ctx.set_session(state.clone());
            let message = format!("bootstrap failed: {} locks failed", failed.len());
            return Ok(BootstrapReport {
                success: false,
                state,
                failed_locks: failed,
                message,
            });
        }

        let sealed = match state.clone().seal(&self.config) {
            Ok(sealed) => sealed,
            Err(err) => {
                let reason = err.to_string();
                let state = state.fail(&reason);
                self.sink.emit(&GateEvent::BootstrapFailed {
                    failed: Vec::new(),
                    passed: LockId::ALL.len(),
                });
                tracing::warn!(%gid, %reason, "seal refused");
                ctx.set_session(state.clone());
                return Ok(BootstrapReport {
                    success: false,
                    state,
                    failed_locks: Vec::new(),
                    message: reason,
                });
            }
        };

        let token = sealed.token().unwrap_or_default().to_string();

        // Bind the locked snapshot to the new session token (one-time; an
        // already-bound lock is left as-is).
        if let Some(snapshot) = ctx.take_snapshot() {
            let next = snapshot
                .clone()
                .bind_to_session(&token)
                .unwrap_or(snapshot);
            ctx.set_snapshot(next);
        }

        self.sink.emit(&GateEvent::SessionSealed {
            token: token.clone(),
            gid: gid.to_string(),
            mode: mode.to_string(),
            lane: lane.to_string(),
            permitted: sealed.permitted_tools.len(),
            stripped: sealed.stripped_tools.len(),
        });
        tracing::debug!(%gid, %token, "session sealed");

        ctx.set_session(sealed.clone());
        Ok(BootstrapReport {
            success: true,
            state: sealed,
            failed_locks: Vec::new(),
            message: "bootstrap complete: session sealed".to_string(),
        })
    }

    /// Requires a sealed session, emitting a denial event on failure.
    ///
    /// # Errors
    ///
    /// Propagates the context guard failure; the error message enumerates
    /// the missing locks.
    pub fn require_sealed_session<'c>(
        &self,
        ctx: &'c SessionContext,
    ) -> Result<&'c BootstrapState, BootstrapError> {
        match ctx.require_sealed_session() {
            Ok(session) => Ok(session),
            Err(err) => {
                self.sink.emit(&GateEvent::ActionBlocked {
                    reason: err.to_string(),
                });
                tracing::warn!(error = %err, "protected action blocked");
                Err(err)
            }
        }
    }

    /// `true` if the context holds a sealed session.
    #[must_use]
    pub fn is_bootstrapped(&self, ctx: &SessionContext) -> bool {
        ctx.session().is_some_and(BootstrapState::is_sealed)
    }

    fn lock_acquired(&self, lock: LockId, value: &str) {
        tracing::debug!(lock = %lock, %value, "lock acquired");
        self.sink.emit(&GateEvent::LockAcquired {
            lock,
            value: value.to_string(),
        });
    }

    fn lock_failed(&self, failed: &mut Vec<LockId>, lock: LockId, reason: &str) {
        tracing::warn!(lock = %lock, %reason, "lock failed");
        self.sink.emit(&GateEvent::LockFailed {
            lock,
            reason: reason.to_string(),
        });
        failed.push(lock);
    }
}
