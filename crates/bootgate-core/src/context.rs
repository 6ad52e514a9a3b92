//! Session context: the two "current" slots.
//!
//! Exactly one mutable resource exists in the protocol — the current
//! snapshot and the current bootstrap session. Instead of process-wide
//! globals, both slots live in a [`SessionContext`] owned by the caller:
//! one context per logical session, passed by `&mut` reference to every
//! enforcer call. Single-writer access is then enforced by the borrow
//! checker, and a seal is atomic by construction — the slot goes from
//! empty/unsealed to a fully sealed value in one assignment; no reader can
//! observe a state with some-but-not-all locks acquired that claims to be
//! sealed.
//!
//! The `require_*` guards are pure reads: calling them repeatedly on an
//! unchanged context returns equal results and has no side effects.

use serde::{Deserialize, Serialize};

use crate::bootstrap::{BootstrapError, BootstrapState, LockId};
use crate::snapshot::{SnapshotError, SnapshotState};

/// Holds the current snapshot and bootstrap session for one logical
/// session.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionContext {
    snapshot: Option<SnapshotState>,
    session: Option<BootstrapState>,
}

impl SessionContext {
    /// Creates an empty context.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Current snapshot, if any.
    #[must_use]
    pub fn snapshot(&self) -> Option<&SnapshotState> {
        self.snapshot.as_ref()
    }

    /// Current bootstrap session, if any.
    #[must_use]
    pub fn session(&self) -> Option<&BootstrapState> {
        self.session.as_ref()
    }

    /// Replaces the snapshot slot.
    pub fn set_snapshot(&mut self, state: SnapshotState) {
        self.snapshot = Some(state);
    }

    /// Takes the snapshot out of its slot.
    pub fn take_snapshot(&mut self) -> Option<SnapshotState> {
        self.snapshot.take()
    }

    /// Replaces the session slot.
    pub fn set_session(&mut self, state: BootstrapState) {
        self.session = Some(state);
    }

    /// Takes the session out of its slot.
    pub fn take_session(&mut self) -> Option<BootstrapState> {
        self.session.take()
    }

    /// Clears the snapshot slot.
    pub fn clear_snapshot(&mut self) {
        self.snapshot = None;
    }

    /// Clears the session slot.
    pub fn clear_session(&mut self) {
        self.session = None;
    }

    /// Clears both slots.
    pub fn clear(&mut self) {
        self.snapshot = None;
        self.session = None;
    }

    // =========================================================================
    // Guards
    // =========================================================================

    /// Requires that a snapshot exists, locked or not.
    ///
    /// # Errors
    ///
    /// Returns [`SnapshotError::Required`] if the slot is empty.
    pub fn require_snapshot(&self) -> Result<&SnapshotState, SnapshotError> {
        self.snapshot.as_ref().ok_or(SnapshotError::Required)
    }

    /// Requires a locked snapshot.
    ///
    /// # Errors
    ///
    /// Returns [`SnapshotError::Required`] if the slot is empty, or
    /// [`SnapshotError::NotLocked`] if present but unlocked.
    pub fn require_locked_snapshot(&self) -> Result<&SnapshotState, SnapshotError> {
        let snapshot = self.require_snapshot()?;
        if !snapshot.is_locked() {
            return Err(SnapshotError::NotLocked);
        }
        Ok(snapshot)
    }

    /// Requires a sealed bootstrap session.
    ///
    /// # Errors
    ///
    /// Returns [`BootstrapError::NoSession`] if the slot is empty, or
    /// [`BootstrapError::NotSealed`] (enumerating the missing locks and the
    /// session status) if present but not sealed.
    pub fn require_sealed_session(&self) -> Result<&BootstrapState, BootstrapError> {
        let Some(session) = self.session.as_ref() else {
            return Err(BootstrapError::NoSession);
        };
        if !session.is_sealed() {
            return Err(BootstrapError::NotSealed {
                status: session.status,
                missing: session.missing_locks(),
            });
        }
        Ok(session)
    }

    /// Locks still missing from the current session; all five when no
    /// session exists.
    #[must_use]
    pub fn missing_locks(&self) -> Vec<LockId> {
        self.session
            .as_ref()
            .map_or_else(|| LockId::ALL.to_vec(), BootstrapState::missing_locks)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_context_guards_fail_closed() {
        let ctx = SessionContext::new();
        assert!(matches!(
            ctx.require_snapshot(),
            Err(SnapshotError::Required)
        ));
        assert!(matches!(
            ctx.require_locked_snapshot(),
            Err(SnapshotError::Required)
        ));
        assert!(matches!(
            ctx.require_sealed_session(),
            Err(BootstrapError::NoSession)
        ));
        assert_eq!(ctx.missing_locks().len(), 5);
    }

    #[test]
    fn test_unlocked_snapshot_is_not_enough() {
        let mut ctx = SessionContext::new();
        ctx.set_snapshot(SnapshotState::new());
        assert!(ctx.require_snapshot().is_ok());
        assert!(matches!(
            ctx.require_locked_snapshot(),
            Err(SnapshotError::NotLocked)
        ));
    }

    #[test]
    fn test_guards_are_idempotent() {
        let mut ctx = SessionContext::new();
        ctx.set_snapshot(SnapshotState::new());

        let first = ctx.require_locked_snapshot().unwrap_err();
        let second = ctx.require_locked_snapshot().unwrap_err();
        assert_eq!(first, second);
        // The slot is untouched by the guard.
        assert_eq!(ctx.snapshot(), Some(&SnapshotState::new()));
    }

    #[test]
    fn test_sealed_session_guard_is_idempotent() {
        use std::collections::BTreeSet;

        use crate::bootstrap::BootstrapBuilder;
        use crate::config::GateConfig;

        let config = GateConfig::default();
        let sealed = BootstrapBuilder::new(&config)
            .with_identity("GID-01", "Cody")
            .and_then(|b| b.with_mode("EXECUTION"))
            .and_then(|b| b.with_lane("GOVERNANCE"))
            .and_then(|b| b.with_tools(BTreeSet::new(), BTreeSet::new()))
            .and_then(BootstrapBuilder::with_handshake)
            .and_then(BootstrapBuilder::seal)
            .unwrap();

        let mut ctx = SessionContext::new();
        ctx.set_session(sealed.clone());

        let first = ctx.require_sealed_session().unwrap().clone();
        let second = ctx.require_sealed_session().unwrap().clone();
        assert_eq!(first, second);
        // The slot is untouched by the guard.
        assert_eq!(ctx.session(), Some(&sealed));
    }

    #[test]
    fn test_clear_empties_both_slots() {
        let mut ctx = SessionContext::new();
        ctx.set_snapshot(SnapshotState::new());
        ctx.set_session(BootstrapState::new());
        ctx.clear();
        assert!(ctx.snapshot().is_none());
        assert!(ctx.session().is_none());
    }
}
