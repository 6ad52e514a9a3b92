//! Entry guards for protected actions.
//!
//! The guard layer is how callers consume the protocol: instead of
//! checking session state by hand before every protected action, wrap the
//! action in [`with_sealed_session`] and let the guard fail closed. The
//! guard decides before the action runs; the action itself never observes
//! an unsealed session.

use crate::bootstrap::{BootstrapError, BootstrapState};
use crate::context::SessionContext;

/// Runs `action` only when the context holds a sealed session.
///
/// The sealed [`BootstrapState`] is passed to the action so it can read
/// the bound identity, mode, lane, and tool sets.
///
/// # Errors
///
/// - [`BootstrapError::NoSession`] when no session exists.
/// - [`BootstrapError::NotSealed`] when the session exists but is not
///   sealed; the error enumerates the missing locks.
pub fn with_sealed_session<T, F>(ctx: &SessionContext, action: F) -> Result<T, BootstrapError>
where
    F: FnOnce(&BootstrapState) -> T,
{
    let session = ctx.require_sealed_session()?;
    Ok(action(session))
}

/// Scoped handle over an established (sealed) session.
///
/// Establishing verifies the seal once; the handle then lends out the
/// session for the duration of the scope. [`GateSession::close`]
/// terminates the session, after which the context refuses further
/// protected actions and further bootstraps.
#[derive(Debug)]
pub struct GateSession<'c> {
    ctx: &'c mut SessionContext,
    session: BootstrapState,
}

impl<'c> GateSession<'c> {
    /// Establishes a handle over the context's sealed session.
    ///
    /// The handle captures the sealed value at establishment; it holds the
    /// only mutable borrow of the context, so the slot cannot change
    /// underneath it.
    ///
    /// # Errors
    ///
    /// Fails with the same errors as [`with_sealed_session`] when the
    /// session is absent or unsealed.
    pub fn establish(ctx: &'c mut SessionContext) -> Result<Self, BootstrapError> {
        let session = ctx.require_sealed_session()?.clone();
        Ok(Self { ctx, session })
    }

    /// The sealed session.
    #[must_use]
    pub fn session(&self) -> &BootstrapState {
        &self.session
    }

    /// The session token.
    #[must_use]
    pub fn token(&self) -> &str {
        self.session().token().unwrap_or_default()
    }

    /// Terminates the session and releases the context.
    ///
    /// Termination is non-retryable: the terminated state stays in the
    /// slot so a later bootstrap attempt sees a dead session rather than
    /// an empty one.
    pub fn close(self) {
        if let Some(session) = self.ctx.take_session() {
            self.ctx.set_session(session.terminate());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bootstrap::{BootstrapBuilder, BootstrapStatus};
    use crate::config::GateConfig;
    use std::collections::BTreeSet;

    fn sealed_state() -> BootstrapState {
        let config = GateConfig::default();
        BootstrapBuilder::new(&config)
            .with_identity("GID-01", "Cody")
            .and_then(|b| b.with_mode("EXECUTION"))
            .and_then(|b| b.with_lane("GOVERNANCE"))
            .and_then(|b| b.with_tools(BTreeSet::new(), BTreeSet::new()))
            .and_then(BootstrapBuilder::with_handshake)
            .and_then(BootstrapBuilder::seal)
            .unwrap()
    }

    #[test]
    fn test_guard_refuses_empty_context() {
        let ctx = SessionContext::new();
        let result = with_sealed_session(&ctx, |_| ());
        assert!(matches!(result, Err(BootstrapError::NoSession)));
    }

    #[test]
    fn test_guard_refuses_unsealed_session() {
        let mut ctx = SessionContext::new();
        ctx.set_session(BootstrapState::new());
        let result = with_sealed_session(&ctx, |_| ());
        assert!(matches!(result, Err(BootstrapError::NotSealed { .. })));
    }

    #[test]
    fn test_guard_runs_action_with_sealed_session() {
        let mut ctx = SessionContext::new();
        ctx.set_session(sealed_state());
        let gid = with_sealed_session(&ctx, |s| s.gid().unwrap().to_string()).unwrap();
        assert_eq!(gid, "GID-01");
    }

    #[test]
    fn test_action_is_not_invoked_when_guard_refuses() {
        let ctx = SessionContext::new();
        let mut invoked = false;
        let _ = with_sealed_session(&ctx, |_| {
            invoked = true;
        });
        assert!(!invoked);
    }

    #[test]
    fn test_gate_session_close_terminates() {
        let mut ctx = SessionContext::new();
        ctx.set_session(sealed_state());

        let handle = GateSession::establish(&mut ctx).unwrap();
        assert!(handle.token().starts_with("boot_"));
        handle.close();

        let session = ctx.session().unwrap();
        assert_eq!(session.status, BootstrapStatus::Terminated);
        assert!(matches!(
            ctx.require_sealed_session(),
            Err(BootstrapError::NotSealed { .. })
        ));
    }

    #[test]
    fn test_gate_session_refuses_unsealed() {
        let mut ctx = SessionContext::new();
        ctx.set_session(BootstrapState::new());
        assert!(GateSession::establish(&mut ctx).is_err());
    }
}
