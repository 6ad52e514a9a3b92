//! Fluent sequencer for the five bootstrap locks.
//!
//! Sugar over the pure transition pipeline on [`BootstrapState`], for
//! callers that drive the locks themselves (the enforcer layers policy
//! validation on top).
//!
//! ```rust
//! use std::collections::BTreeSet;
//!
//! use bootgate_core::GateConfig;
//! use bootgate_core::bootstrap::BootstrapBuilder;
//!
//! let config = GateConfig::default();
//! let sealed = BootstrapBuilder::new(&config)
//!     .with_identity("GID-01", "Cody")
//!     .and_then(|b| b.with_mode("EXECUTION"))
//!     .and_then(|b| b.with_lane("GOVERNANCE"))
//!     .and_then(|b| b.with_tools(BTreeSet::new(), BTreeSet::new()))
//!     .and_then(BootstrapBuilder::with_handshake)
//!     .and_then(BootstrapBuilder::seal)
//!     .unwrap();
//! assert!(sealed.is_sealed());
//! assert_eq!(sealed.echo_handshake.as_deref(), Some("GID-01 | EXECUTION | GOVERNANCE"));
//! ```

use std::collections::BTreeSet;

use super::error::BootstrapError;
use super::state::BootstrapState;
use crate::config::GateConfig;

/// Drives a [`BootstrapState`] through BOOT-01..BOOT-05 and seal.
#[derive(Debug, Clone)]
pub struct BootstrapBuilder<'a> {
    config: &'a GateConfig,
    state: BootstrapState,
}

impl<'a> BootstrapBuilder<'a> {
    /// Starts a fresh session.
    #[must_use]
    pub fn new(config: &'a GateConfig) -> Self {
        Self {
            config,
            state: BootstrapState::new(),
        }
    }

    /// Current state.
    #[must_use]
    pub fn state(&self) -> &BootstrapState {
        &self.state
    }

    /// Consumes the builder, yielding the state as-is (sealed or not).
    #[must_use]
    pub fn into_state(self) -> BootstrapState {
        self.state
    }

    /// BOOT-01: binds identity and role.
    ///
    /// # Errors
    ///
    /// Propagates [`BootstrapState::acquire_identity`] failures.
    pub fn with_identity(mut self, gid: &str, role: &str) -> Result<Self, BootstrapError> {
        self.state = self.state.acquire_identity(gid, role)?;
        Ok(self)
    }

    /// BOOT-02: binds the execution mode.
    ///
    /// # Errors
    ///
    /// Propagates [`BootstrapState::acquire_mode`] failures.
    pub fn with_mode(mut self, mode: &str) -> Result<Self, BootstrapError> {
        self.state = self.state.acquire_mode(mode)?;
        Ok(self)
    }

    /// BOOT-03: binds the work lane.
    ///
    /// # Errors
    ///
    /// Propagates [`BootstrapState::acquire_lane`] failures.
    pub fn with_lane(mut self, lane: &str) -> Result<Self, BootstrapError> {
        self.state = self.state.acquire_lane(lane)?;
        Ok(self)
    }

    /// BOOT-04: binds the resolved tool sets.
    ///
    /// # Errors
    ///
    /// Propagates [`BootstrapState::acquire_tools`] failures.
    pub fn with_tools(
        mut self,
        permitted: BTreeSet<String>,
        stripped: BTreeSet<String>,
    ) -> Result<Self, BootstrapError> {
        self.state = self.state.acquire_tools(permitted, stripped)?;
        Ok(self)
    }

    /// BOOT-05: completes the handshake, auto-synthesizing
    /// `"{gid} | {mode} | {lane}"` from the locks acquired so far.
    ///
    /// # Errors
    ///
    /// Propagates [`BootstrapState::complete_handshake`] failures.
    pub fn with_handshake(self) -> Result<Self, BootstrapError> {
        let echo = format!(
            "{} | {} | {}",
            self.state.gid.as_deref().unwrap_or_default(),
            self.state.mode.as_deref().unwrap_or_default(),
            self.state.lane.as_deref().unwrap_or_default(),
        );
        self.with_handshake_value(&echo)
    }

    /// BOOT-05 with an explicit handshake string.
    ///
    /// # Errors
    ///
    /// Propagates [`BootstrapState::complete_handshake`] failures.
    pub fn with_handshake_value(mut self, echo: &str) -> Result<Self, BootstrapError> {
        self.state = self.state.complete_handshake(echo)?;
        Ok(self)
    }

    /// Seals the session and returns the final state.
    ///
    /// # Errors
    ///
    /// Propagates [`BootstrapState::seal`] failures.
    pub fn seal(self) -> Result<BootstrapState, BootstrapError> {
        self.state.seal(self.config)
    }
}
