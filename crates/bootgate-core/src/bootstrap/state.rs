//! Immutable bootstrap session state.
//!
//! One [`BootstrapState`] models one session's five-lock acquisition and
//! seal. Like the snapshot stage, every transition consumes the state and
//! returns a new value. A sealed session admits no further acquisitions:
//! every mutating method on a sealed state fails with
//! [`BootstrapError::RebootstrapForbidden`] instead of mutating.
//!
//! # State Machine
//!
//! ```text
//! NotStarted --first acquire--> InProgress --seal--> Sealed     (terminal success)
//!     InProgress --fail--> Failed                               (terminal, retry via fresh state)
//!     Sealed --terminate--> Terminated                          (terminal, non-retryable)
//! ```

use std::collections::BTreeSet;

use chrono::Utc;
use serde::{Deserialize, Serialize};

use super::error::BootstrapError;
use crate::config::GateConfig;

// =============================================================================
// Lock Identifiers
// =============================================================================

/// The five ordered bootstrap locks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LockId {
    /// BOOT-01 — Identity Lock.
    Boot01,
    /// BOOT-02 — Mode Lock.
    Boot02,
    /// BOOT-03 — Lane Lock.
    Boot03,
    /// BOOT-04 — Tool Strip.
    Boot04,
    /// BOOT-05 — Echo Handshake.
    Boot05,
}

impl LockId {
    /// All locks in canonical acquisition order.
    pub const ALL: [Self; 5] = [
        Self::Boot01,
        Self::Boot02,
        Self::Boot03,
        Self::Boot04,
        Self::Boot05,
    ];

    /// Wire identifier, e.g. `"BOOT-01"`.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Boot01 => "BOOT-01",
            Self::Boot02 => "BOOT-02",
            Self::Boot03 => "BOOT-03",
            Self::Boot04 => "BOOT-04",
            Self::Boot05 => "BOOT-05",
        }
    }

    /// Human-readable lock name.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Boot01 => "Identity Lock",
            Self::Boot02 => "Mode Lock",
            Self::Boot03 => "Lane Lock",
            Self::Boot04 => "Tool Strip",
            Self::Boot05 => "Echo Handshake",
        }
    }
}

impl std::fmt::Display for LockId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// Lock State
// =============================================================================

/// One lock's acquisition record. Acquiring is one-time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LockState {
    /// Which lock this is.
    pub lock_id: LockId,
    /// Whether the lock has been acquired.
    pub acquired: bool,
    /// The value bound into the lock at acquisition.
    pub value: Option<String>,
    /// Acquisition timestamp, RFC 3339.
    pub acquired_at: Option<String>,
}

impl LockState {
    /// Creates an unacquired lock.
    #[must_use]
    pub fn new(lock_id: LockId) -> Self {
        Self {
            lock_id,
            acquired: false,
            value: None,
            acquired_at: None,
        }
    }

    /// Acquires the lock, binding a value.
    ///
    /// # Errors
    ///
    /// Returns [`BootstrapError::LockAlreadyAcquired`] on a second
    /// acquisition.
    pub fn acquire(self, value: &str) -> Result<Self, BootstrapError> {
        if self.acquired {
            return Err(BootstrapError::LockAlreadyAcquired { lock: self.lock_id });
        }
        Ok(Self {
            acquired: true,
            value: Some(value.to_string()),
            acquired_at: Some(Utc::now().to_rfc3339()),
            ..self
        })
    }

    /// Human-readable lock name.
    #[must_use]
    pub const fn lock_name(&self) -> &'static str {
        self.lock_id.name()
    }
}

// =============================================================================
// Status
// =============================================================================

/// Bootstrap session status.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BootstrapStatus {
    /// No lock acquired yet.
    #[default]
    NotStarted,
    /// At least one lock acquired, not yet sealed.
    InProgress,
    /// Terminal success: all locks acquired, token minted.
    Sealed,
    /// Terminal failure: one or more locks failed. Retryable via a fresh
    /// state.
    Failed,
    /// Terminal, non-retryable: reached from Sealed when a re-bootstrap
    /// was blocked.
    Terminated,
}

impl BootstrapStatus {
    /// Returns `true` for statuses that admit no further transitions.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Sealed | Self::Failed | Self::Terminated)
    }
}

// =============================================================================
// Bootstrap State
// =============================================================================

/// Immutable state of one bootstrap session.
///
/// Invariant: [`BootstrapState::is_sealed`] is `true` iff the status is
/// [`BootstrapStatus::Sealed`] **and** all five locks are acquired **and**
/// the token is present and non-empty.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BootstrapState {
    /// Identity, present once BOOT-01 is acquired.
    pub gid: Option<String>,
    /// Role resolved for the identity.
    pub role: Option<String>,
    /// Execution mode, present once BOOT-02 is acquired.
    pub mode: Option<String>,
    /// Work lane, present once BOOT-03 is acquired.
    pub lane: Option<String>,

    /// BOOT-01 Identity Lock.
    pub identity_lock: LockState,
    /// BOOT-02 Mode Lock.
    pub mode_lock: LockState,
    /// BOOT-03 Lane Lock.
    pub lane_lock: LockState,
    /// BOOT-04 Tool Strip.
    pub tool_lock: LockState,
    /// BOOT-05 Echo Handshake.
    pub handshake_lock: LockState,

    /// Tools the session may invoke.
    pub permitted_tools: BTreeSet<String>,
    /// Tools stripped from the session.
    pub stripped_tools: BTreeSet<String>,
    /// The synthesized handshake string.
    pub echo_handshake: Option<String>,

    /// Session status.
    pub status: BootstrapStatus,
    /// One-time session token, present only when sealed.
    pub bootstrap_token: Option<String>,

    /// When the first lock was acquired, RFC 3339.
    pub started_at: Option<String>,
    /// When the session sealed, RFC 3339.
    pub sealed_at: Option<String>,
    /// When the session terminated, RFC 3339.
    pub terminated_at: Option<String>,
    /// Failure description, if failed.
    pub failure_reason: Option<String>,
}

impl Default for BootstrapState {
    fn default() -> Self {
        Self::new()
    }
}

impl BootstrapState {
    /// Creates a fresh, not-started session state.
    #[must_use]
    pub fn new() -> Self {
        Self {
            gid: None,
            role: None,
            mode: None,
            lane: None,
            identity_lock: LockState::new(LockId::Boot01),
            mode_lock: LockState::new(LockId::Boot02),
            lane_lock: LockState::new(LockId::Boot03),
            tool_lock: LockState::new(LockId::Boot04),
            handshake_lock: LockState::new(LockId::Boot05),
            permitted_tools: BTreeSet::new(),
            stripped_tools: BTreeSet::new(),
            echo_handshake: None,
            status: BootstrapStatus::NotStarted,
            bootstrap_token: None,
            started_at: None,
            sealed_at: None,
            terminated_at: None,
            failure_reason: None,
        }
    }

    /// The lock record for an id.
    #[must_use]
    pub fn lock(&self, id: LockId) -> &LockState {
        match id {
            LockId::Boot01 => &self.identity_lock,
            LockId::Boot02 => &self.mode_lock,
            LockId::Boot03 => &self.lane_lock,
            LockId::Boot04 => &self.tool_lock,
            LockId::Boot05 => &self.handshake_lock,
        }
    }

    /// `true` if all five locks are acquired.
    #[must_use]
    pub fn all_locks_acquired(&self) -> bool {
        LockId::ALL.iter().all(|id| self.lock(*id).acquired)
    }

    /// Locks not yet acquired, in canonical order.
    #[must_use]
    pub fn missing_locks(&self) -> Vec<LockId> {
        LockId::ALL
            .into_iter()
            .filter(|id| !self.lock(*id).acquired)
            .collect()
    }

    /// `true` iff sealed with all locks acquired and a non-empty token.
    #[must_use]
    pub fn is_sealed(&self) -> bool {
        self.status == BootstrapStatus::Sealed
            && self.all_locks_acquired()
            && self
                .bootstrap_token
                .as_ref()
                .is_some_and(|t| !t.is_empty())
    }

    /// Identity bound into the session, if BOOT-01 is acquired.
    #[must_use]
    pub fn gid(&self) -> Option<&str> {
        self.gid.as_deref()
    }

    /// Session token, if sealed.
    #[must_use]
    pub fn token(&self) -> Option<&str> {
        self.bootstrap_token.as_deref()
    }

    fn refuse_if_sealed(&self) -> Result<(), BootstrapError> {
        if self.status == BootstrapStatus::Sealed {
            return Err(BootstrapError::RebootstrapForbidden);
        }
        Ok(())
    }

    fn started(self) -> Self {
        if self.status == BootstrapStatus::NotStarted {
            Self {
                status: BootstrapStatus::InProgress,
                started_at: Some(Utc::now().to_rfc3339()),
                ..self
            }
        } else {
            self
        }
    }

    // =========================================================================
    // Transitions — each consumes self and returns a new value
    // =========================================================================

    /// BOOT-01: acquires the identity lock.
    ///
    /// # Errors
    ///
    /// - [`BootstrapError::RebootstrapForbidden`] on a sealed session.
    /// - [`BootstrapError::LockAlreadyAcquired`] on a second acquisition.
    pub fn acquire_identity(self, gid: &str, role: &str) -> Result<Self, BootstrapError> {
        self.refuse_if_sealed()?;
        let identity_lock = self.identity_lock.clone().acquire(gid)?;
        Ok(Self {
            gid: Some(gid.to_string()),
            role: Some(role.to_string()),
            identity_lock,
            ..self
        }
        .started())
    }

    /// BOOT-02: acquires the mode lock.
    ///
    /// # Errors
    ///
    /// Same failure modes as [`Self::acquire_identity`].
    pub fn acquire_mode(self, mode: &str) -> Result<Self, BootstrapError> {
        self.refuse_if_sealed()?;
        let mode_lock = self.mode_lock.clone().acquire(mode)?;
        Ok(Self {
            mode: Some(mode.to_string()),
            mode_lock,
            ..self
        }
        .started())
    }

    /// BOOT-03: acquires the lane lock.
    ///
    /// # Errors
    ///
    /// Same failure modes as [`Self::acquire_identity`].
    pub fn acquire_lane(self, lane: &str) -> Result<Self, BootstrapError> {
        self.refuse_if_sealed()?;
        let lane_lock = self.lane_lock.clone().acquire(lane)?;
        Ok(Self {
            lane: Some(lane.to_string()),
            lane_lock,
            ..self
        }
        .started())
    }

    /// BOOT-04: acquires the tool strip lock, recording the resolved sets.
    ///
    /// # Errors
    ///
    /// Same failure modes as [`Self::acquire_identity`].
    pub fn acquire_tools(
        self,
        permitted: BTreeSet<String>,
        stripped: BTreeSet<String>,
    ) -> Result<Self, BootstrapError> {
        self.refuse_if_sealed()?;
        let value = format!(
            "{} permitted, {} stripped",
            permitted.len(),
            stripped.len()
        );
        let tool_lock = self.tool_lock.clone().acquire(&value)?;
        Ok(Self {
            permitted_tools: permitted,
            stripped_tools: stripped,
            tool_lock,
            ..self
        }
        .started())
    }

    /// BOOT-05: completes the echo handshake.
    ///
    /// # Errors
    ///
    /// Same failure modes as [`Self::acquire_identity`].
    pub fn complete_handshake(self, echo: &str) -> Result<Self, BootstrapError> {
        self.refuse_if_sealed()?;
        let handshake_lock = self.handshake_lock.clone().acquire(echo)?;
        Ok(Self {
            echo_handshake: Some(echo.to_string()),
            handshake_lock,
            ..self
        }
        .started())
    }

    /// Seals the session, minting the one-time token.
    ///
    /// The token is `boot_{utc-timestamp}_{gid}_{random-hex}` — opaque to
    /// callers, unique per seal.
    ///
    /// # Errors
    ///
    /// - [`BootstrapError::RebootstrapForbidden`] if already sealed.
    /// - [`BootstrapError::Incomplete`] if any lock is missing.
    pub fn seal(self, config: &GateConfig) -> Result<Self, BootstrapError> {
        self.refuse_if_sealed()?;
        let missing = self.missing_locks();
        if !missing.is_empty() {
            return Err(BootstrapError::Incomplete { missing });
        }
        let now = Utc::now();
        let gid = self.gid.clone().unwrap_or_default();
        let token = format!(
            "boot_{}_{}_{}",
            now.format("%Y%m%d%H%M%S"),
            gid,
            config.random_suffix()
        );
        Ok(Self {
            status: BootstrapStatus::Sealed,
            bootstrap_token: Some(token),
            sealed_at: Some(now.to_rfc3339()),
            ..self
        })
    }

    /// Marks the session as failed, recording which locks failed.
    #[must_use]
    pub fn fail(self, reason: &str) -> Self {
        Self {
            status: BootstrapStatus::Failed,
            failure_reason: Some(reason.to_string()),
            ..self
        }
    }

    /// Terminates the session. The only exit from Sealed, taken when a
    /// re-bootstrap is blocked; non-retryable.
    #[must_use]
    pub fn terminate(self) -> Self {
        Self {
            status: BootstrapStatus::Terminated,
            terminated_at: Some(Utc::now().to_rfc3339()),
            ..self
        }
    }
}
