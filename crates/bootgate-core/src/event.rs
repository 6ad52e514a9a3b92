//! Event sink for gate protocol observability.
//!
//! The enforcers emit one [`GateEvent`] per meaningful transition: every
//! step/lock attempt, its pass/fail outcome, and terminal summaries. The
//! sink is purely observational — it has no return value and must never
//! influence control flow. A slow or misbehaving sink must not block or
//! fail the protocol, so implementations are expected not to panic.
//!
//! [`GateEvent`] is structured; its `Display` impl renders the
//! human-readable line an operator-facing renderer would print.

use std::fmt;
use std::sync::Mutex;

use serde::{Deserialize, Serialize};

use crate::bootstrap::LockId;
use crate::snapshot::SnapshotStep;

/// Symbol rendered for a passed step or acquired lock.
pub const PASS_SYMBOL: &str = "✅";

/// Symbol rendered for a failed step or lock.
pub const FAIL_SYMBOL: &str = "❌";

/// One observable transition in the gate protocol.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
#[non_exhaustive]
pub enum GateEvent {
    /// Snapshot ingestion began for the named source.
    IngestStarted {
        /// Label of the environment being ingested.
        source: String,
    },
    /// An ingestion step completed.
    StepPassed {
        /// The step that passed.
        step: SnapshotStep,
        /// Step-specific detail (hash prefix, snapshot id, ...).
        detail: String,
    },
    /// An ingestion step failed; ingestion aborts here.
    StepFailed {
        /// The step that failed.
        step: SnapshotStep,
        /// Why it failed.
        reason: String,
    },
    /// The snapshot was locked (terminal success of stage one).
    SnapshotLocked {
        /// Generated snapshot identifier.
        snapshot_id: String,
        /// Truncated archive hash for display.
        hash_prefix: String,
    },
    /// Ingestion terminated without a lock.
    IngestFailed {
        /// The step at which ingestion stopped.
        failed_step: SnapshotStep,
        /// Why it failed.
        reason: String,
    },
    /// A declared hash disagreed with a freshly observed one.
    DriftDetected {
        /// The declared hash.
        expected: String,
        /// The observed hash.
        actual: String,
    },
    /// Ingestion was refused because a locked snapshot already exists.
    ReingestionBlocked,
    /// Bootstrap refused: no locked snapshot present.
    SnapshotMissing,
    /// The bootstrap lock sequence began.
    BootstrapStarted {
        /// Identity requesting the session.
        gid: String,
    },
    /// A bootstrap lock was acquired.
    LockAcquired {
        /// The lock.
        lock: LockId,
        /// The value bound into the lock.
        value: String,
    },
    /// A bootstrap lock failed (or was skipped by the cascade).
    LockFailed {
        /// The lock.
        lock: LockId,
        /// Why it failed.
        reason: String,
    },
    /// All five locks acquired and the session sealed.
    SessionSealed {
        /// The one-time session token.
        token: String,
        /// Identity bound into the session.
        gid: String,
        /// Execution mode.
        mode: String,
        /// Work lane.
        lane: String,
        /// Number of permitted tools.
        permitted: usize,
        /// Number of stripped tools.
        stripped: usize,
    },
    /// Bootstrap terminated without a seal.
    BootstrapFailed {
        /// Locks that failed, in canonical order.
        failed: Vec<LockId>,
        /// Locks that passed before the first failure.
        passed: usize,
    },
    /// Re-bootstrap of a sealed session was refused; the session is now
    /// terminated.
    RebootstrapBlocked,
    /// A protected action was denied pre-execution.
    ActionBlocked {
        /// Why the gate refused.
        reason: String,
    },
}

impl fmt::Display for GateEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::IngestStarted { source } => {
                write!(f, "SNAPSHOT INGESTION INITIATED  source={source}")
            }
            Self::StepPassed { step, detail } => {
                write!(f, "{}  {:<20} {PASS_SYMBOL} PASS  {detail}", step.as_str(), step.name())
            }
            Self::StepFailed { step, reason } => {
                write!(f, "{}  {:<20} {FAIL_SYMBOL} FAIL  {reason}", step.as_str(), step.name())
            }
            Self::SnapshotLocked {
                snapshot_id,
                hash_prefix,
            } => write!(
                f,
                "SNAPSHOT LOCKED  id={snapshot_id} hash={hash_prefix}"
            ),
            Self::IngestFailed {
                failed_step,
                reason,
            } => write!(
                f,
                "SNAPSHOT INGESTION FAILED  step={} reason={reason}",
                failed_step.as_str()
            ),
            Self::DriftDetected { expected, actual } => write!(
                f,
                "DRIFT DETECTED  expected={expected} actual={actual}"
            ),
            Self::ReingestionBlocked => {
                write!(f, "RE-INGESTION FORBIDDEN — SNAPSHOT ALREADY LOCKED")
            }
            Self::SnapshotMissing => {
                write!(f, "BOOTSTRAP BLOCKED — SNAPSHOT REQUIRED")
            }
            Self::BootstrapStarted { gid } => {
                write!(f, "BOOTSTRAP SEQUENCE INITIATED  gid={gid}")
            }
            Self::LockAcquired { lock, value } => {
                write!(f, "{}  {:<20} {PASS_SYMBOL} LOCKED  {value}", lock.as_str(), lock.name())
            }
            Self::LockFailed { lock, reason } => {
                write!(f, "{}  {:<20} {FAIL_SYMBOL} FAILED  {reason}", lock.as_str(), lock.name())
            }
            Self::SessionSealed {
                token,
                gid,
                mode,
                lane,
                permitted,
                stripped,
            } => write!(
                f,
                "BOOTSTRAP COMPLETE — SESSION SEALED  token={token} gid={gid} \
                 mode={mode} lane={lane} tools={permitted} permitted/{stripped} stripped"
            ),
            Self::BootstrapFailed { failed, passed } => {
                write!(f, "BOOTSTRAP FAILED — SESSION NOT SEALED  passed={passed} failed=")?;
                for (i, lock) in failed.iter().enumerate() {
                    if i > 0 {
                        f.write_str(",")?;
                    }
                    f.write_str(lock.as_str())?;
                }
                Ok(())
            }
            Self::RebootstrapBlocked => {
                write!(f, "RE-BOOTSTRAP FORBIDDEN — SESSION TERMINATED")
            }
            Self::ActionBlocked { reason } => {
                write!(f, "ACTION BLOCKED — {reason}")
            }
        }
    }
}

/// Receiver for the ordered, append-only event stream.
///
/// Implementations observe; they never gate. Returning is the only
/// contract — there is no error channel back into the protocol.
pub trait EventSink: Send + Sync {
    /// Records one event.
    fn emit(&self, event: &GateEvent);
}

/// Sink that discards everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullSink;

impl EventSink for NullSink {
    fn emit(&self, _event: &GateEvent) {}
}

/// Sink that buffers rendered lines in memory, for tests and inspection.
#[derive(Debug, Default)]
pub struct MemorySink {
    lines: Mutex<Vec<String>>,
}

impl MemorySink {
    /// Creates an empty sink.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a copy of all rendered lines in emission order.
    #[must_use]
    pub fn lines(&self) -> Vec<String> {
        match self.lines.lock() {
            Ok(lines) => lines.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    /// Returns `true` if any recorded line contains `needle`.
    #[must_use]
    pub fn contains(&self, needle: &str) -> bool {
        self.lines().iter().any(|l| l.contains(needle))
    }
}

impl EventSink for MemorySink {
    fn emit(&self, event: &GateEvent) {
        // A poisoned buffer must not take the protocol down with it.
        let mut lines = match self.lines.lock() {
            Ok(lines) => lines,
            Err(poisoned) => poisoned.into_inner(),
        };
        lines.push(event.to_string());
    }
}

/// Sink that forwards rendered lines to `tracing` at info level.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl EventSink for TracingSink {
    fn emit(&self, event: &GateEvent) {
        tracing::info!(target: "bootgate", "{event}");
    }
}
