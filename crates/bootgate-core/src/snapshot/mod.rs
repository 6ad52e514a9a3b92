//! Snapshot ingestion stage (SNAP-01..SNAP-04).
//!
//! Stage one of the gate protocol: ingest and cryptographically lock a
//! one-time snapshot of the calling environment. The contract, in strict
//! order:
//!
//! 1. **SNAP-01 receive** — capture [`SnapshotMetadata`] (source, declared
//!    archive hash, file stats).
//! 2. **SNAP-02 verify hash** — compare a freshly observed hash against
//!    the declared one; any mismatch is drift and terminal.
//! 3. **SNAP-03 validate manifest** — confirm structural readiness.
//! 4. **SNAP-04 lock** — produce the [`SnapshotLock`]; the snapshot is now
//!    immutable for the session and re-ingestion is forbidden.
//!
//! [`SnapshotState`] is the immutable value driven through those steps,
//! [`SnapshotBuilder`] the fluent sequencer, and [`SnapshotEnforcer`] the
//! orchestrator that aggregates outcomes and guards the context slot.

pub mod builder;
pub mod enforcer;
pub mod error;
pub mod state;

#[cfg(test)]
mod tests;

pub use builder::SnapshotBuilder;
pub use enforcer::{IngestReport, IngestRequest, SnapshotEnforcer};
pub use error::SnapshotError;
pub use state::{SnapshotLock, SnapshotMetadata, SnapshotState, SnapshotStatus, SnapshotStep};
