//! Two-stage gate protocol for protected actions.
//!
//! Before any protected action may run, two stages must pass in strict
//! order:
//!
//! 1. **Snapshot ingestion** — ingest and cryptographically lock a one-time
//!    snapshot of the calling environment (steps SNAP-01..SNAP-04).
//! 2. **Bootstrap** — acquire five ordered identity/authorization locks
//!    (BOOT-01..BOOT-05) and seal a session token.
//!
//! Both stages are append-only, immutable state machines: every transition
//! returns a *new* state value, and any attempt to re-enter a completed
//! stage fails closed and terminates the session rather than silently
//! continuing.
//!
//! # Control Flow
//!
//! ```text
//! caller ──► SnapshotEnforcer::ingest ──► locked SnapshotState
//!                                              │
//!                                              ▼
//!          BootstrapEnforcer::bootstrap ──► sealed BootstrapState (token)
//!                                              │
//!                                              ▼
//!          with_sealed_session(ctx, action) ──► protected action runs
//! ```
//!
//! # Security Model
//!
//! The protocol is **default-deny, fail-closed**:
//!
//! - A missing or unlocked snapshot blocks bootstrap before any lock logic
//!   runs.
//! - Partial completion counts as failure — a session with four of five
//!   locks is not a session.
//! - A sealed session cannot be refreshed in place; re-bootstrap terminates
//!   the existing session and is refused.
//! - Hash drift (a declared hash disagreeing with a freshly observed one)
//!   is tamper evidence and is terminal for the snapshot.
//!
//! # Example
//!
//! ```rust
//! use std::sync::Arc;
//!
//! use bootgate_core::bootstrap::BootstrapEnforcer;
//! use bootgate_core::event::NullSink;
//! use bootgate_core::guard::with_sealed_session;
//! use bootgate_core::hash;
//! use bootgate_core::policy::{StaticDirectory, StaticToolMatrix, ToolGrant};
//! use bootgate_core::snapshot::{IngestRequest, SnapshotEnforcer};
//! use bootgate_core::{GateConfig, SessionContext};
//!
//! let config = GateConfig::default();
//! let sink = Arc::new(NullSink);
//! let directory = Arc::new(
//!     StaticDirectory::new().register("GID-01", "Cody", ["EXECUTION"], ["GOVERNANCE"]),
//! );
//! let matrix = Arc::new(StaticToolMatrix::new().grant(
//!     "EXECUTION",
//!     "GOVERNANCE",
//!     ToolGrant::permit(["read_file"]),
//! ));
//!
//! let snapshots = SnapshotEnforcer::new(config.clone(), sink.clone());
//! let bootstraps = BootstrapEnforcer::new(config, directory, matrix, sink);
//!
//! let mut ctx = SessionContext::new();
//! let archive_hash = hash::hash_bytes(b"archive contents");
//! let report = snapshots
//!     .ingest(&mut ctx, IngestRequest::new("ci", &archive_hash))
//!     .unwrap();
//! assert!(report.success);
//!
//! let report = bootstraps
//!     .bootstrap(&mut ctx, "GID-01", "EXECUTION", "GOVERNANCE")
//!     .unwrap();
//! assert!(report.success);
//!
//! let out = with_sealed_session(&ctx, |session| session.gid().unwrap().to_string()).unwrap();
//! assert_eq!(out, "GID-01");
//! ```

pub mod bootstrap;
pub mod config;
pub mod context;
pub mod event;
pub mod guard;
pub mod hash;
pub mod policy;
pub mod snapshot;

pub use config::GateConfig;
pub use context::SessionContext;
