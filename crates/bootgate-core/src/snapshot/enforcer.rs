//! Snapshot ingestion orchestration.
//!
//! [`SnapshotEnforcer::ingest`] drives all four ingestion steps fail-fast
//! and aggregates the outcome into an [`IngestReport`]. Expected validation
//! failures (drift, malformed hashes) come back as `Ok(report)` with
//! `success == false` so callers can branch without error-driven control
//! flow; re-entry violations propagate as errors. Every step attempt and
//! terminal outcome is emitted to the event sink before the function
//! returns — nothing fails silently.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use super::error::SnapshotError;
use super::state::{SnapshotMetadata, SnapshotState, SnapshotStep};
use crate::config::GateConfig;
use crate::context::SessionContext;
use crate::event::{EventSink, GateEvent};

// =============================================================================
// Ingest Request and Report
// =============================================================================

/// One ingestion request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct IngestRequest {
    /// Label of the environment being ingested.
    pub source: String,
    /// Declared archive hash.
    pub archive_hash: String,
    /// Freshly observed hash. When absent the declared hash is used
    /// (self-attested ingest).
    pub actual_hash: Option<String>,
    /// Number of files in the snapshot.
    pub file_count: u64,
    /// Total snapshot size in bytes.
    pub total_size: u64,
    /// Declared manifest hash, if any.
    pub manifest_hash: Option<String>,
}

impl IngestRequest {
    /// Creates a minimal request for a self-attested ingest.
    #[must_use]
    pub fn new(source: &str, archive_hash: &str) -> Self {
        Self {
            source: source.to_string(),
            archive_hash: archive_hash.to_string(),
            actual_hash: None,
            file_count: 0,
            total_size: 0,
            manifest_hash: None,
        }
    }

    /// Sets the freshly observed hash to verify against the declared one.
    #[must_use]
    pub fn with_actual_hash(mut self, actual_hash: &str) -> Self {
        self.actual_hash = Some(actual_hash.to_string());
        self
    }

    /// Sets file count and total size.
    #[must_use]
    pub fn with_stats(mut self, file_count: u64, total_size: u64) -> Self {
        self.file_count = file_count;
        self.total_size = total_size;
        self
    }

    /// Sets the declared manifest hash.
    #[must_use]
    pub fn with_manifest_hash(mut self, manifest_hash: &str) -> Self {
        self.manifest_hash = Some(manifest_hash.to_string());
        self
    }
}

/// Aggregate outcome of one ingestion attempt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IngestReport {
    /// Whether the snapshot ended locked.
    pub success: bool,
    /// The final state of the attempt.
    pub state: SnapshotState,
    /// Steps attempted, in order; ingestion is fail-fast so the last entry
    /// is the failed step when `success` is false.
    pub steps_attempted: Vec<SnapshotStep>,
    /// Steps that failed (at most one — ingestion aborts at the first).
    pub failed_steps: Vec<SnapshotStep>,
    /// Human-readable summary.
    pub message: String,
}

// =============================================================================
// Snapshot Enforcer
// =============================================================================

/// Orchestrates snapshot ingestion and guards the "current snapshot" slot.
///
/// The enforcer owns no state itself; the slot lives in the caller's
/// [`SessionContext`], one per logical session.
pub struct SnapshotEnforcer {
    config: GateConfig,
    sink: Arc<dyn EventSink>,
}

impl SnapshotEnforcer {
    /// Creates an enforcer with the given configuration and event sink.
    #[must_use]
    pub fn new(config: GateConfig, sink: Arc<dyn EventSink>) -> Self {
        Self { config, sink }
    }

    /// Ingests a snapshot: SNAP-01 through SNAP-04, fail-fast.
    ///
    /// On success the locked state is stored in the context slot. A failed
    /// attempt also stores its terminal state so the failure is
    /// inspectable, but a failed slot never satisfies
    /// [`Self::require_locked_snapshot`].
    ///
    /// # Errors
    ///
    /// Returns [`SnapshotError::ReingestionForbidden`] if the context
    /// already holds a *locked* snapshot. Expected validation failures are
    /// reported, not raised.
    pub fn ingest(
        &self,
        ctx: &mut SessionContext,
        request: IngestRequest,
    ) -> Result<IngestReport, SnapshotError> {
        if ctx.snapshot().is_some_and(SnapshotState::is_locked) {
            self.sink.emit(&GateEvent::ReingestionBlocked);
            tracing::warn!(source = %request.source, "ingest refused: snapshot already locked");
            return Err(SnapshotError::ReingestionForbidden);
        }

        self.sink.emit(&GateEvent::IngestStarted {
            source: request.source.clone(),
        });
        tracing::debug!(source = %request.source, "snapshot ingestion started");

        let actual_hash = request
            .actual_hash
            .clone()
            .unwrap_or_else(|| request.archive_hash.clone());

        let mut attempted = Vec::new();

        // The builder is sugar over the same pipeline; the enforcer walks
        // the transitions itself so a failing step keeps the state it
        // failed in.
        let metadata = SnapshotMetadata::new(
            &self.config,
            &request.source,
            &request.archive_hash,
            request.file_count,
            request.total_size,
            request.manifest_hash.clone(),
        );

        // SNAP-01: receive
        attempted.push(SnapshotStep::Received);
        let state = match SnapshotState::new().receive(&self.config, metadata) {
            Ok(state) => state,
            Err(err) => {
                return Ok(self.abort(
                    ctx,
                    SnapshotState::new(),
                    SnapshotStep::Received,
                    attempted,
                    &err,
                ));
            }
        };
        self.step_passed(
            SnapshotStep::Received,
            state.snapshot_id().unwrap_or_default().to_string(),
        );

        // SNAP-02: verify hash
        attempted.push(SnapshotStep::HashVerified);
        let state = match state.clone().verify_hash(&actual_hash) {
            Ok(next) => next,
            Err(err) => {
                let state = if let SnapshotError::Drift { expected, actual } = &err {
                    self.sink.emit(&GateEvent::DriftDetected {
                        expected: expected.clone(),
                        actual: actual.clone(),
                    });
                    state.detect_drift(expected, actual)
                } else {
                    state
                };
                return Ok(self.abort(ctx, state, SnapshotStep::HashVerified, attempted, &err));
            }
        };
        self.step_passed(
            SnapshotStep::HashVerified,
            state
                .metadata
                .as_ref()
                .map(SnapshotMetadata::hash_prefix)
                .unwrap_or_default(),
        );

        // SNAP-03: validate manifest
        attempted.push(SnapshotStep::ManifestValidated);
        let state = match state.clone().validate_manifest() {
            Ok(next) => next,
            Err(err) => {
                return Ok(self.abort(
                    ctx,
                    state,
                    SnapshotStep::ManifestValidated,
                    attempted,
                    &err,
                ));
            }
        };
        let manifest_detail = if request.manifest_hash.is_some() {
            "manifest declared and well-formed"
        } else {
            "no manifest declared"
        };
        self.step_passed(SnapshotStep::ManifestValidated, manifest_detail.to_string());

        // SNAP-04: lock
        attempted.push(SnapshotStep::Locked);
        let state = match state.clone().lock_snapshot() {
            Ok(next) => next,
            Err(err) => {
                return Ok(self.abort(ctx, state, SnapshotStep::Locked, attempted, &err));
            }
        };
        let snapshot_id = state.snapshot_id().unwrap_or_default().to_string();
        let hash_prefix = state
            .metadata
            .as_ref()
            .map(SnapshotMetadata::hash_prefix)
            .unwrap_or_default();
        self.step_passed(SnapshotStep::Locked, snapshot_id.clone());
        self.sink.emit(&GateEvent::SnapshotLocked {
            snapshot_id: snapshot_id.clone(),
            hash_prefix,
        });
        tracing::debug!(snapshot_id = %snapshot_id, "snapshot locked");

        ctx.set_snapshot(state.clone());
        Ok(IngestReport {
            success: true,
            state,
            steps_attempted: attempted,
            failed_steps: Vec::new(),
            message: format!("snapshot {snapshot_id} locked"),
        })
    }

    /// Requires that a snapshot exists in the context, locked or not.
    ///
    /// # Errors
    ///
    /// Returns [`SnapshotError::Required`] if the slot is empty.
    pub fn require_snapshot<'c>(
        &self,
        ctx: &'c SessionContext,
    ) -> Result<&'c SnapshotState, SnapshotError> {
        ctx.require_snapshot()
    }

    /// Requires a locked snapshot. The only sanctioned way other
    /// components depend on snapshot state.
    ///
    /// # Errors
    ///
    /// Returns [`SnapshotError::Required`] if the slot is empty, or
    /// [`SnapshotError::NotLocked`] if present but unlocked.
    pub fn require_locked_snapshot<'c>(
        &self,
        ctx: &'c SessionContext,
    ) -> Result<&'c SnapshotState, SnapshotError> {
        ctx.require_locked_snapshot()
    }

    /// Re-checks a locked snapshot's hash against a freshly observed value.
    ///
    /// The one place post-lock re-verification is allowed: it detects
    /// drift, it does not re-ingest. On mismatch the stored state is
    /// replaced by its drifted variant and the check fails.
    ///
    /// # Errors
    ///
    /// - [`SnapshotError::Required`] / [`SnapshotError::NotLocked`] if no
    ///   locked snapshot is present.
    /// - [`SnapshotError::Drift`] on mismatch (terminal).
    pub fn verify_no_drift(
        &self,
        ctx: &mut SessionContext,
        actual_hash: &str,
    ) -> Result<(), SnapshotError> {
        let state = ctx.require_locked_snapshot()?;
        let expected = state
            .archive_hash()
            .ok_or(SnapshotError::NotLocked)?
            .to_string();

        if crate::hash::hashes_match(&expected, actual_hash) {
            return Ok(());
        }

        self.sink.emit(&GateEvent::DriftDetected {
            expected: expected.clone(),
            actual: actual_hash.to_string(),
        });
        tracing::warn!(expected = %expected, actual = %actual_hash, "post-lock drift detected");

        if let Some(state) = ctx.take_snapshot() {
            ctx.set_snapshot(state.detect_drift(&expected, actual_hash));
        }
        Err(SnapshotError::Drift {
            expected,
            actual: actual_hash.to_string(),
        })
    }

    fn step_passed(&self, step: SnapshotStep, detail: String) {
        tracing::debug!(step = %step, %detail, "ingestion step passed");
        self.sink.emit(&GateEvent::StepPassed { step, detail });
    }

    /// Records a failed step, stores the terminal state, and builds the
    /// failure report.
    fn abort(
        &self,
        ctx: &mut SessionContext,
        state: SnapshotState,
        failed_step: SnapshotStep,
        attempted: Vec<SnapshotStep>,
        err: &SnapshotError,
    ) -> IngestReport {
        let reason = err.to_string();
        tracing::warn!(step = %failed_step, %reason, "ingestion step failed");
        self.sink.emit(&GateEvent::StepFailed {
            step: failed_step,
            reason: reason.clone(),
        });
        self.sink.emit(&GateEvent::IngestFailed {
            failed_step,
            reason: reason.clone(),
        });

        let state = if state.drift_detected {
            state
        } else {
            state.fail(&reason)
        };
        ctx.set_snapshot(state.clone());
        IngestReport {
            success: false,
            state,
            steps_attempted: attempted,
            failed_steps: vec![failed_step],
            message: format!("ingestion failed at {failed_step}: {reason}"),
        }
    }
}
