//! Immutable snapshot ingestion state.
//!
//! One [`SnapshotState`] models one ingestion attempt. Every transition
//! consumes the state and returns a new value; nothing is edited in place.
//! A locked snapshot admits no further ingestion steps — re-ingestion is
//! forbidden by construction.

use chrono::Utc;
use serde::{Deserialize, Serialize};

use super::error::SnapshotError;
use crate::config::GateConfig;
use crate::hash;

/// Timestamp format used inside generated identifiers.
const ID_TIMESTAMP_FORMAT: &str = "%Y%m%d%H%M%S";

// =============================================================================
// Step and Status Identifiers
// =============================================================================

/// The four ordered ingestion steps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SnapshotStep {
    /// SNAP-01 — snapshot metadata received.
    Received,
    /// SNAP-02 — archive hash verified against the declared value.
    HashVerified,
    /// SNAP-03 — file manifest validated.
    ManifestValidated,
    /// SNAP-04 — snapshot locked for the session.
    Locked,
}

impl SnapshotStep {
    /// All steps in canonical order.
    pub const ALL: [Self; 4] = [
        Self::Received,
        Self::HashVerified,
        Self::ManifestValidated,
        Self::Locked,
    ];

    /// Wire identifier, e.g. `"SNAP-01"`.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Received => "SNAP-01",
            Self::HashVerified => "SNAP-02",
            Self::ManifestValidated => "SNAP-03",
            Self::Locked => "SNAP-04",
        }
    }

    /// Human-readable step name.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Received => "Snapshot Received",
            Self::HashVerified => "Hash Verification",
            Self::ManifestValidated => "Manifest Validation",
            Self::Locked => "Snapshot Locked",
        }
    }
}

impl std::fmt::Display for SnapshotStep {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Ingestion status.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SnapshotStatus {
    /// No ingestion attempted yet.
    #[default]
    NotIngested,
    /// Metadata received, verification pending.
    Receiving,
    /// Hash verified, lock pending.
    Verifying,
    /// Terminal success: snapshot locked for the session.
    Locked,
    /// Terminal failure: hash drift detected.
    DriftDetected,
    /// Terminal failure: ingestion failed for another reason.
    Failed,
}

impl SnapshotStatus {
    /// Returns `true` for statuses that admit no further transitions.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Locked | Self::DriftDetected | Self::Failed)
    }
}

// =============================================================================
// Metadata and Lock
// =============================================================================

/// Metadata about one environment snapshot, captured at receipt and never
/// mutated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SnapshotMetadata {
    /// Generated identifier, `snap_{timestamp}_{hex}`.
    pub snapshot_id: String,
    /// Label of the environment the snapshot was taken from.
    pub source: String,
    /// Declared archive hash, `"{algorithm}:{hex}"`.
    pub archive_hash: String,
    /// Number of files in the snapshot.
    pub file_count: u64,
    /// Total size of the snapshot in bytes.
    pub total_size: u64,
    /// Declared manifest hash, if any.
    pub manifest_hash: Option<String>,
    /// Receipt timestamp, RFC 3339.
    pub created_at: String,
}

impl SnapshotMetadata {
    /// Creates metadata with a generated identifier and timestamp.
    #[must_use]
    pub fn new(
        config: &GateConfig,
        source: &str,
        archive_hash: &str,
        file_count: u64,
        total_size: u64,
        manifest_hash: Option<String>,
    ) -> Self {
        let now = Utc::now();
        let snapshot_id = format!(
            "snap_{}_{}",
            now.format(ID_TIMESTAMP_FORMAT),
            config.random_suffix()
        );
        Self {
            snapshot_id,
            source: source.to_string(),
            archive_hash: archive_hash.to_string(),
            file_count,
            total_size,
            manifest_hash,
            created_at: now.to_rfc3339(),
        }
    }

    /// Truncated archive hash for display.
    #[must_use]
    pub fn hash_prefix(&self) -> String {
        let mut cut = if self.archive_hash.starts_with("sha256:") {
            19
        } else {
            12
        };
        if self.archive_hash.len() <= cut {
            return self.archive_hash.clone();
        }
        // A relaxed config admits arbitrary declared hashes, so the cut
        // point may land inside a multibyte character.
        while !self.archive_hash.is_char_boundary(cut) {
            cut -= 1;
        }
        format!("{}...", &self.archive_hash[..cut])
    }
}

/// The lock binding produced when ingestion completes.
///
/// Binding the lock to a session token is a one-time operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SnapshotLock {
    /// The locked snapshot's metadata.
    pub metadata: SnapshotMetadata,
    /// Lock timestamp, RFC 3339.
    pub locked_at: String,
    /// Session token the lock is bound to, once a session seals.
    pub session_token: Option<String>,
}

impl SnapshotLock {
    fn new(metadata: SnapshotMetadata) -> Self {
        Self {
            metadata,
            locked_at: Utc::now().to_rfc3339(),
            session_token: None,
        }
    }

    /// Binds this lock to a session token.
    ///
    /// # Errors
    ///
    /// Returns [`SnapshotError::AlreadyBound`] if a token is already bound.
    pub fn bind_to_session(self, token: &str) -> Result<Self, SnapshotError> {
        if let Some(existing) = self.session_token {
            return Err(SnapshotError::AlreadyBound { existing });
        }
        Ok(Self {
            session_token: Some(token.to_string()),
            ..self
        })
    }
}

// =============================================================================
// Snapshot State
// =============================================================================

/// Immutable state of one snapshot ingestion attempt.
///
/// # State Machine
///
/// ```text
/// NotIngested --receive--> Receiving --verify_hash--> Verifying
///     Verifying --validate_manifest + lock_snapshot--> Locked   (terminal success)
///     Receiving --verify_hash (mismatch) via detect_drift--> DriftDetected (terminal failure)
///     any --fail--> Failed                                      (terminal failure)
/// ```
///
/// Invariant: [`SnapshotState::is_locked`] is `true` iff all four step
/// flags are set **and** a [`SnapshotLock`] is present **and** the status
/// is [`SnapshotStatus::Locked`]. Drift revokes the lock: a drifted state
/// keeps its lock record for audit but no longer counts as locked.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnapshotState {
    /// Metadata, present from SNAP-01 onward.
    pub metadata: Option<SnapshotMetadata>,

    /// SNAP-01 complete.
    pub received: bool,
    /// SNAP-02 complete.
    pub hash_verified: bool,
    /// SNAP-03 complete.
    pub manifest_validated: bool,
    /// SNAP-04 complete.
    pub locked: bool,

    /// Lock binding, present once locked.
    pub lock: Option<SnapshotLock>,

    /// Current status.
    pub status: SnapshotStatus,

    /// When ingestion started, RFC 3339.
    pub started_at: Option<String>,
    /// When ingestion completed, RFC 3339.
    pub completed_at: Option<String>,
    /// When ingestion failed, RFC 3339.
    pub failed_at: Option<String>,
    /// Failure description, if failed.
    pub failure_reason: Option<String>,

    /// Whether drift was detected.
    pub drift_detected: bool,
    /// Declared hash recorded at drift detection.
    pub expected_hash: Option<String>,
    /// Observed hash recorded at drift detection.
    pub actual_hash: Option<String>,
}

impl SnapshotState {
    /// Creates a fresh, not-ingested state.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// `true` iff all four steps completed, the lock is present, and the
    /// status is [`SnapshotStatus::Locked`].
    #[must_use]
    pub fn is_locked(&self) -> bool {
        self.received
            && self.hash_verified
            && self.manifest_validated
            && self.locked
            && self.lock.is_some()
            && self.status == SnapshotStatus::Locked
    }

    /// Alias for [`Self::is_locked`]; a snapshot is ingested when it is
    /// fully locked, never before.
    #[must_use]
    pub fn is_ingested(&self) -> bool {
        self.is_locked()
    }

    /// The generated snapshot id, once received.
    #[must_use]
    pub fn snapshot_id(&self) -> Option<&str> {
        self.metadata.as_ref().map(|m| m.snapshot_id.as_str())
    }

    /// The declared archive hash, once received.
    #[must_use]
    pub fn archive_hash(&self) -> Option<&str> {
        self.metadata.as_ref().map(|m| m.archive_hash.as_str())
    }

    /// Steps completed so far, in canonical order.
    #[must_use]
    pub fn completed_steps(&self) -> Vec<SnapshotStep> {
        SnapshotStep::ALL
            .into_iter()
            .filter(|step| self.step_done(*step))
            .collect()
    }

    /// Steps not yet completed, in canonical order.
    #[must_use]
    pub fn missing_steps(&self) -> Vec<SnapshotStep> {
        SnapshotStep::ALL
            .into_iter()
            .filter(|step| !self.step_done(*step))
            .collect()
    }

    fn step_done(&self, step: SnapshotStep) -> bool {
        match step {
            SnapshotStep::Received => self.received,
            SnapshotStep::HashVerified => self.hash_verified,
            SnapshotStep::ManifestValidated => self.manifest_validated,
            SnapshotStep::Locked => self.locked,
        }
    }

    // =========================================================================
    // Transitions — each consumes self and returns a new value
    // =========================================================================

    /// SNAP-01: records receipt of snapshot metadata.
    ///
    /// # Errors
    ///
    /// - [`SnapshotError::ReingestionForbidden`] if the snapshot is locked.
    /// - [`SnapshotError::MalformedHash`] if the declared hash fails the
    ///   shape check (when the config demands well-formed hashes).
    pub fn receive(
        self,
        config: &GateConfig,
        metadata: SnapshotMetadata,
    ) -> Result<Self, SnapshotError> {
        if self.locked {
            return Err(SnapshotError::ReingestionForbidden);
        }
        if config.require_well_formed_hashes && !hash::is_well_formed(&metadata.archive_hash) {
            return Err(SnapshotError::MalformedHash {
                hash: metadata.archive_hash,
            });
        }
        Ok(Self {
            metadata: Some(metadata),
            received: true,
            status: SnapshotStatus::Receiving,
            started_at: Some(Utc::now().to_rfc3339()),
            ..self
        })
    }

    /// SNAP-02: verifies the observed hash against the declared one.
    ///
    /// # Errors
    ///
    /// - [`SnapshotError::NotReceived`] if SNAP-01 has not completed.
    /// - [`SnapshotError::ReingestionForbidden`] if the snapshot is locked.
    /// - [`SnapshotError::Drift`] on mismatch. Drift is terminal for this
    ///   snapshot; callers that need the drifted state value use
    ///   [`Self::detect_drift`] to materialize it.
    pub fn verify_hash(self, actual_hash: &str) -> Result<Self, SnapshotError> {
        if self.locked {
            return Err(SnapshotError::ReingestionForbidden);
        }
        let Some(metadata) = self.metadata.as_ref() else {
            return Err(SnapshotError::NotReceived);
        };
        if !self.received {
            return Err(SnapshotError::NotReceived);
        }
        if !hash::hashes_match(&metadata.archive_hash, actual_hash) {
            return Err(SnapshotError::Drift {
                expected: metadata.archive_hash.clone(),
                actual: actual_hash.to_string(),
            });
        }
        Ok(Self {
            hash_verified: true,
            status: SnapshotStatus::Verifying,
            ..self
        })
    }

    /// SNAP-03: validates the file manifest.
    ///
    /// A declared manifest hash must be well-formed; beyond that the core
    /// confirms structural readiness only. A full manifest diff belongs to
    /// an external validator layered on top of this step.
    ///
    /// # Errors
    ///
    /// - [`SnapshotError::HashNotVerified`] if SNAP-02 has not completed.
    /// - [`SnapshotError::ReingestionForbidden`] if the snapshot is locked.
    /// - [`SnapshotError::MalformedHash`] for a malformed manifest hash.
    pub fn validate_manifest(self) -> Result<Self, SnapshotError> {
        if self.locked {
            return Err(SnapshotError::ReingestionForbidden);
        }
        if !self.hash_verified {
            return Err(SnapshotError::HashNotVerified);
        }
        if let Some(manifest_hash) = self.metadata.as_ref().and_then(|m| m.manifest_hash.as_ref())
        {
            if !hash::is_well_formed(manifest_hash) {
                return Err(SnapshotError::MalformedHash {
                    hash: manifest_hash.clone(),
                });
            }
        }
        Ok(Self {
            manifest_validated: true,
            ..self
        })
    }

    /// SNAP-04: locks the snapshot, producing the lock binding.
    ///
    /// # Errors
    ///
    /// - [`SnapshotError::ReingestionForbidden`] if already locked.
    /// - [`SnapshotError::ManifestNotValidated`] if SNAP-03 has not
    ///   completed.
    pub fn lock_snapshot(self) -> Result<Self, SnapshotError> {
        if self.locked {
            return Err(SnapshotError::ReingestionForbidden);
        }
        if !self.manifest_validated {
            return Err(SnapshotError::ManifestNotValidated);
        }
        let Some(metadata) = self.metadata.clone() else {
            return Err(SnapshotError::NotReceived);
        };
        Ok(Self {
            locked: true,
            lock: Some(SnapshotLock::new(metadata)),
            status: SnapshotStatus::Locked,
            completed_at: Some(Utc::now().to_rfc3339()),
            ..self
        })
    }

    /// Binds the locked snapshot to a session token (one-time).
    ///
    /// # Errors
    ///
    /// - [`SnapshotError::NotLocked`] if the snapshot is not locked.
    /// - [`SnapshotError::AlreadyBound`] if a token is already bound.
    pub fn bind_to_session(self, token: &str) -> Result<Self, SnapshotError> {
        if !self.is_locked() {
            return Err(SnapshotError::NotLocked);
        }
        let Some(lock) = self.lock else {
            return Err(SnapshotError::NotLocked);
        };
        let bound = lock.bind_to_session(token)?;
        Ok(Self {
            lock: Some(bound),
            ..self
        })
    }

    /// Records drift, producing the terminal drifted state.
    #[must_use]
    pub fn detect_drift(self, expected: &str, actual: &str) -> Self {
        Self {
            status: SnapshotStatus::DriftDetected,
            drift_detected: true,
            expected_hash: Some(expected.to_string()),
            actual_hash: Some(actual.to_string()),
            failed_at: Some(Utc::now().to_rfc3339()),
            failure_reason: Some(format!(
                "drift detected: expected {expected}, got {actual}"
            )),
            ..self
        }
    }

    /// Marks ingestion as failed for a non-drift reason.
    #[must_use]
    pub fn fail(self, reason: &str) -> Self {
        Self {
            status: SnapshotStatus::Failed,
            failed_at: Some(Utc::now().to_rfc3339()),
            failure_reason: Some(reason.to_string()),
            ..self
        }
    }
}
