use std::sync::Arc;

use proptest::prelude::*;

use super::*;
use crate::config::GateConfig;
use crate::context::SessionContext;
use crate::event::{MemorySink, NullSink};
use crate::hash;

fn locked_state(config: &GateConfig, archive_hash: &str) -> SnapshotState {
    SnapshotBuilder::new(config)
        .receive("ci", archive_hash, 10, 4096)
        .and_then(|b| b.verify_hash(archive_hash))
        .and_then(SnapshotBuilder::validate_manifest)
        .and_then(SnapshotBuilder::lock)
        .unwrap()
}

// =============================================================================
// State machine
// =============================================================================

#[test]
fn test_full_pipeline_locks_snapshot() {
    let config = GateConfig::default();
    let archive_hash = hash::hash_bytes(b"archive contents");
    let state = locked_state(&config, &archive_hash);

    assert!(state.is_locked());
    assert!(state.is_ingested());
    assert_eq!(state.status, SnapshotStatus::Locked);
    assert!(state.status.is_terminal());
    assert_eq!(state.completed_steps(), SnapshotStep::ALL.to_vec());
    assert!(state.missing_steps().is_empty());
    assert!(state.snapshot_id().unwrap().starts_with("snap_"));
    assert_eq!(state.archive_hash(), Some(archive_hash.as_str()));

    let lock = state.lock.as_ref().unwrap();
    assert_eq!(lock.metadata.archive_hash, archive_hash);
    assert_eq!(lock.session_token, None);
}

#[test]
fn test_verify_before_receive_refused() {
    let err = SnapshotState::new()
        .verify_hash(&hash::hash_bytes(b"x"))
        .unwrap_err();
    assert_eq!(err, SnapshotError::NotReceived);
}

#[test]
fn test_validate_before_verify_refused() {
    let config = GateConfig::default();
    let archive_hash = hash::hash_bytes(b"x");
    let state = SnapshotBuilder::new(&config)
        .receive("ci", &archive_hash, 1, 1)
        .unwrap()
        .into_state();
    assert_eq!(
        state.validate_manifest().unwrap_err(),
        SnapshotError::HashNotVerified
    );
}

#[test]
fn test_lock_before_validate_refused() {
    let config = GateConfig::default();
    let archive_hash = hash::hash_bytes(b"x");
    let state = SnapshotBuilder::new(&config)
        .receive("ci", &archive_hash, 1, 1)
        .and_then(|b| b.verify_hash(&archive_hash))
        .unwrap()
        .into_state();
    assert_eq!(
        state.lock_snapshot().unwrap_err(),
        SnapshotError::ManifestNotValidated
    );
}

#[test]
fn test_hash_mismatch_is_drift() {
    let config = GateConfig::default();
    let declared = hash::hash_bytes(b"declared");
    let observed = hash::hash_bytes(b"tampered");
    let state = SnapshotBuilder::new(&config)
        .receive("ci", &declared, 1, 1)
        .unwrap()
        .into_state();

    let err = state.clone().verify_hash(&observed).unwrap_err();
    assert_eq!(
        err,
        SnapshotError::Drift {
            expected: declared.clone(),
            actual: observed.clone(),
        }
    );

    let drifted = state.detect_drift(&declared, &observed);
    assert_eq!(drifted.status, SnapshotStatus::DriftDetected);
    assert!(drifted.status.is_terminal());
    assert!(drifted.drift_detected);
    assert_eq!(drifted.expected_hash.as_deref(), Some(declared.as_str()));
    assert_eq!(drifted.actual_hash.as_deref(), Some(observed.as_str()));
    assert!(!drifted.is_locked());
    // Metadata from receipt survives into the drifted state.
    assert!(drifted.metadata.is_some());
}

#[test]
fn test_malformed_declared_hash_refused() {
    let config = GateConfig::default();
    let err = SnapshotBuilder::new(&config)
        .receive("ci", "not a hash", 1, 1)
        .unwrap_err();
    assert!(matches!(err, SnapshotError::MalformedHash { .. }));
}

#[test]
fn test_malformed_hash_accepted_when_relaxed() {
    let config = GateConfig {
        require_well_formed_hashes: false,
        ..GateConfig::default()
    };
    let state = SnapshotBuilder::new(&config)
        .receive("ci", "opaque-upstream-digest", 1, 1)
        .unwrap()
        .into_state();
    assert!(state.received);
}

#[test]
fn test_malformed_manifest_hash_fails_validation() {
    let config = GateConfig::default();
    let archive_hash = hash::hash_bytes(b"x");
    let err = SnapshotBuilder::new(&config)
        .receive_with_manifest("ci", &archive_hash, 1, 1, "BAD MANIFEST")
        .and_then(|b| b.verify_hash(&archive_hash))
        .and_then(SnapshotBuilder::validate_manifest)
        .unwrap_err();
    assert!(matches!(err, SnapshotError::MalformedHash { .. }));
}

#[test]
fn test_locked_snapshot_refuses_every_step() {
    let config = GateConfig::default();
    let archive_hash = hash::hash_bytes(b"sealed");
    let state = locked_state(&config, &archive_hash);

    let metadata = SnapshotMetadata::new(&config, "ci", &archive_hash, 1, 1, None);
    assert_eq!(
        state.clone().receive(&config, metadata).unwrap_err(),
        SnapshotError::ReingestionForbidden
    );
    assert_eq!(
        state.clone().verify_hash(&archive_hash).unwrap_err(),
        SnapshotError::ReingestionForbidden
    );
    assert_eq!(
        state.clone().validate_manifest().unwrap_err(),
        SnapshotError::ReingestionForbidden
    );
    assert_eq!(
        state.lock_snapshot().unwrap_err(),
        SnapshotError::ReingestionForbidden
    );
}

#[test]
fn test_session_binding_is_one_time() {
    let config = GateConfig::default();
    let archive_hash = hash::hash_bytes(b"bind");
    let state = locked_state(&config, &archive_hash);

    let bound = state.bind_to_session("boot_1").unwrap();
    assert_eq!(
        bound.lock.as_ref().unwrap().session_token.as_deref(),
        Some("boot_1")
    );

    let err = bound.bind_to_session("boot_2").unwrap_err();
    assert_eq!(
        err,
        SnapshotError::AlreadyBound {
            existing: "boot_1".to_string(),
        }
    );
}

#[test]
fn test_drift_after_lock_revokes_the_lock() {
    let config = GateConfig::default();
    let declared = hash::hash_bytes(b"at lock time");
    let observed = hash::hash_bytes(b"after tampering");
    let state = locked_state(&config, &declared);
    assert!(state.is_locked());

    let drifted = state.detect_drift(&declared, &observed);
    assert_eq!(drifted.status, SnapshotStatus::DriftDetected);
    assert!(!drifted.is_locked());
    // The lock record survives for audit, but it no longer binds.
    assert!(drifted.lock.is_some());
    assert_eq!(
        drifted.bind_to_session("boot_1").unwrap_err(),
        SnapshotError::NotLocked
    );
}

#[test]
fn test_binding_requires_lock() {
    let err = SnapshotState::new().bind_to_session("boot_1").unwrap_err();
    assert_eq!(err, SnapshotError::NotLocked);
}

#[test]
fn test_metadata_ids_are_unique() {
    let config = GateConfig::default();
    let archive_hash = hash::hash_bytes(b"id");
    let a = SnapshotMetadata::new(&config, "ci", &archive_hash, 1, 1, None);
    let b = SnapshotMetadata::new(&config, "ci", &archive_hash, 1, 1, None);
    assert_ne!(a.snapshot_id, b.snapshot_id);
}

#[test]
fn test_hash_prefix_truncates_for_display() {
    let config = GateConfig::default();
    let archive_hash = hash::hash_bytes(b"prefix");
    let metadata = SnapshotMetadata::new(&config, "ci", &archive_hash, 1, 1, None);
    let prefix = metadata.hash_prefix();
    assert!(prefix.ends_with("..."));
    assert!(archive_hash.starts_with(prefix.trim_end_matches("...")));
}

#[test]
fn test_hash_prefix_respects_multibyte_hashes() {
    let config = GateConfig {
        require_well_formed_hashes: false,
        ..GateConfig::default()
    };
    // 20 bytes; the display cut point lands inside a character.
    let archive_hash = format!("sha256:a{}", "\u{3b1}".repeat(6));
    let metadata = SnapshotMetadata::new(&config, "ci", &archive_hash, 1, 1, None);
    let prefix = metadata.hash_prefix();
    assert!(archive_hash.starts_with(prefix.trim_end_matches("...")));

    // The full ingest path renders the prefix into events.
    let enforcer = SnapshotEnforcer::new(config, Arc::new(NullSink));
    let mut ctx = SessionContext::new();
    let report = enforcer
        .ingest(&mut ctx, IngestRequest::new("ci", &archive_hash))
        .unwrap();
    assert!(report.success);
}

// =============================================================================
// Enforcer
// =============================================================================

fn enforcer() -> (SnapshotEnforcer, Arc<MemorySink>) {
    let sink = Arc::new(MemorySink::new());
    (
        SnapshotEnforcer::new(GateConfig::default(), sink.clone()),
        sink,
    )
}

#[test]
fn test_ingest_success_stores_locked_snapshot() {
    let (enforcer, sink) = enforcer();
    let mut ctx = SessionContext::new();
    let archive_hash = hash::hash_bytes(b"env");

    let report = enforcer
        .ingest(
            &mut ctx,
            IngestRequest::new("ci", &archive_hash).with_stats(42, 1 << 20),
        )
        .unwrap();

    assert!(report.success);
    assert_eq!(report.steps_attempted, SnapshotStep::ALL.to_vec());
    assert!(report.failed_steps.is_empty());
    assert!(enforcer.require_locked_snapshot(&ctx).is_ok());

    // Canonical event order, initiation through lock.
    let lines = sink.lines();
    assert!(lines[0].contains("SNAPSHOT INGESTION INITIATED"));
    assert!(lines[1].contains("SNAP-01"));
    assert!(lines[2].contains("SNAP-02"));
    assert!(lines[3].contains("SNAP-03"));
    assert!(lines[4].contains("SNAP-04"));
    assert!(lines[5].contains("SNAPSHOT LOCKED"));
    assert_eq!(lines.len(), 6);
}

#[test]
fn test_ingest_drift_reports_failure_and_stores_drifted_state() {
    let (enforcer, sink) = enforcer();
    let mut ctx = SessionContext::new();
    let declared = hash::hash_bytes(b"declared");
    let observed = hash::hash_bytes(b"observed");

    let report = enforcer
        .ingest(
            &mut ctx,
            IngestRequest::new("ci", &declared).with_actual_hash(&observed),
        )
        .unwrap();

    assert!(!report.success);
    assert_eq!(report.failed_steps, vec![SnapshotStep::HashVerified]);
    assert_eq!(report.state.status, SnapshotStatus::DriftDetected);

    // Failure is inspectable but never satisfies the lock guard.
    assert!(ctx.snapshot().is_some());
    assert!(enforcer.require_locked_snapshot(&ctx).is_err());

    assert!(sink.contains("DRIFT DETECTED"));
    assert!(sink.contains("SNAPSHOT INGESTION FAILED"));
}

#[test]
fn test_reingestion_over_locked_snapshot_refused() {
    let (enforcer, sink) = enforcer();
    let mut ctx = SessionContext::new();
    let archive_hash = hash::hash_bytes(b"first");

    enforcer
        .ingest(&mut ctx, IngestRequest::new("ci", &archive_hash))
        .unwrap();
    let original_id = ctx.snapshot().unwrap().snapshot_id().unwrap().to_string();

    let second = hash::hash_bytes(b"second");
    let err = enforcer
        .ingest(&mut ctx, IngestRequest::new("ci", &second))
        .unwrap_err();
    assert_eq!(err, SnapshotError::ReingestionForbidden);
    assert!(sink.contains("RE-INGESTION FORBIDDEN"));

    // The locked snapshot is untouched.
    assert_eq!(ctx.snapshot().unwrap().snapshot_id(), Some(&*original_id));
}

#[test]
fn test_failed_slot_is_retryable() {
    let (enforcer, _sink) = enforcer();
    let mut ctx = SessionContext::new();

    let report = enforcer
        .ingest(&mut ctx, IngestRequest::new("ci", "malformed"))
        .unwrap();
    assert!(!report.success);
    assert_eq!(report.failed_steps, vec![SnapshotStep::Received]);
    assert_eq!(ctx.snapshot().unwrap().status, SnapshotStatus::Failed);

    // A failed slot does not block a fresh attempt.
    let archive_hash = hash::hash_bytes(b"retry");
    let report = enforcer
        .ingest(&mut ctx, IngestRequest::new("ci", &archive_hash))
        .unwrap();
    assert!(report.success);
    assert!(enforcer.require_locked_snapshot(&ctx).is_ok());
}

#[test]
fn test_verify_no_drift_round_trip() {
    let (enforcer, sink) = enforcer();
    let mut ctx = SessionContext::new();
    let archive_hash = hash::hash_bytes(b"stable");

    enforcer
        .ingest(&mut ctx, IngestRequest::new("ci", &archive_hash))
        .unwrap();
    assert!(enforcer.verify_no_drift(&mut ctx, &archive_hash).is_ok());

    let tampered = hash::hash_bytes(b"tampered");
    let err = enforcer.verify_no_drift(&mut ctx, &tampered).unwrap_err();
    assert!(matches!(err, SnapshotError::Drift { .. }));
    assert!(sink.contains("DRIFT DETECTED"));

    // The drifted state replaces the locked one; the gate is now closed.
    assert_eq!(
        ctx.snapshot().unwrap().status,
        SnapshotStatus::DriftDetected
    );
    assert!(enforcer.require_locked_snapshot(&ctx).is_err());
}

// =============================================================================
// Properties
// =============================================================================

proptest! {
    #[test]
    fn prop_any_content_ingests_when_hashes_agree(content in proptest::collection::vec(any::<u8>(), 0..512)) {
        let config = GateConfig::default();
        let archive_hash = hash::hash_bytes(&content);
        let state = locked_state(&config, &archive_hash);
        prop_assert!(state.is_locked());
        prop_assert_eq!(state.archive_hash(), Some(archive_hash.as_str()));
    }

    #[test]
    fn prop_distinct_content_always_drifts(a in proptest::collection::vec(any::<u8>(), 0..256),
                                           b in proptest::collection::vec(any::<u8>(), 0..256)) {
        prop_assume!(a != b);
        let config = GateConfig::default();
        let declared = hash::hash_bytes(&a);
        let observed = hash::hash_bytes(&b);
        let result = SnapshotBuilder::new(&config)
            .receive("ci", &declared, 1, 1)
            .and_then(|builder| builder.verify_hash(&observed));
        let drifted = matches!(result, Err(SnapshotError::Drift { .. }));
        prop_assert!(drifted);
    }

    #[test]
    fn prop_lock_flag_never_set_without_lock_binding(received in any::<bool>(),
                                                     hash_verified in any::<bool>(),
                                                     manifest_validated in any::<bool>()) {
        // is_locked is a biconditional over the step flags and the binding;
        // partial flag combinations never count as locked.
        let state = SnapshotState {
            received,
            hash_verified,
            manifest_validated,
            ..SnapshotState::new()
        };
        prop_assert!(!state.is_locked());
    }
}
