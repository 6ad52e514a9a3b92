//! Fluent sequencer for the four ingestion steps.
//!
//! The builder is sugar over the pure transition pipeline on
//! [`SnapshotState`]: each call replaces the owned state with the next
//! value, so a full ingestion reads as a single `?`-chain.
//!
//! ```rust
//! use bootgate_core::GateConfig;
//! use bootgate_core::hash;
//! use bootgate_core::snapshot::SnapshotBuilder;
//!
//! let config = GateConfig::default();
//! let archive_hash = hash::hash_bytes(b"archive");
//! let state = SnapshotBuilder::new(&config)
//!     .receive("ci", &archive_hash, 10, 1024)
//!     .and_then(|b| b.verify_hash(&archive_hash))
//!     .and_then(SnapshotBuilder::validate_manifest)
//!     .and_then(SnapshotBuilder::lock)
//!     .unwrap();
//! assert!(state.is_locked());
//! ```

use super::error::SnapshotError;
use super::state::{SnapshotMetadata, SnapshotState};
use crate::config::GateConfig;

/// Drives a [`SnapshotState`] through SNAP-01..SNAP-04.
#[derive(Debug, Clone)]
pub struct SnapshotBuilder<'a> {
    config: &'a GateConfig,
    state: SnapshotState,
}

impl<'a> SnapshotBuilder<'a> {
    /// Starts a fresh ingestion attempt.
    #[must_use]
    pub fn new(config: &'a GateConfig) -> Self {
        Self {
            config,
            state: SnapshotState::new(),
        }
    }

    /// Resumes from an existing state value.
    #[must_use]
    pub fn from_state(config: &'a GateConfig, state: SnapshotState) -> Self {
        Self { config, state }
    }

    /// Current state.
    #[must_use]
    pub fn state(&self) -> &SnapshotState {
        &self.state
    }

    /// Consumes the builder, yielding the state as-is.
    #[must_use]
    pub fn into_state(self) -> SnapshotState {
        self.state
    }

    /// SNAP-01: receives snapshot metadata.
    ///
    /// # Errors
    ///
    /// Propagates [`SnapshotState::receive`] failures.
    pub fn receive(
        mut self,
        source: &str,
        archive_hash: &str,
        file_count: u64,
        total_size: u64,
    ) -> Result<Self, SnapshotError> {
        let metadata = SnapshotMetadata::new(
            self.config,
            source,
            archive_hash,
            file_count,
            total_size,
            None,
        );
        self.state = self.state.receive(self.config, metadata)?;
        Ok(self)
    }

    /// SNAP-01 with a declared manifest hash.
    ///
    /// # Errors
    ///
    /// Propagates [`SnapshotState::receive`] failures.
    pub fn receive_with_manifest(
        mut self,
        source: &str,
        archive_hash: &str,
        file_count: u64,
        total_size: u64,
        manifest_hash: &str,
    ) -> Result<Self, SnapshotError> {
        let metadata = SnapshotMetadata::new(
            self.config,
            source,
            archive_hash,
            file_count,
            total_size,
            Some(manifest_hash.to_string()),
        );
        self.state = self.state.receive(self.config, metadata)?;
        Ok(self)
    }

    /// SNAP-02: verifies the archive hash.
    ///
    /// # Errors
    ///
    /// Propagates [`SnapshotState::verify_hash`] failures.
    pub fn verify_hash(mut self, actual_hash: &str) -> Result<Self, SnapshotError> {
        self.state = self.state.verify_hash(actual_hash)?;
        Ok(self)
    }

    /// SNAP-03: validates the manifest.
    ///
    /// # Errors
    ///
    /// Propagates [`SnapshotState::validate_manifest`] failures.
    pub fn validate_manifest(mut self) -> Result<Self, SnapshotError> {
        self.state = self.state.validate_manifest()?;
        Ok(self)
    }

    /// SNAP-04: locks the snapshot and returns the final state.
    ///
    /// # Errors
    ///
    /// Propagates [`SnapshotState::lock_snapshot`] failures.
    pub fn lock(self) -> Result<SnapshotState, SnapshotError> {
        self.state.lock_snapshot()
    }
}
