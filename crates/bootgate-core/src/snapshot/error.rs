//! Snapshot stage error types.

use thiserror::Error;

/// Errors that can occur during snapshot ingestion and enforcement.
///
/// Ordering violations (`NotReceived`, `HashNotVerified`,
/// `ManifestNotValidated`) indicate a caller driving the steps out of
/// sequence; re-entry violations (`ReingestionForbidden`, `AlreadyBound`)
/// indicate an attempt to mutate a completed stage. Both are refused, never
/// silently ignored.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[non_exhaustive]
pub enum SnapshotError {
    /// No snapshot has been ingested yet.
    #[error("snapshot ingestion required before bootstrap")]
    Required,

    /// A step was attempted before the snapshot was received (SNAP-01).
    #[error("snapshot not received")]
    NotReceived,

    /// A step was attempted before hash verification (SNAP-02).
    #[error("snapshot hash not verified")]
    HashNotVerified,

    /// Locking was attempted before manifest validation (SNAP-03).
    #[error("snapshot manifest not validated")]
    ManifestNotValidated,

    /// A locked snapshot was required but the current one is not locked.
    #[error("snapshot not locked")]
    NotLocked,

    /// A declared hash disagreed with a freshly observed one.
    ///
    /// Always terminal for the current snapshot, whether raised during
    /// initial verification or a post-lock re-check.
    #[error("snapshot drift detected: expected {expected}, actual {actual}")]
    Drift {
        /// The declared hash.
        expected: String,
        /// The observed hash.
        actual: String,
    },

    /// An ingestion step was attempted after the snapshot was locked.
    #[error("re-ingestion forbidden: snapshot already locked")]
    ReingestionForbidden,

    /// The snapshot lock is already bound to a session token.
    #[error("snapshot already bound to session {existing}")]
    AlreadyBound {
        /// The token the lock is bound to.
        existing: String,
    },

    /// A declared hash does not have the `"{algorithm}:{hex}"` shape.
    #[error("malformed hash: {hash:?}")]
    MalformedHash {
        /// The offending hash string.
        hash: String,
    },
}
