//! Bootstrap stage error types.

use thiserror::Error;

use super::state::{BootstrapStatus, LockId};

/// Errors that can occur during bootstrap and session enforcement.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[non_exhaustive]
pub enum BootstrapError {
    /// Bootstrap was attempted without a locked snapshot.
    ///
    /// Raised before any lock logic runs; no lock events are emitted on
    /// this path.
    #[error("snapshot ingestion required before bootstrap")]
    SnapshotRequired,

    /// A sealed session was required but none exists.
    #[error("bootstrap required: no bootstrap session established")]
    NoSession,

    /// A sealed session was required but the current one is not sealed.
    #[error("bootstrap required: session {status:?} is not complete; missing locks: {}", format_locks(missing))]
    NotSealed {
        /// Status of the unsealed session.
        status: BootstrapStatus,
        /// Locks not yet acquired, in canonical order.
        missing: Vec<LockId>,
    },

    /// Sealing was attempted with locks still missing.
    #[error("cannot seal: missing locks: {}", format_locks(missing))]
    Incomplete {
        /// Locks not yet acquired, in canonical order.
        missing: Vec<LockId>,
    },

    /// A specific lock was acquired twice.
    #[error("lock {} ({}) already acquired", lock.as_str(), lock.name())]
    LockAlreadyAcquired {
        /// The lock in question.
        lock: LockId,
    },

    /// Bootstrap (or any lock acquisition) was attempted on a sealed
    /// session. Always accompanied by termination of that session.
    #[error("re-bootstrap forbidden: session already sealed")]
    RebootstrapForbidden,
}

fn format_locks(locks: &[LockId]) -> String {
    if locks.is_empty() {
        return "none".to_string();
    }
    locks
        .iter()
        .map(|l| l.as_str())
        .collect::<Vec<_>>()
        .join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_sealed_message_enumerates_missing_locks() {
        let err = BootstrapError::NotSealed {
            status: BootstrapStatus::InProgress,
            missing: vec![LockId::Boot03, LockId::Boot04, LockId::Boot05],
        };
        let message = err.to_string();
        assert!(message.contains("BOOT-03"));
        assert!(message.contains("BOOT-04"));
        assert!(message.contains("BOOT-05"));
        assert!(!message.contains("BOOT-01"));
    }

    #[test]
    fn test_terminated_session_message_names_status() {
        let err = BootstrapError::NotSealed {
            status: BootstrapStatus::Terminated,
            missing: vec![],
        };
        let message = err.to_string();
        assert!(message.contains("Terminated"));
        assert!(message.contains("none"));
    }
}
