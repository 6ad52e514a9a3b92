//! External policy collaborators consumed by the bootstrap stage.
//!
//! The gate core does not own identity or tool policy; it queries two
//! collaborators behind traits:
//!
//! - [`IdentityDirectory`] — is this GID known, and which modes/lanes may
//!   it operate in?
//! - [`ToolMatrix`] — given a `(mode, lane)` pair, which tools are
//!   permitted and which are stripped?
//!
//! Collaborator failures are validation failures, never crashes: the
//! enforcer treats `false`/`None` as a deny and implementations must not
//! panic. The in-memory [`StaticDirectory`] and [`StaticToolMatrix`] serve
//! tests and single-process deployments; anything network-backed lives
//! outside this crate.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

// =============================================================================
// Identity Directory
// =============================================================================

/// Identity/mode/lane validity lookup.
///
/// The `(gid, mode, lane)` triple is the authorization key for bootstrap
/// lock validation. Implementations answer membership questions only; they
/// never see session state.
pub trait IdentityDirectory: Send + Sync {
    /// Returns `true` if the GID is known.
    fn validate_gid(&self, gid: &str) -> bool;

    /// Returns `true` if the GID may operate in the given mode.
    fn validate_mode(&self, gid: &str, mode: &str) -> bool;

    /// Returns `true` if the GID may operate in the given lane.
    fn validate_lane(&self, gid: &str, lane: &str) -> bool;

    /// Returns the role recorded for the GID, if any.
    fn role(&self, gid: &str) -> Option<String>;
}

/// One identity's directory entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
struct DirectoryEntry {
    role: String,
    modes: BTreeSet<String>,
    lanes: BTreeSet<String>,
}

/// In-memory identity directory.
///
/// Deny-by-default: an unregistered GID fails every check.
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StaticDirectory {
    entries: BTreeMap<String, DirectoryEntry>,
}

impl StaticDirectory {
    /// Creates an empty directory.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a GID with its role and permitted modes and lanes.
    #[must_use]
    pub fn register<M, L>(mut self, gid: &str, role: &str, modes: M, lanes: L) -> Self
    where
        M: IntoIterator,
        M::Item: Into<String>,
        L: IntoIterator,
        L::Item: Into<String>,
    {
        self.entries.insert(
            gid.to_string(),
            DirectoryEntry {
                role: role.to_string(),
                modes: modes.into_iter().map(Into::into).collect(),
                lanes: lanes.into_iter().map(Into::into).collect(),
            },
        );
        self
    }
}

impl IdentityDirectory for StaticDirectory {
    fn validate_gid(&self, gid: &str) -> bool {
        self.entries.contains_key(gid)
    }

    fn validate_mode(&self, gid: &str, mode: &str) -> bool {
        self.entries
            .get(gid)
            .is_some_and(|e| e.modes.contains(mode))
    }

    fn validate_lane(&self, gid: &str, lane: &str) -> bool {
        self.entries
            .get(gid)
            .is_some_and(|e| e.lanes.contains(lane))
    }

    fn role(&self, gid: &str) -> Option<String> {
        self.entries.get(gid).map(|e| e.role.clone())
    }
}

// =============================================================================
// Tool Matrix
// =============================================================================

/// Resolved tool permissions for a `(mode, lane)` pair.
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ToolGrant {
    /// Tools the session may invoke.
    pub permitted: BTreeSet<String>,
    /// Tools stripped from the session.
    pub stripped: BTreeSet<String>,
}

impl ToolGrant {
    /// Grant permitting the given tools and stripping none.
    #[must_use]
    pub fn permit<I>(tools: I) -> Self
    where
        I: IntoIterator,
        I::Item: Into<String>,
    {
        Self {
            permitted: tools.into_iter().map(Into::into).collect(),
            stripped: BTreeSet::new(),
        }
    }

    /// Grant stripping every tool in the catalog.
    #[must_use]
    pub fn deny_all<I>(catalog: I) -> Self
    where
        I: IntoIterator,
        I::Item: Into<String>,
    {
        Self {
            permitted: BTreeSet::new(),
            stripped: catalog.into_iter().map(Into::into).collect(),
        }
    }

    /// Adds stripped tools to a grant.
    #[must_use]
    pub fn strip<I>(mut self, tools: I) -> Self
    where
        I: IntoIterator,
        I::Item: Into<String>,
    {
        self.stripped.extend(tools.into_iter().map(Into::into));
        self
    }
}

/// Tool-permission resolution keyed on `(mode, lane)`.
pub trait ToolMatrix: Send + Sync {
    /// Resolves the tool grant for a mode/lane pair.
    ///
    /// Unknown pairs must resolve to a deny-all grant, not an error.
    fn evaluate(&self, mode: &str, lane: &str) -> ToolGrant;
}

/// In-memory tool matrix with a deny-all fallback.
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StaticToolMatrix {
    /// mode → lane → grant.
    grants: BTreeMap<String, BTreeMap<String, ToolGrant>>,
}

impl StaticToolMatrix {
    /// Creates an empty matrix. Every lookup resolves deny-all.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Records the grant for a mode/lane pair.
    #[must_use]
    pub fn grant(mut self, mode: &str, lane: &str, grant: ToolGrant) -> Self {
        self.grants
            .entry(mode.to_string())
            .or_default()
            .insert(lane.to_string(), grant);
        self
    }
}

impl ToolMatrix for StaticToolMatrix {
    fn evaluate(&self, mode: &str, lane: &str) -> ToolGrant {
        self.grants
            .get(mode)
            .and_then(|lanes| lanes.get(lane))
            .cloned()
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn directory() -> StaticDirectory {
        StaticDirectory::new()
            .register("GID-01", "Cody", ["EXECUTION", "REVIEW"], ["GOVERNANCE"])
            .register("GID-02", "Auditor", ["REVIEW"], ["AUDIT"])
    }

    #[test]
    fn test_unknown_gid_denied_everywhere() {
        let dir = directory();
        assert!(!dir.validate_gid("GID-99"));
        assert!(!dir.validate_mode("GID-99", "EXECUTION"));
        assert!(!dir.validate_lane("GID-99", "GOVERNANCE"));
        assert_eq!(dir.role("GID-99"), None);
    }

    #[test]
    fn test_mode_and_lane_membership() {
        let dir = directory();
        assert!(dir.validate_gid("GID-01"));
        assert!(dir.validate_mode("GID-01", "EXECUTION"));
        assert!(!dir.validate_mode("GID-01", "DEPLOY"));
        assert!(dir.validate_lane("GID-01", "GOVERNANCE"));
        assert!(!dir.validate_lane("GID-01", "AUDIT"));
        assert_eq!(dir.role("GID-02").as_deref(), Some("Auditor"));
    }

    #[test]
    fn test_matrix_unknown_pair_is_deny_all() {
        let matrix = StaticToolMatrix::new().grant(
            "EXECUTION",
            "GOVERNANCE",
            ToolGrant::permit(["read_file"]).strip(["delete_file"]),
        );

        let grant = matrix.evaluate("EXECUTION", "GOVERNANCE");
        assert!(grant.permitted.contains("read_file"));
        assert!(grant.stripped.contains("delete_file"));

        let fallback = matrix.evaluate("EXECUTION", "FRONTEND");
        assert!(fallback.permitted.is_empty());
    }
}
