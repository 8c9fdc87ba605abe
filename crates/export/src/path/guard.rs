//! Allow/deny decisions over canonical paths.
//!
//! Pure: no I/O, no ambient state. The configuration snapshot and the
//! canonical root are injected at construction.

use super::resolver::ResolvedPath;
use portico_core::{AccessConfig, AccessDecision, DenyReason, FileOperation};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone)]
pub struct AccessGuard {
    config: AccessConfig,
    canonical_root: Option<PathBuf>,
}

impl AccessGuard {
    /// `canonical_root` must already be canonicalized the same way resolved
    /// paths are, or containment checks will spuriously fail.
    pub fn new(config: AccessConfig, canonical_root: Option<PathBuf>) -> Self {
        Self {
            config,
            canonical_root,
        }
    }

    pub fn config(&self) -> &AccessConfig {
        &self.config
    }

    pub fn check(&self, resolved: &ResolvedPath, operation: FileOperation) -> AccessDecision {
        if !self.config.is_enabled(operation) {
            return AccessDecision::Deny(DenyReason::FeatureDisabled);
        }

        let inside = self.is_inside_root(&resolved.path, operation);
        match (operation, inside) {
            (_, true) => AccessDecision::Allow,
            (FileOperation::Read, false) if self.config.allow_read_from_filesystem => {
                tracing::info!(
                    path = %resolved.path.display(),
                    "reading outside the import directory (filesystem access enabled)"
                );
                AccessDecision::Allow
            }
            (FileOperation::Read, false) => {
                AccessDecision::Deny(DenyReason::ReadFromFilesystemNotAllowed)
            }
            (FileOperation::Write, false) => {
                AccessDecision::Deny(DenyReason::OutsideRootNotAllowed)
            }
        }
    }

    /// Segment-wise containment against the root anchoring `operation`.
    /// Reads that are not root-anchored are always outside.
    fn is_inside_root(&self, path: &Path, operation: FileOperation) -> bool {
        if self.config.anchor_for(operation).is_none() {
            return false;
        }
        match &self.canonical_root {
            Some(root) => is_contained(root, path),
            None => false,
        }
    }
}

/// `true` when `root`'s component sequence is a prefix of `path`'s.
/// `/data/import` does not contain `/data/imported/x`.
pub fn is_contained(root: &Path, path: &Path) -> bool {
    path.starts_with(root)
}
