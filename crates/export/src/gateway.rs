//! Guarded file access.
//!
//! Every file the export/import pipeline touches is opened here, after the
//! request has been resolved and the guard has allowed it.

use crate::path::{canonicalize_lenient, AccessGuard, PathResolver, ResolvedPath};
use portico_core::error::{GatewayError, GatewayResult};
use portico_core::{AccessConfig, FileOperation};
use std::fs::File;
use std::io;

/// Resolver + guard pair bound to one configuration snapshot.
#[derive(Debug, Clone)]
pub struct FileGateway {
    guard: AccessGuard,
    rooted: Option<PathResolver>,
    unrooted: PathResolver,
}

impl FileGateway {
    pub fn new(config: AccessConfig) -> GatewayResult<Self> {
        let (rooted, canonical_root) = match &config.root {
            Some(root) => {
                let resolver = PathResolver::new(Some(root))?;
                let canonical = canonicalize_lenient(root)?;
                (Some(resolver), Some(canonical))
            }
            None => (None, None),
        };
        tracing::debug!(
            root = ?canonical_root,
            export_enabled = config.export_enabled,
            import_enabled = config.import_enabled,
            import_uses_root = config.import_uses_root,
            allow_read_from_filesystem = config.allow_read_from_filesystem,
            "file gateway configured"
        );
        Ok(Self {
            guard: AccessGuard::new(config, canonical_root),
            rooted,
            unrooted: PathResolver::unanchored(),
        })
    }

    pub fn config(&self) -> &AccessConfig {
        self.guard.config()
    }

    fn resolver_for(&self, operation: FileOperation) -> &PathResolver {
        match (self.config().anchor_for(operation), &self.rooted) {
            (Some(_), Some(resolver)) => resolver,
            _ => &self.unrooted,
        }
    }

    /// Resolves `raw` and checks it. No filesystem handle is opened.
    pub fn authorize(&self, raw: &str, operation: FileOperation) -> GatewayResult<ResolvedPath> {
        if !self.config().is_enabled(operation) {
            tracing::warn!(%operation, reason = "FEATURE_DISABLED", "file access denied");
            return Err(GatewayError::FeatureDisabled { operation });
        }

        let resolved = self.resolver_for(operation).resolve(raw)?;
        let decision = self.guard.check(&resolved, operation);
        if let portico_core::AccessDecision::Deny(reason) = decision {
            tracing::warn!(
                %operation,
                path = %resolved.path.display(),
                %reason,
                "file access denied"
            );
        }
        decision.into_result(&resolved.path, operation)?;
        Ok(resolved)
    }

    /// Authorizes and creates (truncating) the export target. The parent
    /// directory must already exist.
    pub fn open_write(&self, raw: &str) -> GatewayResult<(ResolvedPath, File)> {
        let resolved = self.authorize(raw, FileOperation::Write)?;
        let file = File::create(&resolved.path).map_err(|e| not_found_or_io(e, &resolved))?;
        tracing::debug!(path = %resolved.path.display(), "export file opened");
        Ok((resolved, file))
    }

    /// Authorizes and opens an import source, returning its length in bytes.
    pub fn open_read(&self, raw: &str) -> GatewayResult<(ResolvedPath, File, u64)> {
        let resolved = self.authorize(raw, FileOperation::Read)?;
        let file = File::open(&resolved.path).map_err(|e| not_found_or_io(e, &resolved))?;
        let len = file.metadata()?.len();
        tracing::debug!(path = %resolved.path.display(), bytes = len, "import file opened");
        Ok((resolved, file, len))
    }
}

fn not_found_or_io(err: io::Error, resolved: &ResolvedPath) -> GatewayError {
    if err.kind() == io::ErrorKind::NotFound {
        GatewayError::NotFound {
            path: resolved.path.clone(),
        }
    } else {
        GatewayError::Io(err)
    }
}
