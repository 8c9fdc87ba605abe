//! Path resolution and access control.

pub mod guard;
pub mod resolver;

pub use guard::{is_contained, AccessGuard};
pub use resolver::{canonicalize_lenient, PathResolver, ResolvedPath};
