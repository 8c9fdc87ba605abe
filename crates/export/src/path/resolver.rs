//! Raw path / URI string → canonical absolute path.
//!
//! Pipeline: strip `file:` prefixes, split into segments on either
//! separator, percent-decode each segment (repeated while encoded traversal
//! survives), anchor relative input, fold `.`/`..`, then resolve symlinks on
//! the longest existing prefix.
//!
//! A `..` spelled out literally in an absolute or `file://` request is
//! clamped at the anchor, the way URI paths are. A `..` that only appears
//! after decoding is never clamped: it may climb out of the anchor, and the
//! guard then denies it.

use percent_encoding::percent_decode_str;
use portico_core::error::{GatewayError, GatewayResult};
use std::io;
use std::path::{Component, Path, PathBuf};

/// Upper bound on decoding passes. Deeper nesting is rejected outright.
pub const MAX_DECODE_PASSES: usize = 8;

/// Encoded forms that still hide traversal after a decoding pass.
const ENCODED_TRAVERSAL: [&str; 4] = ["%2e", "%2f", "%5c", "%25"];

/// A request after decoding and canonicalization.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedPath {
    /// Canonical absolute location.
    pub path: PathBuf,
    /// URI scheme the request carried, if any (only `file` is accepted).
    pub scheme: Option<String>,
}

impl ResolvedPath {
    pub fn has_scheme(&self) -> bool {
        self.scheme.is_some()
    }
}

/// Resolves requests relative to an optional anchor directory.
///
/// Without an anchor, relative requests resolve against the process working
/// directory at call time.
#[derive(Debug, Clone)]
pub struct PathResolver {
    anchor: Option<Anchor>,
}

#[derive(Debug, Clone)]
struct Anchor {
    configured: PathBuf,
    canonical: PathBuf,
}

/// How the request spelled its `file:` prefix.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Form {
    /// No scheme.
    Bare,
    /// `file:path`, an opaque path with no clamping.
    Opaque,
    /// `file://path` or `file:///path`.
    Hierarchical,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Name(String),
    Parent { encoded: bool },
}

impl PathResolver {
    pub fn new(anchor: Option<&Path>) -> GatewayResult<Self> {
        let anchor = match anchor {
            Some(dir) => {
                let configured = absolutize(dir)?;
                let canonical = canonicalize_lenient(&configured)?;
                Some(Anchor {
                    configured,
                    canonical,
                })
            }
            None => None,
        };
        Ok(Self { anchor })
    }

    pub fn unanchored() -> Self {
        Self { anchor: None }
    }

    /// Canonical anchor directory.
    pub fn anchor(&self) -> Option<&Path> {
        self.anchor.as_ref().map(|a| a.canonical.as_path())
    }

    pub fn resolve(&self, raw: &str) -> GatewayResult<ResolvedPath> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(GatewayError::malformed(raw, "empty path"));
        }
        if trimmed.contains('\0') {
            return Err(GatewayError::malformed(raw, "embedded NUL byte"));
        }

        let (form, rest) = strip_scheme(raw, trimmed)?;
        if rest.is_empty() {
            return Err(GatewayError::malformed(raw, "empty path"));
        }
        let segments = split_segments(raw, rest)?;

        let lexical = if rest.starts_with(is_separator) {
            let host = fold(PathBuf::from("/"), &segments, true);
            match &self.anchor {
                Some(anchor) if !anchor.names_host_path(&host) => {
                    fold(anchor.canonical.clone(), &segments, true)
                }
                _ => host,
            }
        } else {
            let base = match &self.anchor {
                Some(anchor) => anchor.canonical.clone(),
                None => std::env::current_dir()?,
            };
            fold(base, &segments, form == Form::Hierarchical)
        };

        let path = canonicalize_lenient(&lexical)?;
        tracing::trace!(raw, resolved = %path.display(), "path resolved");
        let scheme = (form != Form::Bare).then(|| "file".to_string());
        Ok(ResolvedPath { path, scheme })
    }
}

impl Anchor {
    /// An absolute request names a host location when its top-level directory
    /// is the anchor's own top-level directory. Anything else is re-rooted.
    fn names_host_path(&self, requested: &Path) -> bool {
        let Some(head) = first_segment(requested) else {
            return false;
        };
        [&self.configured, &self.canonical]
            .iter()
            .any(|root| first_segment(root) == Some(head))
    }
}

fn first_segment(path: &Path) -> Option<&std::ffi::OsStr> {
    path.components().find_map(|c| match c {
        Component::Normal(s) => Some(s),
        _ => None,
    })
}

fn is_separator(c: char) -> bool {
    c == '/' || c == '\\'
}

/// Applies `segments` to `base`. With `clamp`, literal `..` never climbs
/// above `base`; encoded `..` always may.
fn fold(base: PathBuf, segments: &[Segment], clamp: bool) -> PathBuf {
    let floor = if clamp { base.components().count() } else { 0 };
    let mut out = base;
    for segment in segments {
        match segment {
            Segment::Name(name) => out.push(name),
            Segment::Parent { encoded } => {
                let climbable = matches!(out.components().next_back(), Some(Component::Normal(_)));
                if climbable && (*encoded || out.components().count() > floor) {
                    out.pop();
                }
            }
        }
    }
    out
}

// ---------------------------------------------------------------------------
// Decoding
// ---------------------------------------------------------------------------

/// Percent-decodes until no encoded traversal remains.
pub fn decode(raw: &str) -> GatewayResult<String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(GatewayError::malformed(raw, "empty path"));
    }
    decode_layers(raw, trimmed)
}

fn decode_layers(raw: &str, encoded: &str) -> GatewayResult<String> {
    let mut current = encoded.to_string();
    let mut passes = 0;
    loop {
        let decoded = percent_decode_str(&current)
            .decode_utf8()
            .map_err(|_| GatewayError::malformed(raw, "not valid UTF-8 after decoding"))?
            .into_owned();
        passes += 1;

        let changed = decoded != current;
        current = decoded;
        if !changed || !contains_encoded_traversal(&current) {
            break;
        }
        if passes >= MAX_DECODE_PASSES {
            return Err(GatewayError::malformed(raw, "too many levels of percent-encoding"));
        }
    }

    if current.contains('\0') {
        return Err(GatewayError::malformed(raw, "embedded NUL byte"));
    }
    Ok(current)
}

fn contains_encoded_traversal(s: &str) -> bool {
    let lower = s.to_ascii_lowercase();
    ENCODED_TRAVERSAL.iter().any(|seq| lower.contains(seq))
}

/// Splits on both separators. Segments containing `%` are decoded, and
/// whatever separators or `..` the decoding reveals are marked as encoded.
fn split_segments(raw: &str, rest: &str) -> GatewayResult<Vec<Segment>> {
    let mut segments = Vec::new();
    for piece in rest.split(is_separator) {
        if !piece.contains('%') {
            push_segment(&mut segments, piece, false);
            continue;
        }
        let decoded = decode_layers(raw, piece)?;
        for part in decoded.split(is_separator) {
            push_segment(&mut segments, part, true);
        }
    }
    Ok(segments)
}

fn push_segment(segments: &mut Vec<Segment>, part: &str, encoded: bool) {
    match part {
        "" | "." => {}
        ".." => segments.push(Segment::Parent { encoded }),
        name => segments.push(Segment::Name(name.to_string())),
    }
}

/// Strips `file:`, `file://` and `file:///` prefixes. A `name://` prefix
/// with any other scheme is rejected; a bare `name:` is just a file name.
fn strip_scheme<'a>(raw: &str, input: &'a str) -> GatewayResult<(Form, &'a str)> {
    let has_file_prefix = input
        .get(..5)
        .is_some_and(|p| p.eq_ignore_ascii_case("file:"));
    if has_file_prefix {
        let rest = &input[5..];
        return Ok(match rest.strip_prefix("//") {
            Some(path) => (Form::Hierarchical, path),
            None => (Form::Opaque, rest),
        });
    }

    if let Some((scheme, _)) = input.split_once("://") {
        // Single-letter schemes are drive letters, not URIs.
        if scheme.len() > 1 {
            if let Ok(url) = url::Url::parse(input) {
                return Err(GatewayError::malformed(
                    raw,
                    format!("unsupported scheme '{}'", url.scheme()),
                ));
            }
        }
    }
    Ok((Form::Bare, input))
}

// ---------------------------------------------------------------------------
// Normalization
// ---------------------------------------------------------------------------

/// Collapses `.` and `..` without touching the filesystem. `..` never climbs
/// above the root of an absolute path.
pub fn normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::Prefix(p) => out.push(p.as_os_str()),
            Component::RootDir => out.push(Component::RootDir.as_os_str()),
            Component::CurDir => {}
            Component::ParentDir => {
                let last_is_normal =
                    matches!(out.components().next_back(), Some(Component::Normal(_)));
                if last_is_normal {
                    out.pop();
                } else if !out.has_root() {
                    out.push("..");
                }
            }
            Component::Normal(segment) => out.push(segment),
        }
    }
    out
}

/// Canonicalizes the longest existing ancestor of `path` (resolving symlinks)
/// and re-appends the components that do not exist yet.
pub fn canonicalize_lenient(path: &Path) -> io::Result<PathBuf> {
    let absolute = absolutize(path)?;
    let normalized = normalize(&absolute);

    for ancestor in normalized.ancestors() {
        if let Ok(canonical) = std::fs::canonicalize(ancestor) {
            let remainder = normalized.strip_prefix(ancestor).unwrap_or(Path::new(""));
            return Ok(if remainder.as_os_str().is_empty() {
                canonical
            } else {
                canonical.join(remainder)
            });
        }
    }
    Ok(normalized)
}

fn absolutize(path: &Path) -> io::Result<PathBuf> {
    if path.is_absolute() {
        Ok(path.to_path_buf())
    } else {
        Ok(std::env::current_dir()?.join(path))
    }
}
