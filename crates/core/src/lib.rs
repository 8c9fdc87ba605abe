//! Domain models, configuration snapshots, and error definitions.
//!
//! Foundation crate -- no async or I/O dependencies.

pub mod config;
pub mod error;
pub mod types;

pub use config::{
    AccessConfig, Compression, ExportConfig, FileOperation, ImportConfig, SerializationFormat,
};
pub use error::{AccessDecision, DenyReason, GatewayError, GatewayResult};
pub use types::{
    ElementId, Labels, NodeRef, NodeView, PathView, PropertyMap, RelationshipView, SubGraph, Value,
};
