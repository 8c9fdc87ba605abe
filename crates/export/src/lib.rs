//! Secure file gateway and streaming JSON graph serializer.
//!
//! Pipeline: raw path → [`PathResolver`] → [`AccessGuard`] → guarded file →
//! [`CountingWriter`] → [`Serializer`] (delegating values to [`ValueCodec`]) →
//! [`Reporter`] → [`Summary`].

pub mod codec;
pub mod compression;
pub mod gateway;
pub mod generator;
pub mod import;
pub mod orchestrator;
pub mod path;
pub mod progress;
pub mod reporter;
pub mod sink;

pub use codec::ValueCodec;
pub use compression::{CompressedReader, CompressedWriter};
pub use gateway::FileGateway;
pub use generator::JsonGenerator;
pub use import::JsonImporter;
pub use orchestrator::Exporter;
pub use path::{AccessGuard, PathResolver, ResolvedPath};
pub use progress::{CountingReader, CountingWriter, ExportProgress, ProgressCounter};
pub use reporter::{Reporter, Summary};
pub use sink::{JsonSerializer, Serializer, WriteContext};
