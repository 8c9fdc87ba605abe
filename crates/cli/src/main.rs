//! CLI for the Portico file gateway.
//!
//! `check` runs a path through resolution and the access guard, `export`
//! loads a JSON Lines graph and writes it back out in any supported format,
//! `import` reads a JSON Lines export and reports what it contains.

use clap::{ArgAction, Args, Parser, Subcommand};
use portico_core::config::DEFAULT_BATCH_SIZE;
use portico_core::{
    AccessConfig, Compression, ExportConfig, FileOperation, GatewayResult, ImportConfig,
    SerializationFormat,
};
use portico_export::{Exporter, FileGateway, JsonImporter, Summary};
use portico_source::InMemoryGraph;
use std::path::PathBuf;
use tokio_util::sync::CancellationToken;

#[derive(Parser, Debug)]
#[command(name = "portico", version, about = "Guarded file access and JSON graph export")]
struct Cli {
    #[command(flatten)]
    access: AccessArgs,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Args, Debug)]
struct AccessArgs {
    /// Export root directory.
    #[arg(long, global = true, env = "PORTICO_ROOT")]
    root: Option<PathBuf>,

    #[arg(long, global = true, env = "PORTICO_EXPORT_ENABLED", default_value_t = false)]
    export_enabled: bool,

    #[arg(long, global = true, env = "PORTICO_IMPORT_ENABLED", default_value_t = false)]
    import_enabled: bool,

    /// Anchor reads at the root (`--import-use-root false` resolves them
    /// against the working directory).
    #[arg(
        long,
        global = true,
        env = "PORTICO_IMPORT_USE_ROOT",
        default_value_t = true,
        action = ArgAction::Set
    )]
    import_use_root: bool,

    /// Let reads leave the root.
    #[arg(long, global = true, env = "PORTICO_ALLOW_READ_FROM_FS", default_value_t = false)]
    allow_read_from_fs: bool,
}

impl AccessArgs {
    fn into_config(self) -> AccessConfig {
        AccessConfig {
            root: self.root,
            export_enabled: self.export_enabled,
            import_enabled: self.import_enabled,
            import_uses_root: self.import_use_root,
            allow_read_from_filesystem: self.allow_read_from_fs,
        }
    }
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Resolve a path and print the access decision.
    Check {
        path: String,

        /// Check as a read instead of a write.
        #[arg(long, default_value_t = false)]
        read: bool,
    },

    /// Export a JSON Lines graph.
    Export {
        /// Output file, relative to the root. Ignored with --stream.
        file: String,

        /// JSON Lines graph to export, read through the gateway.
        #[arg(short = 'i', long)]
        from: String,

        #[arg(short, long, default_value = "JSON_LINES")]
        format: SerializationFormat,

        #[arg(short, long, default_value = "NONE")]
        compression: Compression,

        #[arg(long, default_value_t = DEFAULT_BATCH_SIZE)]
        batch_size: usize,

        /// Omit the "type" field on nodes and relationships.
        #[arg(long, default_value_t = false)]
        no_types: bool,

        /// Write to stdout instead of a file.
        #[arg(long, default_value_t = false)]
        stream: bool,

        #[arg(long, default_value_t = false)]
        json: bool,
    },

    /// Read a JSON Lines export and summarize it.
    Import {
        file: String,

        #[arg(short, long, default_value = "NONE")]
        compression: Compression,

        #[arg(long, default_value_t = DEFAULT_BATCH_SIZE)]
        batch_size: usize,

        #[arg(long, default_value_t = false)]
        json: bool,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let gateway = FileGateway::new(cli.access.into_config())?;

    let cancel = CancellationToken::new();
    let watcher = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("interrupt received, cancelling");
            watcher.cancel();
        }
    });

    match cli.command {
        Commands::Check { path, read } => {
            let op = if read {
                FileOperation::Read
            } else {
                FileOperation::Write
            };
            let resolved = gateway.authorize(&path, op)?;
            println!("ALLOW {} {}", op, resolved.path.display());
        }

        Commands::Export {
            file,
            from,
            format,
            compression,
            batch_size,
            no_types,
            stream,
            json,
        } => {
            let config = ExportConfig {
                stream,
                batch_size,
                compression,
                use_types: !no_types,
                format,
            };
            tracing::info!(from = %from, file = %file, format = %format, stream, "starting export");

            let summary = tokio::task::spawn_blocking(move || -> GatewayResult<Summary> {
                let mut graph = InMemoryGraph::new();
                JsonImporter::new(gateway.clone())
                    .with_cancellation(cancel.clone())
                    .import_json_lines(&mut graph, &from, &ImportConfig::default())?;
                Exporter::new(gateway)
                    .with_cancellation(cancel)
                    .export_all(&graph, &file, &config)
            })
            .await??;

            if stream && !json {
                // Data goes to stdout; keep the report out of the way.
                if let Some(data) = &summary.data {
                    print!("{data}");
                }
                eprint!("{}", summary.render());
            } else {
                print_summary(&summary, json)?;
            }
        }

        Commands::Import {
            file,
            compression,
            batch_size,
            json,
        } => {
            let config = ImportConfig {
                batch_size,
                compression,
            };
            let summary = tokio::task::spawn_blocking(move || -> GatewayResult<Summary> {
                let mut graph = InMemoryGraph::new();
                JsonImporter::new(gateway)
                    .with_cancellation(cancel)
                    .import_json_lines(&mut graph, &file, &config)
            })
            .await??;
            print_summary(&summary, json)?;
        }
    }

    Ok(())
}

fn print_summary(summary: &Summary, json: bool) -> Result<(), serde_json::Error> {
    if json {
        println!("{}", serde_json::to_string_pretty(summary)?);
    } else {
        print!("{}", summary.render());
    }
    Ok(())
}
