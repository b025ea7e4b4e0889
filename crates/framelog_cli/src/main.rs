//! FrameLog CLI
//!
//! Command-line front end for the FrameLog ingestion service.
//!
//! # Commands
//!
//! - `serve` - Read line-delimited JSON frames from stdin and ingest them
//! - `version` - Show version information
//!
//! `serve` prints the end-of-stream acknowledgment as JSON when stdin
//! closes, then drains and flushes every session before exiting.

use clap::{Parser, Subcommand};
use framelog_core::{HandoffConfig, HandoffQueue, LogConfig, LogFrame, RespHandoffQueue};
use framelog_server::{IngestServer, ServerConfig};
use std::io::BufRead;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

/// FrameLog session log ingestion service.
#[derive(Parser)]
#[command(name = "framelog")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(global = true, short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Ingest line-delimited JSON frames from stdin
    Serve {
        /// Directory for segments, side-files, and artifacts
        #[arg(long, env = "FRAMELOG_DIR", default_value = "framelog")]
        log_dir: PathBuf,

        /// Content bytes accumulated before a segment rotates
        #[arg(long, env = "FRAMELOG_MAX_SEGMENT_BYTES", default_value_t = 4 * 1024 * 1024)]
        max_segment_bytes: u64,

        /// Disable zstd compression of rotated segments
        #[arg(long, env = "FRAMELOG_NO_COMPRESS")]
        no_compress: bool,

        /// zstd compression level
        #[arg(long, env = "FRAMELOG_COMPRESSION_LEVEL", default_value_t = 3)]
        compression_level: i32,

        /// fsync segments during rotation
        #[arg(long, env = "FRAMELOG_FSYNC")]
        fsync: bool,

        /// Per-session buffer capacity in frames
        #[arg(long, env = "FRAMELOG_CAPACITY", default_value_t = 1024)]
        capacity: usize,

        /// Close sessions idle for this many seconds (0 disables)
        #[arg(long, env = "FRAMELOG_IDLE_TIMEOUT_SECS", default_value_t = 0)]
        idle_timeout_secs: u64,

        /// Maximum number of live sessions
        #[arg(long, env = "FRAMELOG_MAX_SESSIONS", default_value_t = 4096)]
        max_sessions: usize,

        /// RESP store address for artifact handoff (host:port)
        #[arg(long, env = "FRAMELOG_QUEUE_ADDR")]
        queue_addr: Option<SocketAddr>,

        /// Queue key artifacts are pushed onto
        #[arg(long, env = "FRAMELOG_QUEUE_KEY", default_value = "framelog:artifacts")]
        queue_key: String,

        /// TTL refreshed on the queue key after each push (0 = no expiry)
        #[arg(long, env = "FRAMELOG_QUEUE_TTL_SECS", default_value_t = 0)]
        queue_ttl_secs: u64,

        /// Maximum frame content size in bytes (0 disables the cap)
        #[arg(long, env = "FRAMELOG_MAX_CONTENT_BYTES", default_value_t = 1024 * 1024)]
        max_content_bytes: usize,
    },

    /// Show version information
    Version,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Initialize logging
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };
    tracing_subscriber::fmt().with_env_filter(filter).init();

    match cli.command {
        Commands::Serve {
            log_dir,
            max_segment_bytes,
            no_compress,
            compression_level,
            fsync,
            capacity,
            idle_timeout_secs,
            max_sessions,
            queue_addr,
            queue_key,
            queue_ttl_secs,
            max_content_bytes,
        } => {
            let mut log_config = LogConfig::new(log_dir)
                .max_segment_bytes(max_segment_bytes)
                .compress(!no_compress)
                .compression_level(compression_level)
                .sync_on_rotate(fsync)
                .queue_capacity(capacity)
                .idle_timeout(Duration::from_secs(idle_timeout_secs))
                .max_sessions(max_sessions);

            let publisher: Option<Arc<dyn HandoffQueue>> = queue_addr.map(|addr| {
                Arc::new(RespHandoffQueue::new(addr)) as Arc<dyn HandoffQueue>
            });
            if publisher.is_some() {
                log_config = log_config.handoff(
                    HandoffConfig::new(queue_key).ttl(Duration::from_secs(queue_ttl_secs)),
                );
            }

            let server_config = ServerConfig::new().with_max_content_bytes(max_content_bytes);
            serve(log_config, server_config, publisher)?;
        }
        Commands::Version => {
            println!("framelog {}", env!("CARGO_PKG_VERSION"));
        }
    }

    Ok(())
}

fn serve(
    log_config: LogConfig,
    server_config: ServerConfig,
    publisher: Option<Arc<dyn HandoffQueue>>,
) -> Result<(), Box<dyn std::error::Error>> {
    let server = IngestServer::new(log_config, server_config, publisher)?;

    let stdin = std::io::stdin();
    let frames = stdin.lock().lines().filter_map(|line| {
        let line = match line {
            Ok(line) => line,
            Err(e) => {
                tracing::warn!(error = %e, "failed to read input line");
                return None;
            }
        };
        if line.trim().is_empty() {
            return None;
        }
        match serde_json::from_str::<LogFrame>(&line) {
            Ok(frame) => Some(frame),
            Err(e) => {
                tracing::warn!(error = %e, "skipping malformed frame");
                None
            }
        }
    });

    let ack = server.handler().handle_stream(frames);
    println!("{}", serde_json::to_string(&ack)?);

    server.shutdown();
    Ok(())
}
