//! Entry point for `stcp`.
//!
//! Parses CLI arguments and dispatches into either **send** or **receive**
//! mode.  All protocol work is delegated to library modules; `main.rs` owns
//! only process setup (logging, argument parsing, file handling).

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use tokio::io::{AsyncReadExt, AsyncWrite};

use stcp::{config, receive, Connection, Socket, StcpConfig};

/// Reliable byte stream over UDP.
#[derive(Parser)]
#[command(author, version, about)]
struct Cli {
    #[command(subcommand)]
    mode: Mode,

    #[command(flatten)]
    tuning: Tuning,
}

#[derive(Subcommand)]
enum Mode {
    /// Stream a file to a remote receiver.
    Send {
        /// Destination host name or address.
        host: String,
        /// File to transfer.
        file: PathBuf,
        /// Local port acknowledgements arrive on.
        #[arg(long, default_value_t = 9000)]
        ack_port: u16,
        /// Remote port data is sent to.
        #[arg(long, default_value_t = 9001)]
        data_port: u16,
    },
    /// Accept one connection and write the stream out.
    Receive {
        /// Local port to listen on.
        #[arg(short, long, default_value_t = 9001)]
        port: u16,
        /// Output file; stdout when omitted.
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

/// Protocol tunables shared by both modes.
#[derive(Args)]
struct Tuning {
    /// Initial retransmission timeout in milliseconds.
    #[arg(long, global = true, default_value_t = config::INITIAL_RTO.as_millis() as u64)]
    initial_rto_ms: u64,
    /// Back-off ceiling in milliseconds.
    #[arg(long, global = true, default_value_t = config::MAX_RTO.as_millis() as u64)]
    max_rto_ms: u64,
    /// Consecutive timeouts tolerated before failing.
    #[arg(long, global = true, default_value_t = config::MAX_RETRIES)]
    max_retries: u32,
    /// Maximum segment payload in bytes.
    #[arg(long, global = true, default_value_t = config::MSS)]
    mss: usize,
    /// Window ceiling in bytes.
    #[arg(long, global = true, default_value_t = config::MAX_WINDOW)]
    max_window: u16,
}

impl From<Tuning> for StcpConfig {
    fn from(t: Tuning) -> Self {
        Self {
            initial_rto: Duration::from_millis(t.initial_rto_ms),
            max_rto: Duration::from_millis(t.max_rto_ms),
            max_retries: t.max_retries,
            mss: t.mss.max(1),
            max_window: t.max_window,
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialise env_logger; set RUST_LOG to control verbosity.
    env_logger::init();

    let cli = Cli::parse();
    let config = StcpConfig::from(cli.tuning);

    match cli.mode {
        Mode::Send {
            host,
            file,
            ack_port,
            data_port,
        } => send_file(&host, ack_port, data_port, &file, config).await,
        Mode::Receive { port, output } => receive_file(port, output.as_deref(), &config).await,
    }
}

async fn send_file(
    host: &str,
    ack_port: u16,
    data_port: u16,
    path: &Path,
    config: StcpConfig,
) -> anyhow::Result<()> {
    log::info!("Sending {} from port {ack_port} to <{host}, {data_port}>", path.display());

    let mut file = tokio::fs::File::open(path)
        .await
        .with_context(|| format!("cannot open {}", path.display()))?;
    let socket = Socket::open(host, data_port, ack_port)
        .await
        .with_context(|| format!("cannot reach {host}:{data_port}"))?;
    let mut chunk = vec![0u8; config.mss];
    let mut conn = Connection::open(socket, config)
        .await
        .context("connection open failed")?;

    let mut total = 0u64;
    loop {
        let n = file
            .read(&mut chunk)
            .await
            .with_context(|| format!("reading {}", path.display()))?;
        if n == 0 {
            break;
        }
        conn.send(&chunk[..n]).await.context("send failed")?;
        total += n as u64;
    }

    conn.close().await.context("close failed")?;
    log::info!("Sent {total} bytes");
    Ok(())
}

async fn receive_file(port: u16, output: Option<&Path>, config: &StcpConfig) -> anyhow::Result<()> {
    let socket = Socket::bind(std::net::SocketAddr::from(([0, 0, 0, 0], port)))
        .await
        .with_context(|| format!("cannot bind port {port}"))?;
    log::info!("Listening on {}", socket.local_addr);

    let mut sink: Box<dyn AsyncWrite + Unpin> = match output {
        Some(path) => Box::new(
            tokio::fs::File::create(path)
                .await
                .with_context(|| format!("cannot create {}", path.display()))?,
        ),
        None => Box::new(tokio::io::stdout()),
    };

    let total = receive(&socket, &mut sink, config)
        .await
        .context("receive failed")?;
    log::info!("Received {total} bytes");
    Ok(())
}
