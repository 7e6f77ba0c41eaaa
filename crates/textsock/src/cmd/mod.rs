use std::path::PathBuf;

use clap::{Args, Subcommand};
use textsock_codec::encoding_for_label;
use textsock_socket::{SocketConfig, DEFAULT_READ_BUFFER_SIZE};
use textsock_transport::Endpoint;
use tokio_util::sync::CancellationToken;

use crate::exit::{codec_error, CliError, CliResult, USAGE};
use crate::output::OutputFormat;

pub mod echo;
pub mod listen;
pub mod send;
pub mod version;

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Start a line echo server.
    Echo(EchoArgs),
    /// Connect, send text, and optionally wait for a response.
    Send(SendArgs),
    /// Listen and print received lines.
    Listen(ListenArgs),
    /// Show version information.
    Version(VersionArgs),
}

pub async fn run(command: Command, format: OutputFormat) -> CliResult<i32> {
    match command {
        Command::Echo(args) => echo::run(args, format).await,
        Command::Send(args) => send::run(args, format).await,
        Command::Listen(args) => listen::run(args, format).await,
        Command::Version(args) => version::run(args),
    }
}

/// Socket options shared by every networked command.
#[derive(Args, Debug)]
pub struct SocketArgs {
    /// Text encoding for both directions (utf-8, latin1, ascii).
    #[arg(long, default_value = "utf-8")]
    pub encoding: String,
    /// Maximum bytes requested per raw read.
    #[arg(long, value_name = "BYTES", default_value_t = DEFAULT_READ_BUFFER_SIZE)]
    pub read_buffer: usize,
}

impl SocketArgs {
    pub fn config(&self) -> CliResult<SocketConfig> {
        if self.read_buffer == 0 {
            return Err(CliError::new(USAGE, "--read-buffer must be greater than zero"));
        }
        let encoding = encoding_for_label(&self.encoding)
            .map_err(|err| codec_error("invalid --encoding", err))?;
        Ok(SocketConfig {
            encoding,
            read_buffer_size: self.read_buffer,
        })
    }
}

#[derive(Args, Debug)]
pub struct EchoArgs {
    /// Endpoint to bind (host:port, tcp://host:port, unix:///path).
    pub endpoint: Endpoint,
    #[command(flatten)]
    pub socket: SocketArgs,
}

#[derive(Args, Debug)]
pub struct SendArgs {
    /// Endpoint to connect to (host:port, tcp://host:port, unix:///path).
    pub endpoint: Endpoint,
    /// Text to send as one line; repeat for several lines.
    #[arg(long, conflicts_with = "file")]
    pub data: Vec<String>,
    /// Send the file's contents verbatim; it must be valid in --encoding.
    #[arg(long, conflicts_with = "data")]
    pub file: Option<PathBuf>,
    /// Wait for N response lines and print them.
    #[arg(long, value_name = "N", default_value_t = 0)]
    pub wait_lines: usize,
    /// After any lines, wait for N response bytes and print them.
    #[arg(long, value_name = "N", default_value_t = 0)]
    pub wait_bytes: usize,
    /// Maximum time to wait for the response (e.g. 5s, 500ms).
    #[arg(long, default_value = "5s")]
    pub wait_timeout: String,
    #[command(flatten)]
    pub socket: SocketArgs,
}

#[derive(Args, Debug)]
pub struct ListenArgs {
    /// Endpoint to bind (host:port, tcp://host:port, unix:///path).
    pub endpoint: Endpoint,
    /// Exit after receiving N lines.
    #[arg(long)]
    pub count: Option<usize>,
    #[command(flatten)]
    pub socket: SocketArgs,
}

#[derive(Args, Debug)]
pub struct VersionArgs {
    /// Show extended build provenance.
    #[arg(long)]
    pub extended: bool,
}

/// Token cancelled on Ctrl-C.
pub(crate) fn install_ctrlc_handler() -> CancellationToken {
    let running = CancellationToken::new();
    let trigger = running.clone();
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                tracing::info!("interrupt received, shutting down");
                trigger.cancel();
            }
            Err(err) => tracing::warn!(error = %err, "signal handler setup failed"),
        }
    });
    running
}

#[cfg(test)]
mod tests {
    use super::*;

    fn socket_args(encoding: &str, read_buffer: usize) -> SocketArgs {
        SocketArgs {
            encoding: encoding.to_string(),
            read_buffer,
        }
    }

    #[test]
    fn socket_args_resolve_encoding_label() {
        let config = socket_args("Latin1", 512).config().expect("config should resolve");
        assert_eq!(config.encoding.name(), "iso-8859-1");
        assert_eq!(config.read_buffer_size, 512);
    }

    #[test]
    fn socket_args_reject_bad_values() {
        assert_eq!(socket_args("ebcdic", 512).config().unwrap_err().code, USAGE);
        assert_eq!(socket_args("utf-8", 0).config().unwrap_err().code, USAGE);
    }
}
