mod cmd;
mod exit;
mod logging;
mod output;

use clap::Parser;

use crate::cmd::Command;
use crate::logging::{init_logging, LogFormat, LogLevel};
use crate::output::OutputFormat;

#[derive(Parser, Debug)]
#[command(name = "textsock", version, about = "Line and byte-count string socket CLI")]
struct Cli {
    /// Output format.
    #[arg(long, value_name = "FORMAT", global = true)]
    format: Option<OutputFormat>,

    /// Log output format (stderr).
    #[arg(long, value_name = "FORMAT", default_value = "text", global = true)]
    log_format: LogFormat,

    /// Minimum log level (stderr). TEXTSOCK_LOG overrides with a filter directive.
    #[arg(long, value_name = "LEVEL", default_value = "info", global = true)]
    log_level: LogLevel,

    #[command(subcommand)]
    command: Command,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_logging(cli.log_format, cli.log_level);

    let format = cli.format.unwrap_or_else(OutputFormat::default_for_stdout);
    let result = cmd::run(cli.command, format).await;

    match result {
        Ok(code) => std::process::exit(code),
        Err(err) => {
            eprintln!("error: {err}");
            std::process::exit(err.code);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_send_subcommand() {
        let cli = Cli::try_parse_from([
            "textsock",
            "send",
            "127.0.0.1:7000",
            "--data",
            "hello",
            "--data",
            "world",
            "--wait-lines",
            "1",
        ])
        .expect("send args should parse");

        match cli.command {
            Command::Send(args) => {
                assert_eq!(args.data, vec!["hello", "world"]);
                assert_eq!(args.wait_lines, 1);
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn rejects_conflicting_payload_args() {
        let err = Cli::try_parse_from([
            "textsock",
            "send",
            "127.0.0.1:7000",
            "--file",
            "/tmp/request.txt",
            "--data",
            "hello",
        ])
        .expect_err("conflicting args should fail");

        assert_eq!(err.kind(), clap::error::ErrorKind::ArgumentConflict);
    }

    #[test]
    fn rejects_malformed_endpoint() {
        let err = Cli::try_parse_from(["textsock", "listen", "no-port-here"])
            .expect_err("endpoint without port should fail");
        assert_eq!(err.kind(), clap::error::ErrorKind::ValueValidation);
    }

    #[test]
    fn parses_listen_subcommand() {
        let cli = Cli::try_parse_from([
            "textsock",
            "--format",
            "json",
            "listen",
            "unix:///tmp/textsock.sock",
            "--count",
            "3",
        ])
        .expect("listen args should parse");
        assert!(matches!(cli.command, Command::Listen(ref args) if args.count == Some(3)));
        assert!(matches!(cli.format, Some(OutputFormat::Json)));
    }
}
