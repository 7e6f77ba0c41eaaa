use std::io::{IsTerminal, Write};
use std::time::{SystemTime, UNIX_EPOCH};

use clap::ValueEnum;
use comfy_table::{presets::UTF8_FULL, ContentArrangement, Table};
use serde::Serialize;

#[derive(Clone, Debug, Copy, ValueEnum)]
pub enum OutputFormat {
    Json,
    Table,
    Pretty,
    Raw,
}

impl OutputFormat {
    pub fn default_for_stdout() -> Self {
        if std::io::stdout().is_terminal() {
            Self::Table
        } else {
            Self::Json
        }
    }
}

/// How a piece of received text was framed.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Framing {
    Line,
    Bytes,
}

impl Framing {
    fn as_str(self) -> &'static str {
        match self {
            Framing::Line => "line",
            Framing::Bytes => "bytes",
        }
    }
}

/// One received line or byte-count record.
#[derive(Debug, Serialize)]
pub struct Received<'a> {
    pub framing: Framing,
    /// Encoded size in bytes, without the line terminator.
    pub size: usize,
    pub socket: &'a str,
    pub text: &'a str,
}

#[derive(Serialize)]
struct ReceivedOutput<'a> {
    #[serde(flatten)]
    received: &'a Received<'a>,
    timestamp: String,
}

pub fn print_received(received: &Received<'_>, format: OutputFormat) {
    match format {
        OutputFormat::Json => {
            let out = ReceivedOutput {
                received,
                timestamp: now_unix_seconds(),
            };
            println!(
                "{}",
                serde_json::to_string(&out).unwrap_or_else(|_| "{}".to_string())
            );
        }
        OutputFormat::Table => {
            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .set_content_arrangement(ContentArrangement::Dynamic)
                .set_header(vec!["FRAMING", "SIZE", "SOCKET", "TEXT"])
                .add_row(vec![
                    received.framing.as_str().to_string(),
                    received.size.to_string(),
                    received.socket.to_string(),
                    received.text.to_string(),
                ]);
            println!("{table}");
        }
        OutputFormat::Pretty => {
            println!(
                "{} size={} socket={} text={:?}",
                received.framing.as_str(),
                received.size,
                received.socket,
                received.text
            );
        }
        OutputFormat::Raw => match received.framing {
            Framing::Line => print_raw(format!("{}\n", received.text).as_bytes()),
            Framing::Bytes => print_raw(received.text.as_bytes()),
        },
    }
}

pub fn print_raw(data: &[u8]) {
    let mut out = std::io::stdout();
    let _ = out.write_all(data);
    let _ = out.flush();
}

fn now_unix_seconds() -> String {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs().to_string())
        .unwrap_or_else(|_| "0".to_string())
}
