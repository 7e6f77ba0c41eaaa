use std::fs;
use std::time::Duration;

use textsock_codec::{DecodedText, Encoding};
use textsock_socket::{connect_with_config, StringSocket};

use crate::cmd::SendArgs;
use crate::exit::{io_error, socket_error, CliError, CliResult, DATA_INVALID, SUCCESS, TIMEOUT, USAGE};
use crate::output::{print_received, Framing, OutputFormat, Received};

pub async fn run(args: SendArgs, format: OutputFormat) -> CliResult<i32> {
    let config = args.socket.config()?;
    let wait_timeout = parse_duration(&args.wait_timeout)?;
    let payloads = resolve_payloads(&args, &*config.encoding)?;

    let socket = connect_with_config(&args.endpoint, config)
        .await
        .map_err(|err| socket_error("connect failed", err))?;

    for payload in payloads {
        socket
            .send(payload)
            .await
            .map_err(|err| socket_error("send failed", err))?;
    }

    if args.wait_lines > 0 || args.wait_bytes > 0 {
        let waited = tokio::time::timeout(
            wait_timeout,
            print_responses(&socket, args.wait_lines, args.wait_bytes, format),
        )
        .await;
        match waited {
            Ok(result) => result?,
            Err(_) => {
                socket.dispose();
                return Err(CliError::new(
                    TIMEOUT,
                    format!("no response within {}", args.wait_timeout),
                ));
            }
        }
    }

    socket.dispose();
    Ok(SUCCESS)
}

/// Each `--data` value becomes one line; a file is decoded with the socket
/// encoding and sent as-is.
fn resolve_payloads(args: &SendArgs, encoding: &dyn Encoding) -> CliResult<Vec<String>> {
    if let Some(path) = &args.file {
        let bytes = fs::read(path)
            .map_err(|err| io_error(&format!("failed reading {}", path.display()), err))?;
        let mut decoded = DecodedText::default();
        encoding.new_decoder().decode(&bytes, true, &mut decoded);
        if let Some(&(offset, _)) = decoded.substitutions.first() {
            return Err(CliError::new(
                DATA_INVALID,
                format!(
                    "{} is not valid {} (first bad character at text offset {offset})",
                    path.display(),
                    encoding.name()
                ),
            ));
        }
        return Ok(vec![decoded.text]);
    }
    Ok(args.data.iter().map(|data| format!("{data}\n")).collect())
}

async fn print_responses(
    socket: &StringSocket,
    lines: usize,
    bytes: usize,
    format: OutputFormat,
) -> CliResult<()> {
    for _ in 0..lines {
        let line = socket
            .recv_line()
            .await
            .map_err(|err| socket_error("receive failed", err))?;
        print_received(
            &Received {
                framing: Framing::Line,
                size: socket.encoding().encoded_len(&line),
                socket: socket.id(),
                text: &line,
            },
            format,
        );
    }
    if bytes > 0 {
        let text = socket
            .recv_bytes(bytes)
            .await
            .map_err(|err| socket_error("receive failed", err))?;
        print_received(
            &Received {
                framing: Framing::Bytes,
                size: socket.encoding().encoded_len(&text),
                socket: socket.id(),
                text: &text,
            },
            format,
        );
    }
    Ok(())
}

fn parse_duration(input: &str) -> CliResult<Duration> {
    let input = input.trim();
    if input.is_empty() {
        return Err(CliError::new(USAGE, "duration must not be empty"));
    }

    let (number, unit) = if let Some(num) = input.strip_suffix("ms") {
        (num, "ms")
    } else if let Some(num) = input.strip_suffix('s') {
        (num, "s")
    } else {
        (input, "s")
    };

    let value: u64 = number
        .parse()
        .map_err(|_| CliError::new(USAGE, format!("invalid duration value: {input}")))?;

    if value == 0 {
        return Err(CliError::new(USAGE, "duration must be greater than zero"));
    }

    match unit {
        "ms" => Ok(Duration::from_millis(value)),
        _ => Ok(Duration::from_secs(value)),
    }
}
