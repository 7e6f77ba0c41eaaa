use textsock_socket::StringSocketListener;

use crate::cmd::{install_ctrlc_handler, ListenArgs};
use crate::exit::{socket_error, CliResult, SUCCESS};
use crate::output::{print_received, Framing, OutputFormat, Received};

pub async fn run(args: ListenArgs, format: OutputFormat) -> CliResult<i32> {
    let config = args.socket.config()?;
    let listener = StringSocketListener::bind_with_config(&args.endpoint, config)
        .await
        .map_err(|err| socket_error("bind failed", err))?;
    tracing::info!(endpoint = %listener.local_endpoint(), "listening");

    let running = install_ctrlc_handler();
    let mut printed = 0usize;

    loop {
        let socket = tokio::select! {
            _ = running.cancelled() => return Ok(SUCCESS),
            accepted = listener.accept() => {
                accepted.map_err(|err| socket_error("accept failed", err))?
            }
        };

        loop {
            let line = tokio::select! {
                _ = running.cancelled() => {
                    socket.dispose();
                    return Ok(SUCCESS);
                }
                line = socket.recv_line() => line,
            };
            let Ok(line) = line else {
                tracing::debug!(socket = %socket.id(), "peer disconnected");
                break;
            };

            print_received(
                &Received {
                    framing: Framing::Line,
                    size: socket.encoding().encoded_len(&line),
                    socket: socket.id(),
                    text: &line,
                },
                format,
            );
            printed = printed.saturating_add(1);

            if let Some(count) = args.count {
                if printed >= count {
                    socket.dispose();
                    return Ok(SUCCESS);
                }
            }
        }
        socket.dispose();
    }
}
