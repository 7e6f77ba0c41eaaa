use textsock_socket::{StringSocket, StringSocketListener};
use tokio_util::sync::CancellationToken;

use crate::cmd::{install_ctrlc_handler, EchoArgs};
use crate::exit::{socket_error, CliResult, SUCCESS};
use crate::output::OutputFormat;

pub async fn run(args: EchoArgs, _format: OutputFormat) -> CliResult<i32> {
    let config = args.socket.config()?;
    let listener = StringSocketListener::bind_with_config(&args.endpoint, config)
        .await
        .map_err(|err| socket_error("bind failed", err))?;
    tracing::info!(endpoint = %listener.local_endpoint(), "echo server listening");

    let running = install_ctrlc_handler();

    loop {
        let socket = tokio::select! {
            _ = running.cancelled() => break,
            accepted = listener.accept() => {
                accepted.map_err(|err| socket_error("accept failed", err))?
            }
        };
        tokio::spawn(serve(socket, running.clone()));
    }

    Ok(SUCCESS)
}

/// Echo lines back on one connection until the peer leaves or `running`
/// is cancelled.
async fn serve(socket: StringSocket, running: CancellationToken) {
    loop {
        let line = tokio::select! {
            _ = running.cancelled() => break,
            line = socket.recv_line() => line,
        };
        let Ok(line) = line else {
            tracing::debug!(socket = %socket.id(), "peer disconnected");
            break;
        };

        tracing::info!(socket = %socket.id(), size = line.len(), "echoing line");
        if let Err(err) = socket.send(format!("{line}\n")).await {
            tracing::warn!(socket = %socket.id(), error = %err, "echo send failed");
            break;
        }
    }
    socket.dispose();
}
