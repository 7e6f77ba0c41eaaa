//! Minimal echo server: accepts one connection and echoes lines back.
//!
//! Run with:
//!   cargo run --example echo-server
//!
//! In another terminal:
//!   cargo run -- send 127.0.0.1:7878 --data hello --wait-lines 1

use textsock::socket::StringSocketListener;
use textsock::transport::Endpoint;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let endpoint: Endpoint = "127.0.0.1:7878".parse()?;
    let listener = StringSocketListener::bind(&endpoint).await?;
    eprintln!("Listening on {}", listener.local_endpoint());

    // Accept one connection and echo lines until disconnect.
    let socket = listener.accept().await?;
    eprintln!("Connected: {}", socket.id());

    loop {
        match socket.recv_line().await {
            Ok(line) => {
                eprintln!("Received {line:?}");
                socket.send(format!("{line}\n")).await?;
            }
            Err(e) => {
                eprintln!("Disconnected: {e}");
                break;
            }
        }
    }

    socket.dispose();
    Ok(())
}
