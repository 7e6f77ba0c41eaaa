//! Asynchronous string sockets.
//!
//! A [`StringSocket`] wraps a connected byte stream and exchanges text with
//! the peer: sends are strings, receives are either newline-terminated lines
//! or exactly N encoded bytes of text. Both directions are queued and
//! complete strictly in submission order through callbacks, with
//! future-returning helpers layered on top.

mod completion;
pub mod config;
pub mod connector;
pub mod error;
pub mod listener;
mod receive;
mod request;
mod send;
pub mod socket;

pub use config::{SocketConfig, DEFAULT_READ_BUFFER_SIZE};
pub use connector::{connect, connect_with_config};
pub use error::{Result, SocketError};
pub use listener::StringSocketListener;
pub use socket::StringSocket;
