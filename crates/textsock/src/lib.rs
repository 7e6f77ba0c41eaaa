//! Asynchronous string sockets over raw byte streams.
//!
//! textsock turns a connected TCP or Unix-domain stream into a queue of text
//! requests: send strings, receive newline-terminated lines, or receive
//! exactly N encoded bytes of text. Completions fire strictly in submission
//! order per direction.
//!
//! # Crate Structure
//!
//! - [`transport`]: TCP and Unix-domain listeners, streams and endpoints
//! - [`codec`]: text encodings, incremental decoding and the decoded buffer
//! - [`socket`]: the string socket, its listener and connector

/// Re-export transport types.
pub mod transport {
    pub use textsock_transport::*;
}

/// Re-export codec types.
pub mod codec {
    pub use textsock_codec::*;
}

/// Re-export socket types.
pub mod socket {
    pub use textsock_socket::*;
}

pub use textsock_socket::{
    connect, connect_with_config, SocketConfig, SocketError, StringSocket, StringSocketListener,
};
