//! Network Layer: Framed TCP Transport
//!
//! Blocking I/O per connection, dengan satu dedicated sender thread per
//! client supaya producer tidak pernah menunggu network.
//!
//! Fitur:
//! - Length-prefixed frames (`[i32 BE len][payload]`)
//! - Outbound FIFO queue + send loop dengan error callback
//! - Listener dengan accept yang bisa di-timeout (mio)

mod client;
mod connection;
mod listener;
mod outbound;

pub use client::{Client, ClientConfig};
pub use connection::{
    Connection, ConnectionConfig, ConnectionNamer, DEFAULT_MAX_FRAME_LEN, DEFAULT_SOCKET_BUFFER, HEADER_SIZE,
};
pub use listener::{Listener, ListenerConfig};
pub use outbound::{
    ErrorHandler, OutboundQueue, PendingMessage, SendLoop, SendLoopConfig, SendLoopHandle, DEFAULT_POLL_TIMEOUT,
};
