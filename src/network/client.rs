//! Client: connection + outbound queue + send loop dalam satu paket
//!
//! Write lewat queue (non-blocking untuk producer), read langsung lewat
//! receive primitive connection di thread caller.

use std::net::ToSocketAddrs;
use std::sync::Arc;

use super::connection::{Connection, ConnectionConfig, ConnectionNamer};
use super::outbound::{OutboundQueue, PendingMessage, SendLoop, SendLoopConfig, SendLoopHandle};
use crate::error::{Result, TransportError};
use crate::protocol::{TypeDescriptor, Value, WireCodec};

/// Client configuration
#[derive(Debug, Clone, Default)]
pub struct ClientConfig {
    pub connection: ConnectionConfig,
    pub send_loop: SendLoopConfig,
}

/// Connection dengan dedicated sender thread
#[derive(Debug)]
pub struct Client {
    connection: Arc<Connection>,
    queue: Arc<OutboundQueue>,
    sender: SendLoopHandle,
    default_label: String,
}

impl Client {
    /// Connect dengan nama dari `namer`
    pub fn connect<A: ToSocketAddrs>(addr: A, namer: &ConnectionNamer, config: ClientConfig) -> std::io::Result<Self> {
        Self::connect_named(addr, namer.next_name(), config)
    }

    pub fn connect_named<A: ToSocketAddrs>(
        addr: A,
        name: impl Into<String>,
        config: ClientConfig,
    ) -> std::io::Result<Self> {
        let connection = Connection::connect(addr, name, config.connection)?;
        Self::start(connection, config.send_loop)
    }

    /// Mulai send loop untuk connection yang sudah ada
    pub fn start(connection: Connection, config: SendLoopConfig) -> std::io::Result<Self> {
        let connection = Arc::new(connection);
        let queue = Arc::new(OutboundQueue::new());
        let send_loop = SendLoop::new(Arc::clone(&connection), Arc::clone(&queue), config);
        Self::spawn(connection, queue, send_loop)
    }

    /// Seperti `start`, dengan reporter sendiri untuk send failure
    pub fn start_with_handler<F>(connection: Connection, config: SendLoopConfig, on_error: F) -> std::io::Result<Self>
    where
        F: FnMut(TransportError) + Send + 'static,
    {
        let connection = Arc::new(connection);
        let queue = Arc::new(OutboundQueue::new());
        let send_loop = SendLoop::new(Arc::clone(&connection), Arc::clone(&queue), config).on_error(on_error);
        Self::spawn(connection, queue, send_loop)
    }

    fn spawn(connection: Arc<Connection>, queue: Arc<OutboundQueue>, send_loop: SendLoop) -> std::io::Result<Self> {
        let default_label = format!(
            "error while attempting to send a message on {}",
            connection.name()
        );
        let sender = send_loop.spawn()?;
        Ok(Self {
            connection,
            queue,
            sender,
            default_label,
        })
    }

    pub fn name(&self) -> &str {
        self.connection.name()
    }

    pub fn connection(&self) -> &Arc<Connection> {
        &self.connection
    }

    /// Message yang belum dikirim
    pub fn pending(&self) -> usize {
        self.queue.len()
    }

    /// Message yang sudah dikirim oleh send loop
    pub fn sent(&self) -> u64 {
        self.sender.sent()
    }

    pub fn is_alive(&self) -> bool {
        self.sender.is_running() && !self.connection.is_closed()
    }

    /// Queue raw bytes dengan label default
    pub fn send(&self, payload: Vec<u8>) {
        self.queue.push(PendingMessage {
            payload,
            error_label: self.default_label.clone(),
        });
    }

    /// Queue raw bytes dengan label sendiri (tidak boleh kosong)
    pub fn send_labeled(&self, payload: Vec<u8>, error_label: impl Into<String>) -> Result<(), TransportError> {
        self.queue.enqueue(payload, error_label)
    }

    /// Queue satu frame `[len][payload]` sebagai satu unit
    pub fn send_framed(&self, payload: &[u8]) -> Result<(), TransportError> {
        let len = i32::try_from(payload.len()).map_err(|_| TransportError::FrameTooLarge {
            len: payload.len() as i64,
            max: i32::MAX as usize,
        })?;
        let mut frame = Vec::with_capacity(4 + payload.len());
        frame.extend_from_slice(&len.to_be_bytes());
        frame.extend_from_slice(payload);
        self.send(frame);
        Ok(())
    }

    /// Encode `value` sebagai frame lalu queue
    pub fn send_value(&self, codec: &WireCodec, value: &Value, descriptor: &TypeDescriptor) -> Result<()> {
        let frame = codec.encode_framed(value, descriptor)?;
        self.send(frame);
        Ok(())
    }

    /// Blocking read satu frame
    pub fn receive_framed(&self) -> Result<Vec<u8>, TransportError> {
        self.connection.receive_framed()
    }

    /// Blocking read satu frame lalu decode
    pub fn receive_value(&self, codec: &WireCodec, descriptor: &TypeDescriptor) -> Result<Value> {
        let payload = self.connection.receive_framed()?;
        Ok(codec.decode_exact(&payload, descriptor)?)
    }

    /// Stop send loop, join, lalu tutup connection
    ///
    /// Loop hanya berhenti di outer check point: dengan
    /// `check_after_each_message = false` sisa queue di-drain dulu.
    /// Returns total message terkirim.
    pub fn shutdown(self) -> u64 {
        let Self {
            connection, sender, ..
        } = self;
        let sent = sender.shutdown();
        connection.close();
        sent
    }
}
