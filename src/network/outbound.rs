//! Outbound queue + dedicated send loop
//!
//! Producer cukup `enqueue` lalu lanjut; satu worker thread per connection
//! men-drain queue ke socket. Urutan kirim = urutan enqueue (FIFO), tanpa
//! coalescing.
//!
//! Queue lock TIDAK dipegang selama write, jadi producer tidak pernah
//! menunggu network.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Condvar, Mutex, MutexGuard};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use super::connection::Connection;
use crate::error::TransportError;

/// Default wait per putaran send loop
pub const DEFAULT_POLL_TIMEOUT: Duration = Duration::from_secs(2);

/// Satu message yang menunggu dikirim
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingMessage {
    pub payload: Vec<u8>,
    /// Label yang dipakai jika pengiriman gagal
    pub error_label: String,
}

/// FIFO queue dengan satu permit per item
#[derive(Debug, Default)]
pub struct OutboundQueue {
    messages: Mutex<VecDeque<PendingMessage>>,
    available: Condvar,
}

impl OutboundQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append message lalu bangunkan sender
    pub fn enqueue(&self, payload: Vec<u8>, error_label: impl Into<String>) -> Result<(), TransportError> {
        let error_label = error_label.into();
        if error_label.is_empty() {
            return Err(TransportError::InvalidArgument("error label must not be empty"));
        }
        self.push(PendingMessage { payload, error_label });
        Ok(())
    }

    pub(crate) fn push(&self, message: PendingMessage) {
        self.lock().push_back(message);
        self.available.notify_one();
    }

    /// Tunggu sampai ada message, maksimal `timeout`
    ///
    /// Returns `None` jika timeout habis tanpa message.
    pub fn pop_timeout(&self, timeout: Duration) -> Option<PendingMessage> {
        let guard = self.lock();
        let (mut guard, _) = self
            .available
            .wait_timeout_while(guard, timeout, |queue| queue.is_empty())
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        guard.pop_front()
    }

    /// Ambil message berikutnya tanpa menunggu
    pub fn try_pop(&self) -> Option<PendingMessage> {
        self.lock().pop_front()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    fn lock(&self) -> MutexGuard<'_, VecDeque<PendingMessage>> {
        self.messages.lock().unwrap_or_else(|poisoned| {
            log::warn!("outbound queue lock poisoned, recovering");
            poisoned.into_inner()
        })
    }
}

/// Send loop configuration
#[derive(Debug, Clone)]
pub struct SendLoopConfig {
    /// Berapa lama menunggu message sebelum cek shutdown flag lagi
    pub poll_timeout: Duration,
    /// `true`: cek shutdown flag setelah setiap message.
    /// `false`: cek hanya setelah queue kosong.
    pub check_after_each_message: bool,
}

impl Default for SendLoopConfig {
    fn default() -> Self {
        Self {
            poll_timeout: DEFAULT_POLL_TIMEOUT,
            check_after_each_message: false,
        }
    }
}

impl SendLoopConfig {
    pub fn poll_timeout(mut self, timeout: Duration) -> Self {
        self.poll_timeout = timeout;
        self
    }

    pub fn check_after_each_message(mut self, check: bool) -> Self {
        self.check_after_each_message = check;
        self
    }
}

/// Callback untuk setiap send failure
pub type ErrorHandler = Box<dyn FnMut(TransportError) + Send>;

/// Worker yang men-drain `OutboundQueue` ke `Connection`
pub struct SendLoop {
    connection: Arc<Connection>,
    queue: Arc<OutboundQueue>,
    running: Arc<AtomicBool>,
    sent: Arc<AtomicU64>,
    config: SendLoopConfig,
    on_error: ErrorHandler,
}

impl SendLoop {
    pub fn new(connection: Arc<Connection>, queue: Arc<OutboundQueue>, config: SendLoopConfig) -> Self {
        let name = connection.name().to_owned();
        Self {
            connection,
            queue,
            running: Arc::new(AtomicBool::new(true)),
            sent: Arc::new(AtomicU64::new(0)),
            config,
            on_error: Box::new(move |err| {
                log::warn!("send loop `{}`: {}", name, err);
            }),
        }
    }

    /// Ganti reporter untuk send failure (default: `log::warn!`)
    pub fn on_error<F>(mut self, handler: F) -> Self
    where
        F: FnMut(TransportError) + Send + 'static,
    {
        self.on_error = Box::new(handler);
        self
    }

    /// Flag yang menghentikan loop saat di-set `false`
    pub fn running_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.running)
    }

    /// Jalankan loop di thread saat ini sampai `running == false`
    ///
    /// Returns jumlah message yang berhasil dikirim.
    pub fn run(mut self) -> u64 {
        log::debug!("send loop `{}` started", self.connection.name());

        loop {
            // === inner loop: kirim sampai queue kosong (atau per message) ===
            loop {
                if let Some(message) = self.queue.pop_timeout(self.config.poll_timeout) {
                    self.send(message);
                }
                if self.config.check_after_each_message || self.queue.is_empty() {
                    break;
                }
            }

            // === outer check point ===
            if !self.running.load(Ordering::Acquire) {
                break;
            }
        }

        let sent = self.sent.load(Ordering::Relaxed);
        log::debug!(
            "send loop `{}` stopped after {} messages ({} still queued)",
            self.connection.name(),
            sent,
            self.queue.len()
        );
        sent
    }

    fn send(&mut self, message: PendingMessage) {
        match self.connection.send_bytes(&message.payload) {
            Ok(()) => {
                self.sent.fetch_add(1, Ordering::Relaxed);
            }
            Err(cause) => {
                (self.on_error)(TransportError::SendFailed {
                    label: message.error_label,
                    cause: Box::new(cause),
                });
            }
        }
    }

    /// Jalankan loop di thread baru
    pub fn spawn(self) -> std::io::Result<SendLoopHandle> {
        let running = self.running_flag();
        let sent = Arc::clone(&self.sent);
        let name = format!("send-loop-{}", self.connection.name());
        let thread = thread::Builder::new().name(name).spawn(move || self.run())?;

        Ok(SendLoopHandle {
            running,
            sent,
            thread: Some(thread),
        })
    }
}

/// Handle untuk send loop yang berjalan di thread sendiri
#[derive(Debug)]
pub struct SendLoopHandle {
    running: Arc<AtomicBool>,
    sent: Arc<AtomicU64>,
    thread: Option<JoinHandle<u64>>,
}

impl SendLoopHandle {
    /// Jumlah message terkirim sejauh ini
    pub fn sent(&self) -> u64 {
        self.sent.load(Ordering::Relaxed)
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    /// Minta loop berhenti. Tidak menyela wait atau write yang sedang jalan.
    pub fn stop(&self) {
        self.running.store(false, Ordering::Release);
    }

    /// Stop lalu join worker; returns total message terkirim
    pub fn shutdown(mut self) -> u64 {
        self.stop();
        self.join()
    }

    fn join(&mut self) -> u64 {
        match self.thread.take().map(JoinHandle::join) {
            Some(Ok(sent)) => sent,
            Some(Err(_)) => {
                log::warn!("send loop thread panicked");
                self.sent()
            }
            None => self.sent(),
        }
    }
}

impl Drop for SendLoopHandle {
    fn drop(&mut self) {
        self.stop();
        self.join();
    }
}
