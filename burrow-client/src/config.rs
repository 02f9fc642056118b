use std::time::Duration;

/// Tunables of the framed transport.
#[derive(Clone, Debug)]
pub struct TransportOptions {
    /// How long a frame may wait for room in the outgoing queue.
    pub send_timeout: Duration,
    /// Capacity of the outgoing frame queue.
    pub outgoing_buffer: usize,
}

impl Default for TransportOptions {
    fn default() -> Self {
        Self {
            send_timeout: Duration::from_secs(1),
            outgoing_buffer: 16,
        }
    }
}

impl TransportOptions {
    pub fn send_timeout(mut self, timeout: Duration) -> Self {
        self.send_timeout = timeout;
        self
    }

    pub fn outgoing_buffer(mut self, size: usize) -> Self {
        self.outgoing_buffer = size.max(1);
        self
    }
}
