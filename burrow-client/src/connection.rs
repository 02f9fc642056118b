use crate::channel::Channel;
use crate::client_error;
use crate::model::{ChannelNumber, ConnectionError, DEFAULT_CHANNEL_MAX};
use crate::transport::{Reply, Transport};
use anyhow::Result;
use burrow_codec::frame::{self, MethodFrameArgs};
use log::debug;
use std::collections::BTreeSet;
use std::sync::{Arc, Mutex, MutexGuard};

/// State shared by a connection handle and all of its channels.
pub(crate) struct Shared<T: Transport> {
    pub(crate) transport: T,
    open: Mutex<BTreeSet<ChannelNumber>>,
    channel_max: ChannelNumber,
}

impl<T: Transport> Shared<T> {
    fn open_set(&self) -> MutexGuard<'_, BTreeSet<ChannelNumber>> {
        self.open.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Give back a channel number, it is a no-op for a free number.
    pub(crate) fn release(&self, channel: ChannelNumber) {
        self.open_set().remove(&channel);
    }
}

/// Handle of an established connection.
///
/// Cloning gives another handle to the same connection. Every open channel keeps the
/// connection state alive, the transport goes away with the last handle or channel.
pub struct Connection<T: Transport> {
    shared: Arc<Shared<T>>,
}

impl<T: Transport> Clone for Connection<T> {
    fn clone(&self) -> Self {
        Self {
            shared: self.shared.clone(),
        }
    }
}

impl<T: Transport> Connection<T> {
    pub fn new(transport: T) -> Self {
        Self::with_channel_max(transport, DEFAULT_CHANNEL_MAX)
    }

    /// Limit the channel numbers to `1..=channel_max`, usually what the broker agreed to
    /// during tuning.
    pub fn with_channel_max(transport: T, channel_max: ChannelNumber) -> Self {
        Self {
            shared: Arc::new(Shared {
                transport,
                open: Mutex::new(BTreeSet::new()),
                channel_max,
            }),
        }
    }

    pub fn transport(&self) -> &T {
        &self.shared.transport
    }

    pub fn channel_max(&self) -> ChannelNumber {
        self.shared.channel_max
    }

    /// Numbers of the open channels in increasing order.
    pub fn open_channels(&self) -> Vec<ChannelNumber> {
        self.shared.open_set().iter().copied().collect()
    }

    /// Open a channel with the given number.
    pub async fn channel_open(&self, number: ChannelNumber) -> Result<Channel<T>> {
        if number == 0 || number > self.shared.channel_max {
            return client_error!(
                Validation,
                Some(number),
                ConnectionError::ChannelError as u16,
                format!("Channel number must be between 1 and {}", self.shared.channel_max),
                frame::CHANNEL_OPEN
            );
        }

        if !self.shared.open_set().insert(number) {
            return client_error!(
                Validation,
                Some(number),
                ConnectionError::ChannelError as u16,
                format!("Channel {} is already open", number),
                frame::CHANNEL_OPEN
            );
        }

        debug!("Open channel {}", number);

        let reply = match self.shared.transport.call(frame::channel_open(number)).await {
            Ok(reply) => reply,
            Err(e) => {
                self.shared.release(number);

                return Err(e);
            }
        };

        match reply {
            Reply::Normal(MethodFrameArgs::ChannelOpenOk) => Ok(Channel::new(number, self.shared.clone())),
            Reply::Normal(other) => {
                self.shared.release(number);

                client_error!(
                    Protocol,
                    Some(number),
                    ConnectionError::CommandInvalid as u16,
                    format!("Expected channel.open-ok but got {:?}", other),
                    frame::CHANNEL_OPEN
                )
            }
            Reply::Exception {
                code,
                text,
                class_method,
            } => {
                self.shared.release(number);

                client_error!(
                    Protocol,
                    Some(number),
                    code,
                    format!("Opening channel {} failed: {}", number, text),
                    class_method
                )
            }
        }
    }
}
