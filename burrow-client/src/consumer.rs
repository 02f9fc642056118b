use crate::channel::Channel;
use crate::client_error;
use crate::message::Message;
use crate::queue::Queue;
use crate::reassembler;
use crate::transport::Transport;
use anyhow::Result;
use burrow_codec::frame::{self, AMQPFrame, MethodFrameArgs};
use log::{debug, trace};

/// What the consumer has to say after a wait.
#[derive(Debug)]
pub enum ConsumerSignal {
    Delivered(Message),
    /// The stream of deliveries has ended, nothing else will come.
    Stopped,
}

/// A running consume of a queue on a channel.
///
/// The consumer holds the channel exclusively, so no command can interleave with the
/// deliveries. Dropping it gives the channel back, a consume which has not ended yet is
/// cancelled without waiting for the broker.
pub struct Consumer<'a, T: Transport> {
    channel: &'a mut Channel<T>,
    queue: &'a mut Queue,
    stopped: bool,
}

impl<'a, T: Transport> Consumer<'a, T> {
    pub(crate) fn new(channel: &'a mut Channel<T>, queue: &'a mut Queue) -> Self {
        Self {
            channel,
            queue,
            stopped: false,
        }
    }

    pub fn channel(&self) -> &Channel<T> {
        &*self.channel
    }

    pub fn queue(&self) -> &Queue {
        &*self.queue
    }

    /// Observers can be changed between deliveries.
    pub fn queue_mut(&mut self) -> &mut Queue {
        &mut *self.queue
    }

    /// Wait for the next delivered message.
    pub async fn next(&mut self) -> Result<ConsumerSignal> {
        if self.stopped {
            return Ok(ConsumerSignal::Stopped);
        }

        let number = self.channel.number();

        match reassembler::next_message(self.channel.transport(), number).await {
            Ok(Some(message)) => Ok(ConsumerSignal::Delivered(message)),
            Ok(None) => {
                debug!("Consume of {:?} on channel {} stopped", self.queue.name(), number);

                self.stopped = true;

                Ok(ConsumerSignal::Stopped)
            }
            Err(e) => {
                self.stopped = true;

                match self.channel.broker_close() {
                    Some(reason) => client_error!(
                        Protocol,
                        Some(number),
                        reason.code,
                        format!(
                            "Consume of {:?} ended, the broker closed channel {}: {}",
                            self.queue.name(),
                            number,
                            reason.text
                        ),
                        reason.class_method
                    ),
                    None => Err(e),
                }
            }
        }
    }

    /// Hand every message to the observers of the queue until the stream ends.
    pub async fn run(&mut self) -> Result<()> {
        loop {
            match self.next().await? {
                ConsumerSignal::Delivered(message) => {
                    trace!("Notify observers of {:?} with {} bytes", self.queue.name(), message.len());

                    self.queue.notify(&message);
                }
                ConsumerSignal::Stopped => return Ok(()),
            }
        }
    }

    /// Cancel the consume, deliveries still in flight are dropped.
    pub async fn cancel(mut self) -> Result<()> {
        let number = self.channel.number();
        let tag = self.queue.consumer_tag().to_string();

        debug!("Cancel consumer {:?} on channel {}", tag, number);

        self.stopped = true;
        self.channel
            .transport()
            .send(frame::basic_cancel(number, &tag))
            .await?;

        loop {
            match self.channel.transport().wait_frame(number).await? {
                AMQPFrame::Method(_, frame::BASIC_CANCEL_OK, _) => {
                    self.queue.set_consumer_tag(String::new());

                    return Ok(());
                }
                AMQPFrame::Method(_, frame::CHANNEL_CLOSE, MethodFrameArgs::ChannelClose(args)) => {
                    return client_error!(
                        Protocol,
                        Some(number),
                        args.code,
                        format!("Cancelling consumer {:?} failed: {}", tag, args.text),
                        args.class_method
                    );
                }
                other => {
                    trace!("Discard {:?} while cancelling", other);
                }
            }
        }
    }
}

impl<'a, T: Transport> Drop for Consumer<'a, T> {
    fn drop(&mut self) {
        if !self.stopped {
            self.channel
                .transport()
                .abandon_consumer(self.channel.number(), self.queue.consumer_tag());
        }

        self.channel.consuming = false;
    }
}
