use crate::client_error;
use crate::connection::Shared;
use crate::consumer::Consumer;
use crate::model::{ChannelNumber, ClassMethod, ConnectionError, REPLY_SUCCESS};
use crate::queue::Queue;
use crate::transport::{CloseReason, Reply, Transport};
use anyhow::Result;
use burrow_codec::frame::{self, AMQPFrame, BasicConsumeFlags, MethodFrameArgs, QueueDeclareFlags, QueueDeleteFlags};
use log::{debug, warn};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Options of `queue.declare`, all off by default.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct QueueDeclareOptions {
    /// Only check if the queue exists.
    pub passive: bool,
    pub durable: bool,
    pub exclusive: bool,
    pub auto_delete: bool,
}

impl QueueDeclareOptions {
    pub fn passive(mut self, mode: bool) -> Self {
        self.passive = mode;
        self
    }

    pub fn durable(mut self, mode: bool) -> Self {
        self.durable = mode;
        self
    }

    pub fn exclusive(mut self, mode: bool) -> Self {
        self.exclusive = mode;
        self
    }

    pub fn auto_delete(mut self, mode: bool) -> Self {
        self.auto_delete = mode;
        self
    }

    fn flags(&self) -> QueueDeclareFlags {
        let mut flags = QueueDeclareFlags::empty();

        flags.set(QueueDeclareFlags::PASSIVE, self.passive);
        flags.set(QueueDeclareFlags::DURABLE, self.durable);
        flags.set(QueueDeclareFlags::EXCLUSIVE, self.exclusive);
        flags.set(QueueDeclareFlags::AUTO_DELETE, self.auto_delete);
        flags
    }
}

/// Options of `queue.delete`, all off by default.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct QueueDeleteOptions {
    pub if_unused: bool,
    pub if_empty: bool,
}

impl QueueDeleteOptions {
    pub fn if_unused(mut self, mode: bool) -> Self {
        self.if_unused = mode;
        self
    }

    pub fn if_empty(mut self, mode: bool) -> Self {
        self.if_empty = mode;
        self
    }

    fn flags(&self) -> QueueDeleteFlags {
        let mut flags = QueueDeleteFlags::empty();

        flags.set(QueueDeleteFlags::IF_UNUSED, self.if_unused);
        flags.set(QueueDeleteFlags::IF_EMPTY, self.if_empty);
        flags
    }
}

/// Options of `basic.consume`, all off by default.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ConsumeOptions {
    pub no_local: bool,
    pub no_ack: bool,
    pub exclusive: bool,
}

impl ConsumeOptions {
    pub fn no_local(mut self, mode: bool) -> Self {
        self.no_local = mode;
        self
    }

    pub fn no_ack(mut self, mode: bool) -> Self {
        self.no_ack = mode;
        self
    }

    pub fn exclusive(mut self, mode: bool) -> Self {
        self.exclusive = mode;
        self
    }

    fn flags(&self) -> BasicConsumeFlags {
        let mut flags = BasicConsumeFlags::empty();

        flags.set(BasicConsumeFlags::NO_LOCAL, self.no_local);
        flags.set(BasicConsumeFlags::NO_ACK, self.no_ack);
        flags.set(BasicConsumeFlags::EXCLUSIVE, self.exclusive);
        flags
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ChannelState {
    Open,
    Consuming,
    Closed,
}

/// An open AMQP channel.
///
/// Commands wait for the reply of the broker. An exception reply closes the channel on the
/// broker side, after that every command fails without sending anything. Call `close` to see
/// the outcome of the close handshake, dropping an open channel closes it without waiting.
pub struct Channel<T: Transport> {
    number: ChannelNumber,
    shared: Arc<Shared<T>>,
    closed: AtomicBool,
    pub(crate) consuming: bool,
}

impl<T: Transport> Channel<T> {
    pub(crate) fn new(number: ChannelNumber, shared: Arc<Shared<T>>) -> Self {
        Self {
            number,
            shared,
            closed: AtomicBool::new(false),
            consuming: false,
        }
    }

    pub fn number(&self) -> ChannelNumber {
        self.number
    }

    pub fn state(&self) -> ChannelState {
        if self.closed.load(Ordering::SeqCst) || self.broker_close().is_some() {
            ChannelState::Closed
        } else if self.consuming {
            ChannelState::Consuming
        } else {
            ChannelState::Open
        }
    }

    pub(crate) fn transport(&self) -> &T {
        &self.shared.transport
    }

    /// Declare a queue with the given non-empty name.
    pub async fn queue_declare(&self, queue_name: &str) -> Result<Queue> {
        self.queue_declare_with_options(queue_name, QueueDeclareOptions::default())
            .await
    }

    pub async fn queue_declare_with_options(&self, queue_name: &str, options: QueueDeclareOptions) -> Result<Queue> {
        if queue_name.is_empty() {
            return client_error!(
                Validation,
                Some(self.number),
                ConnectionError::CommandInvalid as u16,
                "Queue name must not be empty, use queue_declare_anonymous for a server-named queue",
                frame::QUEUE_DECLARE
            );
        }

        self.declare(queue_name, options).await
    }

    /// Declare a queue named by the broker.
    pub async fn queue_declare_anonymous(&self, options: QueueDeclareOptions) -> Result<Queue> {
        self.declare("", options).await
    }

    async fn declare(&self, queue_name: &str, options: QueueDeclareOptions) -> Result<Queue> {
        let args = frame::QueueDeclareArgs::new(queue_name, options.flags());

        debug!("Channel {} declares queue {:?} {:?}", self.number, queue_name, options);

        let reply = self
            .command(args.frame(self.number), || format!("Declaring queue {:?} failed", queue_name))
            .await?;

        let declared = match reply {
            MethodFrameArgs::QueueDeclareOk(args) => args,
            other => return self.unexpected("queue.declare-ok", other, frame::QUEUE_DECLARE),
        };

        if queue_name.is_empty() {
            if declared.name.is_empty() {
                return client_error!(
                    Resource,
                    Some(self.number),
                    ConnectionError::ResourceError as u16,
                    "Broker did not assign a name to the queue",
                    frame::QUEUE_DECLARE
                );
            }

            debug!("Broker named the queue {:?}", declared.name);

            return Ok(Queue::new(declared.name, options));
        }

        if declared.name != queue_name {
            warn!("Queue {:?} was declared as {:?}", queue_name, declared.name);
        }

        Ok(Queue::new(queue_name.to_string(), options))
    }

    pub async fn queue_bind(&self, queue_name: &str, exchange_name: &str, routing_key: &str) -> Result<()> {
        self.require_queue_name(queue_name, frame::QUEUE_BIND)?;

        let f = frame::QueueBindArgs::new(queue_name, exchange_name, routing_key).bind_frame(self.number);

        debug!("Channel {} binds {:?} to {:?} with {:?}", self.number, queue_name, exchange_name, routing_key);

        match self
            .command(f, || {
                format!(
                    "Binding queue {:?} to exchange {:?} with routing key {:?} failed",
                    queue_name, exchange_name, routing_key
                )
            })
            .await?
        {
            MethodFrameArgs::QueueBindOk => Ok(()),
            other => self.unexpected("queue.bind-ok", other, frame::QUEUE_BIND),
        }
    }

    pub async fn queue_unbind(&self, queue_name: &str, exchange_name: &str, routing_key: &str) -> Result<()> {
        self.require_queue_name(queue_name, frame::QUEUE_UNBIND)?;

        let f = frame::QueueBindArgs::new(queue_name, exchange_name, routing_key).unbind_frame(self.number);

        debug!("Channel {} unbinds {:?} from {:?} with {:?}", self.number, queue_name, exchange_name, routing_key);

        match self
            .command(f, || {
                format!(
                    "Unbinding queue {:?} from exchange {:?} with routing key {:?} failed",
                    queue_name, exchange_name, routing_key
                )
            })
            .await?
        {
            MethodFrameArgs::QueueUnbindOk => Ok(()),
            other => self.unexpected("queue.unbind-ok", other, frame::QUEUE_UNBIND),
        }
    }

    /// Delete the queue, returns the number of messages deleted with it.
    pub async fn queue_delete(&self, queue: &Queue) -> Result<u32> {
        self.queue_delete_with_options(queue, QueueDeleteOptions::default())
            .await
    }

    pub async fn queue_delete_with_options(&self, queue: &Queue, options: QueueDeleteOptions) -> Result<u32> {
        self.require_queue_name(queue.name(), frame::QUEUE_DELETE)?;

        let f = frame::QueueDeleteArgs::new(queue.name(), options.flags()).frame(self.number);

        debug!("Channel {} deletes queue {:?} {:?}", self.number, queue.name(), options);

        match self
            .command(f, || format!("Deleting queue {:?} failed", queue.name()))
            .await?
        {
            MethodFrameArgs::QueueDeleteOk { message_count } => Ok(message_count),
            other => self.unexpected("queue.delete-ok", other, frame::QUEUE_DELETE),
        }
    }

    /// Consume the queue until the stream of deliveries ends, notifying the observers of the
    /// queue with each message.
    pub async fn basic_consume(&mut self, queue: &mut Queue) -> Result<()> {
        self.basic_consume_with_options(queue, ConsumeOptions::default())
            .await
    }

    pub async fn basic_consume_with_options(&mut self, queue: &mut Queue, options: ConsumeOptions) -> Result<()> {
        let mut consumer = self.start_consuming(queue, options).await?;

        consumer.run().await?;

        Ok(())
    }

    /// Start a consume on the queue and give back the session handle. The channel cannot be
    /// used for anything else while the consumer lives.
    pub async fn start_consuming<'a>(
        &'a mut self,
        queue: &'a mut Queue,
        options: ConsumeOptions,
    ) -> Result<Consumer<'a, T>> {
        self.require_queue_name(queue.name(), frame::BASIC_CONSUME)?;

        if queue.consumer_tag().is_empty() {
            queue.set_consumer_tag(format!("burrow-{}", rand::random::<u128>()));
        }

        let f = frame::BasicConsumeArgs::new(queue.name(), queue.consumer_tag(), options.flags()).frame(self.number);

        debug!("Channel {} consumes {:?} as {:?} {:?}", self.number, queue.name(), queue.consumer_tag(), options);

        let reply = self
            .command(f, || format!("Consuming queue {:?} failed", queue.name()))
            .await?;

        match reply {
            MethodFrameArgs::BasicConsumeOk { consumer_tag } => {
                if !consumer_tag.is_empty() {
                    queue.set_consumer_tag(consumer_tag);
                }
            }
            other => return self.unexpected("basic.consume-ok", other, frame::BASIC_CONSUME),
        }

        self.consuming = true;

        Ok(Consumer::new(self, queue))
    }

    /// Close the channel and wait for the broker to confirm it.
    pub async fn close(self) -> Result<()> {
        if self.closed.load(Ordering::SeqCst) || self.broker_close().is_some() {
            debug!("Channel {} is already closed by the broker", self.number);

            return Ok(());
        }

        debug!("Close channel {}", self.number);

        let result = self
            .shared
            .transport
            .call(frame::channel_close(self.number, REPLY_SUCCESS, "Normal close", 0))
            .await;

        self.mark_closed();

        match result? {
            Reply::Normal(MethodFrameArgs::ChannelCloseOk) => Ok(()),
            Reply::Normal(other) => self.unexpected("channel.close-ok", other, frame::CHANNEL_CLOSE),
            Reply::Exception {
                code,
                text,
                class_method,
            } => client_error!(
                Protocol,
                Some(self.number),
                code,
                format!("Closing channel {} failed: {}", self.number, text),
                class_method
            ),
        }
    }

    /// Send a synchronous method and give back the arguments of a normal reply.
    async fn command<F>(&self, f: AMQPFrame, describe: F) -> Result<MethodFrameArgs>
    where
        F: FnOnce() -> String,
    {
        if let Some(reason) = self.broker_close() {
            return client_error!(
                Validation,
                Some(self.number),
                reason.code,
                format!("Channel {} was closed by the broker: {}", self.number, reason.text),
                reason.class_method
            );
        }

        if self.closed.load(Ordering::SeqCst) {
            return client_error!(
                Validation,
                Some(self.number),
                ConnectionError::ChannelError as u16,
                format!("Channel {} is closed", self.number),
                0
            );
        }

        match self.shared.transport.call(f).await? {
            Reply::Normal(args) => Ok(args),
            Reply::Exception {
                code,
                text,
                class_method,
            } => {
                warn!("Channel {} got exception {} {}", self.number, code, text);

                self.mark_closed();

                client_error!(
                    Protocol,
                    Some(self.number),
                    code,
                    format!("{}: {}", describe(), text),
                    class_method
                )
            }
        }
    }

    fn mark_closed(&self) {
        self.closed.store(true, Ordering::SeqCst);
        self.shared.release(self.number);
    }

    /// Notice a close of the broker which came outside of a command, the channel is marked
    /// closed the first time it is seen.
    pub(crate) fn broker_close(&self) -> Option<CloseReason> {
        if self.closed.load(Ordering::SeqCst) {
            return None;
        }

        let reason = self.shared.transport.closed_by_broker(self.number)?;

        warn!("Channel {} was closed by the broker {} {}", self.number, reason.code, reason.text);

        self.mark_closed();

        Some(reason)
    }

    fn require_queue_name(&self, queue_name: &str, cm: ClassMethod) -> Result<()> {
        if queue_name.is_empty() {
            return client_error!(
                Validation,
                Some(self.number),
                ConnectionError::CommandInvalid as u16,
                "Queue name must not be empty",
                cm
            );
        }

        Ok(())
    }

    fn unexpected<R>(&self, expected: &str, got: MethodFrameArgs, cm: ClassMethod) -> Result<R> {
        client_error!(
            Protocol,
            Some(self.number),
            ConnectionError::CommandInvalid as u16,
            format!("Expected {} but got {:?}", expected, got),
            cm
        )
    }
}

impl<T: Transport> Drop for Channel<T> {
    fn drop(&mut self) {
        if self.closed.load(Ordering::SeqCst) || self.broker_close().is_some() {
            return;
        }

        warn!("Channel {} dropped without close", self.number);

        self.shared.transport.abandon(self.number);
        self.shared.release(self.number);
    }
}
