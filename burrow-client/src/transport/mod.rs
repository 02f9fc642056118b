//! The frame level collaborator of channels.
//!
//! A [`Transport`] sends frames on behalf of channels, pairs synchronous methods with their
//! replies and hands out the incoming frames of a channel one by one.
mod framed;

pub use framed::FramedTransport;

use crate::model::{ChannelNumber, ClassMethod};
use anyhow::Result;
use burrow_codec::frame::{AMQPFrame, CloseArgs, MethodFrameArgs};
use std::future::Future;

/// Outcome of a synchronous method call.
#[derive(Debug)]
pub enum Reply {
    /// The broker answered with the arguments of the reply method.
    Normal(MethodFrameArgs),
    /// The broker closed the channel or the connection instead of answering.
    Exception {
        code: u16,
        text: String,
        class_method: ClassMethod,
    },
}

impl Reply {
    pub fn is_normal(&self) -> bool {
        matches!(self, Reply::Normal(_))
    }

    /// Turn a `channel.close` of the broker into an exception reply.
    pub(crate) fn from_close(args: &MethodFrameArgs) -> Option<Reply> {
        match args {
            MethodFrameArgs::ChannelClose(ca) => Some(CloseReason::from_args(ca).to_reply()),
            _ => None,
        }
    }
}

/// Code and text the broker closed a channel or the connection with.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CloseReason {
    pub code: u16,
    pub text: String,
    /// The method which caused the close, 0 if none.
    pub class_method: ClassMethod,
}

impl CloseReason {
    pub(crate) fn from_args(args: &CloseArgs) -> Self {
        Self {
            code: args.code,
            text: args.text.clone(),
            class_method: args.class_method,
        }
    }

    pub(crate) fn to_reply(&self) -> Reply {
        Reply::Exception {
            code: self.code,
            text: self.text.clone(),
            class_method: self.class_method,
        }
    }
}

/// Frame exchange on a shared connection, multiplexed by channel number.
///
/// Implementations must be shareable between the channels of a connection. Frames handed out
/// by `wait_frame` belong to the channel the wait was issued for and keep their arrival order.
pub trait Transport: Send + Sync + 'static {
    /// Send a synchronous method frame and wait for the reply on the same channel.
    ///
    /// Sending `channel.open` makes the transport start collecting frames for that channel.
    fn call(&self, frame: AMQPFrame) -> impl Future<Output = Result<Reply>> + Send;

    /// Send a frame without waiting for anything.
    fn send(&self, frame: AMQPFrame) -> impl Future<Output = Result<()>> + Send;

    /// Wait for the next frame of a channel.
    fn wait_frame(&self, channel: ChannelNumber) -> impl Future<Output = Result<AMQPFrame>> + Send;

    /// Give back whatever memory the transport keeps for a channel. It must not block.
    fn release_buffers(&self, _channel: ChannelNumber) {}

    /// Close a channel without waiting for the broker, used when a channel is dropped.
    ///
    /// The number may be opened again right away, the transport keeps the late replies of
    /// the abandoned channel away from the new one.
    fn abandon(&self, channel: ChannelNumber);

    /// Cancel a consumer without waiting for the broker, used when a consumer is dropped
    /// before its deliveries ended.
    fn abandon_consumer(&self, channel: ChannelNumber, consumer_tag: &str);

    /// The reason if the broker closed the channel on its own, it is forgotten when the
    /// channel number is opened again.
    fn closed_by_broker(&self, _channel: ChannelNumber) -> Option<CloseReason> {
        None
    }
}

#[cfg(test)]
pub(crate) mod mock;
