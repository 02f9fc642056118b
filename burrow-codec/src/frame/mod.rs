//! Frame values.
//!
//! Method arguments are plain structs with public fields. The `frame` methods and the free
//! functions of this module put them on a channel.
mod basic;
mod channel;
mod queue;

pub use self::{
    basic::{basic_cancel, basic_cancel_ok, basic_consume_ok, BasicConsumeArgs, BasicConsumeFlags, BasicDeliverArgs},
    channel::{channel_close, channel_close_ok, channel_open, channel_open_ok, connection_close, connection_close_ok, CloseArgs},
    queue::{
        queue_bind_ok, queue_delete_ok, queue_unbind_ok, QueueBindArgs, QueueDeclareArgs, QueueDeclareFlags,
        QueueDeclareOkArgs, QueueDeleteArgs, QueueDeleteFlags,
    },
};

use crate::wire::{Reader, WireWrite};
use bytes::{BufMut, BytesMut};
use std::collections::HashMap;
use std::io;

pub type Channel = u16;
pub type ClassId = u16;
pub type ClassMethod = u32;

pub const CONNECTION_CLOSE: ClassMethod = 0x000A0032;
pub const CONNECTION_CLOSE_OK: ClassMethod = 0x000A0033;

pub const CHANNEL_OPEN: ClassMethod = 0x0014000A;
pub const CHANNEL_OPEN_OK: ClassMethod = 0x0014000B;
pub const CHANNEL_CLOSE: ClassMethod = 0x00140028;
pub const CHANNEL_CLOSE_OK: ClassMethod = 0x00140029;

pub const QUEUE_DECLARE: ClassMethod = 0x0032000A;
pub const QUEUE_DECLARE_OK: ClassMethod = 0x0032000B;
pub const QUEUE_BIND: ClassMethod = 0x00320014;
pub const QUEUE_BIND_OK: ClassMethod = 0x00320015;
pub const QUEUE_DELETE: ClassMethod = 0x00320028;
pub const QUEUE_DELETE_OK: ClassMethod = 0x00320029;
pub const QUEUE_UNBIND: ClassMethod = 0x00320032;
pub const QUEUE_UNBIND_OK: ClassMethod = 0x00320033;

pub const BASIC_CONSUME: ClassMethod = 0x003C0014;
pub const BASIC_CONSUME_OK: ClassMethod = 0x003C0015;
pub const BASIC_CANCEL: ClassMethod = 0x003C001E;
pub const BASIC_CANCEL_OK: ClassMethod = 0x003C001F;
pub const BASIC_DELIVER: ClassMethod = 0x003C003C;

/// Class of the content header frames of deliveries.
pub const BASIC_CLASS: ClassId = 0x003C;

pub enum AMQPFrame {
    /// A method on a channel, channel 0 is the connection itself.
    Method(Channel, ClassMethod, MethodFrameArgs),
    ContentHeader(ContentHeaderFrame),
    ContentBody(ContentBodyFrame),
    Heartbeat(Channel),
}

impl AMQPFrame {
    pub fn channel(&self) -> Channel {
        match self {
            AMQPFrame::Method(ch, _, _) | AMQPFrame::Heartbeat(ch) => *ch,
            AMQPFrame::ContentHeader(h) => h.channel,
            AMQPFrame::ContentBody(b) => b.channel,
        }
    }
}

impl std::fmt::Debug for AMQPFrame {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AMQPFrame::Method(ch, cm, args) => write!(f, "Method(ch={} {:08X} {:?})", ch, cm, args),
            AMQPFrame::ContentHeader(h) => write!(f, "{:?}", h),
            AMQPFrame::ContentBody(b) => write!(f, "{:?}", b),
            AMQPFrame::Heartbeat(ch) => write!(f, "Heartbeat(ch={})", ch),
        }
    }
}

#[derive(Debug)]
pub enum MethodFrameArgs {
    ConnectionClose(CloseArgs),
    ConnectionCloseOk,
    ChannelOpen,
    ChannelOpenOk,
    ChannelClose(CloseArgs),
    ChannelCloseOk,
    QueueDeclare(QueueDeclareArgs),
    QueueDeclareOk(QueueDeclareOkArgs),
    QueueBind(QueueBindArgs),
    QueueBindOk,
    QueueUnbind(QueueBindArgs),
    QueueUnbindOk,
    QueueDelete(QueueDeleteArgs),
    QueueDeleteOk { message_count: u32 },
    BasicConsume(BasicConsumeArgs),
    BasicConsumeOk { consumer_tag: String },
    BasicCancel { consumer_tag: String },
    BasicCancelOk { consumer_tag: String },
    BasicDeliver(BasicDeliverArgs),
    /// A method without a model here, its raw arguments.
    Other(Vec<u8>),
}

impl MethodFrameArgs {
    pub(crate) fn read(cm: ClassMethod, r: &mut Reader) -> io::Result<Self> {
        let args = match cm {
            CONNECTION_CLOSE => MethodFrameArgs::ConnectionClose(CloseArgs::read(r)?),
            CONNECTION_CLOSE_OK => MethodFrameArgs::ConnectionCloseOk,
            CHANNEL_OPEN => {
                r.short_str()?;
                MethodFrameArgs::ChannelOpen
            }
            CHANNEL_OPEN_OK => {
                r.long_str()?;
                MethodFrameArgs::ChannelOpenOk
            }
            CHANNEL_CLOSE => MethodFrameArgs::ChannelClose(CloseArgs::read(r)?),
            CHANNEL_CLOSE_OK => MethodFrameArgs::ChannelCloseOk,
            QUEUE_DECLARE => MethodFrameArgs::QueueDeclare(QueueDeclareArgs::read(r)?),
            QUEUE_DECLARE_OK => MethodFrameArgs::QueueDeclareOk(QueueDeclareOkArgs::read(r)?),
            QUEUE_BIND => MethodFrameArgs::QueueBind(QueueBindArgs::read(r, true)?),
            QUEUE_BIND_OK => MethodFrameArgs::QueueBindOk,
            QUEUE_UNBIND => MethodFrameArgs::QueueUnbind(QueueBindArgs::read(r, false)?),
            QUEUE_UNBIND_OK => MethodFrameArgs::QueueUnbindOk,
            QUEUE_DELETE => MethodFrameArgs::QueueDelete(QueueDeleteArgs::read(r)?),
            QUEUE_DELETE_OK => MethodFrameArgs::QueueDeleteOk {
                message_count: r.long()?,
            },
            BASIC_CONSUME => MethodFrameArgs::BasicConsume(BasicConsumeArgs::read(r)?),
            BASIC_CONSUME_OK => MethodFrameArgs::BasicConsumeOk {
                consumer_tag: r.short_str()?,
            },
            BASIC_CANCEL => {
                let consumer_tag = r.short_str()?;
                // no-wait
                r.octet()?;

                MethodFrameArgs::BasicCancel { consumer_tag }
            }
            BASIC_CANCEL_OK => MethodFrameArgs::BasicCancelOk {
                consumer_tag: r.short_str()?,
            },
            BASIC_DELIVER => MethodFrameArgs::BasicDeliver(BasicDeliverArgs::read(r)?),
            _ => MethodFrameArgs::Other(r.rest()),
        };

        Ok(args)
    }

    pub(crate) fn write(&self, buf: &mut BytesMut) -> io::Result<()> {
        match self {
            MethodFrameArgs::ConnectionClose(args) | MethodFrameArgs::ChannelClose(args) => args.write(buf)?,
            MethodFrameArgs::ChannelOpen => buf.put_short_str("")?,
            MethodFrameArgs::ChannelOpenOk => buf.put_long_str(""),
            MethodFrameArgs::ConnectionCloseOk
            | MethodFrameArgs::ChannelCloseOk
            | MethodFrameArgs::QueueBindOk
            | MethodFrameArgs::QueueUnbindOk => (),
            MethodFrameArgs::QueueDeclare(args) => args.write(buf)?,
            MethodFrameArgs::QueueDeclareOk(args) => args.write(buf)?,
            MethodFrameArgs::QueueBind(args) => args.write(buf, true)?,
            MethodFrameArgs::QueueUnbind(args) => args.write(buf, false)?,
            MethodFrameArgs::QueueDelete(args) => args.write(buf)?,
            MethodFrameArgs::QueueDeleteOk { message_count } => buf.put_u32(*message_count),
            MethodFrameArgs::BasicConsume(args) => args.write(buf)?,
            MethodFrameArgs::BasicConsumeOk { consumer_tag } | MethodFrameArgs::BasicCancelOk { consumer_tag } => {
                buf.put_short_str(consumer_tag)?
            }
            MethodFrameArgs::BasicCancel { consumer_tag } => {
                buf.put_short_str(consumer_tag)?;
                buf.put_bits(&[false]);
            }
            MethodFrameArgs::BasicDeliver(args) => args.write(buf)?,
            MethodFrameArgs::Other(raw) => buf.put_slice(raw),
        }

        Ok(())
    }
}

/// Announces the size of the body following in content body frames. Message properties are
/// not modelled, the decoder drops them and the encoder writes none.
#[derive(Debug, Default)]
pub struct ContentHeaderFrame {
    pub channel: Channel,
    pub class_id: ClassId,
    pub weight: u16,
    pub body_size: u64,
}

impl ContentHeaderFrame {
    pub fn new(channel: Channel, body_size: u64) -> Self {
        Self {
            channel,
            class_id: BASIC_CLASS,
            weight: 0,
            body_size,
        }
    }

    pub fn frame(self) -> AMQPFrame {
        AMQPFrame::ContentHeader(self)
    }
}

pub struct ContentBodyFrame {
    pub channel: Channel,
    pub body: Vec<u8>,
}

impl ContentBodyFrame {
    pub fn new(channel: Channel, body: &[u8]) -> Self {
        Self {
            channel,
            body: body.to_vec(),
        }
    }

    pub fn frame(self) -> AMQPFrame {
        AMQPFrame::ContentBody(self)
    }
}

impl std::fmt::Debug for ContentBodyFrame {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ContentBodyFrame")
            .field("channel", &self.channel)
            .field("len", &self.body.len())
            .finish()
    }
}

pub type FieldTable = HashMap<String, FieldValue>;

#[derive(Clone, Debug, PartialEq)]
pub enum FieldValue {
    Bool(bool),
    Int(i32),
    LongLong(i64),
    LongString(String),
    Table(FieldTable),
}

pub fn split_class_method(cm: ClassMethod) -> (ClassId, u16) {
    ((cm >> 16) as ClassId, (cm & 0xFFFF) as u16)
}

pub fn unify_class_method(class_id: ClassId, method_id: u16) -> ClassMethod {
    ((class_id as u32) << 16) | method_id as u32
}

pub fn heartbeat() -> AMQPFrame {
    AMQPFrame::Heartbeat(0)
}
