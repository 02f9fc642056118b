use super::{AMQPFrame, Channel, FieldTable, MethodFrameArgs};
use crate::wire::{Reader, WireWrite};
use bitflags::bitflags;
use bytes::{BufMut, BytesMut};
use std::io;

bitflags! {
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
    pub struct BasicConsumeFlags: u8 {
        const NO_LOCAL = 1;
        const NO_ACK = 1 << 1;
        const EXCLUSIVE = 1 << 2;
        const NO_WAIT = 1 << 3;
    }
}

#[derive(Debug, Default)]
pub struct BasicConsumeArgs {
    pub queue: String,
    pub consumer_tag: String,
    pub flags: BasicConsumeFlags,
    pub args: FieldTable,
}

impl BasicConsumeArgs {
    pub fn new(queue: &str, consumer_tag: &str, flags: BasicConsumeFlags) -> Self {
        Self {
            queue: queue.to_string(),
            consumer_tag: consumer_tag.to_string(),
            flags,
            args: FieldTable::new(),
        }
    }

    pub fn frame(self, channel: Channel) -> AMQPFrame {
        AMQPFrame::Method(channel, super::BASIC_CONSUME, MethodFrameArgs::BasicConsume(self))
    }

    pub(crate) fn read(r: &mut Reader) -> io::Result<Self> {
        r.short()?;

        Ok(Self {
            queue: r.short_str()?,
            consumer_tag: r.short_str()?,
            flags: BasicConsumeFlags::from_bits_truncate(r.octet()?),
            args: r.table()?,
        })
    }

    pub(crate) fn write(&self, buf: &mut BytesMut) -> io::Result<()> {
        buf.put_u16(0);
        buf.put_short_str(&self.queue)?;
        buf.put_short_str(&self.consumer_tag)?;
        buf.put_u8(self.flags.bits());
        buf.put_table(&self.args)
    }
}

/// Start of a delivery, a content header and the body frames follow it.
#[derive(Clone, Debug, Default)]
pub struct BasicDeliverArgs {
    pub consumer_tag: String,
    pub delivery_tag: u64,
    pub redelivered: bool,
    pub exchange_name: String,
    pub routing_key: String,
}

impl BasicDeliverArgs {
    pub fn new(consumer_tag: &str, delivery_tag: u64, exchange_name: &str, routing_key: &str) -> Self {
        Self {
            consumer_tag: consumer_tag.to_string(),
            delivery_tag,
            redelivered: false,
            exchange_name: exchange_name.to_string(),
            routing_key: routing_key.to_string(),
        }
    }

    pub fn frame(self, channel: Channel) -> AMQPFrame {
        AMQPFrame::Method(channel, super::BASIC_DELIVER, MethodFrameArgs::BasicDeliver(self))
    }

    pub(crate) fn read(r: &mut Reader) -> io::Result<Self> {
        Ok(Self {
            consumer_tag: r.short_str()?,
            delivery_tag: r.long_long()?,
            redelivered: r.octet()? & 1 != 0,
            exchange_name: r.short_str()?,
            routing_key: r.short_str()?,
        })
    }

    pub(crate) fn write(&self, buf: &mut BytesMut) -> io::Result<()> {
        buf.put_short_str(&self.consumer_tag)?;
        buf.put_u64(self.delivery_tag);
        buf.put_bits(&[self.redelivered]);
        buf.put_short_str(&self.exchange_name)?;
        buf.put_short_str(&self.routing_key)
    }
}

pub fn basic_consume_ok(channel: Channel, consumer_tag: &str) -> AMQPFrame {
    AMQPFrame::Method(
        channel,
        super::BASIC_CONSUME_OK,
        MethodFrameArgs::BasicConsumeOk {
            consumer_tag: consumer_tag.to_string(),
        },
    )
}

pub fn basic_cancel(channel: Channel, consumer_tag: &str) -> AMQPFrame {
    AMQPFrame::Method(
        channel,
        super::BASIC_CANCEL,
        MethodFrameArgs::BasicCancel {
            consumer_tag: consumer_tag.to_string(),
        },
    )
}

pub fn basic_cancel_ok(channel: Channel, consumer_tag: &str) -> AMQPFrame {
    AMQPFrame::Method(
        channel,
        super::BASIC_CANCEL_OK,
        MethodFrameArgs::BasicCancelOk {
            consumer_tag: consumer_tag.to_string(),
        },
    )
}
