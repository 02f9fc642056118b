use super::{AMQPFrame, Channel, FieldTable, MethodFrameArgs};
use crate::wire::{Reader, WireWrite};
use bitflags::bitflags;
use bytes::{BufMut, BytesMut};
use std::io;

bitflags! {
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
    pub struct QueueDeclareFlags: u8 {
        const PASSIVE = 1;
        const DURABLE = 1 << 1;
        const EXCLUSIVE = 1 << 2;
        const AUTO_DELETE = 1 << 3;
        const NO_WAIT = 1 << 4;
    }
}

bitflags! {
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
    pub struct QueueDeleteFlags: u8 {
        const IF_UNUSED = 1;
        const IF_EMPTY = 1 << 1;
        const NO_WAIT = 1 << 2;
    }
}

/// `queue.declare`, an empty name asks the broker to make one up.
#[derive(Debug, Default)]
pub struct QueueDeclareArgs {
    pub name: String,
    pub flags: QueueDeclareFlags,
    pub args: FieldTable,
}

impl QueueDeclareArgs {
    pub fn new(name: &str, flags: QueueDeclareFlags) -> Self {
        Self {
            name: name.to_string(),
            flags,
            args: FieldTable::new(),
        }
    }

    pub fn frame(self, channel: Channel) -> AMQPFrame {
        AMQPFrame::Method(channel, super::QUEUE_DECLARE, MethodFrameArgs::QueueDeclare(self))
    }

    pub(crate) fn read(r: &mut Reader) -> io::Result<Self> {
        // ticket
        r.short()?;

        Ok(Self {
            name: r.short_str()?,
            flags: QueueDeclareFlags::from_bits_truncate(r.octet()?),
            args: r.table()?,
        })
    }

    pub(crate) fn write(&self, buf: &mut BytesMut) -> io::Result<()> {
        buf.put_u16(0);
        buf.put_short_str(&self.name)?;
        buf.put_u8(self.flags.bits());
        buf.put_table(&self.args)
    }
}

#[derive(Debug, Default)]
pub struct QueueDeclareOkArgs {
    pub name: String,
    pub message_count: u32,
    pub consumer_count: u32,
}

impl QueueDeclareOkArgs {
    pub fn new(name: &str, message_count: u32, consumer_count: u32) -> Self {
        Self {
            name: name.to_string(),
            message_count,
            consumer_count,
        }
    }

    pub fn frame(self, channel: Channel) -> AMQPFrame {
        AMQPFrame::Method(channel, super::QUEUE_DECLARE_OK, MethodFrameArgs::QueueDeclareOk(self))
    }

    pub(crate) fn read(r: &mut Reader) -> io::Result<Self> {
        Ok(Self {
            name: r.short_str()?,
            message_count: r.long()?,
            consumer_count: r.long()?,
        })
    }

    pub(crate) fn write(&self, buf: &mut BytesMut) -> io::Result<()> {
        buf.put_short_str(&self.name)?;
        buf.put_u32(self.message_count);
        buf.put_u32(self.consumer_count);

        Ok(())
    }
}

/// A binding of a queue to an exchange, the arguments of both `queue.bind` and `queue.unbind`.
#[derive(Debug, Default)]
pub struct QueueBindArgs {
    pub queue_name: String,
    pub exchange_name: String,
    pub routing_key: String,
    pub args: FieldTable,
}

impl QueueBindArgs {
    pub fn new(queue_name: &str, exchange_name: &str, routing_key: &str) -> Self {
        Self {
            queue_name: queue_name.to_string(),
            exchange_name: exchange_name.to_string(),
            routing_key: routing_key.to_string(),
            args: FieldTable::new(),
        }
    }

    pub fn bind_frame(self, channel: Channel) -> AMQPFrame {
        AMQPFrame::Method(channel, super::QUEUE_BIND, MethodFrameArgs::QueueBind(self))
    }

    pub fn unbind_frame(self, channel: Channel) -> AMQPFrame {
        AMQPFrame::Method(channel, super::QUEUE_UNBIND, MethodFrameArgs::QueueUnbind(self))
    }

    /// `queue.unbind` has no no-wait bit.
    pub(crate) fn read(r: &mut Reader, with_no_wait: bool) -> io::Result<Self> {
        r.short()?;

        let queue_name = r.short_str()?;
        let exchange_name = r.short_str()?;
        let routing_key = r.short_str()?;

        if with_no_wait {
            r.octet()?;
        }

        Ok(Self {
            queue_name,
            exchange_name,
            routing_key,
            args: r.table()?,
        })
    }

    pub(crate) fn write(&self, buf: &mut BytesMut, with_no_wait: bool) -> io::Result<()> {
        buf.put_u16(0);
        buf.put_short_str(&self.queue_name)?;
        buf.put_short_str(&self.exchange_name)?;
        buf.put_short_str(&self.routing_key)?;

        if with_no_wait {
            buf.put_bits(&[false]);
        }

        buf.put_table(&self.args)
    }
}

#[derive(Debug, Default)]
pub struct QueueDeleteArgs {
    pub queue_name: String,
    pub flags: QueueDeleteFlags,
}

impl QueueDeleteArgs {
    pub fn new(queue_name: &str, flags: QueueDeleteFlags) -> Self {
        Self {
            queue_name: queue_name.to_string(),
            flags,
        }
    }

    pub fn frame(self, channel: Channel) -> AMQPFrame {
        AMQPFrame::Method(channel, super::QUEUE_DELETE, MethodFrameArgs::QueueDelete(self))
    }

    pub(crate) fn read(r: &mut Reader) -> io::Result<Self> {
        r.short()?;

        Ok(Self {
            queue_name: r.short_str()?,
            flags: QueueDeleteFlags::from_bits_truncate(r.octet()?),
        })
    }

    pub(crate) fn write(&self, buf: &mut BytesMut) -> io::Result<()> {
        buf.put_u16(0);
        buf.put_short_str(&self.queue_name)?;
        buf.put_u8(self.flags.bits());

        Ok(())
    }
}

pub fn queue_bind_ok(channel: Channel) -> AMQPFrame {
    AMQPFrame::Method(channel, super::QUEUE_BIND_OK, MethodFrameArgs::QueueBindOk)
}

pub fn queue_unbind_ok(channel: Channel) -> AMQPFrame {
    AMQPFrame::Method(channel, super::QUEUE_UNBIND_OK, MethodFrameArgs::QueueUnbindOk)
}

pub fn queue_delete_ok(channel: Channel, message_count: u32) -> AMQPFrame {
    AMQPFrame::Method(
        channel,
        super::QUEUE_DELETE_OK,
        MethodFrameArgs::QueueDeleteOk { message_count },
    )
}
