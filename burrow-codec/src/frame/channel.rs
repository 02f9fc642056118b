use super::{AMQPFrame, Channel, ClassMethod, MethodFrameArgs};
use crate::wire::{Reader, WireWrite};
use bytes::{BufMut, BytesMut};
use std::io;

/// Arguments of `channel.close` and `connection.close`, they share the layout.
#[derive(Debug, Default)]
pub struct CloseArgs {
    pub code: u16,
    pub text: String,
    /// The method which caused the close, 0 if none.
    pub class_method: ClassMethod,
}

impl CloseArgs {
    pub fn new(code: u16, text: &str, class_method: ClassMethod) -> Self {
        Self {
            code,
            text: text.to_string(),
            class_method,
        }
    }

    pub(crate) fn read(r: &mut Reader) -> io::Result<Self> {
        let code = r.short()?;
        let text = r.short_str()?;
        let class_id = r.short()?;
        let method_id = r.short()?;

        Ok(Self {
            code,
            text,
            class_method: super::unify_class_method(class_id, method_id),
        })
    }

    pub(crate) fn write(&self, buf: &mut BytesMut) -> io::Result<()> {
        buf.put_u16(self.code);
        buf.put_short_str(&self.text)?;
        buf.put_u32(self.class_method);

        Ok(())
    }
}

pub fn channel_open(channel: Channel) -> AMQPFrame {
    AMQPFrame::Method(channel, super::CHANNEL_OPEN, MethodFrameArgs::ChannelOpen)
}

pub fn channel_open_ok(channel: Channel) -> AMQPFrame {
    AMQPFrame::Method(channel, super::CHANNEL_OPEN_OK, MethodFrameArgs::ChannelOpenOk)
}

pub fn channel_close(channel: Channel, code: u16, text: &str, class_method: ClassMethod) -> AMQPFrame {
    let args = CloseArgs::new(code, text, class_method);

    AMQPFrame::Method(channel, super::CHANNEL_CLOSE, MethodFrameArgs::ChannelClose(args))
}

pub fn channel_close_ok(channel: Channel) -> AMQPFrame {
    AMQPFrame::Method(channel, super::CHANNEL_CLOSE_OK, MethodFrameArgs::ChannelCloseOk)
}

pub fn connection_close(code: u16, text: &str, class_method: ClassMethod) -> AMQPFrame {
    let args = CloseArgs::new(code, text, class_method);

    AMQPFrame::Method(0, super::CONNECTION_CLOSE, MethodFrameArgs::ConnectionClose(args))
}

pub fn connection_close_ok() -> AMQPFrame {
    AMQPFrame::Method(0, super::CONNECTION_CLOSE_OK, MethodFrameArgs::ConnectionCloseOk)
}
