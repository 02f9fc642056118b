use crate::frame::{AMQPFrame, ContentBodyFrame, ContentHeaderFrame, MethodFrameArgs};
use crate::wire::{self, Reader};
use bytes::{Buf, BufMut, BytesMut};
use std::io;
use tokio_util::codec::{Decoder, Encoder};

const FRAME_METHOD: u8 = 1;
const FRAME_HEADER: u8 = 2;
const FRAME_BODY: u8 = 3;
const FRAME_HEARTBEAT: u8 = 8;
const FRAME_END: u8 = 0xCE;

/// Type, channel and payload size.
const PREAMBLE: usize = 7;
/// The read buffer is grown at most this much ahead of a partially received frame.
const RESERVE_LIMIT: usize = 128 * 1024;

/// Frames on a byte stream, after the protocol header has been exchanged.
///
/// Decoding fails with `InvalidData` only when the stream cannot be framed anymore or a
/// modelled method has malformed arguments. Unknown methods decode as `MethodFrameArgs::Other`.
#[derive(Debug, Default)]
pub struct AMQPCodec {}

impl Decoder for AMQPCodec {
    type Item = AMQPFrame;
    type Error = io::Error;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<AMQPFrame>, io::Error> {
        if src.len() < PREAMBLE {
            return Ok(None);
        }

        let frame_type = src[0];

        if !matches!(frame_type, FRAME_METHOD | FRAME_HEADER | FRAME_BODY | FRAME_HEARTBEAT) {
            return Err(wire::malformed(format!("Unknown frame type {}", frame_type)));
        }

        let size = u32::from_be_bytes([src[3], src[4], src[5], src[6]]) as usize;
        let total = PREAMBLE + size + 1;

        if src.len() < total {
            src.reserve((total - src.len()).min(RESERVE_LIMIT));

            return Ok(None);
        }

        let mut raw = src.split_to(total);

        if raw[total - 1] != FRAME_END {
            return Err(wire::malformed(format!(
                "Frame end is {:#04X} instead of {:#04X}",
                raw[total - 1],
                FRAME_END
            )));
        }

        raw.advance(1);
        let channel = raw.get_u16();
        raw.advance(4);
        raw.truncate(size);

        let frame = match frame_type {
            FRAME_METHOD => {
                let mut r = Reader::new(raw.freeze());
                let cm = r.long()?;

                AMQPFrame::Method(channel, cm, MethodFrameArgs::read(cm, &mut r)?)
            }
            FRAME_HEADER => {
                let mut r = Reader::new(raw.freeze());
                let class_id = r.short()?;
                let weight = r.short()?;
                let body_size = r.long_long()?;
                // property flags, the property list is not kept
                r.short()?;

                AMQPFrame::ContentHeader(ContentHeaderFrame {
                    channel,
                    class_id,
                    weight,
                    body_size,
                })
            }
            FRAME_BODY => AMQPFrame::ContentBody(ContentBodyFrame {
                channel,
                body: raw.to_vec(),
            }),
            _ => AMQPFrame::Heartbeat(channel),
        };

        Ok(Some(frame))
    }
}

impl Encoder<AMQPFrame> for AMQPCodec {
    type Error = io::Error;

    fn encode(&mut self, frame: AMQPFrame, dst: &mut BytesMut) -> Result<(), io::Error> {
        let start = dst.len();

        let result = match &frame {
            AMQPFrame::Method(ch, cm, args) => {
                preamble(dst, FRAME_METHOD, *ch);
                dst.put_u32(*cm);
                args.write(dst)
            }
            AMQPFrame::ContentHeader(h) => {
                preamble(dst, FRAME_HEADER, h.channel);
                dst.put_u16(h.class_id);
                dst.put_u16(h.weight);
                dst.put_u64(h.body_size);
                dst.put_u16(0);
                Ok(())
            }
            AMQPFrame::ContentBody(b) => {
                preamble(dst, FRAME_BODY, b.channel);
                dst.put_slice(&b.body);
                Ok(())
            }
            AMQPFrame::Heartbeat(ch) => {
                preamble(dst, FRAME_HEARTBEAT, *ch);
                Ok(())
            }
        };

        if let Err(e) = result {
            // nothing of a half written frame may stay in the buffer
            dst.truncate(start);

            return Err(e);
        }

        wire::patch_len(dst, start + 3);
        dst.put_u8(FRAME_END);

        Ok(())
    }
}

/// Frame type, channel and a size placeholder patched once the payload is written.
fn preamble(dst: &mut BytesMut, frame_type: u8, channel: u16) {
    dst.put_u8(frame_type);
    dst.put_u16(channel);
    dst.put_u32(0);
}
