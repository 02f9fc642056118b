//! AMQP domain types (octet, short, long, longlong, shortstr, longstr, table) over `bytes`.
use crate::frame::{FieldTable, FieldValue};
use bytes::{Buf, BufMut, Bytes, BytesMut};
use std::io;

pub(crate) fn malformed<E>(e: E) -> io::Error
where
    E: Into<Box<dyn std::error::Error + Send + Sync>>,
{
    io::Error::new(io::ErrorKind::InvalidData, e)
}

/// Bounds checked reader of a frame payload.
pub(crate) struct Reader {
    buf: Bytes,
}

impl Reader {
    pub(crate) fn new(buf: Bytes) -> Self {
        Self { buf }
    }

    fn need(&self, len: usize) -> io::Result<()> {
        if self.buf.remaining() < len {
            return Err(malformed(format!(
                "Payload ends early, {} bytes needed, {} left",
                len,
                self.buf.remaining()
            )));
        }

        Ok(())
    }

    pub(crate) fn octet(&mut self) -> io::Result<u8> {
        self.need(1)?;

        Ok(self.buf.get_u8())
    }

    pub(crate) fn short(&mut self) -> io::Result<u16> {
        self.need(2)?;

        Ok(self.buf.get_u16())
    }

    pub(crate) fn long(&mut self) -> io::Result<u32> {
        self.need(4)?;

        Ok(self.buf.get_u32())
    }

    pub(crate) fn long_long(&mut self) -> io::Result<u64> {
        self.need(8)?;

        Ok(self.buf.get_u64())
    }

    pub(crate) fn short_str(&mut self) -> io::Result<String> {
        let len = self.octet()? as usize;

        self.utf8(len)
    }

    pub(crate) fn long_str(&mut self) -> io::Result<String> {
        let len = self.long()? as usize;

        self.utf8(len)
    }

    fn utf8(&mut self, len: usize) -> io::Result<String> {
        self.need(len)?;

        String::from_utf8(self.buf.split_to(len).to_vec()).map_err(malformed)
    }

    /// Field table, a zero length gives an empty table.
    pub(crate) fn table(&mut self) -> io::Result<FieldTable> {
        let len = self.long()? as usize;

        self.need(len)?;

        let mut inner = Reader::new(self.buf.split_to(len));
        let mut table = FieldTable::new();

        while inner.buf.has_remaining() {
            let name = inner.short_str()?;
            let value = inner.value()?;

            table.insert(name, value);
        }

        Ok(table)
    }

    fn value(&mut self) -> io::Result<FieldValue> {
        match self.octet()? {
            b't' => Ok(FieldValue::Bool(self.octet()? != 0)),
            b'I' => Ok(FieldValue::Int(self.long()? as i32)),
            b'l' => Ok(FieldValue::LongLong(self.long_long()? as i64)),
            b'S' => Ok(FieldValue::LongString(self.long_str()?)),
            b'F' => Ok(FieldValue::Table(self.table()?)),
            t => Err(malformed(format!("Unsupported field value type {:?}", t as char))),
        }
    }

    /// Whatever is left of the payload.
    pub(crate) fn rest(&mut self) -> Vec<u8> {
        let len = self.buf.len();

        self.buf.split_to(len).to_vec()
    }
}

/// Writes of the AMQP types which `BufMut` does not cover.
pub(crate) trait WireWrite {
    fn put_short_str(&mut self, s: &str) -> io::Result<()>;

    fn put_long_str(&mut self, s: &str);

    /// Pack consecutive bit fields into a single octet, first field in the lowest bit.
    fn put_bits(&mut self, bits: &[bool]);

    fn put_table(&mut self, table: &FieldTable) -> io::Result<()>;
}

impl WireWrite for BytesMut {
    fn put_short_str(&mut self, s: &str) -> io::Result<()> {
        let len = u8::try_from(s.len()).map_err(|_| {
            io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("Short string is longer than 255 bytes: {}", s.len()),
            )
        })?;

        self.put_u8(len);
        self.put_slice(s.as_bytes());

        Ok(())
    }

    fn put_long_str(&mut self, s: &str) {
        self.put_u32(s.len() as u32);
        self.put_slice(s.as_bytes());
    }

    fn put_bits(&mut self, bits: &[bool]) {
        let octet = bits
            .iter()
            .enumerate()
            .fold(0u8, |acc, (i, bit)| if *bit { acc | (1 << i) } else { acc });

        self.put_u8(octet);
    }

    fn put_table(&mut self, table: &FieldTable) -> io::Result<()> {
        let start = self.len();
        self.put_u32(0);

        for (name, value) in table {
            self.put_short_str(name)?;

            match value {
                FieldValue::Bool(v) => {
                    self.put_u8(b't');
                    self.put_u8(u8::from(*v));
                }
                FieldValue::Int(v) => {
                    self.put_u8(b'I');
                    self.put_i32(*v);
                }
                FieldValue::LongLong(v) => {
                    self.put_u8(b'l');
                    self.put_i64(*v);
                }
                FieldValue::LongString(v) => {
                    self.put_u8(b'S');
                    self.put_long_str(v);
                }
                FieldValue::Table(v) => {
                    self.put_u8(b'F');
                    self.put_table(v)?;
                }
            }
        }

        patch_len(self, start);

        Ok(())
    }
}

/// Overwrite the `u32` placeholder at `start` with the number of bytes written after it.
pub(crate) fn patch_len(buf: &mut BytesMut, start: usize) {
    let len = (buf.len() - start - 4) as u32;

    buf[start..start + 4].copy_from_slice(&len.to_be_bytes());
}
