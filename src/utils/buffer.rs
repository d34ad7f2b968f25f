use std::io::{Cursor, Result as IoResult, Error as IoError, ErrorKind};
use byteorder::{BigEndian, LittleEndian, ReadBytesExt, WriteBytesExt};

/// Growable byte buffer with a read cursor, used for every wire layout in the crate
pub struct ByteBuffer {
    buffer: Vec<u8>,
    cursor: usize,
}

impl ByteBuffer {
    /// Create a new ByteBuffer from bytes
    pub fn new(data: Vec<u8>) -> Self {
        ByteBuffer {
            buffer: data,
            cursor: 0,
        }
    }

    /// Create a ByteBuffer over a borrowed slice
    pub fn from_slice(data: &[u8]) -> Self {
        ByteBuffer::new(data.to_vec())
    }

    /// Create an empty ByteBuffer with capacity
    pub fn with_capacity(capacity: usize) -> Self {
        ByteBuffer {
            buffer: Vec::with_capacity(capacity),
            cursor: 0,
        }
    }

    /// Get current cursor position
    pub fn position(&self) -> usize {
        self.cursor
    }

    /// Set cursor position
    pub fn set_position(&mut self, pos: usize) -> IoResult<()> {
        if pos > self.buffer.len() {
            return Err(IoError::new(ErrorKind::InvalidInput, "Position out of bounds"));
        }
        self.cursor = pos;
        Ok(())
    }

    /// Get remaining bytes from current position
    pub fn remaining(&self) -> usize {
        self.buffer.len().saturating_sub(self.cursor)
    }

    /// Check if buffer has at least n bytes remaining
    pub fn has_remaining(&self, n: usize) -> bool {
        self.remaining() >= n
    }

    /// Look at the next byte without consuming it
    pub fn peek_u8(&self) -> Option<u8> {
        self.buffer.get(self.cursor).copied()
    }

    /// Advance the cursor without copying
    pub fn skip(&mut self, len: usize) -> IoResult<()> {
        self.ensure(len)?;
        self.cursor += len;
        Ok(())
    }

    /// Read bytes into buffer
    pub fn read_bytes(&mut self, len: usize) -> IoResult<Vec<u8>> {
        self.ensure(len)?;
        let bytes = self.buffer[self.cursor..self.cursor + len].to_vec();
        self.cursor += len;
        Ok(bytes)
    }

    /// Write bytes to buffer
    pub fn write_bytes(&mut self, data: &[u8]) -> IoResult<()> {
        self.buffer.extend_from_slice(data);
        Ok(())
    }

    /// Read u8
    pub fn read_u8(&mut self) -> IoResult<u8> {
        self.ensure(1)?;
        let value = self.buffer[self.cursor];
        self.cursor += 1;
        Ok(value)
    }

    /// Write u8
    pub fn write_u8(&mut self, value: u8) -> IoResult<()> {
        self.buffer.push(value);
        Ok(())
    }

    /// Read u16 (big endian)
    pub fn read_u16_be(&mut self) -> IoResult<u16> {
        self.ensure(2)?;
        let mut cursor = Cursor::new(&self.buffer[self.cursor..]);
        let value = cursor.read_u16::<BigEndian>()?;
        self.cursor += 2;
        Ok(value)
    }

    /// Write u16 (big endian)
    pub fn write_u16_be(&mut self, value: u16) -> IoResult<()> {
        self.buffer.write_u16::<BigEndian>(value)
    }

    /// Read u24 (big endian), used by chunk message headers
    pub fn read_u24_be(&mut self) -> IoResult<u32> {
        self.ensure(3)?;
        let mut cursor = Cursor::new(&self.buffer[self.cursor..]);
        let value = cursor.read_u24::<BigEndian>()?;
        self.cursor += 3;
        Ok(value)
    }

    /// Write the low 24 bits of value (big endian)
    pub fn write_u24_be(&mut self, value: u32) -> IoResult<()> {
        self.buffer.write_u24::<BigEndian>(value & 0x00FF_FFFF)
    }

    /// Read u32 (big endian)
    pub fn read_u32_be(&mut self) -> IoResult<u32> {
        self.ensure(4)?;
        let mut cursor = Cursor::new(&self.buffer[self.cursor..]);
        let value = cursor.read_u32::<BigEndian>()?;
        self.cursor += 4;
        Ok(value)
    }

    /// Write u32 (big endian)
    pub fn write_u32_be(&mut self, value: u32) -> IoResult<()> {
        self.buffer.write_u32::<BigEndian>(value)
    }

    /// Read u32 (little endian), the message stream ID layout
    pub fn read_u32_le(&mut self) -> IoResult<u32> {
        self.ensure(4)?;
        let mut cursor = Cursor::new(&self.buffer[self.cursor..]);
        let value = cursor.read_u32::<LittleEndian>()?;
        self.cursor += 4;
        Ok(value)
    }

    /// Write u32 (little endian)
    pub fn write_u32_le(&mut self, value: u32) -> IoResult<()> {
        self.buffer.write_u32::<LittleEndian>(value)
    }

    /// Read f64 (big endian)
    pub fn read_f64_be(&mut self) -> IoResult<f64> {
        self.ensure(8)?;
        let mut cursor = Cursor::new(&self.buffer[self.cursor..]);
        let value = cursor.read_f64::<BigEndian>()?;
        self.cursor += 8;
        Ok(value)
    }

    /// Write f64 (big endian)
    pub fn write_f64_be(&mut self, value: f64) -> IoResult<()> {
        self.buffer.write_f64::<BigEndian>(value)
    }

    /// Get all bytes as Vec
    pub fn to_vec(&self) -> Vec<u8> {
        self.buffer.clone()
    }

    /// Consume the buffer and return its bytes
    pub fn into_vec(self) -> Vec<u8> {
        self.buffer
    }

    /// Get slice of underlying buffer
    pub fn as_slice(&self) -> &[u8] {
        &self.buffer
    }

    /// Get length of buffer
    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    /// Check if buffer is empty
    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    fn ensure(&self, n: usize) -> IoResult<()> {
        if !self.has_remaining(n) {
            return Err(IoError::new(ErrorKind::UnexpectedEof, "Not enough bytes"));
        }
        Ok(())
    }
}
