//! Buffered byte source with position tracking

use crate::chunks::FourCC;
use byteorder::{LittleEndian, ReadBytesExt};
use std::io::{self, BufReader, Read, Seek, SeekFrom};

/// Buffered reader over a seekable input.
///
/// Tracks the logical position and input size so the parser never has to
/// query the underlying source for them.
pub struct ByteReader<R> {
    inner: BufReader<R>,
    pos: u64,
    size: u64,
    eof: bool,
}

impl<R: Read + Seek> ByteReader<R> {
    /// Wrap `inner`, positioned at its start.
    pub fn new(mut inner: R) -> io::Result<Self> {
        let size = inner.seek(SeekFrom::End(0))?;
        inner.seek(SeekFrom::Start(0))?;
        Ok(Self {
            inner: BufReader::new(inner),
            pos: 0,
            size,
            eof: false,
        })
    }

    /// Current byte offset.
    pub fn position(&self) -> u64 {
        self.pos
    }

    /// Total input size in bytes.
    pub fn size(&self) -> u64 {
        self.size
    }

    /// True once a read ran out of input or the position is past the end.
    pub fn is_eof(&self) -> bool {
        self.eof || self.pos >= self.size
    }

    /// Move to an absolute offset.
    pub fn seek(&mut self, pos: u64) -> io::Result<()> {
        self.inner.seek(SeekFrom::Start(pos))?;
        self.pos = pos;
        self.eof = false;
        Ok(())
    }

    /// Skip `n` bytes forward.
    pub fn skip(&mut self, n: u64) -> io::Result<()> {
        if n == 0 {
            return Ok(());
        }
        match i64::try_from(n) {
            Ok(offset) => {
                self.inner.seek_relative(offset)?;
                self.pos = self.pos.saturating_add(n);
            }
            Err(_) => self.seek(self.pos.saturating_add(n))?,
        }
        Ok(())
    }

    /// Read one byte, or `None` at end of input.
    pub fn next_byte(&mut self) -> io::Result<Option<u8>> {
        let mut byte = [0u8; 1];
        match self.read(&mut byte)? {
            0 => Ok(None),
            _ => Ok(Some(byte[0])),
        }
    }

    /// Read a byte.
    pub fn read_byte(&mut self) -> io::Result<u8> {
        ReadBytesExt::read_u8(self)
    }

    /// Read a little-endian u16.
    pub fn read_le16(&mut self) -> io::Result<u16> {
        self.read_u16::<LittleEndian>()
    }

    /// Read a little-endian u32.
    pub fn read_le32(&mut self) -> io::Result<u32> {
        self.read_u32::<LittleEndian>()
    }

    /// Read a fourCC.
    pub fn read_fourcc(&mut self) -> io::Result<FourCC> {
        let mut bytes = [0u8; 4];
        self.read_exact(&mut bytes)?;
        Ok(FourCC(bytes))
    }
}

impl<R: Read> Read for ByteReader<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let n = self.inner.read(buf)?;
        if n == 0 && !buf.is_empty() {
            self.eof = true;
        }
        self.pos += n as u64;
        Ok(n)
    }
}
