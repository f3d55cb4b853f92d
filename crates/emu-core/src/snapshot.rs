//! Snapshot sections for chip state.
//!
//! A snapshot is a sequence of named, versioned sections. Each chip writes
//! one section tagged with its instance name (`"VIA1"`, `"VIA2"`, ...) so a
//! machine with several copies of the same chip can restore each one.
//!
//! Section layout:
//!
//! | Bytes | Field                          |
//! |-------|--------------------------------|
//! | 1     | name length `n`                |
//! | n     | name (UTF-8)                   |
//! | 1     | major version                  |
//! | 1     | minor version                  |
//! | 4     | payload length (little-endian) |
//! | ...   | payload                        |

use thiserror::Error;

/// Errors returned when decoding a snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SnapshotError {
    #[error("snapshot data ended early")]
    UnexpectedEof,

    #[error("snapshot section `{0}` not found")]
    MissingSection(String),

    #[error("unsupported version {major}.{minor} for section `{section}`")]
    UnsupportedVersion {
        section: String,
        major: u8,
        minor: u8,
    },

    #[error("invalid snapshot field: {0}")]
    InvalidField(&'static str),

    #[error("{0} unexpected bytes after section payload")]
    TrailingBytes(usize),
}

pub type SnapshotResult<T> = Result<T, SnapshotError>;

/// Accumulates snapshot sections.
#[derive(Debug, Default)]
pub struct SnapshotWriter {
    buf: Vec<u8>,
}

impl SnapshotWriter {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Start a section. Bytes written to the returned handle form its payload.
    ///
    /// Names longer than 255 bytes are truncated.
    pub fn section(&mut self, name: &str, major: u8, minor: u8) -> SectionWriter<'_> {
        let name = &name.as_bytes()[..name.len().min(usize::from(u8::MAX))];
        self.buf.push(name.len() as u8);
        self.buf.extend_from_slice(name);
        self.buf.push(major);
        self.buf.push(minor);
        let len_at = self.buf.len();
        self.buf.extend_from_slice(&[0; 4]);
        SectionWriter {
            buf: &mut self.buf,
            len_at,
        }
    }

    #[must_use]
    pub fn finish(self) -> Vec<u8> {
        self.buf
    }
}

/// Payload writer for one section; the length is patched in on drop.
pub struct SectionWriter<'a> {
    buf: &'a mut Vec<u8>,
    len_at: usize,
}

impl SectionWriter<'_> {
    pub fn u8(&mut self, value: u8) -> &mut Self {
        self.buf.push(value);
        self
    }

    pub fn bytes(&mut self, values: &[u8]) -> &mut Self {
        self.buf.extend_from_slice(values);
        self
    }
}

impl Drop for SectionWriter<'_> {
    fn drop(&mut self) {
        let len = (self.buf.len() - self.len_at - 4) as u32;
        self.buf[self.len_at..self.len_at + 4].copy_from_slice(&len.to_le_bytes());
    }
}

/// Read-only view over a complete snapshot.
#[derive(Debug, Clone, Copy)]
pub struct SnapshotReader<'a> {
    data: &'a [u8],
}

/// One section located by [`SnapshotReader::section`].
#[derive(Debug, Clone, Copy)]
pub struct Section<'a> {
    pub major: u8,
    pub minor: u8,
    payload: &'a [u8],
}

impl<'a> SnapshotReader<'a> {
    #[must_use]
    pub fn new(data: &'a [u8]) -> Self {
        Self { data }
    }

    /// Find the section tagged `name`.
    pub fn section(&self, name: &str) -> SnapshotResult<Section<'a>> {
        let mut cur = Cursor::new(self.data);
        while !cur.is_empty() {
            let name_len = usize::from(cur.u8()?);
            let tag = cur.take(name_len)?;
            let major = cur.u8()?;
            let minor = cur.u8()?;
            let len = u32::from_le_bytes(cur.array::<4>()?) as usize;
            let payload = cur.take(len)?;
            if tag == name.as_bytes() {
                return Ok(Section {
                    major,
                    minor,
                    payload,
                });
            }
        }
        Err(SnapshotError::MissingSection(name.to_string()))
    }
}

impl<'a> Section<'a> {
    /// Cursor over the section payload.
    #[must_use]
    pub fn cursor(&self) -> Cursor<'a> {
        Cursor::new(self.payload)
    }
}

/// Bounds-checked byte cursor.
#[derive(Debug, Clone, Copy)]
pub struct Cursor<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> Cursor<'a> {
    #[must_use]
    pub fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.pos >= self.data.len()
    }

    #[must_use]
    pub fn remaining(&self) -> usize {
        self.data.len().saturating_sub(self.pos)
    }

    pub fn u8(&mut self) -> SnapshotResult<u8> {
        Ok(self.take(1)?[0])
    }

    pub fn array<const N: usize>(&mut self) -> SnapshotResult<[u8; N]> {
        let mut out = [0u8; N];
        out.copy_from_slice(self.take(N)?);
        Ok(out)
    }

    pub fn take(&mut self, len: usize) -> SnapshotResult<&'a [u8]> {
        let end = self.pos.checked_add(len).ok_or(SnapshotError::UnexpectedEof)?;
        let slice = self
            .data
            .get(self.pos..end)
            .ok_or(SnapshotError::UnexpectedEof)?;
        self.pos = end;
        Ok(slice)
    }

    /// Fail if any payload bytes were left unread.
    pub fn finish(self) -> SnapshotResult<()> {
        match self.remaining() {
            0 => Ok(()),
            n => Err(SnapshotError::TrailingBytes(n)),
        }
    }
}
