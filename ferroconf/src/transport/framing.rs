//! NETCONF message framing over SSH (RFC 6242).
//!
//! Before the hello exchange completes every message ends with the
//! `]]>]]>` marker. Once both peers advertise base:1.1 the session
//! switches to chunked framing: each chunk is `\n#<len>\n` followed by
//! `len` bytes, and `\n##\n` terminates the message.

use bytes::{Buf, BytesMut};
use memchr::memmem;

use crate::error::{Result, TransportError};

/// End-of-message marker used by base:1.0 framing.
pub const END_OF_MESSAGE: &[u8] = b"]]>]]>";

/// Largest chunk size allowed by RFC 6242.
const MAX_CHUNK_SIZE: u64 = 4_294_967_295;

/// Longest decimal rendering of [`MAX_CHUNK_SIZE`].
const MAX_CHUNK_DIGITS: usize = 10;

/// Framing mechanism in effect on a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Framing {
    /// `]]>]]>` terminated messages.
    #[default]
    EndOfMessage,

    /// Length-prefixed chunks.
    Chunked,
}

/// Frame a complete message for sending.
pub fn encode(framing: Framing, message: &str) -> Vec<u8> {
    match framing {
        Framing::EndOfMessage => {
            let mut out = Vec::with_capacity(message.len() + END_OF_MESSAGE.len());
            out.extend_from_slice(message.as_bytes());
            out.extend_from_slice(END_OF_MESSAGE);
            out
        }
        Framing::Chunked => {
            let header = format!("\n#{}\n", message.len());
            let mut out = Vec::with_capacity(header.len() + message.len() + 4);
            out.extend_from_slice(header.as_bytes());
            out.extend_from_slice(message.as_bytes());
            out.extend_from_slice(b"\n##\n");
            out
        }
    }
}

/// Accumulates channel data and splits it into complete messages.
///
/// Data may arrive in arbitrary pieces; [`FrameDecoder::next_message`]
/// returns `Ok(None)` until a whole message is buffered. Bytes after a
/// complete message stay buffered, so switching framing between two
/// messages keeps anything the peer already sent.
#[derive(Debug, Default)]
pub struct FrameDecoder {
    buffer: BytesMut,
    framing: Framing,
}

impl FrameDecoder {
    pub fn new(framing: Framing) -> Self {
        Self {
            buffer: BytesMut::with_capacity(8192),
            framing,
        }
    }

    pub fn framing(&self) -> Framing {
        self.framing
    }

    /// Switch framing for all following messages.
    pub fn set_framing(&mut self, framing: Framing) {
        self.framing = framing;
    }

    /// Append received data.
    pub fn extend(&mut self, data: &[u8]) {
        self.buffer.extend_from_slice(data);
    }

    /// Number of buffered bytes not yet returned as a message.
    pub fn pending(&self) -> usize {
        self.buffer.len()
    }

    /// Take the next complete message out of the buffer, if there is one.
    pub fn next_message(&mut self) -> Result<Option<String>> {
        let message = match self.framing {
            Framing::EndOfMessage => self.next_delimited(),
            Framing::Chunked => self.next_chunked()?,
        };

        message
            .map(|bytes| {
                // Peers commonly put a newline between framed messages
                String::from_utf8(bytes)
                    .map(|text| text.trim().to_string())
                    .map_err(|e| {
                        TransportError::Framing(format!("message is not valid UTF-8: {}", e))
                            .into()
                    })
            })
            .transpose()
    }

    fn next_delimited(&mut self) -> Option<Vec<u8>> {
        let end = memmem::find(&self.buffer, END_OF_MESSAGE)?;
        let message = self.buffer.split_to(end).to_vec();
        self.buffer.advance(END_OF_MESSAGE.len());
        Some(message)
    }

    /// Parse chunks from the start of the buffer without consuming
    /// anything until the end-of-chunks marker is present.
    fn next_chunked(&mut self) -> Result<Option<Vec<u8>>> {
        let buf = &self.buffer[..];
        let mut pos = 0;
        let mut message = Vec::new();
        let mut chunks = 0usize;

        loop {
            // Need at least "\n#" plus one more byte to classify the header
            if buf.len() < pos + 3 {
                return Ok(None);
            }
            if &buf[pos..pos + 2] != b"\n#" {
                return Err(framing_error(format!(
                    "expected chunk header at offset {}",
                    pos
                )));
            }

            if buf[pos + 2] == b'#' {
                if buf.len() < pos + 4 {
                    return Ok(None);
                }
                if buf[pos + 3] != b'\n' {
                    return Err(framing_error("malformed end-of-chunks marker"));
                }
                if chunks == 0 {
                    return Err(framing_error("end-of-chunks marker before any chunk"));
                }
                self.buffer.advance(pos + 4);
                return Ok(Some(message));
            }

            let digits_start = pos + 2;
            let Some(newline) = memchr::memchr(b'\n', &buf[digits_start..]) else {
                if buf.len() - digits_start > MAX_CHUNK_DIGITS {
                    return Err(framing_error("chunk size too long"));
                }
                return Ok(None);
            };
            let digits = &buf[digits_start..digits_start + newline];
            let size = parse_chunk_size(digits)?;

            let data_start = digits_start + newline + 1;
            let data_end = data_start + size;
            if buf.len() < data_end {
                return Ok(None);
            }

            message.extend_from_slice(&buf[data_start..data_end]);
            chunks += 1;
            pos = data_end;
        }
    }
}

fn parse_chunk_size(digits: &[u8]) -> Result<usize> {
    if digits.is_empty()
        || digits.len() > MAX_CHUNK_DIGITS
        || !digits.iter().all(u8::is_ascii_digit)
        || digits[0] == b'0'
    {
        return Err(framing_error(format!(
            "invalid chunk size {:?}",
            String::from_utf8_lossy(digits)
        )));
    }

    let size: u64 = std::str::from_utf8(digits)
        .ok()
        .and_then(|s| s.parse().ok())
        .ok_or_else(|| framing_error("invalid chunk size"))?;

    if size > MAX_CHUNK_SIZE {
        return Err(framing_error(format!("chunk size {} out of range", size)));
    }

    usize::try_from(size).map_err(|_| framing_error("chunk size exceeds address space"))
}

fn framing_error(message: impl Into<String>) -> crate::Error {
    TransportError::Framing(message.into()).into()
}
