use std::iter::Extend;

use memchr::memchr;
use memchr::memmem;
use thiserror::Error;

use crate::bstr::BStr;
use crate::interface::types::InputValue;

const MAX_BULK_LEN: usize = 4 * 1024;
const MAX_INLINE_LEN: usize = 4 * 1024;

#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum ProtocolError {
    #[error("expected '{expected}', got '{found}'")]
    UnexpectedByte { expected: char, found: char },
    #[error("invalid length")]
    InvalidLength,
    #[error("bulk string is too large")]
    TooLarge,
    #[error("expected '\\r\\n' after bulk string")]
    MissingTerminator,
    #[error("inline request is too long")]
    InlineTooLong,
}

/// Splits the incoming byte stream into requests.
///
/// A request is either a RESP array of bulk strings (what `redis-cli`
/// sends) or an inline command: one line of whitespace separated words.
#[derive(Debug, Default)]
pub struct Parser {
    buffer: Vec<u8>,
}

impl Parser {
    pub fn new() -> Self {
        Parser::default()
    }

    /// Returns the next complete request, `Ok(None)` if more bytes are
    /// needed. Empty requests are skipped.
    pub fn parse(&mut self) -> Result<Option<Vec<InputValue>>, ProtocolError> {
        loop {
            let request = match self.buffer.first() {
                None => return Ok(None),
                Some(b'*') => self.parse_resp()?,
                Some(_) => self.parse_inline()?,
            };
            match request {
                Some(items) if items.is_empty() => continue,
                other => return Ok(other),
            }
        }
    }

    /// Drops whatever is buffered, used after a protocol error.
    pub fn clear(&mut self) {
        self.buffer.clear();
    }

    fn parse_inline(&mut self) -> Result<Option<Vec<InputValue>>, ProtocolError> {
        let Some(newline) = memchr(b'\n', &self.buffer) else {
            if self.buffer.len() > MAX_INLINE_LEN {
                return Err(ProtocolError::InlineTooLong);
            }
            return Ok(None);
        };
        let line = self.buffer[..newline].strip_suffix(b"\r").unwrap_or(&self.buffer[..newline]);
        let words = line
            .split(u8::is_ascii_whitespace)
            .filter(|w| !w.is_empty())
            .map(<[u8]>::to_vec)
            .collect();
        self.buffer.drain(..=newline);
        Ok(Some(words))
    }

    fn parse_resp(&mut self) -> Result<Option<Vec<InputValue>>, ProtocolError> {
        let mut pos = 0;
        let Some(count) = read_header(&self.buffer, &mut pos, b'*')? else {
            return Ok(None);
        };

        let mut items = Vec::with_capacity(count.min(64));
        for _ in 0..count {
            let Some(len) = read_header(&self.buffer, &mut pos, b'$')? else {
                return Ok(None);
            };
            if len > MAX_BULK_LEN {
                return Err(ProtocolError::TooLarge);
            }
            let end = pos + len;
            if self.buffer.len() < end + 2 {
                // not enough length for "<data>\r\n"
                return Ok(None);
            }
            if &self.buffer[end..end + 2] != b"\r\n" {
                return Err(ProtocolError::MissingTerminator);
            }
            items.push(self.buffer[pos..end].to_vec());
            pos = end + 2;
        }

        self.buffer.drain(..pos);
        Ok(Some(items))
    }
}

/// Reads `<marker><digits>\r\n` at `pos`, advancing past it.
fn read_header(buf: &[u8], pos: &mut usize, marker: u8) -> Result<Option<usize>, ProtocolError> {
    let rest = &buf[*pos..];
    let Some(&first) = rest.first() else {
        return Ok(None);
    };
    if first != marker {
        return Err(ProtocolError::UnexpectedByte {
            expected: marker as char,
            found: first as char,
        });
    }
    let Some(end) = memmem::find(rest, b"\r\n") else {
        if rest.len() > 32 {
            return Err(ProtocolError::InvalidLength);
        }
        return Ok(None);
    };
    let len = rest[1..end]
        .to_str()
        .filter(|s| s.bytes().all(|b| b.is_ascii_digit()))
        .and_then(|s| s.parse::<usize>().ok())
        .ok_or(ProtocolError::InvalidLength)?;
    *pos += end + 2;
    Ok(Some(len))
}

impl<'a> Extend<&'a u8> for Parser {
    fn extend<T: IntoIterator<Item = &'a u8>>(&mut self, iter: T) {
        self.buffer.extend(iter);
    }
}
