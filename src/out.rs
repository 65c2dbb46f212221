//! Output sinks a template renders into.

use std::io;

use crate::{encoding::Encoding, error::RuntimeErrorKind};

pub type OutResult = Result<(), RuntimeErrorKind>;

/// A character or byte sink. Byte sinks receive placeholder values already
/// serialized in [`Out::encoding`].
pub trait Out {
    fn write_str(&mut self, text: &str) -> OutResult;

    fn write_bytes(&mut self, bytes: &[u8]) -> OutResult;

    fn write_chars(&mut self, chars: &[char]) -> OutResult {
        self.write_str(&chars.iter().collect::<String>())
    }

    fn encoding(&self) -> &str;

    fn is_byte_stream(&self) -> bool;
}

/// Collects output in memory.
#[derive(Debug, Default, Clone)]
pub struct StringOut {
    buffer: String,
}

impl StringOut {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            buffer: String::with_capacity(capacity),
        }
    }

    pub fn as_str(&self) -> &str {
        &self.buffer
    }

    pub fn into_string(self) -> String {
        self.buffer
    }
}

impl Out for StringOut {
    fn write_str(&mut self, text: &str) -> OutResult {
        self.buffer.push_str(text);
        Ok(())
    }

    fn write_bytes(&mut self, bytes: &[u8]) -> OutResult {
        self.buffer.push_str(&String::from_utf8_lossy(bytes));
        Ok(())
    }

    fn encoding(&self) -> &str {
        Encoding::Utf8.name()
    }

    fn is_byte_stream(&self) -> bool {
        false
    }
}

/// Byte sink over any [`io::Write`]. Text is encoded on the way out.
#[derive(Debug)]
pub struct WriterOut<W> {
    writer: W,
    encoding: Encoding,
}

impl<W: io::Write> WriterOut<W> {
    pub fn new(writer: W, encoding: &str) -> Result<Self, RuntimeErrorKind> {
        Ok(Self {
            writer,
            encoding: Encoding::for_name(encoding)?,
        })
    }

    pub fn into_inner(self) -> W {
        self.writer
    }
}

impl<W: io::Write> Out for WriterOut<W> {
    fn write_str(&mut self, text: &str) -> OutResult {
        match self.encoding {
            Encoding::Utf8 => self.writer.write_all(text.as_bytes())?,
            other => self.writer.write_all(&other.encode(text))?,
        }
        Ok(())
    }

    fn write_bytes(&mut self, bytes: &[u8]) -> OutResult {
        self.writer.write_all(bytes)?;
        Ok(())
    }

    fn encoding(&self) -> &str {
        self.encoding.name()
    }

    fn is_byte_stream(&self) -> bool {
        true
    }
}

/// Drops everything written to it.
#[derive(Debug, Default, Clone, Copy)]
pub struct DiscardOut;

impl Out for DiscardOut {
    fn write_str(&mut self, _text: &str) -> OutResult {
        Ok(())
    }

    fn write_bytes(&mut self, _bytes: &[u8]) -> OutResult {
        Ok(())
    }

    fn encoding(&self) -> &str {
        Encoding::Utf8.name()
    }

    fn is_byte_stream(&self) -> bool {
        false
    }
}
