//! Newline-delimited UTF-8 text decoder

use super::{Decoder, Records};
use crate::error::DecodeError;
use std::io::{BufRead, BufReader, Read};
use std::iter::FusedIterator;

/// Read buffer size used when none is configured
pub const DEFAULT_BUFFER_CAPACITY: usize = 8 * 1024;

/// Decoder producing one `String` per `\n`-terminated line
///
/// A trailing `\r` is stripped, so CRLF input decodes the same as LF input.
/// A final line without a terminating newline is still yielded.
#[derive(Debug, Clone, Copy)]
pub struct LineDecoder {
    max_line_length: usize,
    buffer_capacity: usize,
}

impl LineDecoder {
    /// Line decoder with no length limit
    pub fn new() -> Self {
        Self {
            max_line_length: usize::MAX,
            buffer_capacity: DEFAULT_BUFFER_CAPACITY,
        }
    }

    /// Reject lines longer than `max` bytes (newline excluded)
    pub fn with_max_line_length(mut self, max: usize) -> Self {
        self.max_line_length = max;
        self
    }

    /// Size of the internal read buffer
    pub fn with_buffer_capacity(mut self, capacity: usize) -> Self {
        self.buffer_capacity = capacity.max(1);
        self
    }

    pub fn max_line_length(&self) -> usize {
        self.max_line_length
    }

    /// Wrap a reader directly, without boxing
    pub fn lines<R: Read>(&self, source: R) -> Lines<R> {
        Lines::with_config(source, self.buffer_capacity, self.max_line_length)
    }
}

impl Default for LineDecoder {
    fn default() -> Self {
        Self::new()
    }
}

impl Decoder for LineDecoder {
    type Record = String;

    fn name(&self) -> &'static str {
        "lines"
    }

    fn decode<'a>(&self, source: &'a mut dyn Read) -> Records<'a, String> {
        Box::new(self.lines(source))
    }
}

/// Lazy line sequence over a reader
///
/// Only the read buffer and the line being assembled are held in memory.
/// End of stream and the first error both exhaust the sequence for good; a
/// fresh source needs a fresh `Lines`.
pub struct Lines<R> {
    reader: Option<BufReader<R>>,
    max_line_length: usize,
    line: Vec<u8>,
    peeked: Option<Result<String, DecodeError>>,
    exhausted: bool,
}

impl<R: Read> Lines<R> {
    pub fn new(source: R) -> Self {
        Self::with_config(source, DEFAULT_BUFFER_CAPACITY, usize::MAX)
    }

    pub fn with_config(source: R, buffer_capacity: usize, max_line_length: usize) -> Self {
        Self {
            reader: Some(BufReader::with_capacity(buffer_capacity.max(1), source)),
            max_line_length,
            line: Vec::new(),
            peeked: None,
            exhausted: false,
        }
    }

    /// Whether another record (or error) is available
    ///
    /// May block reading from the source. Calling it repeatedly does not
    /// advance the sequence.
    pub fn has_next(&mut self) -> bool {
        if self.peeked.is_none() {
            self.peeked = self.read_record();
        }
        self.peeked.is_some()
    }

    /// True once end of stream or an error has been reached and consumed
    pub fn is_exhausted(&self) -> bool {
        self.exhausted && self.peeked.is_none()
    }

    /// Release the read buffer and exhaust the sequence
    ///
    /// The underlying source is dropped with the buffer; for a borrowed
    /// source that only ends the borrow.
    pub fn close(&mut self) {
        self.reader = None;
        self.line = Vec::new();
        self.peeked = None;
        self.exhausted = true;
    }

    /// Bytes currently held by the decoder (read buffer + line scratch)
    pub fn buffered_capacity(&self) -> usize {
        self.reader.as_ref().map_or(0, BufReader::capacity) + self.line.capacity()
    }

    fn read_record(&mut self) -> Option<Result<String, DecodeError>> {
        if self.exhausted {
            return None;
        }
        let reader = self.reader.as_mut()?;

        // Two extra bytes leave room for "\r\n" after a line of maximum length.
        let limit = (self.max_line_length as u64).saturating_add(2);
        self.line.clear();
        let read = match reader.take(limit).read_until(b'\n', &mut self.line) {
            Ok(read) => read,
            Err(e) => return self.fail(DecodeError::Io(e)),
        };
        if read == 0 {
            self.exhausted = true;
            return None;
        }

        if self.line.last() == Some(&b'\n') {
            self.line.pop();
            if self.line.last() == Some(&b'\r') {
                self.line.pop();
            }
        }
        if self.line.len() > self.max_line_length {
            return self.fail(DecodeError::LineTooLong {
                max: self.max_line_length,
            });
        }

        match std::str::from_utf8(&self.line) {
            Ok(line) => Some(Ok(line.to_owned())),
            Err(_) => self.fail(DecodeError::InvalidUtf8),
        }
    }

    fn fail(&mut self, err: DecodeError) -> Option<Result<String, DecodeError>> {
        self.exhausted = true;
        Some(Err(err))
    }
}

impl<R: Read> Iterator for Lines<R> {
    type Item = Result<String, DecodeError>;

    fn next(&mut self) -> Option<Self::Item> {
        match self.peeked.take() {
            Some(item) => Some(item),
            None => self.read_record(),
        }
    }
}

impl<R: Read> FusedIterator for Lines<R> {}
