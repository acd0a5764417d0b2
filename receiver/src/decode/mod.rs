//! Decoder system for VIRTA
//!
//! Decoders turn the raw byte stream of a connection into a lazy sequence of
//! typed records. The receiver pulls one record at a time, so a decoder never
//! needs to hold more than the record it is currently assembling.

mod lines;

pub use lines::{DEFAULT_BUFFER_CAPACITY, LineDecoder, Lines};

use crate::error::DecodeError;
use std::io::Read;

/// Lazy, forward-only record sequence borrowed from a byte source
///
/// Yields `Err` at most once; the sequence is exhausted afterwards.
pub type Records<'a, T> = Box<dyn Iterator<Item = Result<T, DecodeError>> + 'a>;

/// Decoder trait - maps a byte source to a record sequence
///
/// The source is borrowed: a decoder may wrap it in its own buffering, but it
/// never owns (and so never closes) the connection behind it.
///
/// # Example
///
/// ```
/// use std::io::Read;
/// use virta_receiver::decode::{Decoder, Records};
/// use virta_receiver::error::DecodeError;
///
/// /// One record per 4-byte big-endian integer
/// struct U32Decoder;
///
/// impl Decoder for U32Decoder {
///     type Record = u32;
///
///     fn name(&self) -> &'static str { "u32" }
///
///     fn decode<'a>(&self, source: &'a mut dyn Read) -> Records<'a, u32> {
///         Box::new(std::iter::from_fn(move || {
///             let mut word = [0u8; 4];
///             match source.read_exact(&mut word) {
///                 Ok(()) => Some(Ok(u32::from_be_bytes(word))),
///                 Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => None,
///                 Err(e) => Some(Err(DecodeError::Io(e))),
///             }
///         }))
///     }
/// }
///
/// let mut bytes: &[u8] = &[0, 0, 0, 7, 0, 0, 1, 0];
/// let values: Vec<u32> = U32Decoder.decode(&mut bytes).map(Result::unwrap).collect();
/// assert_eq!(values, vec![7, 256]);
/// ```
pub trait Decoder: Send + Sync + 'static {
    /// Record type produced by this decoder
    type Record: Send + 'static;

    /// Decoder name for identification and logging
    fn name(&self) -> &'static str;

    /// Wrap a byte source in a lazy record sequence
    fn decode<'a>(&self, source: &'a mut dyn Read) -> Records<'a, Self::Record>;
}

impl<D: Decoder + ?Sized> Decoder for std::sync::Arc<D> {
    type Record = D::Record;

    fn name(&self) -> &'static str {
        (**self).name()
    }

    fn decode<'a>(&self, source: &'a mut dyn Read) -> Records<'a, Self::Record> {
        (**self).decode(source)
    }
}
