//! Structural BER encoder: a flat, parent-linked array of values that
//! serializes to a byte buffer or file in a single linear pass.

use crate::ber::time::gmtime;
use crate::ber::types::{BerLength, BerTag, BerTagClass};
use ber_core::{BerError, BerResult};
use std::io::Write;
use std::path::Path;

/// Maximum number of values a single encoder can hold.
const MAX_VALUES: usize = 256;

/// How `add_data` takes ownership of the bytes it is given.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CopyMode {
    /// Take a heap copy; the encoder owns the bytes independently of the
    /// caller's buffer.
    Deep,
    /// Borrow the caller's slice; the caller must outlive the encoder.
    Shallow,
}

/// A value's body, tagged by storage kind. `Constructed` contributes no
/// bytes of its own at serialization time — its children immediately
/// follow it in the flat array.
enum Body<'a> {
    Inline { buf: [u8; 23], len: u8 },
    Borrowed(&'a [u8]),
    Owned(Vec<u8>),
    Constructed,
}

fn inline_body(bytes: &[u8]) -> Body<'static> {
    debug_assert!(bytes.len() <= 23);
    let mut buf = [0u8; 23];
    buf[..bytes.len()].copy_from_slice(bytes);
    Body::Inline {
        buf,
        len: bytes.len() as u8,
    }
}

struct EncodedValue<'a> {
    tag: BerTag,
    body: Body<'a>,
    /// Length of the value body. For a constructed value this is the sum
    /// of its children's `total_length`, filled in by `end_constructed`.
    value_len: usize,
    /// Index of the parent in `values`, or -1 for top-level.
    parent_index: isize,
    /// `tag_len + length_len + value_len`. For a constructed value this
    /// is also filled in by `end_constructed`, once `value_len` is known.
    total_length: usize,
}

/// Smallest N in 1..=8 such that `-2^(8N-1) <= value < 2^(8N-1)`.
fn minimal_integer_bytes(value: i64) -> Vec<u8> {
    let mut n = 8usize;
    for candidate in 1..=7usize {
        let bits = (8 * candidate - 1) as u32;
        let bound = 1i64 << bits;
        if value >= -bound && value < bound {
            n = candidate;
            break;
        }
    }
    let mut bytes = Vec::with_capacity(n);
    for i in (0..n).rev() {
        bytes.push(((value >> (i * 8)) & 0xFF) as u8);
    }
    bytes
}

/// Format a `GeneralizedTime` string: `YYYYMMDDHHMMSS[.ffffff]Z`, never
/// emitting a bare `.0`.
fn format_generalized_time(epoch_seconds: i64, micros: u32) -> String {
    let (year, month, day, hour, minute, second) = gmtime(epoch_seconds);
    let mut s = format!(
        "{:04}{:02}{:02}{:02}{:02}{:02}",
        year, month, day, hour, minute, second
    );
    if micros != 0 {
        let mut frac = format!("{:06}", micros);
        while frac.ends_with('0') {
            frac.pop();
        }
        s.push('.');
        s.push_str(&frac);
    }
    s.push('Z');
    s
}

/// Accumulates a flat, parent-linked array of encoded values, and
/// serializes them into a single byte buffer or file.
///
/// Each `add_*` appends one leaf; `start_constructed` appends a
/// constructed value and pushes it onto the open-parent stack;
/// `end_constructed` pops it, summing its children's `total_length`
/// (children are, by construction, the contiguous run of entries whose
/// `parent_index` is the popped index).
pub struct BerEncoder<'a> {
    values: Vec<EncodedValue<'a>>,
    open: Vec<usize>,
}

impl<'a> BerEncoder<'a> {
    pub fn new() -> Self {
        Self {
            values: Vec::new(),
            open: Vec::new(),
        }
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            values: Vec::with_capacity(capacity.min(MAX_VALUES)),
            open: Vec::new(),
        }
    }

    fn current_parent(&self) -> isize {
        self.open.last().map(|&i| i as isize).unwrap_or(-1)
    }

    fn push_leaf(&mut self, tag: BerTag, body: Body<'a>, value_len: usize) -> BerResult<()> {
        if self.values.len() >= MAX_VALUES {
            return Err(BerError::CapacityExceeded);
        }
        let tag_len = tag.encode().len();
        let length_len = BerLength::new(value_len).encode().len();
        self.values.push(EncodedValue {
            tag,
            body,
            value_len,
            parent_index: self.current_parent(),
            total_length: tag_len + length_len + value_len,
        });
        Ok(())
    }

    /// BOOLEAN: length 1, value 0xFF if true else 0x00.
    pub fn add_boolean(&mut self, class: BerTagClass, number: u32, value: bool) -> BerResult<()> {
        let byte = if value { 0xFF } else { 0x00 };
        self.push_leaf(BerTag::new(class, false, number), inline_body(&[byte]), 1)
    }

    /// INTEGER: minimal big-endian two's-complement encoding.
    pub fn add_integer(&mut self, class: BerTagClass, number: u32, value: i64) -> BerResult<()> {
        let bytes = minimal_integer_bytes(value);
        let len = bytes.len();
        self.push_leaf(BerTag::new(class, false, number), inline_body(&bytes), len)
    }

    /// NULL: zero-length value.
    pub fn add_null(&mut self, class: BerTagClass, number: u32) -> BerResult<()> {
        self.push_leaf(BerTag::new(class, false, number), inline_body(&[]), 0)
    }

    /// Any primitive byte string (OCTET STRING, or any other primitive
    /// tag carrying raw bytes).
    pub fn add_data(
        &mut self,
        class: BerTagClass,
        number: u32,
        bytes: &'a [u8],
        mode: CopyMode,
    ) -> BerResult<()> {
        let len = bytes.len();
        let body = match mode {
            CopyMode::Deep => Body::Owned(bytes.to_vec()),
            CopyMode::Shallow => Body::Borrowed(bytes),
        };
        self.push_leaf(BerTag::new(class, false, number), body, len)
    }

    /// GeneralizedTime, given a POSIX timestamp and a microsecond
    /// fraction (0 to omit the fractional section entirely).
    pub fn add_generalized_time(
        &mut self,
        class: BerTagClass,
        number: u32,
        epoch_seconds: i64,
        micros: u32,
    ) -> BerResult<()> {
        let text = format_generalized_time(epoch_seconds, micros);
        let bytes = text.into_bytes();
        let len = bytes.len();
        self.push_leaf(BerTag::new(class, false, number), Body::Owned(bytes), len)
    }

    /// Append a constructed value and make it the current parent;
    /// subsequent appends become its children until a matching
    /// `end_constructed`.
    pub fn start_constructed(&mut self, class: BerTagClass, number: u32) -> BerResult<()> {
        if self.values.len() >= MAX_VALUES {
            return Err(BerError::CapacityExceeded);
        }
        let idx = self.values.len();
        self.values.push(EncodedValue {
            tag: BerTag::new(class, true, number),
            body: Body::Constructed,
            value_len: 0,
            parent_index: self.current_parent(),
            total_length: 0,
        });
        self.open.push(idx);
        Ok(())
    }

    /// Close the current constructed value, computing its length from
    /// its children's `total_length`s.
    pub fn end_constructed(&mut self) -> BerResult<()> {
        let idx = self
            .open
            .pop()
            .ok_or(BerError::EncoderMisuse("end_constructed without a matching start_constructed"))?;

        let sum: usize = self.values[idx + 1..]
            .iter()
            .filter(|v| v.parent_index == idx as isize)
            .map(|v| v.total_length)
            .sum();

        let value = &mut self.values[idx];
        let tag_len = value.tag.encode().len();
        let length_len = BerLength::new(sum).encode().len();
        value.value_len = sum;
        value.total_length = tag_len + length_len + sum;
        Ok(())
    }

    /// Serialize every value, in array order, into one byte buffer.
    /// Fails if any `start_constructed` has no matching `end_constructed`.
    pub fn serialize(&self) -> BerResult<Vec<u8>> {
        if !self.open.is_empty() {
            return Err(BerError::ConstructedStillOpen);
        }
        let mut out = Vec::new();
        for value in &self.values {
            out.extend_from_slice(&value.tag.encode());
            out.extend_from_slice(&BerLength::new(value.value_len).encode());
            match &value.body {
                Body::Inline { buf, len } => out.extend_from_slice(&buf[..*len as usize]),
                Body::Borrowed(bytes) => out.extend_from_slice(bytes),
                Body::Owned(bytes) => out.extend_from_slice(bytes),
                Body::Constructed => {}
            }
        }
        Ok(out)
    }

    /// Serialize to `path`. Retries short writes and ignores `EINTR`; any
    /// other write error closes and unlinks the partial file.
    pub fn serialize_to_file(&self, path: &Path) -> BerResult<()> {
        let bytes = self.serialize()?;
        let mut file = std::fs::File::create(path).map_err(BerError::Io)?;
        if let Err(err) = write_all_retrying(&mut file, &bytes) {
            drop(file);
            let _ = std::fs::remove_file(path);
            return Err(err);
        }
        Ok(())
    }
}

fn write_all_retrying(file: &mut std::fs::File, mut bytes: &[u8]) -> BerResult<()> {
    while !bytes.is_empty() {
        match file.write(bytes) {
            Ok(0) => {
                return Err(BerError::Io(std::io::Error::new(
                    std::io::ErrorKind::WriteZero,
                    "write returned 0 bytes",
                )));
            }
            Ok(n) => bytes = &bytes[n..],
            Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(BerError::Io(e)),
        }
    }
    Ok(())
}

impl<'a> Default for BerEncoder<'a> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ber::decoder::BerDecoder;

    #[test]
    fn boolean_true_matches_scenario() {
        let mut encoder = BerEncoder::new();
        encoder.add_boolean(BerTagClass::Universal, 1, true).unwrap();
        assert_eq!(encoder.serialize().unwrap(), vec![0x01, 0x01, 0xFF]);
    }

    #[test]
    fn integer_314_matches_scenario() {
        let mut encoder = BerEncoder::new();
        encoder.add_integer(BerTagClass::Universal, 2, 314).unwrap();
        assert_eq!(encoder.serialize().unwrap(), vec![0x02, 0x02, 0x01, 0x3A]);
    }

    #[test]
    fn integer_negative_one_matches_scenario() {
        let mut encoder = BerEncoder::new();
        encoder.add_integer(BerTagClass::Universal, 2, -1).unwrap();
        assert_eq!(encoder.serialize().unwrap(), vec![0x02, 0x01, 0xFF]);
    }

    #[test]
    fn constructed_context_tag_with_two_integers_matches_scenario() {
        let mut encoder = BerEncoder::new();
        encoder
            .start_constructed(BerTagClass::ContextSpecific, 0)
            .unwrap();
        encoder
            .add_integer(BerTagClass::ContextSpecific, 1, 314)
            .unwrap();
        encoder
            .add_integer(BerTagClass::ContextSpecific, 2, 315)
            .unwrap();
        encoder.end_constructed().unwrap();

        let bytes = encoder.serialize().unwrap();
        assert_eq!(
            bytes,
            vec![0xA0, 0x08, 0x81, 0x02, 0x01, 0x3A, 0x82, 0x02, 0x01, 0x3B]
        );
    }

    #[test]
    fn serialize_fails_while_constructed_is_open() {
        let mut encoder = BerEncoder::new();
        encoder.start_constructed(BerTagClass::Universal, 16).unwrap();
        assert!(matches!(
            encoder.serialize(),
            Err(BerError::ConstructedStillOpen)
        ));
    }

    #[test]
    fn end_constructed_without_start_is_encoder_misuse() {
        let mut encoder = BerEncoder::new();
        assert!(matches!(
            encoder.end_constructed(),
            Err(BerError::EncoderMisuse(_))
        ));
    }

    #[test]
    fn round_trips_through_decoder() {
        let mut encoder = BerEncoder::new();
        encoder
            .add_data(
                BerTagClass::Universal,
                4,
                b"hello world",
                CopyMode::Deep,
            )
            .unwrap();
        let bytes = encoder.serialize().unwrap();

        let mut decoder = BerDecoder::new(&bytes);
        let value = decoder.next().unwrap();
        assert_eq!(value.tag_number(), 4);
        assert_eq!(value.contents(), b"hello world");
    }

    #[test]
    fn capacity_exceeded_is_reported_faithfully() {
        let mut encoder = BerEncoder::new();
        for _ in 0..MAX_VALUES {
            encoder.add_null(BerTagClass::Universal, 5).unwrap();
        }
        assert!(matches!(
            encoder.add_null(BerTagClass::Universal, 5),
            Err(BerError::CapacityExceeded)
        ));
    }
}
