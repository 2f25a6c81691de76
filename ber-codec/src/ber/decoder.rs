//! Streaming BER decoder: produces successive TLVs from a byte slice, with
//! bounded support for entering/leaving constructed subtrees.

use crate::ber::types::{BerLength, BerTag};
use crate::ber::value::BerValue;
use ber_core::{BerError, BerResult};

/// Maximum depth of the constructed-frame stack.
const MAX_DEPTH: usize = 128;

/// Maximum nesting depth of the indefinite-length EOC look-ahead.
const MAX_EOC_NESTING: usize = 128;

struct Frame {
    /// Absolute offset one past the contents of this frame (the position
    /// of a following EOC, for indefinite-length frames).
    end: usize,
    /// Absolute offset to resume the outer level at after this frame is
    /// left (past the contents and, for indefinite length, past the EOC).
    resume_at: usize,
}

struct PendingConstructed {
    contents_start: usize,
    contents_end: usize,
    resume_at: usize,
}

/// Streaming parser over a byte slice.
///
/// `next` always advances past a decoded value's `total_length`,
/// treating constructed values as opaque TLVs by default; call
/// `enter_constructed` right after a constructed `next` result to
/// reposition the decoder onto the value's children instead.
pub struct BerDecoder<'a> {
    buffer: &'a [u8],
    offset: usize,
    stack: Vec<Frame>,
    pending: Option<PendingConstructed>,
}

impl<'a> BerDecoder<'a> {
    pub fn new(buffer: &'a [u8]) -> Self {
        Self {
            buffer,
            offset: 0,
            stack: Vec::new(),
            pending: None,
        }
    }

    /// Current offset into the original buffer.
    pub fn offset(&self) -> usize {
        self.offset
    }

    /// Current constructed-frame nesting depth.
    pub fn depth(&self) -> usize {
        self.stack.len()
    }

    fn current_limit(&self) -> usize {
        self.stack.last().map(|f| f.end).unwrap_or(self.buffer.len())
    }

    /// Decode one TLV at the current offset within the active frame (the
    /// whole buffer, at top level).
    pub fn next(&mut self) -> BerResult<BerValue<'a>> {
        self.pending = None;

        let limit = self.current_limit();
        if self.offset >= limit {
            return Err(BerError::Eof);
        }

        let start = self.offset;
        let window = &self.buffer[start..limit];

        let (tag, tag_len) = BerTag::decode(window)?;
        let primitive = !tag.is_constructed();
        let (length, length_len) = BerLength::decode(&window[tag_len..], primitive)?;

        let header_len = tag_len + length_len;
        let contents_start = start + header_len;

        let (contents_length, eoc_length) = match length {
            BerLength::Short(n) => (n as usize, 0),
            BerLength::Long(n) => (n, 0),
            BerLength::Indefinite => (self.find_eoc(contents_start, limit, 0)?, 2),
        };

        let contents_end = contents_start + contents_length;
        if contents_end > limit {
            return Err(BerError::UnexpectedEof {
                needed: contents_end - limit,
            });
        }

        let total_length = header_len + contents_length + eoc_length;
        let resume_at = start + total_length;
        self.offset = resume_at;

        if !primitive {
            self.pending = Some(PendingConstructed {
                contents_start,
                contents_end,
                resume_at,
            });
        }

        Ok(BerValue::new(
            tag.class(),
            tag.number(),
            primitive,
            &self.buffer[contents_start..contents_end],
            total_length,
        ))
    }

    /// Reposition onto the children of the constructed value just
    /// returned by `next`. Errors if `next` did not just return a
    /// constructed value, or if the frame stack is already at its bound.
    pub fn enter_constructed(&mut self) -> BerResult<()> {
        let pending = self.pending.take().ok_or(BerError::DecoderMisuse(
            "enter_constructed called without a preceding constructed value from next",
        ))?;

        if self.stack.len() >= MAX_DEPTH {
            // Put it back: the caller may legitimately retry after
            // handling the error (e.g. by treating the value as opaque).
            self.pending = Some(pending);
            return Err(BerError::MaxDepthExceeded);
        }

        self.stack.push(Frame {
            end: pending.contents_end,
            resume_at: pending.resume_at,
        });
        self.offset = pending.contents_start;
        Ok(())
    }

    /// Pop the current frame, restoring the outer offset just past its
    /// contents (and past its EOC, if indefinite).
    pub fn leave_constructed(&mut self) -> BerResult<()> {
        let frame = self
            .stack
            .pop()
            .ok_or(BerError::DecoderMisuse("leave_constructed called with an empty frame stack"))?;
        self.offset = frame.resume_at;
        self.pending = None;
        Ok(())
    }

    /// Look ahead from `start` for the `00 00` EOC TLV terminating an
    /// indefinite-length constructed value, returning the content length
    /// up to (not including) the EOC. Recurses through nested indefinite
    /// children, bounded by `MAX_EOC_NESTING`.
    fn find_eoc(&self, start: usize, limit: usize, depth: usize) -> BerResult<usize> {
        if depth >= MAX_EOC_NESTING {
            return Err(BerError::MaxNestedEocExceeded);
        }

        let mut pos = start;
        loop {
            if pos >= limit {
                return Err(BerError::UnexpectedEof { needed: 1 });
            }

            let window = &self.buffer[pos..limit];
            let (tag, tag_len) = BerTag::decode(window)?;
            let primitive = !tag.is_constructed();
            let (length, length_len) = BerLength::decode(&window[tag_len..], primitive)?;
            let header_len = tag_len + length_len;
            let value_start = pos + header_len;

            if tag.is_eoc() {
                return match length.value() {
                    Some(0) => Ok(pos - start),
                    _ => Err(BerError::InvalidLength(
                        "EOC TLV must have zero length".to_string(),
                    )),
                };
            }

            pos = match length {
                BerLength::Indefinite => {
                    let nested_len = self.find_eoc(value_start, limit, depth + 1)?;
                    value_start + nested_len + 2
                }
                _ => {
                    let n = length.value().expect("definite length always has a value");
                    let value_end = value_start + n;
                    if value_end > limit {
                        return Err(BerError::UnexpectedEof {
                            needed: value_end - limit,
                        });
                    }
                    value_end
                }
            };
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_boolean_true() {
        let mut decoder = BerDecoder::new(&[0x01, 0x01, 0xFF]);
        let value = decoder.next().unwrap();
        assert_eq!(value.tag_number(), 1);
        assert!(value.decode_boolean().unwrap());
        assert!(matches!(decoder.next(), Err(BerError::Eof)));
    }

    #[test]
    fn decodes_constructed_with_two_integers() {
        // A0 08 81 02 01 3A 82 02 01 3B
        let data = [0xA0, 0x08, 0x81, 0x02, 0x01, 0x3A, 0x82, 0x02, 0x01, 0x3B];
        let mut decoder = BerDecoder::new(&data);
        let outer = decoder.next().unwrap();
        assert!(outer.is_constructed());
        assert_eq!(outer.contents_length(), 8);
        decoder.enter_constructed().unwrap();

        let first = decoder.next().unwrap();
        assert_eq!(first.tag_number(), 1);
        assert_eq!(first.decode_integer().unwrap(), 314);

        let second = decoder.next().unwrap();
        assert_eq!(second.tag_number(), 2);
        assert_eq!(second.decode_integer().unwrap(), 315);

        assert!(matches!(decoder.next(), Err(BerError::Eof)));
        decoder.leave_constructed().unwrap();
        assert!(matches!(decoder.next(), Err(BerError::Eof)));
    }

    #[test]
    fn decodes_indefinite_sequence() {
        // 30 80 02 01 05 00 00
        let data = [0x30, 0x80, 0x02, 0x01, 0x05, 0x00, 0x00];
        let mut decoder = BerDecoder::new(&data);
        let outer = decoder.next().unwrap();
        assert!(outer.is_constructed());
        assert_eq!(outer.contents_length(), 3);
        assert_eq!(outer.total_length(), 7);

        decoder.enter_constructed().unwrap();
        let inner = decoder.next().unwrap();
        assert_eq!(inner.decode_integer().unwrap(), 5);
        assert!(matches!(decoder.next(), Err(BerError::Eof)));
        decoder.leave_constructed().unwrap();
        assert!(matches!(decoder.next(), Err(BerError::Eof)));
    }

    #[test]
    fn indefinite_with_missing_eoc_is_unexpected_eof() {
        let data = [0x30, 0x80, 0x02, 0x01, 0x05];
        let mut decoder = BerDecoder::new(&data);
        assert!(matches!(
            decoder.next(),
            Err(BerError::UnexpectedEof { .. })
        ));
    }

    #[test]
    fn indefinite_with_nonzero_length_tag_zero_is_invalid_length() {
        let data = [0x30, 0x80, 0x00, 0x01, 0x00];
        let mut decoder = BerDecoder::new(&data);
        assert!(matches!(decoder.next(), Err(BerError::InvalidLength(_))));
    }

    #[test]
    fn depth_bound_is_enforced() {
        // 129 nested indefinite SEQUENCEs, closed by 129 EOCs.
        let mut data = Vec::new();
        for _ in 0..129 {
            data.extend_from_slice(&[0x30, 0x80]);
        }
        data.extend_from_slice(&[0x00, 0x00].repeat(129));

        let mut decoder = BerDecoder::new(&data);
        for _ in 0..128 {
            let value = decoder.next().unwrap();
            assert!(value.is_constructed());
            decoder.enter_constructed().unwrap();
        }
        let value = decoder.next().unwrap();
        assert!(value.is_constructed());
        assert!(matches!(
            decoder.enter_constructed(),
            Err(BerError::MaxDepthExceeded)
        ));
    }
}
