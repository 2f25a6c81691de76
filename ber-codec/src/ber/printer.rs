//! Recursive pretty-printer over a [`BerDecoder`](crate::ber::decoder::BerDecoder).

use crate::ber::decoder::BerDecoder;
use crate::ber::types::{BerTagClass, UniversalType};
use crate::ber::value::BerValue;
use ber_core::{BerError, BerResult};
use std::io::Write;

const HEX_BYTES_PER_LINE: usize = 16;

/// Writes a human-readable dump of a BER-encoded buffer to any
/// `std::io::Write`: one header/body/footer block per top-level value,
/// recursing into constructed values with deeper indentation.
pub struct Printer {
    tab_size: usize,
}

impl Printer {
    pub fn new() -> Self {
        Self { tab_size: 2 }
    }

    pub fn with_tab_size(tab_size: usize) -> Self {
        Self { tab_size }
    }

    /// Print every top-level value in `data`.
    pub fn print(&self, data: &[u8], out: &mut dyn Write) -> BerResult<()> {
        let mut decoder = BerDecoder::new(data);
        self.print_values(&mut decoder, 0, out)
    }

    fn indent(&self, depth: usize, out: &mut dyn Write) -> BerResult<()> {
        write!(out, "{:width$}", "", width = depth * self.tab_size)?;
        Ok(())
    }

    fn print_values(
        &self,
        decoder: &mut BerDecoder<'_>,
        depth: usize,
        out: &mut dyn Write,
    ) -> BerResult<()> {
        loop {
            let offset = decoder.offset();
            let value = match decoder.next() {
                Ok(value) => value,
                Err(BerError::Eof) => return Ok(()),
                Err(e) => return Err(e),
            };

            self.indent(depth, out)?;
            writeln!(
                out,
                "[offset {:#010x}] {}",
                offset,
                describe_tag(&value)
            )?;

            if value.is_constructed() {
                self.indent(depth, out)?;
                writeln!(out, "{{")?;
                decoder.enter_constructed()?;
                self.print_values(decoder, depth + 1, out)?;
                decoder.leave_constructed()?;
                self.indent(depth, out)?;
                writeln!(out, "}}")?;
            } else {
                self.print_typed_decode(&value, depth, out)?;
                self.print_ascii_dump(value.contents(), depth, out)?;
                self.print_hex_dump(value.contents(), depth, out)?;
            }
        }
    }

    fn print_typed_decode(
        &self,
        value: &BerValue<'_>,
        depth: usize,
        out: &mut dyn Write,
    ) -> BerResult<()> {
        if value.tag_class() != BerTagClass::Universal {
            return Ok(());
        }
        let Some(universal) = UniversalType::from_number(value.tag_number()) else {
            return Ok(());
        };

        let decoded = match universal {
            UniversalType::Boolean => value.decode_boolean().ok().map(|b| b.to_string()),
            UniversalType::Integer => value.decode_integer().ok().map(|i| i.to_string()),
            UniversalType::Enumerated => value.decode_enumerated().ok().map(|i| i.to_string()),
            UniversalType::Null => value.decode_null().ok().map(|_| "NULL".to_string()),
            UniversalType::ObjectIdentifier => value.decode_oid().ok().map(format_oid),
            UniversalType::UtcTime => value
                .decode_utc_time()
                .ok()
                .map(|secs| format!("{} (POSIX seconds)", secs)),
            UniversalType::GeneralizedTime => {
                value.decode_generalized_time().ok().map(|(secs, micros)| {
                    format!("{} (POSIX seconds), {} us", secs, micros)
                })
            }
            _ => None,
        };

        if let Some(decoded) = decoded {
            self.indent(depth, out)?;
            writeln!(out, "  {} = {}", universal.label(), decoded)?;
        }
        Ok(())
    }

    fn print_ascii_dump(
        &self,
        bytes: &[u8],
        depth: usize,
        out: &mut dyn Write,
    ) -> BerResult<()> {
        if bytes.is_empty() {
            return Ok(());
        }
        for chunk in bytes.chunks(HEX_BYTES_PER_LINE) {
            self.indent(depth, out)?;
            write!(out, "  ascii: ")?;
            for &byte in chunk {
                let printable = (0x20..0x7F).contains(&byte);
                write!(out, "{}", if printable { byte as char } else { '.' })?;
            }
            writeln!(out)?;
        }
        Ok(())
    }

    fn print_hex_dump(&self, bytes: &[u8], depth: usize, out: &mut dyn Write) -> BerResult<()> {
        if bytes.is_empty() {
            return Ok(());
        }
        for chunk in bytes.chunks(HEX_BYTES_PER_LINE) {
            self.indent(depth, out)?;
            write!(out, "  hex:   ")?;
            for byte in chunk {
                write!(out, "{:02x} ", byte)?;
            }
            writeln!(out)?;
        }
        Ok(())
    }
}

impl Default for Printer {
    fn default() -> Self {
        Self::new()
    }
}

fn describe_tag(value: &BerValue<'_>) -> String {
    let class = match value.tag_class() {
        BerTagClass::Universal => "Universal",
        BerTagClass::Application => "Application",
        BerTagClass::ContextSpecific => "Context",
        BerTagClass::Private => "Private",
    };
    let label = if value.tag_class() == BerTagClass::Universal {
        UniversalType::from_number(value.tag_number()).map(UniversalType::label)
    } else {
        None
    };
    let kind = if value.is_constructed() {
        "constructed"
    } else {
        "primitive"
    };

    match label {
        Some(label) => format!(
            "{} {} ({}) tag={} length={} total={}",
            class,
            label,
            kind,
            value.tag_number(),
            value.contents_length(),
            value.total_length()
        ),
        None => format!(
            "{} {} tag={} length={} total={}",
            class,
            kind,
            value.tag_number(),
            value.contents_length(),
            value.total_length()
        ),
    }
}

fn format_oid(components: Vec<u32>) -> String {
    components
        .iter()
        .map(u32::to_string)
        .collect::<Vec<_>>()
        .join(".")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prints_boolean_value() {
        let printer = Printer::new();
        let mut out = Vec::new();
        printer.print(&[0x01, 0x01, 0xFF], &mut out).unwrap();
        let text = String::from_utf8(out).unwrap();
        assert!(text.contains("BOOLEAN"));
        assert!(text.contains("true"));
    }

    #[test]
    fn prints_constructed_braces_and_recurses() {
        let data = [0xA0, 0x08, 0x81, 0x02, 0x01, 0x3A, 0x82, 0x02, 0x01, 0x3B];
        let printer = Printer::new();
        let mut out = Vec::new();
        printer.print(&data, &mut out).unwrap();
        let text = String::from_utf8(out).unwrap();
        assert!(text.contains('{'));
        assert!(text.contains('}'));
        assert_eq!(text.matches("Context").count(), 3);
    }

    #[test]
    fn prints_oid_dotted_form() {
        let data = [0x06, 0x06, 0x2A, 0x86, 0x48, 0x86, 0xF7, 0x0D];
        let printer = Printer::new();
        let mut out = Vec::new();
        printer.print(&data, &mut out).unwrap();
        let text = String::from_utf8(out).unwrap();
        assert!(text.contains("1.2.840.113549"));
    }

    #[test]
    fn hex_dump_wraps_at_sixteen_bytes_per_line() {
        let mut data = vec![0x04, 20];
        data.extend((0u8..20).collect::<Vec<_>>());
        let printer = Printer::new();
        let mut out = Vec::new();
        printer.print(&data, &mut out).unwrap();
        let text = String::from_utf8(out).unwrap();
        assert_eq!(text.matches("hex:").count(), 2);
    }
}
