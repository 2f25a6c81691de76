//! BER (Basic Encoding Rules) encoder and decoder for ASN.1
//!
//! Each ASN.1 value is encoded as a TLV (Tag-Length-Value) triplet:
//!
//! ```text
//! [Tag] [Length] [Value]
//! ```
//!
//! ## Tag Encoding
//!
//! ```text
//! Bits: 8 7 6 5 4 3 2 1
//!       C C P T T T T T
//! ```
//! - CC = Class (00=Universal, 01=Application, 10=Context, 11=Private)
//! - P = Primitive (0) or Constructed (1)
//! - TTTTT = Tag number (0-30), or 11111 indicates a long-form tag number
//!   follows as base-128 continuation octets.
//!
//! ## Length Encoding
//!
//! - **Short form** (1 byte): bit 7 clear, bits 6-0 hold the length (0-127).
//! - **Long form**: first byte's bits 6-0 give the number of following
//!   big-endian length octets.
//! - **Indefinite**: the single octet `0x80`, legal only on constructed
//!   values, terminated by an explicit `00 00` end-of-contents TLV.
//!
//! # Module layout
//!
//! - [`types`]: `BerTag`, `BerTagClass`, `BerLength`, `UniversalType`.
//! - [`time`]: civil date/POSIX-seconds conversion for UTCTime/GeneralizedTime.
//! - [`value`]: [`value::BerValue`], a borrowed decoded TLV with typed decoders.
//! - [`decoder`]: the streaming [`decoder::BerDecoder`].
//! - [`encoder`]: the structural [`encoder::BerEncoder`].
//! - [`printer`]: the [`printer::Printer`] pretty-printer.

pub mod decoder;
pub mod encoder;
pub mod printer;
pub mod time;
pub mod types;
pub mod value;

pub use decoder::BerDecoder;
pub use encoder::{BerEncoder, CopyMode};
pub use printer::Printer;
pub use types::{BerLength, BerTag, BerTagClass, UniversalType};
pub use value::BerValue;
