//! BER (Basic Encoding Rules) codec for ASN.1
//!
//! This crate provides a streaming decoder, a structural encoder, and a
//! pretty-printer for ASN.1 values encoded per ITU-T X.690 BER.
//!
//! # ASN.1 BER Encoding Overview
//!
//! Every ASN.1 value is encoded as a TLV (Tag-Length-Value) triplet:
//!
//! ```text
//! [Tag] [Length] [Value]
//! ```
//!
//! ## Tag Encoding
//!
//! - **Class** (2 bits): Universal (00), Application (01), Context-specific (10), Private (11)
//! - **Constructed/Primitive** (1 bit): 0 = Primitive, 1 = Constructed
//! - **Tag Number**: 0-30 in the low 5 bits, or 0x1F followed by base-128
//!   continuation octets for larger numbers.
//!
//! ## Length Encoding
//!
//! - **Short form** (1 byte, bit 7 = 0): lengths 0-127.
//! - **Long form**: first byte `0x80 | n`, followed by `n` big-endian
//!   content octets.
//! - **Indefinite form**: `0x80` alone, valid only on constructed values;
//!   terminated by an explicit `00 00` End-Of-Contents TLV.
//!
//! # Scope
//!
//! The decoder accepts both definite and indefinite length; the encoder
//! always emits definite length (no DER/CER canonicalization). Integers
//! are bounded to 64-bit signed.

pub mod ber;

pub use ber::decoder::BerDecoder;
pub use ber::encoder::{BerEncoder, CopyMode};
pub use ber::printer::Printer;
pub use ber::types::{BerLength, BerTag, BerTagClass, UniversalType};
pub use ber::value::BerValue;
