//! BER tag and length primitives (X.690 8.1.2 / 8.1.3).
//!
//! Readers work on whatever bytes are available and return `Ok(None)` when the
//! header is cut short, so the caller can wait for the next chunk. Writers
//! always produce the DER (minimal, definite) form.

use std::fmt;

use crate::error::DecodeError;

/// Tag class bits (bits 8-7 of the identifier octet).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Class {
    Universal,
    Application,
    Context,
    Private,
}

impl Class {
    const fn from_octet(octet: u8) -> Self {
        match octet >> 6 {
            0 => Class::Universal,
            1 => Class::Application,
            2 => Class::Context,
            _ => Class::Private,
        }
    }

    const fn bits(self) -> u8 {
        match self {
            Class::Universal => 0x00,
            Class::Application => 0x40,
            Class::Context => 0x80,
            Class::Private => 0xC0,
        }
    }
}

const CONSTRUCTED_BIT: u8 = 0x20;
const HIGH_TAG_NUMBER: u8 = 0x1F;

/// A decoded identifier: class, form and number.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Tag {
    class: Class,
    constructed: bool,
    number: u32,
}

impl Tag {
    pub const END_OF_CONTENTS: Tag = Tag::primitive(Class::Universal, 0);
    pub const BOOLEAN: Tag = Tag::primitive(Class::Universal, 1);
    pub const INTEGER: Tag = Tag::primitive(Class::Universal, 2);
    pub const BIT_STRING: Tag = Tag::primitive(Class::Universal, 3);
    pub const OCTET_STRING: Tag = Tag::primitive(Class::Universal, 4);
    pub const NULL: Tag = Tag::primitive(Class::Universal, 5);
    pub const ENUMERATED: Tag = Tag::primitive(Class::Universal, 10);
    pub const GENERALIZED_TIME: Tag = Tag::primitive(Class::Universal, 24);
    pub const GENERAL_STRING: Tag = Tag::primitive(Class::Universal, 27);
    pub const SEQUENCE: Tag = Tag::constructed(Class::Universal, 16);
    pub const SET: Tag = Tag::constructed(Class::Universal, 17);

    pub const fn primitive(class: Class, number: u32) -> Self {
        Tag {
            class,
            constructed: false,
            number,
        }
    }

    pub const fn constructed(class: Class, number: u32) -> Self {
        Tag {
            class,
            constructed: true,
            number,
        }
    }

    /// `[APPLICATION n]` constructed.
    pub const fn application(number: u32) -> Self {
        Tag::constructed(Class::Application, number)
    }

    /// `[APPLICATION n]` primitive.
    pub const fn application_primitive(number: u32) -> Self {
        Tag::primitive(Class::Application, number)
    }

    /// `[n]` primitive, e.g. an IMPLICIT OCTET STRING.
    pub const fn context(number: u32) -> Self {
        Tag::primitive(Class::Context, number)
    }

    /// `[n]` constructed, e.g. an EXPLICIT wrapper or IMPLICIT SEQUENCE.
    pub const fn context_constructed(number: u32) -> Self {
        Tag::constructed(Class::Context, number)
    }

    pub const fn class(self) -> Class {
        self.class
    }

    pub const fn is_constructed(self) -> bool {
        self.constructed
    }

    pub const fn number(self) -> u32 {
        self.number
    }

    pub fn is_end_of_contents(self) -> bool {
        self == Tag::END_OF_CONTENTS
    }

    /// Number of identifier octets in the canonical encoding.
    pub fn encoded_len(self) -> usize {
        if self.number < HIGH_TAG_NUMBER as u32 {
            1
        } else {
            1 + base128_len(self.number)
        }
    }
}

impl fmt::Display for Tag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let form = if self.constructed { "constructed" } else { "primitive" };
        match self.class {
            Class::Universal => write!(f, "[UNIVERSAL {}] {}", self.number, form),
            Class::Application => write!(f, "[APPLICATION {}] {}", self.number, form),
            Class::Context => write!(f, "[{}] {}", self.number, form),
            Class::Private => write!(f, "[PRIVATE {}] {}", self.number, form),
        }
    }
}

/// A decoded length octet sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Length {
    Definite(usize),
    /// Terminated by an end-of-contents TLV (`00 00`). Never produced by DER.
    Indefinite,
}

impl Length {
    pub fn definite(self) -> Option<usize> {
        match self {
            Length::Definite(n) => Some(n),
            Length::Indefinite => None,
        }
    }
}

impl fmt::Display for Length {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Length::Definite(n) => write!(f, "{}", n),
            Length::Indefinite => f.write_str("indefinite"),
        }
    }
}

fn base128_len(mut number: u32) -> usize {
    let mut n = 1;
    while number >= 0x80 {
        number >>= 7;
        n += 1;
    }
    n
}

/// Read one identifier. Returns the tag and the number of octets used.
///
/// Offsets inside returned errors are relative to `buf`.
pub fn read_tag(buf: &[u8]) -> Result<Option<(Tag, usize)>, DecodeError> {
    let Some(&first) = buf.first() else {
        return Ok(None);
    };
    let class = Class::from_octet(first);
    let constructed = first & CONSTRUCTED_BIT != 0;
    let low = first & HIGH_TAG_NUMBER;
    if low != HIGH_TAG_NUMBER {
        return Ok(Some((
            Tag {
                class,
                constructed,
                number: low as u32,
            },
            1,
        )));
    }

    let mut number: u32 = 0;
    for (i, &octet) in buf[1..].iter().enumerate() {
        if i == 0 && octet == 0x80 {
            return Err(DecodeError::malformed(1, "high tag number starts with a zero septet"));
        }
        if number > (u32::MAX >> 7) {
            return Err(DecodeError::malformed(1 + i as u64, "tag number does not fit in 32 bits"));
        }
        number = (number << 7) | (octet & 0x7F) as u32;
        if octet & 0x80 == 0 {
            if number < HIGH_TAG_NUMBER as u32 {
                return Err(DecodeError::malformed(
                    0,
                    format!("tag number {} uses the high-tag-number form", number),
                ));
            }
            return Ok(Some((
                Tag {
                    class,
                    constructed,
                    number,
                },
                i + 2,
            )));
        }
    }
    Ok(None)
}

/// Read the length octets. Returns the length and the number of octets used.
pub fn read_length(buf: &[u8]) -> Result<Option<(Length, usize)>, DecodeError> {
    let Some(&first) = buf.first() else {
        return Ok(None);
    };
    if first & 0x80 == 0 {
        return Ok(Some((Length::Definite(first as usize), 1)));
    }

    let count = (first & 0x7F) as usize;
    match count {
        0 => Ok(Some((Length::Indefinite, 1))),
        0x7F => Err(DecodeError::malformed(0, "reserved length octet 0xFF")),
        n if n > std::mem::size_of::<usize>() => Err(DecodeError::malformed(
            0,
            format!("length uses {} octets, more than supported", n),
        )),
        n => {
            if buf.len() < 1 + n {
                return Ok(None);
            }
            let value = buf[1..=n]
                .iter()
                .fold(0usize, |acc, &b| (acc << 8) | b as usize);
            Ok(Some((Length::Definite(value), 1 + n)))
        }
    }
}

/// The first `n` octets of `buf`, if that many are available.
pub fn read_value_octets(buf: &[u8], n: usize) -> Option<&[u8]> {
    buf.get(..n)
}

pub fn write_tag(out: &mut Vec<u8>, tag: Tag) {
    let lead = tag.class.bits() | if tag.constructed { CONSTRUCTED_BIT } else { 0 };
    if tag.number < HIGH_TAG_NUMBER as u32 {
        out.push(lead | tag.number as u8);
        return;
    }
    out.push(lead | HIGH_TAG_NUMBER);
    let septets = base128_len(tag.number);
    for i in (0..septets).rev() {
        let mut octet = ((tag.number >> (7 * i)) & 0x7F) as u8;
        if i != 0 {
            octet |= 0x80;
        }
        out.push(octet);
    }
}

/// Number of length octets `write_length` produces for `len`.
pub fn length_encoded_len(len: usize) -> usize {
    if len < 0x80 {
        1
    } else {
        1 + (usize::BITS as usize / 8 - len.leading_zeros() as usize / 8)
    }
}

pub fn write_length(out: &mut Vec<u8>, len: usize) {
    if len < 0x80 {
        out.push(len as u8);
        return;
    }
    let bytes = len.to_be_bytes();
    let skip = len.leading_zeros() as usize / 8;
    out.push(0x80 | (bytes.len() - skip) as u8);
    out.extend_from_slice(&bytes[skip..]);
}

/// Total octets of a TLV header plus content.
pub fn tlv_len(tag: Tag, content_len: usize) -> usize {
    tag.encoded_len() + length_encoded_len(content_len) + content_len
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_low_tag_number_limit() {
        let mut out = Vec::new();
        write_tag(&mut out, Tag::context(30));
        assert_eq!(out, vec![0x9E]);
        assert_eq!(read_tag(&out).unwrap(), Some((Tag::context(30), 1)));
    }

    #[test]
    fn test_high_tag_number_form() {
        let mut out = Vec::new();
        write_tag(&mut out, Tag::context(31));
        assert_eq!(out, vec![0x9F, 0x1F]);
        assert_eq!(read_tag(&out).unwrap(), Some((Tag::context(31), 2)));

        out.clear();
        write_tag(&mut out, Tag::application(201));
        assert_eq!(out, vec![0x7F, 0x81, 0x49]);
        assert_eq!(Tag::application(201).encoded_len(), 3);
        assert_eq!(read_tag(&out).unwrap(), Some((Tag::application(201), 3)));
    }

    #[test]
    fn test_read_tag_needs_more_input() {
        assert_eq!(read_tag(&[]).unwrap(), None);
        assert_eq!(read_tag(&[0x7F]).unwrap(), None);
        assert_eq!(read_tag(&[0x7F, 0x81]).unwrap(), None);
    }

    #[test]
    fn test_read_tag_rejects_non_minimal_forms() {
        assert!(read_tag(&[0x9F, 0x80, 0x1F]).is_err());
        assert!(read_tag(&[0x9F, 0x05]).is_err());
    }

    #[test]
    fn test_length_short_and_long_boundary() {
        let mut out = Vec::new();
        write_length(&mut out, 127);
        assert_eq!(out, vec![0x7F]);
        out.clear();
        write_length(&mut out, 128);
        assert_eq!(out, vec![0x81, 0x80]);
        out.clear();
        write_length(&mut out, 0x1234);
        assert_eq!(out, vec![0x82, 0x12, 0x34]);
        assert_eq!(length_encoded_len(127), 1);
        assert_eq!(length_encoded_len(128), 2);
        assert_eq!(length_encoded_len(0x1234), 3);
        assert_eq!(length_encoded_len(0x01_0000), 4);
    }

    #[test]
    fn test_read_length_forms() {
        assert_eq!(read_length(&[0x7F]).unwrap(), Some((Length::Definite(127), 1)));
        assert_eq!(read_length(&[0x81, 0x80]).unwrap(), Some((Length::Definite(128), 2)));
        // non-minimal long form is valid BER
        assert_eq!(read_length(&[0x82, 0x00, 0x05]).unwrap(), Some((Length::Definite(5), 3)));
        assert_eq!(read_length(&[0x80]).unwrap(), Some((Length::Indefinite, 1)));
        assert_eq!(read_length(&[0x82, 0x01]).unwrap(), None);
        assert_eq!(read_length(&[]).unwrap(), None);
    }

    #[test]
    fn test_read_length_rejects_reserved_and_oversized() {
        assert!(read_length(&[0xFF]).is_err());
        assert!(read_length(&[0x89, 1, 2, 3, 4, 5, 6, 7, 8, 9]).is_err());
    }

    #[test]
    fn test_read_value_octets() {
        assert_eq!(read_value_octets(&[1, 2, 3], 2), Some(&[1u8, 2][..]));
        assert_eq!(read_value_octets(&[1, 2, 3], 4), None);
    }

    #[test]
    fn test_tag_display() {
        assert_eq!(Tag::SEQUENCE.to_string(), "[UNIVERSAL 16] constructed");
        assert_eq!(Tag::application(3).to_string(), "[APPLICATION 3] constructed");
        assert_eq!(Tag::context(7).to_string(), "[7] primitive");
    }
}
