// BER helpers shared by the grammars and encoders:
// primitive content codecs, a slice reader for values that embed a complete
// BER blob (control values), and the DER writer used by every encoder.

use crate::error::DecodeError;
use crate::tlv::{self, Length, Tag};

/// Signed big-endian two's complement, 1 to 8 octets.
pub fn decode_integer(value: &[u8]) -> Result<i64, &'static str> {
    match value.len() {
        0 => Err("INTEGER with no content octets"),
        n if n > 8 => Err("INTEGER larger than 64 bits"),
        _ => {
            let init: i64 = if value[0] & 0x80 != 0 { -1 } else { 0 };
            Ok(value.iter().fold(init, |acc, &b| (acc << 8) | b as i64))
        }
    }
}

/// BER BOOLEAN: one octet, any non-zero value is TRUE.
pub fn decode_boolean(value: &[u8]) -> Result<bool, &'static str> {
    match value {
        [b] => Ok(*b != 0),
        _ => Err("BOOLEAN must have exactly one content octet"),
    }
}

pub fn integer_field(
    value: &[u8],
    structure: &'static str,
    field: &'static str,
) -> Result<i64, DecodeError> {
    decode_integer(value).map_err(|reason| DecodeError::constraint(structure, field, reason))
}

pub fn i32_field(
    value: &[u8],
    structure: &'static str,
    field: &'static str,
) -> Result<i32, DecodeError> {
    let v = integer_field(value, structure, field)?;
    i32::try_from(v)
        .map_err(|_| DecodeError::constraint(structure, field, format!("{} is out of Int32 range", v)))
}

pub fn boolean_field(
    value: &[u8],
    structure: &'static str,
    field: &'static str,
) -> Result<bool, DecodeError> {
    decode_boolean(value).map_err(|reason| DecodeError::constraint(structure, field, reason))
}

pub fn utf8_field(
    value: &[u8],
    structure: &'static str,
    field: &'static str,
) -> Result<String, DecodeError> {
    String::from_utf8(value.to_vec())
        .map_err(|_| DecodeError::constraint(structure, field, "invalid UTF-8 string"))
}

/// Minimal two's complement content octets for `value`.
fn integer_content(value: i64) -> ([u8; 8], usize) {
    let bytes = value.to_be_bytes();
    let mut start = 0;
    while start < 7 {
        let (b, next) = (bytes[start], bytes[start + 1]);
        let redundant = (b == 0x00 && next & 0x80 == 0) || (b == 0xFF && next & 0x80 != 0);
        if !redundant {
            break;
        }
        start += 1;
    }
    (bytes, start)
}

// BER parsing utilities for complete buffers
pub struct BerReader<'a> {
    data: &'a [u8],
    pos: usize,
    structure: &'static str,
}

impl<'a> BerReader<'a> {
    /// `structure` names the enclosing object in error messages.
    pub fn new(data: &'a [u8], structure: &'static str) -> Self {
        Self {
            data,
            pos: 0,
            structure,
        }
    }

    pub fn remaining(&self) -> usize {
        self.data.len() - self.pos
    }

    pub fn is_empty(&self) -> bool {
        self.remaining() == 0
    }

    fn error(&self, reason: impl Into<String>) -> DecodeError {
        DecodeError::constraint(self.structure, "value", reason)
    }

    pub fn peek_tag(&self) -> Result<Option<Tag>, DecodeError> {
        match tlv::read_tag(&self.data[self.pos..]) {
            Ok(Some((tag, _))) => Ok(Some(tag)),
            Ok(None) => Ok(None),
            Err(e) => Err(self.error(e.to_string())),
        }
    }

    /// Read any TLV, returning its tag and content octets.
    pub fn read_any(&mut self) -> Result<(Tag, &'a [u8]), DecodeError> {
        let rest = &self.data[self.pos..];
        let (tag, tag_len) = tlv::read_tag(rest)
            .map_err(|e| self.error(e.to_string()))?
            .ok_or_else(|| self.error("BER truncated: missing tag"))?;
        let (length, len_len) = tlv::read_length(&rest[tag_len..])
            .map_err(|e| self.error(e.to_string()))?
            .ok_or_else(|| self.error("BER truncated: missing length"))?;
        let Length::Definite(length) = length else {
            return Err(self.error("indefinite length inside an embedded value"));
        };
        let start = tag_len + len_len;
        let content = tlv::read_value_octets(&rest[start..], length).ok_or_else(|| {
            self.error(format!(
                "BER truncated: value needs {} bytes, {} remaining",
                length,
                rest.len() - start
            ))
        })?;
        self.pos += start + length;
        Ok((tag, content))
    }

    /// Read a TLV that must carry `expected`.
    pub fn read_expected(&mut self, expected: Tag) -> Result<&'a [u8], DecodeError> {
        let (tag, content) = self.read_any()?;
        if tag != expected {
            return Err(self.error(format!("expected {}, got {}", expected, tag)));
        }
        Ok(content)
    }

    pub fn read_integer(&mut self) -> Result<i64, DecodeError> {
        let content = self.read_expected(Tag::INTEGER)?;
        decode_integer(content).map_err(|e| self.error(e))
    }

    pub fn read_enumerated(&mut self) -> Result<i64, DecodeError> {
        let content = self.read_expected(Tag::ENUMERATED)?;
        decode_integer(content).map_err(|e| self.error(e))
    }

    pub fn read_boolean(&mut self) -> Result<bool, DecodeError> {
        let content = self.read_expected(Tag::BOOLEAN)?;
        decode_boolean(content).map_err(|e| self.error(e))
    }

    pub fn read_octet_string(&mut self) -> Result<Vec<u8>, DecodeError> {
        Ok(self.read_expected(Tag::OCTET_STRING)?.to_vec())
    }

    /// Enter a SEQUENCE, returning a reader over its content.
    pub fn read_sequence(&mut self) -> Result<BerReader<'a>, DecodeError> {
        let content = self.read_expected(Tag::SEQUENCE)?;
        Ok(BerReader::new(content, self.structure))
    }

    pub fn expect_end(&self) -> Result<(), DecodeError> {
        if self.is_empty() {
            Ok(())
        } else {
            Err(self.error(format!("{} trailing bytes", self.remaining())))
        }
    }
}

// DER encoding utilities.
//
// Constructed values are built bottom-up: children are written into their
// own buffer first so the parent length is known before its header is written.
#[derive(Debug, Default)]
pub struct BerWriter {
    buffer: Vec<u8>,
}

impl BerWriter {
    pub fn new() -> Self {
        Self { buffer: Vec::new() }
    }

    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    pub fn write_tag(&mut self, tag: Tag) {
        tlv::write_tag(&mut self.buffer, tag);
    }

    fn write_length(&mut self, length: usize) {
        tlv::write_length(&mut self.buffer, length);
    }

    pub fn write_primitive(&mut self, tag: Tag, content: &[u8]) {
        self.write_tag(tag);
        self.write_length(content.len());
        self.buffer.extend_from_slice(content);
    }

    pub fn write_integer_tagged(&mut self, tag: Tag, value: i64) {
        let (bytes, start) = integer_content(value);
        self.write_primitive(tag, &bytes[start..]);
    }

    pub fn write_integer(&mut self, value: i64) {
        self.write_integer_tagged(Tag::INTEGER, value);
    }

    pub fn write_enumerated(&mut self, value: i64) {
        self.write_integer_tagged(Tag::ENUMERATED, value);
    }

    pub fn write_boolean(&mut self, value: bool) {
        self.write_primitive(Tag::BOOLEAN, &[if value { 0xFF } else { 0x00 }]);
    }

    pub fn write_octet_string(&mut self, data: &[u8]) {
        self.write_primitive(Tag::OCTET_STRING, data);
    }

    pub fn write_string(&mut self, s: &str) {
        self.write_octet_string(s.as_bytes());
    }

    pub fn write_null_tagged(&mut self, tag: Tag) {
        self.write_primitive(tag, &[]);
    }

    /// Encode children with `f`, then emit `tag`, the DER length, and the children.
    pub fn write_constructed<F>(&mut self, tag: Tag, f: F)
    where
        F: FnOnce(&mut BerWriter),
    {
        let mut inner = BerWriter::new();
        f(&mut inner);
        self.write_primitive(tag, &inner.buffer);
    }

    /// Fallible form of [`BerWriter::write_constructed`].
    pub fn try_write_constructed<E, F>(&mut self, tag: Tag, f: F) -> Result<(), E>
    where
        F: FnOnce(&mut BerWriter) -> Result<(), E>,
    {
        let mut inner = BerWriter::new();
        f(&mut inner)?;
        self.write_primitive(tag, &inner.buffer);
        Ok(())
    }

    pub fn write_sequence<F>(&mut self, f: F)
    where
        F: FnOnce(&mut BerWriter),
    {
        self.write_constructed(Tag::SEQUENCE, f);
    }

    pub fn into_vec(self) -> Vec<u8> {
        self.buffer
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ber_writer_integer() {
        for (value, expected) in [
            (0i64, vec![0x02, 0x01, 0x00]),
            (127, vec![0x02, 0x01, 0x7F]),
            (128, vec![0x02, 0x02, 0x00, 0x80]),
            (256, vec![0x02, 0x02, 0x01, 0x00]),
            (-1, vec![0x02, 0x01, 0xFF]),
            (-128, vec![0x02, 0x01, 0x80]),
            (-129, vec![0x02, 0x02, 0xFF, 0x7F]),
        ] {
            let mut writer = BerWriter::new();
            writer.write_integer(value);
            assert_eq!(writer.into_vec(), expected, "value {}", value);
        }
    }

    #[test]
    fn test_decode_integer() {
        assert_eq!(decode_integer(&[0x2A]), Ok(42));
        assert_eq!(decode_integer(&[0xFF]), Ok(-1));
        assert_eq!(decode_integer(&[0x00, 0x80]), Ok(128));
        assert_eq!(decode_integer(&[0xFF, 0x7F]), Ok(-129));
        assert_eq!(
            decode_integer(&[0x7F, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF]),
            Ok(i64::MAX)
        );
        assert!(decode_integer(&[]).is_err());
        assert!(decode_integer(&[0; 9]).is_err());
    }

    #[test]
    fn test_i32_field_range() {
        assert_eq!(i32_field(&[0x01, 0x00], "T", "f").unwrap(), 256);
        assert!(i32_field(&[0x01, 0x00, 0x00, 0x00, 0x00], "T", "f").is_err());
    }

    #[test]
    fn test_ber_writer_boolean() {
        let mut writer = BerWriter::new();
        writer.write_boolean(true);
        writer.write_boolean(false);
        assert_eq!(writer.into_vec(), vec![0x01, 0x01, 0xFF, 0x01, 0x01, 0x00]);
        assert_eq!(decode_boolean(&[0x01]), Ok(true));
        assert!(decode_boolean(&[]).is_err());
    }

    #[test]
    fn test_ber_writer_long_length() {
        let mut writer = BerWriter::new();
        writer.write_sequence(|w| {
            for _ in 0..200 {
                w.write_string("test");
            }
        });
        let result = writer.into_vec();
        // 200 * 6 = 1200 bytes of content needs two length octets
        assert_eq!(&result[..4], &[0x30, 0x82, 0x04, 0xB0]);
        assert_eq!(result.len(), 4 + 1200);
    }

    #[test]
    fn test_ber_reader_sequence() {
        // SEQUENCE containing INTEGER 42 and OCTET STRING "hi"
        let data = vec![0x30, 0x07, 0x02, 0x01, 0x2A, 0x04, 0x02, b'h', b'i'];
        let mut reader = BerReader::new(&data, "Test");
        let mut seq = reader.read_sequence().unwrap();
        assert!(reader.is_empty());
        assert_eq!(seq.read_integer().unwrap(), 42);
        assert_eq!(seq.peek_tag().unwrap(), Some(Tag::OCTET_STRING));
        assert_eq!(seq.read_octet_string().unwrap(), b"hi");
        seq.expect_end().unwrap();
    }

    #[test]
    fn test_ber_reader_truncated_and_wrong_tag() {
        let data = vec![0x04, 0x05, b'h', b'i'];
        assert!(BerReader::new(&data, "Test").read_octet_string().is_err());
        let data = vec![0x01, 0x01, 0xFF];
        assert!(BerReader::new(&data, "Test").read_integer().is_err());
    }
}
