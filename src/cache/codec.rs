//! Binary payload of the cache entry
//!
//! ```text
//! magic        "JTLC"
//! version      u16
//! fingerprint  u16 length, UTF-8 bytes
//! count        u32
//! names        count x (u32 length, UTF-8 bytes)
//! ```
//!
//! Integers are big-endian. Anything that does not match exactly
//! (including trailing bytes) is rejected.

use thiserror::Error;

use crate::types::{TypeIndex, is_top_level_name};

pub const MAGIC: &[u8; 4] = b"JTLC";
pub const FORMAT_VERSION: u16 = 1;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum CodecError {
    #[error("bad magic bytes")]
    BadMagic,
    #[error("unsupported format version {0}")]
    UnsupportedVersion(u16),
    #[error("payload truncated at byte {0}")]
    Truncated(usize),
    #[error("invalid UTF-8 at byte {0}")]
    InvalidUtf8(usize),
    #[error("invalid type name {0:?}")]
    InvalidName(String),
    #[error("{0} unexpected trailing bytes")]
    TrailingBytes(usize),
    #[error("fingerprint too long")]
    FingerprintTooLong,
}

/// A decoded cache payload
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CachePayload {
    /// Identifies the runtime image and module list the index came from
    pub fingerprint: String,
    pub index: TypeIndex,
}

pub fn encode(fingerprint: &str, index: &TypeIndex) -> Result<Vec<u8>, CodecError> {
    let fingerprint_len = u16::try_from(fingerprint.len()).map_err(|_| CodecError::FingerprintTooLong)?;

    let names_len: usize = index.iter().map(|name| 4 + name.len()).sum();
    let mut bytes = Vec::with_capacity(4 + 2 + 2 + fingerprint.len() + 4 + names_len);

    bytes.extend_from_slice(MAGIC);
    bytes.extend_from_slice(&FORMAT_VERSION.to_be_bytes());
    bytes.extend_from_slice(&fingerprint_len.to_be_bytes());
    bytes.extend_from_slice(fingerprint.as_bytes());
    bytes.extend_from_slice(&(index.len() as u32).to_be_bytes());
    for name in index.iter() {
        bytes.extend_from_slice(&(name.len() as u32).to_be_bytes());
        bytes.extend_from_slice(name.as_bytes());
    }

    Ok(bytes)
}

pub fn decode(bytes: &[u8]) -> Result<CachePayload, CodecError> {
    let mut reader = Reader { bytes, position: 0 };

    if reader.take(MAGIC.len())? != MAGIC {
        return Err(CodecError::BadMagic);
    }

    let version = reader.u16()?;
    if version != FORMAT_VERSION {
        return Err(CodecError::UnsupportedVersion(version));
    }

    let fingerprint_len = reader.u16()? as usize;
    let fingerprint = reader.str(fingerprint_len)?.to_string();

    let count = reader.u32()? as usize;
    let mut index = TypeIndex::new();
    for _ in 0..count {
        let len = reader.u32()? as usize;
        let name = reader.str(len)?;
        if !is_top_level_name(name) {
            return Err(CodecError::InvalidName(name.to_string()));
        }
        index.insert(name);
    }

    let remaining = bytes.len() - reader.position;
    if remaining > 0 {
        return Err(CodecError::TrailingBytes(remaining));
    }

    Ok(CachePayload { fingerprint, index })
}

struct Reader<'a> {
    bytes: &'a [u8],
    position: usize,
}

impl<'a> Reader<'a> {
    fn take(&mut self, len: usize) -> Result<&'a [u8], CodecError> {
        let end = self
            .position
            .checked_add(len)
            .filter(|end| *end <= self.bytes.len())
            .ok_or(CodecError::Truncated(self.position))?;
        let slice = &self.bytes[self.position..end];
        self.position = end;
        Ok(slice)
    }

    fn u16(&mut self) -> Result<u16, CodecError> {
        let raw = self.take(2)?;
        Ok(u16::from_be_bytes([raw[0], raw[1]]))
    }

    fn u32(&mut self) -> Result<u32, CodecError> {
        let raw = self.take(4)?;
        Ok(u32::from_be_bytes([raw[0], raw[1], raw[2], raw[3]]))
    }

    fn str(&mut self, len: usize) -> Result<&'a str, CodecError> {
        let start = self.position;
        let raw = self.take(len)?;
        std::str::from_utf8(raw).map_err(|_| CodecError::InvalidUtf8(start))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn sample() -> TypeIndex {
        ["java.lang.String", "java.util.List", "javax.swing.JFrame"]
            .into_iter()
            .collect()
    }

    #[test]
    fn test_round_trip() {
        let bytes = encode("fp", &sample()).unwrap();
        let payload = decode(&bytes).unwrap();

        assert_eq!(payload.fingerprint, "fp");
        assert_eq!(payload.index, sample());
    }

    #[test]
    fn test_empty_index_round_trip() {
        let bytes = encode("", &TypeIndex::new()).unwrap();
        assert_eq!(bytes.len(), 4 + 2 + 2 + 4);
        assert!(decode(&bytes).unwrap().index.is_empty());
    }

    #[test]
    fn test_rejects_garbage() {
        assert_eq!(decode(b"JT"), Err(CodecError::Truncated(0)));
        assert_eq!(decode(b"\xAC\xED\x00\x05sr\x00\x11"), Err(CodecError::BadMagic));

        let mut wrong_version = encode("fp", &sample()).unwrap();
        wrong_version[5] = 9;
        assert_eq!(decode(&wrong_version), Err(CodecError::UnsupportedVersion(9)));
    }

    #[test]
    fn test_rejects_truncation_and_trailing_bytes() {
        let bytes = encode("fp", &sample()).unwrap();
        assert!(matches!(decode(&bytes[..bytes.len() - 3]), Err(CodecError::Truncated(_))));

        let mut extended = bytes.clone();
        extended.push(0);
        assert_eq!(decode(&extended), Err(CodecError::TrailingBytes(1)));
    }

    #[test]
    fn test_rejects_nested_names() {
        let mut bytes = Vec::new();
        bytes.extend_from_slice(MAGIC);
        bytes.extend_from_slice(&FORMAT_VERSION.to_be_bytes());
        bytes.extend_from_slice(&0u16.to_be_bytes());
        bytes.extend_from_slice(&1u32.to_be_bytes());
        bytes.extend_from_slice(&7u32.to_be_bytes());
        bytes.extend_from_slice(b"a.B$Inn");

        assert_eq!(decode(&bytes), Err(CodecError::InvalidName("a.B$Inn".to_string())));
    }

    #[test]
    fn test_huge_count_fails_cleanly() {
        let mut bytes = Vec::new();
        bytes.extend_from_slice(MAGIC);
        bytes.extend_from_slice(&FORMAT_VERSION.to_be_bytes());
        bytes.extend_from_slice(&0u16.to_be_bytes());
        bytes.extend_from_slice(&u32::MAX.to_be_bytes());

        assert!(matches!(decode(&bytes), Err(CodecError::Truncated(_))));
    }
}
