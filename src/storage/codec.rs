//! Segment file format: fixed header, bincode payload, checksum footer.

use byteorder::{BigEndian, ByteOrder, WriteBytesExt};
use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::error::{Result, XiphosError};

/// Magic number opening every segment file ("XSEG").
const SEGMENT_MAGIC: u32 = 0x5853_4547;

/// Current segment file format version.
const FORMAT_VERSION: u32 = 1;

/// Header (magic + version) and footer (crc32) sizes in bytes.
const HEADER_LEN: usize = 8;
const FOOTER_LEN: usize = 4;

/// Encode a segment payload: magic, version, bincode body, crc32 of the
/// body.
pub fn encode_segment<T: Serialize>(payload: &T) -> Result<Vec<u8>> {
    let body = bincode::serialize(payload)?;

    let mut out = Vec::with_capacity(HEADER_LEN + body.len() + FOOTER_LEN);
    out.write_u32::<BigEndian>(SEGMENT_MAGIC)?;
    out.write_u32::<BigEndian>(FORMAT_VERSION)?;
    out.extend_from_slice(&body);

    let mut hasher = crc32fast::Hasher::new();
    hasher.update(&body);
    out.write_u32::<BigEndian>(hasher.finalize())?;

    Ok(out)
}

/// Decode a segment file, verifying magic, version and checksum.
pub fn decode_segment<T: DeserializeOwned>(bytes: &[u8]) -> Result<T> {
    if bytes.len() < HEADER_LEN + FOOTER_LEN {
        return Err(XiphosError::index("segment file truncated"));
    }

    let magic = BigEndian::read_u32(&bytes[0..4]);
    if magic != SEGMENT_MAGIC {
        return Err(XiphosError::index("invalid segment file magic"));
    }

    let version = BigEndian::read_u32(&bytes[4..8]);
    if version != FORMAT_VERSION {
        return Err(XiphosError::index(format!(
            "unsupported segment format version: {version}"
        )));
    }

    let body = &bytes[HEADER_LEN..bytes.len() - FOOTER_LEN];
    let stored_crc = BigEndian::read_u32(&bytes[bytes.len() - FOOTER_LEN..]);

    let mut hasher = crc32fast::Hasher::new();
    hasher.update(body);
    if hasher.finalize() != stored_crc {
        return Err(XiphosError::index("segment file checksum mismatch"));
    }

    Ok(bincode::deserialize(body)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_roundtrip() {
        let payload = vec!["a".to_string(), "b".to_string()];
        let bytes = encode_segment(&payload).unwrap();
        let decoded: Vec<String> = decode_segment(&bytes).unwrap();
        assert_eq!(decoded, payload);
    }

    #[test]
    fn test_corrupt_body_rejected() {
        let payload = vec![1u64, 2, 3];
        let mut bytes = encode_segment(&payload).unwrap();
        let mid = bytes.len() / 2;
        bytes[mid] ^= 0xFF;

        let result: Result<Vec<u64>> = decode_segment(&bytes);
        assert!(result.is_err());
    }

    #[test]
    fn test_wrong_magic_rejected() {
        let payload = 42u64;
        let mut bytes = encode_segment(&payload).unwrap();
        bytes[0] = 0;

        let result: Result<u64> = decode_segment(&bytes);
        assert!(result.is_err());
    }

    #[test]
    fn test_truncated_rejected() {
        let result: Result<u64> = decode_segment(&[1, 2, 3]);
        assert!(result.is_err());
    }
}
