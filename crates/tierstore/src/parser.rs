//! Blob file format parser using nom
//!
//! File format:
//! ```text
//! TIERBLB1
//! [version: u32]
//! [payload_len: u64]
//! ...payload bytes...
//! ```

use nom::{
    bytes::complete::tag,
    number::complete::{le_u32, le_u64},
    sequence::tuple,
    IResult,
};

use crate::error::{Error, Result};

/// Magic header for blob files
pub const BLOB_MAGIC: &[u8] = b"TIERBLB1";

/// Current blob format version
pub const BLOB_VERSION: u32 = 1;

/// Length of the fixed blob header
pub const HEADER_LEN: usize = BLOB_MAGIC.len() + 4 + 8;

/// Blob file header
#[derive(Debug, Clone, PartialEq)]
pub struct BlobHeader {
    /// File format version
    pub version: u32,
    /// Number of payload bytes following the header
    pub payload_len: u64,
}

fn header(input: &[u8]) -> IResult<&[u8], BlobHeader> {
    let (rest, (_, version, payload_len)) = tuple((tag(BLOB_MAGIC), le_u32, le_u64))(input)?;
    Ok((rest, BlobHeader { version, payload_len }))
}

/// Parse a complete blob file, returning its header and payload
///
/// The payload must be exactly `payload_len` bytes: a short file means an
/// interrupted write, a long one means something else wrote to it.
pub fn parse_blob(input: &[u8]) -> Result<(BlobHeader, &[u8])> {
    let (payload, header) = header(input)?;

    if header.version != BLOB_VERSION {
        return Err(Error::Corrupt(format!(
            "unsupported blob version {}",
            header.version
        )));
    }

    if payload.len() as u64 != header.payload_len {
        return Err(Error::Corrupt(format!(
            "payload is {} bytes, header says {}",
            payload.len(),
            header.payload_len
        )));
    }

    Ok((header, payload))
}

/// Create a blob file header for a payload of the given length
pub fn create_header(payload_len: usize) -> Vec<u8> {
    let mut header = Vec::with_capacity(HEADER_LEN);
    header.extend_from_slice(BLOB_MAGIC);
    header.extend_from_slice(&BLOB_VERSION.to_le_bytes());
    header.extend_from_slice(&(payload_len as u64).to_le_bytes());
    header
}
