//! Envelope - the framed bytes stored for each entry
//!
//! ```text
//! [magic: 4 bytes "BLKV"] [version: u8] [flags: u8] [body]
//! ```
//!
//! The body is the bincode encoding of an [`Entry`], zstd-compressed when
//! flag bit 0 is set.

use crate::model::Entry;
use crate::{Error, Result, FORMAT_VERSION, MAGIC};

const HEADER_LEN: usize = 6;

/// Bodies above this size are compressed
const COMPRESS_THRESHOLD: usize = 4096;

const FLAG_ZSTD: u8 = 0b0000_0001;
const KNOWN_FLAGS: u8 = FLAG_ZSTD;

/// Serialize an entry for storage
pub fn encode(entry: &Entry) -> Result<Vec<u8>> {
    let body = bincode::serialize(entry)?;

    let mut output = Vec::with_capacity(HEADER_LEN + body.len());
    output.extend_from_slice(MAGIC);
    output.push(FORMAT_VERSION);

    if body.len() > COMPRESS_THRESHOLD {
        output.push(FLAG_ZSTD);
        let compressed = zstd::encode_all(body.as_slice(), 3)?;
        output.extend(compressed);
    } else {
        output.push(0);
        output.extend(body);
    }
    Ok(output)
}

/// Decode bytes read from the backend
pub fn decode(data: &[u8]) -> Result<Entry> {
    if data.len() < HEADER_LEN {
        return Err(Error::Deserialization(format!(
            "truncated entry: {} bytes",
            data.len()
        )));
    }
    if &data[0..4] != MAGIC {
        return Err(Error::Deserialization("invalid magic bytes".into()));
    }

    let version = data[4];
    if version != FORMAT_VERSION {
        return Err(Error::Deserialization(format!(
            "unsupported format version {}, expected {}",
            version, FORMAT_VERSION
        )));
    }

    let flags = data[5];
    if flags & !KNOWN_FLAGS != 0 {
        return Err(Error::Deserialization(format!("unknown flags {:#04x}", flags)));
    }

    let body = &data[HEADER_LEN..];
    let entry: Entry = if flags & FLAG_ZSTD != 0 {
        let decompressed = zstd::decode_all(body)
            .map_err(|e| Error::Deserialization(format!("decompression failed: {}", e)))?;
        bincode::deserialize(&decompressed)?
    } else {
        bincode::deserialize(body)?
    };

    entry.value.validate()?;
    Ok(entry)
}
