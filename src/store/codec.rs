//! Physical encodings for segment and deletion files
//!
//! Binary layout:
//! ```text
//! ┌─────────────────────────────────────────┐
//! │ HEADER (16 bytes)                       │
//! │   magic: [u8; 4] = "SGSB"               │
//! │   version: u16                          │
//! │   reserved: [u8; 2]                     │
//! │   body_len: u32                         │
//! │   body_checksum: u32                    │
//! ├─────────────────────────────────────────┤
//! │ BODY                                    │
//! │   lz4(bincode(value)), size prepended   │
//! └─────────────────────────────────────────┘
//! ```
//!
//! Text layout is a single header line `SGST <version> <crc32 hex>`
//! followed by the value as pretty-printed JSON. The checksum covers the
//! JSON bytes only.

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::store::error::{StoreError, StoreResult};
use crate::store::types::Codec;

const BINARY_MAGIC: [u8; 4] = *b"SGSB";
const TEXT_MAGIC: &str = "SGST";
const FORMAT_VERSION: u16 = 1;
const HEADER_SIZE: usize = 16;

/// Encode `value` with the given codec
pub fn encode<T: Serialize>(value: &T, codec: Codec) -> StoreResult<Vec<u8>> {
    match codec {
        Codec::Binary => encode_binary(value),
        Codec::Text => encode_text(value),
    }
}

/// Decode bytes written by [`encode`], detecting the codec from the header
pub fn decode<T: DeserializeOwned>(bytes: &[u8]) -> StoreResult<(T, Codec)> {
    match sniff(bytes)? {
        Codec::Binary => Ok((decode_binary(bytes)?, Codec::Binary)),
        Codec::Text => Ok((decode_text(bytes)?, Codec::Text)),
    }
}

/// Identify the codec of an encoded file
pub fn sniff(bytes: &[u8]) -> StoreResult<Codec> {
    if bytes.len() >= 4 && bytes[0..4] == BINARY_MAGIC {
        Ok(Codec::Binary)
    } else if bytes.starts_with(TEXT_MAGIC.as_bytes()) {
        Ok(Codec::Text)
    } else {
        Err(StoreError::InvalidSegment(format!(
            "Unrecognized file header: {:?}",
            &bytes[..bytes.len().min(4)]
        )))
    }
}

fn encode_binary<T: Serialize>(value: &T) -> StoreResult<Vec<u8>> {
    let serialized = bincode::serialize(value)?;
    let body = lz4_flex::compress_prepend_size(&serialized);

    let mut buf = Vec::with_capacity(HEADER_SIZE + body.len());
    buf.extend_from_slice(&BINARY_MAGIC);
    buf.extend_from_slice(&FORMAT_VERSION.to_le_bytes());
    buf.extend_from_slice(&[0u8; 2]);
    buf.extend_from_slice(&(body.len() as u32).to_le_bytes());
    buf.extend_from_slice(&crc32fast::hash(&body).to_le_bytes());
    buf.extend_from_slice(&body);

    Ok(buf)
}

fn decode_binary<T: DeserializeOwned>(bytes: &[u8]) -> StoreResult<T> {
    if bytes.len() < HEADER_SIZE {
        return Err(StoreError::Corruption(format!(
            "File too short: {} bytes",
            bytes.len()
        )));
    }

    let version = u16::from_le_bytes([bytes[4], bytes[5]]);
    if version > FORMAT_VERSION {
        return Err(StoreError::InvalidSegment(format!(
            "Unsupported version: {}",
            version
        )));
    }

    let body_len = u32::from_le_bytes([bytes[8], bytes[9], bytes[10], bytes[11]]) as usize;
    let stored_checksum = u32::from_le_bytes([bytes[12], bytes[13], bytes[14], bytes[15]]);

    let body = &bytes[HEADER_SIZE..];
    if body.len() != body_len {
        return Err(StoreError::Corruption(format!(
            "Body length mismatch: header={}, actual={}",
            body_len,
            body.len()
        )));
    }

    let computed_checksum = crc32fast::hash(body);
    if stored_checksum != computed_checksum {
        return Err(StoreError::Corruption(format!(
            "Checksum mismatch: stored={}, computed={}",
            stored_checksum, computed_checksum
        )));
    }

    let decompressed = lz4_flex::decompress_size_prepended(body)
        .map_err(|e| StoreError::Compression(e.to_string()))?;

    Ok(bincode::deserialize(&decompressed)?)
}

fn encode_text<T: Serialize>(value: &T) -> StoreResult<Vec<u8>> {
    let json = serde_json::to_vec_pretty(value)?;
    let header = format!(
        "{} {} {:08x}\n",
        TEXT_MAGIC,
        FORMAT_VERSION,
        crc32fast::hash(&json)
    );

    let mut buf = header.into_bytes();
    buf.extend_from_slice(&json);
    buf.push(b'\n');
    Ok(buf)
}

fn decode_text<T: DeserializeOwned>(bytes: &[u8]) -> StoreResult<T> {
    let newline = bytes
        .iter()
        .position(|&b| b == b'\n')
        .ok_or_else(|| StoreError::Corruption("Missing text header line".to_string()))?;

    let header = std::str::from_utf8(&bytes[..newline])
        .map_err(|e| StoreError::Corruption(format!("Invalid text header: {}", e)))?;
    let parts: Vec<&str> = header.split_whitespace().collect();
    if parts.len() != 3 || parts[0] != TEXT_MAGIC {
        return Err(StoreError::Corruption(format!(
            "Malformed text header: {}",
            header
        )));
    }

    let version: u16 = parts[1]
        .parse()
        .map_err(|_| StoreError::Corruption(format!("Bad version: {}", parts[1])))?;
    if version > FORMAT_VERSION {
        return Err(StoreError::InvalidSegment(format!(
            "Unsupported version: {}",
            version
        )));
    }

    let stored_checksum = u32::from_str_radix(parts[2], 16)
        .map_err(|_| StoreError::Corruption(format!("Bad checksum: {}", parts[2])))?;

    let mut json = &bytes[newline + 1..];
    if json.last() == Some(&b'\n') {
        json = &json[..json.len() - 1];
    }

    let computed_checksum = crc32fast::hash(json);
    if stored_checksum != computed_checksum {
        return Err(StoreError::Corruption(format!(
            "Checksum mismatch: stored={:08x}, computed={:08x}",
            stored_checksum, computed_checksum
        )));
    }

    Ok(serde_json::from_slice(json)?)
}
