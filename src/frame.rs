//! Frame boundary: decode caller-supplied buffers that hold one or more
//! back-to-back records.
//!
//! Decode is atomic per frame: any record failure rejects the whole buffer as
//! "not this protocol", with the error kind and offset preserved for
//! reporting. No partially decoded frame is ever surfaced.

use std::sync::Arc;

use crate::bits::BitSlice;
use crate::codec::{Codec, DecodeError};
use crate::schema::RecordSchema;
use crate::value::RecordValue;

/// A buffer could not be decoded as the given protocol record.
#[derive(Debug, thiserror::Error)]
#[error("frame not recognized as {protocol}: {source} ({})",
    .offset_bits.map(|b| format!("at bit {}, byte {}", b, b / 8)).unwrap_or_else(|| "offset unknown".to_string()))]
pub struct FrameError {
    pub protocol: String,
    pub offset_bits: Option<usize>,
    #[source]
    pub source: DecodeError,
}

#[derive(Debug)]
pub struct DecodedRecord {
    pub value: RecordValue,
    /// Byte span of this record within the frame buffer.
    pub byte_range: (usize, usize),
}

/// Result of decoding a frame of repeated records.
#[derive(Debug)]
pub struct FrameDecodeResult {
    pub records: Vec<DecodedRecord>,
}

/// Decode a single record from the start of a buffer, reporting failures as
/// "frame not recognized" with kind and offset.
pub fn recognize(
    codec: &Codec,
    schema: &Arc<RecordSchema>,
    bytes: &[u8],
) -> Result<RecordValue, FrameError> {
    codec.decode(schema, bytes).map_err(|e| wrap(schema, e))
}

/// Decode records back-to-back until the buffer is exhausted.
pub fn decode_frame(
    codec: &Codec,
    schema: &Arc<RecordSchema>,
    bytes: &[u8],
) -> Result<FrameDecodeResult, FrameError> {
    let mut records = Vec::new();
    let mut slice = BitSlice::new(bytes);
    while !slice.is_empty() {
        let start = slice.origin_bit();
        let (value, rest) = codec
            .decode_slice(schema, slice)
            .map_err(|e| wrap(schema, e))?;
        if rest.bit_len() == slice.bit_len() {
            // A record layout that consumes nothing would never advance.
            break;
        }
        records.push(DecodedRecord {
            value,
            byte_range: (start / 8, (rest.origin_bit() + 7) / 8),
        });
        slice = rest;
    }
    Ok(FrameDecodeResult { records })
}

fn wrap(schema: &RecordSchema, e: DecodeError) -> FrameError {
    FrameError {
        protocol: schema.name.clone(),
        offset_bits: e.offset_bits(),
        source: e,
    }
}
