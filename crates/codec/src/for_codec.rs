//! Frame-of-reference (FOR): a columnar block codec.
//!
//! A block of values is stored as a `min`, a one-byte `width` (the
//! [`crate::external`] byte width each offset is stored at), a tagged-varint
//! `count`, and then `count` fixed-`width`-byte little-endian offsets from
//! `min`. [`crate::pfor`] extends this same shape with an exception list.

use crate::{external, tagged};
use persistkit_core::{Error, Result, Width};

/// A parsed, borrowed view over an encoded frame-of-reference block.
pub struct FrameOfReference<'a> {
    min: u64,
    width: u8,
    count: usize,
    offsets: &'a [u8],
}

impl<'a> FrameOfReference<'a> {
    /// Encode `values` as a single frame, returning the wire bytes.
    pub fn encode(values: &[u64]) -> Result<Vec<u8>> {
        let count = values.len();
        let mut out = Vec::new();
        if count == 0 {
            tagged::append(&mut out, 0); // min
            out.push(0); // width
            tagged::append(&mut out, 0); // count
            return Ok(out);
        }
        let min = *values.iter().min().unwrap();
        let max = *values.iter().max().unwrap();
        let width = external::encode_width(max - min);
        tagged::append(&mut out, min);
        out.push(width.bytes());
        tagged::append(&mut out, count as u64);
        let mut buf = [0u8; 8];
        for &v in values {
            external::put(&mut buf, v - min, width)?;
            out.extend_from_slice(&buf[..width.bytes() as usize]);
        }
        Ok(out)
    }

    /// Parse a frame header and offsets region from `bytes`, returning the
    /// frame view and the number of bytes consumed.
    pub fn parse(bytes: &'a [u8]) -> Result<(FrameOfReference<'a>, usize)> {
        let (min, n1) = tagged::get(bytes)?;
        let width = *bytes
            .get(n1)
            .ok_or_else(|| Error::CorruptHeader("frame-of-reference width byte missing".to_string()))?;
        let (count, n3) = tagged::get(&bytes[n1 + 1..])?;
        let header_len = n1 + 1 + n3;
        let count = count as usize;
        let body_len = count * width as usize;
        if bytes.len() < header_len + body_len {
            return Err(Error::CorruptEntry(
                "frame-of-reference offsets truncated".to_string(),
            ));
        }
        let offsets = &bytes[header_len..header_len + body_len];
        Ok((
            FrameOfReference {
                min,
                width,
                count,
                offsets,
            },
            header_len + body_len,
        ))
    }

    /// Base value every offset is relative to.
    pub fn min(&self) -> u64 {
        self.min
    }

    /// Byte width of each packed offset (0 only for the empty-count case).
    pub fn width(&self) -> u8 {
        self.width
    }

    /// Number of logical values in this frame.
    pub fn count(&self) -> usize {
        self.count
    }

    /// Value at logical index `i` in constant time.
    pub fn get(&self, i: usize) -> Result<u64> {
        if i >= self.count {
            return Err(Error::InvalidArgument(format!(
                "index {i} out of bounds for frame of {} values",
                self.count
            )));
        }
        let w = self.width as usize;
        let start = i * w;
        let offset = external::get(&self.offsets[start..start + w], Width::new(self.width).unwrap())?;
        Ok(self.min + offset)
    }

    /// Decode every value in the frame.
    pub fn decode_all(&self) -> Result<Vec<u64>> {
        (0..self.count).map(|i| self.get(i)).collect()
    }
}

/// Convenience: encode then immediately decode, for callers that don't need
/// random access to the frame.
pub fn roundtrip_decode(values: &[u64]) -> Result<Vec<u64>> {
    let bytes = FrameOfReference::encode(values)?;
    let (frame, consumed) = FrameOfReference::parse(&bytes)?;
    debug_assert_eq!(consumed, bytes.len());
    frame.decode_all()
}
