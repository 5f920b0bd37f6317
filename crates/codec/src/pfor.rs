//! Patched frame-of-reference (PFOR): a [`crate::for_codec::FrameOfReference`]
//! whose width is chosen from a percentile of the block rather than its
//! true maximum, with outliers beyond that percentile (or any value that
//! would collide with the sentinel marker) patched in from a side exception
//! list instead of widening every slot in the frame.
//!
//! Wire shape: tagged-varint `min`, one byte `width`, tagged-varint `count`,
//! `count` fixed-`width`-byte offsets (exceptions hold the sentinel
//! `marker = 2^(8*width) - 1`), tagged-varint `exceptionCount`, then that
//! many tagged-varint `(index, value)` pairs.

use crate::{external, tagged};
use persistkit_core::{Error, Result, Width};

/// Default percentile used to pick the covering width when the caller does
/// not request a specific one.
pub const DEFAULT_PERCENTILE: u32 = 90;

fn threshold_value(values: &[u64], pct: u32) -> u64 {
    let mut sorted = values.to_vec();
    sorted.sort_unstable();
    let count = sorted.len();
    let idx = ((count as u64 * pct as u64) / 100)
        .saturating_sub(1)
        .min(count as u64 - 1) as usize;
    sorted[idx]
}

fn marker_for(width: Width) -> u64 {
    let b = width.bytes() as u32;
    if b >= 8 {
        u64::MAX
    } else {
        (1u64 << (8 * b)) - 1
    }
}

/// A parsed, borrowed view over an encoded patched frame-of-reference block.
pub struct PatchedFrameOfReference<'a> {
    min: u64,
    width: u8,
    count: usize,
    offsets: &'a [u8],
    exceptions: Vec<(usize, u64)>,
}

impl<'a> PatchedFrameOfReference<'a> {
    /// Encode `values`, picking the width from [`DEFAULT_PERCENTILE`].
    pub fn encode(values: &[u64]) -> Result<Vec<u8>> {
        Self::encode_with_percentile(values, DEFAULT_PERCENTILE)
    }

    /// Encode `values`, picking the width to cover the `pct`-th percentile
    /// (`pct` conventionally one of 90, 95, 99).
    pub fn encode_with_percentile(values: &[u64], pct: u32) -> Result<Vec<u8>> {
        let count = values.len();
        if count == 0 {
            let mut out = Vec::new();
            tagged::append(&mut out, 0);
            out.push(0);
            tagged::append(&mut out, 0);
            tagged::append(&mut out, 0);
            return Ok(out);
        }

        let min = *values.iter().min().unwrap();
        let threshold = threshold_value(values, pct);
        let width = external::encode_width(threshold - min);
        Self::encode_with_width(values, min, width)
    }

    /// Encode `values` at a caller-chosen `min`/`width`, for tests and for
    /// the allocation-failure fallback (which recomputes `width` to cover
    /// the full range so it can force zero exceptions).
    fn encode_with_width(values: &[u64], min: u64, width: Width) -> Result<Vec<u8>> {
        let count = values.len();
        let marker = marker_for(width);

        let mut exceptions: Vec<(usize, u64)> = Vec::new();
        let alloc_ok = exceptions.try_reserve(count).is_ok();

        let mut out = Vec::new();
        tagged::append(&mut out, min);
        out.push(width.bytes());
        tagged::append(&mut out, count as u64);

        let mut buf = [0u8; 8];
        if !alloc_ok {
            // Could not reserve the exception scratch list: fall back to a
            // width wide enough to cover every value directly, with zero
            // exceptions.
            let max = *values.iter().max().unwrap();
            let fallback_width = external::encode_width(max - min);
            out.truncate(0);
            tagged::append(&mut out, min);
            out.push(fallback_width.bytes());
            tagged::append(&mut out, count as u64);
            for &v in values {
                external::put(&mut buf, v - min, fallback_width)?;
                out.extend_from_slice(&buf[..fallback_width.bytes() as usize]);
            }
            tagged::append(&mut out, 0); // exceptionCount
            return Ok(out);
        }

        for (i, &v) in values.iter().enumerate() {
            let offset = v - min;
            if offset >= marker {
                exceptions.push((i, v));
                external::put(&mut buf, marker, width)?;
            } else {
                external::put(&mut buf, offset, width)?;
            }
            out.extend_from_slice(&buf[..width.bytes() as usize]);
        }

        tagged::append(&mut out, exceptions.len() as u64);
        for (index, value) in &exceptions {
            tagged::append(&mut out, *index as u64);
            tagged::append(&mut out, *value);
        }
        Ok(out)
    }

    /// Parse a block, returning the view and bytes consumed.
    pub fn parse(bytes: &'a [u8]) -> Result<(PatchedFrameOfReference<'a>, usize)> {
        let (min, n1) = tagged::get(bytes)?;
        let width = *bytes
            .get(n1)
            .ok_or_else(|| Error::CorruptHeader("pfor width byte missing".to_string()))?;
        let (count, n3) = tagged::get(&bytes[n1 + 1..])?;
        let count = count as usize;
        let mut offset = n1 + 1 + n3;
        let body_len = count * width as usize;
        if bytes.len() < offset + body_len {
            return Err(Error::CorruptEntry("pfor offsets truncated".to_string()));
        }
        let offsets = &bytes[offset..offset + body_len];
        offset += body_len;

        let (exception_count, n4) = tagged::get(&bytes[offset..])?;
        offset += n4;
        let mut exceptions = Vec::with_capacity(exception_count as usize);
        for _ in 0..exception_count {
            let (index, ni) = tagged::get(&bytes[offset..])?;
            offset += ni;
            let (value, nv) = tagged::get(&bytes[offset..])?;
            offset += nv;
            exceptions.push((index as usize, value));
        }

        Ok((
            PatchedFrameOfReference {
                min,
                width,
                count,
                offsets,
                exceptions,
            },
            offset,
        ))
    }

    /// Base value non-exception offsets are relative to.
    pub fn min(&self) -> u64 {
        self.min
    }

    /// Byte width of the packed (non-exception) offsets.
    pub fn width(&self) -> u8 {
        self.width
    }

    /// Number of logical values in this block.
    pub fn count(&self) -> usize {
        self.count
    }

    /// Indices and absolute values of the patched-in exceptions.
    pub fn exceptions(&self) -> &[(usize, u64)] {
        &self.exceptions
    }

    /// Value at logical index `i`: reads the offset slot; if it is not the
    /// sentinel marker, returns `min + offset`; otherwise linear-scans the
    /// (rare, by construction) exception list for that index.
    pub fn get(&self, i: usize) -> Result<u64> {
        if i >= self.count {
            return Err(Error::InvalidArgument(format!(
                "index {i} out of bounds for pfor block of {} values",
                self.count
            )));
        }
        let w = self.width as usize;
        let start = i * w;
        let width = Width::new(self.width).unwrap();
        let offset = external::get(&self.offsets[start..start + w], width)?;
        let marker = marker_for(width);
        if offset != marker {
            return Ok(self.min + offset);
        }
        self.exceptions
            .iter()
            .find(|&&(idx, _)| idx == i)
            .map(|&(_, v)| v)
            .ok_or_else(|| Error::CorruptEntry(format!("pfor marker at {i} with no exception entry")))
    }

    /// Decode every value in the block.
    pub fn decode_all(&self) -> Result<Vec<u64>> {
        (0..self.count).map(|i| self.get(i)).collect()
    }
}

/// Encode then immediately decode, for callers that don't need random
/// access or the parsed view.
pub fn roundtrip_decode(values: &[u64]) -> Result<Vec<u64>> {
    let bytes = PatchedFrameOfReference::encode(values)?;
    let (block, consumed) = PatchedFrameOfReference::parse(&bytes)?;
    debug_assert_eq!(consumed, bytes.len());
    block.decode_all()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_block() {
        let bytes = PatchedFrameOfReference::encode(&[]).unwrap();
        let (block, _) = PatchedFrameOfReference::parse(&bytes).unwrap();
        assert_eq!(block.count(), 0);
        assert_eq!(block.decode_all().unwrap(), Vec::<u64>::new());
    }

    #[test]
    fn all_equal_values_have_no_exceptions() {
        let bytes = PatchedFrameOfReference::encode(&[9, 9, 9]).unwrap();
        let (block, _) = PatchedFrameOfReference::parse(&bytes).unwrap();
        assert_eq!(block.width(), 1);
        assert!(block.exceptions().is_empty());
        assert_eq!(block.decode_all().unwrap(), vec![9, 9, 9]);
    }

    #[test]
    fn scenario_s3_one_clear_outlier_at_ninetieth_percentile() {
        let values = vec![100u64, 102, 105, 103, 500, 108, 107, 101];
        let bytes = PatchedFrameOfReference::encode(&values).unwrap();
        let (block, _) = PatchedFrameOfReference::parse(&bytes).unwrap();
        assert_eq!(block.min(), 100);
        assert_eq!(block.width(), 1);
        assert_eq!(block.exceptions(), &[(4, 500)]);
        assert_eq!(block.decode_all().unwrap(), values);
    }

    #[test]
    fn all_values_colliding_with_marker_all_become_exceptions() {
        // Every offset equals the width-1 marker (0xFF), so every slot must
        // be patched even though the values themselves are unremarkable.
        let values = vec![255u64, 255, 255];
        let bytes =
            PatchedFrameOfReference::encode_with_width(&values, 0, Width::new(1).unwrap()).unwrap();
        let (block, _) = PatchedFrameOfReference::parse(&bytes).unwrap();
        assert_eq!(block.exceptions().len(), values.len());
        assert_eq!(block.decode_all().unwrap(), values);
    }

    #[test]
    fn fallback_shape_has_zero_exceptions() {
        let values = vec![100u64, 200, 300, 100_000];
        // Exercise the same "cover everything directly, zero exceptions"
        // shape the allocation-failure fallback produces.
        let min = *values.iter().min().unwrap();
        let max = *values.iter().max().unwrap();
        let width = external::encode_width(max - min);
        let bytes = PatchedFrameOfReference::encode_with_width(&values, min, width).unwrap();
        let (block, _) = PatchedFrameOfReference::parse(&bytes).unwrap();
        assert!(block.exceptions().is_empty());
        assert_eq!(block.decode_all().unwrap(), values);
    }

    #[test]
    fn truncated_exception_list_is_rejected() {
        let values = vec![100u64, 102, 105, 103, 500, 108, 107, 101];
        let mut bytes = PatchedFrameOfReference::encode(&values).unwrap();
        bytes.truncate(bytes.len() - 1);
        assert!(PatchedFrameOfReference::parse(&bytes).is_err());
    }
}
