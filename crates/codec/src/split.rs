//! Split codec: a two-bit branch selector over three direct-width ranges
//! plus an escape to the external codec.
//!
//! The top two bits of the first byte select one of four branches; the
//! remaining six bits of that byte extend the payload:
//!
//! - `00`: a 14-bit value (2 bytes total), range `[0, 2^14)`.
//! - `01`: a 22-bit value (3 bytes total), added to the previous branch's
//!   maximum so the ranges are contiguous and non-overlapping.
//! - `10`: a 30-bit value (4 bytes total), likewise offset.
//! - `11`: escape. The low four bits of the first byte hold an external
//!   codec width (1..=8); the following bytes are that many external-coded
//!   bytes (little-endian), whose decoded value is added to the third
//!   branch's maximum.
//!
//! Each branch's embedded payload bytes are big-endian (the selector's six
//! leading bits are the value's *high* bits); the escape branch's trailing
//! external-codec bytes stay little-endian, since they delegate to
//! [`crate::external`] unchanged.

use crate::external;
use persistkit_core::{Error, Result, Width};

const BRANCH00_MAX: u64 = (1 << 14) - 1;
const BASE01: u64 = 1 << 14;
const BRANCH01_MAX: u64 = BASE01 + (1 << 22) - 1;
const BASE10: u64 = BASE01 + (1 << 22);
const BRANCH10_MAX: u64 = BASE10 + (1 << 30) - 1;
const BASE11: u64 = BASE10 + (1 << 30);

/// Number of bytes [`put`] would write for `v`.
pub fn length(v: u64) -> usize {
    if v <= BRANCH00_MAX {
        2
    } else if v <= BRANCH01_MAX {
        3
    } else if v <= BRANCH10_MAX {
        4
    } else {
        1 + external::encode_width(v - BASE11).bytes() as usize
    }
}

/// Write the split encoding of `v`, returning bytes written.
pub fn put(dst: &mut [u8], v: u64) -> Result<usize> {
    if v <= BRANCH00_MAX {
        if dst.len() < 2 {
            return Err(too_small(2, dst.len()));
        }
        dst[0] = (v >> 8) as u8 & 0x3F;
        dst[1] = (v & 0xFF) as u8;
        Ok(2)
    } else if v <= BRANCH01_MAX {
        if dst.len() < 3 {
            return Err(too_small(3, dst.len()));
        }
        let local = v - BASE01;
        dst[0] = 0b0100_0000 | ((local >> 16) as u8 & 0x3F);
        dst[1] = ((local >> 8) & 0xFF) as u8;
        dst[2] = (local & 0xFF) as u8;
        Ok(3)
    } else if v <= BRANCH10_MAX {
        if dst.len() < 4 {
            return Err(too_small(4, dst.len()));
        }
        let local = v - BASE10;
        dst[0] = 0b1000_0000 | ((local >> 24) as u8 & 0x3F);
        dst[1] = ((local >> 16) & 0xFF) as u8;
        dst[2] = ((local >> 8) & 0xFF) as u8;
        dst[3] = (local & 0xFF) as u8;
        Ok(4)
    } else {
        let local = v - BASE11;
        let w = external::encode_width(local);
        let total = 1 + w.bytes() as usize;
        if dst.len() < total {
            return Err(too_small(total, dst.len()));
        }
        dst[0] = 0b1100_0000 | w.bytes();
        external::put(&mut dst[1..total], local, w)?;
        Ok(total)
    }
}

/// Read a split-encoded value from `src`, returning the value and bytes
/// consumed.
pub fn get(src: &[u8]) -> Result<(u64, usize)> {
    let byte0 = *src
        .first()
        .ok_or_else(|| Error::CorruptEntry("empty split-codec input".to_string()))?;
    match byte0 >> 6 {
        0b00 => {
            require_len(src, 2)?;
            let v = (((byte0 & 0x3F) as u64) << 8) | src[1] as u64;
            Ok((v, 2))
        }
        0b01 => {
            require_len(src, 3)?;
            let local = (((byte0 & 0x3F) as u64) << 16) | ((src[1] as u64) << 8) | src[2] as u64;
            Ok((BASE01 + local, 3))
        }
        0b10 => {
            require_len(src, 4)?;
            let local = (((byte0 & 0x3F) as u64) << 24)
                | ((src[1] as u64) << 16)
                | ((src[2] as u64) << 8)
                | src[3] as u64;
            Ok((BASE10 + local, 4))
        }
        _ => {
            let width_bytes = byte0 & 0x0F;
            let w = Width::new(width_bytes).ok_or_else(|| {
                Error::CorruptEntry(format!("split escape width {width_bytes} out of range"))
            })?;
            let total = 1 + w.bytes() as usize;
            require_len(src, total)?;
            let local = external::get(&src[1..total], w)?;
            Ok((BASE11 + local, total))
        }
    }
}

fn too_small(need: usize, have: usize) -> Error {
    Error::InvalidArgument(format!("destination buffer too small: need {need} bytes, have {have}"))
}

fn require_len(src: &[u8], needed: usize) -> Result<()> {
    if src.len() < needed {
        Err(Error::CorruptEntry(format!(
            "split codec input truncated: need {needed} bytes, have {}",
            src.len()
        )))
    } else {
        Ok(())
    }
}
