//! External codec: fixed-width little-endian integer read/write.
//!
//! "External" means the width is carried out-of-band by the caller (unlike
//! [`crate::tagged`], which self-describes its width in the first byte).
//! Widths 1..=8 store a `u64` natively. Widths 3, 5, 6 and 7 additionally
//! support a signed re-mapping: since there is no spare native sign bit at
//! those byte counts, the magnitude is stored in the low `8w-1` bits and the
//! top bit of the field is set iff the original value was negative.

use persistkit_core::{Error, Result, Width};

/// Smallest width `w` in `1..=8` such that `v < 2^(8w)`.
///
/// Monotonically non-decreasing in `v`; `encode_width(0) == 1`.
pub fn encode_width(v: u64) -> Width {
    for w in 1..=7u8 {
        if v < (1u64 << (8 * w)) {
            return Width::new(w).unwrap();
        }
    }
    Width::new(8).unwrap()
}

fn require_native_range(w: Width) -> Result<u8> {
    let b = w.bytes();
    if b == 0 || b > 8 {
        return Err(Error::InvalidArgument(format!(
            "external codec width must be 1..=8, got {b}"
        )));
    }
    Ok(b)
}

/// Write the low `8w` bits of `v` to `dst` little-endian. `dst` must have at
/// least `w` bytes of space.
pub fn put(dst: &mut [u8], v: u64, w: Width) -> Result<()> {
    let b = require_native_range(w)? as usize;
    if dst.len() < b {
        return Err(Error::InvalidArgument(format!(
            "destination buffer too small: need {b} bytes, have {}",
            dst.len()
        )));
    }
    let bytes = v.to_le_bytes();
    dst[..b].copy_from_slice(&bytes[..b]);
    Ok(())
}

/// Read `w` bytes little-endian from `src` into a `u64`. `src` must have at
/// least `w` bytes available.
pub fn get(src: &[u8], w: Width) -> Result<u64> {
    let b = require_native_range(w)? as usize;
    if src.len() < b {
        return Err(Error::CorruptEntry(format!(
            "source buffer too small: need {b} bytes, have {}",
            src.len()
        )));
    }
    let mut bytes = [0u8; 8];
    bytes[..b].copy_from_slice(&src[..b]);
    Ok(u64::from_le_bytes(bytes))
}

/// Widths with no native sign bit at a power-of-two boundary: 3, 5, 6, 7.
/// These use sign-magnitude re-mapping instead of two's complement.
fn is_remapped_width(w: Width) -> bool {
    matches!(w.bytes(), 3 | 5 | 6 | 7)
}

/// Write a signed value at width `w`.
///
/// For native widths (1, 2, 4, 8) this stores the standard two's-complement
/// bit pattern. For the re-mapped widths (3, 5, 6, 7) the native sign bit is
/// cleared, the absolute value is stored in the remaining `8w-1` bits, and
/// the top bit of the field (bit `8w-1`) is set iff `v` was negative.
pub fn put_signed(dst: &mut [u8], v: i64, w: Width) -> Result<()> {
    let b = require_native_range(w)? as usize;
    if is_remapped_width(w) {
        let magnitude = v.unsigned_abs();
        let max_magnitude = (1u64 << (8 * b as u32 - 1)) - 1;
        if magnitude > max_magnitude {
            return Err(Error::InvalidArgument(format!(
                "magnitude {magnitude} does not fit in {} bits at width {b}",
                8 * b - 1
            )));
        }
        let mut field = magnitude;
        if v < 0 {
            field |= 1u64 << (8 * b as u32 - 1);
        }
        put(dst, field, w)
    } else {
        put(dst, v as u64, w)
    }
}

/// Read a signed value at width `w`. Inverse of [`put_signed`].
pub fn get_signed(src: &[u8], w: Width) -> Result<i64> {
    let b = require_native_range(w)? as usize;
    let field = get(src, w)?;
    if is_remapped_width(w) {
        let sign_bit = 1u64 << (8 * b as u32 - 1);
        let magnitude = field & (sign_bit - 1);
        if field & sign_bit != 0 {
            Ok(-(magnitude as i64))
        } else {
            Ok(magnitude as i64)
        }
    } else {
        // Native width: sign-extend the two's-complement bit pattern.
        let shift = 64 - 8 * b as u32;
        Ok(((field << shift) as i64) >> shift)
    }
}

/// In-place saturating add that must not change the stored width.
///
/// Returns the new value on success, or `None` if adding `delta` to `value`
/// would overflow what width `w` can represent — the caller's contract is
/// that the width is fixed, so overflow saturates to "invalid" rather than
/// silently wrapping or growing.
pub fn add_no_grow(value: u64, delta: i64, w: Width) -> Option<u64> {
    let b = w.bytes();
    if b == 0 || b > 8 {
        return None;
    }
    let max = if b == 8 {
        u64::MAX
    } else {
        (1u64 << (8 * b as u32)) - 1
    };
    let result = if delta >= 0 {
        value.checked_add(delta as u64)?
    } else {
        value.checked_sub(delta.unsigned_abs())?
    };
    if result > max {
        None
    } else {
        Some(result)
    }
}

/// In-place add that is allowed to grow the width.
///
/// Returns the new value and the width required to represent it (which may
/// be wider than the input width).
pub fn add_grow(value: u64, delta: i64) -> Result<(u64, Width)> {
    let result = if delta >= 0 {
        value
            .checked_add(delta as u64)
            .ok_or_else(|| Error::Overflow("add_grow overflowed u64".to_string()))?
    } else {
        value
            .checked_sub(delta.unsigned_abs())
            .ok_or_else(|| Error::Overflow("add_grow underflowed below zero".to_string()))?
    };
    Ok((result, encode_width(result)))
}
