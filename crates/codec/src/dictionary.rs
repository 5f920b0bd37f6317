//! Dictionary codec: deduplicate repeated values into a sorted unique-value
//! table plus a fixed-width index stream.
//!
//! Wire shape: tagged-varint `dictSize`, `dictSize` tagged-varint values (in
//! strictly increasing order), tagged-varint `count`, then `count`
//! fixed-`indexWidth`-byte indices into the table. `indexWidth` is the
//! [`crate::external`] byte width of `dictSize - 1` (or 1 byte if the
//! dictionary is empty).

use crate::{external, tagged};
use persistkit_core::{Error, Result, Width};

/// Dictionaries may hold at most this many unique values -- guards against
/// a hostile or corrupt input forcing an unbounded unique-value table.
pub const MAX_DICTIONARY_SIZE: u64 = 1 << 20;

/// A parsed, borrowed view over an encoded dictionary block.
pub struct DictionaryEncoded<'a> {
    values: Vec<u64>,
    index_width: u8,
    count: usize,
    indices: &'a [u8],
}

impl<'a> DictionaryEncoded<'a> {
    /// Build a dictionary encoding of `input`, returning the wire bytes.
    pub fn encode(input: &[u64]) -> Result<Vec<u8>> {
        let mut sorted = input.to_vec();
        sorted.sort_unstable();
        sorted.dedup();
        let dict_size = sorted.len() as u64;
        if dict_size > MAX_DICTIONARY_SIZE {
            return Err(Error::Overflow(format!(
                "dictionary would hold {dict_size} unique values, exceeding the cap of {MAX_DICTIONARY_SIZE}"
            )));
        }

        let index_width = if dict_size == 0 {
            Width::new(1).unwrap()
        } else {
            external::encode_width(dict_size - 1)
        };

        let mut out = Vec::new();
        tagged::append(&mut out, dict_size);
        for &v in &sorted {
            tagged::append(&mut out, v);
        }
        tagged::append(&mut out, input.len() as u64);

        let mut buf = [0u8; 8];
        for &v in input {
            let index = sorted.binary_search(&v).expect("value came from input, present in sorted table") as u64;
            external::put(&mut buf, index, index_width)?;
            out.extend_from_slice(&buf[..index_width.bytes() as usize]);
        }
        Ok(out)
    }

    /// Parse a dictionary block, returning the view and bytes consumed.
    pub fn parse(bytes: &'a [u8]) -> Result<(DictionaryEncoded<'a>, usize)> {
        let (dict_size, n1) = tagged::get(bytes)?;
        if dict_size > MAX_DICTIONARY_SIZE {
            return Err(Error::CorruptHeader(format!(
                "dictionary size {dict_size} exceeds the cap of {MAX_DICTIONARY_SIZE}"
            )));
        }
        let mut offset = n1;
        let mut values = Vec::with_capacity(dict_size as usize);
        for _ in 0..dict_size {
            let (v, n) = tagged::get(&bytes[offset..])?;
            offset += n;
            values.push(v);
        }
        if !values.windows(2).all(|w| w[0] < w[1]) {
            return Err(Error::CorruptEntry(
                "dictionary table is not strictly increasing".to_string(),
            ));
        }

        let (count, n_count) = tagged::get(&bytes[offset..])?;
        offset += n_count;
        let count = count as usize;

        let index_width = if dict_size == 0 {
            1u8
        } else {
            external::encode_width(dict_size - 1).bytes()
        };
        // Checked: index_width <= 8 and count comes from a tagged varint
        // bounded well under usize::MAX on any real platform, but an
        // adversarial file could still claim an enormous count.
        let body_len = (count as u64)
            .checked_mul(index_width as u64)
            .ok_or_else(|| Error::Overflow("dictionary index region size overflowed".to_string()))?
            as usize;
        if bytes.len() < offset + body_len {
            return Err(Error::CorruptEntry("dictionary indices truncated".to_string()));
        }
        let indices = &bytes[offset..offset + body_len];

        Ok((
            DictionaryEncoded {
                values,
                index_width,
                count,
                indices,
            },
            offset + body_len,
        ))
    }

    /// The unique-value table, in ascending order.
    pub fn values(&self) -> &[u64] {
        &self.values
    }

    /// Number of encoded elements (may exceed `values().len()`).
    pub fn count(&self) -> usize {
        self.count
    }

    /// Value at logical position `i`.
    pub fn get(&self, i: usize) -> Result<u64> {
        if i >= self.count {
            return Err(Error::InvalidArgument(format!(
                "index {i} out of bounds for dictionary block of {} values",
                self.count
            )));
        }
        let w = self.index_width as usize;
        let start = i * w;
        let width = Width::new(self.index_width).unwrap();
        let index = external::get(&self.indices[start..start + w], width)? as usize;
        self.values.get(index).copied().ok_or_else(|| {
            Error::CorruptEntry(format!("dictionary index {index} out of bounds for table of {} values", self.values.len()))
        })
    }

    /// Reconstruct the original sequence.
    pub fn decode_all(&self) -> Result<Vec<u64>> {
        (0..self.count).map(|i| self.get(i)).collect()
    }
}

/// Encode then immediately decode.
pub fn roundtrip_decode(input: &[u64]) -> Result<Vec<u64>> {
    let bytes = DictionaryEncoded::encode(input)?;
    let (dict, consumed) = DictionaryEncoded::parse(&bytes)?;
    debug_assert_eq!(consumed, bytes.len());
    dict.decode_all()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_input() {
        let bytes = DictionaryEncoded::encode(&[]).unwrap();
        let (dict, _) = DictionaryEncoded::parse(&bytes).unwrap();
        assert_eq!(dict.count(), 0);
        assert!(dict.values().is_empty());
        assert_eq!(dict.decode_all().unwrap(), Vec::<u64>::new());
    }

    #[test]
    fn repeated_values_deduplicate_into_sorted_table() {
        let input = vec![7u64, 7, 7, 9, 9, 7, 3];
        let bytes = DictionaryEncoded::encode(&input).unwrap();
        let (dict, _) = DictionaryEncoded::parse(&bytes).unwrap();
        assert_eq!(dict.values(), &[3, 7, 9]);
        assert_eq!(dict.decode_all().unwrap(), input);
    }

    #[test]
    fn all_unique_values_roundtrip() {
        let input: Vec<u64> = (0..500).rev().collect();
        let bytes = DictionaryEncoded::encode(&input).unwrap();
        let (dict, _) = DictionaryEncoded::parse(&bytes).unwrap();
        assert_eq!(dict.values().len(), 500);
        assert_eq!(dict.decode_all().unwrap(), input);
    }

    #[test]
    fn single_unique_value_repeated() {
        let input = vec![5u64; 1000];
        let bytes = DictionaryEncoded::encode(&input).unwrap();
        let (dict, _) = DictionaryEncoded::parse(&bytes).unwrap();
        assert_eq!(dict.values(), &[5]);
        assert_eq!(dict.decode_all().unwrap(), input);
    }

    #[test]
    fn oversized_dictionary_is_rejected_at_encode() {
        // Cheap to construct: every element distinct, exceeding the cap.
        let input: Vec<u64> = (0..=MAX_DICTIONARY_SIZE).collect();
        assert!(DictionaryEncoded::encode(&input).is_err());
    }

    #[test]
    fn corrupt_non_increasing_table_is_rejected_at_decode() {
        let input = vec![1u64, 2, 3];
        let mut bytes = DictionaryEncoded::encode(&input).unwrap();
        // dictSize=3, then values 1,2,3 as single tagged bytes at offsets 1,2,3.
        bytes[2] = 5; // corrupt the second table entry to break monotonicity
        assert!(DictionaryEncoded::parse(&bytes).is_err());
    }

    #[test]
    fn truncated_indices_are_rejected() {
        let input = vec![10u64, 20, 30, 10, 20];
        let mut bytes = DictionaryEncoded::encode(&input).unwrap();
        bytes.truncate(bytes.len() - 1);
        assert!(DictionaryEncoded::parse(&bytes).is_err());
    }
}
