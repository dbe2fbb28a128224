//! Byte-code to CID/Unicode range lookup, consumed by composite-font CMaps.
//! Generalizes the sorted range + binary search pattern the single-byte
//! `ForwardMap`/`ReverseMap` encodings use, to the variable-length ranges a
//! PDF CMap declares.

use crate::error::{RasterError, Result};

/// `cidrange`-style entry: byte codes of `length` bytes in `[start_code,
/// end_code]` map to consecutive CIDs starting at `start_cid`.
#[derive(Debug, Clone, Copy)]
pub struct CidRange {
    pub length: u8,
    pub start_code: u32,
    pub end_code: u32,
    pub start_cid: u32,
}

/// `bfrange`-style entry mapping byte codes directly to Unicode scalar
/// values (used by ToUnicode CMaps).
#[derive(Debug, Clone, Copy)]
pub struct UnicodeRange {
    pub length: u8,
    pub start_code: u32,
    pub end_code: u32,
    pub start_unicode: u32,
}

/// Sorted-range lookup table. Invariant: entries are sorted by
/// `(length, start_code, end_code)` so binary search over `value` can be
/// restricted to the partition matching the query's byte length.
pub struct CidRangeMap {
    ranges: Vec<CidRange>,
}

impl CidRangeMap {
    pub fn new(mut ranges: Vec<CidRange>) -> Result<Self> {
        for r in &ranges {
            if r.start_code > r.end_code {
                return Err(RasterError::semantic("CID range with start_code > end_code"));
            }
            if !(1..=4).contains(&r.length) {
                return Err(RasterError::semantic("CID range length must be 1..=4"));
            }
        }
        ranges.sort_by_key(|r| (r.length, r.start_code, r.end_code));
        Ok(CidRangeMap { ranges })
    }

    pub fn lookup(&self, length: u8, code: u32) -> Option<u32> {
        let partition = partition_for_length(&self.ranges, length, |r| r.length);
        let idx = partition
            .binary_search_by(|r| {
                if code < r.start_code {
                    std::cmp::Ordering::Greater
                } else if code > r.end_code {
                    std::cmp::Ordering::Less
                } else {
                    std::cmp::Ordering::Equal
                }
            })
            .ok()?;
        let r = &partition[idx];
        Some(r.start_cid + (code - r.start_code))
    }

    pub fn len(&self) -> usize {
        self.ranges.len()
    }
    pub fn is_empty(&self) -> bool {
        self.ranges.is_empty()
    }
}

pub struct UnicodeRangeMap {
    ranges: Vec<UnicodeRange>,
}

impl UnicodeRangeMap {
    pub fn new(mut ranges: Vec<UnicodeRange>) -> Result<Self> {
        for r in &ranges {
            if r.start_code > r.end_code {
                return Err(RasterError::semantic("unicode range with start_code > end_code"));
            }
            if !(1..=4).contains(&r.length) {
                return Err(RasterError::semantic("unicode range length must be 1..=4"));
            }
        }
        ranges.sort_by_key(|r| (r.length, r.start_code, r.end_code));
        Ok(UnicodeRangeMap { ranges })
    }

    pub fn lookup(&self, length: u8, code: u32) -> Option<u32> {
        let partition = partition_for_length(&self.ranges, length, |r| r.length);
        let idx = partition
            .binary_search_by(|r| {
                if code < r.start_code {
                    std::cmp::Ordering::Greater
                } else if code > r.end_code {
                    std::cmp::Ordering::Less
                } else {
                    std::cmp::Ordering::Equal
                }
            })
            .ok()?;
        let r = &partition[idx];
        Some(r.start_unicode + (code - r.start_code))
    }

    pub fn len(&self) -> usize {
        self.ranges.len()
    }
    pub fn is_empty(&self) -> bool {
        self.ranges.is_empty()
    }
}

/// Both maps are sorted primarily by length, so the length partition is a
/// contiguous sub-slice we can find with a second binary search before the
/// real by-code search below.
fn partition_for_length<T>(sorted: &[T], length: u8, key: impl Fn(&T) -> u8) -> &[T] {
    let start = sorted.partition_point(|r| key(r) < length);
    let end = sorted.partition_point(|r| key(r) <= length);
    &sorted[start..end]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cid_range_lookup_finds_offset_within_range() {
        let map = CidRangeMap::new(vec![
            CidRange { length: 2, start_code: 0x20, end_code: 0x7E, start_cid: 1 },
            CidRange { length: 2, start_code: 0x4E00, end_code: 0x9FFF, start_cid: 100 },
        ])
        .unwrap();
        assert_eq!(map.lookup(2, 0x21), Some(2));
        assert_eq!(map.lookup(2, 0x4E01), Some(101));
        assert_eq!(map.lookup(2, 0xFFFF), None);
    }

    #[test]
    fn unicode_range_respects_length_partition() {
        let map = UnicodeRangeMap::new(vec![
            UnicodeRange { length: 1, start_code: 0x00, end_code: 0xFF, start_unicode: 0 },
            UnicodeRange { length: 2, start_code: 0x00, end_code: 0xFF, start_unicode: 0x4E00 },
        ])
        .unwrap();
        assert_eq!(map.lookup(1, 0x41), Some(0x41));
        assert_eq!(map.lookup(2, 0x41), Some(0x4E41));
    }
}
