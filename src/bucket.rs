//! Scanline-range dependency buckets

use crate::unit::NO_UNIT;
use crate::{SCANLINES_PER_BUCKET, TOTAL_BUCKETS};

/// Most recently queued work unit per scanline range
///
/// Units that touch the same rows must deliver in submission order. Each
/// new unit records the table entry for its bucket as its predecessor and
/// replaces it, forming one linear chain per bucket that spans polygons
/// and render calls within a pool generation. Only the submitting thread
/// touches the table.
#[derive(Debug)]
pub struct BucketTable {
    table: [u16; TOTAL_BUCKETS],
}

impl BucketTable {
    pub fn new() -> Self {
        BucketTable { table: [NO_UNIT; TOTAL_BUCKETS] }
    }

    /// Bucket index for a scanline
    ///
    /// Scanlines map to buckets in groups of [`SCANLINES_PER_BUCKET`],
    /// wrapping modulo the table size. The scanline is treated as
    /// unsigned so negative rows wrap deterministically instead of
    /// indexing backwards.
    pub fn bucket(scanline: i32) -> usize {
        (scanline as u32 as usize / SCANLINES_PER_BUCKET) % TOTAL_BUCKETS
    }

    /// Publish `unit` as the latest unit for `scanline`'s bucket,
    /// returning the unit previously there
    pub fn chain(&mut self, scanline: i32, unit: u16) -> u16 {
        let bucket = Self::bucket(scanline);
        let prev = self.table[bucket];
        self.table[bucket] = unit;
        prev
    }

    /// Forget all chains (pool reset)
    pub fn reset(&mut self) {
        self.table = [NO_UNIT; TOTAL_BUCKETS];
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn buckets_group_scanlines() {
        assert_eq!(BucketTable::bucket(0), 0);
        assert_eq!(BucketTable::bucket(7), 0);
        assert_eq!(BucketTable::bucket(8), 1);
        assert_eq!(BucketTable::bucket(511), TOTAL_BUCKETS - 1);
        // wraps past the table
        assert_eq!(BucketTable::bucket(512), 0);
        assert_eq!(BucketTable::bucket(520), 1);
    }

    #[test]
    fn chains_remember_the_previous_unit() {
        let mut table = BucketTable::new();
        assert_eq!(table.chain(3, 10), NO_UNIT);
        assert_eq!(table.chain(5, 11), 10);
        assert_eq!(table.chain(8, 12), NO_UNIT);
        table.reset();
        assert_eq!(table.chain(5, 13), NO_UNIT);
    }
}
