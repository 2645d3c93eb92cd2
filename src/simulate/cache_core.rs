//! Generic set-associative cache core: address decoding, LRU-ordered sets,
//! probe/backfill/invalidate primitives shared by the data cache and the
//! translation cache wrappers.

use lru::LruCache;
use std::num::NonZeroUsize;

/// `R`ead or `W`rite.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Op {
    Read,
    Write,
}

impl Op {
    pub fn is_read(self) -> bool {
        matches!(self, Op::Read)
    }
}

/// A resident block in a cache set: identifies a block, not a byte.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CacheEntry {
    pub tag: u64,
    pub index: usize,
    pub block_base: u64,
    pub dirty: bool,
}

/// A block evicted from a set, handed to the caller for writeback/inclusion handling.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct EvictedEntry {
    pub tag: u64,
    pub index: usize,
    pub block_base: u64,
    pub dirty: bool,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct AddressParts {
    pub tag: u64,
    pub index: usize,
    pub offset: u64,
}

#[derive(Default, Clone, Copy, Debug)]
pub struct CacheStats {
    pub reads: u64,
    pub writes: u64,
    pub read_hits: u64,
    pub write_hits: u64,
    pub read_misses: u64,
    pub write_misses: u64,
    pub evictions: u64,
    pub write_backs: u64,
}

#[derive(Clone, Copy, Debug)]
pub struct HitRateStats {
    pub hits: u64,
    pub misses: u64,
    pub hit_rate: f64,
}

impl CacheStats {
    pub fn get_stats(&self) -> HitRateStats {
        let hits = self.read_hits + self.write_hits;
        let misses = self.read_misses + self.write_misses;
        let hit_rate = if hits + misses > 0 {
            hits as f64 / (hits + misses) as f64
        } else {
            0.0
        };
        HitRateStats {
            hits,
            misses,
            hit_rate,
        }
    }
}

/// Precomputed bit geometry for one cache: how many bits of the address are
/// tag/index/offset, and the derived masks.
#[derive(Clone, Copy, Debug)]
pub struct CacheGeometry {
    pub tag_bits: u32,
    pub index_bits: u32,
    pub offset_bits: u32,
    offset_mask: u64,
    index_mask: u64,
}

impl CacheGeometry {
    pub fn new(tag_bits: u32, index_bits: u32, offset_bits: u32) -> Self {
        CacheGeometry {
            tag_bits,
            index_bits,
            offset_bits,
            offset_mask: mask(offset_bits),
            index_mask: mask(index_bits),
        }
    }

    pub fn num_sets(&self) -> usize {
        1usize << self.index_bits
    }
}

/// Computes a `bits`-wide all-ones mask (0 if `bits == 0`).
pub fn mask(bits: u32) -> u64 {
    if bits == 0 {
        0
    } else {
        (1u64 << bits) - 1
    }
}

/// Set-associative cache storage with per-set LRU order.
///
/// Each set is an `LruCache` keyed by tag; presence in the map is recency
/// order, oldest-first. This mirrors the teacher's own use of `lru::LruCache`
/// for its simulated hardware caches.
pub struct CacheCore {
    pub name: &'static str,
    pub geometry: CacheGeometry,
    sets: Vec<LruCache<u64, CacheEntry>>,
    pub stats: CacheStats,
}

impl CacheCore {
    pub fn new(name: &'static str, associativity: usize, geometry: CacheGeometry) -> Self {
        let num_sets = geometry.num_sets();
        let ways = NonZeroUsize::new(associativity).expect("associativity must be nonzero");
        let sets = (0..num_sets).map(|_| LruCache::new(ways)).collect();
        CacheCore {
            name,
            geometry,
            sets,
            stats: CacheStats::default(),
        }
    }

    pub fn associativity(&self) -> usize {
        self.sets[0].cap().get()
    }

    /// `block_base = addr & ~offset_mask`; `(tag, index, offset)` from that base.
    pub fn parse_address(&self, addr: u64) -> AddressParts {
        let g = &self.geometry;
        let offset = addr & g.offset_mask;
        let block_base = addr & !g.offset_mask;
        let index = ((block_base >> g.offset_bits) & g.index_mask) as usize;
        let tag = block_base >> (g.index_bits + g.offset_bits);
        AddressParts { tag, index, offset }
    }

    pub fn block_base(&self, addr: u64) -> u64 {
        addr & !self.geometry.offset_mask
    }

    pub fn contains(&self, addr: u64) -> bool {
        let parts = self.parse_address(addr);
        self.sets[parts.index].peek(&parts.tag).is_some()
    }

    pub fn is_dirty(&self, addr: u64) -> bool {
        let parts = self.parse_address(addr);
        self.sets[parts.index]
            .peek(&parts.tag)
            .map(|e| e.dirty)
            .unwrap_or(false)
    }

    /// Hit: `Some(entry)` (moved to MRU iff `update_mru`); miss: `None`.
    pub fn probe(&mut self, addr: u64, update_mru: bool) -> (AddressParts, Option<CacheEntry>) {
        let parts = self.parse_address(addr);
        let set = &mut self.sets[parts.index];
        let hit = if update_mru {
            set.get(&parts.tag).copied()
        } else {
            set.peek(&parts.tag).copied()
        };
        (parts, hit)
    }

    pub fn invalidate(&mut self, addr: u64) -> bool {
        let parts = self.parse_address(addr);
        self.sets[parts.index].pop(&parts.tag).is_some()
    }

    /// Removes every entry whose block maps to the evicted PPN, given the
    /// number of page-offset bits (the PPN occupies the high bits of a
    /// physical block base).
    pub fn invalidate_page(&mut self, ppn: u64, page_offset_bits: u32) -> Vec<CacheEntry> {
        let mut removed = Vec::new();
        for set in &mut self.sets {
            let stale: Vec<u64> = set
                .iter()
                .filter(|(_, e)| e.block_base >> page_offset_bits == ppn)
                .map(|(tag, _)| *tag)
                .collect();
            for tag in stale {
                if let Some(entry) = set.pop(&tag) {
                    removed.push(entry);
                }
            }
        }
        removed
    }

    /// Removes every entry whose block falls within the `covering_offset_bits`-
    /// wide range containing `base`. Used for inclusion enforcement when a
    /// lower level's line is wider than this cache's own lines, so one lower
    /// eviction can stale more than one resident entry here.
    pub fn invalidate_range(&mut self, base: u64, covering_offset_bits: u32) -> Vec<CacheEntry> {
        let covering_mask = !mask(covering_offset_bits);
        let base = base & covering_mask;
        let mut removed = Vec::new();
        for set in &mut self.sets {
            let stale: Vec<u64> = set
                .iter()
                .filter(|(_, e)| e.block_base & covering_mask == base)
                .map(|(tag, _)| *tag)
                .collect();
            for tag in stale {
                if let Some(entry) = set.pop(&tag) {
                    removed.push(entry);
                }
            }
        }
        removed
    }

    /// Pops the LRU entry from the target set if it is full.
    pub fn possibly_evict(&mut self, addr: u64) -> Option<EvictedEntry> {
        let parts = self.parse_address(addr);
        let set = &mut self.sets[parts.index];
        if set.len() < set.cap().get() {
            return None;
        }
        let (_, victim) = set.pop_lru()?;
        self.stats.evictions += 1;
        if victim.dirty {
            self.stats.write_backs += 1;
        }
        Some(EvictedEntry {
            tag: victim.tag,
            index: victim.index,
            block_base: victim.block_base,
            dirty: victim.dirty,
        })
    }

    /// Installs a fresh entry at MRU, possibly evicting the set's LRU entry first.
    pub fn back_fill(&mut self, op: Op, addr: u64, dirty_on_write: bool) -> (AddressParts, Option<EvictedEntry>) {
        let base = self.block_base(addr);
        let evicted = self.possibly_evict(base);
        let parts = self.parse_address(base);
        let dirty = dirty_on_write && matches!(op, Op::Write);
        self.sets[parts.index].put(
            parts.tag,
            CacheEntry {
                tag: parts.tag,
                index: parts.index,
                block_base: base,
                dirty,
            },
        );
        (parts, evicted)
    }

    /// Marks the resident entry at `addr` dirty in place, touching it as MRU.
    /// Returns `false` if the block is not resident.
    pub fn mark_dirty(&mut self, addr: u64) -> bool {
        let parts = self.parse_address(addr);
        match self.sets[parts.index].get_mut(&parts.tag) {
            Some(entry) => {
                entry.dirty = true;
                true
            }
            None => false,
        }
    }

    pub fn get_stats(&self) -> HitRateStats {
        self.stats.get_stats()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn geom(tag: u32, index: u32, offset: u32) -> CacheGeometry {
        CacheGeometry::new(tag, index, offset)
    }

    #[test]
    fn direct_mapped_parses_tag_index_offset() {
        // 4 sets, 8-byte lines: offset_bits=3, index_bits=2.
        let cache = CacheCore::new("DC", 1, geom(27, 2, 3));
        let parts = cache.parse_address(0x28); // 0b101000
        assert_eq!(parts.offset, 0);
        assert_eq!(parts.index, 5 & 0b11);
    }

    #[test]
    fn backfill_then_probe_hits() {
        let mut cache = CacheCore::new("DC", 1, geom(27, 2, 3));
        let (_, evicted) = cache.back_fill(Op::Read, 0x00, false);
        assert!(evicted.is_none());
        let (_, hit) = cache.probe(0x00, true);
        assert!(hit.is_some());
    }

    #[test]
    fn full_set_evicts_lru() {
        // 1 set, 2-way, 16-byte lines.
        let mut cache = CacheCore::new("DC", 2, geom(28, 0, 4));
        cache.back_fill(Op::Read, 0x0, false);
        cache.back_fill(Op::Read, 0x100, false);
        // touch 0x0 so it's MRU, 0x100 becomes LRU
        cache.probe(0x0, true);
        let (_, evicted) = cache.back_fill(Op::Read, 0x200, false);
        let evicted = evicted.expect("set was full, must evict");
        assert_eq!(evicted.block_base, 0x100);
        assert!(cache.contains(0x0));
        assert!(cache.contains(0x200));
        assert!(!cache.contains(0x100));
    }

    #[test]
    fn invalidate_page_removes_matching_blocks_only() {
        let mut cache = CacheCore::new("DC", 4, geom(26, 4, 3));
        cache.back_fill(Op::Read, 0x0000, false);
        cache.back_fill(Op::Read, 0x1000, false);
        // page_offset_bits = 12: PPN 0 owns 0x0000, PPN 1 owns 0x1000.
        let removed = cache.invalidate_page(0, 12);
        assert_eq!(removed.len(), 1);
        assert!(!cache.contains(0x0000));
        assert!(cache.contains(0x1000));
    }
}
