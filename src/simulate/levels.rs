//! Cache-level orchestration: read/write access, backfill, and the
//! inclusion/writeback ordering enforced between a cache and whatever sits
//! below it. Grounded on the original `DataCacheLevel`/`MainMemoryLevel`,
//! with the level chain driven explicitly by the simulator rather than
//! through virtual dispatch, since the chain depth is fixed and small
//! (at most DC -> L2 -> main memory).

use super::access::AccessLine;
use super::cache_core::{CacheCore, Op};
use super::policies::{InclusionPolicyKind, WritePolicyKind};

/// One data cache (DC or L2): storage plus the policies governing it.
pub struct CacheLevel {
    pub cache: CacheCore,
    pub write_policy: WritePolicyKind,
    pub inclusion_policy: InclusionPolicyKind,
}

impl CacheLevel {
    pub fn new(cache: CacheCore, write_policy: WritePolicyKind, inclusion_policy: InclusionPolicyKind) -> Self {
        CacheLevel {
            cache,
            write_policy,
            inclusion_policy,
        }
    }

    fn record(&self, parts: &super::cache_core::AddressParts, hit: bool, line: &mut AccessLine) {
        match self.cache.name {
            "DC" => {
                line.dc_tag = Some(parts.tag);
                line.dc_index = Some(parts.index as u64);
                line.dc_result = Some(hit);
            }
            "L2" => {
                line.l2_tag = Some(parts.tag);
                line.l2_index = Some(parts.index as u64);
                line.l2_result = Some(hit);
            }
            other => unreachable!("unknown cache level name {other}"),
        }
    }
}

#[derive(Default)]
pub struct MainMemoryStats {
    pub reads: u64,
    pub writes: u64,
}

#[derive(Default)]
pub struct MainMemoryLevel {
    pub stats: MainMemoryStats,
}

impl MainMemoryLevel {
    pub fn access(&mut self, op: Op) {
        match op {
            Op::Read => self.stats.reads += 1,
            Op::Write => self.stats.writes += 1,
        }
    }

    pub fn accesses(&self) -> u64 {
        self.stats.reads + self.stats.writes
    }
}

/// The cache chain below the DTLB/page-table: a mandatory DC, an optional
/// L2, and main memory as the sink. Owns the read/write orchestration and
/// the inclusion protocol between DC and L2.
pub struct MemorySubsystem {
    pub dc: CacheLevel,
    pub l2: Option<CacheLevel>,
    pub memory: MainMemoryLevel,
}

impl MemorySubsystem {
    pub fn new(dc: CacheLevel, l2: Option<CacheLevel>) -> Self {
        MemorySubsystem {
            dc,
            l2,
            memory: MainMemoryLevel::default(),
        }
    }

    pub fn access(&mut self, op: Op, address: u64, line: &mut AccessLine) {
        match op {
            Op::Read => self.read(address, line),
            Op::Write => self.write(address, line),
        }
    }

    fn read(&mut self, address: u64, line: &mut AccessLine) {
        let (parts, hit) = self.dc.cache.probe(address, true);
        self.dc.record(&parts, hit.is_some(), line);
        if hit.is_some() {
            self.dc.cache.stats.reads += 1;
            self.dc.cache.stats.read_hits += 1;
            return;
        }
        self.dc.cache.stats.reads += 1;
        self.dc.cache.stats.read_misses += 1;

        if self.l2.is_some() {
            self.l2_read_for_fill(address, line);
        } else {
            self.memory.access(Op::Read);
        }

        let (_, evicted) = self.dc.cache.back_fill(Op::Read, address, false);
        if let Some(evicted) = evicted {
            if evicted.dirty {
                self.writeback_from_dc(evicted.block_base);
            }
        }
    }

    fn write(&mut self, address: u64, line: &mut AccessLine) {
        let outcome = self.dc.write_policy.on_write(&mut self.dc.cache, address);
        let (parts, _) = self.dc.cache.probe(address, false);
        self.dc.record(&parts, outcome.hit, line);

        if outcome.hit {
            if outcome.needs_lower_write {
                self.lower_write(address);
            }
            return;
        }

        // miss
        if self.dc.write_policy.allocates_on_write_miss() {
            // read-for-ownership before installing the dirty line
            if self.l2.is_some() {
                self.l2_read_for_fill(address, line);
            } else {
                self.memory.access(Op::Read);
            }
            let (_, evicted) = self
                .dc
                .cache
                .back_fill(Op::Write, address, self.dc.write_policy.dirty_on_allocate());
            if let Some(evicted) = evicted {
                if evicted.dirty {
                    self.writeback_from_dc(evicted.block_base);
                }
            }
        } else if outcome.needs_lower_write {
            self.lower_write(address);
        }
    }

    fn lower_write(&mut self, address: u64) {
        if self.l2.is_some() {
            self.l2_write(address);
        } else {
            self.memory.access(Op::Write);
        }
    }

    /// Writes an evicted dirty DC block down to the next level. Unlike a
    /// genuine CPU write, a writeback never allocates: if the target level
    /// already holds the block it's marked dirty in place (touched MRU);
    /// otherwise the write passes straight through to whatever is below.
    fn writeback_from_dc(&mut self, block_base: u64) {
        if self.l2.is_some() {
            self.l2_writeback(block_base);
        } else {
            self.memory.access(Op::Write);
        }
    }

    fn l2_writeback(&mut self, block_base: u64) {
        let l2 = self.l2.as_mut().expect("l2_writeback requires L2 present");
        l2.cache.stats.writes += 1;
        if l2.cache.contains(block_base) {
            l2.cache.stats.write_hits += 1;
            l2.cache.mark_dirty(block_base);
        } else {
            l2.cache.stats.write_misses += 1;
            self.memory.access(Op::Write);
        }
    }

    /// Enforces inclusion against the DC for a block that just left L2:
    /// invalidates every resident DC copy it covers (an L2 line can be wider
    /// than a DC line), writing each back first if dirty.
    fn enforce_inclusion_against_dc(&mut self, block_base: u64) {
        let l2 = self.l2.as_ref().expect("inclusion check requires L2 present");
        let inclusion_policy = l2.inclusion_policy;
        let lower_offset_bits = l2.cache.geometry.offset_bits;
        let outcome = inclusion_policy.on_lower_eviction(&mut self.dc.cache, block_base, lower_offset_bits);
        for entry in outcome.removed {
            if entry.dirty {
                self.memory.access(Op::Write);
            }
        }
    }

    /// L2-side read-for-fill invoked from the DC's miss path: probes L2,
    /// records its fields on the line, falls through to memory on an L2
    /// miss, and enforces inclusion against the DC if the L2 backfill
    /// evicts a block the DC still holds.
    fn l2_read_for_fill(&mut self, address: u64, line: &mut AccessLine) {
        let l2 = self.l2.as_mut().expect("l2_read_for_fill requires L2 present");
        let (parts, hit) = l2.cache.probe(address, true);
        l2.record(&parts, hit.is_some(), line);
        if hit.is_some() {
            l2.cache.stats.reads += 1;
            l2.cache.stats.read_hits += 1;
            return;
        }
        l2.cache.stats.reads += 1;
        l2.cache.stats.read_misses += 1;
        self.memory.access(Op::Read);
        let l2 = self.l2.as_mut().expect("l2_read_for_fill requires L2 present");
        let (_, evicted) = l2.cache.back_fill(Op::Read, address, false);
        if let Some(evicted) = evicted {
            if evicted.dirty {
                self.memory.access(Op::Write);
            }
            self.enforce_inclusion_against_dc(evicted.block_base);
        }
    }

    fn l2_write(&mut self, address: u64) {
        let l2 = self.l2.as_mut().expect("l2_write requires L2 present");
        let outcome = l2.write_policy.on_write(&mut l2.cache, address);
        if outcome.hit {
            if outcome.needs_lower_write {
                self.memory.access(Op::Write);
            }
            return;
        }
        let l2 = self.l2.as_mut().expect("l2_write requires L2 present");
        if l2.write_policy.allocates_on_write_miss() {
            self.memory.access(Op::Read);
            let l2 = self.l2.as_mut().expect("l2_write requires L2 present");
            let (_, evicted) = l2
                .cache
                .back_fill(Op::Write, address, l2.write_policy.dirty_on_allocate());
            if let Some(evicted) = evicted {
                if evicted.dirty {
                    self.memory.access(Op::Write);
                }
                self.enforce_inclusion_against_dc(evicted.block_base);
            }
        } else if outcome.needs_lower_write {
            self.memory.access(Op::Write);
        }
    }

    /// Applies a page eviction to the cache chain: writes back any dirty
    /// blocks belonging to the evicted page before dropping them, per level,
    /// DC then L2 (the bus has already ordered delivery top-down).
    pub fn invalidate_page(&mut self, ppn: u64, page_offset_bits: u32, level_index: usize) {
        if level_index == 0 {
            let removed = self.dc.cache.invalidate_page(ppn, page_offset_bits);
            for entry in removed {
                if entry.dirty {
                    self.writeback_from_dc(entry.block_base);
                }
            }
        } else {
            let removed = self
                .l2
                .as_mut()
                .expect("invalidate_page addressed a missing L2")
                .cache
                .invalidate_page(ppn, page_offset_bits);
            for entry in removed {
                if entry.dirty {
                    self.memory.access(Op::Write);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::simulate::cache_core::CacheGeometry;

    fn wtna_dc() -> CacheLevel {
        CacheLevel::new(
            CacheCore::new("DC", 1, CacheGeometry::new(26, 4, 2)),
            WritePolicyKind::WriteThroughNoWriteAllocate,
            InclusionPolicyKind::Inclusive,
        )
    }

    #[test]
    fn write_through_always_forwards_to_memory() {
        let mut sub = MemorySubsystem::new(wtna_dc(), None);
        let mut line = AccessLine::new(0x100);
        sub.access(Op::Write, 0x100, &mut line);
        assert_eq!(sub.memory.stats.writes, 1);
        assert_eq!(sub.dc.cache.stats.write_misses, 1);
    }

    #[test]
    fn read_miss_then_hit() {
        let mut sub = MemorySubsystem::new(wtna_dc(), None);
        let mut line = AccessLine::new(0x100);
        sub.access(Op::Read, 0x100, &mut line);
        assert_eq!(sub.dc.cache.stats.read_misses, 1);
        assert_eq!(sub.memory.stats.reads, 1);
        let mut line2 = AccessLine::new(0x100);
        sub.access(Op::Read, 0x100, &mut line2);
        assert_eq!(sub.dc.cache.stats.read_hits, 1);
    }
}
