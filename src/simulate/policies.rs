//! Write and inclusion policies, selected per cache level at simulator
//! construction time. Grounded on the original's `protocols/policies.py`,
//! with the inclusion policy corrected to report dirtiness back to the
//! caller (needed so a forced invalidation can write back before the line
//! disappears).

use super::cache_core::{CacheCore, Op};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum WritePolicyKind {
    WriteThroughNoWriteAllocate,
    WriteBackWriteAllocate,
}

/// Outcome of applying a write policy to one write access.
pub struct WriteOutcome {
    pub hit: bool,
    /// The lower level must also be written (write-through, or a
    /// write-back miss's read-for-ownership before the local write lands).
    pub needs_lower_write: bool,
}

impl WritePolicyKind {
    /// Applies this policy's write-hit/write-miss behavior. On a
    /// write-back miss, the caller is expected to have already pulled the
    /// block in (read-for-ownership) before calling this, so this only
    /// marks the freshly-filled entry dirty.
    pub fn on_write(self, cache: &mut CacheCore, addr: u64) -> WriteOutcome {
        cache.stats.writes += 1;
        match self {
            WritePolicyKind::WriteThroughNoWriteAllocate => {
                let (_, hit) = cache.probe(addr, true);
                match hit {
                    Some(_) => {
                        cache.stats.write_hits += 1;
                        WriteOutcome {
                            hit: true,
                            needs_lower_write: true,
                        }
                    }
                    None => {
                        cache.stats.write_misses += 1;
                        WriteOutcome {
                            hit: false,
                            needs_lower_write: true,
                        }
                    }
                }
            }
            WritePolicyKind::WriteBackWriteAllocate => {
                let (_, hit) = cache.probe(addr, true);
                match hit {
                    Some(_) => {
                        cache.stats.write_hits += 1;
                        cache.mark_dirty(addr);
                        WriteOutcome {
                            hit: true,
                            needs_lower_write: false,
                        }
                    }
                    None => {
                        cache.stats.write_misses += 1;
                        WriteOutcome {
                            hit: false,
                            needs_lower_write: false,
                        }
                    }
                }
            }
        }
    }

    pub fn allocates_on_write_miss(self) -> bool {
        matches!(self, WritePolicyKind::WriteBackWriteAllocate)
    }

    pub fn dirty_on_allocate(self) -> bool {
        matches!(self, WritePolicyKind::WriteBackWriteAllocate)
    }

    pub fn op_for_backfill(self) -> Op {
        Op::Write
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum InclusionPolicyKind {
    Inclusive,
}

/// Result of enforcing inclusion against an upper-level cache: every entry
/// that was invalidated there, so the caller can write back the dirty ones
/// before they disappear.
pub struct InclusionOutcome {
    pub removed: Vec<super::cache_core::CacheEntry>,
}

impl InclusionPolicyKind {
    /// Called when a lower level evicts a block that an upper (smaller)
    /// cache might still hold. `lower_offset_bits` is the evicting level's
    /// own line-size bit width: when it's wider than the upper cache's
    /// lines, one eviction there can stale more than one entry here, so
    /// every entry within that range is invalidated, not just the one at
    /// the exact evicted address.
    pub fn on_lower_eviction(self, upper: &mut CacheCore, block_base: u64, lower_offset_bits: u32) -> InclusionOutcome {
        match self {
            InclusionPolicyKind::Inclusive => InclusionOutcome {
                removed: upper.invalidate_range(block_base, lower_offset_bits),
            },
        }
    }
}
