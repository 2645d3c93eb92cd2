//! Virtual-memory front end: consults the DTLB first (if enabled), falling
//! back to the page table on a DTLB miss and backfilling the DTLB from the
//! result. Grounded on the original's `VirtualMemoryLevel`, corrected so a
//! page eviction is reported to the invalidation bus exactly once (the
//! original's DTLB-miss branch published it twice).

use super::access::AccessLine;
use super::dtlb::Dtlb;
use super::page_table::{EvictedPageTableEntry, PageTable};

pub struct VirtualMemory {
    pub page_table: PageTable,
    pub dtlb: Option<Dtlb>,
    pub page_offset_bits: u32,
}

impl VirtualMemory {
    pub fn new(page_table: PageTable, dtlb: Option<Dtlb>, page_offset_bits: u32) -> Self {
        VirtualMemory {
            page_table,
            dtlb,
            page_offset_bits,
        }
    }

    /// Translates `vaddr`, filling in the DTLB/page-table fields of `line`.
    /// Returns the physical address and, if a page was evicted to make
    /// room for a new mapping, that eviction for the caller to dispatch
    /// over the invalidation bus.
    pub fn translate(&mut self, vaddr: u64, line: &mut AccessLine) -> (u64, Option<EvictedPageTableEntry>) {
        if let Some(dtlb) = &mut self.dtlb {
            let probe = dtlb.probe(vaddr);
            line.dtlb_tag = Some(probe.tag);
            line.dtlb_index = Some(probe.index as u64);
            line.dtlb_result = Some(probe.hit);

            if probe.hit {
                let physical_address = probe.physical_address.expect("hit must carry a physical address");
                line.vpn = Some(vaddr >> dtlb.offset_bits());
                line.page_offset = Some(vaddr & super::cache_core::mask(dtlb.offset_bits()));
                line.ppn = Some(physical_address >> self.page_offset_bits);
                // Still touch the page table on a DTLB hit, to keep its own
                // hit/miss stats and LRU frame order coherent with the
                // access pattern, even though the DTLB already answered.
                self.page_table.translate(vaddr);
                return (physical_address, None);
            }

            let result = self.page_table.translate(vaddr);
            line.vpn = Some(result.vpn);
            line.page_offset = Some(result.offset);
            line.pt_result = Some(result.hit);
            line.ppn = Some(result.ppn);
            dtlb.back_fill(vaddr, result.ppn);
            (result.physical_address, result.evicted_entry)
        } else {
            let result = self.page_table.translate(vaddr);
            line.vpn = Some(result.vpn);
            line.page_offset = Some(result.offset);
            line.pt_result = Some(result.hit);
            line.ppn = Some(result.ppn);
            (result.physical_address, result.evicted_entry)
        }
    }
}
