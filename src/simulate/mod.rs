//! Memory hierarchy simulation: wires a [`crate::config::Config`] into a
//! DTLB/page-table front end (optional) feeding a mandatory L1 data cache,
//! an optional L2, and main memory, then drives a trace through it.
//! Grounded on the original `MemoryHierarchySimulator`'s construction and
//! driving loop.

pub mod access;
pub mod bus;
pub mod cache_core;
pub mod dtlb;
pub mod levels;
pub mod page_table;
pub mod policies;
pub mod vm;

use anyhow::Result;
use log::debug;

use crate::config::Config;
use crate::trace::TraceEntry;

use access::AccessLine;
use bus::{InvalidationBus, ListenerKind};
use cache_core::{CacheCore, CacheGeometry, Op};
use dtlb::Dtlb;
use levels::{CacheLevel, MemorySubsystem};
use page_table::{EvictedPageTableEntry, PageTable};
use policies::{InclusionPolicyKind, WritePolicyKind};
use vm::VirtualMemory;

fn write_policy_for(write_through_no_allocate: bool) -> WritePolicyKind {
    if write_through_no_allocate {
        WritePolicyKind::WriteThroughNoWriteAllocate
    } else {
        WritePolicyKind::WriteBackWriteAllocate
    }
}

/// A fully wired memory hierarchy ready to replay a trace.
pub struct Simulator {
    config: Config,
    vm: Option<VirtualMemory>,
    subsystem: MemorySubsystem,
    bus: InvalidationBus,
    reads: u64,
    writes: u64,
}

impl Simulator {
    pub fn new(config: Config) -> Result<Simulator> {
        let dc_geometry = CacheGeometry::new(
            config.bits.dc_tag_bits,
            config.bits.dc_index_bits,
            config.bits.dc_offset_bits,
        );
        let dc = CacheLevel::new(
            CacheCore::new("DC", config.dc.associativity as usize, dc_geometry),
            write_policy_for(config.dc.write_through_no_allocate),
            InclusionPolicyKind::Inclusive,
        );

        let l2 = config.l2.map(|l2_cfg| {
            let geometry = CacheGeometry::new(
                config.bits.l2_tag_bits,
                config.bits.l2_index_bits,
                config.bits.l2_offset_bits,
            );
            CacheLevel::new(
                CacheCore::new("L2", l2_cfg.associativity as usize, geometry),
                write_policy_for(l2_cfg.write_through_no_allocate),
                InclusionPolicyKind::Inclusive,
            )
        });

        let mut bus = InvalidationBus::new();

        let vm = if config.virtual_addresses {
            let dtlb = if config.dtlb_enabled {
                bus.register(ListenerKind::Dtlb, 0, 0);
                Some(Dtlb::new(
                    config.dtlb.num_sets as usize,
                    config.dtlb.associativity as usize,
                    config.bits.dtlb_tag_bits,
                    config.bits.dtlb_index_bits,
                    config.bits.page_offset_bits,
                ))
            } else {
                None
            };
            let page_table = PageTable::new(
                config.pt.n_physical_pages,
                config.bits.vpn_bits,
                config.bits.ppn_bits,
                config.bits.page_offset_bits,
            );
            Some(VirtualMemory::new(page_table, dtlb, config.bits.page_offset_bits))
        } else {
            None
        };

        bus.register(ListenerKind::Cache, 0, 1);
        if l2.is_some() {
            bus.register(ListenerKind::Cache, 1, 2);
        }

        Ok(Simulator {
            subsystem: MemorySubsystem::new(dc, l2),
            config,
            vm,
            bus,
            reads: 0,
            writes: 0,
        })
    }

    /// Runs one trace entry through the hierarchy, returning the filled-in
    /// access line the caller is expected to print.
    pub fn access(&mut self, entry: TraceEntry) -> AccessLine {
        let mut line = AccessLine::new(entry.address);

        let physical_address = if let Some(vm) = &mut self.vm {
            let (physical_address, evicted) = vm.translate(entry.address, &mut line);
            if let Some(evicted) = evicted {
                debug!("page eviction: vpn={:#x} ppn={:#x}", evicted.vpn, evicted.ppn);
                self.dispatch_eviction(evicted);
            }
            physical_address
        } else {
            entry.address
        };

        match entry.op {
            Op::Read => self.reads += 1,
            Op::Write => self.writes += 1,
        }

        self.subsystem.access(entry.op, physical_address, &mut line);
        line
    }

    fn dispatch_eviction(&mut self, evicted: EvictedPageTableEntry) {
        let listeners: Vec<_> = self.bus.ordered_listeners().collect();
        for (kind, level_index) in listeners {
            match kind {
                ListenerKind::Dtlb => {
                    if let Some(vm) = &mut self.vm {
                        if let Some(dtlb) = &mut vm.dtlb {
                            dtlb.invalidate_vpn(evicted.vpn);
                        }
                    }
                }
                ListenerKind::Cache => {
                    self.subsystem
                        .invalidate_page(evicted.ppn, evicted.page_offset_bits, level_index);
                }
            }
        }
    }

    /// Replays every entry in `trace`, printing the fixed-width header,
    /// one access line per entry, and the final statistics block.
    pub fn simulate(&mut self, trace: impl Iterator<Item = Result<TraceEntry>>) -> Result<()> {
        for header_line in AccessLine::HEADER_LINES {
            println!("{header_line}");
        }
        for entry in trace {
            let entry = entry?;
            let line = self.access(entry);
            println!("{line}");
        }
        print!("{}", self.stats_report());
        Ok(())
    }

    /// Builds the final statistics block matching the original simulator's
    /// layout: conditional DTLB/page-table/L2 sections, always DC/reads/
    /// writes/read-ratio/main-memory sections, 6-decimal hit rates.
    pub fn stats_report(&self) -> String {
        use std::fmt::Write as _;
        let mut out = String::new();

        if let Some(vm) = &self.vm {
            if let Some(dtlb) = &vm.dtlb {
                let _ = writeln!(out, "dtlb hit rate    : {:.6}", dtlb.stats.hit_rate());
                let _ = writeln!(out, "dtlb hits        : {}", dtlb.stats.hits);
                let _ = writeln!(out, "dtlb misses      : {}\n", dtlb.stats.misses);
            }
            let _ = writeln!(out, "page table hit rate : {:.6}", vm.page_table.stats.hit_rate());
            let _ = writeln!(out, "page table hits     : {}", vm.page_table.stats.hits);
            let _ = writeln!(out, "page table misses   : {}\n", vm.page_table.stats.misses);
        }

        let dc_stats = self.subsystem.dc.cache.get_stats();
        let _ = writeln!(out, "dc hit rate  : {:.6}", dc_stats.hit_rate);
        let _ = writeln!(out, "dc hits      : {}", dc_stats.hits);
        let _ = writeln!(out, "dc misses    : {}\n", dc_stats.misses);

        if let Some(l2) = &self.subsystem.l2 {
            let l2_stats = l2.cache.get_stats();
            let _ = writeln!(out, "l2 hit rate  : {:.6}", l2_stats.hit_rate);
            let _ = writeln!(out, "l2 hits      : {}", l2_stats.hits);
            let _ = writeln!(out, "l2 misses    : {}\n", l2_stats.misses);
        }

        let total = self.reads + self.writes;
        let read_ratio = if total == 0 { 0.0 } else { self.reads as f64 / total as f64 };
        let _ = writeln!(out, "memory reads        : {}", self.reads);
        let _ = writeln!(out, "memory writes       : {}", self.writes);
        let _ = writeln!(out, "read ratio          : {read_ratio:.6}");
        let _ = writeln!(out, "main memory refs    : {}", self.subsystem.memory.accesses());

        if let Some(vm) = &self.vm {
            let _ = writeln!(out, "page table refs     : {}", vm.page_table.stats.accesses);
            let _ = writeln!(out, "disk refs           : {}", vm.page_table.stats.disk_references);
        }

        out
    }

    pub fn config(&self) -> &Config {
        &self.config
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_config() -> Config {
        Config::from_str(
            "\
Data TLB configuration
Number of sets: 4
Set size: 2

Page Table configuration
Number of virtual pages: 1024
Number of physical pages: 4
Page size: 4096

Data Cache configuration
Number of sets: 4
Set size: 1
Line size: 8
Write through/no write allocate: y

L2 Cache configuration
Number of sets: 4
Set size: 1
Line size: 8
Write through/no write allocate: y

Virtual addresses: n
TLB: n
L2 cache: n
",
        )
        .unwrap()
    }

    #[test]
    fn physical_only_trace_runs_without_vm() {
        let config = sample_config();
        let mut sim = Simulator::new(config).unwrap();
        let line = sim.access(TraceEntry {
            op: Op::Read,
            address: 0x10,
        });
        assert_eq!(line.dc_result, Some(false));
        assert_eq!(sim.reads, 1);
    }
}
